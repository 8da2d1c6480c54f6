mod atomic;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::catalog::VersionCatalog;
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::http::{Transport, STATUS_NOT_MODIFIED};
use crate::core::maven::{join_url, ARTIFACT_ID};
use crate::core::version::Version;

pub use atomic::write_atomic;
pub(crate) use atomic::write_atomic_blocking;
use atomic::remove_if_exists;

const JAR_EXTENSION: &str = "jar";
const ETAG_EXTENSION: &str = "etag";

/// A jar on disk and the validator it was downloaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub version: Version,
    pub path: PathBuf,
    /// `None` means the jar must be re-fetched unconditionally.
    pub etag: Option<String>,
}

/// Local jar cache with ETag revalidation.
///
/// Layout: `<dir>/quiltflower-<version>.jar` plus a sibling
/// `quiltflower-<version>.etag` holding the server's `ETag` verbatim. The
/// etag file is only meaningful next to its jar: it is removed before a jar
/// is replaced and written after, so an interrupted update leaves at worst a
/// jar without validator.
#[derive(Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
    transport: Arc<dyn Transport>,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>, transport: Arc<dyn Transport>) -> Self {
        Self {
            dir: dir.into(),
            transport,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn jar_path(&self, version: &Version) -> PathBuf {
        self.dir.join(file_name(version, JAR_EXTENSION))
    }

    pub fn etag_path(&self, version: &Version) -> PathBuf {
        self.dir.join(file_name(version, ETAG_EXTENSION))
    }

    /// Remote location of `version`'s jar.
    ///
    /// Releases live under `<release>/<version>/`; anything else is a
    /// snapshot build under `<snapshot>/<core>-SNAPSHOT/`.
    pub fn artifact_url(
        version: &Version,
        catalog: &VersionCatalog,
        release_base_url: &str,
        snapshot_base_url: &str,
    ) -> String {
        let jar = file_name(version, JAR_EXTENSION);
        if catalog.is_release(version) {
            join_url(release_base_url, &format!("{version}/{jar}"))
        } else {
            join_url(
                snapshot_base_url,
                &format!("{}-SNAPSHOT/{jar}", version.release_core()),
            )
        }
    }

    /// Current cache entry for `version`, if its jar exists.
    pub async fn inspect(&self, version: &Version) -> UpdaterResult<Option<CachedArtifact>> {
        let path = self.jar_path(version);
        if !exists(&path).await? {
            return Ok(None);
        }

        let etag_path = self.etag_path(version);
        let etag = match tokio::fs::read_to_string(&etag_path).await {
            Ok(raw) => Some(raw.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(UpdaterError::io(etag_path, e)),
        };

        Ok(Some(CachedArtifact {
            version: version.clone(),
            path,
            etag: etag.filter(|tag| !tag.is_empty()),
        }))
    }

    /// Path of the cached jar for `version` without touching the network.
    pub async fn lookup(&self, version: &Version) -> Option<PathBuf> {
        let path = self.jar_path(version);
        match exists(&path).await {
            Ok(true) => Some(path),
            Ok(false) => None,
            Err(e) => {
                warn!("Treating {} as not cached: {}", version, e);
                None
            }
        }
    }

    /// Make sure the jar for `version` is present and current, downloading it
    /// if needed, and return its local path.
    pub async fn ensure_downloaded(
        &self,
        version: &Version,
        catalog: &VersionCatalog,
        release_base_url: &str,
        snapshot_base_url: &str,
    ) -> UpdaterResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| UpdaterError::io(&self.dir, e))?;

        let url = Self::artifact_url(version, catalog, release_base_url, snapshot_base_url);
        let cached = self.inspect(version).await?;
        let validator = cached.as_ref().and_then(|c| c.etag.as_deref());

        debug!(
            "Fetching {} (conditional: {})",
            url,
            validator.is_some()
        );
        let response = self.transport.get(&url, validator).await?;

        if response.status == STATUS_NOT_MODIFIED {
            if let Some(cached) = cached {
                debug!("{} not modified, using {:?}", version, cached.path);
                return Ok(cached.path);
            }
        }

        if !response.is_success() {
            return Err(UpdaterError::Download {
                url,
                status: response.status,
            });
        }

        let jar = self.jar_path(version);
        let etag_path = self.etag_path(version);

        let size = response.body.len();

        remove_if_exists(&etag_path).await?;
        write_atomic(&self.dir, &jar, response.body).await?;
        if let Some(etag) = response.etag {
            write_atomic(&self.dir, &etag_path, etag.into_bytes()).await?;
        }

        info!("Downloaded {} ({} bytes) to {:?}", version, size, jar);
        Ok(jar)
    }

    /// Versions with a jar in the cache directory.
    pub async fn cached_versions(&self) -> UpdaterResult<BTreeSet<Version>> {
        let mut versions = BTreeSet::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(versions),
            Err(e) => return Err(UpdaterError::io(&self.dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| UpdaterError::io(&self.dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(text) = name
                .strip_prefix(&format!("{ARTIFACT_ID}-"))
                .and_then(|rest| rest.strip_suffix(&format!(".{JAR_EXTENSION}")))
            else {
                continue;
            };
            match Version::parse(text) {
                Some(version) => {
                    versions.insert(version);
                }
                None => warn!("Ignoring unrecognised cache entry {:?}", entry.path()),
            }
        }

        Ok(versions)
    }

    /// Drop `version` from the cache: jar first, then its etag.
    pub async fn remove(&self, version: &Version) -> UpdaterResult<()> {
        remove_if_exists(&self.jar_path(version)).await?;
        remove_if_exists(&self.etag_path(version)).await?;
        Ok(())
    }
}

fn file_name(version: &Version, extension: &str) -> String {
    format!("{ARTIFACT_ID}-{version}.{extension}")
}

async fn exists(path: &Path) -> UpdaterResult<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| UpdaterError::io(path, e))
}
