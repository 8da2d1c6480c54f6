use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::metadata::{MavenMetadata, SnapshotVersion, Versioning};
use super::{join_url, METADATA_FILE};
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::http::Transport;
use crate::core::version::Version;

/// Versions advertised by one channel's `maven-metadata.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMetadata {
    /// Server-reported `<latest>`, if present and parsable.
    pub latest: Option<Version>,
    /// Every parsable `<version>`; unparsable entries are dropped.
    pub all: BTreeSet<Version>,
}

/// A `-SNAPSHOT` directory resolved to its concrete timestamped build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSubversion {
    /// `<base>-<timestamp>-<buildNumber>`, e.g. `1.3-20240101.120000-5`.
    pub resolved_label: String,
    /// `<value>`s of the plain jar entries (extension `jar`, no classifier).
    pub artifact_values: BTreeSet<String>,
}

/// Fetches and interprets Maven metadata documents.
#[derive(Clone)]
pub struct MetadataFetcher {
    transport: Arc<dyn Transport>,
}

impl MetadataFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// GET `<base_url>/maven-metadata.xml` and list the channel's versions.
    pub async fn fetch_channel_metadata(&self, base_url: &str) -> UpdaterResult<ChannelMetadata> {
        let url = join_url(base_url, METADATA_FILE);
        let doc = self.fetch_document(&url).await?;
        let versioning = require_versioning(&url, doc)?;

        let latest = versioning
            .latest
            .as_deref()
            .and_then(|text| parse_or_warn(&url, text));

        let all = versioning
            .versions
            .map(|v| v.items)
            .unwrap_or_default()
            .iter()
            .filter_map(|text| parse_or_warn(&url, text))
            .collect::<BTreeSet<_>>();

        debug!(
            "Channel {}: latest={:?}, {} versions",
            url,
            latest.as_ref().map(Version::as_str),
            all.len()
        );
        Ok(ChannelMetadata { latest, all })
    }

    /// GET `<base_url>/<snapshot_version>/maven-metadata.xml` and resolve the
    /// snapshot to its current timestamped build.
    pub async fn fetch_snapshot_subversion(
        &self,
        base_url: &str,
        snapshot_version: &Version,
    ) -> UpdaterResult<SnapshotSubversion> {
        let url = join_url(base_url, &format!("{snapshot_version}/{METADATA_FILE}"));
        let doc = self.fetch_document(&url).await?;
        let versioning = require_versioning(&url, doc)?;

        let missing = |element: &str| UpdaterError::MetadataFormat {
            url: url.clone(),
            reason: format!("missing <{element}>"),
        };

        let snapshot = versioning.snapshot.ok_or_else(|| missing("snapshot"))?;
        let timestamp = snapshot.timestamp.ok_or_else(|| missing("timestamp"))?;
        let build_number = snapshot
            .build_number
            .ok_or_else(|| missing("buildNumber"))?;

        let raw = snapshot_version.as_str();
        let base = raw.strip_suffix("-SNAPSHOT").unwrap_or(raw);
        let resolved_label = format!("{}-{}-{}", base, timestamp.trim(), build_number.trim());

        let artifact_values = versioning
            .snapshot_versions
            .map(|v| v.items)
            .unwrap_or_default()
            .into_iter()
            .filter(SnapshotVersion::is_plain_jar)
            .map(|v| v.value.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        Ok(SnapshotSubversion {
            resolved_label,
            artifact_values,
        })
    }

    async fn fetch_document(&self, url: &str) -> UpdaterResult<MavenMetadata> {
        let response = self
            .transport
            .get(url, None)
            .await
            .map_err(|e| UpdaterError::MetadataFetch {
                url: url.to_string(),
                reason: e.message,
            })?;

        if !response.is_success() {
            return Err(UpdaterError::MetadataFetch {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status),
            });
        }

        let xml = String::from_utf8(response.body).map_err(|e| UpdaterError::MetadataFormat {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        MavenMetadata::parse(url, &xml)
    }
}

fn require_versioning(url: &str, doc: MavenMetadata) -> UpdaterResult<Versioning> {
    doc.versioning.ok_or_else(|| UpdaterError::MetadataFormat {
        url: url.to_string(),
        reason: "missing <versioning>".to_string(),
    })
}

fn parse_or_warn(url: &str, text: &str) -> Option<Version> {
    let parsed = Version::parse(text);
    if parsed.is_none() {
        warn!("Skipping unparsable version '{}' from {}", text, url);
    }
    parsed
}
