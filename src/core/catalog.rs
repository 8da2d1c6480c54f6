use std::collections::BTreeSet;

use futures_util::future::try_join_all;
use tracing::{debug, info, warn};

use crate::core::error::UpdaterResult;
use crate::core::maven::{MetadataFetcher, SnapshotSubversion};
use crate::core::version::Version;

/// Every version known across the release and snapshot channels.
///
/// Built in one go by [`VersionResolver::build_catalog`] and never mutated
/// afterwards; a refresh produces a new catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionCatalog {
    pub latest_release: Option<Version>,
    pub latest_snapshot: Option<Version>,
    pub all_releases: BTreeSet<Version>,
    /// Concrete timestamped builds, never `-SNAPSHOT` placeholders.
    pub all_snapshots: BTreeSet<Version>,
}

impl VersionCatalog {
    pub fn is_release(&self, version: &Version) -> bool {
        self.all_releases.contains(version)
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.is_release(version) || self.all_snapshots.contains(version)
    }

    /// Releases and snapshots merged, newest first.
    pub fn versions_newest_first(&self) -> Vec<&Version> {
        let mut all: Vec<&Version> = self
            .all_releases
            .iter()
            .chain(self.all_snapshots.iter())
            .collect();
        all.sort_by(|a, b| b.cmp(a));
        all.dedup();
        all
    }
}

/// The version to make active after a catalog load.
///
/// With `auto_update` set, follows the newest release, or the newest
/// snapshot when `enable_snapshots` is also set. Otherwise `current` is kept.
pub fn select_version(
    catalog: &VersionCatalog,
    enable_snapshots: bool,
    auto_update: bool,
    current: Option<&Version>,
) -> Option<Version> {
    if !auto_update {
        return current.cloned();
    }
    if enable_snapshots {
        catalog.latest_snapshot.clone()
    } else {
        catalog.latest_release.clone()
    }
}

/// Combines both channels into a [`VersionCatalog`].
#[derive(Clone)]
pub struct VersionResolver {
    fetcher: MetadataFetcher,
}

impl VersionResolver {
    pub fn new(fetcher: MetadataFetcher) -> Self {
        Self { fetcher }
    }

    /// One channel fetch per base URL, then one subversion fetch per snapshot
    /// base version. Any failure fails the whole build.
    pub async fn build_catalog(
        &self,
        release_base_url: &str,
        snapshot_base_url: &str,
    ) -> UpdaterResult<VersionCatalog> {
        let (releases, snapshots) = tokio::try_join!(
            self.fetcher.fetch_channel_metadata(release_base_url),
            self.fetcher.fetch_channel_metadata(snapshot_base_url),
        )?;

        let mut bases = snapshots.all.clone();
        if let Some(latest) = &snapshots.latest {
            bases.insert(latest.clone());
        }

        let resolved = try_join_all(bases.iter().map(|base| async move {
            let sub = self
                .fetcher
                .fetch_snapshot_subversion(snapshot_base_url, base)
                .await?;
            UpdaterResult::Ok((base, sub))
        }))
        .await?;

        let mut all_snapshots = BTreeSet::new();
        let mut latest_snapshot = None;
        for (base, sub) in resolved {
            if snapshots.latest.as_ref() == Some(base) {
                latest_snapshot = resolve_label(base, &sub);
            }
            all_snapshots.extend(sub.artifact_values.iter().filter_map(|value| {
                let parsed = Version::parse(value);
                if parsed.is_none() {
                    warn!("Dropping unparsable snapshot build '{}' of {}", value, base);
                }
                parsed
            }));
        }

        let catalog = VersionCatalog {
            latest_release: releases.latest,
            latest_snapshot,
            all_releases: releases.all,
            all_snapshots,
        };

        info!(
            "Loaded version catalog: {} releases (latest {:?}), {} snapshot builds (latest {:?})",
            catalog.all_releases.len(),
            catalog.latest_release.as_ref().map(Version::as_str),
            catalog.all_snapshots.len(),
            catalog.latest_snapshot.as_ref().map(Version::as_str),
        );
        Ok(catalog)
    }
}

fn resolve_label(base: &Version, sub: &SnapshotSubversion) -> Option<Version> {
    let resolved = Version::parse(&sub.resolved_label);
    if resolved.is_none() {
        warn!(
            "Snapshot {} resolved to unparsable build '{}'",
            base, sub.resolved_label
        );
    } else {
        debug!("Snapshot {} resolves to {}", base, sub.resolved_label);
    }
    resolved
}
