use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::catalog::VersionCatalog;
use crate::core::version::Version;

/// Where the most recent refresh/download cycle currently stands.
///
/// A trigger rejected because a refresh or download is already in flight is
/// reported to the observer but leaves the running cycle's phase alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    FetchingCatalog,
    SelectingVersion,
    Downloading,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::FetchingCatalog => "fetching-catalog",
            Phase::SelectingVersion => "selecting-version",
            Phase::Downloading => "downloading",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Coordinator state. Only the coordinator task mutates it; callers get
/// clones through `CoordinatorHandle::session`.
#[derive(Debug, Clone, Default)]
pub struct DownloadSession {
    pub selected: Option<Version>,
    /// A catalog fetch is in flight.
    pub refreshing: bool,
    /// A jar download is in flight.
    pub downloading: bool,
    /// Local jar of `selected`, once a download for it has been published.
    pub downloaded: Option<PathBuf>,
    pub phase: Phase,
    pub catalog: Option<Arc<VersionCatalog>>,
}

impl DownloadSession {
    pub(crate) fn new(selected: Option<Version>, downloaded: Option<PathBuf>) -> Self {
        Self {
            selected,
            downloaded,
            ..Default::default()
        }
    }

    /// True when a result for `version` may still be published.
    pub fn is_current(&self, version: &Version) -> bool {
        self.selected.as_ref() == Some(version)
    }
}
