use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by the HTTP seam before any status code is available
/// (DNS, refused connection, broken body stream).
#[derive(Debug, Clone, Error)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

/// Central error type for the updater.
/// Every module returns `Result<T, UpdaterError>`.
#[derive(Debug, Error)]
pub enum UpdaterError {
    // ── Metadata ────────────────────────────────────────
    #[error("Metadata unreachable at {url}: {reason}")]
    MetadataFetch { url: String, reason: String },

    #[error("Malformed metadata at {url}: {reason}")]
    MetadataFormat { url: String, reason: String },

    // ── Artifact ────────────────────────────────────────
    #[error("Download failed for {url}: HTTP {status}")]
    Download { url: String, status: u16 },

    #[error("A download is already in flight (requested {version})")]
    ConcurrentDownload { version: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Coordinator ─────────────────────────────────────
    #[error("Background worker did not finish: {0}")]
    Worker(String),

    #[error("A version refresh is already in flight")]
    RefreshInProgress,

    #[error("Nothing to download: {0}")]
    NotReady(String),

    #[error("Download coordinator is no longer running")]
    CoordinatorClosed,
}

/// Convenience alias used throughout the crate.
pub type UpdaterResult<T> = Result<T, UpdaterError>;

impl UpdaterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UpdaterError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures caused by the remote side or the network, which a
    /// caller may reasonably retry with a fresh refresh cycle.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            UpdaterError::MetadataFetch { .. }
                | UpdaterError::Download { .. }
                | UpdaterError::Transport(_)
                | UpdaterError::Http(_)
        )
    }
}

// Hosts forward errors to their UI over IPC as plain strings.
impl serde::Serialize for UpdaterError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_classification() {
        let fetch = UpdaterError::MetadataFetch {
            url: "u".into(),
            reason: "refused".into(),
        };
        let format = UpdaterError::MetadataFormat {
            url: "u".into(),
            reason: "no versioning".into(),
        };
        let busy = UpdaterError::ConcurrentDownload {
            version: "1.0.0".into(),
        };
        assert!(fetch.is_network());
        assert!(!format.is_network());
        assert!(!busy.is_network());
    }

    #[test]
    fn serializes_as_display_string() {
        let err = UpdaterError::Download {
            url: "https://example.invalid/a.jar".into(),
            status: 404,
        };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(
            json,
            "\"Download failed for https://example.invalid/a.jar: HTTP 404\""
        );
    }
}
