pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::cache::{ArtifactCache, CachedArtifact};
pub use crate::core::catalog::{select_version, VersionCatalog, VersionResolver};
pub use crate::core::config::{AppPaths, HttpConfig, JsonSettingsStore, Settings, SettingsStore};
pub use crate::core::coordinator::{
    CoordinatorHandle, DownloadCoordinator, DownloadSession, Phase, UpdateObserver,
};
pub use crate::core::error::{TransportError, UpdaterError, UpdaterResult};
pub use crate::core::http::{HttpResponse, ReqwestTransport, Transport};
pub use crate::core::maven::{ChannelMetadata, MetadataFetcher, SnapshotSubversion};
pub use crate::core::version::Version;

/// Install the structured logging subscriber. `RUST_LOG` overrides the
/// default filter. Calling it more than once is harmless.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,quiltflower_updater=debug")),
        )
        .try_init();
}
