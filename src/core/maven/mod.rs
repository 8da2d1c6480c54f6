mod fetcher;
mod metadata;

pub use fetcher::{ChannelMetadata, MetadataFetcher, SnapshotSubversion};
pub use metadata::{MavenMetadata, SnapshotVersion};

/// Quiltflower channels on the Quilt Maven.
pub const QUILT_RELEASE_CHANNEL: &str =
    "https://maven.quiltmc.org/repository/release/org/quiltmc/quiltflower/";
pub const QUILT_SNAPSHOT_CHANNEL: &str =
    "https://maven.quiltmc.org/repository/snapshot/org/quiltmc/quiltflower/";

pub const METADATA_FILE: &str = "maven-metadata.xml";
pub const ARTIFACT_ID: &str = "quiltflower";

/// Join a channel base URL and a relative path with exactly one `/`.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
