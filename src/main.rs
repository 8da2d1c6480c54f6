use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::error;

use quiltflower_updater::{
    init_logging, AppPaths, DownloadCoordinator, JsonSettingsStore, Phase, Settings,
    SettingsStore, UpdateObserver, UpdaterError, UpdaterResult, Version, VersionCatalog,
};

enum Outcome {
    VersionsLoaded(usize),
    Ready(PathBuf),
    Failed(String),
}

/// Forwards coordinator callbacks to `main`.
struct ChannelObserver {
    tx: mpsc::UnboundedSender<Outcome>,
}

impl UpdateObserver for ChannelObserver {
    fn on_versions_loaded(&self, catalog: &VersionCatalog) {
        for version in catalog.versions_newest_first() {
            println!("  {version}");
        }
        let _ = self.tx.send(Outcome::VersionsLoaded(
            catalog.all_releases.len() + catalog.all_snapshots.len(),
        ));
    }

    fn on_download_success(&self, path: &Path) {
        let _ = self.tx.send(Outcome::Ready(path.to_path_buf()));
    }

    fn on_download_failure(&self, error: &UpdaterError) {
        let _ = self.tx.send(Outcome::Failed(error.to_string()));
    }

    fn on_error(&self, error: &UpdaterError) {
        let _ = self.tx.send(Outcome::Failed(error.to_string()));
    }
}

/// Settings with the version given on the command line pinned for this run.
/// Nothing about the pin is written back.
struct PinnedVersion {
    inner: JsonSettingsStore,
    version: Version,
}

impl SettingsStore for PinnedVersion {
    fn load(&self) -> Settings {
        Settings {
            auto_update: false,
            selected_version: Some(self.version.clone()),
            ..self.inner.load()
        }
    }

    fn save_selected_version(&self, _version: Option<&Version>) -> UpdaterResult<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let paths = AppPaths::new();
    let persisted = JsonSettingsStore::open(paths.settings_file());

    let store: Arc<dyn SettingsStore> = match std::env::args().nth(1) {
        Some(arg) => match Version::parse(&arg) {
            Some(version) => Arc::new(PinnedVersion {
                inner: persisted,
                version,
            }),
            None => {
                eprintln!("invalid version: {arg}");
                return ExitCode::FAILURE;
            }
        },
        None => Arc::new(persisted),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let observer = Arc::new(ChannelObserver { tx });

    let coordinator = match DownloadCoordinator::with_defaults(store, &paths, observer) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            error!("Cannot start updater: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let (handle, task) = coordinator.spawn();

    let code = if handle.refresh().is_err() {
        ExitCode::FAILURE
    } else {
        loop {
            let Some(outcome) = rx.recv().await else {
                break ExitCode::FAILURE;
            };
            match outcome {
                Outcome::VersionsLoaded(count) => {
                    println!("{count} versions available");
                    // Disabled updater or empty catalog: no download follows.
                    // A download that already finished has queued its outcome.
                    match handle.session().await {
                        Ok(session) if session.phase == Phase::Done => {
                            if let Ok(Outcome::Ready(path)) = rx.try_recv() {
                                println!("{}", path.display());
                            } else {
                                println!("nothing to download");
                            }
                            break ExitCode::SUCCESS;
                        }
                        Ok(_) => {}
                        Err(_) => break ExitCode::FAILURE,
                    }
                }
                Outcome::Ready(path) => {
                    println!("{}", path.display());
                    break ExitCode::SUCCESS;
                }
                Outcome::Failed(message) => {
                    eprintln!("error: {message}");
                    break ExitCode::FAILURE;
                }
            }
        }
    };

    handle.shutdown();
    let _ = task.await;
    code
}
