//! Refresh/download orchestration.
//!
//! A [`DownloadCoordinator`] is a single task that owns the
//! [`DownloadSession`]. Network work (catalog build, jar download) runs on
//! separate worker tasks which report back to the coordinator over its
//! command channel, so selection state and observer callbacks only ever
//! happen on the coordinator task.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use quiltflower_updater::core::coordinator::*;
//! # async fn demo(coordinator: DownloadCoordinator) -> quiltflower_updater::core::error::UpdaterResult<()> {
//! let (handle, task) = coordinator.spawn();
//! handle.refresh()?;
//! let session = handle.session().await?;
//! println!("phase: {}", session.phase);
//! handle.shutdown();
//! let _ = task.await;
//! # Ok(())
//! # }
//! ```

mod session;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::cache::ArtifactCache;
use crate::core::catalog::{select_version, VersionCatalog, VersionResolver};
use crate::core::config::{AppPaths, SettingsStore};
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::http::{ReqwestTransport, Transport};
use crate::core::maven::MetadataFetcher;
use crate::core::version::Version;

pub use session::{DownloadSession, Phase};

/// Receives the outcome of coordinator cycles. Called on the coordinator
/// task, one call per outcome.
pub trait UpdateObserver: Send + Sync {
    fn on_versions_loaded(&self, _catalog: &VersionCatalog) {}

    fn on_download_success(&self, _path: &Path) {}

    fn on_download_failure(&self, _error: &UpdaterError) {}

    /// Catalog refresh failed or was rejected because one is in flight.
    fn on_error(&self, _error: &UpdaterError) {}
}

enum Command {
    Refresh,
    Download,
    Select(Version),
    CatalogLoaded {
        cycle: u64,
        result: UpdaterResult<VersionCatalog>,
    },
    DownloadFinished {
        cycle: u64,
        version: Version,
        result: UpdaterResult<PathBuf>,
    },
    Session(oneshot::Sender<DownloadSession>),
    Shutdown,
}

/// Cheap, cloneable front end to a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl CoordinatorHandle {
    /// Reload the catalog, apply the auto-update policy and download the
    /// selected version.
    pub fn refresh(&self) -> UpdaterResult<()> {
        self.send(Command::Refresh)
    }

    /// Download the currently selected version using the loaded catalog.
    pub fn download(&self) -> UpdaterResult<()> {
        self.send(Command::Download)
    }

    /// Make `version` the active version and download it.
    pub fn select_version(&self, version: Version) -> UpdaterResult<()> {
        self.send(Command::Select(version))
    }

    pub async fn session(&self) -> UpdaterResult<DownloadSession> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Session(tx))?;
        rx.await.map_err(|_| UpdaterError::CoordinatorClosed)
    }

    /// Stop the coordinator. In-flight workers finish but their results are
    /// dropped.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }

    fn send(&self, command: Command) -> UpdaterResult<()> {
        self.tx
            .send(command)
            .map_err(|_| UpdaterError::CoordinatorClosed)
    }
}

/// Owns the download session and sequences refresh/download cycles.
pub struct DownloadCoordinator {
    resolver: VersionResolver,
    cache: ArtifactCache,
    settings: Arc<dyn SettingsStore>,
    observer: Arc<dyn UpdateObserver>,
    session: DownloadSession,
    next_cycle: u64,
    tx: mpsc::UnboundedSender<Command>,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl DownloadCoordinator {
    pub fn new(
        resolver: VersionResolver,
        cache: ArtifactCache,
        settings: Arc<dyn SettingsStore>,
        observer: Arc<dyn UpdateObserver>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            resolver,
            cache,
            settings,
            observer,
            session: DownloadSession::default(),
            next_cycle: 0,
            tx,
            rx,
        }
    }

    /// Wire a coordinator against the real network, caching jars under
    /// `paths.jars_dir()`.
    pub fn with_defaults(
        settings: Arc<dyn SettingsStore>,
        paths: &AppPaths,
        observer: Arc<dyn UpdateObserver>,
    ) -> UpdaterResult<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(ReqwestTransport::from_config(&settings.load().http)?);
        let resolver = VersionResolver::new(MetadataFetcher::new(transport.clone()));
        let cache = ArtifactCache::new(paths.jars_dir(), transport);
        Ok(Self::new(resolver, cache, settings, observer))
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run on a new task. Requires a Tokio runtime.
    pub fn spawn(self) -> (CoordinatorHandle, JoinHandle<()>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    /// Process commands until [`CoordinatorHandle::shutdown`].
    pub async fn run(mut self) {
        let selected = self.settings.load().selected_version;
        let downloaded = match &selected {
            Some(version) => self.cache.lookup(version).await,
            None => None,
        };
        if let Some(path) = &downloaded {
            debug!("Using previously cached jar {:?}", path);
        }
        self.session = DownloadSession::new(selected, downloaded);

        info!("Download coordinator started");

        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Shutdown => break,
                Command::Refresh => self.start_refresh(),
                Command::Download => self.start_download(),
                Command::Select(version) => self.apply_selection(version).await,
                Command::CatalogLoaded { cycle, result } => {
                    self.catalog_loaded(cycle, result).await
                }
                Command::DownloadFinished {
                    cycle,
                    version,
                    result,
                } => self.download_finished(cycle, version, result),
                Command::Session(reply) => {
                    let _ = reply.send(self.session.clone());
                }
            }
        }

        info!("Download coordinator stopped");
    }

    fn start_refresh(&mut self) {
        if self.session.refreshing {
            let error = UpdaterError::RefreshInProgress;
            warn!("Rejecting refresh: {}", error);
            self.observer.on_error(&error);
            return;
        }

        let cycle = self.new_cycle();
        self.session.refreshing = true;
        self.session.phase = Phase::FetchingCatalog;

        let settings = self.settings.load();
        let resolver = self.resolver.clone();
        debug!("Cycle {}: fetching catalog", cycle);

        spawn_stage(
            self.tx.clone(),
            async move {
                resolver
                    .build_catalog(&settings.release_base_url, &settings.snapshot_base_url)
                    .await
            },
            move |result| Command::CatalogLoaded { cycle, result },
        );
    }

    async fn catalog_loaded(&mut self, cycle: u64, result: UpdaterResult<VersionCatalog>) {
        self.session.refreshing = false;

        let catalog = match result {
            Ok(catalog) => catalog,
            Err(error) => {
                warn!("Cycle {}: failed to load versions: {}", cycle, error);
                self.session.phase = Phase::Failed;
                self.observer.on_error(&error);
                return;
            }
        };

        self.session.phase = Phase::SelectingVersion;
        self.observer.on_versions_loaded(&catalog);

        let settings = self.settings.load();
        let selected = select_version(
            &catalog,
            settings.enable_snapshots,
            settings.auto_update,
            self.session.selected.as_ref(),
        );
        self.session.catalog = Some(Arc::new(catalog));
        self.set_selected(selected).await;

        if !settings.enabled {
            debug!("Cycle {}: updater disabled, skipping download", cycle);
            self.session.phase = Phase::Done;
            return;
        }
        if self.session.selected.is_none() {
            info!("Cycle {}: no version available to download", cycle);
            self.session.phase = Phase::Done;
            return;
        }
        self.start_download();
    }

    async fn apply_selection(&mut self, version: Version) {
        self.set_selected(Some(version)).await;
        self.start_download();
    }

    /// Change the selection and persist it. The store is written on the
    /// blocking pool; the coordinator waits for it so saves stay ordered.
    async fn set_selected(&mut self, selected: Option<Version>) {
        if self.session.selected == selected {
            return;
        }
        info!(
            "Selected version changed: {:?} -> {:?}",
            self.session.selected.as_ref().map(Version::as_str),
            selected.as_ref().map(Version::as_str)
        );
        self.session.selected = selected.clone();
        self.session.downloaded = None;

        let settings = self.settings.clone();
        let saved =
            tokio::task::spawn_blocking(move || settings.save_selected_version(selected.as_ref()))
                .await;
        match saved {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to persist selected version: {}", e),
            Err(e) => warn!("Settings writer did not finish: {}", e),
        }
    }

    fn start_download(&mut self) {
        let Some(version) = self.session.selected.clone() else {
            self.reject_download(UpdaterError::NotReady("no version selected".into()));
            return;
        };
        let Some(catalog) = self.session.catalog.clone() else {
            self.reject_download(UpdaterError::NotReady("version catalog not loaded".into()));
            return;
        };

        if self.session.downloading {
            self.reject_download(UpdaterError::ConcurrentDownload {
                version: version.to_string(),
            });
            return;
        }

        let cycle = self.new_cycle();
        self.session.downloading = true;
        self.session.phase = Phase::Downloading;

        let settings = self.settings.load();
        let cache = self.cache.clone();
        let started = version.clone();
        debug!("Cycle {}: downloading {}", cycle, version);

        spawn_stage(
            self.tx.clone(),
            async move {
                cache
                    .ensure_downloaded(
                        &started,
                        &catalog,
                        &settings.release_base_url,
                        &settings.snapshot_base_url,
                    )
                    .await
            },
            move |result| Command::DownloadFinished {
                cycle,
                version,
                result,
            },
        );
    }

    /// Report a download trigger that never started. The phase only moves to
    /// `Failed` when no other stage is running.
    fn reject_download(&mut self, error: UpdaterError) {
        warn!("Rejecting download: {}", error);
        if !self.session.refreshing && !self.session.downloading {
            self.session.phase = Phase::Failed;
        }
        self.observer.on_download_failure(&error);
    }

    fn download_finished(&mut self, cycle: u64, version: Version, result: UpdaterResult<PathBuf>) {
        self.session.downloading = false;

        match result {
            Err(error) => {
                warn!("Cycle {}: download of {} failed: {}", cycle, version, error);
                self.session.phase = Phase::Failed;
                self.observer.on_download_failure(&error);
            }
            Ok(path) => {
                self.session.phase = Phase::Done;
                if !self.session.is_current(&version) {
                    warn!(
                        "Cycle {}: discarding {} download, selection moved to {:?}",
                        cycle,
                        version,
                        self.session.selected.as_ref().map(Version::as_str)
                    );
                    return;
                }
                info!("Cycle {}: {} ready at {:?}", cycle, version, path);
                self.session.downloaded = Some(path.clone());
                self.observer.on_download_success(&path);
            }
        }
    }

    fn new_cycle(&mut self) -> u64 {
        self.next_cycle += 1;
        self.next_cycle
    }
}

/// Run `work` on its own task and post its result back as a command.
///
/// A panicking or aborted worker still produces a command (carrying
/// `UpdaterError::Worker`), so every cycle reaches a terminal phase.
fn spawn_stage<T, F, W>(tx: mpsc::UnboundedSender<Command>, work: F, wrap: W)
where
    T: Send + 'static,
    F: Future<Output = UpdaterResult<T>> + Send + 'static,
    W: FnOnce(UpdaterResult<T>) -> Command + Send + 'static,
{
    tokio::spawn(async move {
        let result = match tokio::spawn(work).await {
            Ok(result) => result,
            Err(e) => Err(UpdaterError::Worker(e.to_string())),
        };
        if tx.send(wrap(result)).is_err() {
            debug!("Coordinator stopped before a worker reported back");
        }
    });
}
