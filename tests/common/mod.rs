#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify, Semaphore};

use quiltflower_updater::{
    ArtifactCache, DownloadCoordinator, HttpResponse, MetadataFetcher, Settings, SettingsStore,
    Transport, TransportError, UpdateObserver, UpdaterError, UpdaterResult, Version,
    VersionCatalog, VersionResolver,
};

pub const RELEASE: &str = "https://maven.test/release/org/quiltmc/quiltflower/";
pub const SNAPSHOT: &str = "https://maven.test/snapshot/org/quiltmc/quiltflower/";

pub fn v(text: &str) -> Version {
    Version::parse(text).unwrap()
}

pub fn channel_xml(latest: &str, versions: &[&str]) -> String {
    let versions: String = versions
        .iter()
        .map(|v| format!("<version>{v}</version>"))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <metadata><groupId>org.quiltmc</groupId><artifactId>quiltflower</artifactId>\
         <versioning><latest>{latest}</latest><versions>{versions}</versions>\
         <lastUpdated>20240101120000</lastUpdated></versioning></metadata>"
    )
}

pub fn snapshot_xml(timestamp: &str, build: &str, values: &[&str]) -> String {
    let entries: String = values
        .iter()
        .map(|value| {
            format!(
                "<snapshotVersion><classifier>sources</classifier><extension>jar</extension>\
                 <value>{value}</value></snapshotVersion>\
                 <snapshotVersion><extension>jar</extension><value>{value}</value></snapshotVersion>\
                 <snapshotVersion><extension>pom</extension><value>{value}</value></snapshotVersion>"
            )
        })
        .collect();
    format!(
        "<metadata modelVersion=\"1.1.0\"><versioning>\
         <snapshot><timestamp>{timestamp}</timestamp><buildNumber>{build}</buildNumber></snapshot>\
         <snapshotVersions>{entries}</snapshotVersions></versioning></metadata>"
    )
}

#[derive(Clone)]
struct Resource {
    status: u16,
    body: Vec<u8>,
    etag: Option<String>,
}

/// In-memory Maven repository.
///
/// Unknown URLs answer 404, URLs marked with `fail` fail at the transport
/// level. Jar requests can be held open with `hold_jars` until permits are
/// released.
#[derive(Default)]
pub struct MockRepo {
    resources: Mutex<HashMap<String, Resource>>,
    failing: Mutex<HashSet<String>>,
    requests: Mutex<Vec<(String, Option<String>)>>,
    body_transfers: AtomicUsize,
    jar_in_flight: AtomicUsize,
    jar_max_in_flight: AtomicUsize,
    jar_gate: Mutex<Option<Arc<Semaphore>>>,
    pub jar_requested: Notify,
}

impl MockRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Release 1.0.0..1.2.0 plus snapshot 1.3-SNAPSHOT resolving to
    /// 1.3-20240101.120000-5, with jars for 1.2.0 and the snapshot build.
    pub fn standard() -> Arc<Self> {
        let repo = Self::new();
        repo.serve(
            &format!("{RELEASE}maven-metadata.xml"),
            channel_xml("1.2.0", &["1.0.0", "1.1.0", "1.2.0"]),
        );
        repo.serve(
            &format!("{SNAPSHOT}maven-metadata.xml"),
            channel_xml("1.3-SNAPSHOT", &["1.3-SNAPSHOT"]),
        );
        repo.serve(
            &format!("{SNAPSHOT}1.3-SNAPSHOT/maven-metadata.xml"),
            snapshot_xml("20240101.120000", "5", &["1.3-20240101.120000-5"]),
        );
        repo.serve_jar(&release_jar("1.1.0"), b"jar 1.1.0", Some("\"etag-110\""));
        repo.serve_jar(&release_jar("1.2.0"), b"jar 1.2.0", Some("\"etag-120\""));
        repo.serve_jar(
            &format!("{SNAPSHOT}1.3-SNAPSHOT/quiltflower-1.3-20240101.120000-5.jar"),
            b"jar snapshot",
            Some("\"etag-snap\""),
        );
        repo
    }

    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.insert(url, 200, body.into(), None);
    }

    pub fn serve_jar(&self, url: &str, body: &[u8], etag: Option<&str>) {
        self.insert(url, 200, body.to_vec(), etag.map(str::to_owned));
    }

    pub fn serve_status(&self, url: &str, status: u16) {
        self.insert(url, status, Vec::new(), None);
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    fn insert(&self, url: &str, status: u16, body: Vec<u8>, etag: Option<String>) {
        self.resources
            .lock()
            .unwrap()
            .insert(url.to_string(), Resource { status, body, etag });
    }

    /// Park every jar request until `release_jars` hands out permits.
    pub fn hold_jars(&self) {
        *self.jar_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_jars(&self, count: usize) {
        if let Some(gate) = self.jar_gate.lock().unwrap().as_ref() {
            gate.add_permits(count);
        }
    }

    pub fn body_transfers(&self) -> usize {
        self.body_transfers.load(Ordering::SeqCst)
    }

    pub fn jar_max_in_flight(&self) -> usize {
        self.jar_max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn jar_requests(&self) -> Vec<(String, Option<String>)> {
        self.requests()
            .into_iter()
            .filter(|(url, _)| url.ends_with(".jar"))
            .collect()
    }

    async fn respond(&self, url: &str, if_none_match: Option<&str>) -> Result<HttpResponse, TransportError> {
        if url.ends_with(".jar") {
            let now = self.jar_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.jar_max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.jar_requested.notify_one();

            let gate = self.jar_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
        }

        if self.failing.lock().unwrap().contains(url) {
            return Err(TransportError {
                url: url.to_string(),
                message: "connection refused".to_string(),
            });
        }

        let resource = self.resources.lock().unwrap().get(url).cloned();
        let Some(resource) = resource else {
            return Ok(HttpResponse {
                status: 404,
                ..Default::default()
            });
        };

        if resource.status == 200
            && if_none_match.is_some()
            && if_none_match == resource.etag.as_deref()
        {
            return Ok(HttpResponse {
                status: 304,
                etag: resource.etag,
                body: Vec::new(),
            });
        }

        if resource.status == 200 {
            self.body_transfers.fetch_add(1, Ordering::SeqCst);
        }
        Ok(HttpResponse {
            status: resource.status,
            etag: resource.etag,
            body: resource.body,
        })
    }
}

pub fn release_jar(version: &str) -> String {
    format!("{RELEASE}{version}/quiltflower-{version}.jar")
}

#[async_trait]
impl Transport for MockRepo {
    async fn get(
        &self,
        url: &str,
        if_none_match: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), if_none_match.map(str::to_owned)));
        let result = self.respond(url, if_none_match).await;
        if url.ends_with(".jar") {
            self.jar_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        result
    }
}

/// Settings kept in memory; records every selection the coordinator saves.
pub struct MemoryStore {
    settings: Mutex<Settings>,
    pub saved: Mutex<Vec<Option<Version>>>,
}

impl MemoryStore {
    pub fn new(settings: Settings) -> Arc<Self> {
        Arc::new(Self {
            settings: Mutex::new(settings),
            saved: Mutex::new(Vec::new()),
        })
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    fn save_selected_version(&self, version: Option<&Version>) -> UpdaterResult<()> {
        self.settings.lock().unwrap().selected_version = version.cloned();
        self.saved.lock().unwrap().push(version.cloned());
        Ok(())
    }
}

pub fn test_settings() -> Settings {
    Settings {
        release_base_url: RELEASE.to_string(),
        snapshot_base_url: SNAPSHOT.to_string(),
        ..Settings::default()
    }
}

#[derive(Debug)]
pub enum Event {
    Loaded(VersionCatalog),
    Success(PathBuf),
    Failure { concurrent: bool, message: String },
    Error(String),
}

pub struct RecordingObserver {
    tx: mpsc::UnboundedSender<Event>,
}

impl RecordingObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl UpdateObserver for RecordingObserver {
    fn on_versions_loaded(&self, catalog: &VersionCatalog) {
        let _ = self.tx.send(Event::Loaded(catalog.clone()));
    }

    fn on_download_success(&self, path: &Path) {
        let _ = self.tx.send(Event::Success(path.to_path_buf()));
    }

    fn on_download_failure(&self, error: &UpdaterError) {
        let _ = self.tx.send(Event::Failure {
            concurrent: matches!(error, UpdaterError::ConcurrentDownload { .. }),
            message: error.to_string(),
        });
    }

    fn on_error(&self, error: &UpdaterError) {
        let _ = self.tx.send(Event::Error(error.to_string()));
    }
}

pub fn resolver(repo: &Arc<MockRepo>) -> VersionResolver {
    VersionResolver::new(MetadataFetcher::new(repo.clone()))
}

pub fn coordinator(
    repo: &Arc<MockRepo>,
    jars: &Path,
    store: Arc<MemoryStore>,
    observer: Arc<RecordingObserver>,
) -> DownloadCoordinator {
    let cache = ArtifactCache::new(jars, repo.clone());
    DownloadCoordinator::new(resolver(repo), cache, store, observer)
}

/// Next observer event, failing the test instead of hanging.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for coordinator event")
        .expect("observer channel closed")
}

/// Assert no further event arrives within a short window.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Event>) {
    let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(extra.is_err(), "unexpected event: {:?}", extra);
}

pub fn jar_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

pub fn jars_dir(root: &Path) -> PathBuf {
    root.join("quiltflower").join("jars")
}
