use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use crate::core::error::{UpdaterError, UpdaterResult};

const ROOT_ELEMENT: &str = "metadata";

/// `maven-metadata.xml`, both the channel form (one per artifact) and the
/// per-snapshot form (one per `-SNAPSHOT` directory). Everything is
/// optional here; the fetcher decides which parts are required.
#[derive(Debug, Deserialize, Default)]
pub struct MavenMetadata {
    #[serde(default)]
    pub versioning: Option<Versioning>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Versioning {
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub versions: Option<Versions>,
    #[serde(default)]
    pub snapshot: Option<Snapshot>,
    #[serde(default)]
    pub snapshot_versions: Option<SnapshotVersions>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Versions {
    #[serde(default, rename = "version")]
    pub items: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub build_number: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SnapshotVersions {
    #[serde(default, rename = "snapshotVersion")]
    pub items: Vec<SnapshotVersion>,
}

/// One `<snapshotVersion>` entry: a concrete file published for a snapshot.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct SnapshotVersion {
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub value: String,
}

impl SnapshotVersion {
    /// The main jar: extension `jar`, no classifier (sources/javadoc excluded).
    pub fn is_plain_jar(&self) -> bool {
        self.extension == "jar"
            && self
                .classifier
                .as_deref()
                .map_or(true, |c| c.trim().is_empty())
    }
}

impl MavenMetadata {
    /// Parse a metadata document fetched from `url`.
    ///
    /// Fails with `MetadataFormat` when the XML is not well formed or the
    /// root element is not `<metadata>`.
    pub fn parse(url: &str, xml: &str) -> UpdaterResult<Self> {
        let format_error = |reason: String| UpdaterError::MetadataFormat {
            url: url.to_string(),
            reason,
        };

        match root_element(xml).map_err(&format_error)? {
            Some(name) if name == ROOT_ELEMENT => {}
            Some(name) => {
                return Err(format_error(format!(
                    "expected <{ROOT_ELEMENT}> root, found <{name}>"
                )))
            }
            None => return Err(format_error("empty document".to_string())),
        }

        quick_xml::de::from_str(xml).map_err(|e| format_error(e.to_string()))
    }
}

/// Local name of the first element in the document, if any.
fn root_element(xml: &str) -> Result<Option<String>, String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                return Ok(Some(
                    String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                ))
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
}
