use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A semantic version as published on a Maven channel.
///
/// Maven versions are frequently shorter than three components
/// (`1.3-SNAPSHOT`, `1.3-20240101.120000-5`), so parsing pads missing
/// minor/patch numbers with zero. The text the repository used is kept
/// verbatim because artifact file names on the server are built from it.
///
/// Equality, ordering and hashing look at the parsed value only.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    parsed: semver::Version,
}

impl Version {
    /// Lenient parse: invalid text yields `None` rather than an error.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let parsed = parse_semver(text)?;
        Some(Self {
            raw: text.to_string(),
            parsed,
        })
    }

    /// The text exactly as the repository published it.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn semver(&self) -> &semver::Version {
        &self.parsed
    }

    /// `major.minor.patch` of the parsed value, tags dropped.
    pub fn major_minor_patch(&self) -> String {
        format!(
            "{}.{}.{}",
            self.parsed.major, self.parsed.minor, self.parsed.patch
        )
    }

    /// The numeric core as the repository spelled it (`1.3` for
    /// `1.3-20240101.120000-5`). Snapshot directories are named after it.
    pub fn release_core(&self) -> &str {
        split_core_and_suffix(&self.raw).0
    }

    pub fn is_snapshot_base(&self) -> bool {
        self.raw.ends_with("-SNAPSHOT")
    }
}

/// Strict semver first; otherwise pad a one or two component numeric core
/// with zeros and keep whatever tag follows it.
fn parse_semver(text: &str) -> Option<semver::Version> {
    if let Ok(parsed) = semver::Version::parse(text) {
        return Some(parsed);
    }

    let (core, tail) = split_core_and_suffix(text);
    let mut numbers = core
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if numbers.len() > 3 {
        return None;
    }
    numbers.resize(3, 0);

    semver::Version::parse(&format!(
        "{}.{}.{}{tail}",
        numbers[0], numbers[1], numbers[2]
    ))
    .ok()
}

/// `("1.3", "-20240101.120000-5")`: the numeric core and the tag after it.
fn split_core_and_suffix(text: &str) -> (&str, &str) {
    match text.find(['-', '+']) {
        Some(at) => text.split_at(at),
        None => (text, ""),
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.parsed == other.parsed
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parsed.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parsed.cmp(&other.parsed)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Version::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid version '{text}'")))
    }
}
