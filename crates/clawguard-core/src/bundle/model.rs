//! In-memory representation of an ingested skill source.
//!
//! A [`SkillBundle`] is produced once by ingest and is read-only from
//! then on: the scanner, the hasher, and the trust check all consume it
//! without mutation. Loaded text lives in `files`; `manifest` describes
//! everything the ingest saw, including entries it refused to load.

use serde::{Deserialize, Serialize};

/// Where a source came from, as inferred from the raw input string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Local,
    Registry,
    Git,
    Clawhub,
    Unknown,
}

/// Container the manifest entry was discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Dir,
    Zip,
}

/// Why an entry was seen but not loaded as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkippedReason {
    InvalidPath,
    SymlinkSkipped,
    TooLarge,
    BinaryFile,
    UnsupportedCompression,
    Unreadable,
}

/// One loaded text file.
///
/// `path` is relative, forward-slash normalized, and never contains
/// `.` or `..` components; ingest guarantees this before construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleFile {
    pub path: String,
    pub content: String,
}

/// One entry of everything the ingest observed in the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,

    /// Original name when the sanitized path differs (rejected entries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_path: Option<String>,

    pub size_bytes: u64,
    pub is_directory: bool,
    pub is_symlink: bool,
    pub is_executable: bool,
    pub is_binary: bool,
    pub is_archive: bool,
    pub source_kind: SourceKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<SkippedReason>,
}

impl ManifestEntry {
    /// A plain entry with all flags cleared.
    pub fn new(path: impl Into<String>, size_bytes: u64, source_kind: SourceKind) -> Self {
        Self {
            path: path.into(),
            raw_path: None,
            size_bytes,
            is_directory: false,
            is_symlink: false,
            is_executable: false,
            is_binary: false,
            is_archive: false,
            source_kind,
            skipped_reason: None,
        }
    }
}

/// The ingested representation of a skill source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillBundle {
    /// Stable identifier: basename, URL, or `owner/slug`.
    pub id: String,

    pub source: SourceTag,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Logical path of the skill manifest markdown.
    pub entrypoint: String,

    /// Loaded text files, in discovery order.
    pub files: Vec<BundleFile>,

    /// Everything seen in the source, in discovery order.
    pub manifest: Vec<ManifestEntry>,

    /// Human-readable explanations of cap hits, in emission order.
    pub ingest_warnings: Vec<String>,
}

impl SkillBundle {
    /// Look up a loaded file by its normalized path.
    pub fn file(&self, path: &str) -> Option<&BundleFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Total bytes of loaded text content.
    pub fn loaded_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.content.len() as u64).sum()
    }
}
