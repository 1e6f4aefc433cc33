//! The trust pin store.
//!
//! A pin attests that a specific content hash has been approved by a
//! human. The store is a flat JSON file, newest record first, capped
//! at 5000 pins, deduplicated by content hash, and always written via
//! temp-file + rename so readers never observe a torn write. A
//! missing, malformed, or version-mismatched store reads as empty
//! rather than failing the caller.

use std::fs;
use std::io;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bundle::model::SkillBundle;
use crate::hash::{content_sha256, manifest_sha256};

pub const TRUST_STORE_VERSION: u32 = 1;
pub const MAX_TRUST_RECORDS: usize = 5_000;

/// One pin: this exact content is approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRecord {
    pub content_sha256: String,

    /// When present, the pin also binds the manifest structure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_sha256: Option<String>,

    /// The raw source string the pin was created from.
    pub source_input: String,

    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl TrustRecord {
    /// Pin a bundle, binding both hashes.
    pub fn for_bundle(bundle: &SkillBundle, source_input: &str) -> Self {
        Self {
            content_sha256: content_sha256(bundle),
            manifest_sha256: Some(manifest_sha256(bundle)),
            source_input: source_input.to_string(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustStore {
    pub version: u32,
    pub records: Vec<TrustRecord>,
}

impl Default for TrustStore {
    fn default() -> Self {
        Self {
            version: TRUST_STORE_VERSION,
            records: Vec::new(),
        }
    }
}

/// Trust stance of a bundle against a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustStatus {
    Trusted,
    Untrusted,
}

/// Load a store. Missing file, parse failure, or a version mismatch
/// all yield an empty store; trust decisions fail closed on the
/// untrusted side, never crash.
pub fn load_trust_store(path: &Path) -> TrustStore {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return TrustStore::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "trust store unreadable; treating as empty");
            return TrustStore::default();
        }
    };

    match serde_json::from_slice::<TrustStore>(&bytes) {
        Ok(store) if store.version == TRUST_STORE_VERSION => store,
        Ok(store) => {
            warn!(
                path = %path.display(),
                version = store.version,
                "trust store version mismatch; treating as empty"
            );
            TrustStore::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "trust store malformed; treating as empty");
            TrustStore::default()
        }
    }
}

/// Add a pin: dedupe by content hash, newest first, cap to
/// [`MAX_TRUST_RECORDS`], atomic write.
pub fn add_trust_record(path: &Path, record: TrustRecord) -> io::Result<TrustStore> {
    let mut store = load_trust_store(path);
    store
        .records
        .retain(|r| r.content_sha256 != record.content_sha256);
    store.records.insert(0, record);
    store.records.truncate(MAX_TRUST_RECORDS);
    write_store(path, &store)?;
    Ok(store)
}

/// Remove every pin with the given content hash. Returns whether
/// anything was removed.
pub fn remove_trust_by_hash(path: &Path, content_hash: &str) -> io::Result<bool> {
    let mut store = load_trust_store(path);
    let before = store.records.len();
    store.records.retain(|r| r.content_sha256 != content_hash);
    let removed = store.records.len() != before;
    if removed {
        write_store(path, &store)?;
    }
    Ok(removed)
}

/// A bundle is trusted iff some record matches its content hash and
/// either carries no manifest hash or matches that too.
pub fn trust_status_for_bundle(bundle: &SkillBundle, store: &TrustStore) -> TrustStatus {
    let content = content_sha256(bundle);
    let manifest = manifest_sha256(bundle);

    let pinned = store.records.iter().any(|r| {
        r.content_sha256 == content
            && r.manifest_sha256
                .as_deref()
                .map_or(true, |m| m == manifest)
    });

    if pinned {
        TrustStatus::Trusted
    } else {
        TrustStatus::Untrusted
    }
}

/// Serialize with a trailing newline and rename over the target from a
/// temp file in the same directory.
fn write_store(path: &Path, store: &TrustStore) -> io::Result<()> {
    let mut json = serde_json::to_string_pretty(store)?;
    json.push('\n');

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)
}
