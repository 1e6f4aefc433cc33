//! Content, manifest, and policy hashing.
//!
//! These hashes are the trust-pin keys and the receipt keys. Each one
//! feeds a canonical byte stream into SHA-256: entries sorted by path,
//! fields separated by newlines, so that any byte change in any loaded
//! file (or any structural change in the manifest) changes the hash.

use sha2::{Digest, Sha256};

use crate::bundle::model::{ManifestEntry, SkillBundle};
use crate::policy::model::Policy;

/// Hex SHA-256 over the loaded file contents, keyed by path.
pub fn content_sha256(bundle: &SkillBundle) -> String {
    let mut files: Vec<_> = bundle.files.iter().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.path.as_bytes());
        hasher.update(b"\n");
        hasher.update(file.content.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Hex SHA-256 over the manifest structure, keyed by path.
pub fn manifest_sha256(bundle: &SkillBundle) -> String {
    let mut entries: Vec<_> = bundle.manifest.iter().collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(manifest_entry_line(entry).as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn manifest_entry_line(entry: &ManifestEntry) -> String {
    let skipped = entry
        .skipped_reason
        .map(|r| {
            serde_json::to_string(&r)
                .unwrap_or_default()
                .trim_matches('"')
                .to_string()
        })
        .unwrap_or_default();
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
        entry.path,
        entry.size_bytes,
        flag(entry.is_directory),
        flag(entry.is_symlink),
        flag(entry.is_executable),
        flag(entry.is_binary),
        flag(entry.is_archive),
        skipped,
    )
}

fn flag(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

/// Hex SHA-256 of the canonical JSON serialization of a policy.
pub fn policy_sha256(policy: &Policy) -> String {
    let json = serde_json::to_vec(policy).unwrap_or_default();
    hex::encode(Sha256::digest(&json))
}
