//! Source ingest: turn a directory, local archive, or URL into a
//! [`SkillBundle`].
//!
//! Everything in this module is bounded by [`Limits`] and nothing is
//! ever executed: files are read, sniffed, and either loaded as text
//! or recorded in the manifest with a skip reason. Soft failures stay
//! inside the bundle as warnings; only structural failures (unreadable
//! archive, transport failure, oversized source) abort.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::bundle::model::{
    BundleFile, ManifestEntry, SkillBundle, SkippedReason, SourceKind, SourceTag,
};
use crate::error::IngestError;
use crate::limits::Limits;
use crate::source::archive::{Archive, Extracted};
use crate::source::sniff;
use crate::source::transport;

const MAX_WALK_DEPTH: usize = 8;
const SKIPPED_DIR_NAMES: &[&str] = &[".git", "node_modules", "dist", "build", ".pnpm"];
const ENTRYPOINT: &str = "SKILL.md";

/// Build a bundle from a raw source string.
///
/// `http://` and `https://` prefixes select URL mode; anything else is
/// treated as a filesystem path. A path that resolves to a regular
/// file is treated as an archive.
pub fn build_bundle_from_source(raw: &str, limits: &Limits) -> Result<SkillBundle, IngestError> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return ingest_url(raw, limits);
    }

    let path = Path::new(raw);
    let meta = fs::metadata(path).map_err(|_| IngestError::SourceMissing(raw.to_string()))?;

    if meta.is_dir() {
        ingest_dir(path, limits)
    } else {
        if meta.len() > limits.max_zip_bytes {
            return Err(IngestError::SourceTooLarge {
                max_bytes: limits.max_zip_bytes,
            });
        }
        let bytes = fs::read(path)?;
        let id = basename(raw);
        ingest_archive_bytes(&bytes, id, SourceTag::Local, limits)
    }
}

fn ingest_url(url: &str, limits: &Limits) -> Result<SkillBundle, IngestError> {
    let body = transport::fetch_url(url, limits)?;
    let tag = source_tag_for_url(url);

    let is_archive = body
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("zip"))
        || sniff::looks_like_zip(&body.bytes);

    if is_archive {
        return ingest_archive_bytes(&body.bytes, url.to_string(), tag, limits);
    }

    if sniff::looks_binary(&body.bytes) {
        return Err(IngestError::BinaryBody);
    }

    // A plain text body is taken to be a single skill manifest.
    let content = String::from_utf8_lossy(&body.bytes).into_owned();
    let size = content.len() as u64;
    Ok(SkillBundle {
        id: url.to_string(),
        source: tag,
        version: None,
        entrypoint: ENTRYPOINT.to_string(),
        files: vec![BundleFile {
            path: ENTRYPOINT.to_string(),
            content,
        }],
        manifest: vec![ManifestEntry::new(ENTRYPOINT, size, SourceKind::Dir)],
        ingest_warnings: vec![],
    })
}

fn source_tag_for_url(url: &str) -> SourceTag {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()));
    match host.as_deref() {
        Some(h) if h.contains("clawhub") => SourceTag::Clawhub,
        Some(h) if h.contains("github") || h.contains("gitlab") => SourceTag::Git,
        Some(_) => SourceTag::Unknown,
        None => SourceTag::Unknown,
    }
}

fn basename(raw: &str) -> String {
    Path::new(raw)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| raw.to_string())
}

// ---------------------------------------------------------------------------
// Directory ingest
// ---------------------------------------------------------------------------

struct WalkState {
    files: Vec<BundleFile>,
    manifest: Vec<ManifestEntry>,
    warnings: Vec<String>,
    total_bytes: u64,
    /// Set once maxFiles or maxTotalBytes is hit, after the warning.
    manifest_full: bool,
    loading_stopped: bool,
}

fn ingest_dir(root: &Path, limits: &Limits) -> Result<SkillBundle, IngestError> {
    let mut state = WalkState {
        files: Vec::new(),
        manifest: Vec::new(),
        warnings: Vec::new(),
        total_bytes: 0,
        manifest_full: false,
        loading_stopped: false,
    };

    walk_dir(root, "", 0, limits, &mut state)?;
    debug!(
        files = state.files.len(),
        manifest = state.manifest.len(),
        total_bytes = state.total_bytes,
        "directory ingest complete"
    );

    Ok(SkillBundle {
        id: basename(&root.to_string_lossy()),
        source: SourceTag::Local,
        version: None,
        entrypoint: ENTRYPOINT.to_string(),
        files: state.files,
        manifest: state.manifest,
        ingest_warnings: state.warnings,
    })
}

fn walk_dir(
    dir: &Path,
    rel_prefix: &str,
    depth: usize,
    limits: &Limits,
    state: &mut WalkState,
) -> Result<(), IngestError> {
    let mut entries: Vec<_> = match fs::read_dir(dir) {
        Ok(iter) => iter.filter_map(|e| e.ok()).collect(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "unreadable directory skipped");
            return Ok(());
        }
    };
    // Directory iteration order is OS-dependent; sort for determinism.
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        // Each iteration records at most one manifest entry, so the
        // cap check up front also bounds loaded files.
        if !ensure_manifest_capacity(state, limits) {
            return Ok(());
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if rel_prefix.is_empty() {
            name.clone()
        } else {
            format!("{rel_prefix}/{name}")
        };

        let Ok(meta) = entry.path().symlink_metadata() else {
            continue;
        };

        if meta.file_type().is_symlink() {
            if !push_manifest(state, limits, symlink_entry(&rel)) {
                return Ok(());
            }
            continue;
        }

        if meta.is_dir() {
            if SKIPPED_DIR_NAMES.contains(&name.as_str()) {
                continue;
            }
            let mut dir_entry = ManifestEntry::new(rel.clone(), 0, SourceKind::Dir);
            dir_entry.is_directory = true;
            if !push_manifest(state, limits, dir_entry) {
                return Ok(());
            }
            if depth + 1 < MAX_WALK_DEPTH {
                walk_dir(&entry.path(), &rel, depth + 1, limits, state)?;
            }
            continue;
        }

        let size = meta.len();
        let mut m = ManifestEntry::new(rel.clone(), size, SourceKind::Dir);
        m.is_executable = is_executable(&meta);
        m.is_archive = sniff::is_archive_path(&rel);

        if !sniff::is_text_candidate(&rel) {
            m.is_binary = true;
            if !push_manifest(state, limits, m) {
                return Ok(());
            }
            continue;
        }

        if size > limits.max_file_bytes {
            state.warnings.push(format!(
                "skipped {rel}: exceeds maxFileBytes ({})",
                limits.max_file_bytes
            ));
            m.skipped_reason = Some(SkippedReason::TooLarge);
            if !push_manifest(state, limits, m) {
                return Ok(());
            }
            continue;
        }

        if state.loading_stopped {
            if !push_manifest(state, limits, m) {
                return Ok(());
            }
            continue;
        }

        if state.total_bytes.saturating_add(size) > limits.max_total_bytes {
            state
                .warnings
                .push(format!("maxTotalBytes reached ({})", limits.max_total_bytes));
            state.loading_stopped = true;
            if !push_manifest(state, limits, m) {
                return Ok(());
            }
            continue;
        }

        match fs::read(entry.path()) {
            Ok(bytes) => {
                if sniff::looks_binary(&bytes) {
                    m.is_binary = true;
                } else {
                    match String::from_utf8(bytes) {
                        Ok(content) => {
                            state.total_bytes += size;
                            state.files.push(BundleFile {
                                path: rel.clone(),
                                content,
                            });
                        }
                        Err(_) => m.is_binary = true,
                    }
                }
            }
            Err(e) => {
                warn!(path = %rel, error = %e, "unreadable file skipped");
                m.skipped_reason = Some(SkippedReason::Unreadable);
            }
        }

        if !push_manifest(state, limits, m) {
            return Ok(());
        }
    }

    Ok(())
}

fn symlink_entry(rel: &str) -> ManifestEntry {
    let mut m = ManifestEntry::new(rel, 0, SourceKind::Dir);
    m.is_symlink = true;
    m.skipped_reason = Some(SkippedReason::SymlinkSkipped);
    m
}

/// True while the manifest is under the maxFiles cap. Emits the
/// warning exactly once when the cap is hit.
fn ensure_manifest_capacity(state: &mut WalkState, limits: &Limits) -> bool {
    if state.manifest.len() >= limits.max_files {
        if !state.manifest_full {
            state
                .warnings
                .push(format!("maxFiles reached ({})", limits.max_files));
            state.manifest_full = true;
        }
        return false;
    }
    true
}

/// Push a manifest entry under the maxFiles cap. Returns false once
/// the cap is hit.
fn push_manifest(state: &mut WalkState, limits: &Limits, entry: ManifestEntry) -> bool {
    if !ensure_manifest_capacity(state, limits) {
        return false;
    }
    state.manifest.push(entry);
    true
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}

// ---------------------------------------------------------------------------
// Archive ingest
// ---------------------------------------------------------------------------

fn ingest_archive_bytes(
    bytes: &[u8],
    id: String,
    source: SourceTag,
    limits: &Limits,
) -> Result<SkillBundle, IngestError> {
    if bytes.len() as u64 > limits.max_zip_bytes {
        return Err(IngestError::SourceTooLarge {
            max_bytes: limits.max_zip_bytes,
        });
    }

    let archive = Archive::parse(bytes)?;
    let mut state = WalkState {
        files: Vec::new(),
        manifest: Vec::new(),
        warnings: Vec::new(),
        total_bytes: 0,
        manifest_full: false,
        loading_stopped: false,
    };

    for entry in archive.entries() {
        let mut m = ManifestEntry::new(entry.name.clone(), entry.uncompressed_size, SourceKind::Zip);
        m.is_directory = entry.is_directory;
        m.is_symlink = entry.is_symlink();
        m.is_executable = !entry.is_directory && entry.is_executable();
        m.is_archive = sniff::is_archive_path(&entry.name);
        if m.is_symlink {
            m.skipped_reason = Some(SkippedReason::SymlinkSkipped);
        } else if entry.uncompressed_size > limits.max_zip_entry_bytes {
            state.warnings.push(format!(
                "skipped {}: exceeds maxFileBytes ({})",
                entry.name, limits.max_zip_entry_bytes
            ));
            m.skipped_reason = Some(SkippedReason::TooLarge);
        }
        if !push_manifest(&mut state, limits, m) {
            break;
        }
    }

    for raw in archive.invalid_paths() {
        let mut m = ManifestEntry::new(raw.clone(), 0, SourceKind::Zip);
        m.raw_path = Some(raw.clone());
        m.skipped_reason = Some(SkippedReason::InvalidPath);
        if !push_manifest(&mut state, limits, m) {
            break;
        }
    }

    let selected =
        archive.select_for_scan(limits.max_zip_entry_bytes, limits.max_total_bytes, limits.max_files);

    for entry in selected {
        let outcome = match archive.extract(entry, limits.max_zip_entry_bytes) {
            Ok(o) => o,
            Err(e) => {
                warn!(entry = %entry.name, error = %e, "entry extraction failed");
                set_skipped(&mut state, &entry.name, SkippedReason::Unreadable);
                continue;
            }
        };

        match outcome {
            Extracted::Unsupported(method) => {
                debug!(entry = %entry.name, method, "unsupported compression method");
                set_skipped(&mut state, &entry.name, SkippedReason::UnsupportedCompression);
            }
            Extracted::Bytes(data) => {
                if sniff::looks_binary(&data) {
                    mark_binary(&mut state, &entry.name);
                    continue;
                }
                match String::from_utf8(data) {
                    Ok(content) => state.files.push(BundleFile {
                        path: entry.name.clone(),
                        content,
                    }),
                    Err(_) => mark_binary(&mut state, &entry.name),
                }
            }
        }
    }

    Ok(SkillBundle {
        id,
        source,
        version: None,
        entrypoint: ENTRYPOINT.to_string(),
        files: state.files,
        manifest: state.manifest,
        ingest_warnings: state.warnings,
    })
}

fn set_skipped(state: &mut WalkState, path: &str, reason: SkippedReason) {
    if let Some(m) = state.manifest.iter_mut().find(|m| m.path == path) {
        m.skipped_reason = Some(reason);
    }
}

fn mark_binary(state: &mut WalkState, path: &str) {
    if let Some(m) = state.manifest.iter_mut().find(|m| m.path == path) {
        m.is_binary = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::zip::ZipBuilder;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &[u8]) {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn ingest(dir: &TempDir) -> SkillBundle {
        build_bundle_from_source(dir.path().to_str().unwrap(), &Limits::default()).unwrap()
    }

    #[test]
    fn loads_text_files_and_lists_manifest() {
        let dir = TempDir::new().unwrap();
        write(&dir, "SKILL.md", b"# skill");
        write(&dir, "scripts/run.sh", b"echo hi");

        let bundle = ingest(&dir);
        assert_eq!(bundle.files.len(), 2);
        assert!(bundle.file("SKILL.md").is_some());
        assert!(bundle.file("scripts/run.sh").is_some());
        // scripts dir itself plus two files
        assert_eq!(bundle.manifest.len(), 3);
        assert!(bundle.ingest_warnings.is_empty());
    }

    #[test]
    fn paths_are_relative_and_traversal_free() {
        let dir = TempDir::new().unwrap();
        write(&dir, "SKILL.md", b"# skill");
        write(&dir, "a/b/c.md", b"deep");

        let bundle = ingest(&dir);
        for f in &bundle.files {
            assert!(!f.path.starts_with('/'));
            assert!(!f.path.split('/').any(|s| s == "." || s == ".."));
        }
    }

    #[test]
    fn walk_order_is_deterministic() {
        let dir = TempDir::new().unwrap();
        write(&dir, "z.md", b"z");
        write(&dir, "a.md", b"a");
        write(&dir, "m.md", b"m");

        let a = ingest(&dir);
        let b = ingest(&dir);
        let paths: Vec<&str> = a.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "m.md", "z.md"]);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn vendored_directories_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "SKILL.md", b"# skill");
        write(&dir, "node_modules/pkg/index.js", b"junk");
        write(&dir, ".git/config", b"junk");

        let bundle = ingest(&dir);
        assert_eq!(bundle.files.len(), 1);
        assert!(bundle.manifest.iter().all(|m| !m.path.starts_with("node_modules")));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_listed_but_never_loaded() {
        let dir = TempDir::new().unwrap();
        write(&dir, "real.md", b"content");
        std::os::unix::fs::symlink(dir.path().join("real.md"), dir.path().join("link.md")).unwrap();

        let bundle = ingest(&dir);
        assert_eq!(bundle.files.len(), 1);
        let link = bundle.manifest.iter().find(|m| m.path == "link.md").unwrap();
        assert!(link.is_symlink);
        assert_eq!(link.skipped_reason, Some(SkippedReason::SymlinkSkipped));
    }

    #[test]
    fn non_text_extensions_are_binary_in_manifest() {
        let dir = TempDir::new().unwrap();
        write(&dir, "SKILL.md", b"# skill");
        write(&dir, "payload.dylib", &[0u8, 1, 2, 3]);

        let bundle = ingest(&dir);
        assert_eq!(bundle.files.len(), 1);
        let dylib = bundle.manifest.iter().find(|m| m.path == "payload.dylib").unwrap();
        assert!(dylib.is_binary);
    }

    #[test]
    fn binary_sniffed_candidates_are_dropped() {
        let dir = TempDir::new().unwrap();
        let mut fake_md = vec![0u8; 64];
        fake_md[0] = b'#';
        write(&dir, "fake.md", &fake_md);

        let bundle = ingest(&dir);
        assert!(bundle.files.is_empty());
        assert!(bundle.manifest.iter().find(|m| m.path == "fake.md").unwrap().is_binary);
    }

    #[test]
    fn max_files_cap_emits_warning_and_stops() {
        let dir = TempDir::new().unwrap();
        for i in 0..10 {
            write(&dir, &format!("f{i:02}.md"), b"x");
        }

        let limits = Limits::default().with_max_files(5);
        let bundle =
            build_bundle_from_source(dir.path().to_str().unwrap(), &limits).unwrap();
        assert_eq!(bundle.manifest.len(), 5);
        assert!(bundle.files.len() <= 5);
        assert!(bundle
            .ingest_warnings
            .iter()
            .any(|w| w == "maxFiles reached (5)"));
    }

    #[test]
    fn oversized_file_is_skipped_with_warning() {
        let dir = TempDir::new().unwrap();
        write(&dir, "SKILL.md", b"# ok");
        write(&dir, "huge.md", &vec![b'x'; 2_000]);

        let limits = Limits::default().with_max_file_bytes(1_000);
        let bundle =
            build_bundle_from_source(dir.path().to_str().unwrap(), &limits).unwrap();
        assert!(bundle.file("huge.md").is_none());
        assert!(bundle
            .ingest_warnings
            .iter()
            .any(|w| w == "skipped huge.md: exceeds maxFileBytes (1000)"));
        let entry = bundle.manifest.iter().find(|m| m.path == "huge.md").unwrap();
        assert_eq!(entry.skipped_reason, Some(SkippedReason::TooLarge));
    }

    #[test]
    fn total_bytes_cap_stops_loading() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            write(&dir, &format!("f{i}.md"), &vec![b'x'; 4_000]);
        }

        let limits = Limits::default().with_max_total_bytes(10_000);
        let bundle =
            build_bundle_from_source(dir.path().to_str().unwrap(), &limits).unwrap();
        assert!(bundle.loaded_bytes() <= 10_000);
        assert!(bundle
            .ingest_warnings
            .iter()
            .any(|w| w == "maxTotalBytes reached (10000)"));
        // Everything is still listed.
        assert_eq!(bundle.manifest.len(), 5);
    }

    #[test]
    fn missing_source_is_a_hard_error() {
        let err =
            build_bundle_from_source("/definitely/not/here", &Limits::default()).unwrap_err();
        assert!(matches!(err, IngestError::SourceMissing(_)));
    }

    #[test]
    fn archive_file_is_ingested_as_zip() {
        let dir = TempDir::new().unwrap();
        let zip = ZipBuilder::new()
            .file("SKILL.md", b"# zipped skill")
            .file("scripts/tool.py", b"print('hi')")
            .build();
        write(&dir, "skill.zip", &zip);

        let bundle = build_bundle_from_source(
            dir.path().join("skill.zip").to_str().unwrap(),
            &Limits::default(),
        )
        .unwrap();

        assert_eq!(bundle.id, "skill.zip");
        assert_eq!(bundle.files.len(), 2);
        assert!(bundle.manifest.iter().all(|m| m.source_kind == SourceKind::Zip));
    }

    #[test]
    fn traversal_archive_entry_is_quarantined() {
        let dir = TempDir::new().unwrap();
        let zip = ZipBuilder::new()
            .file("SKILL.md", b"# clean")
            .file("../SKILL.md", b"# evil")
            .build();
        write(&dir, "skill.zip", &zip);

        let bundle = build_bundle_from_source(
            dir.path().join("skill.zip").to_str().unwrap(),
            &Limits::default(),
        )
        .unwrap();

        assert_eq!(bundle.files.len(), 1);
        assert_eq!(bundle.files[0].path, "SKILL.md");
        let bad = bundle
            .manifest
            .iter()
            .find(|m| m.skipped_reason == Some(SkippedReason::InvalidPath))
            .expect("invalid path entry");
        assert_eq!(bad.raw_path.as_deref(), Some("../SKILL.md"));
    }

    #[test]
    fn binary_archive_entry_is_flagged_not_loaded() {
        let dir = TempDir::new().unwrap();
        let zip = ZipBuilder::new()
            .file("SKILL.md", b"# clean")
            .file("bin/payload.dylib", &[0u8, 1, 2, 3, 0, 5])
            .build();
        write(&dir, "skill.zip", &zip);

        let bundle = build_bundle_from_source(
            dir.path().join("skill.zip").to_str().unwrap(),
            &Limits::default(),
        )
        .unwrap();

        assert_eq!(bundle.files.len(), 1);
        let dylib = bundle
            .manifest
            .iter()
            .find(|m| m.path == "bin/payload.dylib")
            .unwrap();
        assert!(dylib.is_binary);
        assert!(!dylib.is_directory);
    }

    #[test]
    fn archive_symlink_is_never_extracted() {
        let dir = TempDir::new().unwrap();
        let zip = ZipBuilder::new()
            .file("SKILL.md", b"# clean")
            .symlink("evil.md", b"/etc/passwd")
            .build();
        write(&dir, "skill.zip", &zip);

        let bundle = build_bundle_from_source(
            dir.path().join("skill.zip").to_str().unwrap(),
            &Limits::default(),
        )
        .unwrap();

        assert_eq!(bundle.files.len(), 1);
        let link = bundle.manifest.iter().find(|m| m.path == "evil.md").unwrap();
        assert!(link.is_symlink);
        assert_eq!(link.skipped_reason, Some(SkippedReason::SymlinkSkipped));
    }

    #[test]
    fn unsupported_compression_is_soft_skipped() {
        let dir = TempDir::new().unwrap();
        let zip = ZipBuilder::new()
            .file("SKILL.md", b"# clean")
            .with_method("odd.md", b"data", 99)
            .build();
        write(&dir, "skill.zip", &zip);

        let bundle = build_bundle_from_source(
            dir.path().join("skill.zip").to_str().unwrap(),
            &Limits::default(),
        )
        .unwrap();

        assert_eq!(bundle.files.len(), 1);
        let odd = bundle.manifest.iter().find(|m| m.path == "odd.md").unwrap();
        assert_eq!(odd.skipped_reason, Some(SkippedReason::UnsupportedCompression));
    }

    #[test]
    fn oversized_archive_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        let zip = ZipBuilder::new().file("SKILL.md", b"# ok").build();
        write(&dir, "skill.zip", &zip);

        let mut limits = Limits::default();
        limits.max_zip_bytes = 10; // below any real archive
        let err = build_bundle_from_source(
            dir.path().join("skill.zip").to_str().unwrap(),
            &limits,
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::SourceTooLarge { .. }));
    }

    #[test]
    fn garbage_archive_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "skill.zip", b"not actually a zip at all");

        let err = build_bundle_from_source(
            dir.path().join("skill.zip").to_str().unwrap(),
            &Limits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::Archive(_)));
    }

    #[test]
    fn url_source_tags() {
        assert_eq!(source_tag_for_url("https://clawhub.dev/a/b.zip"), SourceTag::Clawhub);
        assert_eq!(source_tag_for_url("https://github.com/a/b.zip"), SourceTag::Git);
        assert_eq!(source_tag_for_url("https://example.com/x.zip"), SourceTag::Unknown);
    }
}
