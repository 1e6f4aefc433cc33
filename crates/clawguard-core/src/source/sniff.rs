//! Text/binary classification for ingest candidates.
//!
//! Two gates: an extension allow-list decides which paths are text
//! candidates at all, and a byte-level sniffer rejects candidates whose
//! content looks binary. The sniffer inspects at most the first 4 KiB.

/// Extensions that qualify a path as a text candidate.
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "sh", "bash", "zsh", "ps1", "py", "js", "mjs", "ts", "json", "toml",
    "yaml", "yml",
];

/// Extensions treated as nested archives for manifest flagging.
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "jar", "tar", "gz", "tgz", "7z"];

const SNIFF_WINDOW: usize = 4096;

/// True when the path's extension is on the text allow-list.
pub fn is_text_candidate(path: &str) -> bool {
    extension(path).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// True when the path's extension marks a nested archive.
pub fn is_archive_path(path: &str) -> bool {
    extension(path)
        .is_some_and(|ext| ARCHIVE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// True when `bytes` look binary: any NUL, or more than 20% of the
/// sniffed window in the control range (below TAB, or between CR and
/// space exclusive).
pub fn looks_binary(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    if window.is_empty() {
        return false;
    }

    let mut control = 0usize;
    for &b in window {
        if b == 0 {
            return true;
        }
        if b < 9 || (b > 13 && b < 32) {
            control += 1;
        }
    }

    control * 5 > window.len()
}

/// True when `bytes` carry the pkzip local-header magic.
pub fn looks_like_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04")
}

fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        // Dotfiles like `.env` have no extension.
        return None;
    }
    Some(ext)
}
