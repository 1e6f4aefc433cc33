//! Signal extraction from a bundle.
//!
//! Performs a pure structural mapping from loaded files and the
//! manifest to [`ScanSignal`]s. No policy or scoring logic lives here;
//! the strict boundary between extraction and interpretation is what
//! keeps rule evaluation data-driven.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::bundle::model::{ManifestEntry, SkillBundle, SkippedReason};
use crate::signals::model::{ScanSignal, SignalKind};

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s)'"<>\]]+"#).expect("url regex"));

static PATH_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(^|\s)((\./|\.\./|scripts/|bin/|assets/)[\w./-]+)").expect("path regex")
});

/// Extract all signals from a bundle, in a deterministic order:
/// per-file signals in file order, then manifest meta signals in
/// manifest order, then ingest-warning meta signals.
pub fn extract_signals(bundle: &SkillBundle) -> Vec<ScanSignal> {
    let mut signals = Vec::new();

    for file in &bundle.files {
        signals.push(
            ScanSignal::new(SignalKind::File, file.content.clone()).in_file(&file.path, 1),
        );

        if file.path.ends_with(".md") {
            extract_markdown_signals(&file.path, &file.content, &mut signals);
        }
    }

    for entry in &bundle.manifest {
        if let Some(text) = meta_signal_text(entry) {
            let mut signal = ScanSignal::new(SignalKind::Meta, text);
            signal.file = Some(entry.path.clone());
            signals.push(signal);
        }
    }

    for warning in &bundle.ingest_warnings {
        signals.push(ScanSignal::new(
            SignalKind::Meta,
            format!("ingest_warning: {warning}"),
        ));
    }

    signals
}

fn extract_markdown_signals(path: &str, content: &str, signals: &mut Vec<ScanSignal>) {
    signals.push(ScanSignal::new(SignalKind::Markdown, content.to_string()).in_file(path, 1));

    for fence in find_code_fences(content) {
        signals.push(
            ScanSignal::new(SignalKind::Codeblock, fence.text).in_file(path, fence.open_line),
        );
    }

    for m in URL_RE.find_iter(content) {
        let line = line_of_offset(content, m.start());
        signals.push(ScanSignal::new(SignalKind::Url, m.as_str()).in_file(path, line));
    }

    for caps in PATH_REF_RE.captures_iter(content) {
        let m = caps.get(2).expect("path capture");
        let line = line_of_offset(content, m.start());
        signals.push(ScanSignal::new(SignalKind::Path, m.as_str()).in_file(path, line));
    }
}

struct Fence {
    text: String,
    /// 1-based line of the opening ``` marker.
    open_line: u32,
}

/// Scan for fenced code blocks. A fence opens on a line starting with
/// three backticks (optionally followed by a language tag) and closes
/// on the next line starting with three backticks. An unclosed fence
/// runs to the end of the file.
fn find_code_fences(content: &str) -> Vec<Fence> {
    let mut fences = Vec::new();
    let mut open: Option<(u32, Vec<&str>)> = None;

    for (idx, line) in content.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        let is_marker = line.trim_start().starts_with("```");

        if is_marker {
            match open.take() {
                None => open = Some((line_no, Vec::new())),
                Some((start, body)) => fences.push(Fence {
                    text: body.join("\n"),
                    open_line: start,
                }),
            }
        } else if let Some((_, body)) = open.as_mut() {
            body.push(line);
        }
    }

    if let Some((start, body)) = open {
        fences.push(Fence {
            text: body.join("\n"),
            open_line: start,
        });
    }

    fences
}

/// 1-based line of a byte offset, by counting newlines in the prefix.
fn line_of_offset(content: &str, offset: usize) -> u32 {
    (content[..offset].bytes().filter(|&b| b == b'\n').count() + 1) as u32
}

/// The meta signal for a manifest entry, when it has a notable flag.
fn meta_signal_text(entry: &ManifestEntry) -> Option<String> {
    if entry.skipped_reason == Some(SkippedReason::InvalidPath) {
        let raw = entry.raw_path.as_deref().unwrap_or(&entry.path);
        return Some(format!("path_traversal_entry raw={raw}"));
    }
    if entry.is_symlink {
        return Some(format!("symlink_entry {}", entry.path));
    }
    if entry.is_archive {
        return Some(format!("nested_archive {}", entry.path));
    }
    if entry.is_binary {
        return Some(format!("binary_file {}", entry.path));
    }
    if entry.is_executable && !entry.is_directory {
        return Some(format!("executable_file {}", entry.path));
    }
    None
}
