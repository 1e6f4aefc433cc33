//! Typed slices of ingested content fed to the rule engine.

use serde::{Deserialize, Serialize};

/// Discriminates which rules may match a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Full text of a markdown file.
    Markdown,
    /// Inner text of a fenced code block.
    Codeblock,
    /// A single URL occurrence.
    Url,
    /// A loose path-like reference.
    Path,
    /// Full text of any loaded file.
    File,
    /// A fact derived from the manifest or ingest warnings.
    Meta,
}

/// One input to the rule engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSignal {
    pub kind: SignalKind,
    pub text: String,

    /// Bundle path the signal came from, when it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// 1-based line in `file` where `text` begins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_line: Option<u32>,
}

impl ScanSignal {
    pub fn new(kind: SignalKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            file: None,
            base_line: None,
        }
    }

    pub fn in_file(mut self, file: impl Into<String>, base_line: u32) -> Self {
        self.file = Some(file.into());
        self.base_line = Some(base_line);
        self
    }
}
