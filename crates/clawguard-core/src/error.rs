//! Error kinds for the clawguard core.
//!
//! The split mirrors the failure boundaries of the pipeline: transport,
//! archive parsing, ingest, policy loading, and tool-call input. Soft
//! failures inside ingest (a file that cannot be read, an unsupported
//! compression method, a path that fails sanitization) never surface
//! here; they become manifest `skipped_reason`s or ingest warnings.

use thiserror::Error;

/// Failure while fetching bytes from a URL.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("response body exceeds {max_bytes} bytes")]
    ByteCapExceeded { max_bytes: u64 },

    #[error("server returned HTTP {status}")]
    Status { status: u16 },

    #[error("transport failure: {0}")]
    Other(String),
}

/// Failure while parsing an archive. Any of these aborts the whole
/// archive; per-entry problems are reported as diagnostics instead.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("end of central directory not found")]
    MissingEocd,

    #[error("archive truncated: {0}")]
    Truncated(&'static str),

    #[error("bad signature in {0}")]
    BadSignature(&'static str),

    #[error("entry exceeds extraction cap of {cap} bytes")]
    EntryTooLarge { cap: u64 },

    #[error("deflate failure: {0}")]
    Deflate(String),
}

/// Hard ingest failure: no bundle can be produced from the source.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("source not found: {0}")]
    SourceMissing(String),

    #[error("source exceeds maxZipBytes ({max_bytes})")]
    SourceTooLarge { max_bytes: u64 },

    #[error("remote body is binary and not an archive")]
    BinaryBody,

    #[error("failed to read source: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while loading a policy file from disk.
#[derive(Debug, Error)]
pub enum PolicyLoadError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("policy is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported policy api_version {0}")]
    Version(u32),
}

/// Failure while parsing a tool call from JSON input.
#[derive(Debug, Error)]
pub enum ToolCallInputError {
    #[error("tool call is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("tool call is missing tool_name")]
    MissingToolName,
}
