use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use clawguard_core::gate::Mode;

#[derive(Debug, Parser)]
#[command(
    name = "clawguard",
    version,
    about = "Deterministic install gate and tool-call policy for agent skills"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Untrusted,
    Trusted,
}

impl From<ModeArg> for Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Untrusted => Mode::Untrusted,
            ModeArg::Trusted => Mode::Trusted,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyFlavor {
    Default,
    Untrusted,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest a source, scan it, and print the install decision.
    ScanSource {
        /// Directory, archive file, or http(s) URL.
        source: String,

        /// Runtime stance to compose (trusted requires a pinned bundle).
        #[arg(long, value_enum, default_value = "untrusted")]
        mode: ModeArg,

        /// Policy JSON path; built-in default when absent.
        #[arg(long)]
        policy: Option<PathBuf>,

        #[arg(long)]
        timeout_ms: Option<u64>,

        #[arg(long)]
        max_files: Option<usize>,

        #[arg(long)]
        max_total_bytes: Option<u64>,

        #[arg(long)]
        max_zip_bytes: Option<u64>,

        /// Trust store path; defaults to ./.clawguard/trust.json.
        #[arg(long)]
        trust_store: Option<PathBuf>,
    },

    /// Read a ToolCall JSON object on stdin and print a Decision.
    EvalToolCall {
        /// Required: the tool call is always read from stdin.
        #[arg(long)]
        stdin: bool,

        /// Compose a stance before evaluating; the policy is used
        /// as-is when absent.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        #[arg(long)]
        policy: Option<PathBuf>,
    },

    /// Ingest a source and write a scan receipt keyed by content hash.
    Ingest {
        source: String,

        /// Receipt directory; defaults to ./.clawguard/receipts.
        #[arg(long)]
        receipt_dir: Option<PathBuf>,

        #[arg(long)]
        policy: Option<PathBuf>,
    },

    /// Manage trust pins.
    Trust {
        #[command(subcommand)]
        command: TrustCommand,
    },

    /// Inspect the built-in rule pack.
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },

    /// Policy file helpers.
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum TrustCommand {
    /// Pin a source's current content.
    Add {
        source: String,

        #[arg(long)]
        trust_store: Option<PathBuf>,
    },

    /// Report whether a source's current content is pinned.
    Check {
        source: String,

        #[arg(long)]
        trust_store: Option<PathBuf>,
    },

    /// List all pins.
    List {
        #[arg(long)]
        trust_store: Option<PathBuf>,
    },

    /// Remove pins by content hash.
    Remove {
        content_sha256: String,

        #[arg(long)]
        trust_store: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// Print the whole rule pack.
    List,

    /// Print one rule by id.
    Explain { id: String },
}

#[derive(Debug, Subcommand)]
pub enum PolicyCommand {
    /// Write a starter policy JSON.
    Init {
        /// Output path; defaults to ./clawguard-policy.json.
        #[arg(long)]
        path: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "default")]
        mode: PolicyFlavor,
    },
}
