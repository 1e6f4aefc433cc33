use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use clawguard_core::gate::{compose_stance, install_action, Mode};
use clawguard_core::hash::policy_sha256;
use clawguard_core::limits::Limits;
use clawguard_core::policy::eval::evaluate;
use clawguard_core::policy::model::{load_policy, parse_tool_call, Policy, Thresholds};
use clawguard_core::rules::pack::default_pack;
use clawguard_core::scan_source;
use clawguard_core::trust::{
    add_trust_record, load_trust_store, remove_trust_by_hash, trust_status_for_bundle,
    TrustRecord, TrustStatus,
};

mod args;
mod output;

use args::{Args, Command, PolicyCommand, PolicyFlavor, RulesCommand, TrustCommand};
use output::{install_reason, BundleSummary, IngestOutput, Receipt, ScanSourceOutput};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<i32> {
    match args.command {
        Command::ScanSource {
            source,
            mode,
            policy,
            timeout_ms,
            max_files,
            max_total_bytes,
            max_zip_bytes,
            trust_store,
        } => {
            let mut limits = Limits::default();
            if let Some(v) = timeout_ms {
                limits = limits.with_timeout_ms(v);
            }
            if let Some(v) = max_files {
                limits = limits.with_max_files(v);
            }
            if let Some(v) = max_total_bytes {
                limits = limits.with_max_total_bytes(v);
            }
            if let Some(v) = max_zip_bytes {
                limits = limits.with_max_zip_bytes(v);
            }
            cmd_scan_source(&source, mode.into(), policy, trust_store, &limits)
        }
        Command::EvalToolCall {
            stdin,
            mode,
            policy,
        } => cmd_eval_tool_call(stdin, mode.map(Into::into), policy),
        Command::Ingest {
            source,
            receipt_dir,
            policy,
        } => cmd_ingest(&source, receipt_dir, policy),
        Command::Trust { command } => cmd_trust(command),
        Command::Rules { command } => cmd_rules(command),
        Command::Policy { command } => cmd_policy(command),
    }
}

fn default_trust_store() -> PathBuf {
    PathBuf::from(".clawguard").join("trust.json")
}

fn default_receipt_dir() -> PathBuf {
    PathBuf::from(".clawguard").join("receipts")
}

fn load_policy_or_default(path: Option<&Path>) -> Result<Policy> {
    match path {
        Some(p) => {
            load_policy(p).with_context(|| format!("loading policy from {}", p.display()))
        }
        None => Ok(Policy::default()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    print!("{json}");
    Ok(())
}

fn cmd_scan_source(
    source: &str,
    mode: Mode,
    policy_path: Option<PathBuf>,
    trust_store: Option<PathBuf>,
    limits: &Limits,
) -> Result<i32> {
    let policy = load_policy_or_default(policy_path.as_deref())?;
    let (bundle, report) =
        scan_source(source, limits).with_context(|| format!("ingesting {source}"))?;

    let store_path = trust_store.unwrap_or_else(default_trust_store);
    let store = load_trust_store(&store_path);
    let trust = trust_status_for_bundle(&bundle, &store);

    let stance = compose_stance(&policy, mode, trust);
    let action = install_action(report.risk_score, stance.thresholds);
    let reason = install_reason(action, report.risk_score, stance.thresholds);

    print_json(&ScanSourceOutput {
        bundle: BundleSummary::new(&bundle),
        mode_requested: mode,
        mode_effective: stance.mode_effective,
        trust,
        trust_store: store_path.display().to_string(),
        action,
        policy_thresholds: stance.thresholds,
        reasons: vec![reason],
        report,
    })?;

    Ok(action.exit_code())
}

fn cmd_eval_tool_call(
    stdin: bool,
    mode: Option<Mode>,
    policy_path: Option<PathBuf>,
) -> Result<i32> {
    if !stdin {
        bail!("the tool call must be provided on stdin; pass --stdin");
    }

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading tool call from stdin")?;
    let call = parse_tool_call(&input)?;

    let policy = load_policy_or_default(policy_path.as_deref())?;
    let effective = match mode {
        // No bundle is in play here, so a trusted stance is an
        // operator assertion rather than a checked pin.
        Some(m) => {
            let trust = match m {
                Mode::Trusted => TrustStatus::Trusted,
                Mode::Untrusted => TrustStatus::Untrusted,
            };
            compose_stance(&policy, m, trust).policy
        }
        None => policy,
    };

    let decision = evaluate(&call, &effective);
    print_json(&decision)?;
    Ok(decision.action.exit_code())
}

fn cmd_ingest(
    source: &str,
    receipt_dir: Option<PathBuf>,
    policy_path: Option<PathBuf>,
) -> Result<i32> {
    let policy = load_policy_or_default(policy_path.as_deref())?;
    let limits = Limits::default();
    let (bundle, report) =
        scan_source(source, &limits).with_context(|| format!("ingesting {source}"))?;

    let stance = compose_stance(&policy, Mode::Untrusted, TrustStatus::Untrusted);
    let action = install_action(report.risk_score, stance.thresholds);

    let summary = BundleSummary::new(&bundle);
    let dir = receipt_dir.unwrap_or_else(default_receipt_dir);
    let receipt_path = dir.join(format!("{}.json", summary.content_sha256));

    let out = IngestOutput {
        action,
        receipt: Receipt {
            receipt_version: 1,
            created_at: chrono::Utc::now().to_rfc3339(),
            source_input: source.to_string(),
            bundle: summary,
            policy_sha256: policy_sha256(&policy),
            scan_report: report,
        },
        receipt_path: receipt_path.display().to_string(),
    };

    write_json_atomic(&receipt_path, &serde_json::json!({
        "action": out.action,
        "receipt": &out.receipt,
    }))?;
    print_json(&out)?;
    Ok(action.exit_code())
}

fn cmd_trust(command: TrustCommand) -> Result<i32> {
    let limits = Limits::default();
    match command {
        TrustCommand::Add {
            source,
            trust_store,
        } => {
            let (bundle, _) =
                scan_source(&source, &limits).with_context(|| format!("ingesting {source}"))?;
            let record = TrustRecord::for_bundle(&bundle, &source);
            let store_path = trust_store.unwrap_or_else(default_trust_store);
            let store = add_trust_record(&store_path, record.clone())
                .with_context(|| format!("writing {}", store_path.display()))?;

            print_json(&serde_json::json!({
                "added": record,
                "trust_store": store_path.display().to_string(),
                "records": store.records.len(),
            }))?;
            Ok(0)
        }
        TrustCommand::Check {
            source,
            trust_store,
        } => {
            let (bundle, _) =
                scan_source(&source, &limits).with_context(|| format!("ingesting {source}"))?;
            let store_path = trust_store.unwrap_or_else(default_trust_store);
            let store = load_trust_store(&store_path);
            let status = trust_status_for_bundle(&bundle, &store);
            let summary = BundleSummary::new(&bundle);

            print_json(&serde_json::json!({
                "trust": status,
                "content_sha256": summary.content_sha256,
                "manifest_sha256": summary.manifest_sha256,
                "trust_store": store_path.display().to_string(),
            }))?;
            Ok(0)
        }
        TrustCommand::List { trust_store } => {
            let store_path = trust_store.unwrap_or_else(default_trust_store);
            let store = load_trust_store(&store_path);
            print_json(&store)?;
            Ok(0)
        }
        TrustCommand::Remove {
            content_sha256,
            trust_store,
        } => {
            let store_path = trust_store.unwrap_or_else(default_trust_store);
            let removed = remove_trust_by_hash(&store_path, &content_sha256)
                .with_context(|| format!("writing {}", store_path.display()))?;
            print_json(&serde_json::json!({ "removed": removed }))?;
            Ok(0)
        }
    }
}

fn cmd_rules(command: RulesCommand) -> Result<i32> {
    let pack = default_pack();
    match command {
        RulesCommand::List => {
            print_json(&pack)?;
            Ok(0)
        }
        RulesCommand::Explain { id } => match pack.rule(&id) {
            Some(rule) => {
                print_json(rule)?;
                Ok(0)
            }
            None => bail!("no rule {id} in pack {} v{}", pack.pack_id, pack.pack_version),
        },
    }
}

fn cmd_policy(command: PolicyCommand) -> Result<i32> {
    match command {
        PolicyCommand::Init { path, mode } => {
            let target = path.unwrap_or_else(|| PathBuf::from("clawguard-policy.json"));
            let policy = match mode {
                PolicyFlavor::Default => starter_policy(),
                PolicyFlavor::Untrusted => {
                    compose_stance(&starter_policy(), Mode::Untrusted, TrustStatus::Untrusted)
                        .policy
                }
            };
            write_json_atomic(&target, &policy)?;
            print_json(&serde_json::json!({ "written": target.display().to_string() }))?;
            Ok(0)
        }
    }
}

fn starter_policy() -> Policy {
    Policy {
        thresholds: Some(Thresholds {
            scan_approve_at: Some(30),
            scan_deny_at: Some(60),
        }),
        ..Policy::default()
    }
}

/// Write UTF-8 JSON with a trailing newline via temp-file + rename.
fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming over {}", path.display()))?;
    Ok(())
}
