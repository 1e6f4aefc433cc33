pub mod bundle;
pub mod error;
pub mod gate;
pub mod hash;
pub mod limits;
pub mod policy;
pub mod report;
pub mod rules;
pub mod scan;
pub mod signals;
pub mod source;
pub mod trust;

#[cfg(test)]
pub(crate) mod testutil;

pub const TOOL_NAME: &str = "clawguard";

/// Version of every JSON contract this crate emits (bundle, report,
/// decision, policy). Bump only on a semantic wire change.
pub const API_VERSION: u32 = 1;

use bundle::model::SkillBundle;
use error::IngestError;
use limits::Limits;
use report::model::ScanReport;
use rules::pack::default_pack;

/// Ingest a source and scan it with the built-in rule pack.
///
/// Convenience composition of the install pipeline; callers that need
/// a custom pack or the intermediate signals use the modules directly.
pub fn scan_source(raw: &str, limits: &Limits) -> Result<(SkillBundle, ScanReport), IngestError> {
    let bundle = source::ingest::build_bundle_from_source(raw, limits)?;
    let report = scan::run::scan_bundle(&bundle, &default_pack());
    Ok((bundle, report))
}
