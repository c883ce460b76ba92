use tracing::info;

use crate::correlate::{
    Correlation, Strategy, correlate_by_position, correlate_by_sequence, merge_companion_log,
    union_by_sequence,
};
use crate::record::Origin;

use super::{AnalysisError, Run, TracePaths};

/// Capture pipeline. Formats are inferred from the file names; companion
/// receiver logs fill the log hop of the matching capture.
pub(super) fn correlate(run: &mut Run<'_>, paths: &TracePaths) -> Result<Correlation, AnalysisError> {
    let send = match &paths.send {
        Some(path) => Some(run.read_required(path, Origin::Send, None)?),
        None => None,
    };
    let mut src = run.read_required(&paths.src, Origin::SourceHop, None)?;
    let mut dst = run.read_required(&paths.dst, Origin::DestHop, None)?;

    if let Some(path) = &paths.src_log {
        let log = run.read(path, Origin::SourceHop, None)?;
        src = merge_companion_log(src, &log);
    }
    if let Some(path) = &paths.dst_log {
        let log = run.read(path, Origin::DestHop, None)?;
        dst = merge_companion_log(dst, &log);
    }

    let strategy = Strategy::select(&src, &dst);
    let wrap = &run.config.wrap;
    let correlation = match (send, strategy) {
        (Some(send), Strategy::Sequence) => correlate_by_sequence(send, src, dst, wrap),
        (Some(send), Strategy::Positional) => correlate_by_position(send, src, dst, wrap),
        (None, Strategy::Sequence) => {
            info!("no send trace, merging receiver captures on embedded metadata");
            union_by_sequence(src, dst, wrap)
        }
        (None, Strategy::Positional) => return Err(AnalysisError::MissingSendTrace),
    };
    Ok(correlation)
}
