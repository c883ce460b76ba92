use tracing::debug;

use crate::correlate::{Correlation, correlate_by_position};
use crate::record::Origin;
use crate::trace::TraceFormat;

use super::{AnalysisError, Run, TracePaths};

/// Log pipeline: three text traces, positional correlation.
///
/// Receiver lines stamped before the first send are dropped. Destination
/// lines are additionally held against the send time of the first packet
/// the source hop did not log, which is where the relocation took over.
pub(super) fn correlate(run: &mut Run<'_>, paths: &TracePaths) -> Result<Correlation, AnalysisError> {
    let send_path = paths.send.as_deref().ok_or(AnalysisError::MissingSendTrace)?;
    let send = run.read_required(send_path, Origin::Send, Some(TraceFormat::Text))?;
    run.ctx.set_send_baseline(send.first_send_time());

    let src = run.read_required(&paths.src, Origin::SourceHop, Some(TraceFormat::Text))?;
    let normal = send.records.get(src.len()).and_then(|record| record.send_time);
    debug!(baseline = normal, "destination baseline");
    run.ctx.set_normal_baseline(normal);

    let dst = run.read_required(&paths.dst, Origin::DestHop, Some(TraceFormat::Text))?;
    Ok(correlate_by_position(send, src, dst, &run.config.wrap))
}
