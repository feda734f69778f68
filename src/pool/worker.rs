//! Pool unit thread body.

use super::message::{FramePair, Report, Request};
use super::DifferFactory;
use crate::extraction::{FrameDiffer, RectFilter};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Everything a unit thread owns.
pub(crate) struct UnitContext {
    pub(crate) unit: usize,
    pub(crate) factory: DifferFactory,
    pub(crate) filter: RectFilter,
    pub(crate) requests: Receiver<Request>,
    pub(crate) reports: Sender<Report>,
    pub(crate) terminated: Arc<AtomicBool>,
}

/// Runs one unit until `Finish`, termination, or an engine error.
///
/// Send failures mean the coordinator is gone; the unit just exits.
pub(crate) fn run_unit(ctx: UnitContext) {
    let unit = ctx.unit;
    let mut differ = match (ctx.factory)(unit) {
        Ok(differ) => differ,
        Err(err) => {
            tracing::error!(unit, error = %err, "Diff engine failed to load");
            let _ = ctx.reports.send(Report::Failed {
                unit,
                frame_index: None,
                message: err.to_string(),
            });
            return;
        }
    };

    tracing::debug!(unit, engine = differ.name(), "Diff unit ready");
    if ctx.reports.send(Report::Ready { unit }).is_err() {
        return;
    }

    while let Ok(request) = ctx.requests.recv() {
        if ctx.terminated.load(Ordering::Acquire) {
            break;
        }

        match request {
            Request::Compare(pair) => {
                if !compare_pair(&ctx, differ.as_mut(), pair) {
                    break;
                }
            }
            Request::Finish => {
                tracing::debug!(unit, "Diff unit finished");
                let _ = ctx.reports.send(Report::Finished { unit });
                break;
            }
        }
    }
}

/// Compares one pair and reports it. Returns false if the unit must stop.
fn compare_pair(ctx: &UnitContext, differ: &mut dyn FrameDiffer, pair: FramePair) -> bool {
    let unit = ctx.unit;
    let frame_index = pair.frame_index;

    let mut rects = match differ.compare(&pair.previous, &pair.current) {
        Ok(rects) => rects,
        Err(err) => {
            tracing::error!(unit, frame_index, error = %err, "Frame comparison failed");
            let _ = ctx.reports.send(Report::Failed {
                unit,
                frame_index: Some(frame_index),
                message: err.to_string(),
            });
            return false;
        }
    };
    // Buffers are released before reporting.
    drop(pair);

    ctx.filter.retain(&mut rects);
    if !rects.is_empty()
        && ctx
            .reports
            .send(Report::Changed {
                unit,
                frame_index,
                rects,
            })
            .is_err()
    {
        return false;
    }

    ctx.reports
        .send(Report::Processed { unit, frame_index })
        .is_ok()
}
