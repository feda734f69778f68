//! Ordered frame-difference stream over a worker pool.
//!
//! The differentiator walks a frame source, hands each consecutive pair to
//! the pool, and replays the pool's out-of-order results to a consumer in
//! strict frame order through a [`ReorderBuffer`].
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──(all units Ready)──▶ Ready ──run()──▶ FindingDifferences ──▶ Done
//! ```
//!
//! A run ends in one of two ways:
//! - **Exhaustion**: every unit is sent `Finish`, and the run waits for all
//!   `Finished` acknowledgments, so every dispatched pair is delivered.
//! - **Stop**: [`StopHandle::stop`] terminates the pool without draining.
//!   Results still in flight are dropped.
//!
//! Either way the consumer's [`DifferenceConsumer::on_done`] fires once.

mod reorder;
mod state;

pub use reorder::{ReorderBuffer, ResultSlot};
pub use state::DifferentiatorState;

use crate::capture::{FileConfig, Frame, FrameSource, SourceError};
use crate::extraction::{DiffError, Difference, FrameDiffer, FrameIndex, ThresholdDiffer};
use crate::lifecycle::{InvariantViolation, StateCell};
use crate::pool::{DifferFactory, FramePair, PoolError, Report, WorkerPool};
use crate::progress::ProgressListener;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How often blocking waits check for lost units and stop requests.
const LIVENESS_POLL: Duration = Duration::from_millis(100);

/// Errors that abort a differentiator run.
#[derive(Debug, Error)]
pub enum DifferentiatorError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("diff unit {unit} failed (frame {frame_index:?}): {message}")]
    WorkerFailed {
        unit: usize,
        frame_index: Option<FrameIndex>,
        message: String,
    },
    #[error("diff unit {unit} exited without acknowledging")]
    WorkerLost { unit: usize },
    #[error("every diff unit disconnected")]
    Disconnected,
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Receives the ordered difference stream.
pub trait DifferenceConsumer {
    /// A changed frame, in strictly increasing frame order.
    fn on_difference(&mut self, difference: &Difference) -> Result<(), InvariantViolation>;

    /// The differentiator reached `Done`. Called exactly once per run.
    fn on_done(&mut self) -> Result<(), InvariantViolation>;
}

/// Requests an early stop. Cloneable and shareable across threads.
///
/// A child handle also observes its parent, so one interrupt can stop many
/// runs while each run can still stop itself alone.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that is stopped by itself or by `self`.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::clone(&self.flag)),
        }
    }

    /// Requests a stop. Returns true only for the first request.
    pub fn stop(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.load(Ordering::Acquire))
    }
}

/// Outcome of a completed or stopped run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub filename: String,
    /// Every resolved slot, including the index-0 sentinel.
    pub slots: BTreeMap<FrameIndex, ResultSlot>,
    /// Pairs handed to the pool.
    pub frames_dispatched: u64,
    /// Pairs acknowledged by the pool before the run ended.
    pub frames_processed: u64,
    /// Estimated frame count from duration and nominal rate.
    pub estimated_total: u64,
    /// True if the run ended through a stop request.
    pub stopped_early: bool,
}

impl RunResult {
    /// Changed frames in order.
    pub fn differences(&self) -> impl Iterator<Item = Difference> + '_ {
        self.slots.iter().filter_map(|(&frame_index, slot)| match slot {
            ResultSlot::Changed(rects) => Some(Difference {
                frame_index,
                rects: rects.clone(),
            }),
            _ => None,
        })
    }
}

/// Estimated frame count of a recording sampled at `fps`.
pub fn estimate_total_frames(duration: Duration, fps: u32) -> u64 {
    let scaled = duration.as_nanos() * u128::from(fps);
    scaled.div_ceil(1_000_000_000) as u64
}

/// Per-run state handed to every report handler.
struct RunContext<'a> {
    consumer: &'a mut dyn DifferenceConsumer,
    progress: &'a dyn ProgressListener,
    reports: Receiver<Report>,
    buffer: ReorderBuffer,
    dispatched: u64,
    processed: u64,
    estimated_total: u64,
    stopped_early: bool,
}

impl RunContext<'_> {
    /// Delivers every contiguously resolved change to the consumer.
    fn advance(&mut self, stop: &StopHandle) -> Result<(), InvariantViolation> {
        let consumer = &mut *self.consumer;
        self.buffer.advance(|difference| {
            consumer.on_difference(&difference)?;
            Ok::<_, InvariantViolation>(if stop.is_stopped() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })?;
        Ok(())
    }
}

/// Drives a frame source through the worker pool.
pub struct Differentiator {
    filename: String,
    state: StateCell<DifferentiatorState>,
    pool: WorkerPool,
    ready_units: usize,
    stop: StopHandle,
    nominal_fps: u32,
}

impl Differentiator {
    /// Spawns the pool with engines built by `factory`.
    pub fn new(
        filename: impl Into<String>,
        config: &FileConfig,
        factory: DifferFactory,
    ) -> Result<Self, DifferentiatorError> {
        let filename = filename.into();
        let pool = WorkerPool::spawn(&config.pool, config.diff.cursor_filter, factory)?;
        tracing::info!(filename = %filename, workers = pool.size(), "Differentiator created");

        Ok(Self {
            filename,
            state: StateCell::new(DifferentiatorState::Idle),
            pool,
            ready_units: 0,
            stop: StopHandle::new(),
            nominal_fps: config.playback.nominal_fps,
        })
    }

    /// Spawns the pool with [`ThresholdDiffer`] engines.
    pub fn with_threshold_engine(
        filename: impl Into<String>,
        config: &FileConfig,
    ) -> Result<Self, DifferentiatorError> {
        let threshold = config.diff.pixel_threshold;
        let factory: DifferFactory =
            Arc::new(move |_: usize| -> Result<Box<dyn FrameDiffer>, DiffError> {
                Ok(Box::new(ThresholdDiffer::new(threshold)))
            });
        Self::new(filename, config, factory)
    }

    /// Also stops when `interrupt` fires, e.g. one Ctrl+C for a batch.
    pub fn with_interrupt(mut self, interrupt: &StopHandle) -> Self {
        self.stop = interrupt.child();
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    #[inline]
    pub fn state(&self) -> DifferentiatorState {
        self.state.current()
    }

    #[inline]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Requests an early stop.
    ///
    /// Only raises the flag. The driving loop notices it at its next
    /// iteration, after the current `read_frame` or blocked dispatch
    /// returns, and only then terminates the pool and moves to `Done`.
    pub fn stop(&self) {
        if self.stop.stop() {
            tracing::info!(filename = %self.filename, "Stop requested");
        }
    }

    /// Blocks until every unit has loaded its engine.
    pub fn wait_until_ready(&mut self) -> Result<(), DifferentiatorError> {
        if !self.state.is(DifferentiatorState::Idle) {
            return Ok(());
        }

        tracing::debug!(filename = %self.filename, "Waiting for diff units");
        let reports = self.pool.reports().clone();
        while self.ready_units < self.pool.size() {
            match self.recv_report(&reports)? {
                Some(Report::Ready { unit }) => {
                    self.ready_units += 1;
                    tracing::trace!(unit, ready = self.ready_units, "Diff unit ready");
                }
                Some(Report::Failed {
                    unit,
                    frame_index,
                    message,
                }) => {
                    self.pool.terminate();
                    return Err(DifferentiatorError::WorkerFailed {
                        unit,
                        frame_index,
                        message,
                    });
                }
                Some(other) => {
                    tracing::warn!(report = ?other, "Unexpected report before ready");
                }
                None => {}
            }
        }

        self.state.transition(DifferentiatorState::Ready)?;
        tracing::info!(filename = %self.filename, units = self.pool.size(), "Diff units ready");
        Ok(())
    }

    /// Walks `source` to exhaustion or stop, feeding `consumer` in order.
    ///
    /// Any error terminates the pool and moves to `Done`; no partial
    /// result is returned.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        consumer: &mut dyn DifferenceConsumer,
        progress: &dyn ProgressListener,
    ) -> Result<RunResult, DifferentiatorError> {
        self.wait_until_ready()?;

        let estimated_total = estimate_total_frames(source.duration(), self.nominal_fps);
        tracing::info!(
            filename = %self.filename,
            duration_secs = source.duration().as_secs_f64(),
            estimated_total,
            "Finding differences"
        );

        let mut ctx = RunContext {
            consumer,
            progress,
            reports: self.pool.reports().clone(),
            buffer: ReorderBuffer::new(),
            dispatched: 0,
            processed: 0,
            estimated_total,
            stopped_early: false,
        };

        self.state.transition(DifferentiatorState::FindingDifferences)?;

        if let Err(err) = self.drive(source, &mut ctx) {
            tracing::error!(filename = %self.filename, error = %err, "Differentiator run failed");
            self.abort();
            return Err(err);
        }

        Ok(RunResult {
            filename: self.filename.clone(),
            frames_dispatched: ctx.dispatched,
            frames_processed: ctx.processed,
            estimated_total: ctx.estimated_total,
            stopped_early: ctx.stopped_early,
            slots: ctx.buffer.into_slots(),
        })
    }

    fn drive(
        &mut self,
        source: &mut dyn FrameSource,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), DifferentiatorError> {
        ctx.advance(&self.stop)?;

        let mut previous: Option<Frame> = None;
        loop {
            self.drain_reports(ctx)?;
            if self.stop.is_stopped() {
                return self.halt(ctx);
            }

            if source.has_ended() {
                break;
            }
            let Some(current) = source.read_frame()? else {
                break;
            };
            let Some(last) = previous.replace(current.clone()) else {
                continue;
            };

            let frame_index = ctx.dispatched + 1;
            let pair = FramePair {
                frame_index,
                previous: last,
                current,
            };
            if let Err(err) = self.pool.dispatch(pair) {
                // A failed unit closes its queue; prefer its own report.
                self.drain_reports(ctx)?;
                return Err(err.into());
            }
            ctx.dispatched = frame_index;
            ctx.progress.on_frames_decoded(frame_index, ctx.estimated_total);
        }

        tracing::debug!(
            filename = %self.filename,
            dispatched = ctx.dispatched,
            "Frame source exhausted"
        );
        self.finish(ctx)
    }

    /// Handles every report already queued, without blocking.
    fn drain_reports(&mut self, ctx: &mut RunContext<'_>) -> Result<(), DifferentiatorError> {
        while !self.stop.is_stopped() {
            match ctx.reports.try_recv() {
                Ok(report) => self.handle_report(ctx, report)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(self.disconnected_error());
                }
            }
        }
        Ok(())
    }

    fn handle_report(
        &mut self,
        ctx: &mut RunContext<'_>,
        report: Report,
    ) -> Result<(), DifferentiatorError> {
        tracing::trace!(unit = report.unit(), report = ?report, "Unit report");
        match report {
            Report::Changed {
                frame_index, rects, ..
            } => {
                ctx.buffer.stage_change(frame_index, rects)?;
            }
            Report::Processed { frame_index, .. } => {
                ctx.buffer.resolve(frame_index)?;
                ctx.processed += 1;
                ctx.progress
                    .on_frames_processed(ctx.processed, ctx.estimated_total);
                ctx.advance(&self.stop)?;
            }
            Report::Finished { unit } => {
                tracing::trace!(unit, "Diff unit acknowledged finish");
                self.pool.mark_finished(unit);
            }
            Report::Failed {
                unit,
                frame_index,
                message,
            } => {
                return Err(DifferentiatorError::WorkerFailed {
                    unit,
                    frame_index,
                    message,
                });
            }
            Report::Ready { unit } => {
                tracing::warn!(unit, "Diff unit reported ready twice");
            }
        }
        Ok(())
    }

    /// Graceful end: drain every unit, then finish.
    fn finish(&mut self, ctx: &mut RunContext<'_>) -> Result<(), DifferentiatorError> {
        if let Err(err) = self.pool.shutdown() {
            self.drain_reports(ctx)?;
            return Err(err.into());
        }

        while !self.pool.all_finished() {
            if self.stop.is_stopped() {
                return self.halt(ctx);
            }
            match self.recv_report(&ctx.reports)? {
                Some(report) => self.handle_report(ctx, report)?,
                None => return self.halt(ctx),
            }
        }

        self.pool.join();
        self.state.transition(DifferentiatorState::Done)?;
        tracing::info!(
            filename = %self.filename,
            processed = ctx.processed,
            playhead = ctx.buffer.playhead(),
            "Differentiator finished"
        );
        ctx.consumer.on_done()?;
        Ok(())
    }

    /// Early end: terminate the pool without draining.
    fn halt(&mut self, ctx: &mut RunContext<'_>) -> Result<(), DifferentiatorError> {
        if !self.state.is(DifferentiatorState::FindingDifferences) {
            return Ok(());
        }

        self.pool.terminate();
        self.state.transition(DifferentiatorState::Done)?;
        ctx.stopped_early = true;
        ctx.progress
            .on_frames_processed(ctx.estimated_total, ctx.estimated_total);
        tracing::info!(
            filename = %self.filename,
            dispatched = ctx.dispatched,
            processed = ctx.processed,
            unresolved = ctx.dispatched.saturating_sub(ctx.processed),
            "Differentiator stopped; worker pool shut down"
        );
        ctx.consumer.on_done()?;
        Ok(())
    }

    /// Failure path: stop units and close the lifecycle.
    fn abort(&mut self) {
        self.pool.terminate();
        if self.state.is(DifferentiatorState::FindingDifferences) {
            if let Err(err) = self.state.transition(DifferentiatorState::Done) {
                tracing::error!(error = %err, "Could not close differentiator lifecycle");
            }
        }
    }

    /// Blocking receive that notices lost units and stop requests.
    ///
    /// Returns `Ok(None)` when a stop was requested while waiting.
    fn recv_report(
        &self,
        reports: &Receiver<Report>,
    ) -> Result<Option<Report>, DifferentiatorError> {
        loop {
            match reports.recv_timeout(LIVENESS_POLL) {
                Ok(report) => return Ok(Some(report)),
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(unit) = self.pool.lost_unit() {
                        return Err(DifferentiatorError::WorkerLost { unit });
                    }
                    if self.stop.is_stopped() {
                        return Ok(None);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(self.disconnected_error()),
            }
        }
    }

    fn disconnected_error(&self) -> DifferentiatorError {
        match self.pool.lost_unit() {
            Some(unit) => DifferentiatorError::WorkerLost { unit },
            None => DifferentiatorError::Disconnected,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::capture::{PoolConfig, ScriptedSource};
    use crate::extraction::Rect;
    use std::collections::HashMap;

    /// Engine that returns scripted rects keyed by the current frame's
    /// sequence, with per-frame latency to force out-of-order completion.
    pub(crate) struct ScriptedDiffer {
        script: Arc<HashMap<u64, Vec<Rect>>>,
    }

    impl FrameDiffer for ScriptedDiffer {
        fn compare(&mut self, _previous: &Frame, current: &Frame) -> Result<Vec<Rect>, DiffError> {
            let sequence = current.sequence();
            std::thread::sleep(Duration::from_millis((sequence * 7) % 5));
            Ok(self.script.get(&sequence).cloned().unwrap_or_default())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    pub(crate) fn scripted_factory(script: HashMap<u64, Vec<Rect>>) -> DifferFactory {
        let script = Arc::new(script);
        Arc::new(move |_: usize| -> Result<Box<dyn FrameDiffer>, DiffError> {
            Ok(Box::new(ScriptedDiffer {
                script: Arc::clone(&script),
            }))
        })
    }

    /// `frames` tiny frames whose sequence numbers are 0..frames.
    pub(crate) fn scripted_source(frames: u64) -> ScriptedSource {
        let frames = (0..frames).map(|i| Frame::filled(4, 4, 0, i)).collect();
        ScriptedSource::new("scripted.mp4", frames, 60)
    }

    pub(crate) fn test_config(workers: usize) -> FileConfig {
        FileConfig {
            pool: PoolConfig {
                workers,
                queue_depth: 2,
            },
            ..FileConfig::default()
        }
    }
}
