//! Parallel frame-pair comparison.
//!
//! The pool runs a fixed number of units, each on its own thread with its
//! own diff engine. Pair `k` always goes to unit `k mod N`. Units report
//! back on one shared channel, in whatever order they complete.
//!
//! ```text
//!                 ┌──────────┐
//!  dispatch(k) ─▶ │ unit k%N │ ─┐
//!                 └──────────┘  │  Ready / Changed / Processed
//!                 ┌──────────┐  ├─────────────────────────────▶ reports()
//!                 │   ...    │ ─┘  Finished / Failed
//!                 └──────────┘
//! ```

mod message;
mod worker;

pub use message::{FramePair, Report, Request};

use crate::capture::PoolConfig;
use crate::extraction::{DiffError, FrameDiffer, FrameIndex, RectFilter};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use worker::{run_unit, UnitContext};

/// Builds the diff engine for a unit. Called on the unit's own thread.
pub type DifferFactory =
    Arc<dyn Fn(usize) -> Result<Box<dyn FrameDiffer>, DiffError> + Send + Sync>;

/// Errors raised by pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to spawn diff unit {unit}: {source}")]
    Spawn {
        unit: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("diff unit {0} is no longer accepting work")]
    UnitUnavailable(usize),
}

struct Unit {
    requests: Option<Sender<Request>>,
    handle: Option<JoinHandle<()>>,
    finished: bool,
}

/// Fixed set of diff units.
pub struct WorkerPool {
    units: Vec<Unit>,
    reports: Receiver<Report>,
    terminated: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawns `config.workers` units. Each reports `Ready` once its engine loads.
    pub fn spawn(
        config: &PoolConfig,
        filter: RectFilter,
        factory: DifferFactory,
    ) -> Result<Self, PoolError> {
        let size = config.workers.max(1);
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        let terminated = Arc::new(AtomicBool::new(false));

        let mut units = Vec::with_capacity(size);
        for unit in 0..size {
            let (request_tx, request_rx) = crossbeam_channel::bounded(config.queue_depth.max(1));
            let ctx = UnitContext {
                unit,
                factory: Arc::clone(&factory),
                filter,
                requests: request_rx,
                reports: report_tx.clone(),
                terminated: Arc::clone(&terminated),
            };
            let handle = thread::Builder::new()
                .name(format!("diff-unit-{unit}"))
                .spawn(move || run_unit(ctx))
                .map_err(|source| PoolError::Spawn { unit, source })?;

            units.push(Unit {
                requests: Some(request_tx),
                handle: Some(handle),
                finished: false,
            });
        }

        tracing::debug!(units = size, queue_depth = config.queue_depth, "Worker pool spawned");

        Ok(Self {
            units,
            reports: report_rx,
            terminated,
        })
    }

    /// Number of units.
    #[inline]
    pub fn size(&self) -> usize {
        self.units.len()
    }

    /// The unit that handles `frame_index`.
    #[inline]
    pub fn unit_for(&self, frame_index: FrameIndex) -> usize {
        (frame_index % self.units.len() as u64) as usize
    }

    /// Channel carrying every unit's reports.
    pub fn reports(&self) -> &Receiver<Report> {
        &self.reports
    }

    /// Hands a pair to its unit. Blocks while that unit's queue is full.
    pub fn dispatch(&self, pair: FramePair) -> Result<usize, PoolError> {
        let unit = self.unit_for(pair.frame_index);
        let sender = self.units[unit]
            .requests
            .as_ref()
            .ok_or(PoolError::UnitUnavailable(unit))?;
        sender
            .send(Request::Compare(pair))
            .map_err(|_| PoolError::UnitUnavailable(unit))?;
        Ok(unit)
    }

    /// Asks every unit to drain and acknowledge with `Finished`.
    pub fn shutdown(&self) -> Result<(), PoolError> {
        for (unit, slot) in self.units.iter().enumerate() {
            let sender = slot
                .requests
                .as_ref()
                .ok_or(PoolError::UnitUnavailable(unit))?;
            sender
                .send(Request::Finish)
                .map_err(|_| PoolError::UnitUnavailable(unit))?;
        }
        Ok(())
    }

    /// Records a unit's `Finished` acknowledgment.
    pub fn mark_finished(&mut self, unit: usize) {
        if let Some(slot) = self.units.get_mut(unit) {
            slot.finished = true;
        }
    }

    /// True once every unit has acknowledged `Finished`.
    pub fn all_finished(&self) -> bool {
        self.units.iter().all(|u| u.finished)
    }

    /// A unit whose thread exited without acknowledging `Finished`.
    pub fn lost_unit(&self) -> Option<usize> {
        self.units.iter().position(|u| {
            !u.finished && u.handle.as_ref().map(|h| h.is_finished()).unwrap_or(false)
        })
    }

    /// Joins unit threads after a graceful shutdown.
    pub fn join(&mut self) {
        for (unit, slot) in self.units.iter_mut().enumerate() {
            slot.requests = None;
            if let Some(handle) = slot.handle.take() {
                if handle.join().is_err() {
                    tracing::warn!(unit, "Diff unit panicked during shutdown");
                }
            }
        }
    }

    /// Stops every unit immediately without draining queued pairs.
    ///
    /// Threads are detached, and reports they still send are never read.
    /// Returns false if the pool was already terminated.
    pub fn terminate(&mut self) -> bool {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return false;
        }
        for slot in &mut self.units {
            slot.requests = None;
            slot.handle = None;
        }
        tracing::debug!(units = self.units.len(), "Worker pool terminated");
        true
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}
