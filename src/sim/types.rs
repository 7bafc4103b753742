//! Control-loop state, tick plans, and per-tick reports.

use std::fmt;

use crate::store::ValueRecord;

/// Lifecycle of a control loop.
///
/// `Stopped` and `Failed` are terminal for one run; a fresh
/// [`Scheduler::start`](super::scheduler::Scheduler::start) begins a new run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
    Failed,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Records staged by one tick, before they are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickPlan {
    /// Rooms returned by the latest-per-room query.
    pub rooms: usize,
    /// Rooms without a set point reading.
    pub rooms_skipped: usize,
    pub updates: Vec<ValueRecord>,
}

/// Summary of one executed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Zero-based tick index within the current run.
    pub tick: u64,
    /// Timestamp stamped on this tick's records.
    pub time: u64,
    pub rooms: usize,
    pub rooms_skipped: usize,
    /// Records written in this tick's batch.
    pub staged: usize,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={:>5} time={} | rooms={} skipped={} staged={}",
            self.tick, self.time, self.rooms, self.rooms_skipped, self.staged
        )
    }
}

/// Running totals for one loop run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Ticks completed.
    pub ticks: u64,
    /// Records written by ticks, seed batch excluded.
    pub records_written: u64,
    pub last_tick: Option<TickReport>,
}

impl LoopStats {
    pub fn record(&mut self, report: TickReport) {
        self.ticks += 1;
        self.records_written += report.staged as u64;
        self.last_tick = Some(report);
    }
}
