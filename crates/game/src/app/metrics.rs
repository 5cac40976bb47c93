use rampage_ai::{SessionStats, TickReport};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub(crate) struct LoopMetricsSnapshot {
    pub(crate) tps: f32,
    pub(crate) tasks_resumed: usize,
    pub(crate) tasks_faulted: usize,
    pub(crate) session: SessionStats,
}

/// Accumulates per-tick scheduler reports over an interval of simulated time.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: f32,
    interval_start: f32,
    ticks: u32,
    resumed: usize,
    faulted: usize,
    total_faulted: usize,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: f32) -> Self {
        Self {
            interval: if interval.is_finite() { interval.max(0.0) } else { 0.0 },
            interval_start: 0.0,
            ticks: 0,
            resumed: 0,
            faulted: 0,
            total_faulted: 0,
        }
    }

    pub(crate) fn record_tick(&mut self, report: &TickReport) {
        self.ticks = self.ticks.saturating_add(1);
        self.resumed = self.resumed.saturating_add(report.resumed);
        self.faulted = self.faulted.saturating_add(report.faulted);
        self.total_faulted = self.total_faulted.saturating_add(report.faulted);
    }

    pub(crate) fn total_faulted(&self) -> usize {
        self.total_faulted
    }

    pub(crate) fn maybe_snapshot(
        &mut self,
        now: f32,
        session: SessionStats,
    ) -> Option<LoopMetricsSnapshot> {
        let elapsed = now - self.interval_start;
        if elapsed < self.interval || self.ticks == 0 {
            return None;
        }

        let snapshot = LoopMetricsSnapshot {
            tps: self.ticks as f32 / elapsed.max(f32::EPSILON),
            tasks_resumed: self.resumed,
            tasks_faulted: self.faulted,
            session,
        };

        self.interval_start = now;
        self.ticks = 0;
        self.resumed = 0;
        self.faulted = 0;

        Some(snapshot)
    }
}

/// Summary written once the run ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct SimulationReport {
    pub(crate) seed: u64,
    pub(crate) simulated_seconds: f32,
    pub(crate) game_time: f32,
    pub(crate) session: SessionStats,
    pub(crate) tasks_faulted: usize,
    pub(crate) boss_state: Option<String>,
    pub(crate) boss_health: Option<i32>,
    pub(crate) entity_count: usize,
}

impl SimulationReport {
    pub(crate) fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
