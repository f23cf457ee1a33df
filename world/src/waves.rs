//! Wave scheduler state and per-group spawn cursors.

use std::time::Duration;

use darknet_defence_core::{
    RejectReason, SpawnKind, WaveId, WavePlan, INTER_WAVE_DELAY, MAX_WAVES,
};

/// One enemy the scheduler wants spawned this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SpawnOrder {
    pub(crate) kind: SpawnKind,
    pub(crate) health_scale: f32,
}

#[derive(Clone, Debug, PartialEq)]
struct GroupCursor {
    kind: SpawnKind,
    remaining: u32,
    spawn_delay: Duration,
    health_scale: f32,
    next_spawn_in: Duration,
}

/// Scheduler owning wave progression, spawn cursors, and the auto-start timer.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct WaveScheduler {
    current: u32,
    wave_in_progress: bool,
    cursors: Vec<GroupCursor>,
    auto_start: Option<Duration>,
    plan_requested: Option<WaveId>,
}

impl WaveScheduler {
    /// Wave the campaign is currently on; zero before the first wave.
    pub(crate) fn current_wave(&self) -> WaveId {
        WaveId::new(self.current)
    }

    /// Reports whether a wave is spawning or being fought.
    pub(crate) fn wave_in_progress(&self) -> bool {
        self.wave_in_progress
    }

    /// Reports whether a plan request is waiting for its answer.
    pub(crate) fn plan_requested(&self) -> Option<WaveId> {
        self.plan_requested
    }

    /// Remaining auto-start countdown, zero when disarmed.
    pub(crate) fn wave_timer(&self) -> Duration {
        self.auto_start.unwrap_or(Duration::ZERO)
    }

    /// Requests that the next wave start, returning the wave needing a plan.
    pub(crate) fn request_start(&mut self) -> Result<WaveId, RejectReason> {
        if self.wave_in_progress || self.plan_requested.is_some() {
            return Err(RejectReason::WaveAlreadyInProgress);
        }
        if self.current >= MAX_WAVES {
            return Err(RejectReason::AllWavesCleared);
        }
        let next = WaveId::new(self.current + 1);
        self.plan_requested = Some(next);
        self.auto_start = None;
        Ok(next)
    }

    /// Installs the plan for the requested wave, beginning its spawns.
    pub(crate) fn begin(&mut self, wave: WaveId, plan: &WavePlan) -> bool {
        let expected = WaveId::new(self.current + 1);
        if self.wave_in_progress || wave != expected {
            return false;
        }

        self.current = wave.get();
        self.wave_in_progress = true;
        self.plan_requested = None;
        self.auto_start = None;
        self.cursors = plan
            .groups()
            .iter()
            .map(|group| GroupCursor {
                kind: group.kind,
                remaining: group.count,
                spawn_delay: group.spawn_delay,
                health_scale: group.health_scale,
                next_spawn_in: Duration::ZERO,
            })
            .collect();
        true
    }

    /// Advances cursors and the auto-start countdown by one tick.
    ///
    /// Each group emits at most one spawn per tick. The returned flag reports
    /// that the inter-wave countdown elapsed and the next plan is needed.
    pub(crate) fn advance(&mut self, dt: Duration, orders: &mut Vec<SpawnOrder>) -> bool {
        if self.wave_in_progress {
            for cursor in &mut self.cursors {
                if cursor.remaining == 0 {
                    continue;
                }
                cursor.next_spawn_in = cursor.next_spawn_in.saturating_sub(dt);
                if cursor.next_spawn_in.is_zero() {
                    orders.push(SpawnOrder {
                        kind: cursor.kind,
                        health_scale: cursor.health_scale,
                    });
                    cursor.remaining -= 1;
                    cursor.next_spawn_in = cursor.spawn_delay;
                }
            }
            return false;
        }

        if let Some(remaining) = self.auto_start {
            let remaining = remaining.saturating_sub(dt);
            if remaining.is_zero() {
                self.auto_start = None;
                if self.plan_requested.is_none() && self.current < MAX_WAVES {
                    let next = WaveId::new(self.current + 1);
                    self.plan_requested = Some(next);
                    return true;
                }
            } else {
                self.auto_start = Some(remaining);
            }
        }
        false
    }

    /// Reports whether every group has emitted all of its spawns.
    pub(crate) fn all_exhausted(&self) -> bool {
        self.cursors.iter().all(|cursor| cursor.remaining == 0)
    }

    /// Marks the running wave finished and arms the inter-wave countdown.
    pub(crate) fn finish_wave(&mut self) {
        self.wave_in_progress = false;
        self.cursors.clear();
        if self.current < MAX_WAVES {
            self.auto_start = Some(INTER_WAVE_DELAY);
        }
    }

    /// Restores scheduler bookkeeping from a save document.
    ///
    /// Spawn cursors are not part of the save format; a wave restored
    /// mid-spawn forfeits its remaining spawns and completes once the
    /// restored enemies are resolved.
    pub(crate) fn restore(current: u32, wave_in_progress: bool, timer: Duration) -> Self {
        let auto_start = if !wave_in_progress && !timer.is_zero() && current < MAX_WAVES {
            Some(timer)
        } else {
            None
        };
        Self {
            current,
            wave_in_progress,
            cursors: Vec::new(),
            auto_start,
            plan_requested: None,
        }
    }
}
