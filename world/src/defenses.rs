//! Defense registry, effective statistics, and target selection.

use std::collections::BTreeMap;
use std::time::Duration;

use glam::Vec2;

use darknet_defence_core::{
    DefenseId, DefenseKind, EffectKind, EnemyHandle, EnemyId, GridCell, Resources,
};

use crate::effects::EffectTable;

/// Floor below which a firing cadence can never drop.
pub(crate) const MIN_FIRE_RATE: Duration = Duration::from_millis(100);

/// Fraction of the invested cost refunded when a defense is sold.
pub(crate) const SELL_REFUND_FRACTION: f64 = 0.7;

/// Experience required per level, informational only.
pub(crate) const EXPERIENCE_PER_LEVEL: u64 = 100;

/// Authoritative record of a single placed defense.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DefenseState {
    pub(crate) id: DefenseId,
    pub(crate) kind: DefenseKind,
    pub(crate) cell: GridCell,
    pub(crate) center: Vec2,
    pub(crate) level: u8,
    pub(crate) experience: u64,
    /// Everything ever spent on this defense, for sell refunds.
    pub(crate) invested: Resources,
    pub(crate) target: Option<EnemyHandle>,
    pub(crate) facing: f32,
    /// Clock timestamp of the last shot; `None` until the first shot.
    pub(crate) last_fire: Option<Duration>,
    pub(crate) effects: EffectTable,
    pub(crate) special_active_remaining: Duration,
    pub(crate) special_cooldown_remaining: Duration,
    /// Set once corruption lands; a destroyed defense never acts again.
    pub(crate) destroyed: bool,
}

impl DefenseState {
    fn new(id: DefenseId, kind: DefenseKind, cell: GridCell, center: Vec2) -> Self {
        Self {
            id,
            kind,
            cell,
            center,
            level: 1,
            experience: 0,
            invested: kind.spec().cost,
            target: None,
            facing: 0.0,
            last_fire: None,
            effects: EffectTable::default(),
            special_active_remaining: Duration::ZERO,
            special_cooldown_remaining: Duration::ZERO,
            destroyed: false,
        }
    }

    /// Reports whether the defense may currently target and fire.
    pub(crate) fn is_active(&self) -> bool {
        !self.destroyed && !self.effects.has(EffectKind::Emp)
    }

    /// Damage per projectile after level and modifier scaling, floored.
    pub(crate) fn effective_damage(&self) -> u32 {
        let mut damage = self.kind.spec().damage as f32 * level_damage_factor(self.level);
        if self.effects.has(EffectKind::Boosted) {
            damage *= 1.5;
        }
        if self.effects.has(EffectKind::Weakened) {
            damage *= 0.7;
        }
        damage.floor().max(0.0) as u32
    }

    /// Targeting radius after level and modifier scaling.
    pub(crate) fn effective_range(&self) -> f32 {
        let mut range = self.kind.spec().range * (1.0 + 0.1 * self.level as f32);
        if self.effects.has(EffectKind::Boosted) {
            range *= 1.2;
        }
        if self.effects.has(EffectKind::Blinded) {
            range *= 0.8;
        }
        range
    }

    /// Delay between shots after level and modifier scaling, never below
    /// [`MIN_FIRE_RATE`].
    pub(crate) fn effective_fire_rate(&self) -> Duration {
        let mut rate = self.kind.spec().fire_rate.as_secs_f32() * (1.0 - 0.1 * self.level as f32);
        if self.effects.has(EffectKind::Boosted) {
            rate *= 0.7;
        }
        if self.effects.has(EffectKind::Slowed) {
            rate *= 1.3;
        }
        Duration::from_secs_f32(rate.max(0.0)).max(MIN_FIRE_RATE)
    }

    /// Projectile speed after modifier scaling, in world units per second.
    pub(crate) fn effective_projectile_speed(&self) -> f32 {
        let mut speed = self.kind.spec().projectile_speed;
        if self.effects.has(EffectKind::Boosted) {
            speed *= 1.3;
        }
        speed
    }

    /// Counts down effect and special-ability timers.
    pub(crate) fn tick_timers(&mut self, dt: Duration) {
        self.effects.tick(dt);
        if self.effects.has(EffectKind::Corrupted) {
            self.destroyed = true;
        }
        self.special_active_remaining = self.special_active_remaining.saturating_sub(dt);
        self.special_cooldown_remaining = self.special_cooldown_remaining.saturating_sub(dt);
    }

    /// Reports whether the firing cadence permits a shot at `now`.
    pub(crate) fn ready_to_fire(&self, now: Duration) -> bool {
        match self.last_fire {
            Some(last) => now.saturating_sub(last) >= self.effective_fire_rate(),
            None => true,
        }
    }

    /// Informational experience marker reported in saves.
    pub(crate) fn experience_to_next(&self) -> u64 {
        EXPERIENCE_PER_LEVEL * u64::from(self.level)
    }
}

fn level_damage_factor(level: u8) -> f32 {
    1.0 + 0.2 * level as f32
}

/// Cost of raising a defense of the kind from `level` to the next.
pub(crate) fn upgrade_cost(kind: DefenseKind, level: u8) -> Resources {
    let base = kind.spec().cost;
    let growth = 1.5f64.powi(i32::from(level));
    Resources::new(
        (base.dharma as f64 * growth).floor() as u64,
        (base.bandwidth as f64 * growth * 0.5).floor() as u64,
        (base.anonymity as f64 * growth * 0.3).floor() as u64,
    )
}

/// Registry that stores defenses and enforces one defense per grid cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct DefenseRegistry {
    entries: BTreeMap<DefenseId, DefenseState>,
    occupancy: BTreeMap<GridCell, DefenseId>,
    next_id: u32,
}

impl DefenseRegistry {
    /// Reports whether the cell already hosts a defense.
    pub(crate) fn is_occupied(&self, cell: GridCell) -> bool {
        self.occupancy.contains_key(&cell)
    }

    /// Places a new defense, allocating its identifier.
    ///
    /// The caller must have validated the cell.
    pub(crate) fn place(&mut self, kind: DefenseKind, cell: GridCell, center: Vec2) -> DefenseId {
        let id = DefenseId::new(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let previous = self.entries.insert(id, DefenseState::new(id, kind, cell, center));
        debug_assert!(previous.is_none());
        let previous_cell = self.occupancy.insert(cell, id);
        debug_assert!(previous_cell.is_none());
        id
    }

    /// Removes the defense, returning its state.
    pub(crate) fn remove(&mut self, id: DefenseId) -> Option<DefenseState> {
        let state = self.entries.remove(&id)?;
        let _ = self.occupancy.remove(&state.cell);
        Some(state)
    }

    /// Retrieves the defense associated with the identifier, if present.
    pub(crate) fn get(&self, id: DefenseId) -> Option<&DefenseState> {
        self.entries.get(&id)
    }

    /// Mutable variant of [`Self::get`].
    pub(crate) fn get_mut(&mut self, id: DefenseId) -> Option<&mut DefenseState> {
        self.entries.get_mut(&id)
    }

    /// Returns an iterator over all defenses in identifier order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &DefenseState> {
        self.entries.values()
    }

    /// Mutable variant of [`Self::iter`].
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut DefenseState> {
        self.entries.values_mut()
    }

    /// Identifiers of every defense in identifier order.
    pub(crate) fn ids(&self) -> Vec<DefenseId> {
        self.entries.keys().copied().collect()
    }
}

/// Facts about one enemy evaluated by target selection.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TargetCandidate {
    pub(crate) handle: EnemyHandle,
    pub(crate) id: EnemyId,
    pub(crate) position: Vec2,
    pub(crate) progress: f32,
    pub(crate) health: f32,
    pub(crate) max_health: f32,
    pub(crate) speed: f32,
    pub(crate) reward_dharma: u64,
    pub(crate) stealthed: bool,
}

/// Picks the highest-scoring enemy within range, if any.
///
/// Enemies further down the path, closer to death, faster, richer, and nearer
/// to the defense score higher; ties break toward the lower enemy identity so
/// replays stay deterministic.
pub(crate) fn select_target(
    center: Vec2,
    range: f32,
    candidates: &[TargetCandidate],
) -> Option<EnemyHandle> {
    let mut best: Option<(f32, EnemyId, EnemyHandle)> = None;

    for candidate in candidates {
        if candidate.stealthed {
            continue;
        }
        let distance = candidate.position.distance(center);
        if distance > range {
            continue;
        }

        let missing_health = if candidate.max_health <= f32::EPSILON {
            0.0
        } else {
            1.0 - candidate.health / candidate.max_health
        };
        let score = 100.0 * candidate.progress
            + 50.0 * missing_health
            + 0.5 * candidate.speed
            + 2.0 * candidate.reward_dharma as f32
            + 0.1 * (range - distance);

        let replace = match &best {
            Some((best_score, best_id, _)) => {
                score > *best_score || (score == *best_score && candidate.id < *best_id)
            }
            None => true,
        };
        if replace {
            best = Some((score, candidate.id, candidate.handle));
        }
    }

    best.map(|(_, _, handle)| handle)
}
