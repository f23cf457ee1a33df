//! Enemy arena, path following, per-kind passives, and boss bookkeeping.

use std::time::Duration;

use glam::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use darknet_defence_core::{
    BossKind, DefenseId, DefenseKind, EffectKind, EnemyHandle, EnemyId, EnemyKind, Resources,
};

use crate::effects::EffectTable;
use crate::path::PathPlan;

/// Distance at which a waypoint counts as reached.
pub(crate) const WAYPOINT_TOLERANCE: f32 = 2.0;

const JITTER_SPEED_FRACTION: f32 = 0.3;
const AGENT_PANIC_RADIUS: f32 = 200.0;
const AGENT_PANIC_MULTIPLIER: f32 = 1.5;
const SABOTEUR_STEALTH_CHANCE: f32 = 0.01;
const SABOTEUR_STEALTH_DURATION: Duration = Duration::from_millis(2_000);
const SURVEILLANCE_REPULSION_RADIUS: f32 = 300.0;
const SURVEILLANCE_REPULSION_WEIGHT: f32 = 200.0;
const HACKER_TELEPORT_CHANCE: f32 = 0.005;
const HACKER_TELEPORT_PROGRESS: f32 = 0.1;
const MONK_SPEED_FRACTION: f32 = 0.7;
const MONK_HEAL_RADIUS: f32 = 100.0;
const MONK_HEAL_PER_MS: f32 = 0.01;
const MONK_CORRUPT_RADIUS: f32 = 80.0;

const RAID_MINION_INTERVAL: Duration = Duration::from_millis(5_000);
const RAID_BLAST_INTERVAL: Duration = Duration::from_millis(10_000);
const TITAN_REGEN_INTERVAL: Duration = Duration::from_millis(8_000);
const TITAN_SHIELD_MAX: f32 = 100.0;
const TITAN_SHIELD_REGEN: f32 = 50.0;
const TITAN_THEFT_CHANCE: f32 = 0.01;

/// Lives deducted when a regular enemy escapes.
pub(crate) const ENEMY_ESCAPE_DAMAGE: u32 = 1;
/// Lives deducted when a boss escapes, before phase scaling.
pub(crate) const BOSS_ESCAPE_DAMAGE: u32 = 5;

/// Health of a raid-team minion.
pub(crate) const RAID_MINION_HEALTH: f32 = 15.0;
/// Speed of a raid-team minion in world units per second.
pub(crate) const RAID_MINION_SPEED: f32 = 60.0;

/// Authoritative record of a single live enemy.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EnemyState {
    pub(crate) id: EnemyId,
    pub(crate) kind: EnemyKind,
    pub(crate) position: Vec2,
    pub(crate) waypoint: usize,
    pub(crate) progress: f32,
    pub(crate) health: f32,
    pub(crate) max_health: f32,
    pub(crate) base_speed: f32,
    /// Damage multiplier per firing defense kind; 1.0 means no resistance.
    pub(crate) resistance: [f32; 6],
    pub(crate) reward: Resources,
    pub(crate) size: f32,
    pub(crate) effects: EffectTable,
    pub(crate) dead: bool,
    pub(crate) reached_end: bool,
    pub(crate) boss: Option<BossState>,
}

/// Boss bookkeeping carried by boss enemies on top of the base record.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct BossState {
    pub(crate) kind: BossKind,
    pub(crate) phase: u8,
    pub(crate) phases: u8,
    pub(crate) escape_damage: u32,
    pub(crate) shield_active: bool,
    pub(crate) shield_health: f32,
    pub(crate) shield_max: f32,
    minion_timer: Duration,
    blast_timer: Duration,
    regen_timer: Duration,
    phase_changed: bool,
}

impl BossState {
    fn new(kind: BossKind) -> Self {
        let spec = kind.spec();
        let shielded = matches!(kind, BossKind::MegaCorpTitan);
        Self {
            kind,
            phase: 1,
            phases: spec.phases,
            escape_damage: BOSS_ESCAPE_DAMAGE,
            shield_active: shielded,
            shield_health: if shielded { TITAN_SHIELD_MAX } else { 0.0 },
            shield_max: if shielded { TITAN_SHIELD_MAX } else { 0.0 },
            minion_timer: RAID_MINION_INTERVAL,
            blast_timer: RAID_BLAST_INTERVAL,
            regen_timer: TITAN_REGEN_INTERVAL,
            phase_changed: false,
        }
    }

    fn restore(kind: BossKind, phase: u8, shield_active: bool, shield_health: f32) -> Self {
        let mut state = Self::new(kind);
        state.phase = phase.clamp(1, state.phases);
        // Replay the per-phase escalation the boss had already earned.
        for _ in 1..state.phase {
            state.escape_damage = scale_escape_damage(state.escape_damage);
        }
        if matches!(kind, BossKind::MegaCorpTitan) {
            state.shield_active = shield_active;
            state.shield_health = shield_health.clamp(0.0, state.shield_max);
        }
        state
    }
}

/// Cross-actor consequences collected during the enemy phase and applied
/// afterwards, so every aura reads start-of-tick state.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum EnemyOp {
    /// Heal a fellow corrupted monk.
    HealKin {
        /// Monk receiving the healing.
        target: EnemyHandle,
        /// Health restored.
        amount: f32,
    },
    /// Permanently corrupt a defense caught in a monk aura.
    CorruptDefense {
        /// Defense to corrupt.
        defense: DefenseId,
    },
    /// Spawn raid-team minions around the boss.
    SpawnMinions {
        /// World position the minions appear around.
        position: Vec2,
        /// Path progress the minions inherit.
        progress: f32,
        /// Number of minions to spawn.
        count: u32,
    },
    /// Disable every defense near the boss with an electromagnetic pulse.
    EmpBlast {
        /// Center of the blast.
        position: Vec2,
    },
    /// Drain a share of the player's ledger.
    StealResources,
}

/// Start-of-tick facts about one enemy, read by aura passives.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EnemyProbe {
    pub(crate) handle: EnemyHandle,
    pub(crate) kind: EnemyKind,
    pub(crate) position: Vec2,
}

/// Start-of-tick facts about one defense, read by enemy passives.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DefenseProbe {
    pub(crate) id: DefenseId,
    pub(crate) position: Vec2,
    pub(crate) cloaked: bool,
}

/// Result of applying one packet of damage to an enemy.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct DamageOutcome {
    pub(crate) died: bool,
    pub(crate) shield_broken: bool,
    pub(crate) phase_change: Option<(u8, u8)>,
}

impl EnemyState {
    fn spawn(kind: EnemyKind, health_scale: f32, position: Vec2, id: EnemyId) -> Self {
        let spec = kind.spec();
        let max_health = spec.health * health_scale.max(0.0);
        Self {
            id,
            kind,
            position,
            waypoint: 1,
            progress: 0.0,
            health: max_health,
            max_health,
            base_speed: spec.speed,
            resistance: [1.0; 6],
            reward: spec.reward,
            size: spec.size,
            effects: EffectTable::default(),
            dead: false,
            reached_end: false,
            boss: None,
        }
    }

    /// Applies damage from the named defense kind, depleting any boss shield
    /// first and driving phase transitions.
    pub(crate) fn take_damage(&mut self, amount: u32, source: DefenseKind) -> DamageOutcome {
        let mut outcome = DamageOutcome::default();
        if self.dead || self.reached_end {
            return outcome;
        }

        let mut actual = amount as f32 * self.resistance[defense_kind_index(source)];
        if actual <= 0.0 {
            return outcome;
        }

        if let Some(boss) = &mut self.boss {
            if boss.shield_active {
                if actual >= boss.shield_health {
                    actual -= boss.shield_health;
                    boss.shield_health = 0.0;
                    boss.shield_active = false;
                    outcome.shield_broken = true;
                } else {
                    boss.shield_health -= actual;
                    actual = 0.0;
                }
            }
        }

        self.health = (self.health - actual).max(0.0);

        if self.health <= 0.0 {
            self.dead = true;
            self.effects.clear();
            outcome.died = true;
            return outcome;
        }

        if let Some(boss) = &mut self.boss {
            let dealt = (self.max_health - self.health) / self.max_health;
            let threshold_count = u32::from(boss.phases) + 1;
            let crossed = (dealt * threshold_count as f32).floor() as u32 + 1;
            let new_phase = crossed.min(u32::from(boss.phases)) as u8;
            if new_phase > boss.phase {
                let from = boss.phase;
                boss.phase = new_phase;
                boss.escape_damage = scale_escape_damage(boss.escape_damage);
                boss.minion_timer = Duration::ZERO;
                boss.blast_timer = Duration::ZERO;
                boss.phase_changed = true;
                self.base_speed *= 1.2;
                outcome.phase_change = Some((from, new_phase));
            }
        }

        outcome
    }

    /// Lives the enemy costs when it walks off the path's end.
    pub(crate) fn escape_damage(&self) -> u32 {
        match &self.boss {
            Some(boss) => boss.escape_damage,
            None => ENEMY_ESCAPE_DAMAGE,
        }
    }
}

fn scale_escape_damage(current: u32) -> u32 {
    (current as f32 * 1.3).floor() as u32
}

/// Base enemy kind a boss is recorded under; passives never run for bosses.
pub(crate) fn boss_base_kind(kind: BossKind) -> EnemyKind {
    match kind {
        BossKind::RaidTeam => EnemyKind::FederalAgent,
        BossKind::MegaCorpTitan => EnemyKind::CorporateSaboteur,
    }
}

/// Dense index of a defense kind inside per-enemy resistance tables.
pub(crate) fn defense_kind_index(kind: DefenseKind) -> usize {
    match kind {
        DefenseKind::Firewall => 0,
        DefenseKind::Encryption => 1,
        DefenseKind::Decoy => 2,
        DefenseKind::Mirror => 3,
        DefenseKind::Anonymity => 4,
        DefenseKind::Distributor => 5,
    }
}

/// Generation-tagged arena owning every live enemy.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct EnemyArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_id: u32,
}

#[derive(Clone, Debug, PartialEq)]
struct Slot {
    generation: u32,
    entry: Option<EnemyState>,
}

impl EnemyArena {
    /// Spawns a regular enemy at the path's first point.
    pub(crate) fn spawn(
        &mut self,
        kind: EnemyKind,
        health_scale: f32,
        position: Vec2,
    ) -> EnemyHandle {
        let id = self.allocate_id();
        self.insert(EnemyState::spawn(kind, health_scale, position, id))
    }

    /// Spawns a boss at the path's first point.
    pub(crate) fn spawn_boss(
        &mut self,
        kind: BossKind,
        health_scale: f32,
        position: Vec2,
    ) -> EnemyHandle {
        let spec = kind.spec();
        let id = self.allocate_id();
        let max_health = spec.health * health_scale.max(0.0);
        self.insert(EnemyState {
            id,
            kind: boss_base_kind(kind),
            position,
            waypoint: 1,
            progress: 0.0,
            health: max_health,
            max_health,
            base_speed: spec.speed,
            resistance: [1.0; 6],
            reward: spec.reward,
            size: spec.size,
            effects: EffectTable::default(),
            dead: false,
            reached_end: false,
            boss: Some(BossState::new(kind)),
        })
    }

    /// Spawns a raid-team minion at the boss's position and progress.
    pub(crate) fn spawn_minion(
        &mut self,
        position: Vec2,
        progress: f32,
        waypoint: usize,
    ) -> EnemyHandle {
        let id = self.allocate_id();
        let mut state = EnemyState::spawn(EnemyKind::ScriptKiddie, 1.0, position, id);
        state.health = RAID_MINION_HEALTH;
        state.max_health = RAID_MINION_HEALTH;
        state.base_speed = RAID_MINION_SPEED;
        state.progress = progress;
        state.waypoint = waypoint;
        self.insert(state)
    }

    /// Restores an enemy from a save record with explicit field values.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        &mut self,
        kind: EnemyKind,
        position: Vec2,
        health: f32,
        max_health: f32,
        waypoint: usize,
        progress: f32,
        boss: Option<(BossKind, u8, bool, f32)>,
    ) -> EnemyHandle {
        let id = self.allocate_id();
        let spec = kind.spec();
        let max_health = max_health.max(1.0);
        let boss_state = boss.map(|(boss_kind, phase, shield_active, shield_health)| {
            BossState::restore(boss_kind, phase, shield_active, shield_health)
        });
        let base_speed = match &boss_state {
            Some(state) => state.kind.spec().speed,
            None => spec.speed,
        };
        let size = match &boss_state {
            Some(state) => state.kind.spec().size,
            None => spec.size,
        };
        let reward = match &boss_state {
            Some(state) => state.kind.spec().reward,
            None => spec.reward,
        };
        self.insert(EnemyState {
            id,
            kind,
            position,
            waypoint,
            progress,
            health: health.clamp(0.0, max_health),
            max_health,
            base_speed,
            resistance: [1.0; 6],
            reward,
            size,
            effects: EffectTable::default(),
            dead: false,
            reached_end: false,
            boss: boss_state,
        })
    }

    fn allocate_id(&mut self) -> EnemyId {
        let id = EnemyId::new(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn insert(&mut self, state: EnemyState) -> EnemyHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.entry.is_none());
            slot.entry = Some(state);
            EnemyHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: Some(state),
            });
            EnemyHandle::new(index, 0)
        }
    }

    /// Resolves a handle, returning nothing for stale or empty slots.
    pub(crate) fn resolve(&self, handle: EnemyHandle) -> Option<&EnemyState> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.entry.as_ref()
    }

    /// Mutable variant of [`Self::resolve`].
    pub(crate) fn resolve_mut(&mut self, handle: EnemyHandle) -> Option<&mut EnemyState> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Handles of every live enemy in slot order.
    pub(crate) fn handles(&self) -> Vec<EnemyHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(index, slot)| EnemyHandle::new(index as u32, slot.generation))
            .collect()
    }

    /// Iterator over every live enemy in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &EnemyState> {
        self.slots.iter().filter_map(|slot| slot.entry.as_ref())
    }

    /// Removes dead and escaped enemies, retiring their slot generations.
    pub(crate) fn prune(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let finished = slot
                .entry
                .as_ref()
                .map(|enemy| enemy.dead || enemy.reached_end)
                .unwrap_or(false);
            if finished {
                slot.entry = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
    }
}

/// Advances one enemy along the path, running its kind passive.
///
/// Aura consequences land in `ops` and are applied after the whole enemy
/// phase, so every passive reads the start-of-tick probes.
pub(crate) fn step_enemy(
    enemy: &mut EnemyState,
    handle: EnemyHandle,
    path: &PathPlan,
    dt: Duration,
    enemy_probes: &[EnemyProbe],
    defense_probes: &[DefenseProbe],
    rng: &mut ChaCha8Rng,
    ops: &mut Vec<EnemyOp>,
) {
    if enemy.dead || enemy.reached_end {
        return;
    }

    enemy.effects.tick(dt);

    if let Some(boss) = &mut enemy.boss {
        step_boss_schedule(boss, enemy.position, enemy.progress, dt, rng, ops);
    }

    let dt_secs = dt.as_secs_f32();
    let dt_ms = dt.as_millis() as f32;
    let is_boss = enemy.boss.is_some();
    let mut speed = enemy.base_speed * enemy.effects.speed_multiplier();

    if !is_boss {
        match enemy.kind {
            EnemyKind::ScriptKiddie => {}
            EnemyKind::FederalAgent => {
                let panicked = defense_probes
                    .iter()
                    .any(|probe| probe.position.distance(enemy.position) <= AGENT_PANIC_RADIUS);
                if panicked {
                    speed *= AGENT_PANIC_MULTIPLIER;
                }
            }
            EnemyKind::CorporateSaboteur => {
                if rng.gen::<f32>() < SABOTEUR_STEALTH_CHANCE {
                    enemy
                        .effects
                        .apply(EffectKind::Stealthed, SABOTEUR_STEALTH_DURATION, 1.0);
                }
            }
            EnemyKind::AiSurveillance => {}
            EnemyKind::QuantumHacker => {
                if rng.gen::<f32>() < HACKER_TELEPORT_CHANCE {
                    let target = (enemy.progress + HACKER_TELEPORT_PROGRESS).min(1.0);
                    let (position, _) = path.position_at(target);
                    enemy.position = position;
                    enemy.progress = target;
                    enemy.waypoint = path.waypoint_after(target);
                    if target >= 1.0 {
                        enemy.reached_end = true;
                        return;
                    }
                }
            }
            EnemyKind::CorruptedMonk => {
                speed *= MONK_SPEED_FRACTION;
                emit_monk_aura(enemy, handle, dt_ms, enemy_probes, defense_probes, ops);
            }
        }
    }

    if speed <= 0.0 {
        return;
    }

    let waypoints = path.points();
    let target = waypoints[enemy.waypoint.min(waypoints.len() - 1)];
    let to_target = target - enemy.position;
    let mut step = if to_target.length() <= f32::EPSILON {
        Vec2::ZERO
    } else {
        to_target.normalize() * speed * dt_secs
    };

    if !is_boss && enemy.kind == EnemyKind::ScriptKiddie {
        let scale = speed * dt_secs * JITTER_SPEED_FRACTION;
        step += Vec2::new(
            rng.gen_range(-scale..=scale),
            rng.gen_range(-scale..=scale),
        );
    }

    if !is_boss && enemy.kind == EnemyKind::AiSurveillance {
        let repulsion = surveillance_repulsion(enemy.position, defense_probes);
        let candidate = enemy.position + step + repulsion * dt_secs;
        // The drift may never push the enemy back along the path.
        if candidate.distance(target) <= enemy.position.distance(target) {
            step += repulsion * dt_secs;
        }
    }

    enemy.position += step;

    if enemy.position.distance(target) <= WAYPOINT_TOLERANCE {
        if enemy.waypoint + 1 >= waypoints.len() {
            enemy.reached_end = true;
            enemy.progress = 1.0;
            return;
        }
        enemy.waypoint += 1;
    }

    enemy.progress = path.progress_toward(enemy.waypoint, enemy.position);
}

fn emit_monk_aura(
    enemy: &EnemyState,
    handle: EnemyHandle,
    dt_ms: f32,
    enemy_probes: &[EnemyProbe],
    defense_probes: &[DefenseProbe],
    ops: &mut Vec<EnemyOp>,
) {
    for probe in enemy_probes {
        if probe.handle == handle || probe.kind != EnemyKind::CorruptedMonk {
            continue;
        }
        if probe.position.distance(enemy.position) <= MONK_HEAL_RADIUS {
            ops.push(EnemyOp::HealKin {
                target: probe.handle,
                amount: MONK_HEAL_PER_MS * dt_ms,
            });
        }
    }

    for probe in defense_probes {
        if probe.cloaked {
            continue;
        }
        if probe.position.distance(enemy.position) <= MONK_CORRUPT_RADIUS {
            ops.push(EnemyOp::CorruptDefense { defense: probe.id });
        }
    }
}

fn surveillance_repulsion(position: Vec2, defense_probes: &[DefenseProbe]) -> Vec2 {
    let mut repulsion = Vec2::ZERO;
    for probe in defense_probes {
        let away = position - probe.position;
        let distance = away.length();
        if distance <= f32::EPSILON || distance > SURVEILLANCE_REPULSION_RADIUS {
            continue;
        }
        repulsion += away / distance * (SURVEILLANCE_REPULSION_WEIGHT / distance);
    }
    repulsion
}

fn step_boss_schedule(
    boss: &mut BossState,
    position: Vec2,
    progress: f32,
    dt: Duration,
    rng: &mut ChaCha8Rng,
    ops: &mut Vec<EnemyOp>,
) {
    match boss.kind {
        BossKind::RaidTeam => {
            boss.minion_timer = boss.minion_timer.saturating_sub(dt);
            if boss.minion_timer.is_zero() {
                ops.push(EnemyOp::SpawnMinions {
                    position,
                    progress,
                    count: 3 + u32::from(boss.phase),
                });
                boss.minion_timer = RAID_MINION_INTERVAL;
            }

            boss.blast_timer = boss.blast_timer.saturating_sub(dt);
            if boss.blast_timer.is_zero() {
                ops.push(EnemyOp::EmpBlast { position });
                boss.blast_timer = RAID_BLAST_INTERVAL;
            }
        }
        BossKind::MegaCorpTitan => {
            // Regeneration stands down on the tick a phase transition fired.
            if boss.phase_changed {
                boss.phase_changed = false;
            } else {
                boss.regen_timer = boss.regen_timer.saturating_sub(dt);
                if boss.regen_timer.is_zero() {
                    boss.shield_health = (boss.shield_health + TITAN_SHIELD_REGEN)
                        .min(boss.shield_max);
                    boss.shield_active = boss.shield_health > 0.0;
                    boss.regen_timer = TITAN_REGEN_INTERVAL;
                }
            }

            if rng.gen::<f32>() < TITAN_THEFT_CHANCE {
                ops.push(EnemyOp::StealResources);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darknet_defence_core::PathShape;
    use rand::SeedableRng;

    fn straight_path() -> PathPlan {
        PathPlan::generate(0, PathShape::Zigzag, 10.0, 10.0)
    }

    fn arena_with_boss(kind: BossKind) -> (EnemyArena, EnemyHandle) {
        let mut arena = EnemyArena::default();
        let handle = arena.spawn_boss(kind, 1.0, Vec2::ZERO);
        (arena, handle)
    }

    #[test]
    fn stale_handles_resolve_to_nothing() {
        let mut arena = EnemyArena::default();
        let handle = arena.spawn(EnemyKind::ScriptKiddie, 1.0, Vec2::ZERO);

        arena
            .resolve_mut(handle)
            .expect("live enemy resolves")
            .dead = true;
        arena.prune();

        assert!(arena.resolve(handle).is_none());

        let replacement = arena.spawn(EnemyKind::FederalAgent, 1.0, Vec2::ZERO);
        assert_eq!(replacement.index(), handle.index());
        assert_ne!(replacement.generation(), handle.generation());
        assert!(arena.resolve(handle).is_none());
        assert!(arena.resolve(replacement).is_some());
    }

    #[test]
    fn wave_scaling_inflates_spawn_health() {
        let mut arena = EnemyArena::default();
        let handle = arena.spawn(EnemyKind::ScriptKiddie, 1.5, Vec2::ZERO);
        let enemy = arena.resolve(handle).expect("live enemy");
        assert_eq!(enemy.max_health, 30.0);
        assert_eq!(enemy.health, 30.0);
    }

    #[test]
    fn lethal_damage_marks_death_and_clears_effects() {
        let mut arena = EnemyArena::default();
        let handle = arena.spawn(EnemyKind::ScriptKiddie, 1.0, Vec2::ZERO);
        let enemy = arena.resolve_mut(handle).expect("live enemy");
        enemy
            .effects
            .apply(EffectKind::Slowed, Duration::from_millis(5_000), 1.0);

        let outcome = enemy.take_damage(25, DefenseKind::Firewall);

        assert!(outcome.died);
        assert!(enemy.dead);
        assert!(enemy.effects.all().is_empty());
    }

    #[test]
    fn raid_team_phases_trigger_at_quarter_damage_marks() {
        let (mut arena, handle) = arena_with_boss(BossKind::RaidTeam);
        let boss = arena.resolve_mut(handle).expect("live boss");

        // 124 of 500: still phase 1.
        assert_eq!(
            boss.take_damage(124, DefenseKind::Firewall).phase_change,
            None
        );

        // Exactly 125 of 500 crosses into phase 2, exactly once.
        let outcome = boss.take_damage(1, DefenseKind::Firewall);
        assert_eq!(outcome.phase_change, Some((1, 2)));

        // No repeat events inside the same phase band.
        assert_eq!(
            boss.take_damage(100, DefenseKind::Firewall).phase_change,
            None
        );

        // 250 total crosses into the final phase.
        let outcome = boss.take_damage(25, DefenseKind::Firewall);
        assert_eq!(outcome.phase_change, Some((2, 3)));
        assert_eq!(
            boss.boss.as_ref().expect("boss state").phase,
            3,
        );
    }

    #[test]
    fn phase_transition_escalates_speed_and_escape_damage() {
        let (mut arena, handle) = arena_with_boss(BossKind::RaidTeam);
        let boss = arena.resolve_mut(handle).expect("live boss");
        let base_speed = boss.base_speed;

        let _ = boss.take_damage(125, DefenseKind::Firewall);

        assert_eq!(boss.base_speed, base_speed * 1.2);
        assert_eq!(boss.escape_damage(), 6);
    }

    #[test]
    fn titan_shield_absorbs_damage_before_health() {
        let (mut arena, handle) = arena_with_boss(BossKind::MegaCorpTitan);
        let boss = arena.resolve_mut(handle).expect("live boss");

        let outcome = boss.take_damage(120, DefenseKind::Mirror);

        assert!(outcome.shield_broken);
        let state = boss.boss.as_ref().expect("boss state");
        assert!(!state.shield_active);
        assert_eq!(state.shield_health, 0.0);
        assert_eq!(boss.health, 780.0);
    }

    #[test]
    fn titan_shield_regenerates_on_schedule() {
        let (mut arena, handle) = arena_with_boss(BossKind::MegaCorpTitan);
        let boss = arena.resolve_mut(handle).expect("live boss");
        let _ = boss.take_damage(120, DefenseKind::Mirror);

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut ops = Vec::new();
        let state = boss.boss.as_mut().expect("boss state");
        state.phase_changed = false;
        step_boss_schedule(
            state,
            Vec2::ZERO,
            0.0,
            TITAN_REGEN_INTERVAL,
            &mut rng,
            &mut ops,
        );

        let state = boss.boss.as_ref().expect("boss state");
        assert!(state.shield_active);
        assert_eq!(state.shield_health, TITAN_SHIELD_REGEN);
    }

    #[test]
    fn regen_skips_the_tick_a_phase_transition_fired() {
        let (mut arena, handle) = arena_with_boss(BossKind::MegaCorpTitan);
        let boss = arena.resolve_mut(handle).expect("live boss");
        // 100 shield + 160 health: crosses the 20% threshold of a 4-phase boss.
        let outcome = boss.take_damage(260, DefenseKind::Mirror);
        assert!(outcome.phase_change.is_some());

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut ops = Vec::new();
        let state = boss.boss.as_mut().expect("boss state");
        step_boss_schedule(
            state,
            Vec2::ZERO,
            0.0,
            TITAN_REGEN_INTERVAL,
            &mut rng,
            &mut ops,
        );
        assert_eq!(
            boss.boss.as_ref().expect("boss state").shield_health,
            0.0,
            "regen must stand down during the transition tick",
        );
    }

    #[test]
    fn raid_team_schedule_spawns_minions_and_blasts() {
        let (mut arena, handle) = arena_with_boss(BossKind::RaidTeam);
        let boss = arena.resolve_mut(handle).expect("live boss");
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut ops = Vec::new();

        let state = boss.boss.as_mut().expect("boss state");
        step_boss_schedule(state, Vec2::ZERO, 0.1, RAID_BLAST_INTERVAL, &mut rng, &mut ops);

        assert!(ops.iter().any(|op| matches!(
            op,
            EnemyOp::SpawnMinions { count: 4, .. }
        )));
        assert!(ops.iter().any(|op| matches!(op, EnemyOp::EmpBlast { .. })));
    }

    #[test]
    fn frozen_enemies_do_not_move() {
        let path = straight_path();
        let mut arena = EnemyArena::default();
        let handle = arena.spawn(EnemyKind::FederalAgent, 1.0, path.points()[0]);
        let enemy = arena.resolve_mut(handle).expect("live enemy");
        enemy
            .effects
            .apply(EffectKind::Frozen, Duration::from_millis(1_000), 1.0);
        let before = enemy.position;

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut ops = Vec::new();
        step_enemy(
            enemy,
            handle,
            &path,
            Duration::from_millis(500),
            &[],
            &[],
            &mut rng,
            &mut ops,
        );

        assert_eq!(enemy.position, before);
    }

    #[test]
    fn monk_aura_heals_kin_and_corrupts_defenses() {
        let path = straight_path();
        let mut arena = EnemyArena::default();
        let monk = arena.spawn(EnemyKind::CorruptedMonk, 1.0, path.points()[0]);
        let kin = arena.spawn(EnemyKind::CorruptedMonk, 1.0, path.points()[0]);

        let probes = vec![
            EnemyProbe {
                handle: monk,
                kind: EnemyKind::CorruptedMonk,
                position: path.points()[0],
            },
            EnemyProbe {
                handle: kin,
                kind: EnemyKind::CorruptedMonk,
                position: path.points()[0] + Vec2::new(50.0, 0.0),
            },
        ];
        let defenses = vec![
            DefenseProbe {
                id: DefenseId::new(0),
                position: path.points()[0] + Vec2::new(60.0, 0.0),
                cloaked: false,
            },
            DefenseProbe {
                id: DefenseId::new(1),
                position: path.points()[0] + Vec2::new(60.0, 0.0),
                cloaked: true,
            },
        ];

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut ops = Vec::new();
        let enemy = arena.resolve_mut(monk).expect("live monk");
        step_enemy(
            enemy,
            monk,
            &path,
            Duration::from_millis(100),
            &probes,
            &defenses,
            &mut rng,
            &mut ops,
        );

        assert!(ops.iter().any(|op| matches!(
            op,
            EnemyOp::HealKin { target, .. } if *target == kin
        )));
        assert!(ops.iter().any(|op| matches!(
            op,
            EnemyOp::CorruptDefense { defense } if *defense == DefenseId::new(0)
        )));
        assert!(
            !ops.iter().any(|op| matches!(
                op,
                EnemyOp::CorruptDefense { defense } if *defense == DefenseId::new(1)
            )),
            "cloaked defenses are hidden from the aura",
        );
    }
}
