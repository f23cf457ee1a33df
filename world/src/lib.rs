#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Darknet Defence.
//!
//! The world owns every live actor and is the only place state mutates.
//! Adapters submit [`Command`] values through [`apply`]; the world executes
//! them, collects [`Event`] values into the caller's buffer, and exposes
//! read-only views through [`query`]. A [`Command::Tick`] runs the whole
//! fixed-order simulation pipeline atomically: wave spawns, enemy movement,
//! defense targeting and firing, projectile flight, damage resolution, and
//! pruning.

mod defenses;
mod economy;
mod effects;
mod enemies;
mod path;
mod projectiles;
mod snapshot;
mod waves;

use std::time::Duration;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use darknet_defence_core::{
    Command, DefenseId, DefenseKind, EffectKind, EnemyHandle, EnemyKind, Event, GamePhase,
    GridCell, GridPreset, PathShape, RejectReason, Resources, SpawnKind, MAX_DEFENSE_LEVEL,
    MAX_WAVES, RNG_STREAM_PATH, RNG_STREAM_SIM, SPECIAL_ACTIVE_DURATION, SPECIAL_COOLDOWN,
    WELCOME_BANNER,
};

use crate::defenses::{upgrade_cost, DefenseRegistry, TargetCandidate, SELL_REFUND_FRACTION};
use crate::economy::Ledger;
use crate::enemies::{boss_base_kind, DefenseProbe, EnemyArena, EnemyOp, EnemyProbe};
use crate::path::PathPlan;
use crate::projectiles::{HitRecord, ImpactProbe, ProjectileArena};
use crate::waves::WaveScheduler;

/// Grid columns of the playing field.
pub const FIELD_COLUMNS: u32 = 20;
/// Grid rows of the playing field.
pub const FIELD_ROWS: u32 = 15;

const RESOURCE_BOOST_FACTOR: f64 = 2.0;
const MINION_SCATTER: f32 = 20.0;
const EMP_BLAST_RADIUS: f32 = 200.0;
const EMP_DURATION: Duration = Duration::from_millis(3_000);
const THEFT_FRACTION: f64 = 0.1;
const SCRAMBLE_ON_FIRE: Duration = Duration::from_millis(2_000);
const SCRAMBLE_ON_HIT: Duration = Duration::from_millis(1_000);
const CLOAK_ON_FIRE: Duration = Duration::from_millis(3_000);
const STEALTH_ON_HIT: Duration = Duration::from_millis(500);
const BOOST_ON_FIRE: Duration = Duration::from_millis(2_000);
const BOOST_ON_SPLASH: Duration = Duration::from_millis(1_000);
const SPLASH_RADIUS: f32 = 50.0;
const SPLASH_BOOST_RADIUS: f32 = 100.0;
const ENCRYPT_PROJECTILES: Duration = Duration::from_millis(3_000);
const MONK_CORRUPT_DURATION: Duration = Duration::from_millis(1_000);

/// Describes the discrete cell layout of the playing field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridGeometry {
    columns: u32,
    rows: u32,
    cell_length: f32,
}

impl GridGeometry {
    fn new(preset: GridPreset) -> Self {
        Self {
            columns: FIELD_COLUMNS,
            rows: FIELD_ROWS,
            cell_length: preset.cell_length(),
        }
    }

    /// Number of columns contained in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows contained in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Side length of a single square cell expressed in world units.
    #[must_use]
    pub const fn cell_length(&self) -> f32 {
        self.cell_length
    }

    /// Total width of the field measured in world units.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.columns as f32 * self.cell_length
    }

    /// Total height of the field measured in world units.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.rows as f32 * self.cell_length
    }

    /// Reports whether the cell lies inside the field.
    #[must_use]
    pub const fn contains(&self, cell: GridCell) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }
}

/// Represents the authoritative Darknet Defence world state.
#[derive(Clone, Debug, PartialEq)]
pub struct World {
    banner: &'static str,
    pub(crate) seed: u64,
    pub(crate) shape: PathShape,
    pub(crate) preset: GridPreset,
    pub(crate) grid: GridGeometry,
    pub(crate) path: PathPlan,
    pub(crate) phase: GamePhase,
    pub(crate) paused: bool,
    pub(crate) clock: Duration,
    pub(crate) ledger: Ledger,
    pub(crate) boost_remaining: Duration,
    pub(crate) enemies: EnemyArena,
    pub(crate) defenses: DefenseRegistry,
    pub(crate) projectiles: ProjectileArena,
    pub(crate) scheduler: WaveScheduler,
    pub(crate) selected_defense: Option<DefenseKind>,
    sim_rng: ChaCha8Rng,
}

impl World {
    /// Creates a world running a fresh campaign with the default setup.
    #[must_use]
    pub fn new() -> Self {
        Self::new_campaign(0, PathShape::Default, GridPreset::Standard)
    }

    pub(crate) fn new_campaign(seed: u64, shape: PathShape, preset: GridPreset) -> Self {
        let grid = GridGeometry::new(preset);
        let path = PathPlan::generate(
            derive_stream_seed(seed, RNG_STREAM_PATH),
            shape,
            grid.width(),
            grid.height(),
        );
        Self {
            banner: WELCOME_BANNER,
            seed,
            shape,
            preset,
            grid,
            path,
            phase: GamePhase::Playing,
            paused: false,
            clock: Duration::ZERO,
            ledger: Ledger::new(),
            boost_remaining: Duration::ZERO,
            enemies: EnemyArena::default(),
            defenses: DefenseRegistry::default(),
            projectiles: ProjectileArena::default(),
            scheduler: WaveScheduler::default(),
            selected_defense: None,
            sim_rng: ChaCha8Rng::seed_from_u64(derive_stream_seed(seed, RNG_STREAM_SIM)),
        }
    }

    /// Multiplier applied when crediting rewards.
    fn reward_boost(&self) -> f64 {
        if self.boost_remaining.is_zero() {
            1.0
        } else {
            RESOURCE_BOOST_FACTOR
        }
    }

    fn validate_placement(&self, cell: GridCell, kind: DefenseKind) -> Result<(), RejectReason> {
        if self.phase != GamePhase::Playing {
            return Err(RejectReason::GameNotActive);
        }
        if !self.grid.contains(cell) {
            return Err(RejectReason::CellOutOfBounds);
        }
        if self.defenses.is_occupied(cell) {
            return Err(RejectReason::CellOccupied);
        }
        if self.path.is_on_path(cell.center(self.grid.cell_length())) {
            return Err(RejectReason::CellOnPath);
        }
        if !self.ledger.can_afford(&kind.spec().cost) {
            return Err(RejectReason::InsufficientResources);
        }
        Ok(())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives the seed of a named random stream from the campaign seed.
pub(crate) fn derive_stream_seed(seed: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[0..8].try_into().expect("sha256 digest slice length");
    u64::from_le_bytes(bytes)
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    let balance_before = world.ledger.resources();

    match command {
        Command::NewGame {
            seed,
            shape,
            preset,
        } => {
            *world = World::new_campaign(seed, shape, preset);
            out_events.push(Event::GameStarted { seed, shape });
        }
        Command::Tick { dt } => {
            if world.phase == GamePhase::Playing && !world.paused && !dt.is_zero() {
                run_tick(world, dt, out_events);
            }
        }
        Command::StartWave => match world.scheduler.request_start() {
            Ok(wave) => out_events.push(Event::WavePlanNeeded { wave }),
            Err(reason) => out_events.push(Event::CommandRejected { reason }),
        },
        Command::BeginWave { wave, plan } => {
            if world.scheduler.begin(wave, &plan) {
                out_events.push(Event::WaveStarted { wave });
            } else {
                out_events.push(Event::CommandRejected {
                    reason: RejectReason::WaveAlreadyInProgress,
                });
            }
        }
        Command::PlaceDefense { cell, kind } => match world.validate_placement(cell, kind) {
            Ok(()) => {
                let debited = world.ledger.debit(&kind.spec().cost);
                debug_assert!(debited);
                let center = cell.center(world.grid.cell_length());
                let id = world.defenses.place(kind, cell, center);
                out_events.push(Event::DefensePlaced {
                    defense: id,
                    kind,
                    cell,
                });
            }
            Err(reason) => out_events.push(Event::CommandRejected { reason }),
        },
        Command::UpgradeDefense { id } => {
            let outcome = try_upgrade(world, id);
            match outcome {
                Ok(level) => out_events.push(Event::DefenseUpgraded { defense: id, level }),
                Err(reason) => out_events.push(Event::CommandRejected { reason }),
            }
        }
        Command::SellDefense { id } => match world.defenses.remove(id) {
            Some(state) => {
                let refund = state.invested.scaled(SELL_REFUND_FRACTION);
                world.ledger.credit(&refund, 1.0);
                out_events.push(Event::DefenseSold {
                    defense: id,
                    refund,
                });
            }
            None => out_events.push(Event::CommandRejected {
                reason: RejectReason::UnknownDefense,
            }),
        },
        Command::ActivateSpecial { id } => {
            let outcome = try_activate_special(world, id);
            match outcome {
                Ok(kind) => out_events.push(Event::SpecialActivated { defense: id, kind }),
                Err(reason) => out_events.push(Event::CommandRejected { reason }),
            }
        }
        Command::SetPaused { paused } => {
            world.paused = paused;
        }
        Command::SelectDefense { kind } => {
            world.selected_defense = kind;
        }
        Command::CreditResources { amount } => {
            world.ledger.credit(&amount, 1.0);
        }
        Command::RestoreGame { document } => match snapshot::restore(&document) {
            Ok(restored) => {
                let wave = restored.scheduler.current_wave();
                *world = restored;
                out_events.push(Event::GameRestored { wave });
            }
            Err(error) => out_events.push(Event::CommandRejected {
                reason: RejectReason::SaveRejected(error),
            }),
        },
    }

    let balance_after = world.ledger.resources();
    if balance_after != balance_before {
        out_events.push(Event::ResourcesUpdated {
            resources: balance_after,
        });
    }
}

fn try_upgrade(world: &mut World, id: DefenseId) -> Result<u8, RejectReason> {
    let (kind, level) = match world.defenses.get(id) {
        Some(defense) => (defense.kind, defense.level),
        None => return Err(RejectReason::UnknownDefense),
    };
    if level >= MAX_DEFENSE_LEVEL {
        return Err(RejectReason::MaxLevelReached);
    }
    let cost = upgrade_cost(kind, level);
    if !world.ledger.debit(&cost) {
        return Err(RejectReason::InsufficientResources);
    }
    let defense = world
        .defenses
        .get_mut(id)
        .expect("defense looked up above");
    defense.level += 1;
    defense.invested = defense.invested.saturating_add(&cost);
    Ok(defense.level)
}

fn try_activate_special(world: &mut World, id: DefenseId) -> Result<DefenseKind, RejectReason> {
    let (kind, center, range) = {
        let defense = world
            .defenses
            .get(id)
            .ok_or(RejectReason::UnknownDefense)?;
        if !defense.is_active() {
            return Err(RejectReason::DefenseInactive);
        }
        if !defense.special_cooldown_remaining.is_zero()
            || !defense.special_active_remaining.is_zero()
        {
            return Err(RejectReason::SpecialOnCooldown);
        }
        (defense.kind, defense.center, defense.effective_range())
    };

    {
        let defense = world
            .defenses
            .get_mut(id)
            .expect("defense looked up above");
        defense.special_active_remaining = SPECIAL_ACTIVE_DURATION;
        defense.special_cooldown_remaining = SPECIAL_COOLDOWN;
    }

    match kind {
        DefenseKind::Firewall | DefenseKind::Decoy => {}
        DefenseKind::Encryption => {
            for projectile in world.projectiles.iter_mut() {
                projectile.encrypted_remaining = ENCRYPT_PROJECTILES;
            }
        }
        DefenseKind::Mirror => {
            let defense = world
                .defenses
                .get_mut(id)
                .expect("defense looked up above");
            defense
                .effects
                .apply(EffectKind::Reflection, SPECIAL_ACTIVE_DURATION, 1.0);
        }
        DefenseKind::Anonymity => {
            let reach = range * 1.5;
            for defense in world.defenses.iter_mut() {
                if defense.id != id && defense.center.distance(center) <= reach {
                    defense
                        .effects
                        .apply(EffectKind::Cloaked, SPECIAL_ACTIVE_DURATION, 1.0);
                }
            }
        }
        DefenseKind::Distributor => {
            world.boost_remaining = SPECIAL_ACTIVE_DURATION;
        }
    }

    Ok(kind)
}

/// Cross-actor effect queued during the defense phase and applied during
/// damage resolution, so firing order inside the phase cannot matter.
#[derive(Clone, Copy, Debug)]
enum PendingEffect {
    Enemy {
        target: EnemyHandle,
        kind: EffectKind,
        duration: Duration,
    },
    Defense {
        target: DefenseId,
        kind: EffectKind,
        duration: Duration,
    },
}

fn run_tick(world: &mut World, dt: Duration, out_events: &mut Vec<Event>) {
    world.clock = world.clock.saturating_add(dt);
    out_events.push(Event::TimeAdvanced { dt });

    // Wave spawns.
    let mut orders = Vec::new();
    let plan_needed = world.scheduler.advance(dt, &mut orders);
    if plan_needed {
        if let Some(wave) = world.scheduler.plan_requested() {
            out_events.push(Event::WavePlanNeeded { wave });
        }
    }
    let spawn_point = world.path.points()[0];
    for order in orders {
        let (handle, kind) = match order.kind {
            SpawnKind::Enemy(kind) => (
                world.enemies.spawn(kind, order.health_scale, spawn_point),
                kind,
            ),
            SpawnKind::Boss(kind) => (
                world
                    .enemies
                    .spawn_boss(kind, order.health_scale, spawn_point),
                boss_base_kind(kind),
            ),
        };
        let id = world
            .enemies
            .resolve(handle)
            .expect("freshly spawned enemy resolves")
            .id;
        out_events.push(Event::EnemySpawned { enemy: id, kind });
    }

    // Start-of-tick probes; every aura and passive reads these.
    let enemy_probes: Vec<EnemyProbe> = world
        .enemies
        .handles()
        .into_iter()
        .filter_map(|handle| {
            world.enemies.resolve(handle).map(|enemy| EnemyProbe {
                handle,
                kind: enemy.kind,
                position: enemy.position,
            })
        })
        .collect();
    let defense_probes: Vec<DefenseProbe> = world
        .defenses
        .iter()
        .map(|defense| DefenseProbe {
            id: defense.id,
            position: defense.center,
            cloaked: defense.effects.has(EffectKind::Cloaked),
        })
        .collect();

    // Enemy phase.
    let mut ops = Vec::new();
    for handle in world.enemies.handles() {
        if let Some(enemy) = world.enemies.resolve_mut(handle) {
            enemies::step_enemy(
                enemy,
                handle,
                &world.path,
                dt,
                &enemy_probes,
                &defense_probes,
                &mut world.sim_rng,
                &mut ops,
            );
        }
    }
    apply_enemy_ops(world, ops, out_events);

    // Defense phase: timers, targeting, firing.
    let mut pending_effects = Vec::new();
    run_defense_phase(world, dt, &mut pending_effects, out_events);

    // Projectile phase.
    let impact_probes: Vec<ImpactProbe> = world
        .enemies
        .handles()
        .into_iter()
        .filter_map(|handle| {
            world.enemies.resolve(handle).and_then(|enemy| {
                if enemy.dead || enemy.reached_end {
                    None
                } else {
                    Some(ImpactProbe {
                        handle,
                        id: enemy.id,
                        position: enemy.position,
                        size: enemy.size,
                    })
                }
            })
        })
        .collect();
    let mut hits = Vec::new();
    let (field_width, field_height) = (world.grid.width(), world.grid.height());
    for projectile in world.projectiles.iter_mut() {
        projectiles::step_projectile(
            projectile,
            dt,
            &impact_probes,
            field_width,
            field_height,
            &mut hits,
        );
    }

    // Damage resolution and death bookkeeping.
    resolve_hits(world, &hits, out_events);
    for effect in pending_effects {
        match effect {
            PendingEffect::Enemy {
                target,
                kind,
                duration,
            } => {
                if let Some(enemy) = world.enemies.resolve_mut(target) {
                    if !enemy.dead && !enemy.reached_end {
                        enemy.effects.apply(kind, duration, 1.0);
                    }
                }
            }
            PendingEffect::Defense {
                target,
                kind,
                duration,
            } => {
                if let Some(defense) = world.defenses.get_mut(target) {
                    defense.effects.apply(kind, duration, 1.0);
                }
            }
        }
    }
    resolve_escapes(world, out_events);

    // Wave completion.
    let fighting_remains = world
        .enemies
        .iter()
        .any(|enemy| !enemy.dead && !enemy.reached_end);
    if world.scheduler.wave_in_progress()
        && world.scheduler.all_exhausted()
        && !fighting_remains
    {
        let wave = world.scheduler.current_wave();
        let base = 50 + 10 * u64::from(wave.get());
        let bonus = Resources::new(
            base,
            (base as f64 * 0.5).floor() as u64,
            (base as f64 * 0.3).floor() as u64,
        );
        world.ledger.credit(&bonus, world.reward_boost());
        world.ledger.add_score(100 * u64::from(wave.get()));
        world.scheduler.finish_wave();
        out_events.push(Event::WaveCompleted { wave, bonus });

        if wave.get() >= MAX_WAVES && world.phase == GamePhase::Playing {
            world.phase = GamePhase::Victory;
            out_events.push(Event::Victory {
                score: world.ledger.score(),
            });
        }
    }

    world.boost_remaining = world.boost_remaining.saturating_sub(dt);

    // Prune.
    world.enemies.prune();
    world.projectiles.prune();
}

fn apply_enemy_ops(world: &mut World, ops: Vec<EnemyOp>, out_events: &mut Vec<Event>) {
    for op in ops {
        match op {
            EnemyOp::HealKin { target, amount } => {
                if let Some(enemy) = world.enemies.resolve_mut(target) {
                    if !enemy.dead && !enemy.reached_end {
                        enemy.health = (enemy.health + amount).min(enemy.max_health);
                    }
                }
            }
            EnemyOp::CorruptDefense { defense } => {
                if let Some(state) = world.defenses.get_mut(defense) {
                    state
                        .effects
                        .apply(EffectKind::Corrupted, MONK_CORRUPT_DURATION, 1.0);
                    state.destroyed = true;
                }
            }
            EnemyOp::SpawnMinions {
                position,
                progress,
                count,
            } => {
                let waypoint = world.path.waypoint_after(progress);
                for _ in 0..count {
                    let offset = Vec2::new(
                        world.sim_rng.gen_range(-MINION_SCATTER..=MINION_SCATTER),
                        world.sim_rng.gen_range(-MINION_SCATTER..=MINION_SCATTER),
                    );
                    let handle =
                        world
                            .enemies
                            .spawn_minion(position + offset, progress, waypoint);
                    let id = world
                        .enemies
                        .resolve(handle)
                        .expect("freshly spawned minion resolves")
                        .id;
                    out_events.push(Event::EnemySpawned {
                        enemy: id,
                        kind: EnemyKind::ScriptKiddie,
                    });
                }
            }
            EnemyOp::EmpBlast { position } => {
                for defense in world.defenses.iter_mut() {
                    if defense.effects.has(EffectKind::Cloaked) {
                        continue;
                    }
                    if defense.center.distance(position) <= EMP_BLAST_RADIUS {
                        defense.effects.apply(EffectKind::Emp, EMP_DURATION, 1.0);
                    }
                }
            }
            EnemyOp::StealResources => {
                let amount = world.ledger.resources().scaled(THEFT_FRACTION);
                if !amount.is_zero() {
                    world.ledger.forfeit(&amount);
                    out_events.push(Event::ResourcesStolen { amount });
                }
            }
        }
    }
}

fn run_defense_phase(
    world: &mut World,
    dt: Duration,
    pending_effects: &mut Vec<PendingEffect>,
    out_events: &mut Vec<Event>,
) {
    let candidates: Vec<TargetCandidate> = world
        .enemies
        .handles()
        .into_iter()
        .filter_map(|handle| {
            world.enemies.resolve(handle).and_then(|enemy| {
                if enemy.dead || enemy.reached_end {
                    None
                } else {
                    Some(TargetCandidate {
                        handle,
                        id: enemy.id,
                        position: enemy.position,
                        progress: enemy.progress,
                        health: enemy.health,
                        max_health: enemy.max_health,
                        speed: enemy.base_speed,
                        reward_dharma: enemy.reward.dharma,
                        stealthed: enemy.effects.has(EffectKind::Stealthed),
                    })
                }
            })
        })
        .collect();

    let now = world.clock;
    let mut shots = Vec::new();
    for id in world.defenses.ids() {
        let Some(defense) = world.defenses.get_mut(id) else {
            continue;
        };
        defense.tick_timers(dt);

        if defense.kind == DefenseKind::Decoy || !defense.is_active() {
            defense.target = None;
            continue;
        }

        let range = defense.effective_range();
        let center = defense.center;

        // A bound target goes stale once it dies, escapes, or leaves range.
        let still_valid = defense.target.is_some_and(|target| {
            candidates.iter().any(|candidate| {
                candidate.handle == target && candidate.position.distance(center) <= range
            })
        });
        if !still_valid {
            defense.target = defenses::select_target(center, range, &candidates);
        }

        let Some(target) = defense.target else {
            continue;
        };
        let Some(candidate) = candidates
            .iter()
            .find(|candidate| candidate.handle == target)
        else {
            continue;
        };

        let aim = candidate.position - center;
        defense.facing = aim.y.atan2(aim.x);

        if !defense.ready_to_fire(now) {
            continue;
        }
        defense.last_fire = Some(now);

        shots.push((
            id,
            defense.kind,
            center,
            range,
            defense.effective_damage(),
            defense.effective_projectile_speed(),
            target,
            candidate.id,
            candidate.position,
        ));
    }

    for (id, kind, center, range, damage, speed, target, target_id, aim) in shots {
        let projectile = world
            .projectiles
            .fire(kind, id, center, aim, speed, damage, target);
        out_events.push(Event::DefenseFired {
            defense: id,
            projectile,
            target: target_id,
        });

        match kind {
            DefenseKind::Encryption => {
                let reach = range / 2.0;
                for candidate in &candidates {
                    if candidate.position.distance(center) <= reach {
                        pending_effects.push(PendingEffect::Enemy {
                            target: candidate.handle,
                            kind: EffectKind::Scrambled,
                            duration: SCRAMBLE_ON_FIRE,
                        });
                    }
                }
            }
            DefenseKind::Anonymity => {
                queue_ally_buff(
                    world,
                    id,
                    center,
                    range * 0.7,
                    EffectKind::Cloaked,
                    CLOAK_ON_FIRE,
                    pending_effects,
                );
            }
            DefenseKind::Distributor => {
                queue_ally_buff(
                    world,
                    id,
                    center,
                    range * 0.8,
                    EffectKind::Boosted,
                    BOOST_ON_FIRE,
                    pending_effects,
                );
            }
            _ => {}
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn queue_ally_buff(
    world: &World,
    source: DefenseId,
    center: Vec2,
    reach: f32,
    kind: EffectKind,
    duration: Duration,
    pending_effects: &mut Vec<PendingEffect>,
) {
    for defense in world.defenses.iter() {
        if defense.id != source && defense.center.distance(center) <= reach {
            pending_effects.push(PendingEffect::Defense {
                target: defense.id,
                kind,
                duration,
            });
        }
    }
}

fn resolve_hits(world: &mut World, hits: &[HitRecord], out_events: &mut Vec<Event>) {
    for hit in hits {
        apply_damage_packet(world, hit.target, hit.damage, hit, true, out_events);

        match hit.kind {
            DefenseKind::Encryption => {
                if let Some(enemy) = world.enemies.resolve_mut(hit.target) {
                    if !enemy.dead && !enemy.reached_end {
                        enemy
                            .effects
                            .apply(EffectKind::Scrambled, SCRAMBLE_ON_HIT, 1.0);
                    }
                }
            }
            DefenseKind::Anonymity => {
                if let Some(enemy) = world.enemies.resolve_mut(hit.target) {
                    if !enemy.dead && !enemy.reached_end {
                        enemy
                            .effects
                            .apply(EffectKind::Stealthed, STEALTH_ON_HIT, 1.0);
                    }
                }
            }
            DefenseKind::Distributor => {
                let splash_damage = hit.damage / 2;
                let victims: Vec<EnemyHandle> = world
                    .enemies
                    .handles()
                    .into_iter()
                    .filter(|handle| {
                        *handle != hit.target
                            && world.enemies.resolve(*handle).is_some_and(|enemy| {
                                !enemy.dead
                                    && !enemy.reached_end
                                    && enemy.position.distance(hit.position) <= SPLASH_RADIUS
                            })
                    })
                    .collect();
                for victim in victims {
                    apply_damage_packet(world, victim, splash_damage, hit, false, out_events);
                }

                for defense in world.defenses.iter_mut() {
                    if defense.center.distance(hit.position) <= SPLASH_BOOST_RADIUS {
                        defense
                            .effects
                            .apply(EffectKind::Boosted, BOOST_ON_SPLASH, 1.0);
                    }
                }
            }
            _ => {}
        }
    }
}

fn apply_damage_packet(
    world: &mut World,
    target: EnemyHandle,
    damage: u32,
    hit: &HitRecord,
    direct: bool,
    out_events: &mut Vec<Event>,
) {
    let Some(enemy) = world.enemies.resolve_mut(target) else {
        return;
    };
    if enemy.dead || enemy.reached_end || damage == 0 {
        return;
    }

    let outcome = enemy.take_damage(damage, hit.kind);
    let enemy_id = enemy.id;
    let enemy_kind = enemy.kind;
    let was_boss = enemy.boss.is_some();
    let reward = enemy.reward;

    if direct {
        out_events.push(Event::ProjectileHit {
            projectile: hit.projectile,
            enemy: enemy_id,
            damage,
        });
    }
    if outcome.shield_broken {
        out_events.push(Event::ShieldBroken { enemy: enemy_id });
    }
    if let Some((from, to)) = outcome.phase_change {
        out_events.push(Event::BossPhaseChange {
            enemy: enemy_id,
            from,
            to,
        });
    }
    if outcome.died {
        world.ledger.credit(&reward, world.reward_boost());
        world.ledger.add_score(reward.dharma);
        if let Some(defense) = world.defenses.get_mut(hit.origin) {
            defense.experience = defense.experience.saturating_add(reward.dharma);
        }
        out_events.push(Event::EnemyKilled {
            enemy: enemy_id,
            kind: enemy_kind,
            boss: was_boss,
            reward,
        });
    }
}

fn resolve_escapes(world: &mut World, out_events: &mut Vec<Event>) {
    let escaped: Vec<EnemyHandle> = world
        .enemies
        .handles()
        .into_iter()
        .filter(|handle| {
            world
                .enemies
                .resolve(*handle)
                .is_some_and(|enemy| enemy.reached_end && !enemy.dead)
        })
        .collect();

    for handle in escaped {
        let (id, lives_lost) = {
            let enemy = world
                .enemies
                .resolve(handle)
                .expect("escaped enemy resolves");
            (enemy.id, enemy.escape_damage())
        };
        let remaining = world.ledger.lose_lives(lives_lost);
        out_events.push(Event::EnemyReachedEnd {
            enemy: id,
            lives_lost,
        });

        if remaining == 0 && world.phase == GamePhase::Playing {
            world.phase = GamePhase::GameOver;
            out_events.push(Event::GameOver {
                wave: world.scheduler.current_wave(),
                score: world.ledger.score(),
            });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use glam::Vec2;

    use darknet_defence_core::{
        BossSnapshot, DefenseKind, DefenseSnapshot, DefenseView, EnemySnapshot, EnemyView,
        GameStatus, GridCell, PathShape, ProjectileSnapshot, ProjectileView, RejectReason,
        Resources, SaveDocument,
    };

    use super::{GridGeometry, World};

    /// Retrieves the welcome banner that adapters may display to players.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Seed driving the campaign's random streams.
    #[must_use]
    pub fn seed(world: &World) -> u64 {
        world.seed
    }

    /// Shape of the campaign's path.
    #[must_use]
    pub fn path_shape(world: &World) -> PathShape {
        world.shape
    }

    /// Provides read-only access to the field's grid layout.
    #[must_use]
    pub fn grid(world: &World) -> GridGeometry {
        world.grid
    }

    /// Ordered waypoints of the campaign's path.
    #[must_use]
    pub fn path_points(world: &World) -> &[Vec2] {
        world.path.points()
    }

    /// Aggregate campaign status.
    #[must_use]
    pub fn status(world: &World) -> GameStatus {
        GameStatus {
            phase: world.phase,
            paused: world.paused,
            resources: world.ledger.resources(),
            lives: world.ledger.lives(),
            wave: world.scheduler.current_wave(),
            wave_in_progress: world.scheduler.wave_in_progress(),
            score: world.ledger.score(),
            clock: world.clock,
        }
    }

    /// Reports whether the ledger covers the provided cost.
    #[must_use]
    pub fn can_afford(world: &World, cost: &Resources) -> bool {
        world.ledger.can_afford(cost)
    }

    /// Checks every placement precondition for the cell and kind.
    pub fn can_place(world: &World, cell: GridCell, kind: DefenseKind) -> Result<(), RejectReason> {
        world.validate_placement(cell, kind)
    }

    /// Captures a read-only view of every live enemy, in identity order.
    #[must_use]
    pub fn enemy_view(world: &World) -> EnemyView {
        let mut snapshots: Vec<EnemySnapshot> = world
            .enemies
            .iter()
            .filter(|enemy| !enemy.dead && !enemy.reached_end)
            .map(|enemy| EnemySnapshot {
                id: enemy.id,
                kind: enemy.kind,
                position: enemy.position,
                health: enemy.health,
                max_health: enemy.max_health,
                waypoint: enemy.waypoint,
                progress: enemy.progress,
                effects: enemy.effects.all(),
                boss: enemy.boss.as_ref().map(|boss| BossSnapshot {
                    kind: boss.kind,
                    phase: boss.phase,
                    phases: boss.phases,
                    shield_active: boss.shield_active,
                    shield_health: boss.shield_health,
                    shield_max: boss.shield_max,
                }),
            })
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.id);
        EnemyView::from_snapshots(snapshots)
    }

    /// Captures a read-only view of every defense, in identity order.
    #[must_use]
    pub fn defense_view(world: &World) -> DefenseView {
        let snapshots: Vec<DefenseSnapshot> = world
            .defenses
            .iter()
            .map(|defense| DefenseSnapshot {
                id: defense.id,
                kind: defense.kind,
                cell: defense.cell,
                center: defense.center,
                level: defense.level,
                experience: defense.experience,
                target: defense
                    .target
                    .and_then(|target| world.enemies.resolve(target))
                    .map(|enemy| enemy.id),
                facing: defense.facing,
                active: defense.is_active(),
                special_active: !defense.special_active_remaining.is_zero(),
                special_ready_in: defense.special_cooldown_remaining,
                effects: defense.effects.all(),
            })
            .collect();
        DefenseView::from_snapshots(snapshots)
    }

    /// Captures a read-only view of every projectile, in identity order.
    #[must_use]
    pub fn projectile_view(world: &World) -> ProjectileView {
        let mut snapshots: Vec<ProjectileSnapshot> = world
            .projectiles
            .iter()
            .map(|projectile| ProjectileSnapshot {
                id: projectile.id,
                kind: projectile.kind,
                position: projectile.position,
                velocity: projectile.velocity,
                radius: projectile.radius,
                damage: projectile.damage,
            })
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.id);
        ProjectileView::from_snapshots(snapshots)
    }

    /// Defense kind the player currently has selected, if any.
    #[must_use]
    pub fn selected_defense(world: &World) -> Option<DefenseKind> {
        world.selected_defense
    }

    /// Remaining inter-wave countdown, zero when disarmed.
    #[must_use]
    pub fn wave_timer(world: &World) -> Duration {
        world.scheduler.wave_timer()
    }

    /// Serializes the entire campaign into a versioned save document.
    #[must_use]
    pub fn save_document(world: &World, timestamp: u64) -> SaveDocument {
        super::snapshot::capture(world, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darknet_defence_core::{
        EnemyKind, SpawnGroup, WaveId, WavePlan, DEFAULT_SPAWN_DELAY, INITIAL_RESOURCES,
    };

    fn collect(world: &mut World, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        apply(world, command, &mut events);
        events
    }

    fn off_path_cell(world: &World) -> GridCell {
        for row in 0..FIELD_ROWS {
            for column in 0..FIELD_COLUMNS {
                let cell = GridCell::new(column, row);
                if query::can_place(world, cell, DefenseKind::Firewall).is_ok() {
                    return cell;
                }
            }
        }
        panic!("no placeable cell on the field");
    }

    fn begin_wave(world: &mut World, plan: WavePlan) -> Vec<Event> {
        let events = collect(world, Command::StartWave);
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::WavePlanNeeded { .. })));
        collect(
            world,
            Command::BeginWave {
                wave: WaveId::new(1),
                plan,
            },
        )
    }

    fn kiddie_plan(count: u32) -> WavePlan {
        WavePlan::new(vec![SpawnGroup {
            kind: SpawnKind::Enemy(EnemyKind::ScriptKiddie),
            count,
            spawn_delay: DEFAULT_SPAWN_DELAY,
            health_scale: 1.0,
        }])
    }

    #[test]
    fn placement_debits_resources_and_occupies_the_cell() {
        let mut world = World::new_campaign(42, PathShape::Default, GridPreset::Standard);
        assert_eq!(query::status(&world).resources, INITIAL_RESOURCES);
        let cell = off_path_cell(&world);

        let events = collect(
            &mut world,
            Command::PlaceDefense {
                cell,
                kind: DefenseKind::Firewall,
            },
        );

        assert!(events
            .iter()
            .any(|event| matches!(event, Event::DefensePlaced { .. })));
        assert_eq!(
            query::status(&world).resources,
            Resources::new(75, 50, 75),
        );

        let events = collect(
            &mut world,
            Command::PlaceDefense {
                cell,
                kind: DefenseKind::Firewall,
            },
        );
        assert_eq!(
            events,
            vec![Event::CommandRejected {
                reason: RejectReason::CellOccupied,
            }],
        );
        assert_eq!(
            query::status(&world).resources,
            Resources::new(75, 50, 75),
            "a rejected command must not mutate the ledger",
        );
    }

    #[test]
    fn undefended_waves_leak_enemies_and_cost_lives() {
        let mut world = World::new_campaign(1, PathShape::Zigzag, GridPreset::Standard);
        let events = begin_wave(&mut world, kiddie_plan(3));
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::WaveStarted { .. })));

        let mut reached = 0;
        for _ in 0..20_000 {
            let events = collect(
                &mut world,
                Command::Tick {
                    dt: Duration::from_millis(16),
                },
            );
            reached += events
                .iter()
                .filter(|event| matches!(event, Event::EnemyReachedEnd { lives_lost: 1, .. }))
                .count();
            if events
                .iter()
                .any(|event| matches!(event, Event::WaveCompleted { .. }))
            {
                break;
            }
        }

        assert_eq!(reached, 3, "every unopposed enemy escapes exactly once");
        let status = query::status(&world);
        assert_eq!(status.lives, darknet_defence_core::INITIAL_LIVES - 3);
    }

    #[test]
    fn defended_wave_completes_with_the_advertised_bonus() {
        let mut world = World::new_campaign(1, PathShape::Zigzag, GridPreset::Standard);

        // Firewalls hugging the first path leg, so the lone enemy spends its
        // whole approach under close-range fire.
        let leg_mid = (world.path.points()[0] + world.path.points()[1]) / 2.0;
        let mut placed = 0;
        for row in 0..FIELD_ROWS {
            for column in 0..FIELD_COLUMNS {
                let cell = GridCell::new(column, row);
                let center = cell.center(world.grid.cell_length());
                if center.distance(leg_mid) <= 140.0
                    && query::can_place(&world, cell, DefenseKind::Firewall).is_ok()
                {
                    let events = collect(
                        &mut world,
                        Command::PlaceDefense {
                            cell,
                            kind: DefenseKind::Firewall,
                        },
                    );
                    if events
                        .iter()
                        .any(|event| matches!(event, Event::DefensePlaced { .. }))
                    {
                        placed += 1;
                    }
                    if placed == 3 {
                        break;
                    }
                }
            }
            if placed == 3 {
                break;
            }
        }
        assert!(placed >= 1, "at least one firewall must fit near the path");

        let _ = begin_wave(&mut world, kiddie_plan(1));

        let mut completed_bonus = None;
        let mut leaks = 0;
        for _ in 0..4_000 {
            let events = collect(
                &mut world,
                Command::Tick {
                    dt: Duration::from_millis(16),
                },
            );
            leaks += events
                .iter()
                .filter(|event| matches!(event, Event::EnemyReachedEnd { .. }))
                .count();
            if let Some(Event::WaveCompleted { bonus, .. }) = events
                .iter()
                .find(|event| matches!(event, Event::WaveCompleted { .. }))
            {
                completed_bonus = Some(*bonus);
                break;
            }
        }

        assert_eq!(
            completed_bonus,
            Some(Resources::new(60, 30, 18)),
            "wave 1 pays 50 + 10 dharma, half bandwidth, and 30% anonymity",
        );
        assert_eq!(leaks, 0, "a defended straightaway must not leak");
    }

    #[test]
    fn piercing_volley_strikes_every_lined_up_enemy_once() {
        let mut world = World::new_campaign(7, PathShape::Zigzag, GridPreset::Standard);

        let cell = off_path_cell(&world);
        let _ = collect(
            &mut world,
            Command::PlaceDefense {
                cell,
                kind: DefenseKind::Encryption,
            },
        );
        let center = cell.center(world.grid.cell_length());

        // Three tough, frozen enemies on the firing ray; the shot at the
        // nearest must carry through the other two.
        let anchor = world.path.points()[1];
        let direction = (anchor - center).normalize();
        for step in 0..3 {
            let handle = world.enemies.spawn(EnemyKind::FederalAgent, 10.0, anchor);
            let enemy = world.enemies.resolve_mut(handle).expect("spawned enemy");
            enemy.position = center + direction * (60.0 + 30.0 * step as f32);
            enemy.waypoint = 2;
            enemy
                .effects
                .apply(EffectKind::Frozen, Duration::from_secs(120), 1.0);
        }

        let mut hits = Vec::new();
        for _ in 0..200 {
            let events = collect(
                &mut world,
                Command::Tick {
                    dt: Duration::from_millis(16),
                },
            );
            for event in &events {
                if let Event::ProjectileHit {
                    projectile,
                    enemy,
                    damage,
                } = event
                {
                    hits.push((*projectile, *enemy, *damage));
                }
            }
            if hits.len() >= 3 {
                break;
            }
        }

        assert!(hits.len() >= 3, "the volley must reach all three enemies");
        let first_projectile = hits[0].0;
        let from_first: Vec<_> = hits
            .iter()
            .filter(|(projectile, _, _)| *projectile == first_projectile)
            .collect();
        assert_eq!(
            from_first.len(),
            3,
            "one piercing projectile accounts for three hits",
        );
        assert!(from_first.iter().all(|(_, _, damage)| *damage == 30));
        let mut struck: Vec<u32> = from_first.iter().map(|(_, enemy, _)| enemy.get()).collect();
        struck.sort_unstable();
        struck.dedup();
        assert_eq!(struck.len(), 3, "each enemy is struck at most once");
    }

    #[test]
    fn game_over_fires_once_when_lives_run_out() {
        let mut world = World::new_campaign(5, PathShape::Zigzag, GridPreset::Standard);

        // March 21 enemies over the end of the path.
        for _ in 0..21 {
            let end = *world.path.points().last().expect("path end");
            let handle = world.enemies.spawn(EnemyKind::ScriptKiddie, 1.0, end);
            world
                .enemies
                .resolve_mut(handle)
                .expect("spawned enemy")
                .waypoint = world.path.points().len() - 1;
        }

        let mut game_overs = 0;
        for _ in 0..600 {
            let events = collect(
                &mut world,
                Command::Tick {
                    dt: Duration::from_millis(16),
                },
            );
            game_overs += events
                .iter()
                .filter(|event| matches!(event, Event::GameOver { .. }))
                .count();
        }

        assert_eq!(game_overs, 1);
        assert_eq!(query::status(&world).phase, GamePhase::GameOver);
        assert_eq!(query::status(&world).lives, 0);
    }

    #[test]
    fn identical_seeds_and_scripts_replay_identically() {
        let script = |world: &mut World| -> Vec<Event> {
            let mut all = Vec::new();
            all.extend(collect(world, Command::StartWave));
            all.extend(collect(
                world,
                Command::BeginWave {
                    wave: WaveId::new(1),
                    plan: kiddie_plan(4),
                },
            ));
            for _ in 0..500 {
                all.extend(collect(
                    world,
                    Command::Tick {
                        dt: Duration::from_millis(16),
                    },
                ));
            }
            all
        };

        let mut first = World::new_campaign(99, PathShape::Default, GridPreset::Standard);
        let mut second = World::new_campaign(99, PathShape::Default, GridPreset::Standard);

        assert_eq!(script(&mut first), script(&mut second));
        assert_eq!(query::enemy_view(&first), query::enemy_view(&second));
        assert_eq!(query::status(&first).resources, query::status(&second).resources);
    }

    #[test]
    fn paused_worlds_ignore_tick_time() {
        let mut world = World::new_campaign(3, PathShape::Default, GridPreset::Standard);
        let _ = collect(&mut world, Command::SetPaused { paused: true });
        let events = collect(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(500),
            },
        );
        assert!(events.is_empty());
        assert_eq!(query::status(&world).clock, Duration::ZERO);
    }

    #[test]
    fn selling_refunds_seventy_percent_of_investment() {
        let mut world = World::new_campaign(11, PathShape::Default, GridPreset::Standard);
        let cell = off_path_cell(&world);
        let _ = collect(
            &mut world,
            Command::PlaceDefense {
                cell,
                kind: DefenseKind::Firewall,
            },
        );
        let before = query::status(&world).resources;

        let events = collect(&mut world, Command::SellDefense { id: DefenseId::new(0) });
        let refund = events.iter().find_map(|event| match event {
            Event::DefenseSold { refund, .. } => Some(*refund),
            _ => None,
        });

        assert_eq!(refund, Some(Resources::new(17, 0, 0)));
        assert_eq!(
            query::status(&world).resources,
            before.saturating_add(&Resources::new(17, 0, 0)),
        );
        assert!(!world.defenses.is_occupied(cell));
    }
}
