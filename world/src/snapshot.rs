//! Capture and restore of the entire campaign as a versioned document.

use std::time::Duration;

use glam::Vec2;

use darknet_defence_core::{
    DefenseRecord, EffectKind, EnemyRecord, GridCell, LevelRecord, SaveDocument, SaveError,
    SaveGame, StatusEffect, SAVE_VERSION,
};

use crate::defenses::upgrade_cost;
use crate::economy::Ledger;
use crate::waves::WaveScheduler;
use crate::World;

/// Serializes the world into a save document stamped by the caller.
pub(crate) fn capture(world: &World, timestamp: u64) -> SaveDocument {
    let defenses = world
        .defenses
        .iter()
        .map(|defense| {
            let (buffs, debuffs) = partition_effects(&defense.effects.all());
            DefenseRecord {
                x: defense.cell.column(),
                y: defense.cell.row(),
                kind: defense.kind,
                level: defense.level,
                experience: defense.experience,
                exp_to_next: defense.experience_to_next(),
                buffs,
                debuffs,
            }
        })
        .collect();

    let enemies = world
        .enemies
        .iter()
        .filter(|enemy| !enemy.dead && !enemy.reached_end)
        .map(|enemy| {
            let boss = enemy.boss.as_ref();
            EnemyRecord {
                x: enemy.position.x,
                y: enemy.position.y,
                kind: enemy.kind,
                health: enemy.health,
                max_health: enemy.max_health,
                path_index: enemy.waypoint,
                progress: enemy.progress,
                status: effect_pairs(&enemy.effects.all()),
                boss_kind: boss.map(|state| state.kind),
                phase: boss.map(|state| state.phase),
                shield: boss
                    .filter(|state| state.shield_max > 0.0)
                    .map(|state| state.shield_active),
                shield_hp: boss
                    .filter(|state| state.shield_max > 0.0)
                    .map(|state| state.shield_health),
            }
        })
        .collect();

    SaveDocument {
        version: SAVE_VERSION.to_owned(),
        timestamp,
        game: SaveGame {
            state: world.phase,
            resources: world.ledger.resources(),
            lives: world.ledger.lives(),
            wave: world.scheduler.current_wave().get(),
            score: world.ledger.score(),
            seed: world.seed,
            path_shape: world.shape,
            grid_preset: world.preset,
            defenses,
            enemies,
            level: LevelRecord {
                current_wave: world.scheduler.current_wave().get(),
                wave_in_progress: world.scheduler.wave_in_progress(),
                wave_timer_ms: world.scheduler.wave_timer().as_millis() as u64,
            },
            selected_defense_type: world.selected_defense,
        },
    }
}

/// Rebuilds a world from a save document.
///
/// Fails without side effects; the caller only replaces its world on success.
/// A minor version newer than the engine's is accepted best-effort, a major
/// mismatch is refused outright.
pub(crate) fn restore(document: &SaveDocument) -> Result<World, SaveError> {
    check_version(&document.version)?;
    let game = &document.game;

    let mut world = World::new_campaign(game.seed, game.path_shape, game.grid_preset);
    world.phase = game.state;
    world.ledger = Ledger::restore(game.resources, game.lives, game.score);
    world.scheduler = WaveScheduler::restore(
        game.level.current_wave,
        game.level.wave_in_progress,
        Duration::from_millis(game.level.wave_timer_ms),
    );
    world.selected_defense = game.selected_defense_type;

    for record in &game.defenses {
        let cell = GridCell::new(record.x, record.y);
        if !world.grid.contains(cell) {
            return Err(SaveError::DefenseOutOfBounds);
        }
        let center = cell.center(world.grid.cell_length());
        let id = world.defenses.place(record.kind, cell, center);
        let defense = world
            .defenses
            .get_mut(id)
            .expect("freshly placed defense resolves");
        defense.level = record.level.clamp(1, darknet_defence_core::MAX_DEFENSE_LEVEL);
        defense.experience = record.experience;
        let mut invested = record.kind.spec().cost;
        for level in 1..defense.level {
            invested = invested.saturating_add(&upgrade_cost(record.kind, level));
        }
        defense.invested = invested;
        for (kind, duration_ms) in record.buffs.iter().chain(record.debuffs.iter()) {
            defense
                .effects
                .apply(*kind, Duration::from_millis(*duration_ms), 1.0);
        }
        if defense.effects.has(EffectKind::Corrupted) {
            defense.destroyed = true;
        }
    }

    let waypoint_limit = world.path.points().len();
    for record in &game.enemies {
        if record.path_index >= waypoint_limit {
            return Err(SaveError::WaypointOutOfRange);
        }
        let boss = record.boss_kind.map(|kind| {
            (
                kind,
                record.phase.unwrap_or(1),
                record.shield.unwrap_or(false),
                record.shield_hp.unwrap_or(0.0),
            )
        });
        let handle = world.enemies.restore(
            record.kind,
            Vec2::new(record.x, record.y),
            record.health,
            record.max_health,
            record.path_index,
            record.progress,
            boss,
        );
        let enemy = world
            .enemies
            .resolve_mut(handle)
            .expect("freshly restored enemy resolves");
        for (kind, duration_ms) in &record.status {
            enemy
                .effects
                .apply(*kind, Duration::from_millis(*duration_ms), 1.0);
        }
    }

    Ok(world)
}

fn check_version(version: &str) -> Result<(), SaveError> {
    let (major, minor) = version
        .split_once('.')
        .ok_or(SaveError::MalformedVersion)?;
    if major.is_empty() || minor.is_empty() || minor.contains('.') {
        return Err(SaveError::MalformedVersion);
    }
    let (engine_major, _) = SAVE_VERSION
        .split_once('.')
        .expect("engine version is well-formed");
    if major != engine_major {
        return Err(SaveError::MajorVersionMismatch);
    }
    Ok(())
}

fn effect_pairs(effects: &[StatusEffect]) -> Vec<(EffectKind, u64)> {
    effects
        .iter()
        .map(|effect| (effect.kind, effect.remaining.as_millis() as u64))
        .collect()
}

fn partition_effects(
    effects: &[StatusEffect],
) -> (Vec<(EffectKind, u64)>, Vec<(EffectKind, u64)>) {
    let mut buffs = Vec::new();
    let mut debuffs = Vec::new();
    for effect in effects {
        let pair = (effect.kind, effect.remaining.as_millis() as u64);
        if is_buff(effect.kind) {
            buffs.push(pair);
        } else {
            debuffs.push(pair);
        }
    }
    (buffs, debuffs)
}

fn is_buff(kind: EffectKind) -> bool {
    matches!(
        kind,
        EffectKind::Boosted
            | EffectKind::Cloaked
            | EffectKind::Reflection
            | EffectKind::Encrypted
            | EffectKind::Hasted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply, query};
    use darknet_defence_core::{
        Command, DefenseKind, EnemyKind, GridPreset, PathShape, SpawnGroup, SpawnKind, WaveId,
        WavePlan, DEFAULT_SPAWN_DELAY,
    };

    fn seeded_world() -> World {
        let mut world = World::new_campaign(1234, PathShape::Default, GridPreset::Standard);
        let mut events = Vec::new();

        let cell = (0..crate::FIELD_ROWS)
            .flat_map(|row| (0..crate::FIELD_COLUMNS).map(move |c| GridCell::new(c, row)))
            .find(|cell| query::can_place(&world, *cell, DefenseKind::Firewall).is_ok())
            .expect("placeable cell");
        apply(
            &mut world,
            Command::PlaceDefense {
                cell,
                kind: DefenseKind::Firewall,
            },
            &mut events,
        );

        apply(&mut world, Command::StartWave, &mut events);
        apply(
            &mut world,
            Command::BeginWave {
                wave: WaveId::new(1),
                plan: WavePlan::new(vec![SpawnGroup {
                    kind: SpawnKind::Enemy(EnemyKind::FederalAgent),
                    count: 3,
                    spawn_delay: DEFAULT_SPAWN_DELAY,
                    health_scale: 1.05,
                }]),
            },
            &mut events,
        );
        for _ in 0..40 {
            apply(
                &mut world,
                Command::Tick {
                    dt: Duration::from_millis(16),
                },
                &mut events,
            );
        }
        world
    }

    #[test]
    fn round_trip_preserves_the_document() {
        let world = seeded_world();
        let document = capture(&world, 1_700_000_000_000);

        let restored = restore(&document).expect("document restores");
        let recaptured = capture(&restored, 1_700_000_000_000);

        assert_eq!(document, recaptured);
    }

    #[test]
    fn restored_worlds_report_the_saved_campaign() {
        let world = seeded_world();
        let document = capture(&world, 7);
        let restored = restore(&document).expect("document restores");

        let before = query::status(&world);
        let after = query::status(&restored);
        assert_eq!(before.resources, after.resources);
        assert_eq!(before.lives, after.lives);
        assert_eq!(before.wave, after.wave);
        assert_eq!(before.score, after.score);
        assert_eq!(
            query::enemy_view(&world).len(),
            query::enemy_view(&restored).len(),
        );
    }

    #[test]
    fn major_version_mismatch_is_refused() {
        let world = seeded_world();
        let mut document = capture(&world, 0);
        document.version = "2.0".to_owned();
        assert_eq!(restore(&document), Err(SaveError::MajorVersionMismatch));
    }

    #[test]
    fn newer_minor_versions_restore_best_effort() {
        let world = seeded_world();
        let mut document = capture(&world, 0);
        document.version = "1.7".to_owned();
        assert!(restore(&document).is_ok());
    }

    #[test]
    fn malformed_versions_are_refused() {
        let world = seeded_world();
        let mut document = capture(&world, 0);
        document.version = "one".to_owned();
        assert_eq!(restore(&document), Err(SaveError::MalformedVersion));
    }

    #[test]
    fn out_of_bounds_defenses_abort_the_restore() {
        let world = seeded_world();
        let mut document = capture(&world, 0);
        document.game.defenses[0].x = 9_999;
        assert_eq!(restore(&document), Err(SaveError::DefenseOutOfBounds));
    }

    #[test]
    fn out_of_range_waypoints_abort_the_restore() {
        let world = seeded_world();
        let mut document = capture(&world, 0);
        if let Some(enemy) = document.game.enemies.first_mut() {
            enemy.path_index = 10_000;
            assert_eq!(restore(&document), Err(SaveError::WaypointOutOfRange));
        }
    }

    #[test]
    fn boss_shields_survive_the_round_trip() {
        let mut world = World::new_campaign(5, PathShape::Default, GridPreset::Standard);
        let spawn = world.path.points()[0];
        let handle = world
            .enemies
            .spawn_boss(darknet_defence_core::BossKind::MegaCorpTitan, 1.0, spawn);
        let _ = world
            .enemies
            .resolve_mut(handle)
            .expect("live boss")
            .take_damage(30, DefenseKind::Mirror);

        let document = capture(&world, 0);
        let record = &document.game.enemies[0];
        assert_eq!(record.shield, Some(true));
        assert_eq!(record.shield_hp, Some(70.0));

        let restored = restore(&document).expect("document restores");
        let view = query::enemy_view(&restored);
        let boss = view
            .iter()
            .next()
            .and_then(|snapshot| snapshot.boss)
            .expect("boss snapshot");
        assert!(boss.shield_active);
        assert_eq!(boss.shield_health, 70.0);
    }
}
