#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic wave-plan generation system.
//!
//! The world announces [`Event::WavePlanNeeded`] when a wave should begin;
//! this system answers with a [`Command::BeginWave`] carrying the plan. Plans
//! are pure functions of the campaign seed and the wave index, so the world
//! never waits on anything non-deterministic.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use darknet_defence_core::{
    BossKind, Command, EnemyKind, Event, SpawnGroup, SpawnKind, WaveId, WavePlan,
    DEFAULT_SPAWN_DELAY, RNG_STREAM_WAVE_PREFIX,
};

/// Wave index after which the heavier boss replaces the raid team.
const TITAN_WAVES_FROM: u32 = 11;

/// Pure system that generates deterministic [`WavePlan`] values for waves.
#[derive(Clone, Debug)]
pub struct WaveGeneration {
    seed: u64,
}

impl WaveGeneration {
    /// Creates a generator bound to the campaign seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Consumes `WavePlanNeeded` events and emits [`Command::BeginWave`].
    pub fn handle(&self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            if let Event::WavePlanNeeded { wave } = event {
                out.push(Command::BeginWave {
                    wave: *wave,
                    plan: self.plan_for(*wave),
                });
            }
        }
    }

    /// Builds the plan for the provided wave.
    ///
    /// Difficulty ramps by admitting harder enemy kinds, growing group
    /// counts, and scaling health. Every fifth wave appends a boss group and
    /// a swarm of script kiddies.
    #[must_use]
    pub fn plan_for(&self, wave: WaveId) -> WavePlan {
        let index = wave.get();
        if index == 0 {
            return WavePlan::default();
        }

        let mut rng = ChaCha8Rng::seed_from_u64(derive_wave_seed(self.seed, index));
        let health_scale = 1.0 + 0.05 * index as f32;

        let kind_count =
            ((index as usize * EnemyKind::ALL.len()) / 10).clamp(1, EnemyKind::ALL.len());
        let extra_cap = (0.3 * index as f32).floor() as u32;

        let mut groups = Vec::with_capacity(kind_count + 2);
        for kind in EnemyKind::ALL.iter().take(kind_count) {
            let mut count = 3 + index / 2;
            if extra_cap > 0 {
                count += rng.gen_range(0..extra_cap);
            }
            groups.push(SpawnGroup {
                kind: SpawnKind::Enemy(*kind),
                count,
                spawn_delay: DEFAULT_SPAWN_DELAY,
                health_scale,
            });
        }

        if wave.is_boss_wave() {
            let boss = if index < TITAN_WAVES_FROM {
                BossKind::RaidTeam
            } else {
                BossKind::MegaCorpTitan
            };
            groups.push(SpawnGroup {
                kind: SpawnKind::Boss(boss),
                count: 1,
                spawn_delay: DEFAULT_SPAWN_DELAY,
                health_scale: 1.0,
            });
            groups.push(SpawnGroup {
                kind: SpawnKind::Enemy(EnemyKind::ScriptKiddie),
                count: 5 + index,
                spawn_delay: Duration::from_millis(500),
                health_scale,
            });
        }

        WavePlan::new(groups)
    }
}

fn derive_wave_seed(seed: u64, wave: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(RNG_STREAM_WAVE_PREFIX.as_bytes());
    hasher.update(wave.to_le_bytes());
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[0..8].try_into().expect("sha256 digest slice length");
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(seed: u64, wave: u32) -> WavePlan {
        WaveGeneration::new(seed).plan_for(WaveId::new(wave))
    }

    #[test]
    fn identical_seeds_replay_identical_plans() {
        for wave in 1..=20 {
            assert_eq!(plan(42, wave), plan(42, wave), "wave {wave} diverged");
        }
    }

    #[test]
    fn different_seeds_vary_late_wave_counts() {
        let first: Vec<WavePlan> = (11..=14).map(|wave| plan(1, wave)).collect();
        let second: Vec<WavePlan> = (11..=14).map(|wave| plan(2, wave)).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn wave_one_sends_a_single_swarm_of_novices() {
        let plan = plan(7, 1);
        let groups = plan.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].kind, SpawnKind::Enemy(EnemyKind::ScriptKiddie));
        assert_eq!(groups[0].count, 3);
        assert!((groups[0].health_scale - 1.05).abs() < 1e-6);
    }

    #[test]
    fn harder_kinds_join_as_waves_progress() {
        let early: Vec<SpawnKind> = plan(3, 2).groups().iter().map(|g| g.kind).collect();
        assert_eq!(early, vec![SpawnKind::Enemy(EnemyKind::ScriptKiddie)]);

        let late = plan(3, 10);
        let kinds: Vec<SpawnKind> = late
            .groups()
            .iter()
            .map(|group| group.kind)
            .take(EnemyKind::ALL.len())
            .collect();
        assert_eq!(
            kinds,
            EnemyKind::ALL
                .iter()
                .map(|kind| SpawnKind::Enemy(*kind))
                .collect::<Vec<_>>(),
        );
    }

    #[test]
    fn every_fifth_wave_carries_a_boss_and_a_swarm() {
        let plan = plan(9, 5);
        let groups = plan.groups();
        assert!(groups
            .iter()
            .any(|group| group.kind == SpawnKind::Boss(BossKind::RaidTeam)));
        let swarm = groups.last().expect("swarm group");
        assert_eq!(swarm.kind, SpawnKind::Enemy(EnemyKind::ScriptKiddie));
        assert_eq!(swarm.count, 10);

        let boss_group = groups
            .iter()
            .find(|group| matches!(group.kind, SpawnKind::Boss(_)))
            .expect("boss group");
        assert_eq!(
            boss_group.health_scale, 1.0,
            "boss health is not wave-scaled",
        );
    }

    #[test]
    fn the_titan_replaces_the_raid_team_after_wave_ten() {
        assert!(plan(4, 10)
            .groups()
            .iter()
            .any(|group| group.kind == SpawnKind::Boss(BossKind::RaidTeam)));
        assert!(plan(4, 15)
            .groups()
            .iter()
            .any(|group| group.kind == SpawnKind::Boss(BossKind::MegaCorpTitan)));
    }

    #[test]
    fn plan_needed_events_are_answered_with_begin_wave() {
        let system = WaveGeneration::new(11);
        let events = vec![Event::WavePlanNeeded {
            wave: WaveId::new(3),
        }];
        let mut out = Vec::new();
        system.handle(&events, &mut out);

        match out.as_slice() {
            [Command::BeginWave { wave, plan }] => {
                assert_eq!(*wave, WaveId::new(3));
                assert_eq!(*plan, system.plan_for(WaveId::new(3)));
            }
            other => panic!("expected a single BeginWave, got {other:?}"),
        }
    }
}
