#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Achievement monitor observing the world's event stream.
//!
//! The monitor keeps integer counters, latches unlocks exactly once when a
//! counter crosses its declared requirement, emits
//! [`Event::AchievementUnlocked`] notifications, and hands the unlock rewards
//! back to the world as [`Command::CreditResources`] batches. Meta
//! achievements latch when a whole category, or the entire table, is
//! complete.

use std::collections::BTreeSet;

use darknet_defence_core::{
    AchievementId, Command, Event, Resources, MAX_DEFENSE_LEVEL,
};

/// Metric an achievement's requirement is measured against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    /// Total enemies destroyed.
    EnemiesKilled,
    /// Total bosses destroyed.
    BossesKilled,
    /// Total waves cleared.
    WavesCompleted,
    /// Total defenses constructed.
    DefensesBuilt,
    /// Total defenses raised to the maximum level.
    DefensesMaxed,
    /// Total dharma credited from kills and wave bonuses.
    DharmaEarned,
    /// Whether the campaign has been completed; requirement is one.
    CampaignCompleted,
}

/// Category an achievement belongs to, used by meta unlocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    /// Destroying enemies.
    Combat,
    /// Constructing and upgrading defenses.
    Building,
    /// Advancing through the campaign.
    Progress,
}

/// Declarative description of one achievement.
#[derive(Clone, Copy, Debug)]
pub struct AchievementDef {
    /// Stable identity of the achievement.
    pub id: AchievementId,
    /// Human-readable name shown by adapters.
    pub name: &'static str,
    /// Category the achievement counts toward.
    pub category: Category,
    /// Metric the requirement is measured against.
    pub metric: Metric,
    /// Threshold at which the unlock latches.
    pub requirement: u64,
    /// Resources credited when the unlock latches.
    pub reward: Resources,
}

/// The declarative achievement table.
pub const ACHIEVEMENTS: &[AchievementDef] = &[
    AchievementDef {
        id: AchievementId::new(1),
        name: "First Contact",
        category: Category::Combat,
        metric: Metric::EnemiesKilled,
        requirement: 1,
        reward: Resources::new(10, 5, 0),
    },
    AchievementDef {
        id: AchievementId::new(2),
        name: "Packet Storm",
        category: Category::Combat,
        metric: Metric::EnemiesKilled,
        requirement: 50,
        reward: Resources::new(50, 25, 10),
    },
    AchievementDef {
        id: AchievementId::new(3),
        name: "Botnet Down",
        category: Category::Combat,
        metric: Metric::EnemiesKilled,
        requirement: 250,
        reward: Resources::new(150, 75, 40),
    },
    AchievementDef {
        id: AchievementId::new(4),
        name: "Kingpin Taken",
        category: Category::Combat,
        metric: Metric::BossesKilled,
        requirement: 1,
        reward: Resources::new(100, 50, 25),
    },
    AchievementDef {
        id: AchievementId::new(5),
        name: "First Bastion",
        category: Category::Building,
        metric: Metric::DefensesBuilt,
        requirement: 1,
        reward: Resources::new(10, 5, 0),
    },
    AchievementDef {
        id: AchievementId::new(6),
        name: "Grid Architect",
        category: Category::Building,
        metric: Metric::DefensesBuilt,
        requirement: 10,
        reward: Resources::new(75, 40, 20),
    },
    AchievementDef {
        id: AchievementId::new(7),
        name: "Peak Hardening",
        category: Category::Building,
        metric: Metric::DefensesMaxed,
        requirement: 1,
        reward: Resources::new(120, 60, 30),
    },
    AchievementDef {
        id: AchievementId::new(8),
        name: "Five Waves Deep",
        category: Category::Progress,
        metric: Metric::WavesCompleted,
        requirement: 5,
        reward: Resources::new(50, 25, 15),
    },
    AchievementDef {
        id: AchievementId::new(9),
        name: "Halfway There",
        category: Category::Progress,
        metric: Metric::WavesCompleted,
        requirement: 10,
        reward: Resources::new(100, 50, 30),
    },
    AchievementDef {
        id: AchievementId::new(10),
        name: "Net Liberated",
        category: Category::Progress,
        metric: Metric::CampaignCompleted,
        requirement: 1,
        reward: Resources::new(500, 250, 125),
    },
    AchievementDef {
        id: AchievementId::new(11),
        name: "War Chest",
        category: Category::Progress,
        metric: Metric::DharmaEarned,
        requirement: 1_000,
        reward: Resources::new(200, 100, 50),
    },
];

/// Meta achievement latched when every entry of a category is unlocked.
#[derive(Clone, Copy, Debug)]
pub struct MetaDef {
    /// Stable identity of the meta achievement.
    pub id: AchievementId,
    /// Human-readable name shown by adapters.
    pub name: &'static str,
    /// Category that must be complete, or `None` for the whole table.
    pub category: Option<Category>,
    /// Resources credited when the unlock latches.
    pub reward: Resources,
}

/// The declarative meta-achievement table.
pub const META_ACHIEVEMENTS: &[MetaDef] = &[
    MetaDef {
        id: AchievementId::new(100),
        name: "Combat Mastery",
        category: Some(Category::Combat),
        reward: Resources::new(250, 125, 60),
    },
    MetaDef {
        id: AchievementId::new(101),
        name: "Master Builder",
        category: Some(Category::Building),
        reward: Resources::new(250, 125, 60),
    },
    MetaDef {
        id: AchievementId::new(102),
        name: "Campaign Legend",
        category: Some(Category::Progress),
        reward: Resources::new(250, 125, 60),
    },
    MetaDef {
        id: AchievementId::new(110),
        name: "Total Clearance",
        category: None,
        reward: Resources::new(1_000, 500, 250),
    },
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Counters {
    kills: u64,
    boss_kills: u64,
    waves_completed: u64,
    defenses_built: u64,
    defenses_maxed: u64,
    dharma_earned: u64,
    campaign_completed: bool,
}

/// Event-observing monitor that latches unlocks and hands out rewards.
#[derive(Clone, Debug, Default)]
pub struct Achievements {
    counters: Counters,
    unlocked: BTreeSet<AchievementId>,
}

impl Achievements {
    /// Creates a monitor with zeroed counters and nothing unlocked.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers of every latched unlock, in identifier order.
    pub fn unlocked(&self) -> impl Iterator<Item = AchievementId> + '_ {
        self.unlocked.iter().copied()
    }

    /// Reports whether the achievement has been latched.
    #[must_use]
    pub fn is_unlocked(&self, id: AchievementId) -> bool {
        self.unlocked.contains(&id)
    }

    /// Consumes world events, updating counters and latching unlocks.
    ///
    /// Rewards for fresh unlocks are emitted as commands so the world's
    /// ledger stays the only place resources change.
    pub fn handle(
        &mut self,
        events: &[Event],
        out_commands: &mut Vec<Command>,
        out_events: &mut Vec<Event>,
    ) {
        for event in events {
            match event {
                Event::EnemyKilled { boss, reward, .. } => {
                    self.counters.kills += 1;
                    if *boss {
                        self.counters.boss_kills += 1;
                    }
                    self.counters.dharma_earned =
                        self.counters.dharma_earned.saturating_add(reward.dharma);
                }
                Event::WaveCompleted { bonus, .. } => {
                    self.counters.waves_completed += 1;
                    self.counters.dharma_earned =
                        self.counters.dharma_earned.saturating_add(bonus.dharma);
                }
                Event::DefensePlaced { .. } => {
                    self.counters.defenses_built += 1;
                }
                Event::DefenseUpgraded { level, .. } => {
                    if *level >= MAX_DEFENSE_LEVEL {
                        self.counters.defenses_maxed += 1;
                    }
                }
                Event::Victory { .. } => {
                    self.counters.campaign_completed = true;
                }
                _ => {}
            }
        }

        for def in ACHIEVEMENTS {
            if self.unlocked.contains(&def.id) {
                continue;
            }
            if self.metric_value(def.metric) >= def.requirement {
                self.latch(def.id, def.reward, out_commands, out_events);
            }
        }

        for meta in META_ACHIEVEMENTS {
            if self.unlocked.contains(&meta.id) {
                continue;
            }
            let complete = ACHIEVEMENTS
                .iter()
                .filter(|def| meta.category.map_or(true, |category| def.category == category))
                .all(|def| self.unlocked.contains(&def.id));
            if complete {
                self.latch(meta.id, meta.reward, out_commands, out_events);
            }
        }
    }

    fn latch(
        &mut self,
        id: AchievementId,
        reward: Resources,
        out_commands: &mut Vec<Command>,
        out_events: &mut Vec<Event>,
    ) {
        let fresh = self.unlocked.insert(id);
        debug_assert!(fresh);
        out_events.push(Event::AchievementUnlocked { id });
        if !reward.is_zero() {
            out_commands.push(Command::CreditResources { amount: reward });
        }
    }

    fn metric_value(&self, metric: Metric) -> u64 {
        match metric {
            Metric::EnemiesKilled => self.counters.kills,
            Metric::BossesKilled => self.counters.boss_kills,
            Metric::WavesCompleted => self.counters.waves_completed,
            Metric::DefensesBuilt => self.counters.defenses_built,
            Metric::DefensesMaxed => self.counters.defenses_maxed,
            Metric::DharmaEarned => self.counters.dharma_earned,
            Metric::CampaignCompleted => u64::from(self.counters.campaign_completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darknet_defence_core::{DefenseId, DefenseKind, EnemyId, EnemyKind, GridCell, WaveId};

    fn kill(boss: bool) -> Event {
        Event::EnemyKilled {
            enemy: EnemyId::new(0),
            kind: EnemyKind::ScriptKiddie,
            boss,
            reward: Resources::new(5, 2, 1),
        }
    }

    fn unlock_ids(events: &[Event]) -> Vec<u32> {
        events
            .iter()
            .filter_map(|event| match event {
                Event::AchievementUnlocked { id } => Some(id.get()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn the_first_kill_latches_first_contact_once() {
        let mut monitor = Achievements::new();
        let mut commands = Vec::new();
        let mut events = Vec::new();

        monitor.handle(&[kill(false)], &mut commands, &mut events);
        assert_eq!(unlock_ids(&events), vec![1]);
        assert_eq!(
            commands,
            vec![Command::CreditResources {
                amount: Resources::new(10, 5, 0),
            }],
        );

        commands.clear();
        events.clear();
        monitor.handle(&[kill(false)], &mut commands, &mut events);
        assert!(events.is_empty(), "an unlock latches exactly once");
        assert!(commands.is_empty());
    }

    #[test]
    fn boss_kills_count_toward_both_boss_and_kill_metrics() {
        let mut monitor = Achievements::new();
        let mut commands = Vec::new();
        let mut events = Vec::new();

        monitor.handle(&[kill(true)], &mut commands, &mut events);
        let ids = unlock_ids(&events);
        assert!(ids.contains(&1), "a boss kill is still a kill");
        assert!(ids.contains(&4), "kingpin taken latches on the boss kill");
    }

    #[test]
    fn only_max_level_upgrades_count_as_maxed() {
        let mut monitor = Achievements::new();
        let mut commands = Vec::new();
        let mut events = Vec::new();

        let upgraded = |level| Event::DefenseUpgraded {
            defense: DefenseId::new(0),
            level,
        };
        monitor.handle(&[upgraded(2), upgraded(3)], &mut commands, &mut events);
        assert!(unlock_ids(&events).is_empty());

        monitor.handle(&[upgraded(5)], &mut commands, &mut events);
        assert!(unlock_ids(&events).contains(&7));
    }

    #[test]
    fn completing_a_category_latches_its_meta() {
        let mut monitor = Achievements::new();
        let mut commands = Vec::new();
        let mut events = Vec::new();

        let placed = Event::DefensePlaced {
            defense: DefenseId::new(0),
            kind: DefenseKind::Firewall,
            cell: GridCell::new(0, 0),
        };
        let maxed = Event::DefenseUpgraded {
            defense: DefenseId::new(0),
            level: MAX_DEFENSE_LEVEL,
        };
        let mut batch: Vec<Event> = std::iter::repeat(placed).take(10).collect();
        batch.push(maxed);
        monitor.handle(&batch, &mut commands, &mut events);

        let ids = unlock_ids(&events);
        assert!(ids.contains(&5));
        assert!(ids.contains(&6));
        assert!(ids.contains(&7));
        assert!(
            ids.contains(&101),
            "the building meta latches once its members unlock",
        );
    }

    #[test]
    fn wave_bonuses_feed_the_war_chest() {
        let mut monitor = Achievements::new();
        let mut commands = Vec::new();
        let mut events = Vec::new();

        let completions: Vec<Event> = (1..=10)
            .map(|wave| Event::WaveCompleted {
                wave: WaveId::new(wave),
                bonus: Resources::new(150, 75, 45),
            })
            .collect();
        monitor.handle(&completions, &mut commands, &mut events);

        let ids = unlock_ids(&events);
        assert!(ids.contains(&8));
        assert!(ids.contains(&9));
        assert!(ids.contains(&11), "1500 dharma crosses the war chest bar");
    }
}
