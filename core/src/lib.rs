#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Darknet Defence engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! snapshots, and respond exclusively with new command batches.

use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Darknet Defence uplink established.";

/// Resources granted to the player at the start of a new game.
pub const INITIAL_RESOURCES: Resources = Resources::new(100, 50, 75);

/// Lives granted to the player at the start of a new game.
pub const INITIAL_LIVES: u32 = 20;

/// Number of waves a campaign runs before victory is declared.
pub const MAX_WAVES: u32 = 20;

/// Delay between a wave clearing and the next wave auto-starting.
pub const INTER_WAVE_DELAY: Duration = Duration::from_millis(5_000);

/// Default delay between consecutive spawns within a single wave group.
pub const DEFAULT_SPAWN_DELAY: Duration = Duration::from_millis(1_000);

/// Highest level a defense can be upgraded to.
pub const MAX_DEFENSE_LEVEL: u8 = 5;

/// Half-width of the corridor around the path where placement is forbidden.
pub const PATH_HALF_WIDTH: f32 = 20.0;

/// Duration a triggered special ability stays active.
pub const SPECIAL_ACTIVE_DURATION: Duration = Duration::from_millis(5_000);

/// Cooldown imposed after a special ability deactivates.
pub const SPECIAL_COOLDOWN: Duration = Duration::from_millis(30_000);

/// Label of the random stream that places the path's waypoints.
pub const RNG_STREAM_PATH: &str = "path";

/// Label of the random stream that drives in-tick simulation randomness.
pub const RNG_STREAM_SIM: &str = "sim";

/// Label prefix of the per-wave random streams used by plan generation.
pub const RNG_STREAM_WAVE_PREFIX: &str = "wave";

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Resets the world and begins a fresh campaign.
    NewGame {
        /// Seed that drives every random stream of the campaign.
        seed: u64,
        /// Shape the generated path should follow.
        shape: PathShape,
        /// Grid preset selecting the cell edge length.
        preset: GridPreset,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests that the next wave begin immediately.
    StartWave,
    /// Supplies a freshly generated plan for the wave about to begin.
    BeginWave {
        /// Wave the plan belongs to.
        wave: WaveId,
        /// Ordered spawn groups composing the wave.
        plan: WavePlan,
    },
    /// Requests construction of a defense on the provided grid cell.
    PlaceDefense {
        /// Cell the defense should occupy.
        cell: GridCell,
        /// Kind of defense to construct.
        kind: DefenseKind,
    },
    /// Requests a level upgrade for the identified defense.
    UpgradeDefense {
        /// Identifier of the defense to upgrade.
        id: DefenseId,
    },
    /// Sells the identified defense, refunding part of its invested cost.
    SellDefense {
        /// Identifier of the defense to sell.
        id: DefenseId,
    },
    /// Triggers the special ability of the identified defense.
    ActivateSpecial {
        /// Identifier of the defense whose special should fire.
        id: DefenseId,
    },
    /// Pauses or resumes the simulation clock.
    SetPaused {
        /// Whether the simulation should ignore tick time.
        paused: bool,
    },
    /// Records which defense kind the player currently has selected.
    SelectDefense {
        /// Selected kind, or `None` to clear the selection.
        kind: Option<DefenseKind>,
    },
    /// Credits the player's ledger, used for externally granted rewards.
    CreditResources {
        /// Amount credited to each currency.
        amount: Resources,
    },
    /// Replaces the entire world state with the provided save document.
    RestoreGame {
        /// Document previously produced by the snapshot query.
        document: SaveDocument,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that a fresh campaign began.
    GameStarted {
        /// Seed driving the campaign's random streams.
        seed: u64,
        /// Shape of the generated path.
        shape: PathShape,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Signals that a wave is ready to begin and needs its spawn plan.
    WavePlanNeeded {
        /// Wave requiring a plan.
        wave: WaveId,
    },
    /// Confirms that a wave began spawning.
    WaveStarted {
        /// Wave that started.
        wave: WaveId,
    },
    /// Confirms that every spawned enemy of the wave has been resolved.
    WaveCompleted {
        /// Wave that completed.
        wave: WaveId,
        /// Bonus credited for clearing the wave.
        bonus: Resources,
    },
    /// Announces a freshly spawned enemy.
    EnemySpawned {
        /// Identity of the new enemy.
        enemy: EnemyId,
        /// Kind of the new enemy.
        kind: EnemyKind,
    },
    /// Announces that an enemy died to damage.
    EnemyKilled {
        /// Identity of the dead enemy.
        enemy: EnemyId,
        /// Kind of the dead enemy.
        kind: EnemyKind,
        /// Whether the enemy was a boss.
        boss: bool,
        /// Reward credited for the kill.
        reward: Resources,
    },
    /// Announces that an enemy walked off the end of the path.
    EnemyReachedEnd {
        /// Identity of the escaping enemy.
        enemy: EnemyId,
        /// Lives deducted by the escape.
        lives_lost: u32,
    },
    /// Confirms a defense was constructed.
    DefensePlaced {
        /// Identity of the new defense.
        defense: DefenseId,
        /// Kind of the new defense.
        kind: DefenseKind,
        /// Cell the defense occupies.
        cell: GridCell,
    },
    /// Confirms a defense reached a new level.
    DefenseUpgraded {
        /// Identity of the upgraded defense.
        defense: DefenseId,
        /// Level the defense now holds.
        level: u8,
    },
    /// Confirms a defense was sold and removed.
    DefenseSold {
        /// Identity of the removed defense.
        defense: DefenseId,
        /// Amount refunded to the ledger.
        refund: Resources,
    },
    /// Announces that a defense fired a projectile.
    DefenseFired {
        /// Identity of the firing defense.
        defense: DefenseId,
        /// Identity of the projectile created by the shot.
        projectile: ProjectileId,
        /// Enemy the shot was aimed at.
        target: EnemyId,
    },
    /// Announces that a projectile damaged an enemy.
    ProjectileHit {
        /// Identity of the projectile.
        projectile: ProjectileId,
        /// Enemy that took the hit.
        enemy: EnemyId,
        /// Damage delivered by the hit.
        damage: u32,
    },
    /// Confirms a special ability activated.
    SpecialActivated {
        /// Defense whose special fired.
        defense: DefenseId,
        /// Kind of the defense, which determines the special's semantics.
        kind: DefenseKind,
    },
    /// Announces that a boss crossed a health threshold into a new phase.
    BossPhaseChange {
        /// Identity of the boss enemy.
        enemy: EnemyId,
        /// Phase the boss held before the transition.
        from: u8,
        /// Phase the boss holds after the transition.
        to: u8,
    },
    /// Announces that a boss shield was depleted to zero.
    ShieldBroken {
        /// Identity of the boss enemy.
        enemy: EnemyId,
    },
    /// Announces that a boss stole resources from the player's ledger.
    ResourcesStolen {
        /// Amount removed from each currency.
        amount: Resources,
    },
    /// Reports the ledger balance after a command changed it.
    ResourcesUpdated {
        /// Balance after the change.
        resources: Resources,
    },
    /// Announces that an achievement's unlock latched.
    AchievementUnlocked {
        /// Identity of the unlocked achievement.
        id: AchievementId,
    },
    /// Reports that a command was refused without mutating state.
    CommandRejected {
        /// Reason the command was refused.
        reason: RejectReason,
    },
    /// Announces that the player ran out of lives.
    GameOver {
        /// Wave during which the campaign ended.
        wave: WaveId,
        /// Final score.
        score: u64,
    },
    /// Announces that every wave was cleared.
    Victory {
        /// Final score.
        score: u64,
    },
    /// Confirms that a save document replaced the world state.
    GameRestored {
        /// Wave the restored campaign is on.
        wave: WaveId,
    },
}

/// Typed reasons attached to [`Event::CommandRejected`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The targeted grid cell already hosts a defense.
    CellOccupied,
    /// The targeted grid cell lies within the path corridor.
    CellOnPath,
    /// The targeted grid cell lies outside the field.
    CellOutOfBounds,
    /// The ledger cannot cover the requested cost.
    InsufficientResources,
    /// The defense already sits at the maximum level.
    MaxLevelReached,
    /// No defense with the provided identifier exists.
    UnknownDefense,
    /// A wave is already spawning, so another cannot start.
    WaveAlreadyInProgress,
    /// Every wave of the campaign has already run.
    AllWavesCleared,
    /// The special ability has not finished cooling down.
    SpecialOnCooldown,
    /// The defense has been disabled and cannot act.
    DefenseInactive,
    /// The campaign has already ended.
    GameNotActive,
    /// The save document could not be applied.
    SaveRejected(SaveError),
}

/// Failures that prevent a save document from being applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveError {
    /// The document's major version differs from the engine's.
    MajorVersionMismatch,
    /// The document's version string could not be parsed.
    MalformedVersion,
    /// A defense record referenced a cell outside the field.
    DefenseOutOfBounds,
    /// An enemy record referenced a waypoint beyond the path.
    WaypointOutOfRange,
}

/// Lifecycle phase of a campaign.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GamePhase {
    /// The campaign is running.
    #[default]
    Playing,
    /// The player ran out of lives.
    GameOver,
    /// Every wave was cleared.
    Victory,
}

/// Shapes the path generator can produce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathShape {
    /// Jittered left-to-right route smoothed with quadratic curves.
    #[default]
    Default,
    /// Inward spiral centered on the field.
    Spiral,
    /// Sharp alternating diagonals across the field.
    Zigzag,
    /// A single closed detour around the field's center.
    Loop,
    /// Two sweeps crossing the field's center.
    Cross,
}

/// Grid presets selecting the cell edge length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GridPreset {
    /// Standard 40-unit cells.
    #[default]
    Standard,
    /// Compact 30-unit cells for small fields.
    Compact,
}

impl GridPreset {
    /// Edge length of a single grid cell in world units.
    #[must_use]
    pub const fn cell_length(self) -> f32 {
        match self {
            Self::Standard => 40.0,
            Self::Compact => 30.0,
        }
    }
}

/// Unique identifier assigned to an enemy for its entire lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnemyId(u32);

impl EnemyId {
    /// Creates a new enemy identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a defense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefenseId(u32);

impl DefenseId {
    /// Creates a new defense identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a projectile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectileId(u32);

impl ProjectileId {
    /// Creates a new projectile identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to an achievement definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AchievementId(u32);

impl AchievementId {
    /// Creates a new achievement identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Index of a wave within the campaign, starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaveId(u32);

impl WaveId {
    /// Creates a new wave identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Reports whether the wave hosts a boss group.
    #[must_use]
    pub const fn is_boss_wave(&self) -> bool {
        self.0 % 5 == 0 && self.0 > 0
    }
}

/// Generation-tagged reference into the enemy arena.
///
/// A handle resolves to an enemy only while the slot's generation matches;
/// once the enemy dies and the slot is recycled, stale handles resolve to
/// nothing and holders must retarget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EnemyHandle {
    index: u32,
    generation: u32,
}

impl EnemyHandle {
    /// Creates a handle from a slot index and its generation tag.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index the handle points at.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation the slot held when the handle was issued.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    column: u32,
    row: u32,
}

impl GridCell {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// World-space center of the cell for the provided cell edge length.
    #[must_use]
    pub fn center(&self, cell_length: f32) -> Vec2 {
        Vec2::new(
            (self.column as f32 + 0.5) * cell_length,
            (self.row as f32 + 0.5) * cell_length,
        )
    }
}

/// Kinds of defense the player can construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefenseKind {
    /// Cheap baseline turret.
    Firewall,
    /// Piercing shots that scramble nearby enemies when firing.
    Encryption,
    /// Inert lure that only consumes a path-adjacent slot.
    Decoy,
    /// Heavy single-target turret with a reflection special.
    Mirror,
    /// Long-range turret that cloaks allied defenses.
    Anonymity,
    /// Splash turret that boosts allied defenses.
    Distributor,
}

impl DefenseKind {
    /// Canonical ordering of every defense kind.
    pub const ALL: [Self; 6] = [
        Self::Firewall,
        Self::Encryption,
        Self::Decoy,
        Self::Mirror,
        Self::Anonymity,
        Self::Distributor,
    ];

    /// Base statistics for the kind.
    #[must_use]
    pub const fn spec(self) -> DefenseSpec {
        match self {
            Self::Firewall => DefenseSpec {
                cost: Resources::new(25, 0, 0),
                damage: 15,
                range: 200.0,
                fire_rate: Duration::from_millis(1_000),
                projectile_speed: 5.0,
            },
            Self::Encryption => DefenseSpec {
                cost: Resources::new(50, 20, 10),
                damage: 25,
                range: 180.0,
                fire_rate: Duration::from_millis(1_500),
                projectile_speed: 4.0,
            },
            Self::Decoy => DefenseSpec {
                cost: Resources::new(30, 15, 5),
                damage: 0,
                range: 150.0,
                fire_rate: Duration::ZERO,
                projectile_speed: 0.0,
            },
            Self::Mirror => DefenseSpec {
                cost: Resources::new(75, 40, 20),
                damage: 40,
                range: 250.0,
                fire_rate: Duration::from_millis(2_000),
                projectile_speed: 8.0,
            },
            Self::Anonymity => DefenseSpec {
                cost: Resources::new(60, 30, 40),
                damage: 20,
                range: 300.0,
                fire_rate: Duration::from_millis(1_200),
                projectile_speed: 6.0,
            },
            Self::Distributor => DefenseSpec {
                cost: Resources::new(100, 60, 30),
                damage: 30,
                range: 350.0,
                fire_rate: Duration::from_millis(800),
                projectile_speed: 7.0,
            },
        }
    }
}

/// Base statistics shared by every defense of a kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DefenseSpec {
    /// Construction cost debited at placement.
    pub cost: Resources,
    /// Damage per projectile before modifiers.
    pub damage: u32,
    /// Targeting radius in world units before modifiers.
    pub range: f32,
    /// Delay between shots before modifiers.
    pub fire_rate: Duration,
    /// Projectile travel speed in world units per second before modifiers.
    pub projectile_speed: f32,
}

/// Kinds of regular enemy the wave scheduler can spawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnemyKind {
    /// Fast, fragile swarmer that jitters off the path line.
    ScriptKiddie,
    /// Accelerates while any defense is nearby.
    FederalAgent,
    /// Periodically stealths itself against targeting.
    CorporateSaboteur,
    /// Drifts away from defenses along a repulsion vector.
    AiSurveillance,
    /// Occasionally teleports forward along the path.
    QuantumHacker,
    /// Slow aura carrier that heals kin and corrupts defenses.
    CorruptedMonk,
}

impl EnemyKind {
    /// Canonical ordering used by wave plans, easiest kind first.
    pub const ALL: [Self; 6] = [
        Self::ScriptKiddie,
        Self::FederalAgent,
        Self::CorporateSaboteur,
        Self::AiSurveillance,
        Self::QuantumHacker,
        Self::CorruptedMonk,
    ];

    /// Base statistics for the kind.
    #[must_use]
    pub const fn spec(self) -> EnemySpec {
        match self {
            Self::ScriptKiddie => EnemySpec {
                health: 20.0,
                speed: 80.0,
                reward: Resources::new(5, 2, 1),
                size: 15.0,
            },
            Self::FederalAgent => EnemySpec {
                health: 40.0,
                speed: 60.0,
                reward: Resources::new(10, 5, 3),
                size: 18.0,
            },
            Self::CorporateSaboteur => EnemySpec {
                health: 35.0,
                speed: 70.0,
                reward: Resources::new(15, 8, 5),
                size: 16.0,
            },
            Self::AiSurveillance => EnemySpec {
                health: 60.0,
                speed: 50.0,
                reward: Resources::new(20, 12, 8),
                size: 20.0,
            },
            Self::QuantumHacker => EnemySpec {
                health: 80.0,
                speed: 90.0,
                reward: Resources::new(30, 20, 15),
                size: 22.0,
            },
            Self::CorruptedMonk => EnemySpec {
                health: 100.0,
                speed: 40.0,
                reward: Resources::new(50, 30, 25),
                size: 25.0,
            },
        }
    }
}

/// Base statistics shared by every enemy of a kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemySpec {
    /// Health before wave scaling.
    pub health: f32,
    /// Travel speed in world units per second before modifiers.
    pub speed: f32,
    /// Reward credited when the enemy dies.
    pub reward: Resources,
    /// Collision radius in world units.
    pub size: f32,
}

/// Kinds of boss that anchor every fifth wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BossKind {
    /// Minion-spawning, EMP-blasting coordinated assault.
    RaidTeam,
    /// Shielded juggernaut that manipulates the player's markets.
    MegaCorpTitan,
}

impl BossKind {
    /// Base statistics for the kind.
    #[must_use]
    pub const fn spec(self) -> BossSpec {
        match self {
            Self::RaidTeam => BossSpec {
                health: 500.0,
                speed: 30.0,
                reward: Resources::new(100, 60, 40),
                size: 40.0,
                phases: 3,
            },
            Self::MegaCorpTitan => BossSpec {
                health: 800.0,
                speed: 20.0,
                reward: Resources::new(200, 120, 80),
                size: 50.0,
                phases: 4,
            },
        }
    }
}

/// Base statistics shared by every boss of a kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BossSpec {
    /// Health before wave scaling.
    pub health: f32,
    /// Travel speed in world units per second before modifiers.
    pub speed: f32,
    /// Reward credited when the boss dies.
    pub reward: Resources,
    /// Collision radius in world units.
    pub size: f32,
    /// Number of phases the boss progresses through.
    pub phases: u8,
}

/// Triple of the three currencies every economy operation moves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// Primary currency earned from kills and wave bonuses.
    pub dharma: u64,
    /// Secondary currency gating mid-tier defenses.
    pub bandwidth: u64,
    /// Tertiary currency gating stealth-oriented defenses.
    pub anonymity: u64,
}

impl Resources {
    /// Triple with every currency at zero.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Creates a resource triple from explicit currency amounts.
    #[must_use]
    pub const fn new(dharma: u64, bandwidth: u64, anonymity: u64) -> Self {
        Self {
            dharma,
            bandwidth,
            anonymity,
        }
    }

    /// Reports whether every currency covers the corresponding cost.
    #[must_use]
    pub const fn can_afford(&self, cost: &Self) -> bool {
        self.dharma >= cost.dharma
            && self.bandwidth >= cost.bandwidth
            && self.anonymity >= cost.anonymity
    }

    /// Adds the provided amount, clamping each currency at the numeric limit.
    #[must_use]
    pub const fn saturating_add(&self, amount: &Self) -> Self {
        Self {
            dharma: self.dharma.saturating_add(amount.dharma),
            bandwidth: self.bandwidth.saturating_add(amount.bandwidth),
            anonymity: self.anonymity.saturating_add(amount.anonymity),
        }
    }

    /// Subtracts the provided amount, clamping each currency at zero.
    #[must_use]
    pub const fn saturating_sub(&self, amount: &Self) -> Self {
        Self {
            dharma: self.dharma.saturating_sub(amount.dharma),
            bandwidth: self.bandwidth.saturating_sub(amount.bandwidth),
            anonymity: self.anonymity.saturating_sub(amount.anonymity),
        }
    }

    /// Scales each currency by the factor, flooring the results.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            dharma: scale_currency(self.dharma, factor),
            bandwidth: scale_currency(self.bandwidth, factor),
            anonymity: scale_currency(self.anonymity, factor),
        }
    }

    /// Reports whether every currency is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.dharma == 0 && self.bandwidth == 0 && self.anonymity == 0
    }
}

fn scale_currency(value: u64, factor: f64) -> u64 {
    let scaled = (value as f64 * factor).floor();
    if scaled <= 0.0 {
        0
    } else if scaled >= u64::MAX as f64 {
        u64::MAX
    } else {
        scaled as u64
    }
}

/// Named timed modifiers that actors can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
    /// Movement halted entirely.
    Frozen,
    /// Periodic fire damage.
    Burning,
    /// Periodic poison damage.
    Poisoned,
    /// Movement or firing cadence slowed.
    Slowed,
    /// Movement accelerated.
    Hasted,
    /// Invisible to defense targeting.
    Stealthed,
    /// Disoriented by an encryption burst.
    Scrambled,
    /// Hidden from enemy abilities.
    Cloaked,
    /// Damage, range, and cadence improved.
    Boosted,
    /// Permanently disabled by monk corruption.
    Corrupted,
    /// Temporarily disabled by an electromagnetic pulse.
    Emp,
    /// Reflecting incoming fire.
    Reflection,
    /// Carrying an encryption payload.
    Encrypted,
    /// Damage output reduced.
    Weakened,
    /// Targeting radius reduced.
    Blinded,
}

impl EffectKind {
    /// Number of distinct effect kinds.
    pub const COUNT: usize = 15;

    /// Dense index of the kind, used by per-actor effect tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A timed modifier applied to an actor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusEffect {
    /// Kind of the effect.
    pub kind: EffectKind,
    /// Time left before the effect expires.
    pub remaining: Duration,
    /// Optional strength of the effect; kinds that need none carry `1.0`.
    pub magnitude: f32,
}

impl StatusEffect {
    /// Creates an effect of the provided kind and duration with unit magnitude.
    #[must_use]
    pub const fn new(kind: EffectKind, remaining: Duration) -> Self {
        Self {
            kind,
            remaining,
            magnitude: 1.0,
        }
    }
}

/// What a single spawn group emits.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SpawnKind {
    /// A regular enemy of the named kind.
    Enemy(EnemyKind),
    /// A boss of the named kind.
    Boss(BossKind),
}

/// One homogeneous batch of spawns within a wave.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnGroup {
    /// Kind every spawn of the group shares.
    pub kind: SpawnKind,
    /// Number of spawns the group emits.
    pub count: u32,
    /// Delay between consecutive spawns of the group.
    pub spawn_delay: Duration,
    /// Multiplier applied to each spawn's base health.
    pub health_scale: f32,
}

/// Ordered spawn groups composing one wave.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WavePlan {
    groups: Vec<SpawnGroup>,
}

impl WavePlan {
    /// Creates a plan from explicit spawn groups.
    #[must_use]
    pub fn new(groups: Vec<SpawnGroup>) -> Self {
        Self { groups }
    }

    /// Spawn groups in emission order.
    #[must_use]
    pub fn groups(&self) -> &[SpawnGroup] {
        &self.groups
    }

    /// Total number of spawns across every group.
    #[must_use]
    pub fn total_spawns(&self) -> u32 {
        self.groups
            .iter()
            .fold(0, |total, group| total.saturating_add(group.count))
    }

    /// Reports whether the plan emits nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Immutable representation of a single enemy used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct EnemySnapshot {
    /// Unique identity of the enemy.
    pub id: EnemyId,
    /// Kind of the enemy.
    pub kind: EnemyKind,
    /// World-space position.
    pub position: Vec2,
    /// Current health.
    pub health: f32,
    /// Health ceiling after wave scaling.
    pub max_health: f32,
    /// Index of the waypoint the enemy is walking toward.
    pub waypoint: usize,
    /// Fraction of the path's arc length already covered.
    pub progress: f32,
    /// Active timed modifiers.
    pub effects: Vec<StatusEffect>,
    /// Boss bookkeeping, present only on boss enemies.
    pub boss: Option<BossSnapshot>,
}

/// Immutable boss bookkeeping attached to a boss enemy's snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BossSnapshot {
    /// Kind of the boss.
    pub kind: BossKind,
    /// Phase the boss currently holds, starting at 1.
    pub phase: u8,
    /// Total phases the boss progresses through.
    pub phases: u8,
    /// Whether the shield currently absorbs damage.
    pub shield_active: bool,
    /// Remaining shield health.
    pub shield_health: f32,
    /// Shield health ceiling.
    pub shield_max: f32,
}

/// Read-only snapshot describing all live enemies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnemyView {
    snapshots: Vec<EnemySnapshot>,
}

impl EnemyView {
    /// Builds a view from pre-sorted snapshots.
    #[must_use]
    pub fn from_snapshots(snapshots: Vec<EnemySnapshot>) -> Self {
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &EnemySnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EnemySnapshot> {
        self.snapshots
    }

    /// Number of live enemies captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view captured no enemies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Immutable representation of a single defense used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct DefenseSnapshot {
    /// Unique identity of the defense.
    pub id: DefenseId,
    /// Kind of the defense.
    pub kind: DefenseKind,
    /// Grid cell the defense occupies.
    pub cell: GridCell,
    /// World-space center of the occupied cell.
    pub center: Vec2,
    /// Current level.
    pub level: u8,
    /// Experience accrued from kills.
    pub experience: u64,
    /// Enemy currently bound as the target, if any.
    pub target: Option<EnemyId>,
    /// Facing angle in radians.
    pub facing: f32,
    /// Whether the defense can currently target and fire.
    pub active: bool,
    /// Whether the special ability is currently running.
    pub special_active: bool,
    /// Time left before the special can trigger again.
    pub special_ready_in: Duration,
    /// Active timed modifiers.
    pub effects: Vec<StatusEffect>,
}

/// Read-only snapshot describing all defenses.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DefenseView {
    snapshots: Vec<DefenseSnapshot>,
}

impl DefenseView {
    /// Builds a view from pre-sorted snapshots.
    #[must_use]
    pub fn from_snapshots(snapshots: Vec<DefenseSnapshot>) -> Self {
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &DefenseSnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<DefenseSnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single projectile used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectileSnapshot {
    /// Unique identity of the projectile.
    pub id: ProjectileId,
    /// Kind of the defense that fired it, which fixes its semantics.
    pub kind: DefenseKind,
    /// World-space position.
    pub position: Vec2,
    /// World-space velocity in units per second.
    pub velocity: Vec2,
    /// Collision radius.
    pub radius: f32,
    /// Damage delivered on hit.
    pub damage: u32,
}

/// Read-only snapshot describing all live projectiles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectileView {
    snapshots: Vec<ProjectileSnapshot>,
}

impl ProjectileView {
    /// Builds a view from pre-sorted snapshots.
    #[must_use]
    pub fn from_snapshots(snapshots: Vec<ProjectileSnapshot>) -> Self {
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &ProjectileSnapshot> {
        self.snapshots.iter()
    }

    /// Number of live projectiles captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view captured no projectiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Aggregate campaign status reported alongside entity views.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GameStatus {
    /// Lifecycle phase of the campaign.
    pub phase: GamePhase,
    /// Whether the simulation clock is paused.
    pub paused: bool,
    /// Current ledger balance.
    pub resources: Resources,
    /// Lives left before the campaign ends.
    pub lives: u32,
    /// Wave the campaign is on.
    pub wave: WaveId,
    /// Whether a wave is currently spawning or being fought.
    pub wave_in_progress: bool,
    /// Accumulated score.
    pub score: u64,
    /// Total simulated time since the campaign began.
    pub clock: Duration,
}

/// Version string written into save documents produced by this engine.
pub const SAVE_VERSION: &str = "1.0";

/// Versioned document capturing an entire campaign.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveDocument {
    /// Format version, checked on load.
    pub version: String,
    /// Caller-supplied wall-clock timestamp in milliseconds.
    pub timestamp: u64,
    /// Captured campaign state.
    pub game: SaveGame,
}

/// Campaign state stored inside a save document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    /// Lifecycle phase at capture time.
    pub state: GamePhase,
    /// Ledger balance at capture time.
    pub resources: Resources,
    /// Lives left at capture time.
    pub lives: u32,
    /// Wave the campaign was on.
    pub wave: u32,
    /// Accumulated score.
    pub score: u64,
    /// Seed driving the campaign's random streams.
    pub seed: u64,
    /// Shape of the generated path.
    pub path_shape: PathShape,
    /// Grid preset selecting the cell edge length.
    pub grid_preset: GridPreset,
    /// Every placed defense.
    pub defenses: Vec<DefenseRecord>,
    /// Every live enemy.
    pub enemies: Vec<EnemyRecord>,
    /// Wave scheduler bookkeeping.
    pub level: LevelRecord,
    /// Defense kind the player had selected, if any.
    pub selected_defense_type: Option<DefenseKind>,
}

/// One placed defense inside a save document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DefenseRecord {
    /// Column of the occupied grid cell.
    pub x: u32,
    /// Row of the occupied grid cell.
    pub y: u32,
    /// Kind of the defense.
    #[serde(rename = "type")]
    pub kind: DefenseKind,
    /// Current level.
    pub level: u8,
    /// Experience accrued from kills.
    pub experience: u64,
    /// Experience required for the informational next-level marker.
    pub exp_to_next: u64,
    /// Active buffs as `(kind, remaining milliseconds)` pairs.
    pub buffs: Vec<(EffectKind, u64)>,
    /// Active debuffs as `(kind, remaining milliseconds)` pairs.
    pub debuffs: Vec<(EffectKind, u64)>,
}

/// One live enemy inside a save document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyRecord {
    /// World-space x coordinate.
    pub x: f32,
    /// World-space y coordinate.
    pub y: f32,
    /// Kind of the enemy.
    #[serde(rename = "type")]
    pub kind: EnemyKind,
    /// Current health.
    pub health: f32,
    /// Health ceiling after wave scaling.
    pub max_health: f32,
    /// Index of the waypoint the enemy is walking toward.
    pub path_index: usize,
    /// Fraction of the path's arc length already covered.
    pub progress: f32,
    /// Active effects as `(kind, remaining milliseconds)` pairs.
    pub status: Vec<(EffectKind, u64)>,
    /// Boss kind, present only on boss enemies.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub boss_kind: Option<BossKind>,
    /// Boss phase, present only on boss enemies.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub phase: Option<u8>,
    /// Whether the boss shield was active, present only on shielded bosses.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub shield: Option<bool>,
    /// Remaining shield health, present only on shielded bosses.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub shield_hp: Option<f32>,
}

/// Wave scheduler bookkeeping inside a save document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    /// Wave the campaign was on.
    pub current_wave: u32,
    /// Whether a wave was spawning or being fought at capture time.
    pub wave_in_progress: bool,
    /// Milliseconds left on the inter-wave countdown.
    pub wave_timer_ms: u64,
}
