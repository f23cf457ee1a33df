#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives headless Darknet Defence campaigns.
//!
//! The session owns the orchestration loop: queued commands flush into the
//! world, ticks advance the simulation, and emitted events round-trip
//! through the pure systems (wave generation answers plan requests, the
//! achievement monitor latches unlocks) until the frame is quiescent. A
//! deterministic greedy builder stands in for the player, so a seeded run
//! always replays the same campaign.

mod loadout_transfer;

use std::{
    fs,
    path::PathBuf,
    str::FromStr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use darknet_defence_core::{
    Command, DefenseKind, Event, GamePhase, GridCell, GridPreset, PathShape, SaveDocument,
    MAX_WAVES, SAVE_VERSION,
};
use darknet_defence_system_achievements::Achievements;
use darknet_defence_system_bootstrap::Bootstrap;
use darknet_defence_system_wave_generation::WaveGeneration;
use darknet_defence_world::{self as world, query, World};

use crate::loadout_transfer::{LoadoutDefense, LoadoutSnapshot, LOADOUT_HEADER_V1};

const DEFAULT_TICK_MS: u64 = 16;
/// Safety cap so a stalled wave cannot spin the adapter forever.
const MAX_TICKS_PER_WAVE: u32 = 40_000;
/// How close to the path the greedy builder wants its defenses.
const BUILD_BAND: f32 = 120.0;

/// Command-line arguments for launching a headless campaign.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Seed driving every random stream of the campaign.
    #[arg(long, value_name = "SEED", default_value_t = 0)]
    seed: u64,
    /// Shape of the generated path (default, spiral, zigzag, loop, cross).
    #[arg(long, value_name = "SHAPE", default_value = "default")]
    shape: ShapeArg,
    /// Use the compact 30-unit grid instead of the standard 40-unit grid.
    #[arg(long)]
    compact: bool,
    /// Number of waves to play before reporting.
    #[arg(
        long,
        value_name = "COUNT",
        default_value_t = MAX_WAVES,
        value_parser = clap::value_parser!(u32).range(1..=MAX_WAVES as i64)
    )]
    waves: u32,
    /// Milliseconds of simulated time per tick.
    #[arg(
        long = "tick-ms",
        value_name = "MILLISECONDS",
        default_value_t = DEFAULT_TICK_MS,
        value_parser = clap::value_parser!(u64).range(1..=1_000)
    )]
    tick_ms: u64,
    /// Restore the campaign from a save file before playing.
    #[arg(long, value_name = "PATH")]
    load: Option<PathBuf>,
    /// Write the campaign to a save file after playing.
    #[arg(long, value_name = "PATH")]
    save: Option<PathBuf>,
    /// Apply a shared loadout code before the first wave.
    #[arg(long = "import-loadout", value_name = "CODE")]
    import_loadout: Option<String>,
    /// Print the final defense layout as a shareable loadout code.
    #[arg(long = "export-loadout")]
    export_loadout: bool,
}

/// Path shape parsed from its command-line spelling.
#[derive(Clone, Copy, Debug)]
struct ShapeArg(PathShape);

impl FromStr for ShapeArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self(PathShape::Default)),
            "spiral" => Ok(Self(PathShape::Spiral)),
            "zigzag" => Ok(Self(PathShape::Zigzag)),
            "loop" => Ok(Self(PathShape::Loop)),
            "cross" => Ok(Self(PathShape::Cross)),
            other => Err(format!("unknown path shape '{other}'")),
        }
    }
}

/// Entry point for the Darknet Defence command-line interface.
fn main() -> Result<()> {
    env_logger::init();
    let args = CliArgs::parse();

    let preset = if args.compact {
        GridPreset::Compact
    } else {
        GridPreset::Standard
    };

    let mut session = match &args.load {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading save file {}", path.display()))?;
            let document: SaveDocument =
                serde_json::from_str(&raw).context("parsing save document")?;
            if document.version != SAVE_VERSION {
                warn!(
                    "save version {} differs from engine version {SAVE_VERSION}; \
                     loading best-effort",
                    document.version,
                );
            }
            Session::from_document(document)?
        }
        None => Session::new(args.seed, args.shape.0, preset),
    };

    let bootstrap = Bootstrap;
    info!("{}", bootstrap.welcome_banner(session.world()));

    if let Some(code) = &args.import_loadout {
        session.import_loadout(code)?;
    }

    session.run_campaign(args.waves, Duration::from_millis(args.tick_ms));

    let status = bootstrap.status(session.world());
    println!(
        "campaign ended: phase={:?} wave={} lives={} score={}",
        status.phase,
        status.wave.get(),
        status.lives,
        status.score,
    );
    println!(
        "resources: dharma={} bandwidth={} anonymity={}",
        status.resources.dharma, status.resources.bandwidth, status.resources.anonymity,
    );
    let unlocked: Vec<u32> = session.achievements.unlocked().map(|id| id.get()).collect();
    println!("achievements unlocked: {unlocked:?}");

    if args.export_loadout {
        println!("loadout: {}", session.export_loadout());
    }

    if let Some(path) = &args.save {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock before the epoch")?
            .as_millis() as u64;
        let document = query::save_document(session.world(), timestamp);
        let raw = serde_json::to_string_pretty(&document).context("encoding save document")?;
        fs::write(path, raw).with_context(|| format!("writing save file {}", path.display()))?;
        info!("campaign saved to {}", path.display());
    }

    Ok(())
}

/// Owns the world, the pure systems, and the command/event round trip.
#[derive(Debug)]
struct Session {
    world: World,
    wave_generation: WaveGeneration,
    achievements: Achievements,
    queued_commands: Vec<Command>,
    scratch_commands: Vec<Command>,
    collected_events: Vec<Event>,
}

impl Session {
    fn new(seed: u64, shape: PathShape, preset: GridPreset) -> Self {
        let mut session = Self {
            world: World::new(),
            wave_generation: WaveGeneration::new(seed),
            achievements: Achievements::new(),
            queued_commands: Vec::new(),
            scratch_commands: Vec::new(),
            collected_events: Vec::new(),
        };
        session.submit(Command::NewGame {
            seed,
            shape,
            preset,
        });
        session.flush_queued_commands();
        let _ = session.drain_events();
        session
    }

    fn from_document(document: SaveDocument) -> Result<Self> {
        let seed = document.game.seed;
        let mut session = Self {
            world: World::new(),
            wave_generation: WaveGeneration::new(seed),
            achievements: Achievements::new(),
            queued_commands: Vec::new(),
            scratch_commands: Vec::new(),
            collected_events: Vec::new(),
        };
        session.submit(Command::RestoreGame { document });
        session.flush_queued_commands();
        let events = session.drain_events();
        if !events
            .iter()
            .any(|event| matches!(event, Event::GameRestored { .. }))
        {
            bail!("save document was rejected: {events:?}");
        }
        info!(
            "campaign restored at wave {}",
            query::status(&session.world).wave.get(),
        );
        Ok(session)
    }

    fn world(&self) -> &World {
        &self.world
    }

    fn submit(&mut self, command: Command) {
        self.queued_commands.push(command);
    }

    /// Advances one frame: queued commands, then the tick, then the
    /// system round trip until no new commands are generated.
    fn advance(&mut self, dt: Duration) -> Vec<Event> {
        self.flush_queued_commands();

        let mut events = Vec::new();
        world::apply(&mut self.world, Command::Tick { dt }, &mut events);
        self.pump(events);

        self.drain_events()
    }

    fn flush_queued_commands(&mut self) {
        if self.queued_commands.is_empty() {
            return;
        }
        let mut events = Vec::new();
        for command in self.queued_commands.drain(..) {
            world::apply(&mut self.world, command, &mut events);
        }
        self.pump(events);
    }

    /// Feeds events through the systems and applies the commands they
    /// answer with, looping until the frame is quiescent.
    fn pump(&mut self, mut events: Vec<Event>) {
        loop {
            if events.is_empty() {
                break;
            }
            self.collected_events.extend(events.iter().cloned());

            self.scratch_commands.clear();
            self.wave_generation.handle(&events, &mut self.scratch_commands);
            let mut system_events = Vec::new();
            self.achievements
                .handle(&events, &mut self.scratch_commands, &mut system_events);

            events = system_events;
            for command in self.scratch_commands.drain(..) {
                world::apply(&mut self.world, command, &mut events);
            }
        }
    }

    fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.collected_events)
    }

    /// Plays waves until the target count completes or the campaign ends.
    fn run_campaign(&mut self, target_waves: u32, dt: Duration) {
        self.autoplay_build();

        loop {
            let status = query::status(&self.world);
            if status.phase != GamePhase::Playing || status.wave.get() >= target_waves {
                break;
            }

            self.submit(Command::StartWave);
            let mut ticks = 0u32;
            loop {
                let events = self.advance(dt);
                let mut wave_done = false;
                for event in &events {
                    match event {
                        Event::WaveStarted { wave } => {
                            info!("wave {} started", wave.get());
                        }
                        Event::WaveCompleted { wave, bonus } => {
                            info!(
                                "wave {} completed, bonus {}d/{}b/{}a",
                                wave.get(),
                                bonus.dharma,
                                bonus.bandwidth,
                                bonus.anonymity,
                            );
                            wave_done = true;
                        }
                        Event::BossPhaseChange { from, to, .. } => {
                            info!("boss escalated from phase {from} to {to}");
                        }
                        Event::AchievementUnlocked { id } => {
                            info!("achievement {} unlocked", id.get());
                        }
                        Event::GameOver { wave, score } => {
                            warn!("defenses fell on wave {} (score {score})", wave.get());
                            wave_done = true;
                        }
                        Event::Victory { score } => {
                            info!("campaign complete (score {score})");
                            wave_done = true;
                        }
                        _ => {}
                    }
                }
                if wave_done {
                    break;
                }
                ticks += 1;
                if ticks > MAX_TICKS_PER_WAVE {
                    warn!("wave stalled after {ticks} ticks; abandoning the run");
                    return;
                }
            }

            self.autoplay_build();
        }
    }

    /// Greedy deterministic builder: firewalls hugging the path while
    /// affordable, then level upgrades for what already stands.
    fn autoplay_build(&mut self) {
        loop {
            let Some(cell) = self.best_build_cell() else {
                break;
            };
            self.submit(Command::PlaceDefense {
                cell,
                kind: DefenseKind::Firewall,
            });
            self.flush_queued_commands();
            let placed = self
                .drain_events()
                .iter()
                .any(|event| matches!(event, Event::DefensePlaced { .. }));
            if !placed {
                break;
            }
        }

        let ids: Vec<_> = query::defense_view(&self.world)
            .iter()
            .map(|defense| defense.id)
            .collect();
        for id in ids {
            self.submit(Command::UpgradeDefense { id });
        }
        self.flush_queued_commands();
        let _ = self.drain_events();
    }

    /// The legal cell closest to the early path, if any affordable slot
    /// within the build band remains.
    fn best_build_cell(&self) -> Option<GridCell> {
        if !query::can_afford(&self.world, &DefenseKind::Firewall.spec().cost) {
            return None;
        }

        let grid = query::grid(&self.world);
        let waypoints = query::path_points(&self.world);
        let early = &waypoints[..waypoints.len().div_ceil(2)];

        let mut best: Option<(f32, GridCell)> = None;
        for row in 0..grid.rows() {
            for column in 0..grid.columns() {
                let cell = GridCell::new(column, row);
                if query::can_place(&self.world, cell, DefenseKind::Firewall).is_err() {
                    continue;
                }
                let center = cell.center(grid.cell_length());
                let distance = early
                    .iter()
                    .map(|point| point.distance(center))
                    .fold(f32::MAX, f32::min);
                if distance > BUILD_BAND {
                    continue;
                }
                let better = match &best {
                    Some((best_distance, _)) => distance < *best_distance,
                    None => true,
                };
                if better {
                    best = Some((distance, cell));
                }
            }
        }
        best.map(|(_, cell)| cell)
    }

    fn import_loadout(&mut self, code: &str) -> Result<()> {
        let snapshot = LoadoutSnapshot::decode(code).map_err(|error| {
            anyhow::anyhow!("invalid loadout code (expected a {LOADOUT_HEADER_V1} string): {error}")
        })?;
        let grid = query::grid(&self.world);
        if snapshot.columns != grid.columns() || snapshot.rows != grid.rows() {
            bail!(
                "loadout was captured on a {}x{} grid, this field is {}x{}",
                snapshot.columns,
                snapshot.rows,
                grid.columns(),
                grid.rows(),
            );
        }

        for defense in &snapshot.defenses {
            self.submit(Command::PlaceDefense {
                cell: defense.cell,
                kind: defense.kind,
            });
            self.flush_queued_commands();
            let events = self.drain_events();
            let placed = events.iter().find_map(|event| match event {
                Event::DefensePlaced { defense, .. } => Some(*defense),
                _ => None,
            });
            match placed {
                Some(id) => {
                    for _ in 1..defense.level {
                        self.submit(Command::UpgradeDefense { id });
                    }
                    self.flush_queued_commands();
                    let _ = self.drain_events();
                }
                None => warn!(
                    "loadout defense at {},{} could not be placed",
                    defense.cell.column(),
                    defense.cell.row(),
                ),
            }
        }
        Ok(())
    }

    fn export_loadout(&self) -> String {
        let grid = query::grid(&self.world);
        let defenses = query::defense_view(&self.world)
            .iter()
            .map(|defense| LoadoutDefense {
                kind: defense.kind,
                cell: defense.cell,
                level: defense.level,
            })
            .collect();
        LoadoutSnapshot {
            columns: grid.columns(),
            rows: grid.rows(),
            preset: if (grid.cell_length() - GridPreset::Compact.cell_length()).abs() < f32::EPSILON
            {
                GridPreset::Compact
            } else {
                GridPreset::Standard
            },
            defenses,
        }
        .encode()
    }
}
