//! Projectile arena, kinematics, and collision resolution.

use std::time::Duration;

use glam::Vec2;

use darknet_defence_core::{DefenseId, DefenseKind, EnemyHandle, EnemyId, ProjectileId};

/// Collision radius shared by every projectile.
pub(crate) const PROJECTILE_RADIUS: f32 = 4.0;

/// Distance beyond the field edge at which a projectile expires.
pub(crate) const OUT_OF_BOUNDS_MARGIN: f32 = 50.0;

/// How long a projectile may fly without any target before expiring.
pub(crate) const WANDER_TIMEOUT: Duration = Duration::from_millis(2_000);

/// The balance table expresses projectile speed in units per 60 Hz frame;
/// the engine works in units per second and converts once at fire time.
pub(crate) const PROJECTILE_SPEED_SCALE: f32 = 60.0;

/// Flight behavior a projectile inherits from its firing defense.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ProjectileBehavior {
    /// Straight flight, expires on first hit.
    Plain,
    /// Straight flight, passes through enemies, hits each at most once.
    Piercing,
    /// Steers toward its target every tick, retargets when the target dies.
    Homing,
    /// Straight flight, splashes reduced damage around the impact.
    Splash,
    /// Straight flight, leaves a cloaking mark on the victim.
    Cloaking,
}

/// Flight behavior for projectiles fired by the provided defense kind.
pub(crate) fn behavior_for(kind: DefenseKind) -> ProjectileBehavior {
    match kind {
        DefenseKind::Firewall | DefenseKind::Decoy => ProjectileBehavior::Plain,
        DefenseKind::Encryption => ProjectileBehavior::Piercing,
        DefenseKind::Mirror => ProjectileBehavior::Homing,
        DefenseKind::Anonymity => ProjectileBehavior::Cloaking,
        DefenseKind::Distributor => ProjectileBehavior::Splash,
    }
}

/// Authoritative record of a single projectile in flight.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ProjectileState {
    pub(crate) id: ProjectileId,
    pub(crate) kind: DefenseKind,
    pub(crate) origin: DefenseId,
    pub(crate) position: Vec2,
    pub(crate) velocity: Vec2,
    pub(crate) radius: f32,
    pub(crate) damage: u32,
    pub(crate) target: Option<EnemyHandle>,
    /// Enemies already struck; piercing shots never strike one twice.
    pub(crate) already_hit: Vec<EnemyHandle>,
    pub(crate) untargeted_for: Duration,
    /// Countdown of an encryption overlay applied by a special ability.
    pub(crate) encrypted_remaining: Duration,
    pub(crate) active: bool,
}

/// Start-of-phase facts about one enemy a projectile may strike.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ImpactProbe {
    pub(crate) handle: EnemyHandle,
    pub(crate) id: EnemyId,
    pub(crate) position: Vec2,
    pub(crate) size: f32,
}

/// One collision recorded during the projectile phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct HitRecord {
    pub(crate) projectile: ProjectileId,
    pub(crate) origin: DefenseId,
    pub(crate) kind: DefenseKind,
    pub(crate) target: EnemyHandle,
    pub(crate) target_id: EnemyId,
    pub(crate) damage: u32,
    pub(crate) position: Vec2,
}

/// Free-list arena owning every projectile; slots recycle between shots.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ProjectileArena {
    slots: Vec<Option<ProjectileState>>,
    free: Vec<u32>,
    next_id: u32,
}

impl ProjectileArena {
    /// Fires a projectile from the defense center toward the aim point.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn fire(
        &mut self,
        kind: DefenseKind,
        origin: DefenseId,
        from: Vec2,
        toward: Vec2,
        speed: f32,
        damage: u32,
        target: EnemyHandle,
    ) -> ProjectileId {
        let id = ProjectileId::new(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        let direction = toward - from;
        let velocity = if direction.length() <= f32::EPSILON {
            Vec2::new(speed * PROJECTILE_SPEED_SCALE, 0.0)
        } else {
            direction.normalize() * speed * PROJECTILE_SPEED_SCALE
        };

        let state = ProjectileState {
            id,
            kind,
            origin,
            position: from,
            velocity,
            radius: PROJECTILE_RADIUS,
            damage,
            target: Some(target),
            already_hit: Vec::new(),
            untargeted_for: Duration::ZERO,
            encrypted_remaining: Duration::ZERO,
            active: true,
        };

        if let Some(index) = self.free.pop() {
            debug_assert!(self.slots[index as usize].is_none());
            self.slots[index as usize] = Some(state);
        } else {
            self.slots.push(Some(state));
        }
        id
    }

    /// Iterator over every live projectile in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &ProjectileState> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    /// Mutable variant of [`Self::iter`].
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ProjectileState> {
        self.slots.iter_mut().filter_map(|slot| slot.as_mut())
    }

    /// Removes inactive projectiles, recycling their slots.
    pub(crate) fn prune(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let expired = slot
                .as_ref()
                .map(|projectile| !projectile.active)
                .unwrap_or(false);
            if expired {
                *slot = None;
                self.free.push(index as u32);
            }
        }
    }
}

/// Advances one projectile and records any collisions into `hits`.
///
/// Homing shots steer every tick and retarget the nearest live enemy when
/// their handle goes stale; everything else keeps its last velocity and
/// expires off the board or after flying untargeted for too long.
pub(crate) fn step_projectile(
    projectile: &mut ProjectileState,
    dt: Duration,
    probes: &[ImpactProbe],
    field_width: f32,
    field_height: f32,
    hits: &mut Vec<HitRecord>,
) {
    if !projectile.active {
        return;
    }

    projectile.encrypted_remaining = projectile.encrypted_remaining.saturating_sub(dt);

    let behavior = behavior_for(projectile.kind);
    let target_probe = projectile
        .target
        .and_then(|target| probes.iter().find(|probe| probe.handle == target));

    match target_probe {
        Some(probe) => {
            projectile.untargeted_for = Duration::ZERO;
            if behavior == ProjectileBehavior::Homing {
                let direction = probe.position - projectile.position;
                if direction.length() > f32::EPSILON {
                    projectile.velocity = direction.normalize() * projectile.velocity.length();
                }
            }
        }
        None => {
            projectile.target = None;
            if behavior == ProjectileBehavior::Homing {
                projectile.target = nearest_enemy(projectile, probes);
            }
            if projectile.target.is_none() {
                projectile.untargeted_for = projectile.untargeted_for.saturating_add(dt);
                if projectile.untargeted_for >= WANDER_TIMEOUT {
                    projectile.active = false;
                    return;
                }
            }
        }
    }

    projectile.position += projectile.velocity * dt.as_secs_f32();

    if projectile.position.x < -OUT_OF_BOUNDS_MARGIN
        || projectile.position.y < -OUT_OF_BOUNDS_MARGIN
        || projectile.position.x > field_width + OUT_OF_BOUNDS_MARGIN
        || projectile.position.y > field_height + OUT_OF_BOUNDS_MARGIN
    {
        projectile.active = false;
        return;
    }

    match behavior {
        ProjectileBehavior::Piercing => {
            for probe in probes {
                if projectile.already_hit.contains(&probe.handle) {
                    continue;
                }
                if touches(projectile, probe) {
                    projectile.already_hit.push(probe.handle);
                    hits.push(hit_record(projectile, probe));
                }
            }
        }
        _ => {
            if let Some(target) = projectile.target {
                if let Some(probe) = probes.iter().find(|probe| probe.handle == target) {
                    if touches(projectile, probe) {
                        projectile.already_hit.push(probe.handle);
                        hits.push(hit_record(projectile, probe));
                        projectile.active = false;
                    }
                }
            }
        }
    }
}

fn touches(projectile: &ProjectileState, probe: &ImpactProbe) -> bool {
    projectile.position.distance(probe.position) <= probe.size + projectile.radius
}

fn hit_record(projectile: &ProjectileState, probe: &ImpactProbe) -> HitRecord {
    HitRecord {
        projectile: projectile.id,
        origin: projectile.origin,
        kind: projectile.kind,
        target: probe.handle,
        target_id: probe.id,
        damage: projectile.damage,
        position: probe.position,
    }
}

fn nearest_enemy(projectile: &ProjectileState, probes: &[ImpactProbe]) -> Option<EnemyHandle> {
    let mut best: Option<(f32, EnemyId, EnemyHandle)> = None;
    for probe in probes {
        if projectile.already_hit.contains(&probe.handle) {
            continue;
        }
        let distance = probe.position.distance(projectile.position);
        let replace = match &best {
            Some((best_distance, best_id, _)) => {
                distance < *best_distance || (distance == *best_distance && probe.id < *best_id)
            }
            None => true,
        };
        if replace {
            best = Some((distance, probe.id, probe.handle));
        }
    }
    best.map(|(_, _, handle)| handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD: (f32, f32) = (800.0, 600.0);

    fn probe(id: u32, position: Vec2) -> ImpactProbe {
        ImpactProbe {
            handle: EnemyHandle::new(id, 0),
            id: EnemyId::new(id),
            position,
            size: 15.0,
        }
    }

    fn fired(arena: &mut ProjectileArena, kind: DefenseKind, toward: Vec2) -> ProjectileId {
        arena.fire(
            kind,
            DefenseId::new(0),
            Vec2::ZERO,
            toward,
            5.0,
            30,
            EnemyHandle::new(0, 0),
        )
    }

    fn single_mut(arena: &mut ProjectileArena) -> &mut ProjectileState {
        arena.iter_mut().next().expect("live projectile")
    }

    #[test]
    fn slots_recycle_after_pruning() {
        let mut arena = ProjectileArena::default();
        let first = fired(&mut arena, DefenseKind::Firewall, Vec2::new(100.0, 0.0));
        single_mut(&mut arena).active = false;
        arena.prune();
        assert_eq!(arena.iter().count(), 0);

        let second = fired(&mut arena, DefenseKind::Firewall, Vec2::new(100.0, 0.0));
        assert_ne!(first, second);
        assert_eq!(arena.iter().count(), 1);
    }

    #[test]
    fn plain_shots_expire_on_first_hit() {
        let mut arena = ProjectileArena::default();
        let _ = fired(&mut arena, DefenseKind::Firewall, Vec2::new(100.0, 0.0));
        let probes = vec![probe(0, Vec2::new(100.0, 0.0))];

        let mut hits = Vec::new();
        let projectile = single_mut(&mut arena);
        for _ in 0..60 {
            step_projectile(
                projectile,
                Duration::from_millis(16),
                &probes,
                FIELD.0,
                FIELD.1,
                &mut hits,
            );
        }

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].damage, 30);
        assert!(!projectile.active);
    }

    #[test]
    fn piercing_shots_strike_each_enemy_once() {
        let mut arena = ProjectileArena::default();
        let _ = fired(&mut arena, DefenseKind::Encryption, Vec2::new(100.0, 0.0));
        let probes = vec![
            probe(0, Vec2::new(80.0, 0.0)),
            probe(1, Vec2::new(160.0, 0.0)),
            probe(2, Vec2::new(240.0, 0.0)),
        ];

        let mut hits = Vec::new();
        let projectile = single_mut(&mut arena);
        for _ in 0..120 {
            step_projectile(
                projectile,
                Duration::from_millis(16),
                &probes,
                FIELD.0,
                FIELD.1,
                &mut hits,
            );
            if !projectile.active {
                break;
            }
        }

        assert_eq!(hits.len(), 3);
        let mut struck: Vec<u32> = hits.iter().map(|hit| hit.target_id.get()).collect();
        struck.sort_unstable();
        assert_eq!(struck, vec![0, 1, 2]);
        assert!(
            hits.iter().all(|hit| hit.projectile == projectile.id),
            "one projectile accounts for every hit",
        );
    }

    #[test]
    fn homing_shots_retarget_the_nearest_enemy() {
        let mut arena = ProjectileArena::default();
        let _ = arena.fire(
            DefenseKind::Mirror,
            DefenseId::new(0),
            Vec2::ZERO,
            Vec2::new(100.0, 0.0),
            8.0,
            40,
            EnemyHandle::new(9, 3),
        );
        // The original target is gone; only enemy 1 remains, off the line.
        let probes = vec![probe(1, Vec2::new(60.0, 80.0))];

        let mut hits = Vec::new();
        let projectile = single_mut(&mut arena);
        for _ in 0..120 {
            step_projectile(
                projectile,
                Duration::from_millis(16),
                &probes,
                FIELD.0,
                FIELD.1,
                &mut hits,
            );
            if !projectile.active {
                break;
            }
        }

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target_id, EnemyId::new(1));
    }

    #[test]
    fn untargeted_shots_expire_after_the_wander_timeout() {
        let mut arena = ProjectileArena::default();
        let _ = fired(&mut arena, DefenseKind::Firewall, Vec2::new(0.0, -100.0));
        let projectile = single_mut(&mut arena);
        projectile.target = None;
        projectile.velocity = Vec2::ZERO;

        step_projectile(projectile, WANDER_TIMEOUT, &[], FIELD.0, FIELD.1, &mut Vec::new());
        assert!(!projectile.active);
    }

    #[test]
    fn shots_expire_beyond_the_field_margin() {
        let mut arena = ProjectileArena::default();
        let _ = fired(&mut arena, DefenseKind::Firewall, Vec2::new(-10.0, 0.0));
        let projectile = single_mut(&mut arena);

        let mut hits = Vec::new();
        for _ in 0..120 {
            step_projectile(
                projectile,
                Duration::from_millis(16),
                &[],
                FIELD.0,
                FIELD.1,
                &mut hits,
            );
            if !projectile.active {
                break;
            }
        }

        assert!(!projectile.active);
        assert!(hits.is_empty());
    }
}
