//! Dense per-actor status-effect tables.

use std::time::Duration;

use darknet_defence_core::{EffectKind, StatusEffect};

/// Fixed-size effect table carried by every actor.
///
/// One slot per [`EffectKind`], so application and lookup are O(1) and
/// iteration touches a single small array. At most one instance of a kind is
/// ever active; re-application refreshes the remaining duration and keeps the
/// larger magnitude.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct EffectTable {
    slots: [Option<EffectSlot>; EffectKind::COUNT],
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct EffectSlot {
    remaining: Duration,
    magnitude: f32,
}

impl EffectTable {
    /// Applies or refreshes an effect of the provided kind.
    pub(crate) fn apply(&mut self, kind: EffectKind, duration: Duration, magnitude: f32) {
        let slot = &mut self.slots[kind.index()];
        match slot {
            Some(existing) => {
                existing.remaining = existing.remaining.max(duration);
                existing.magnitude = existing.magnitude.max(magnitude);
            }
            None => {
                *slot = Some(EffectSlot {
                    remaining: duration,
                    magnitude,
                });
            }
        }
    }

    /// Counts down every active effect, expiring those that reach zero.
    ///
    /// [`EffectKind::Corrupted`] never expires; corruption is terminal.
    pub(crate) fn tick(&mut self, dt: Duration) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if index == EffectKind::Corrupted.index() {
                continue;
            }
            if let Some(effect) = slot {
                effect.remaining = effect.remaining.saturating_sub(dt);
                if effect.remaining.is_zero() {
                    *slot = None;
                }
            }
        }
    }

    /// Reports whether an effect of the provided kind is active.
    pub(crate) fn has(&self, kind: EffectKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Removes every active effect.
    pub(crate) fn clear(&mut self) {
        self.slots = Default::default();
    }

    /// Movement multiplier derived from the motion-affecting effects.
    pub(crate) fn speed_multiplier(&self) -> f32 {
        if self.has(EffectKind::Frozen) {
            return 0.0;
        }
        let mut multiplier = 1.0;
        if self.has(EffectKind::Slowed) {
            multiplier *= 0.5;
        }
        if self.has(EffectKind::Hasted) {
            multiplier *= 1.5;
        }
        multiplier
    }

    /// Every active effect in kind order, for snapshots and saves.
    pub(crate) fn all(&self) -> Vec<StatusEffect> {
        const KINDS: [EffectKind; EffectKind::COUNT] = [
            EffectKind::Frozen,
            EffectKind::Burning,
            EffectKind::Poisoned,
            EffectKind::Slowed,
            EffectKind::Hasted,
            EffectKind::Stealthed,
            EffectKind::Scrambled,
            EffectKind::Cloaked,
            EffectKind::Boosted,
            EffectKind::Corrupted,
            EffectKind::Emp,
            EffectKind::Reflection,
            EffectKind::Encrypted,
            EffectKind::Weakened,
            EffectKind::Blinded,
        ];

        let mut effects = Vec::new();
        for kind in KINDS {
            if let Some(slot) = self.slots[kind.index()] {
                effects.push(StatusEffect {
                    kind,
                    remaining: slot.remaining,
                    magnitude: slot.magnitude,
                });
            }
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_refreshes_to_the_longer_duration() {
        let mut table = EffectTable::default();
        table.apply(EffectKind::Slowed, Duration::from_millis(2_000), 1.0);
        table.apply(EffectKind::Slowed, Duration::from_millis(500), 1.0);

        let effects = table.all();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].remaining, Duration::from_millis(2_000));
    }

    #[test]
    fn larger_magnitude_wins_on_reapplication() {
        let mut table = EffectTable::default();
        table.apply(EffectKind::Boosted, Duration::from_millis(1_000), 1.0);
        table.apply(EffectKind::Boosted, Duration::from_millis(500), 2.0);

        assert_eq!(table.all()[0].magnitude, 2.0);
    }

    #[test]
    fn effects_expire_silently_after_their_duration() {
        let mut table = EffectTable::default();
        table.apply(EffectKind::Stealthed, Duration::from_millis(100), 1.0);

        table.tick(Duration::from_millis(99));
        assert!(table.has(EffectKind::Stealthed));

        table.tick(Duration::from_millis(1));
        assert!(!table.has(EffectKind::Stealthed));
    }

    #[test]
    fn corruption_outlives_any_countdown() {
        let mut table = EffectTable::default();
        table.apply(EffectKind::Corrupted, Duration::from_millis(1_000), 1.0);
        table.tick(Duration::from_secs(3_600));
        assert!(table.has(EffectKind::Corrupted));
    }

    #[test]
    fn speed_multiplier_combines_motion_effects() {
        let mut table = EffectTable::default();
        assert_eq!(table.speed_multiplier(), 1.0);

        table.apply(EffectKind::Slowed, Duration::from_millis(1_000), 1.0);
        assert_eq!(table.speed_multiplier(), 0.5);

        table.apply(EffectKind::Hasted, Duration::from_millis(1_000), 1.0);
        assert_eq!(table.speed_multiplier(), 0.75);

        table.apply(EffectKind::Frozen, Duration::from_millis(1_000), 1.0);
        assert_eq!(table.speed_multiplier(), 0.0);
    }
}
