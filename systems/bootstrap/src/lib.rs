#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure bootstrap system that prepares the Darknet Defence experience.

use glam::Vec2;

use darknet_defence_core::GameStatus;
use darknet_defence_world::{query, GridGeometry, World};

/// Produces data required to greet the player.
#[derive(Debug, Default)]
pub struct Bootstrap;

impl Bootstrap {
    /// Derives the banner that should be shown when the experience starts.
    #[must_use]
    pub fn welcome_banner(&self, world: &World) -> &'static str {
        query::welcome_banner(world)
    }

    /// Exposes the grid layout required for rendering.
    #[must_use]
    pub fn grid(&self, world: &World) -> GridGeometry {
        query::grid(world)
    }

    /// Exposes the path waypoints for presentation purposes.
    #[must_use]
    pub fn path<'world>(&self, world: &'world World) -> &'world [Vec2] {
        query::path_points(world)
    }

    /// Exposes the aggregate campaign status.
    #[must_use]
    pub fn status(&self, world: &World) -> GameStatus {
        query::status(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darknet_defence_core::WELCOME_BANNER;

    #[test]
    fn bootstrap_surfaces_the_campaign_basics() {
        let world = World::new();
        let bootstrap = Bootstrap;

        assert_eq!(bootstrap.welcome_banner(&world), WELCOME_BANNER);
        assert!(bootstrap.path(&world).len() >= 2);
        assert_eq!(bootstrap.grid(&world).columns(), 20);
        assert_eq!(bootstrap.status(&world).lives, 20);
    }
}
