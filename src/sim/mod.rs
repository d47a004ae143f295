//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Seeded RNG only
//! - Sim-clock time only (no wall clock)
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod blob;
pub mod collision;
pub mod energy;
pub mod map;
pub mod rift;
pub mod spawn;
pub mod state;
pub mod tick;

pub use blob::BlobShape;
pub use collision::{Rect, circle_intersects_rect, resolve_circle_obstacles, resolve_circle_rect};
pub use map::{CrystalDeposit, MapData, Obstacle, ObstacleKind, generate_map};
pub use state::{
    AbilityHud, Bullet, Camera, DockState, Enemy, GameMode, GamePhase, GameState, HudView, Player,
    PowerUp, PowerUpKind, SimEvent, WorldView, YolkColor,
};
pub use tick::{TickInput, apply_view, reset_run, tick};
