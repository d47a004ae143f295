//! Yolk Drift - a scrolling-map arcade survival game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (movement, combat, docking, world swaps)
//! - `profile`: Persistent progress, trophies and local leaderboard
//! - `settings`: Player-facing options

pub mod profile;
pub mod settings;
pub mod sim;

pub use profile::Profile;
pub use settings::Settings;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Reference frame length; wall-clock `dt` is converted into 60 Hz frame units
    pub const BASE_FRAME_MS: f32 = 1000.0 / 60.0;
    /// Frame-unit delta clamp (a stalled tab resumes without a physics blowup)
    pub const DT_FRAMES_MIN: f32 = 0.5;
    pub const DT_FRAMES_MAX: f32 = 2.0;

    /// Player capsule
    pub const PLAYER_RADIUS: f32 = 10.0;
    pub const PLAYER_RADIUS_PHONE: f32 = 9.5;
    pub const PLAYER_SPEED: f32 = 3.0;
    pub const PLAYER_SPEED_BOOSTED: f32 = 5.0;
    pub const PLAYER_INVULN_MS: f32 = 1500.0;
    pub const AIM_KEY_STEP: f32 = std::f32::consts::PI / 24.0;
    /// Mouse aim only holds for a short window after the last pointer move
    pub const MOUSE_AIM_HOLD_MS: f32 = 2000.0;
    pub const MAX_LIVES: u32 = 6;
    /// Separation applied when an enemy contact knocks the player back
    pub const KNOCKBACK_PAD: f32 = 8.0;

    /// Auto-fire
    pub const FIRE_DELAY_MS: f32 = 250.0;
    pub const FIRE_DELAY_BOOSTED_MS: f32 = 125.0;

    /// Bullets (speeds are px per 60 Hz frame)
    pub const MAX_BULLETS: usize = 256;
    pub const BULLET_SPEED: f32 = 5.0;
    pub const BULLET_RADIUS: f32 = 3.0;
    pub const BULLET_HIT_PAD: f32 = 1.25;
    /// Re-bounce suppression window against the same obstacle
    pub const BULLET_REBOUNCE_MS: f32 = 60.0;

    /// Energy and docking
    pub const ENERGY_MAX: f32 = 100.0;
    pub const ENERGY_DRAIN_PER_SEC: f32 = 4.0;
    pub const ENERGY_EMPTY_SPEED_MULT: f32 = 0.18;
    pub const ENERGY_AFTER_LIFE_LOSS: f32 = 20.0;
    pub const DOCK_RANGE: f32 = 26.0;
    pub const DOCK_RANGE_TOUCH_PAD: f32 = 14.0;
    /// Under this per-frame displacement the player counts as holding still
    pub const DOCK_MOVE_EPS: f32 = 0.85;
    pub const DOCK_IDLE_MS: f32 = 650.0;
    pub const DOCK_TOUCH_DEBOUNCE_MS: f32 = 120.0;
    pub const DOCK_CONNECT_MS: f32 = 2000.0;
    pub const DOCK_RECHARGE_MS: f32 = 4000.0;
    /// Desktop auto-dock assist arms below this energy fraction
    pub const ENERGY_AUTO_DOCK_THRESHOLD: f32 = 0.25;
    pub const FULL_CHARGE_FX_MS: f32 = 950.0;
    /// Crystal field radius derived from the host obstacle's footprint
    pub const FIELD_RADIUS_SCALE: f32 = 1.85;
    pub const FIELD_RADIUS_MIN: f32 = 140.0;
    pub const FIELD_RADIUS_MAX: f32 = 340.0;

    /// Power-ups
    pub const POWERUP_DURATION_MS: f32 = 15000.0;
    pub const POWERUP_DROP_CHANCE: f32 = 0.10;
    pub const POWERUP_LIFE_DROP_CHANCE: f32 = 0.05;
    pub const STASIS_SPEED_MULT: f32 = 0.22;
    pub const POWERUP_RADIUS: f32 = 8.0;
    pub const POWERUP_RADIUS_PHONE: f32 = 7.6;
    pub const LIFE_RADIUS: f32 = 9.0;
    pub const LIFE_RADIUS_PHONE: f32 = 8.6;

    /// Ultimates
    pub const LASER_COOLDOWN_MS: f32 = 30000.0;
    pub const LASER_DURATION_MS: f32 = 6500.0;
    pub const LASER_THICKNESS: f32 = 12.0;
    pub const LASER_LAPS: f32 = 2.0;
    pub const NUKE_COOLDOWN_MS: f32 = 60000.0;
    pub const NUKE_DURATION_MS: f32 = 350.0;
    pub const NUKE_MIN_RADIUS: f32 = 220.0;
    pub const NUKE_VIEW_FRACTION: f32 = 0.45;

    /// Rift and bonus room
    pub const RIFT_RADIUS: f32 = 18.0;
    pub const RIFT_EDGE_MARGIN: f32 = 44.0;
    pub const RIFT_MIN_PLAYER_DIST: f32 = 280.0;
    pub const RIFT_PLACE_TRIES: u32 = 260;
    pub const RIFT_LIFETIME_MS: f32 = 60000.0;
    pub const BONUS_DURATION_MS: f32 = 20000.0;
    pub const BONUS_SPAWN_INTERVAL_MS: f32 = 110.0;
    pub const BONUS_MAX_ENEMIES: usize = 44;
    pub const BONUS_ENTER_INVULN_MS: f32 = 450.0;
    pub const BONUS_EXIT_INVULN_MS: f32 = 900.0;

    /// Camera follow (phone tracks tighter to keep thumbs near the action)
    pub const CAMERA_LERP: f32 = 0.18;
    pub const CAMERA_LERP_PHONE: f32 = 0.22;
    pub const CAMERA_DEADZONE_FRAC: f32 = 0.22;
    pub const CAMERA_DEADZONE_MIN: f32 = 90.0;
    pub const CAMERA_DEADZONE_MAX: f32 = 200.0;
    pub const CAMERA_DEADZONE_FRAC_PHONE: f32 = 0.16;
    pub const CAMERA_DEADZONE_MIN_PHONE: f32 = 64.0;
    pub const CAMERA_DEADZONE_MAX_PHONE: f32 = 160.0;

    /// Viewport and layout scaling
    pub const VIEW_MIN_W: f32 = 320.0;
    pub const VIEW_MIN_H: f32 = 240.0;
    /// At or under this min-dimension the layout switches to phone tuning
    pub const PHONE_MAX_DIM: f32 = 520.0;

    /// Enemies
    pub const ENEMY_RADIUS: f32 = 8.0;
    pub const ENEMY_RADIUS_PHONE: f32 = 7.6;
    pub const MAX_ENEMIES_FULL_SEPARATION: usize = 32;

    /// Map
    pub const MAP_BORDER: f32 = 28.0;
    /// Scroll map spans this many viewports per axis (grow-only on resize)
    pub const MAP_VIEW_SCALE: f32 = 3.0;

    /// Cash persistence is debounced so rapid kills batch into one write
    pub const CASH_FLUSH_MS: f32 = 1000.0;
}

/// Normalize angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}
