//! Game state and core simulation types
//!
//! All state that must survive save/restore (and the bonus-room world swap)
//! lives here. Rendering reads this as an immutable snapshot between ticks.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::blob::BlobShape;
use super::map::{self, MapData};
use crate::consts::*;

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Main menu; no simulation runs
    Menu,
    /// Active gameplay
    Playing,
    /// Game is paused (sim clock frozen)
    Paused,
    /// Run ended
    GameOver,
}

/// Which world the player is currently in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GameMode {
    /// Normal scrolling map
    Scroll,
    /// Bonus room entered through a rift; the outer world is held in the
    /// snapshot and restored verbatim on exit
    Bonus {
        ends_at_ms: f32,
        next_spawn_at_ms: f32,
        snapshot: Box<WorldSnapshot>,
    },
}

impl GameMode {
    pub fn is_bonus(&self) -> bool {
        matches!(self, GameMode::Bonus { .. })
    }
}

/// Yolk core colors, declared in canonical target order.
///
/// Level palettes are subsets of this list sorted by declaration order, so
/// deriving `Ord` here is load-bearing for palette normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum YolkColor {
    Yellow,
    Red,
    Green,
    Blue,
    Black,
    White,
    Purple,
    Brown,
    Pink,
}

impl YolkColor {
    pub const ALL: [YolkColor; 9] = [
        YolkColor::Yellow,
        YolkColor::Red,
        YolkColor::Green,
        YolkColor::Blue,
        YolkColor::Black,
        YolkColor::White,
        YolkColor::Purple,
        YolkColor::Brown,
        YolkColor::Pink,
    ];

    /// Cash awarded for a kill before the trophy multiplier
    pub fn cash_value(&self) -> u64 {
        match self {
            YolkColor::Yellow => 2,
            YolkColor::Red => 3,
            YolkColor::Green => 3,
            YolkColor::Blue => 4,
            YolkColor::Black => 5,
            YolkColor::White => 5,
            YolkColor::Purple => 6,
            YolkColor::Brown => 4,
            YolkColor::Pink => 5,
        }
    }

    /// Packed 0xRRGGBB for renderers and particle tinting
    pub fn rgb(&self) -> u32 {
        match self {
            YolkColor::Yellow => 0xFFD700,
            YolkColor::Red => 0xDC143C,
            YolkColor::Green => 0x32CD32,
            YolkColor::Blue => 0x1E90FF,
            YolkColor::Black => 0x000000,
            YolkColor::White => 0xFFFFFF,
            YolkColor::Purple => 0x9370DB,
            YolkColor::Brown => 0x8B4513,
            YolkColor::Pink => 0xFF69B4,
        }
    }

    /// Display name for the HUD target readout
    pub fn name(&self) -> &'static str {
        match self {
            YolkColor::Yellow => "YELLOW",
            YolkColor::Red => "RED",
            YolkColor::Green => "GREEN",
            YolkColor::Blue => "BLUE",
            YolkColor::Black => "BLACK",
            YolkColor::White => "WHITE",
            YolkColor::Purple => "PURPLE",
            YolkColor::Brown => "BROWN",
            YolkColor::Pink => "PINK",
        }
    }
}

/// Viewport geometry and the layout tuning derived from it.
///
/// `size_scale` keeps entities readable on small screens; every radius in the
/// game is a base value multiplied by it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldView {
    pub w: f32,
    pub h: f32,
    /// Touch-first device (no fine pointer); enables touch auto-dock
    pub touch: bool,
    /// Compact layout tuning for small screens
    pub phone: bool,
    pub size_scale: f32,
}

impl WorldView {
    /// `phone_hint` lets the shell force phone layout from window metrics the
    /// core cannot see (e.g. a small outer window holding a large canvas).
    pub fn new(w: f32, h: f32, touch: bool, phone_hint: bool) -> Self {
        let w = w.max(VIEW_MIN_W);
        let h = h.max(VIEW_MIN_H);
        let min_dim = w.min(h).max(1.0);
        let phone = min_dim <= PHONE_MAX_DIM || phone_hint;
        let size_scale = if phone {
            (480.0 / min_dim).clamp(1.0, 1.20)
        } else {
            (520.0 / min_dim).clamp(1.0, 1.30)
        };
        Self { w, h, touch, phone, size_scale }
    }

    pub fn min_dim(&self) -> f32 {
        self.w.min(self.h).max(1.0)
    }

    pub fn player_radius(&self) -> f32 {
        let base = if self.phone { PLAYER_RADIUS_PHONE } else { PLAYER_RADIUS };
        base * self.size_scale
    }

    pub fn enemy_base_radius(&self) -> f32 {
        let base = if self.phone { ENEMY_RADIUS_PHONE } else { ENEMY_RADIUS };
        base * self.size_scale
    }

    pub fn powerup_radius(&self, kind: PowerUpKind) -> f32 {
        let base = match (kind, self.phone) {
            (PowerUpKind::Life, false) => LIFE_RADIUS,
            (PowerUpKind::Life, true) => LIFE_RADIUS_PHONE,
            (_, false) => POWERUP_RADIUS,
            (_, true) => POWERUP_RADIUS_PHONE,
        };
        base * self.size_scale
    }

    pub fn bullet_radius(&self) -> f32 {
        BULLET_RADIUS * self.size_scale
    }

    pub fn bullet_hit_radius(&self) -> f32 {
        self.bullet_radius() + BULLET_HIT_PAD * self.size_scale
    }

    pub fn bullet_speed(&self) -> f32 {
        BULLET_SPEED * (0.9 + 0.1 * self.size_scale)
    }

    /// Camera follows once the player strays this far from view center
    pub fn camera_deadzone(&self) -> f32 {
        if self.phone {
            (self.min_dim() * CAMERA_DEADZONE_FRAC_PHONE)
                .clamp(CAMERA_DEADZONE_MIN_PHONE, CAMERA_DEADZONE_MAX_PHONE)
        } else {
            (self.min_dim() * CAMERA_DEADZONE_FRAC).clamp(CAMERA_DEADZONE_MIN, CAMERA_DEADZONE_MAX)
        }
    }

    pub fn camera_lerp(&self) -> f32 {
        if self.phone { CAMERA_LERP_PHONE } else { CAMERA_LERP }
    }
}

impl Default for WorldView {
    fn default() -> Self {
        Self::new(800.0, 600.0, false, false)
    }
}

/// Scroll camera; `pos` is the world coordinate of the view's top-left corner
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub pos: Vec2,
}

impl Camera {
    /// Clamp so the view never shows past the map edge
    pub fn clamp_to_map(&mut self, view: &WorldView, map: &MapData) {
        self.pos.x = self.pos.x.clamp(0.0, (map.w - view.w).max(0.0));
        self.pos.y = self.pos.y.clamp(0.0, (map.h - view.h).max(0.0));
    }

    /// Snap so the given point sits at view center (clamped to the map)
    pub fn center_on(&mut self, point: Vec2, view: &WorldView, map: &MapData) {
        self.pos = point - Vec2::new(view.w / 2.0, view.h / 2.0);
        self.clamp_to_map(view, map);
    }
}

/// The player ship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub pos: Vec2,
    pub radius: f32,
    /// Aim direction in radians, wrapped to (-PI, PI]
    pub aim_angle: f32,
    /// Movement fuel in [0, ENERGY_MAX]
    pub energy: f32,
    pub invuln_until_ms: f32,
}

impl Player {
    pub fn new(pos: Vec2, radius: f32) -> Self {
        Self {
            pos,
            radius,
            aim_angle: 0.0,
            energy: ENERGY_MAX,
            invuln_until_ms: 0.0,
        }
    }

    pub fn is_invulnerable(&self, now_ms: f32) -> bool {
        now_ms < self.invuln_until_ms
    }
}

/// A yolk enemy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: u32,
    pub pos: Vec2,
    /// Position at the end of the previous tick (velocity estimate base)
    pub prev_pos: Vec2,
    /// Per-frame displacement estimate for the renderer and squish
    pub vel: Vec2,
    pub radius: f32,
    /// Base speed in px per 60 Hz frame
    pub speed: f32,
    pub color: YolkColor,
    /// Radius multiplier against the layout base; survives view changes
    pub size_factor: f32,
    /// Phase offset for the tangential steering wobble
    pub wobble_phase: f32,
    pub blob: BlobShape,
}

/// A player bullet; direction is a unit vector, speed comes from the view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bullet {
    pub id: u32,
    pub pos: Vec2,
    pub dir: Vec2,
    /// Cosmetic seed for the renderer's flicker
    pub seed: f32,
    /// Re-bounce suppression against the same obstacle
    #[serde(default)]
    pub last_bounce_obstacle: Option<usize>,
    #[serde(default)]
    pub last_bounce_ms: f32,
}

/// Power-up types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerUpKind {
    Life,
    Speed,
    FireRate,
    Piercing,
    Shotgun,
    Bounce,
    Stasis,
}

impl PowerUpKind {
    /// Timed kinds, in HUD display order (`Life` is instant and never listed)
    pub const TIMED: [PowerUpKind; 6] = [
        PowerUpKind::Speed,
        PowerUpKind::FireRate,
        PowerUpKind::Piercing,
        PowerUpKind::Shotgun,
        PowerUpKind::Bounce,
        PowerUpKind::Stasis,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PowerUpKind::Life => "LIFE",
            PowerUpKind::Speed => "SPEED",
            PowerUpKind::FireRate => "FIRE RATE",
            PowerUpKind::Piercing => "PIERCING",
            PowerUpKind::Shotgun => "SHOTGUN",
            PowerUpKind::Bounce => "BOUNCE",
            PowerUpKind::Stasis => "STASIS",
        }
    }
}

/// A dropped pickup waiting on the floor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: u32,
    pub kind: PowerUpKind,
    pub pos: Vec2,
    pub radius: f32,
}

/// Active timed power-up effects; a slot holds the sim-time deadline and 0.0
/// means "never collected". Re-collecting a kind replaces its deadline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveEffects {
    pub speed_until_ms: f32,
    pub fire_rate_until_ms: f32,
    pub piercing_until_ms: f32,
    pub shotgun_until_ms: f32,
    pub bounce_until_ms: f32,
    pub stasis_until_ms: f32,
}

impl ActiveEffects {
    pub fn slot(&self, kind: PowerUpKind) -> Option<f32> {
        match kind {
            PowerUpKind::Life => None,
            PowerUpKind::Speed => Some(self.speed_until_ms),
            PowerUpKind::FireRate => Some(self.fire_rate_until_ms),
            PowerUpKind::Piercing => Some(self.piercing_until_ms),
            PowerUpKind::Shotgun => Some(self.shotgun_until_ms),
            PowerUpKind::Bounce => Some(self.bounce_until_ms),
            PowerUpKind::Stasis => Some(self.stasis_until_ms),
        }
    }

    pub fn slot_mut(&mut self, kind: PowerUpKind) -> Option<&mut f32> {
        match kind {
            PowerUpKind::Life => None,
            PowerUpKind::Speed => Some(&mut self.speed_until_ms),
            PowerUpKind::FireRate => Some(&mut self.fire_rate_until_ms),
            PowerUpKind::Piercing => Some(&mut self.piercing_until_ms),
            PowerUpKind::Shotgun => Some(&mut self.shotgun_until_ms),
            PowerUpKind::Bounce => Some(&mut self.bounce_until_ms),
            PowerUpKind::Stasis => Some(&mut self.stasis_until_ms),
        }
    }

    pub fn is_active(&self, kind: PowerUpKind, now_ms: f32) -> bool {
        self.slot(kind).is_some_and(|until| until > now_ms)
    }

    /// Active timed effects with seconds remaining, in display order
    pub fn remaining(&self, now_ms: f32) -> Vec<(PowerUpKind, f32)> {
        PowerUpKind::TIMED
            .iter()
            .filter_map(|&kind| {
                let until = self.slot(kind)?;
                (until > now_ms).then(|| (kind, (until - now_ms) / 1000.0))
            })
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Fold active effects into the concrete tuning the tick uses.
    /// The bonus room forces shotgun and caps the fire delay.
    pub fn resolve(&self, now_ms: f32, bonus: bool) -> WeaponTuning {
        let mut tuning = WeaponTuning {
            move_speed: PLAYER_SPEED,
            fire_delay_ms: FIRE_DELAY_MS,
            piercing: self.is_active(PowerUpKind::Piercing, now_ms),
            shotgun: self.is_active(PowerUpKind::Shotgun, now_ms),
            bounce: self.is_active(PowerUpKind::Bounce, now_ms),
            enemy_speed_mult: 1.0,
        };
        if self.is_active(PowerUpKind::Speed, now_ms) {
            tuning.move_speed = PLAYER_SPEED_BOOSTED;
        }
        if self.is_active(PowerUpKind::FireRate, now_ms) {
            tuning.fire_delay_ms = FIRE_DELAY_BOOSTED_MS;
        }
        if self.is_active(PowerUpKind::Stasis, now_ms) {
            tuning.enemy_speed_mult = tuning.enemy_speed_mult.min(STASIS_SPEED_MULT);
        }
        if bonus {
            tuning.shotgun = true;
            tuning.fire_delay_ms = tuning.fire_delay_ms.min(FIRE_DELAY_BOOSTED_MS);
        }
        tuning
    }
}

/// Per-tick combat parameters resolved from `ActiveEffects`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponTuning {
    pub move_speed: f32,
    pub fire_delay_ms: f32,
    pub piercing: bool,
    pub shotgun: bool,
    pub bounce: bool,
    pub enemy_speed_mult: f32,
}

/// Energy docking state machine.
///
/// Connecting requires holding still while touching the host obstacle;
/// charging requires staying inside the crystal field circle cached at
/// connect time. Either violation soft-aborts back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DockState {
    Idle,
    Connecting {
        obstacle: usize,
        center: Vec2,
        field_radius: f32,
        ends_at_ms: f32,
    },
    Charging {
        obstacle: usize,
        center: Vec2,
        field_radius: f32,
        started_at_ms: f32,
        start_energy: f32,
        ends_at_ms: f32,
    },
}

impl DockState {
    pub fn is_idle(&self) -> bool {
        matches!(self, DockState::Idle)
    }

    pub fn is_charging(&self) -> bool {
        matches!(self, DockState::Charging { .. })
    }

    /// Host obstacle index while a dock is in progress
    pub fn obstacle(&self) -> Option<usize> {
        match self {
            DockState::Idle => None,
            DockState::Connecting { obstacle, .. } | DockState::Charging { obstacle, .. } => {
                Some(*obstacle)
            }
        }
    }
}

/// A time-limited portal into the bonus room
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rift {
    pub pos: Vec2,
    pub radius: f32,
    pub expires_at_ms: f32,
}

/// The per-level target color sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelColors {
    /// Palette subset for this level, sorted canonically
    pub palette: Vec<YolkColor>,
    /// Index of the color currently vulnerable to damage
    pub next_index: usize,
}

impl LevelColors {
    pub fn target(&self) -> Option<YolkColor> {
        self.palette.get(self.next_index).copied()
    }
}

/// Trickle-spawn bookkeeping for the current level
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelSpawnState {
    /// Enemies still owed per palette color (parallel to `LevelColors::palette`)
    pub pending_by_color: Vec<u32>,
    pub pending_total: u32,
    pub interval_ms: f32,
    pub next_spawn_at_ms: f32,
    /// Level base speed; per-enemy variance multiplies this
    pub base_speed: f32,
}

/// One purchasable ultimate ability slot
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UltimateSlot {
    pub owned: bool,
    pub mk2: bool,
    /// Activation sim-time; cleared when the effect ends (and on run reset)
    pub active_since_ms: Option<f32>,
    /// Last activation sim-time; cooldowns persist across run resets
    pub last_used_ms: Option<f32>,
}

impl UltimateSlot {
    pub fn is_active(&self) -> bool {
        self.active_since_ms.is_some()
    }

    pub fn cooldown_remaining_ms(&self, now_ms: f32, cooldown_ms: f32) -> f32 {
        match self.last_used_ms {
            Some(t) => (cooldown_ms - (now_ms - t)).max(0.0),
            None => 0.0,
        }
    }

    pub fn is_ready(&self, now_ms: f32, cooldown_ms: f32) -> bool {
        self.owned && !self.is_active() && self.cooldown_remaining_ms(now_ms, cooldown_ms) <= 0.0
    }
}

/// Precomputed trophy effects, read in at run reset.
/// The sim never inspects raw trophy ownership.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrophyEffects {
    pub start_lives: u32,
    pub cash_multiplier: f32,
    pub powerup_bonus_ms: f32,
    pub energy_drain_mult: f32,
}

impl Default for TrophyEffects {
    fn default() -> Self {
        Self {
            start_lives: 0,
            cash_multiplier: 1.0,
            powerup_bonus_ms: 0.0,
            energy_drain_mult: 1.0,
        }
    }
}

/// A particle for visual effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Packed 0xRRGGBBAA
    pub color: u32,
    /// 0-1, decreases over time
    pub life: f32,
    pub size: f32,
}

/// Maximum particles
pub const MAX_PARTICLES: usize = 256;

/// Pack an 0xRRGGBB color and 0-1 alpha into 0xRRGGBBAA
pub fn pack_rgba(rgb: u32, alpha: f32) -> u32 {
    (rgb << 8) | (alpha.clamp(0.0, 1.0) * 255.0) as u32
}

/// Fire-and-forget outbound signals drained by the shell each frame.
/// Dropping any of these must not affect simulation correctness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    ShotFired,
    ShotBlocked,
    EnemyKilled { color: YolkColor },
    PlayerHit,
    PowerUpCollected { kind: PowerUpKind },
    DockConnecting,
    DockUnavailable,
    DockAborted,
    DockFieldOnline,
    DockConnectionLost,
    EnergyFull,
    RiftOpened,
    RiftClosed,
    BonusEntered,
    BonusEnded,
    LevelUp { level: u32 },
    CheckpointUnlocked { level: u32 },
    CashChanged { total: u64 },
    RunEnded { time_seconds: f32, level: u32, cash_earned: u64 },
}

/// Everything the bonus room displaces, restored verbatim on exit.
/// Particles are cosmetic and deliberately not captured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub map: MapData,
    pub camera: Camera,
    pub player_pos: Vec2,
    pub enemies: Vec<Enemy>,
    pub bullets: Vec<Bullet>,
    pub powerups: Vec<PowerUp>,
    pub effects: ActiveEffects,
    pub colors: LevelColors,
    pub spawn: LevelSpawnState,
}

/// RNG state wrapper for serialization.
///
/// Each draw site takes a fresh stream so that saving and restoring mid-run
/// replays identically regardless of transient (skipped) state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub stream: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, stream: 0 }
    }

    /// Next deterministic generator; advances the stream counter
    pub fn next(&mut self) -> Pcg32 {
        self.stream = self.stream.wrapping_add(1);
        Pcg32::seed_from_u64(
            self.seed
                .wrapping_add(self.stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        )
    }
}

/// Ability state for the HUD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbilityHud {
    pub owned: bool,
    pub active: bool,
    pub ready: bool,
    pub cooldown_seconds: f32,
}

/// Per-frame HUD values; built fresh each frame, never stored
#[derive(Debug, Clone, PartialEq)]
pub struct HudView {
    pub level: u32,
    pub elapsed_seconds: f32,
    pub lives: u32,
    pub energy_fraction: f32,
    pub cash: u64,
    pub target_color: Option<YolkColor>,
    pub in_bonus: bool,
    pub bonus_seconds_left: f32,
    /// Active timed power-ups with seconds remaining
    pub powerups: Vec<(PowerUpKind, f32)>,
    pub laser: AbilityHud,
    pub nuke: AbilityHud,
}

/// Complete game state (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    /// RNG state
    pub rng: RngState,
    /// Simulation clock in ms; only advances while a tick runs
    pub time_ms: f32,
    /// Tick counter (drives the separation throttle)
    pub tick_count: u64,
    pub phase: GamePhase,
    pub mode: GameMode,
    pub view: WorldView,
    pub map: MapData,
    pub camera: Camera,
    pub player: Player,
    pub lives: u32,
    pub level: u32,
    pub start_level: u32,
    /// Wallet total; the shell persists it on `CashChanged`
    pub cash: u64,
    pub run_start_cash: u64,
    pub run_started_ms: f32,
    pub colors: LevelColors,
    pub spawn: LevelSpawnState,
    /// Active enemies (sorted by id for determinism)
    pub enemies: Vec<Enemy>,
    /// Active bullets (sorted by id for determinism)
    pub bullets: Vec<Bullet>,
    /// Dropped pickups (sorted by id for determinism)
    pub powerups: Vec<PowerUp>,
    pub effects: ActiveEffects,
    pub dock: DockState,
    /// Sim-time since the player became eligible for an auto-dock
    pub dock_idle_since_ms: Option<f32>,
    /// Full-charge celebration deadline for the renderer
    pub full_charge_fx_until_ms: f32,
    pub rift: Option<Rift>,
    /// Level at which the next rift spawns
    pub next_rift_at_level: u32,
    pub laser: UltimateSlot,
    pub nuke: UltimateSlot,
    pub trophies: TrophyEffects,
    pub last_fire_ms: Option<f32>,
    /// Mouse aim point in canvas coordinates plus last-move sim-time
    pub mouse_canvas: Vec2,
    pub last_mouse_move_ms: Option<f32>,
    /// Cash write debounce
    pub cash_dirty: bool,
    pub last_cash_flush_ms: f32,
    /// Visual particles (not gameplay-affecting)
    #[serde(skip)]
    pub particles: Vec<Particle>,
    /// Outbound events since the last drain
    #[serde(skip)]
    pub events: Vec<SimEvent>,
    /// Next entity ID
    next_id: u32,
}

impl GameState {
    /// Create a fresh state in the main menu. The shell wires in wallet,
    /// trophy effects and ultimate ownership before the first run starts.
    pub fn new(seed: u64, view: WorldView) -> Self {
        let map_w = (view.w * MAP_VIEW_SCALE).floor();
        let map_h = (view.h * MAP_VIEW_SCALE).floor();
        let map = map::generate_map(map_w, map_h);
        let player = Player::new(Vec2::new(map_w / 2.0, map_h / 2.0), view.player_radius());
        let mut camera = Camera::default();
        camera.center_on(player.pos, &view, &map);

        Self {
            seed,
            rng: RngState::new(seed),
            time_ms: 0.0,
            tick_count: 0,
            phase: GamePhase::Menu,
            mode: GameMode::Scroll,
            view,
            map,
            camera,
            player,
            lives: 1,
            level: 1,
            start_level: 1,
            cash: 0,
            run_start_cash: 0,
            run_started_ms: 0.0,
            colors: LevelColors::default(),
            spawn: LevelSpawnState::default(),
            enemies: Vec::new(),
            bullets: Vec::new(),
            powerups: Vec::new(),
            effects: ActiveEffects::default(),
            dock: DockState::Idle,
            dock_idle_since_ms: None,
            full_charge_fx_until_ms: 0.0,
            rift: None,
            next_rift_at_level: 0,
            laser: UltimateSlot::default(),
            nuke: UltimateSlot::default(),
            trophies: TrophyEffects::default(),
            last_fire_ms: None,
            mouse_canvas: Vec2::ZERO,
            last_mouse_move_ms: None,
            cash_dirty: false,
            last_cash_flush_ms: 0.0,
            particles: Vec::new(),
            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Ensure entities are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.enemies.sort_by_key(|e| e.id);
        self.bullets.sort_by_key(|b| b.id);
        self.powerups.sort_by_key(|p| p.id);
    }

    /// In the bonus room every color is fair game; otherwise only the
    /// current target color takes damage.
    pub fn is_killable(&self, enemy: &Enemy) -> bool {
        if self.mode.is_bonus() {
            return true;
        }
        self.colors.target() == Some(enemy.color)
    }

    pub fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Drain pending outbound events (shell side, once per frame)
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Append a particle, dropping the oldest at the cap
    pub fn push_particle(&mut self, particle: Particle) {
        if self.particles.len() >= MAX_PARTICLES {
            self.particles.remove(0);
        }
        self.particles.push(particle);
    }

    /// Cosmetic burst of particles around a point.
    ///
    /// Spread comes from hash mixing rather than the gameplay RNG so effects
    /// never perturb the deterministic draw streams.
    pub fn particle_burst(
        &mut self,
        pos: Vec2,
        color: u32,
        count: usize,
        vel_range: f32,
        size_min: f32,
        size_max: f32,
    ) {
        let seed = (self.time_ms * 1000.0) as u32 ^ (self.particles.len() as u32).wrapping_mul(7919);
        for i in 0..count {
            let hash = seed
                .wrapping_mul(2654435761)
                .wrapping_add(i as u32 * 7919);
            let unit = |h: u32| (h % 1000) as f32 / 1000.0;
            let vel = Vec2::new(
                (unit(hash) - 0.5) * 2.0 * vel_range,
                (unit(hash / 1000) - 0.5) * 2.0 * vel_range,
            );
            let size = size_min + unit(hash / 1_000_000) * (size_max - size_min);
            self.push_particle(Particle {
                pos,
                vel,
                color,
                life: 1.0,
                size,
            });
        }
    }

    pub fn elapsed_seconds(&self) -> f32 {
        ((self.time_ms - self.run_started_ms) / 1000.0).max(0.0)
    }

    /// Cash earned since the current run started
    pub fn cash_earned(&self) -> u64 {
        self.cash.saturating_sub(self.run_start_cash)
    }

    /// Build the per-frame HUD snapshot
    pub fn hud(&self) -> HudView {
        let now = self.time_ms;
        let bonus_seconds_left = match &self.mode {
            GameMode::Bonus { ends_at_ms, .. } => ((ends_at_ms - now) / 1000.0).max(0.0),
            GameMode::Scroll => 0.0,
        };
        let ability = |slot: &UltimateSlot, cooldown_ms: f32| AbilityHud {
            owned: slot.owned,
            active: slot.is_active(),
            ready: slot.is_ready(now, cooldown_ms),
            cooldown_seconds: slot.cooldown_remaining_ms(now, cooldown_ms) / 1000.0,
        };
        HudView {
            level: self.level,
            elapsed_seconds: self.elapsed_seconds(),
            lives: self.lives,
            energy_fraction: (self.player.energy / ENERGY_MAX).clamp(0.0, 1.0),
            cash: self.cash,
            target_color: self.colors.target(),
            in_bonus: self.mode.is_bonus(),
            bonus_seconds_left,
            powerups: self.effects.remaining(now),
            laser: ability(&self.laser, LASER_COOLDOWN_MS),
            nuke: ability(&self.nuke, NUKE_COOLDOWN_MS),
        }
    }
}
