//! Per-tick simulation update
//!
//! One call to [`tick`] advances the whole world by a frame-rate-normalized
//! step. The order of sub-updates is load-bearing: docking reads movement
//! intent before the speed multiplier applies, bullets move before enemies,
//! and player contact resolves before bullet contact so a lethal hit ends the
//! tick without a posthumous kill.

use glam::Vec2;
use rand::Rng;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_3, FRAC_PI_6, TAU};

use super::collision::{
    circle_fits, circle_intersects_rect, distance_point_to_segment, ray_to_bounds,
    reflect_axis_aligned, resolve_circle_obstacles, resolve_circle_rect,
};
use super::energy;
use super::map;
use super::rift;
use super::spawn;
use super::state::{
    Bullet, DockState, GameMode, GamePhase, GameState, PowerUpKind, SimEvent, WeaponTuning,
    WorldView, pack_rgba,
};
use crate::consts::*;
use crate::normalize_angle;

/// Alternate steering headings, tried in order when the desired one is blocked
const STEER_OFFSETS: [f32; 7] = [
    0.0,
    FRAC_PI_6,
    -FRAC_PI_6,
    FRAC_PI_3,
    -FRAC_PI_3,
    FRAC_PI_2,
    -FRAC_PI_2,
];

/// Separation spacing in combined radii; mixed-killability pairs repel harder
const SEPARATION_FACTOR: f32 = 2.0;
const SEPARATION_FACTOR_MIXED: f32 = 2.35;
/// Push share taken by the killable half of a mixed pair
const KILLABLE_PUSH_SHARE: f32 = 0.25;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickInput {
    /// Movement stick in [-1, 1]; overrides the key flags while active
    pub move_x: f32,
    pub move_y: f32,
    pub move_stick_active: bool,
    /// Aim stick in [-1, 1]; beats every other aim source past its deadzone
    pub aim_x: f32,
    pub aim_y: f32,
    pub aim_stick_active: bool,
    /// Key movement flags (arrows and WASD merged by the shell)
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Keyboard aim nudge keys
    pub aim_left: bool,
    pub aim_right: bool,
    /// Mouse position in canvas coordinates when it moved since the last tick
    pub mouse_canvas: Option<Vec2>,
    /// Whether mouse aim participates in the fallback chain at all
    pub mouse_aim_enabled: bool,
    /// Edge: explicit dock request
    pub dock: bool,
    /// Edge: pause toggle
    pub pause: bool,
    /// Edge: ultimate activations
    pub laser: bool,
    pub nuke: bool,
}

/// Advance the game state by one variable timestep of `dt_ms` wall
/// milliseconds. The step is normalized to 60 Hz frames and clamped, and the
/// sim clock only moves inside this function, so pausing freezes every timer.
pub fn tick(state: &mut GameState, input: &TickInput, dt_ms: f32) {
    // Handle pause toggle
    if input.pause {
        match state.phase {
            GamePhase::Playing => {
                state.phase = GamePhase::Paused;
                return;
            }
            GamePhase::Paused => {
                state.phase = GamePhase::Playing;
            }
            _ => {}
        }
    }

    // Don't tick in menus, while paused, or after a run ended
    match state.phase {
        GamePhase::Menu | GamePhase::Paused | GamePhase::GameOver => return,
        GamePhase::Playing => {}
    }

    let dt_frames = (dt_ms / BASE_FRAME_MS).clamp(DT_FRAMES_MIN, DT_FRAMES_MAX);
    let dt_seconds = dt_frames / 60.0;
    state.time_ms += dt_frames * BASE_FRAME_MS;
    state.tick_count += 1;
    let now = state.time_ms;

    // Timed world transitions: bonus room end, rift expiry
    rift::update_expiry(state);

    // Ultimate activation edges land before the world moves
    if input.laser {
        try_activate_laser(state);
    }
    if input.nuke {
        try_activate_nuke(state);
    }

    let bonus = state.mode.is_bonus();
    let tuning = state.effects.resolve(now, bonus);

    // Movement intent; the stick replaces the keys entirely while active
    let speed = tuning.move_speed;
    let (mut move_x, mut move_y) = if input.move_stick_active {
        (
            input.move_x * speed * dt_frames,
            input.move_y * speed * dt_frames,
        )
    } else {
        let mut mx = 0.0;
        let mut my = 0.0;
        if input.up {
            my = -speed * dt_frames;
        }
        if input.down {
            my = speed * dt_frames;
        }
        if input.left {
            mx = -speed * dt_frames;
        }
        if input.right {
            mx = speed * dt_frames;
        }
        (mx, my)
    };
    // Intent is judged on the raw step so an empty battery still counts as
    // moving for dock purposes
    let wants_move = Vec2::new(move_x, move_y).length() > DOCK_MOVE_EPS;

    energy::update_dock(state, wants_move, input.dock);

    let speed_mult = energy::speed_multiplier(state);
    move_x *= speed_mult;
    move_y *= speed_mult;

    energy::apply_drain(state, wants_move, dt_seconds);

    update_aim(state, input, dt_frames);

    // Player movement with axis-separated sliding along obstacles
    {
        let prev = state.player.pos;
        let r = state.player.radius;
        let next = Vec2::new(
            (prev.x + move_x).clamp(r, state.map.w - r),
            (prev.y + move_y).clamp(r, state.map.h - r),
        );
        let res = resolve_circle_obstacles(next, r, &state.map);
        state.player.pos = if res.hit {
            // Blocked diagonals degrade to whichever single axis goes farther
            let res_x = resolve_circle_obstacles(Vec2::new(prev.x + move_x, prev.y), r, &state.map);
            let res_y = resolve_circle_obstacles(Vec2::new(prev.x, prev.y + move_y), r, &state.map);
            if res_x.pos.distance_squared(prev) > res_y.pos.distance_squared(prev) {
                res_x.pos
            } else {
                res_y.pos
            }
        } else {
            res.pos
        };
    }

    rift::try_enter(state);

    // Auto-fire
    let fire_due = match state.last_fire_ms {
        Some(t) => now - t > tuning.fire_delay_ms,
        None => true,
    };
    if fire_due {
        fire_bullets(state, &tuning);
        state.last_fire_ms = Some(now);
    }

    // Debounced wallet flush so kill streaks batch into one persistence write
    if state.cash_dirty && now - state.last_cash_flush_ms > CASH_FLUSH_MS {
        state.emit(SimEvent::CashChanged { total: state.cash });
        state.cash_dirty = false;
        state.last_cash_flush_ms = now;
    }

    update_camera(state);

    // Spawning: trickle in the outer world, fixed cadence in the bonus room
    let bonus_spawn_due = match &state.mode {
        GameMode::Bonus { next_spawn_at_ms, .. } => Some(*next_spawn_at_ms),
        GameMode::Scroll => None,
    };
    match bonus_spawn_due {
        None => spawn::update_trickle(state),
        Some(due) => {
            if now >= due && state.enemies.len() < BONUS_MAX_ENEMIES {
                spawn::spawn_bonus_enemy(state);
                if let GameMode::Bonus { next_spawn_at_ms, .. } = &mut state.mode {
                    *next_spawn_at_ms = now + BONUS_SPAWN_INTERVAL_MS;
                }
            }
        }
    }

    update_bullets(state, &tuning, dt_frames);
    update_enemies(state, &tuning, dt_frames);

    // Full O(n^2) separation every other tick once the field gets crowded
    if state.enemies.len() <= MAX_ENEMIES_FULL_SEPARATION || state.tick_count % 2 == 0 {
        separate_enemies(state);
    }

    update_ultimates(state);

    if !update_player_collisions(state) {
        state.normalize_order();
        return;
    }

    update_bullet_hits(state, &tuning);

    // Level advance once the board and the spawn queue are both empty
    if !state.mode.is_bonus() && state.enemies.is_empty() && state.spawn.pending_total == 0 {
        state.level += 1;
        if state.level % 10 == 0 {
            state.emit(SimEvent::CheckpointUnlocked { level: state.level });
        }
        state.emit(SimEvent::LevelUp { level: state.level });
        spawn::plan_level(state);
        if state.rift.is_none() && state.level >= state.next_rift_at_level {
            rift::spawn_rift(state);
            rift::schedule_next_rift(state);
        }
    }

    update_pickup_collection(state);
    update_particles(state, dt_frames);

    state.normalize_order();
}

/// Start (or restart) a run at `start_level`. Cash, trophy effects, ultimate
/// ownership and ability cooldowns all carry over between runs.
pub fn reset_run(state: &mut GameState, start_level: u32) {
    let now = state.time_ms;

    // Always come back to the outer world; a stale snapshot is discarded
    state.mode = GameMode::Scroll;
    state.rift = None;

    state.bullets.clear();
    state.particles.clear();
    state.powerups.clear();
    state.effects.clear();

    state.level = start_level.max(1);
    state.start_level = state.level;
    rift::schedule_next_rift(state);

    state.lives = (1 + state.trophies.start_lives).clamp(1, MAX_LIVES);
    state.player.energy = ENERGY_MAX;
    state.dock = DockState::Idle;
    state.dock_idle_since_ms = None;
    state.player.invuln_until_ms = 0.0;

    ensure_map_size(state);
    state.player.pos = Vec2::new(state.map.w / 2.0, state.map.h / 2.0);
    state
        .camera
        .center_on(state.player.pos, &state.view, &state.map);

    state.run_started_ms = now;
    state.run_start_cash = state.cash;

    // Active effects stop; `last_used_ms` stays so cooldowns survive the reset
    state.laser.active_since_ms = None;
    state.nuke.active_since_ms = None;

    spawn::plan_level(state);
    state.emit(SimEvent::LevelUp { level: state.level });
    state.phase = GamePhase::Playing;
    log::info!("Run started at level {} with {} lives", state.level, state.lives);
}

/// Adopt a new viewport: rescale every radius, grow the map if the view got
/// bigger, and pull everything back inside the (possibly regenerated) bounds.
pub fn apply_view(state: &mut GameState, view: WorldView) {
    state.view = view;

    state.player.radius = view.player_radius();
    let enemy_base = view.enemy_base_radius();
    for enemy in &mut state.enemies {
        enemy.radius = enemy_base * enemy.size_factor;
    }
    for powerup in &mut state.powerups {
        powerup.radius = view.powerup_radius(powerup.kind);
    }

    ensure_map_size(state);

    let r = state.player.radius;
    state.player.pos.x = state.player.pos.x.clamp(r, state.map.w - r);
    state.player.pos.y = state.player.pos.y.clamp(r, state.map.h - r);
    let (map_w, map_h) = (state.map.w, state.map.h);
    for enemy in &mut state.enemies {
        enemy.pos.x = enemy.pos.x.clamp(enemy.radius, map_w - enemy.radius);
        enemy.pos.y = enemy.pos.y.clamp(enemy.radius, map_h - enemy.radius);
    }

    state.camera.clamp_to_map(&state.view, &state.map);
}

/// Grow-only map sizing; shrinking the window never shrinks the world.
/// The bonus room keeps its fixed dimensions for its whole stay.
fn ensure_map_size(state: &mut GameState) {
    if state.mode.is_bonus() {
        return;
    }
    let want_w = (state.view.w * MAP_VIEW_SCALE).floor().max(state.map.w);
    let want_h = (state.view.h * MAP_VIEW_SCALE).floor().max(state.map.h);
    if want_w != state.map.w || want_h != state.map.h {
        state.map = map::generate_map(want_w, want_h);
        // Obstacle indices from the old layout are meaningless now
        state.dock = DockState::Idle;
        state.dock_idle_since_ms = None;
    }
}

/// Aim priority: stick, then a recently-moved mouse, then the nudge keys.
fn update_aim(state: &mut GameState, input: &TickInput, dt_frames: f32) {
    let now = state.time_ms;

    if let Some(canvas) = input.mouse_canvas {
        state.mouse_canvas = canvas;
        state.last_mouse_move_ms = Some(now);
    }

    let stick_mag = Vec2::new(input.aim_x, input.aim_y).length();
    if input.aim_stick_active && stick_mag > 0.2 {
        state.player.aim_angle = input.aim_y.atan2(input.aim_x);
    } else if input.mouse_aim_enabled
        && state
            .last_mouse_move_ms
            .is_some_and(|t| now - t <= MOUSE_AIM_HOLD_MS)
    {
        let world = state.camera.pos + state.mouse_canvas;
        let delta = world - state.player.pos;
        state.player.aim_angle = delta.y.atan2(delta.x);
    } else {
        if input.aim_left {
            state.player.aim_angle -= AIM_KEY_STEP * dt_frames;
        }
        if input.aim_right {
            state.player.aim_angle += AIM_KEY_STEP * dt_frames;
        }
    }
    state.player.aim_angle = normalize_angle(state.player.aim_angle);
}

/// Fire one volley from the current aim angle
fn fire_bullets(state: &mut GameState, tuning: &WeaponTuning) {
    let muzzle_dist = state.player.radius + state.view.bullet_radius() + 6.0;
    let aim = state.player.aim_angle;
    let origin = state.player.pos;
    let muzzle = origin + Vec2::new(aim.cos(), aim.sin()) * muzzle_dist;

    if tuning.shotgun {
        let mut rng = state.rng.next();
        for _ in 0..5 {
            let spread = (rng.random::<f32>() - 0.5) * 0.5;
            let a = aim + spread;
            let dir = Vec2::new(a.cos(), a.sin());
            let seed = rng.random::<f32>() * TAU;
            push_bullet(state, origin + dir * muzzle_dist, dir, seed);
        }
        state.particle_burst(muzzle, pack_rgba(0x000000, 0.6), 4, 0.75, 3.0, 5.0);
        state.particle_burst(muzzle, pack_rgba(0x000000, 0.4), 8, 1.0, 6.0, 16.0);
    } else {
        let dir = Vec2::new(aim.cos(), aim.sin());
        let seed = state.rng.next().random::<f32>() * TAU;
        push_bullet(state, muzzle, dir, seed);
        state.particle_burst(muzzle, pack_rgba(0x000000, 0.6), 4, 0.75, 3.0, 5.0);
    }

    state.emit(SimEvent::ShotFired);
}

/// Append a bullet, dropping the oldest one at the cap so new shots always
/// show up
fn push_bullet(state: &mut GameState, pos: Vec2, dir: Vec2, seed: f32) {
    if state.bullets.len() >= MAX_BULLETS {
        state.bullets.remove(0);
    }
    let id = state.next_entity_id();
    state.bullets.push(Bullet {
        id,
        pos,
        dir,
        seed,
        last_bounce_obstacle: None,
        last_bounce_ms: 0.0,
    });
}

/// Deadzone camera follow: the view only moves once the player leaves a
/// circle around its center, and eases toward the overflow point.
fn update_camera(state: &mut GameState) {
    let view_center = Vec2::new(state.view.w / 2.0, state.view.h / 2.0);
    let on_screen = state.player.pos - state.camera.pos;
    let delta = on_screen - view_center;
    let dist = delta.length();

    let mut target = state.camera.pos;
    let deadzone = state.view.camera_deadzone();
    if dist > deadzone && dist > 1e-6 {
        target += delta / dist * (dist - deadzone);
    }
    target.x = target.x.clamp(0.0, (state.map.w - state.view.w).max(0.0));
    target.y = target.y.clamp(0.0, (state.map.h - state.view.h).max(0.0));

    let lerp = state.view.camera_lerp();
    state.camera.pos += (target - state.camera.pos) * lerp;
    state.camera.clamp_to_map(&state.view, &state.map);
}

/// Move bullets in substeps, reflecting off obstacles when bounce is active
/// and culling at the map edge otherwise
fn update_bullets(state: &mut GameState, tuning: &WeaponTuning, dt_frames: f32) {
    let now = state.time_ms;

    if state.bullets.len() > MAX_BULLETS {
        let excess = state.bullets.len() - MAX_BULLETS;
        state.bullets.drain(0..excess);
    }

    let bullet_radius = state.view.bullet_radius();
    let step = state.view.bullet_speed() * dt_frames;
    // Substeps keep fast bullets from tunneling through thin obstacles
    let sub_steps = ((step / (bullet_radius * 1.25)).ceil() as usize).clamp(1, 4);
    let sub_step = step / sub_steps as f32;

    let mut i = state.bullets.len();
    while i > 0 {
        i -= 1;
        let mut bullet = state.bullets[i].clone();
        let mut removed = false;

        for _ in 0..sub_steps {
            let before = bullet.pos;
            bullet.pos += bullet.dir * sub_step;

            let hit = state
                .map
                .obstacles
                .iter()
                .position(|o| circle_intersects_rect(bullet.pos, bullet_radius, &o.rect));
            let Some(hit_index) = hit else {
                continue;
            };
            let hit_rect = state.map.obstacles[hit_index].rect;

            if !tuning.bounce {
                spawn_bullet_vanish(state, bullet.pos);
                state.bullets.remove(i);
                removed = true;
                break;
            }

            // Re-touching the same obstacle right after a bounce: push
            // through without reflecting again
            if bullet.last_bounce_obstacle == Some(hit_index)
                && now - bullet.last_bounce_ms < BULLET_REBOUNCE_MS
            {
                let pushed = resolve_circle_rect(bullet.pos, bullet_radius, &hit_rect);
                if pushed.hit {
                    bullet.pos = pushed.pos;
                }
                bullet.pos += bullet.dir * 0.25;
                continue;
            }

            // Surface normal from the entry side, minimal penetration as the
            // fallback when the step started inside the expanded rect
            let mut normal = Vec2::ZERO;
            let (rx1, ry1) = (hit_rect.x, hit_rect.y);
            let (rx2, ry2) = (hit_rect.x + hit_rect.w, hit_rect.y + hit_rect.h);
            if !circle_intersects_rect(before, bullet_radius, &hit_rect) {
                if before.x < rx1 {
                    normal.x = -1.0;
                } else if before.x > rx2 {
                    normal.x = 1.0;
                }
                if before.y < ry1 {
                    normal.y = -1.0;
                } else if before.y > ry2 {
                    normal.y = 1.0;
                }
            }
            if normal == Vec2::ZERO {
                let left = (bullet.pos.x - rx1).abs();
                let right = (rx2 - bullet.pos.x).abs();
                let top = (bullet.pos.y - ry1).abs();
                let bottom = (ry2 - bullet.pos.y).abs();
                let min_pen = left.min(right).min(top).min(bottom);
                if min_pen == left {
                    normal.x = -1.0;
                } else if min_pen == right {
                    normal.x = 1.0;
                } else if min_pen == top {
                    normal.y = -1.0;
                } else {
                    normal.y = 1.0;
                }
            }

            bullet.dir = reflect_axis_aligned(bullet.dir, normal);

            let pushed = resolve_circle_rect(bullet.pos, bullet_radius, &hit_rect);
            bullet.pos = if pushed.hit { pushed.pos } else { before };
            bullet.pos += normal * 0.6 + bullet.dir * 0.35;
            let settled = resolve_circle_obstacles(bullet.pos, bullet_radius, &state.map);
            if settled.hit {
                bullet.pos = settled.pos;
            }

            bullet.last_bounce_obstacle = Some(hit_index);
            bullet.last_bounce_ms = now;
            state.particle_burst(bullet.pos, pack_rgba(0x1E90FF, 0.5), 8, 1.0, 5.0, 12.0);
        }

        if removed {
            continue;
        }

        // Map bounds: bouncing bullets reflect, plain ones vanish
        if tuning.bounce {
            let mut bounced = false;
            if bullet.pos.x <= 0.0 || bullet.pos.x >= state.map.w {
                bullet.dir.x = -bullet.dir.x;
                bullet.pos.x = bullet.pos.x.clamp(0.0, state.map.w);
                bounced = true;
            }
            if bullet.pos.y <= 0.0 || bullet.pos.y >= state.map.h {
                bullet.dir.y = -bullet.dir.y;
                bullet.pos.y = bullet.pos.y.clamp(0.0, state.map.h);
                bounced = true;
            }
            if bounced {
                state.particle_burst(bullet.pos, pack_rgba(0x1E90FF, 0.5), 8, 1.0, 5.0, 12.0);
            }
            state.bullets[i] = bullet;
        } else if bullet.pos.x < 0.0
            || bullet.pos.x > state.map.w
            || bullet.pos.y < 0.0
            || bullet.pos.y > state.map.h
        {
            spawn_bullet_vanish(state, bullet.pos);
            state.bullets.remove(i);
        } else {
            state.bullets[i] = bullet;
        }
    }
}

fn spawn_bullet_vanish(state: &mut GameState, pos: Vec2) {
    state.particle_burst(pos, pack_rgba(0xFFFFFF, 0.22), 8, 1.0, 4.0, 10.0);
    state.particle_burst(pos, pack_rgba(0x00FFFF, 0.12), 8, 1.0, 6.0, 14.0);
}

/// Steer every enemy toward the player with a tangential wobble, trying a fan
/// of alternate headings when the direct one is blocked by an obstacle
fn update_enemies(state: &mut GameState, tuning: &WeaponTuning, dt_frames: f32) {
    let now = state.time_ms;
    let killable: Vec<bool> = state
        .enemies
        .iter()
        .map(|e| state.is_killable(e))
        .collect();
    let player_pos = state.player.pos;
    let (map_w, map_h) = (state.map.w, state.map.h);
    let map = &state.map;

    for (index, enemy) in state.enemies.iter_mut().enumerate() {
        let base_angle = (player_pos.y - enemy.pos.y).atan2(player_pos.x - enemy.pos.x);
        // Wobble is a fixed tangential offset, not a velocity, so it must not
        // scale with the timestep
        let wobble = (now / 300.0 + enemy.wobble_phase).sin() * 0.8;
        let chase_mult = if killable[index] { 1.18 } else { 1.0 };
        let speed = enemy.speed * dt_frames * tuning.enemy_speed_mult * chase_mult;
        let desired = Vec2::new(
            base_angle.cos() * speed + (base_angle + FRAC_PI_2).cos() * wobble,
            base_angle.sin() * speed + (base_angle + FRAC_PI_2).sin() * wobble,
        );

        let heading = desired.y.atan2(desired.x);
        let mag = desired.length();
        let mut moved = false;
        for offset in STEER_OFFSETS {
            let a = heading + offset;
            let next = Vec2::new(
                (enemy.pos.x + a.cos() * mag).clamp(enemy.radius, map_w - enemy.radius),
                (enemy.pos.y + a.sin() * mag).clamp(enemy.radius, map_h - enemy.radius),
            );
            if circle_fits(next, enemy.radius, map) {
                enemy.pos = next;
                moved = true;
                break;
            }
        }
        if !moved {
            enemy.pos = resolve_circle_obstacles(enemy.pos, enemy.radius, map).pos;
        }

        enemy.vel = (enemy.pos - enemy.prev_pos) / dt_frames;
        enemy.prev_pos = enemy.pos;
        enemy.blob.update(enemy.radius, enemy.vel, now, dt_frames);
    }
}

/// Pairwise push-apart so enemies read as distinct blobs. Pairs that differ
/// in killability repel harder and the killable one yields less, keeping the
/// current target reachable inside a crowd.
fn separate_enemies(state: &mut GameState) {
    let killable: Vec<bool> = state
        .enemies
        .iter()
        .map(|e| state.is_killable(e))
        .collect();

    let count = state.enemies.len();
    for i in 0..count {
        for j in (i + 1)..count {
            let (head, tail) = state.enemies.split_at_mut(j);
            let first = &mut head[i];
            let second = &mut tail[0];

            let factor = if killable[i] != killable[j] {
                SEPARATION_FACTOR_MIXED
            } else {
                SEPARATION_FACTOR
            };
            let desired = factor * (first.radius + second.radius);
            let delta = second.pos - first.pos;
            let dist_sq = delta.length_squared();
            if dist_sq >= desired * desired {
                continue;
            }

            let mut dist = dist_sq.sqrt();
            if dist == 0.0 {
                dist = 0.001;
            }
            let unit = delta / dist;
            let push = desired - dist;
            let first_share = if killable[i] && !killable[j] {
                KILLABLE_PUSH_SHARE
            } else if killable[j] && !killable[i] {
                1.0 - KILLABLE_PUSH_SHARE
            } else {
                0.5
            };
            first.pos -= unit * push * first_share;
            second.pos += unit * push * (1.0 - first_share);
        }
    }
}

fn try_activate_laser(state: &mut GameState) {
    let now = state.time_ms;
    if state.phase != GamePhase::Playing || !state.laser.is_ready(now, LASER_COOLDOWN_MS) {
        return;
    }
    state.laser.active_since_ms = Some(now);
    state.laser.last_used_ms = Some(now);
    state.particle_burst(state.player.pos, pack_rgba(0x00FFFF, 0.45), 8, 1.0, 10.0, 24.0);
}

fn try_activate_nuke(state: &mut GameState) {
    let now = state.time_ms;
    if state.phase != GamePhase::Playing || !state.nuke.is_ready(now, NUKE_COOLDOWN_MS) {
        return;
    }
    state.nuke.active_since_ms = Some(now);
    state.nuke.last_used_ms = Some(now);

    let mk2 = state.nuke.mk2;
    let base_radius =
        (state.view.min_dim() * NUKE_VIEW_FRACTION).max(NUKE_MIN_RADIUS) * state.view.size_scale;
    let radius_sq = if mk2 {
        f32::INFINITY
    } else {
        base_radius * base_radius
    };

    // The blast ignores the color sequence entirely
    let origin = state.player.pos;
    let mut rng = state.rng.next();
    let mut i = state.enemies.len();
    while i > 0 {
        i -= 1;
        if state.enemies[i].pos.distance_squared(origin) > radius_sq {
            continue;
        }
        let enemy = state.enemies.remove(i);
        state.emit(SimEvent::EnemyKilled { color: enemy.color });
        let payout = (enemy.color.cash_value() as f32 * state.trophies.cash_multiplier).round();
        state.cash += (payout as u64).max(1);
        state.cash_dirty = true;
        if rng.random::<f32>() < 0.45 {
            state.particle_burst(enemy.pos, pack_rgba(enemy.color.rgb(), 1.0), 18, 1.5, 10.0, 14.0);
        }
    }
    // The sweep can empty the current target color outright
    spawn::advance_target_if_cleared(state);

    if mk2 {
        state.particle_burst(origin, pack_rgba(0xFFFFFF, 0.78), 8, 1.0, 34.0, 70.0);
    } else {
        state.particle_burst(origin, pack_rgba(0xFFFFFF, 0.78), 8, 1.0, 22.0, 46.0);
        state.particle_burst(
            origin,
            pack_rgba(0x00FFFF, 0.20),
            8,
            1.0,
            base_radius * 0.18,
            base_radius * 0.34,
        );
    }
}

/// Run active ultimates: the laser sweeps a rotating beam that kills only
/// killable enemies, the nuke just times out its flash
fn update_ultimates(state: &mut GameState) {
    let now = state.time_ms;

    if let Some(started) = state.laser.active_since_ms {
        let elapsed = now - started;
        if elapsed >= LASER_DURATION_MS {
            state.laser.active_since_ms = None;
        } else {
            let omega = LASER_LAPS * TAU / LASER_DURATION_MS;
            let angle = elapsed * omega;
            let dir = Vec2::new(angle.cos(), angle.sin());
            let origin = state.player.pos;
            let end = ray_to_bounds(origin, dir, state.map.w, state.map.h);
            let mirror_end = state
                .laser
                .mk2
                .then(|| ray_to_bounds(origin, -dir, state.map.w, state.map.h));
            let hit_pad = LASER_THICKNESS * 0.6;

            let mut i = state.enemies.len();
            while i > 0 {
                i -= 1;
                if !state.is_killable(&state.enemies[i]) {
                    continue;
                }
                let enemy_pos = state.enemies[i].pos;
                let reach = state.enemies[i].radius + hit_pad;
                let d_main = distance_point_to_segment(enemy_pos, origin, end);
                let d_mirror = mirror_end
                    .map_or(f32::INFINITY, |e| distance_point_to_segment(enemy_pos, origin, e));
                if d_main.min(d_mirror) <= reach {
                    spawn::kill_enemy(state, i, enemy_pos);
                }
            }
        }
    }

    if let Some(started) = state.nuke.active_since_ms {
        if now - started >= NUKE_DURATION_MS {
            state.nuke.active_since_ms = None;
        }
    }
}

/// Player-enemy contact: each hit costs a life, grants a mercy window, and
/// knocks the player clear. Returns false once the run has ended.
fn update_player_collisions(state: &mut GameState) -> bool {
    let now = state.time_ms;

    for i in 0..state.enemies.len() {
        let (enemy_pos, enemy_radius) = {
            let enemy = &state.enemies[i];
            (enemy.pos, enemy.radius)
        };
        let reach = state.player.radius + enemy_radius;
        if state.player.pos.distance_squared(enemy_pos) >= reach * reach {
            continue;
        }
        if state.player.is_invulnerable(now) {
            continue;
        }

        state.lives = state.lives.saturating_sub(1);
        state.player.invuln_until_ms = now + PLAYER_INVULN_MS;
        state.particle_burst(state.player.pos, pack_rgba(0xFFFFFF, 0.7), 8, 1.0, 14.0, 28.0);
        state.emit(SimEvent::PlayerHit);

        if state.lives == 0 {
            end_run(state);
            return false;
        }

        // Shove clear so the next tick does not instantly re-overlap
        let mut delta = state.player.pos - enemy_pos;
        let mut dist = delta.length();
        if dist < 0.001 {
            let angle = now * 0.0037;
            delta = Vec2::new(angle.cos(), angle.sin());
            dist = 1.0;
        }
        let dir = delta / dist;
        let push = state.player.radius + enemy_radius + KNOCKBACK_PAD;
        let r = state.player.radius;
        let next = Vec2::new(
            (state.player.pos.x + dir.x * push).clamp(r, state.map.w - r),
            (state.player.pos.y + dir.y * push).clamp(r, state.map.h - r),
        );
        state.player.pos = resolve_circle_obstacles(next, r, &state.map).pos;

        // Getting hit also costs stored energy and any dock in progress
        state.player.energy = ENERGY_AFTER_LIFE_LOSS;
        state.dock = DockState::Idle;
        state.dock_idle_since_ms = None;
    }

    true
}

fn end_run(state: &mut GameState) {
    state.phase = GamePhase::GameOver;
    if state.cash_dirty {
        state.emit(SimEvent::CashChanged { total: state.cash });
        state.cash_dirty = false;
    }
    log::info!(
        "Run over: level {}, {:.0}s survived, {} earned",
        state.level,
        state.elapsed_seconds(),
        state.cash_earned()
    );
    state.emit(SimEvent::RunEnded {
        time_seconds: state.elapsed_seconds(),
        level: state.level,
        cash_earned: state.cash_earned(),
    });
}

/// Bullet-enemy contact: killable enemies die, blocked ones flash, and the
/// bullet is spent unless piercing is active
fn update_bullet_hits(state: &mut GameState, tuning: &WeaponTuning) {
    let hit_radius = state.view.bullet_hit_radius();

    let mut i = state.bullets.len();
    while i > 0 {
        i -= 1;
        let bullet_pos = state.bullets[i].pos;

        let mut j = state.enemies.len();
        while j > 0 {
            j -= 1;
            let enemy_pos = state.enemies[j].pos;
            let reach = hit_radius + state.enemies[j].radius;
            if bullet_pos.distance_squared(enemy_pos) >= reach * reach {
                continue;
            }

            if state.is_killable(&state.enemies[j]) {
                spawn::kill_enemy(state, j, bullet_pos);
            } else {
                // Out-of-order hit bounces off harmlessly
                state.emit(SimEvent::ShotBlocked);
                state.particle_burst(bullet_pos, pack_rgba(0x000000, 0.35), 8, 1.0, 4.0, 10.0);
            }

            if !tuning.piercing {
                state.bullets.remove(i);
            }
            break;
        }
    }
}

/// Walk-over pickup collection
fn update_pickup_collection(state: &mut GameState) {
    let mut i = state.powerups.len();
    while i > 0 {
        i -= 1;
        let reach = state.player.radius + state.powerups[i].radius;
        if state.player.pos.distance_squared(state.powerups[i].pos) >= reach * reach {
            continue;
        }
        let kind = state.powerups[i].kind;
        state.powerups.remove(i);
        collect_powerup(state, kind);
    }
}

fn collect_powerup(state: &mut GameState, kind: PowerUpKind) {
    let now = state.time_ms;
    state.emit(SimEvent::PowerUpCollected { kind });

    if kind == PowerUpKind::Life {
        if state.lives < MAX_LIVES {
            state.lives += 1;
        }
        state.particle_burst(state.player.pos, pack_rgba(0xFF0050, 0.7), 8, 1.0, 10.0, 26.0);
        return;
    }

    // Re-collecting replaces the deadline rather than stacking it
    let duration = POWERUP_DURATION_MS + state.trophies.powerup_bonus_ms;
    if let Some(slot) = state.effects.slot_mut(kind) {
        *slot = now + duration;
    }
}

fn update_particles(state: &mut GameState, dt_frames: f32) {
    for particle in &mut state.particles {
        particle.pos += particle.vel * dt_frames;
        particle.life -= 0.04 * dt_frames;
    }
    state.particles.retain(|p| p.life > 0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::BlobShape;
    use crate::sim::collision::Rect;
    use crate::sim::map::{MapData, Obstacle, ObstacleKind};
    use crate::sim::state::{Enemy, LevelColors, PowerUp, YolkColor};
    use proptest::prelude::*;

    const STEP_MS: f32 = 1000.0 / 60.0;

    /// Fresh playing state over an obstacle-free map so movement is exact
    fn open_field_state(seed: u64) -> GameState {
        let mut state = GameState::new(seed, WorldView::default());
        state.map = MapData {
            w: state.map.w,
            h: state.map.h,
            bonus: false,
            obstacles: Vec::new(),
        };
        state.phase = GamePhase::Playing;
        state
    }

    fn add_enemy(state: &mut GameState, color: YolkColor, pos: Vec2) -> u32 {
        let id = state.next_entity_id();
        state.enemies.push(Enemy {
            id,
            pos,
            prev_pos: pos,
            vel: Vec2::ZERO,
            radius: 8.0,
            speed: 0.4,
            color,
            size_factor: 1.0,
            wobble_phase: 0.0,
            blob: BlobShape::default(),
        });
        id
    }

    fn hold_right() -> TickInput {
        TickInput {
            right: true,
            ..TickInput::default()
        }
    }

    #[test]
    fn test_tick_determinism() {
        let mut a = open_field_state(7);
        let mut b = open_field_state(7);
        reset_run(&mut a, 1);
        reset_run(&mut b, 1);

        let mut input = hold_right();
        for step in 0..600u32 {
            input.aim_right = step % 3 == 0;
            input.down = step % 7 < 3;
            tick(&mut a, &input, STEP_MS);
            tick(&mut b, &input, STEP_MS);
        }
        let _ = a.drain_events();
        let _ = b.drain_events();

        let ja = serde_json::to_string(&a).unwrap();
        let jb = serde_json::to_string(&b).unwrap();
        assert_eq!(ja, jb);
    }

    #[test]
    fn test_tick_frame_rate_independence() {
        let mut slow = open_field_state(3);
        let mut fast = open_field_state(3);
        slow.player.pos = Vec2::new(400.0, 400.0);
        fast.player.pos = Vec2::new(400.0, 400.0);

        let input = hold_right();
        // 400 ms of sim time at 30 fps vs 120 fps
        for _ in 0..12 {
            tick(&mut slow, &input, 1000.0 / 30.0);
        }
        for _ in 0..48 {
            tick(&mut fast, &input, 1000.0 / 120.0);
        }

        assert!((slow.time_ms - fast.time_ms).abs() < 0.01);
        assert!(
            (slow.player.pos.x - fast.player.pos.x).abs() < 1e-2,
            "30 fps x={} vs 120 fps x={}",
            slow.player.pos.x,
            fast.player.pos.x
        );
        assert!((slow.player.pos.y - fast.player.pos.y).abs() < 1e-2);
    }

    #[test]
    fn test_tick_pause_freezes_the_clock() {
        let mut state = open_field_state(1);
        tick(&mut state, &TickInput::default(), STEP_MS);
        let frozen_at = state.time_ms;

        let pause = TickInput {
            pause: true,
            ..TickInput::default()
        };
        tick(&mut state, &pause, STEP_MS);
        assert_eq!(state.phase, GamePhase::Paused);

        tick(&mut state, &TickInput::default(), STEP_MS);
        tick(&mut state, &TickInput::default(), STEP_MS);
        assert_eq!(state.time_ms, frozen_at);

        tick(&mut state, &pause, STEP_MS);
        assert_eq!(state.phase, GamePhase::Playing);
        assert!(state.time_ms > frozen_at);
    }

    #[test]
    fn test_bullet_count_never_exceeds_the_cap() {
        let mut state = open_field_state(5);
        // Pre-fill to the cap; the next volley must displace the oldest
        for n in 0..MAX_BULLETS {
            push_bullet(
                &mut state,
                Vec2::new(500.0 + n as f32, 500.0),
                Vec2::new(0.0, -1.0),
                0.0,
            );
        }
        let oldest = state.bullets[0].id;

        tick(&mut state, &TickInput::default(), STEP_MS);
        assert!(state.bullets.len() <= MAX_BULLETS);
        assert!(state.bullets.iter().all(|b| b.id != oldest));
    }

    #[test]
    fn test_empty_battery_slows_movement() {
        let mut state = open_field_state(2);
        state.player.pos = Vec2::new(600.0, 600.0);
        state.player.energy = 0.0;
        let x0 = state.player.pos.x;

        tick(&mut state, &hold_right(), STEP_MS);

        let moved = state.player.pos.x - x0;
        let expected = PLAYER_SPEED * ENERGY_EMPTY_SPEED_MULT;
        assert!(
            (moved - expected).abs() < 1e-3,
            "moved {moved}, expected {expected}"
        );
    }

    #[test]
    fn test_only_the_target_color_takes_bullet_damage() {
        let mut state = open_field_state(11);
        state.player.pos = Vec2::new(600.0, 600.0);
        state.colors = LevelColors {
            palette: vec![YolkColor::Red, YolkColor::Blue],
            next_index: 0,
        };
        state.spawn.pending_by_color = vec![0, 0];
        state.spawn.pending_total = 1; // hold the level open
        let red = add_enemy(&mut state, YolkColor::Red, Vec2::new(650.0, 600.0));
        let blue = add_enemy(&mut state, YolkColor::Blue, Vec2::new(550.0, 600.0));

        // One bullet dropped on each enemy
        push_bullet(&mut state, Vec2::new(650.0, 600.0), Vec2::ZERO, 0.0);
        push_bullet(&mut state, Vec2::new(550.0, 600.0), Vec2::ZERO, 0.0);

        let tuning = state.effects.resolve(state.time_ms, false);
        update_bullet_hits(&mut state, &tuning);

        assert!(!state.enemies.iter().any(|e| e.id == red), "red is the target");
        assert!(
            state.enemies.iter().any(|e| e.id == blue),
            "blue is out of order and must survive"
        );
        assert!(state.bullets.is_empty(), "both bullets are spent");
        // Red emptied its quota, so the target rotates to blue
        assert_eq!(state.colors.target(), Some(YolkColor::Blue));
    }

    #[test]
    fn test_clearing_the_board_advances_the_level() {
        let mut state = open_field_state(13);
        reset_run(&mut state, 1);
        state.enemies.clear();
        state.spawn.pending_by_color.fill(0);
        state.spawn.pending_total = 0;
        let _ = state.drain_events();

        tick(&mut state, &TickInput::default(), STEP_MS);

        assert_eq!(state.level, 2);
        assert!(!state.enemies.is_empty(), "next level spawns its burst");
        let events = state.drain_events();
        assert!(events.contains(&SimEvent::LevelUp { level: 2 }));
    }

    #[test]
    fn test_checkpoint_event_fires_on_round_levels() {
        let mut state = open_field_state(13);
        reset_run(&mut state, 9);
        state.enemies.clear();
        state.spawn.pending_by_color.fill(0);
        state.spawn.pending_total = 0;
        let _ = state.drain_events();

        tick(&mut state, &TickInput::default(), STEP_MS);

        assert_eq!(state.level, 10);
        let events = state.drain_events();
        assert!(events.contains(&SimEvent::CheckpointUnlocked { level: 10 }));
    }

    #[test]
    fn test_contact_costs_a_life_once_per_mercy_window() {
        let mut state = open_field_state(17);
        state.player.pos = Vec2::new(600.0, 600.0);
        state.lives = 3;
        state.colors = LevelColors {
            palette: vec![YolkColor::Green],
            next_index: 0,
        };
        state.spawn.pending_by_color = vec![1];
        state.spawn.pending_total = 1;
        add_enemy(&mut state, YolkColor::Green, Vec2::new(602.0, 600.0));

        assert!(update_player_collisions(&mut state));
        assert_eq!(state.lives, 2);
        assert!(state.player.is_invulnerable(state.time_ms));
        assert_eq!(state.player.energy, ENERGY_AFTER_LIFE_LOSS);
        let knocked = state.player.pos;
        assert!(knocked.distance(Vec2::new(602.0, 600.0)) > 8.0);

        // Second contact inside the mercy window is free
        state.enemies[0].pos = state.player.pos;
        assert!(update_player_collisions(&mut state));
        assert_eq!(state.lives, 2);
    }

    #[test]
    fn test_last_life_ends_the_run() {
        let mut state = open_field_state(19);
        reset_run(&mut state, 1);
        state.enemies.clear();
        state.lives = 1;
        state.spawn.pending_total = 1;
        let player_pos = state.player.pos;
        add_enemy(&mut state, YolkColor::Red, player_pos);
        let _ = state.drain_events();

        tick(&mut state, &TickInput::default(), STEP_MS);

        assert_eq!(state.phase, GamePhase::GameOver);
        let events = state.drain_events();
        assert!(events.iter().any(|e| matches!(e, SimEvent::RunEnded { .. })));

        // A dead state stops ticking entirely
        let t = state.time_ms;
        tick(&mut state, &TickInput::default(), STEP_MS);
        assert_eq!(state.time_ms, t);
    }

    #[test]
    fn test_reset_run_rebuilds_the_board_but_keeps_the_wallet() {
        let mut state = open_field_state(23);
        reset_run(&mut state, 1);
        state.cash = 777;
        state.lives = 1;
        state.level = 7;
        push_bullet(&mut state, Vec2::new(10.0, 10.0), Vec2::new(1.0, 0.0), 0.0);
        state.phase = GamePhase::GameOver;
        state.laser.active_since_ms = Some(state.time_ms);
        state.laser.last_used_ms = Some(state.time_ms);

        reset_run(&mut state, 10);

        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.level, 10);
        assert_eq!(state.start_level, 10);
        assert_eq!(state.cash, 777);
        assert_eq!(state.run_start_cash, 777);
        assert_eq!(state.lives, 1);
        assert!(state.bullets.is_empty());
        assert!(!state.enemies.is_empty());
        assert!(state.player.energy == ENERGY_MAX);
        assert!((16..=20).contains(&state.next_rift_at_level));
        // Cooldown stamp survives the reset even though the beam stopped
        assert!(state.laser.active_since_ms.is_none());
        assert!(state.laser.last_used_ms.is_some());
    }

    #[test]
    fn test_laser_sweep_spares_out_of_order_enemies() {
        let mut state = open_field_state(29);
        state.player.pos = Vec2::new(1000.0, 900.0);
        state.colors = LevelColors {
            palette: vec![YolkColor::Purple, YolkColor::Pink],
            next_index: 0,
        };
        state.spawn.pending_by_color = vec![0, 1];
        state.spawn.pending_total = 1;
        state.spawn.next_spawn_at_ms = f32::INFINITY;
        state.laser.owned = true;
        // Target dead ahead on the beam's starting heading, bystander far off it
        add_enemy(&mut state, YolkColor::Purple, Vec2::new(1100.0, 900.0));
        let bystander = add_enemy(&mut state, YolkColor::Pink, Vec2::new(1000.0, 700.0));

        let input = TickInput {
            laser: true,
            ..TickInput::default()
        };
        tick(&mut state, &input, STEP_MS);

        assert!(state.laser.is_active());
        assert_eq!(state.enemies.len(), 1);
        assert_eq!(state.enemies[0].id, bystander);
    }

    #[test]
    fn test_nuke_clears_every_color_and_pays_out() {
        let mut state = open_field_state(31);
        state.player.pos = Vec2::new(1000.0, 900.0);
        state.colors = LevelColors {
            palette: vec![YolkColor::Yellow, YolkColor::Black],
            next_index: 0,
        };
        state.spawn.pending_by_color = vec![0, 0];
        state.spawn.pending_total = 1;
        state.spawn.next_spawn_at_ms = f32::INFINITY;
        state.nuke.owned = true;
        let cash_before = state.cash;
        add_enemy(&mut state, YolkColor::Yellow, Vec2::new(1050.0, 900.0));
        add_enemy(&mut state, YolkColor::Black, Vec2::new(950.0, 900.0));
        add_enemy(&mut state, YolkColor::Black, Vec2::new(1000.0, 950.0));

        let input = TickInput {
            nuke: true,
            ..TickInput::default()
        };
        tick(&mut state, &input, STEP_MS);

        assert!(state.enemies.is_empty());
        assert!(state.nuke.is_active());
        assert_eq!(state.cash, cash_before + 2 + 5 + 5);
        assert!(state.nuke.last_used_ms.is_some());

        // Still cooling down long after the flash fades
        let mut later = TickInput::default();
        for _ in 0..60 {
            tick(&mut state, &later, STEP_MS);
        }
        later.nuke = true;
        tick(&mut state, &later, STEP_MS);
        assert!(!state.nuke.is_active(), "cooldown blocks re-activation");
    }

    #[test]
    fn test_collecting_a_timed_powerup_sets_its_deadline() {
        let mut state = open_field_state(37);
        state.player.pos = Vec2::new(600.0, 600.0);
        state.spawn.pending_total = 1;
        state.spawn.next_spawn_at_ms = f32::INFINITY;
        let id = state.next_entity_id();
        state.powerups.push(PowerUp {
            id,
            kind: PowerUpKind::Shotgun,
            pos: state.player.pos,
            radius: 8.0,
        });

        tick(&mut state, &TickInput::default(), STEP_MS);

        assert!(state.powerups.is_empty());
        assert!(state.effects.is_active(PowerUpKind::Shotgun, state.time_ms));
        let events = state.drain_events();
        assert!(events.contains(&SimEvent::PowerUpCollected {
            kind: PowerUpKind::Shotgun
        }));

        // Next volley fans out five pellets
        let before = state.bullets.len();
        let tuning = state.effects.resolve(state.time_ms, false);
        fire_bullets(&mut state, &tuning);
        assert_eq!(state.bullets.len(), before + 5);
    }

    #[test]
    fn test_life_pickup_caps_at_max_lives() {
        let mut state = open_field_state(41);
        state.lives = MAX_LIVES;
        collect_powerup(&mut state, PowerUpKind::Life);
        assert_eq!(state.lives, MAX_LIVES);

        state.lives = 2;
        collect_powerup(&mut state, PowerUpKind::Life);
        assert_eq!(state.lives, 3);
    }

    #[test]
    fn test_bullets_vanish_at_the_map_edge_without_bounce() {
        let mut state = open_field_state(43);
        state.player.pos = Vec2::new(600.0, 600.0);
        state.spawn.pending_total = 1;
        let edge_x = state.map.w - 1.0;
        push_bullet(
            &mut state,
            Vec2::new(edge_x, 600.0),
            Vec2::new(1.0, 0.0),
            0.0,
        );
        let tuning = state.effects.resolve(state.time_ms, false);
        update_bullets(&mut state, &tuning, 1.0);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_bouncing_bullets_reflect_off_the_map_edge() {
        let mut state = open_field_state(47);
        state.player.pos = Vec2::new(600.0, 600.0);
        state.spawn.pending_total = 1;
        state.effects.bounce_until_ms = state.time_ms + 10_000.0;
        let edge_x = state.map.w - 1.0;
        push_bullet(
            &mut state,
            Vec2::new(edge_x, 600.0),
            Vec2::new(1.0, 0.0),
            0.0,
        );
        let tuning = state.effects.resolve(state.time_ms, false);
        update_bullets(&mut state, &tuning, 1.0);
        assert_eq!(state.bullets.len(), 1);
        assert!(state.bullets[0].dir.x < 0.0, "x direction flipped");
        assert!(state.bullets[0].pos.x <= state.map.w);
    }

    fn crate_at(x: f32, y: f32, w: f32, h: f32) -> Obstacle {
        Obstacle {
            rect: Rect::new(x, y, w, h),
            kind: ObstacleKind::Crate,
            deposit: None,
        }
    }

    #[test]
    fn test_bullets_vanish_on_obstacle_contact() {
        let mut state = open_field_state(53);
        state.map.obstacles.push(crate_at(700.0, 560.0, 40.0, 80.0));
        state.player.pos = Vec2::new(600.0, 600.0);
        push_bullet(&mut state, Vec2::new(695.0, 600.0), Vec2::new(1.0, 0.0), 0.0);

        let tuning = state.effects.resolve(state.time_ms, false);
        update_bullets(&mut state, &tuning, 1.0);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_bouncing_bullets_reflect_off_an_obstacle() {
        let mut state = open_field_state(59);
        state.map.obstacles.push(crate_at(700.0, 560.0, 40.0, 80.0));
        state.player.pos = Vec2::new(600.0, 600.0);
        state.effects.bounce_until_ms = state.time_ms + 10_000.0;
        push_bullet(&mut state, Vec2::new(695.0, 600.0), Vec2::new(1.0, 0.0), 0.0);

        let tuning = state.effects.resolve(state.time_ms, false);
        update_bullets(&mut state, &tuning, 1.0);
        assert_eq!(state.bullets.len(), 1);
        assert!(state.bullets[0].dir.x < 0.0, "x direction flipped");
        assert_eq!(state.bullets[0].last_bounce_obstacle, Some(0));
        assert!(state.bullets[0].pos.x + state.view.bullet_radius() <= 700.0 + 1e-3);
    }

    proptest! {
        #[test]
        fn prop_bullet_cap_recovers_from_any_overfill(
            extra in 0usize..600,
            ticks in 1u32..8,
        ) {
            let mut state = open_field_state(99);
            reset_run(&mut state, 1);
            state.spawn.next_spawn_at_ms = f32::INFINITY;

            // Raw pushes bypass the fire path so the count starts past the cap
            for i in 0..extra {
                let id = state.next_entity_id();
                let angle = i as f32 * 0.37;
                state.bullets.push(Bullet {
                    id,
                    pos: state.player.pos,
                    dir: Vec2::new(angle.cos(), angle.sin()),
                    seed: 0.0,
                    last_bounce_obstacle: None,
                    last_bounce_ms: 0.0,
                });
            }

            for _ in 0..ticks {
                tick(&mut state, &TickInput::default(), STEP_MS);
                prop_assert!(state.bullets.len() <= MAX_BULLETS);
            }
        }
    }
}
