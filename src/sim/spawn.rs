//! Level planning and enemy spawning
//!
//! A level allocates a per-color enemy quota up front, spawns a small burst so
//! the map never starts empty, then trickles the rest in over time. The target
//! color only advances once its quota is both dead and drained.

use glam::Vec2;
use rand::Rng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use super::blob::{BlobParams, BlobShape};
use super::collision::circle_fits;
use super::state::{
    Enemy, GameState, LevelColors, LevelSpawnState, PowerUp, PowerUpKind, SimEvent, YolkColor,
    pack_rgba,
};
use crate::consts::*;

/// Offscreen spawn margin outside the viewport edge
const SPAWN_EDGE_PAD: f32 = 60.0;
/// Placement attempts before falling back to a spot near the player
const SPAWN_TRIES: u32 = 1000;

/// Plan and seed the current level: palette, per-color quotas, initial burst.
pub fn plan_level(state: &mut GameState) {
    state.enemies.clear();

    let level = state.level;
    let enemy_count = (3 + level).clamp(4, 48);
    let color_count = (3 + level / 6).clamp(3, 7) as usize;

    let mut rng = state.rng.next();
    let mut shuffled = YolkColor::ALL.to_vec();
    shuffled.shuffle(&mut rng);
    let mut palette: Vec<YolkColor> = shuffled[..color_count].to_vec();
    palette.sort();

    // At least one enemy per palette color so the sequence stays completable
    let mut pending_by_color = vec![1u32; palette.len()];
    let mut remaining = enemy_count.saturating_sub(palette.len() as u32);
    while remaining > 0 {
        let slot = rng.random_range(0..palette.len());
        pending_by_color[slot] += 1;
        remaining -= 1;
    }

    let base_speed = (1.35 + level as f32 * 0.015).min(2.1);
    let interval_ms = (520 - level as i64 * 6).clamp(240, 520) as f32;

    state.colors = LevelColors {
        palette,
        next_index: 0,
    };
    state.spawn = LevelSpawnState {
        pending_by_color,
        pending_total: 0,
        interval_ms,
        next_spawn_at_ms: state.time_ms + interval_ms,
        base_speed,
    };

    let burst = (4 + level / 10).clamp(4, 8).min(enemy_count);
    for _ in 0..burst {
        let color = {
            let mut pick_rng = state.rng.next();
            pick_spawn_color(&state.colors, &state.spawn.pending_by_color, &mut pick_rng)
                .unwrap_or(state.colors.palette[0])
        };
        spawn_enemy(state, color);
        if let Some(slot) = state.colors.palette.iter().position(|&c| c == color) {
            state.spawn.pending_by_color[slot] = state.spawn.pending_by_color[slot].saturating_sub(1);
        }
    }
    state.spawn.pending_total = state.spawn.pending_by_color.iter().sum();

    log::debug!(
        "level {} planned: {} colors, {} alive, {} pending",
        level,
        state.colors.palette.len(),
        state.enemies.len(),
        state.spawn.pending_total
    );

    // The burst may have skipped the first color entirely
    advance_target_if_cleared(state);
}

/// Release one pending enemy when the trickle timer fires.
pub fn update_trickle(state: &mut GameState) {
    if state.spawn.pending_total == 0 || state.time_ms < state.spawn.next_spawn_at_ms {
        return;
    }

    let color = {
        let mut rng = state.rng.next();
        pick_spawn_color(&state.colors, &state.spawn.pending_by_color, &mut rng)
    };
    let Some(color) = color else {
        state.spawn.pending_total = 0;
        return;
    };

    spawn_enemy(state, color);
    if let Some(slot) = state.colors.palette.iter().position(|&c| c == color) {
        state.spawn.pending_by_color[slot] = state.spawn.pending_by_color[slot].saturating_sub(1);
    }
    state.spawn.pending_total = state.spawn.pending_total.saturating_sub(1);

    // Jitter so the cadence feels organic
    let jitter = 0.85 + state.rng.next().random::<f32>() * 0.30;
    state.spawn.next_spawn_at_ms = state.time_ms + state.spawn.interval_ms * jitter;

    // Spawning the last of a color may let the target advance later
    advance_target_if_cleared(state);
}

/// Dense bonus-room spawn; any color, slightly bigger and faster stock.
pub fn spawn_bonus_enemy(state: &mut GameState) {
    let mut rng = state.rng.next();
    let color = YolkColor::ALL[rng.random_range(0..YolkColor::ALL.len())];

    let ss = state.view.size_scale;
    let radius = (8.5 + rng.random::<f32>() * 4.0) * ss;
    let pos = spawn_position(state, radius, &mut rng);
    let speed = 1.55 + rng.random::<f32>() * 0.45;
    let size_factor = (radius / (8.5 * ss)).clamp(0.9, 1.7);

    let big = size_factor >= 1.25;
    let params = BlobParams {
        nodes: if big {
            19 + rng.random_range(0..5)
        } else {
            16 + rng.random_range(0..6)
        },
        seed: rng.random::<f32>() * 1000.0,
        noise_scale: if big {
            0.90 + rng.random::<f32>() * 0.15
        } else {
            1.0 + rng.random::<f32>() * 0.25
        },
        squish_scale: if big {
            0.85 + rng.random::<f32>() * 0.15
        } else {
            0.95 + rng.random::<f32>() * 0.20
        },
        bias_mag: 0.05 + rng.random::<f32>() * 0.06,
        bias_angle: rng.random::<f32>() * std::f32::consts::TAU,
        noise_mul_a: 2.0 + rng.random::<f32>() * 1.2,
        noise_mul_b: 3.4 + rng.random::<f32>() * 1.8,
        noise_time_a: 260.0 + rng.random::<f32>() * 160.0,
        noise_time_b: 140.0 + rng.random::<f32>() * 120.0,
    };

    let wobble_phase = rng.random::<f32>() * std::f32::consts::TAU;
    let id = state.next_entity_id();
    state.enemies.push(Enemy {
        id,
        pos,
        prev_pos: pos,
        vel: Vec2::ZERO,
        radius,
        speed,
        color,
        size_factor,
        wobble_phase,
        blob: BlobShape::new(params),
    });
}

/// Spawn one scroll-map enemy of the given color near the viewport edge.
pub fn spawn_enemy(state: &mut GameState, color: YolkColor) {
    let mut rng = state.rng.next();

    // Skewed size distribution: most near-normal, some big, huge ones rare.
    // Bigger ones also move a bit slower.
    let roll: f32 = rng.random();
    let size_factor = if roll < 0.02 {
        1.75 + rng.random::<f32>() * 0.60
    } else if roll < 0.12 {
        1.25 + rng.random::<f32>() * 0.50
    } else {
        0.90 + rng.random::<f32>() * 0.25
    };

    let radius = state.view.enemy_base_radius() * size_factor;
    let pos = spawn_position(state, radius, &mut rng);

    let variance = 0.97 + rng.random::<f32>() * 0.06;
    let speed = state.spawn.base_speed * variance / size_factor.powf(0.35);

    let huge = size_factor >= 1.75;
    let big = size_factor >= 1.25;
    let params = BlobParams {
        nodes: if huge {
            22 + rng.random_range(0..5)
        } else if big {
            19 + rng.random_range(0..5)
        } else {
            16 + rng.random_range(0..6)
        },
        seed: rng.random::<f32>() * 1000.0,
        noise_scale: if huge {
            0.78 + rng.random::<f32>() * 0.10
        } else if big {
            0.90 + rng.random::<f32>() * 0.15
        } else {
            1.0 + rng.random::<f32>() * 0.25
        },
        squish_scale: if huge {
            0.75 + rng.random::<f32>() * 0.10
        } else if big {
            0.85 + rng.random::<f32>() * 0.15
        } else {
            0.95 + rng.random::<f32>() * 0.20
        },
        bias_mag: if huge {
            0.04 + rng.random::<f32>() * 0.04
        } else {
            0.06 + rng.random::<f32>() * 0.06
        },
        bias_angle: rng.random::<f32>() * std::f32::consts::TAU,
        noise_mul_a: 2.0 + rng.random::<f32>() * 1.2,
        noise_mul_b: 3.4 + rng.random::<f32>() * 1.8,
        noise_time_a: 300.0 + rng.random::<f32>() * 180.0,
        noise_time_b: 160.0 + rng.random::<f32>() * 130.0,
    };

    let wobble_phase = rng.random::<f32>() * std::f32::consts::TAU;
    let id = state.next_entity_id();
    state.enemies.push(Enemy {
        id,
        pos,
        prev_pos: pos,
        vel: Vec2::ZERO,
        radius,
        speed,
        color,
        size_factor,
        wobble_phase,
        blob: BlobShape::new(params),
    });
}

/// Weighted color pick, biased toward earlier palette slots so progress
/// through the sequence doesn't stall. Only colors with pending quota count.
fn pick_spawn_color(
    colors: &LevelColors,
    pending_by_color: &[u32],
    rng: &mut Pcg32,
) -> Option<YolkColor> {
    let len = colors.palette.len();
    let weight = |slot: usize| (len - slot).max(1) as u32;

    let total: u32 = (0..len)
        .filter(|&slot| pending_by_color.get(slot).copied().unwrap_or(0) > 0)
        .map(weight)
        .sum();
    if total == 0 {
        return None;
    }

    let mut pick = rng.random_range(0..total);
    for slot in 0..len {
        if pending_by_color.get(slot).copied().unwrap_or(0) == 0 {
            continue;
        }
        let w = weight(slot);
        if pick < w {
            return Some(colors.palette[slot]);
        }
        pick -= w;
    }
    None
}

/// Find a clear spot just outside the viewport edge; falls back to a clamped
/// spot near the player once the placement attempts run out.
fn spawn_position(state: &GameState, radius: f32, rng: &mut Pcg32) -> Vec2 {
    let map = &state.map;
    let left = state.camera.pos.x;
    let top = state.camera.pos.y;
    let right = left + state.view.w;
    let bottom = top + state.view.h;

    for _ in 0..SPAWN_TRIES {
        let edge: f32 = rng.random();
        let (x, y) = if edge < 0.25 {
            (left + rng.random::<f32>() * (right - left), top - SPAWN_EDGE_PAD)
        } else if edge < 0.5 {
            (left + rng.random::<f32>() * (right - left), bottom + SPAWN_EDGE_PAD)
        } else if edge < 0.75 {
            (left - SPAWN_EDGE_PAD, top + rng.random::<f32>() * (bottom - top))
        } else {
            (right + SPAWN_EDGE_PAD, top + rng.random::<f32>() * (bottom - top))
        };

        // Clamp to map bounds (still slightly offscreen near map edges)
        let pos = Vec2::new(
            x.clamp(radius, map.w - radius),
            y.clamp(radius, map.h - radius),
        );

        if !circle_fits(pos, radius + 2.0, map) {
            continue;
        }
        let overlaps = state.enemies.iter().any(|e| {
            let rad_sum = radius + e.radius;
            pos.distance_squared(e.pos) < rad_sum * rad_sum
        });
        if !overlaps {
            return pos;
        }
    }

    Vec2::new(
        (state.player.pos.x + radius).clamp(radius, map.w - radius),
        (state.player.pos.y + radius).clamp(radius, map.h - radius),
    )
}

/// Advance the target color one step once no live or pending enemy holds it.
pub fn advance_target_if_cleared(state: &mut GameState) {
    let Some(target) = state.colors.target() else {
        return;
    };
    let slot = state.colors.next_index;
    let pending = state.spawn.pending_by_color.get(slot).copied().unwrap_or(0);
    let any_alive = state.enemies.iter().any(|e| e.color == target);
    if !any_alive && pending == 0 {
        state.colors.next_index += 1;
    }
}

/// Kill the enemy at `index`, paying out cash and rolling a drop.
/// `hit_pos` anchors the impact flash (bullet tip or beam point).
pub fn kill_enemy(state: &mut GameState, index: usize, hit_pos: Vec2) {
    if index >= state.enemies.len() {
        return;
    }
    let enemy = state.enemies.remove(index);

    state.emit(SimEvent::EnemyKilled { color: enemy.color });
    state.particle_burst(enemy.pos, pack_rgba(enemy.color.rgb(), 1.0), 18, 1.5, 10.0, 14.0);
    let flash = if enemy.color == YolkColor::Black {
        pack_rgba(0xFFFFFF, 0.7)
    } else {
        pack_rgba(enemy.color.rgb(), 0.8)
    };
    state.particle_burst(hit_pos, flash, 8, 1.0, 8.0, 18.0);

    let payout = (enemy.color.cash_value() as f32 * state.trophies.cash_multiplier).round();
    state.cash += (payout as u64).max(1);
    state.cash_dirty = true;

    maybe_drop_powerup(state, enemy.pos);
    advance_target_if_cleared(state);
}

/// Independent drop rolls: a rare extra life, then a uniform timed power-up.
fn maybe_drop_powerup(state: &mut GameState, pos: Vec2) {
    let mut rng = state.rng.next();

    if rng.random::<f32>() < POWERUP_LIFE_DROP_CHANCE {
        let id = state.next_entity_id();
        let radius = state.view.powerup_radius(PowerUpKind::Life);
        state.powerups.push(PowerUp {
            id,
            kind: PowerUpKind::Life,
            pos,
            radius,
        });
    }
    if rng.random::<f32>() < POWERUP_DROP_CHANCE {
        let kind = PowerUpKind::TIMED[rng.random_range(0..PowerUpKind::TIMED.len())];
        let id = state.next_entity_id();
        let radius = state.view.powerup_radius(kind);
        state.powerups.push(PowerUp {
            id,
            kind,
            pos,
            radius,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::state::{GameMode, GamePhase, WorldView};
    use proptest::prelude::*;

    fn playing_state(seed: u64) -> GameState {
        let mut state = GameState::new(seed, WorldView::default());
        state.phase = GamePhase::Playing;
        state
    }

    #[test]
    fn plan_level_allocates_full_quota() {
        for level in [1, 6, 12, 30, 60] {
            let mut state = playing_state(11);
            state.level = level;
            plan_level(&mut state);

            let expected_total = (3 + level).clamp(4, 48);
            let alive = state.enemies.len() as u32;
            assert_eq!(alive + state.spawn.pending_total, expected_total);

            let expected_colors = (3 + level / 6).clamp(3, 7) as usize;
            assert_eq!(state.colors.palette.len(), expected_colors);

            let mut sorted = state.colors.palette.clone();
            sorted.sort();
            assert_eq!(sorted, state.colors.palette, "palette must be canonical");
        }
    }

    #[test]
    fn plan_level_seeds_an_initial_burst() {
        let mut state = playing_state(3);
        state.level = 1;
        plan_level(&mut state);
        assert!(state.enemies.len() >= 4, "level must not start empty");
        assert!(state.enemies.iter().all(|e| e.radius > 0.0 && e.speed > 0.0));
    }

    #[test]
    fn trickle_waits_for_its_timer_then_spawns_one() {
        let mut state = playing_state(5);
        state.level = 1;
        plan_level(&mut state);

        let alive = state.enemies.len();
        let pending = state.spawn.pending_total;
        assert!(pending > 0);

        update_trickle(&mut state);
        assert_eq!(state.enemies.len(), alive, "timer has not fired yet");

        state.time_ms = state.spawn.next_spawn_at_ms;
        update_trickle(&mut state);
        assert_eq!(state.enemies.len(), alive + 1);
        assert_eq!(state.spawn.pending_total, pending - 1);
        assert!(state.spawn.next_spawn_at_ms > state.time_ms);
    }

    #[test]
    fn spawned_enemies_fit_the_map() {
        let mut state = playing_state(17);
        state.level = 20;
        plan_level(&mut state);
        while state.spawn.pending_total > 0 {
            state.time_ms = state.spawn.next_spawn_at_ms;
            update_trickle(&mut state);
        }
        for e in &state.enemies {
            assert!(e.pos.x >= e.radius && e.pos.x <= state.map.w - e.radius);
            assert!(e.pos.y >= e.radius && e.pos.y <= state.map.h - e.radius);
        }
    }

    #[test]
    fn target_advances_only_when_color_is_dead_and_drained() {
        let mut state = playing_state(23);
        state.level = 1;
        plan_level(&mut state);

        let first = state.colors.target().unwrap();

        // Quota still pending for the first color: no advance even if none alive
        state.enemies.retain(|e| e.color != first);
        if state.spawn.pending_by_color[state.colors.next_index] > 0 {
            advance_target_if_cleared(&mut state);
            assert_eq!(state.colors.target(), Some(first));
        }

        // Drain the quota too: now it advances
        state.spawn.pending_by_color[state.colors.next_index] = 0;
        advance_target_if_cleared(&mut state);
        assert_ne!(state.colors.target(), Some(first));
    }

    #[test]
    fn kill_pays_cash_and_can_advance_target() {
        let mut state = playing_state(31);
        state.level = 1;
        plan_level(&mut state);

        let target = state.colors.target().unwrap();
        state.spawn.pending_by_color[state.colors.next_index] = 0;
        state.spawn.pending_total = state.spawn.pending_by_color.iter().sum();
        state.enemies.retain(|e| e.color == target);
        assert!(!state.enemies.is_empty());

        let cash_before = state.cash;
        while !state.enemies.is_empty() {
            let pos = state.enemies[0].pos;
            kill_enemy(&mut state, 0, pos);
        }
        assert!(state.cash > cash_before);
        assert_ne!(state.colors.target(), Some(target));
        assert!(
            state
                .events
                .iter()
                .any(|e| matches!(e, SimEvent::EnemyKilled { .. }))
        );
    }

    #[test]
    fn bonus_spawns_ignore_palette() {
        let mut state = playing_state(41);
        state.level = 1;
        plan_level(&mut state);
        state.enemies.clear();
        for _ in 0..30 {
            spawn_bonus_enemy(&mut state);
        }
        assert_eq!(state.enemies.len(), 30);
        assert!(state.enemies.iter().all(|e| e.size_factor >= 0.9 && e.size_factor <= 1.7));
        assert!(matches!(state.mode, GameMode::Scroll));
    }

    #[test]
    fn weighted_pick_only_returns_pending_colors() {
        let colors = LevelColors {
            palette: vec![YolkColor::Yellow, YolkColor::Red, YolkColor::Blue],
            next_index: 0,
        };
        let pending = vec![0u32, 2, 0];
        let mut rng = crate::sim::state::RngState::new(9).next();
        for _ in 0..50 {
            assert_eq!(
                pick_spawn_color(&colors, &pending, &mut rng),
                Some(YolkColor::Red)
            );
        }
        assert_eq!(pick_spawn_color(&colors, &[0, 0, 0], &mut rng), None);
    }

    proptest! {
        #[test]
        fn prop_target_advances_one_step_exactly_when_cleared(
            seed in 1u64..5000,
            level in 1u32..40,
            kills in 0usize..12,
            drain_slots in prop::collection::vec(any::<bool>(), 7),
        ) {
            let mut state = playing_state(seed);
            state.level = level;
            plan_level(&mut state);

            for _ in 0..kills {
                if state.enemies.is_empty() {
                    break;
                }
                let pos = state.enemies[0].pos;
                kill_enemy(&mut state, 0, pos);
            }
            for (slot, drain) in drain_slots.iter().enumerate() {
                if *drain && slot < state.spawn.pending_by_color.len() {
                    state.spawn.pending_by_color[slot] = 0;
                }
            }
            state.spawn.pending_total = state.spawn.pending_by_color.iter().sum();

            let before = state.colors.next_index;
            let target = state.colors.target();
            advance_target_if_cleared(&mut state);
            let after = state.colors.next_index;

            prop_assert!(after == before || after == before + 1);
            if let Some(color) = target {
                let cleared = state.enemies.iter().all(|e| e.color != color)
                    && state.spawn.pending_by_color.get(before).copied().unwrap_or(0) == 0;
                prop_assert_eq!(after == before + 1, cleared);
            } else {
                prop_assert_eq!(after, before);
            }
        }
    }
}
