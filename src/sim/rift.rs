//! Rifts and the bonus room world swap
//!
//! Every few levels a rift opens somewhere on the map. Flying into it swaps
//! the whole outer world for a walled bonus room where every yolk is killable
//! and worth cash. When the room timer lapses the outer world comes back
//! exactly as it was left, enemies and all.

use glam::Vec2;
use rand::Rng;

use super::collision::circle_fits;
use super::map::bonus_map;
use super::state::{DockState, GameMode, GameState, Rift, SimEvent, WorldSnapshot};
use crate::consts::*;

/// Rifts come every 6 to 10 levels.
pub fn schedule_next_rift(state: &mut GameState) {
    let mut rng = state.rng.next();
    state.next_rift_at_level = state.level.max(1) + rng.random_range(6..=10);
}

/// Open a rift somewhere clear of obstacles and away from the player.
/// The map center is the fallback when no candidate sticks.
pub fn spawn_rift(state: &mut GameState) {
    let now = state.time_ms;
    let radius = RIFT_RADIUS * state.view.size_scale;
    let margin = radius + RIFT_EDGE_MARGIN;
    let mut pos = Vec2::new(state.map.w / 2.0, state.map.h / 2.0);

    let mut rng = state.rng.next();
    for _ in 0..RIFT_PLACE_TRIES {
        let candidate = Vec2::new(
            margin + rng.random::<f32>() * (state.map.w - margin * 2.0),
            margin + rng.random::<f32>() * (state.map.h - margin * 2.0),
        );
        let to_player = candidate.distance_squared(state.player.pos);
        if to_player < RIFT_MIN_PLAYER_DIST * RIFT_MIN_PLAYER_DIST {
            continue;
        }
        if !circle_fits(candidate, radius + 2.0, &state.map) {
            continue;
        }
        pos = candidate;
        break;
    }

    state.rift = Some(Rift {
        pos,
        radius,
        expires_at_ms: now + RIFT_LIFETIME_MS,
    });
    state.emit(SimEvent::RiftOpened);
}

/// Bonus-room timer and rift lifetime, checked at the head of each tick.
pub fn update_expiry(state: &mut GameState) {
    let now = state.time_ms;
    match &state.mode {
        GameMode::Bonus { ends_at_ms, .. } => {
            if now >= *ends_at_ms {
                exit_bonus(state);
            }
        }
        GameMode::Scroll => {
            if state.rift.is_some_and(|r| now >= r.expires_at_ms) {
                state.rift = None;
                state.emit(SimEvent::RiftClosed);
            }
        }
    }
}

/// Enter the bonus room when the player overlaps an open rift.
pub fn try_enter(state: &mut GameState) -> bool {
    if state.mode.is_bonus() {
        return false;
    }
    let Some(rift) = state.rift else {
        return false;
    };
    let reach = state.player.radius + rift.radius;
    if state.player.pos.distance_squared(rift.pos) >= reach * reach {
        return false;
    }
    enter_bonus(state);
    true
}

/// Swap the outer world out for a fresh bonus room. The outer map, camera,
/// entities, palette and spawn plan all move into the snapshot; cash, lives
/// and the sim clock carry straight through.
fn enter_bonus(state: &mut GameState) {
    let now = state.time_ms;
    state.rift = None;

    let bonus_w = (state.view.w * 1.85).floor().max(1200.0);
    let bonus_h = (bonus_w * 0.75).floor().max(900.0);

    let snapshot = WorldSnapshot {
        map: std::mem::replace(&mut state.map, bonus_map(bonus_w, bonus_h)),
        camera: state.camera,
        player_pos: state.player.pos,
        enemies: std::mem::take(&mut state.enemies),
        bullets: std::mem::take(&mut state.bullets),
        powerups: std::mem::take(&mut state.powerups),
        effects: std::mem::take(&mut state.effects),
        colors: std::mem::take(&mut state.colors),
        spawn: std::mem::take(&mut state.spawn),
    };

    state.particles.clear();
    state.mode = GameMode::Bonus {
        ends_at_ms: now + BONUS_DURATION_MS,
        next_spawn_at_ms: now,
        snapshot: Box::new(snapshot),
    };

    state.player.pos = Vec2::new(state.map.w / 2.0, state.map.h / 2.0);
    state.player.invuln_until_ms = now + BONUS_ENTER_INVULN_MS;
    state.camera.center_on(state.player.pos, &state.view, &state.map);

    // No crystals in here, so any dock in progress is meaningless
    state.dock = DockState::Idle;
    state.dock_idle_since_ms = None;

    state.emit(SimEvent::BonusEntered);
}

/// Restore the outer world from the snapshot. Bonus-room leftovers
/// (enemies, bullets, pickups) are discarded wholesale.
pub fn exit_bonus(state: &mut GameState) {
    let GameMode::Bonus { snapshot, .. } = std::mem::replace(&mut state.mode, GameMode::Scroll)
    else {
        return;
    };
    let snap = *snapshot;
    let now = state.time_ms;

    state.map = snap.map;
    state.camera = snap.camera;
    state.player.pos = snap.player_pos;
    state.player.invuln_until_ms = now + BONUS_EXIT_INVULN_MS;
    state.enemies = snap.enemies;
    state.bullets = snap.bullets;
    state.powerups = snap.powerups;
    state.effects = snap.effects;
    state.colors = snap.colors;
    state.spawn = snap.spawn;
    state.particles.clear();

    state.emit(SimEvent::BonusEnded);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::spawn;
    use crate::sim::state::{GamePhase, WorldView};

    fn playing_state(seed: u64) -> GameState {
        let mut state = GameState::new(seed, WorldView::default());
        state.phase = GamePhase::Playing;
        state
    }

    #[test]
    fn spawned_rift_keeps_its_distance_when_placement_succeeds() {
        let mut state = playing_state(11);
        spawn_rift(&mut state);

        let rift = state.rift.unwrap();
        assert_eq!(rift.radius, RIFT_RADIUS * state.view.size_scale);
        assert_eq!(rift.expires_at_ms, state.time_ms + RIFT_LIFETIME_MS);
        assert!(state.drain_events().contains(&SimEvent::RiftOpened));

        let center = Vec2::new(state.map.w / 2.0, state.map.h / 2.0);
        if rift.pos != center {
            assert!(rift.pos.distance(state.player.pos) >= RIFT_MIN_PLAYER_DIST);
            assert!(circle_fits(rift.pos, rift.radius + 2.0, &state.map));
            let margin = rift.radius + RIFT_EDGE_MARGIN;
            assert!(rift.pos.x >= margin && rift.pos.x <= state.map.w - margin);
            assert!(rift.pos.y >= margin && rift.pos.y <= state.map.h - margin);
        }
    }

    #[test]
    fn entering_and_leaving_the_bonus_room_restores_the_outer_world() {
        let mut state = playing_state(3);
        spawn::plan_level(&mut state);
        state.drain_events();

        let outer_w = state.map.w;
        let outer_player = state.player.pos;
        let outer_ids: Vec<u32> = state.enemies.iter().map(|e| e.id).collect();
        let outer_palette = state.colors.palette.clone();
        assert!(!outer_ids.is_empty());

        state.rift = Some(Rift {
            pos: state.player.pos,
            radius: 18.0,
            expires_at_ms: state.time_ms + RIFT_LIFETIME_MS,
        });
        assert!(try_enter(&mut state));
        assert!(state.mode.is_bonus());
        assert!(state.rift.is_none());
        assert!(state.map.bonus);
        assert!(state.map.w >= 1200.0 && state.map.h >= 900.0);
        assert!(state.enemies.is_empty());
        assert!(state.colors.palette.is_empty());
        assert_eq!(
            state.player.pos,
            Vec2::new(state.map.w / 2.0, state.map.h / 2.0)
        );
        assert_eq!(
            state.player.invuln_until_ms,
            state.time_ms + BONUS_ENTER_INVULN_MS
        );
        assert!(state.drain_events().contains(&SimEvent::BonusEntered));

        // A second rift cannot stack while inside
        state.rift = Some(Rift {
            pos: state.player.pos,
            radius: 18.0,
            expires_at_ms: state.time_ms + RIFT_LIFETIME_MS,
        });
        assert!(!try_enter(&mut state));
        state.rift = None;

        // Litter the room, then let the timer lapse
        spawn::spawn_bonus_enemy(&mut state);
        spawn::spawn_bonus_enemy(&mut state);
        assert_eq!(state.enemies.len(), 2);

        state.time_ms += BONUS_DURATION_MS;
        update_expiry(&mut state);
        assert!(!state.mode.is_bonus());
        assert!(!state.map.bonus);
        assert_eq!(state.map.w, outer_w);
        assert_eq!(state.player.pos, outer_player);
        assert_eq!(
            state.enemies.iter().map(|e| e.id).collect::<Vec<_>>(),
            outer_ids
        );
        assert_eq!(state.colors.palette, outer_palette);
        assert_eq!(
            state.player.invuln_until_ms,
            state.time_ms + BONUS_EXIT_INVULN_MS
        );
        assert!(state.drain_events().contains(&SimEvent::BonusEnded));
    }

    #[test]
    fn a_rift_out_of_reach_is_not_entered() {
        let mut state = playing_state(2);
        state.rift = Some(Rift {
            pos: state.player.pos + Vec2::new(200.0, 0.0),
            radius: 18.0,
            expires_at_ms: state.time_ms + RIFT_LIFETIME_MS,
        });
        assert!(!try_enter(&mut state));
        assert!(!state.mode.is_bonus());
        assert!(state.rift.is_some());
    }

    #[test]
    fn an_unused_rift_expires_with_a_closure_notice() {
        let mut state = playing_state(5);
        state.rift = Some(Rift {
            pos: Vec2::new(400.0, 400.0),
            radius: 18.0,
            expires_at_ms: 500.0,
        });

        state.time_ms = 499.0;
        update_expiry(&mut state);
        assert!(state.rift.is_some());

        state.time_ms = 500.0;
        update_expiry(&mut state);
        assert!(state.rift.is_none());
        assert!(state.drain_events().contains(&SimEvent::RiftClosed));
    }

    #[test]
    fn the_next_rift_lands_six_to_ten_levels_out() {
        let mut state = playing_state(9);
        state.level = 4;
        schedule_next_rift(&mut state);
        assert!(state.next_rift_at_level >= 10);
        assert!(state.next_rift_at_level <= 14);
    }
}
