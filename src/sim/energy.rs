//! Energy dock state machine
//!
//! Recharging happens at crystal-bearing obstacles in three phases: the
//! player holds still within reach, a connection locks on after a short
//! delay, then a recharge field tops energy up while the player stays
//! inside its circle. Any real movement intent cancels an in-flight dock.

use glam::Vec2;

use super::collision::circle_intersects_rect;
use super::state::{DockState, GameState, SimEvent};
use crate::consts::*;

/// A dockable obstacle within reach
#[derive(Debug, Clone, Copy)]
struct DockTarget {
    obstacle: usize,
    center: Vec2,
    field_radius: f32,
}

/// Advance the dock machine by one tick.
///
/// `dock_requested` is the edge-triggered manual dock key; auto-dock paths
/// run regardless. In bonus rooms there are no crystals, so any dock in
/// progress is dropped silently.
pub fn update_dock(state: &mut GameState, wants_move: bool, dock_requested: bool) {
    let now = state.time_ms;

    if state.mode.is_bonus() {
        if !state.dock.is_idle() {
            state.dock = DockState::Idle;
        }
        state.dock_idle_since_ms = None;
        return;
    }

    match state.dock {
        DockState::Idle => update_idle(state, now, wants_move, dock_requested),
        DockState::Connecting {
            obstacle,
            center,
            field_radius,
            ends_at_ms,
        } => {
            // Moving or losing contact with the asteroid breaks the link
            if wants_move || !touching_dock_obstacle(state, obstacle) {
                state.dock = DockState::Idle;
                state.emit(SimEvent::DockAborted);
                return;
            }
            if now >= ends_at_ms {
                state.dock = DockState::Charging {
                    obstacle,
                    center,
                    field_radius,
                    started_at_ms: now,
                    start_energy: state.player.energy,
                    ends_at_ms: now + DOCK_RECHARGE_MS,
                };
                state.emit(SimEvent::DockFieldOnline);
            }
        }
        DockState::Charging {
            center,
            field_radius,
            started_at_ms,
            start_energy,
            ends_at_ms,
            ..
        } => {
            if state.player.pos.distance_squared(center) > field_radius * field_radius {
                state.dock = DockState::Idle;
                state.emit(SimEvent::DockConnectionLost);
                return;
            }

            // Inside the field, energy ramps toward the halfway cap; only
            // staying for the full window grants the jump to 100%.
            let cap = ENERGY_MAX * 0.5;
            let ramp_ms = DOCK_RECHARGE_MS * 0.5;
            let elapsed = (now - started_at_ms).max(0.0);
            let t = (elapsed / ramp_ms.max(1.0)).clamp(0.0, 1.0);
            let ramp_target = if start_energy >= cap {
                start_energy
            } else {
                start_energy + (cap - start_energy) * t
            };
            state.player.energy = state.player.energy.max(ramp_target.min(cap));

            if now >= ends_at_ms {
                state.player.energy = ENERGY_MAX;
                state.full_charge_fx_until_ms =
                    state.full_charge_fx_until_ms.max(now + FULL_CHARGE_FX_MS);
                state.dock = DockState::Idle;
                state.emit(SimEvent::EnergyFull);
            }
        }
    }
}

fn update_idle(state: &mut GameState, now: f32, wants_move: bool, dock_requested: bool) {
    let target = find_dock_target(state);

    if dock_requested {
        if let (Some(t), true) = (target, state.player.energy < ENERGY_MAX - 0.01) {
            start_dock(state, t, now);
            return;
        }
        state.emit(SimEvent::DockUnavailable);
    }

    let can_dock_here = target.is_some() && state.player.energy < ENERGY_MAX - 0.01;
    if !can_dock_here {
        state.dock_idle_since_ms = None;
        return;
    }

    if state.view.touch {
        // Touch layouts auto-dock while resting against the asteroid
        // itself. The debounce filters accidental edge slides.
        match find_touch_target(state) {
            Some(t) if !wants_move => {
                let since = *state.dock_idle_since_ms.get_or_insert(now);
                if now - since >= DOCK_TOUCH_DEBOUNCE_MS {
                    start_dock(state, t, now);
                }
            }
            _ => state.dock_idle_since_ms = None,
        }
    } else {
        // Desktop auto-dock is a low-energy assist only
        let ratio = (state.player.energy / ENERGY_MAX).clamp(0.0, 1.0);
        if ratio <= ENERGY_AUTO_DOCK_THRESHOLD && !wants_move {
            let since = *state.dock_idle_since_ms.get_or_insert(now);
            if now - since >= DOCK_IDLE_MS {
                if let Some(t) = target {
                    start_dock(state, t, now);
                }
            }
        } else {
            state.dock_idle_since_ms = None;
        }
    }
}

fn start_dock(state: &mut GameState, target: DockTarget, now: f32) {
    state.dock = DockState::Connecting {
        obstacle: target.obstacle,
        center: target.center,
        field_radius: target.field_radius,
        ends_at_ms: now + DOCK_CONNECT_MS,
    };
    state.dock_idle_since_ms = None;
    state.emit(SimEvent::DockConnecting);
}

/// Nearest crystal obstacle within manual dock reach
fn find_dock_target(state: &GameState) -> Option<DockTarget> {
    nearest_crystal_target(state, state.player.radius + DOCK_RANGE)
}

/// Nearest crystal obstacle the player is physically touching
fn find_touch_target(state: &GameState) -> Option<DockTarget> {
    nearest_crystal_target(state, state.player.radius + DOCK_RANGE_TOUCH_PAD)
}

fn nearest_crystal_target(state: &GameState, reach: f32) -> Option<DockTarget> {
    let mut best: Option<DockTarget> = None;
    let mut best_d2 = f32::INFINITY;

    for (i, obstacle) in state.map.obstacles.iter().enumerate() {
        if state.map.is_border_obstacle(obstacle) {
            continue;
        }
        let Some(deposit) = obstacle.deposit else {
            continue;
        };
        if !circle_intersects_rect(state.player.pos, reach, &obstacle.rect) {
            continue;
        }

        let center = obstacle.rect.center();
        let d2 = state.player.pos.distance_squared(center);
        if d2 < best_d2 {
            best_d2 = d2;
            best = Some(DockTarget {
                obstacle: i,
                center,
                field_radius: deposit.field_radius,
            });
        }
    }

    best
}

/// The connection survives only while the host obstacle still exists, still
/// carries crystals, and the player remains in contact.
fn touching_dock_obstacle(state: &GameState, index: usize) -> bool {
    let Some(obstacle) = state.map.obstacles.get(index) else {
        return false;
    };
    if obstacle.deposit.is_none() {
        return false;
    }
    circle_intersects_rect(
        state.player.pos,
        state.player.radius + DOCK_RANGE_TOUCH_PAD,
        &obstacle.rect,
    )
}

/// Drain movement fuel. Charging suspends the cost, bonus rooms are free,
/// and idle hovering never drains.
pub fn apply_drain(state: &mut GameState, wants_move: bool, dt_seconds: f32) {
    if state.dock.is_charging() || state.mode.is_bonus() {
        return;
    }
    if !wants_move || state.player.energy <= 0.0 {
        return;
    }
    let drain = ENERGY_DRAIN_PER_SEC * state.trophies.energy_drain_mult * dt_seconds;
    state.player.energy = (state.player.energy - drain).max(0.0);
}

/// Out of fuel the ship limps; the charge field suspends the penalty so the
/// player is never stranded mid-recharge.
pub fn speed_multiplier(state: &GameState) -> f32 {
    if !state.dock.is_charging() && state.player.energy <= 0.0001 {
        ENERGY_EMPTY_SPEED_MULT
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::map::{CrystalDeposit, MapData, Obstacle, ObstacleKind};
    use crate::sim::state::{GameMode, GamePhase, WorldSnapshot, WorldView};
    use crate::sim::collision::Rect;
    use proptest::prelude::*;

    /// Player resting against a single crystal crate, well inside its field
    fn dock_ready_state() -> GameState {
        let mut state = GameState::new(7, WorldView::default());
        state.phase = GamePhase::Playing;
        state.map = MapData {
            w: 2400.0,
            h: 1800.0,
            bonus: false,
            obstacles: vec![Obstacle {
                rect: Rect::new(100.0, 100.0, 40.0, 30.0),
                kind: ObstacleKind::Crate,
                deposit: Some(CrystalDeposit {
                    count: 2,
                    field_radius: 150.0,
                }),
            }],
        };
        state.player.pos = Vec2::new(95.0, 110.0);
        state.player.radius = 10.0;
        state
    }

    #[test]
    fn full_recharge_reaches_max_and_raises_the_fx_flag_once() {
        let mut state = dock_ready_state();
        state.player.energy = 40.0;

        update_dock(&mut state, false, true);
        assert!(matches!(state.dock, DockState::Connecting { .. }));
        assert!(state.drain_events().contains(&SimEvent::DockConnecting));

        state.time_ms += DOCK_CONNECT_MS;
        update_dock(&mut state, false, false);
        assert!(state.dock.is_charging());
        assert!(state.drain_events().contains(&SimEvent::DockFieldOnline));

        // Half the window finishes the ramp at the halfway cap
        state.time_ms += DOCK_RECHARGE_MS * 0.5;
        update_dock(&mut state, false, false);
        assert!((state.player.energy - ENERGY_MAX * 0.5).abs() < 1e-3);

        // The full window jumps straight to max
        state.time_ms += DOCK_RECHARGE_MS * 0.5;
        update_dock(&mut state, false, false);
        assert!(state.dock.is_idle());
        assert_eq!(state.player.energy, ENERGY_MAX);
        assert_eq!(
            state.full_charge_fx_until_ms,
            state.time_ms + FULL_CHARGE_FX_MS
        );
        let fulls = state
            .drain_events()
            .iter()
            .filter(|e| matches!(e, SimEvent::EnergyFull))
            .count();
        assert_eq!(fulls, 1);
    }

    #[test]
    fn moving_during_connect_aborts_with_energy_unchanged() {
        let mut state = dock_ready_state();
        state.player.energy = 30.0;
        update_dock(&mut state, false, true);
        assert!(matches!(state.dock, DockState::Connecting { .. }));
        state.drain_events();

        state.time_ms += 500.0;
        update_dock(&mut state, true, false);
        assert!(state.dock.is_idle());
        assert_eq!(state.player.energy, 30.0);
        assert!(state.drain_events().contains(&SimEvent::DockAborted));
    }

    #[test]
    fn leaving_the_field_freezes_energy_where_it_was() {
        let mut state = dock_ready_state();
        state.player.energy = 20.0;
        update_dock(&mut state, false, true);
        state.time_ms += DOCK_CONNECT_MS;
        update_dock(&mut state, false, false);
        assert!(state.dock.is_charging());

        state.time_ms += 1000.0;
        update_dock(&mut state, false, false);
        let ramped = state.player.energy;
        assert!((ramped - 35.0).abs() < 1e-3);

        state.player.pos = Vec2::new(800.0, 800.0);
        state.time_ms += 100.0;
        update_dock(&mut state, false, false);
        assert!(state.dock.is_idle());
        assert!(state.drain_events().contains(&SimEvent::DockConnectionLost));

        state.time_ms += 2000.0;
        update_dock(&mut state, false, false);
        assert_eq!(state.player.energy, ramped);
    }

    #[test]
    fn desktop_auto_dock_waits_out_the_idle_window() {
        let mut state = dock_ready_state();
        state.player.energy = 20.0;

        update_dock(&mut state, false, false);
        assert!(state.dock.is_idle());
        assert_eq!(state.dock_idle_since_ms, Some(0.0));

        state.time_ms += DOCK_IDLE_MS - 10.0;
        update_dock(&mut state, false, false);
        assert!(state.dock.is_idle());

        state.time_ms += 10.0;
        update_dock(&mut state, false, false);
        assert!(matches!(state.dock, DockState::Connecting { .. }));
    }

    #[test]
    fn movement_resets_the_auto_dock_countdown() {
        let mut state = dock_ready_state();
        state.player.energy = 20.0;

        update_dock(&mut state, false, false);
        state.time_ms += 400.0;
        update_dock(&mut state, true, false);
        assert_eq!(state.dock_idle_since_ms, None);

        // A fresh countdown starts from the next still tick
        state.time_ms += 400.0;
        update_dock(&mut state, false, false);
        assert!(state.dock.is_idle());
        assert_eq!(state.dock_idle_since_ms, Some(state.time_ms));
    }

    #[test]
    fn desktop_auto_dock_needs_low_energy() {
        let mut state = dock_ready_state();
        state.player.energy = 60.0;

        update_dock(&mut state, false, false);
        state.time_ms += DOCK_IDLE_MS * 3.0;
        update_dock(&mut state, false, false);
        assert!(state.dock.is_idle());
    }

    #[test]
    fn touch_layout_docks_on_contact_after_the_debounce() {
        let mut state = dock_ready_state();
        state.view.touch = true;
        state.player.energy = 90.0;

        update_dock(&mut state, false, false);
        assert!(state.dock.is_idle());

        state.time_ms += DOCK_TOUCH_DEBOUNCE_MS;
        update_dock(&mut state, false, false);
        assert!(matches!(state.dock, DockState::Connecting { .. }));
    }

    #[test]
    fn request_out_of_reach_or_at_full_energy_is_unavailable() {
        let mut state = dock_ready_state();
        state.player.pos = Vec2::new(600.0, 600.0);
        state.player.energy = 10.0;
        update_dock(&mut state, false, true);
        assert!(state.dock.is_idle());
        assert!(state.drain_events().contains(&SimEvent::DockUnavailable));

        let mut state = dock_ready_state();
        state.player.energy = ENERGY_MAX;
        update_dock(&mut state, false, true);
        assert!(state.dock.is_idle());
        assert!(state.drain_events().contains(&SimEvent::DockUnavailable));
    }

    #[test]
    fn bonus_mode_drops_an_in_flight_dock() {
        let mut state = dock_ready_state();
        state.player.energy = 30.0;
        update_dock(&mut state, false, true);
        assert!(!state.dock.is_idle());

        let snapshot = WorldSnapshot {
            map: state.map.clone(),
            camera: state.camera,
            player_pos: state.player.pos,
            enemies: Vec::new(),
            bullets: Vec::new(),
            powerups: Vec::new(),
            effects: state.effects.clone(),
            colors: state.colors.clone(),
            spawn: state.spawn.clone(),
        };
        state.mode = GameMode::Bonus {
            ends_at_ms: state.time_ms + 20_000.0,
            next_spawn_at_ms: 0.0,
            snapshot: Box::new(snapshot),
        };

        update_dock(&mut state, false, false);
        assert!(state.dock.is_idle());
        assert_eq!(state.dock_idle_since_ms, None);
    }

    #[test]
    fn drain_applies_only_to_live_movement() {
        let mut state = dock_ready_state();
        state.player.energy = 50.0;

        apply_drain(&mut state, false, 1.0);
        assert_eq!(state.player.energy, 50.0);

        apply_drain(&mut state, true, 1.0);
        assert_eq!(state.player.energy, 50.0 - ENERGY_DRAIN_PER_SEC);

        state.player.energy = 1.0;
        apply_drain(&mut state, true, 10.0);
        assert_eq!(state.player.energy, 0.0);
        assert_eq!(speed_multiplier(&state), ENERGY_EMPTY_SPEED_MULT);
    }

    #[test]
    fn charging_suspends_drain_and_the_empty_penalty() {
        let mut state = dock_ready_state();
        state.player.energy = 0.0;
        state.dock = DockState::Charging {
            obstacle: 0,
            center: Vec2::new(120.0, 115.0),
            field_radius: 150.0,
            started_at_ms: 0.0,
            start_energy: 0.0,
            ends_at_ms: DOCK_RECHARGE_MS,
        };

        apply_drain(&mut state, true, 1.0);
        assert_eq!(state.player.energy, 0.0);
        assert_eq!(speed_multiplier(&state), 1.0);
    }

    proptest! {
        #[test]
        fn prop_energy_stays_in_range_under_any_inputs(
            start in 0.0f32..100.0,
            steps in prop::collection::vec(
                (any::<bool>(), any::<bool>(), 1u32..2000),
                1..60,
            ),
        ) {
            let mut state = dock_ready_state();
            state.player.energy = start;
            for (wants_move, request, dt_ms) in steps {
                let dt_ms = dt_ms as f32;
                state.time_ms += dt_ms;
                update_dock(&mut state, wants_move, request);
                apply_drain(&mut state, wants_move, dt_ms / 1000.0);
                prop_assert!(state.player.energy >= 0.0);
                prop_assert!(state.player.energy <= ENERGY_MAX);
                state.drain_events();
            }
        }
    }
}
