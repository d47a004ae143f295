//! Procedural scroll-map generation
//!
//! Maps are built from axis-aligned obstacle rectangles: four border walls
//! plus a scatter of smaller props. Layout is a pure function of the map
//! dimensions so a given viewport size always reproduces the same map, and
//! crystal deposits (docking targets) are derived from obstacle geometry so
//! they stay put across sessions.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::Rect;
use crate::consts::{FIELD_RADIUS_MAX, FIELD_RADIUS_MIN, FIELD_RADIUS_SCALE, MAP_BORDER};

/// Clear cross through the map center so play never gets walled off
const BOULEVARD_WIDTH: f32 = 300.0;
/// Props keep this far from the map center (player spawn)
const SPAWN_SAFE_RADIUS: f32 = 220.0;
/// Minimum clearance between placed props
const PROP_PAD: f32 = 10.0;
const PLACEMENT_TRIES: u32 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObstacleKind {
    Border,
    #[default]
    Crate,
    Kiosk,
    Vent,
    Dumpster,
    Bollards,
    Barrier,
    Car,
}

/// A crystal-bearing obstacle can be docked at for energy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrystalDeposit {
    /// 1..=3 crystals
    pub count: u32,
    /// Radius of the energy field around the obstacle center
    pub field_radius: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub rect: Rect,
    pub kind: ObstacleKind,
    /// `Some` only for dockable crystal asteroids
    pub deposit: Option<CrystalDeposit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub w: f32,
    pub h: f32,
    /// Bonus rooms are border-only boxes with their own rules
    pub bonus: bool,
    pub obstacles: Vec<Obstacle>,
}

impl MapData {
    /// Border walls and map-spanning rectangles never carry deposits
    pub fn is_border_obstacle(&self, obstacle: &Obstacle) -> bool {
        obstacle.kind == ObstacleKind::Border
            || obstacle.rect.w > self.w * 0.8
            || obstacle.rect.h > self.h * 0.8
    }
}

/// xorshift32 seeded from the map dimensions
struct LayoutRng {
    state: u32,
}

impl LayoutRng {
    fn from_dims(w: f32, h: f32) -> Self {
        let seed = (w as u32).wrapping_mul(73_856_093)
            ^ (h as u32).wrapping_mul(19_349_663)
            ^ 0x9e37_79b9;
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        let mut s = self.state;
        s ^= s << 13;
        s ^= s >> 17;
        s ^= s << 5;
        self.state = s;
        s
    }

    /// Uniform in [0, 1), from the top 24 bits so the f32 result can never
    /// round up to 1.0
    fn unit(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / 16_777_216.0
    }
}

/// Prop archetypes; placement jitters each by a few pixels
const PROP_TYPES: [(ObstacleKind, f32, f32); 8] = [
    (ObstacleKind::Crate, 30.0, 26.0),
    (ObstacleKind::Crate, 34.0, 30.0),
    (ObstacleKind::Kiosk, 38.0, 38.0),
    (ObstacleKind::Vent, 44.0, 28.0),
    (ObstacleKind::Dumpster, 54.0, 34.0),
    (ObstacleKind::Bollards, 52.0, 16.0),
    (ObstacleKind::Barrier, 64.0, 18.0),
    (ObstacleKind::Car, 86.0, 46.0),
];

fn border_walls(w: f32, h: f32) -> Vec<Obstacle> {
    let b = MAP_BORDER;
    [
        Rect::new(0.0, 0.0, w, b),
        Rect::new(0.0, h - b, w, b),
        Rect::new(0.0, 0.0, b, h),
        Rect::new(w - b, 0.0, b, h),
    ]
    .into_iter()
    .map(|rect| Obstacle {
        rect,
        kind: ObstacleKind::Border,
        deposit: None,
    })
    .collect()
}

/// Generate the scrolling play map for the given dimensions.
///
/// Props avoid the central boulevard cross, the spawn-safe circle around the
/// center, and each other. Placement gives up after a bounded number of
/// rejection-sampling tries so degenerate dimensions still terminate.
pub fn generate_map(w: f32, h: f32) -> MapData {
    let mut obstacles = border_walls(w, h);

    let center = Vec2::new(w / 2.0, h / 2.0);
    let mut rng = LayoutRng::from_dims(w, h);

    let prop_count = ((w as f64 * h as f64) / 90_000.0).clamp(24.0, 80.0).floor() as usize;

    let mut placed = 0;
    let mut tries = 0;
    while placed < prop_count && tries < PLACEMENT_TRIES {
        tries += 1;

        let (kind, base_w, base_h) = PROP_TYPES[(rng.unit() * PROP_TYPES.len() as f32) as usize];
        let rw = base_w + (rng.unit() * 8.0).floor();
        let rh = base_h + (rng.unit() * 8.0).floor();

        // Stay clear of the border walls.
        let margin = MAP_BORDER + 12.0;
        let x = (margin + rng.unit() * (w - margin * 2.0 - rw)).floor();
        let y = (margin + rng.unit() * (h - margin * 2.0 - rh)).floor();
        let rect = Rect::new(x, y, rw, rh);

        let prop_center = rect.center();
        if (prop_center.x - center.x).abs() < BOULEVARD_WIDTH / 2.0 {
            continue;
        }
        if (prop_center.y - center.y).abs() < BOULEVARD_WIDTH / 2.0 {
            continue;
        }
        if prop_center.distance(center) < SPAWN_SAFE_RADIUS {
            continue;
        }

        if obstacles
            .iter()
            .any(|o| rect.overlaps_padded(&o.rect, PROP_PAD))
        {
            continue;
        }

        obstacles.push(Obstacle {
            rect,
            kind,
            deposit: None,
        });
        placed += 1;
    }

    // Clip everything into the map just in case jitter pushed an edge out.
    for obstacle in &mut obstacles {
        let r = &mut obstacle.rect;
        r.x = r.x.clamp(0.0, w);
        r.y = r.y.clamp(0.0, h);
        r.w = r.w.clamp(0.0, w - r.x);
        r.h = r.h.clamp(0.0, h - r.y);
    }

    let mut map = MapData {
        w,
        h,
        bonus: false,
        obstacles,
    };
    assign_deposits(&mut map);

    log::debug!(
        "generated map {}x{} with {} obstacles ({} dockable)",
        w,
        h,
        map.obstacles.len(),
        map.obstacles.iter().filter(|o| o.deposit.is_some()).count()
    );

    map
}

/// Border-only box for the bonus room
pub fn bonus_map(w: f32, h: f32) -> MapData {
    MapData {
        w,
        h,
        bonus: true,
        obstacles: border_walls(w, h),
    }
}

/// splitmix64 finalizer
fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Roll a unit float for an obstacle from its center and list index.
///
/// Centers are quantized to tenths of a pixel so float noise from map
/// regeneration cannot flip a deposit on or off.
fn deposit_roll(rect: &Rect, index: usize) -> f32 {
    let center = rect.center();
    let qx = (center.x * 10.0).round() as i64 as u64;
    let qy = (center.y * 10.0).round() as i64 as u64;
    let h = mix64(
        qx.wrapping_mul(73_856_093)
            ^ qy.wrapping_mul(19_349_663)
            ^ (index as u64).wrapping_mul(83_492_791),
    );
    (h >> 40) as f32 / 16_777_216.0
}

fn assign_deposits(map: &mut MapData) {
    let dims = (map.w, map.h);
    for i in 0..map.obstacles.len() {
        let obstacle = &map.obstacles[i];
        if obstacle.kind == ObstacleKind::Border
            || obstacle.rect.w > dims.0 * 0.8
            || obstacle.rect.h > dims.1 * 0.8
        {
            continue;
        }

        let roll = deposit_roll(&obstacle.rect, i);
        let count = if roll > 0.72 {
            3
        } else if roll > 0.58 {
            2
        } else if roll > 0.48 {
            1
        } else {
            0
        };
        if count == 0 {
            continue;
        }

        let rect = obstacle.rect;
        let ow = rect.w.max(1.0);
        let oh = rect.h.max(1.0);
        let field_radius =
            (ow.min(oh) * FIELD_RADIUS_SCALE).clamp(FIELD_RADIUS_MIN, FIELD_RADIUS_MAX);

        map.obstacles[i].deposit = Some(CrystalDeposit {
            count,
            field_radius,
        });
    }
}
