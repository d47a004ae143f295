//! Circle-vs-rectangle collision for the scroll map
//!
//! Every obstacle is an axis-aligned rectangle and every moving body is a
//! circle. Resolution is positional push-out only; callers decide what to do
//! with velocity (enemies slide, bullets reflect, the player just stops).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::map::MapData;

/// Axis-aligned rectangle in map coordinates, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Closest point on (or inside) the rectangle to `p`
    #[inline]
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.x, self.x + self.w),
            p.y.clamp(self.y, self.y + self.h),
        )
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.x + self.w && p.y >= self.y && p.y <= self.y + self.h
    }

    /// Overlap test with `pad` of extra clearance around `other`
    pub fn overlaps_padded(&self, other: &Rect, pad: f32) -> bool {
        self.x < other.x + other.w + pad
            && self.x + self.w + pad > other.x
            && self.y < other.y + other.h + pad
            && self.y + self.h + pad > other.y
    }
}

/// Result of a push-out resolution
#[derive(Debug, Clone, Copy)]
pub struct Resolution {
    pub pos: Vec2,
    pub hit: bool,
}

impl Resolution {
    fn miss(pos: Vec2) -> Self {
        Self { pos, hit: false }
    }
}

/// True when the circle overlaps the rectangle (strict, touching does not count)
#[inline]
pub fn circle_intersects_rect(center: Vec2, radius: f32, rect: &Rect) -> bool {
    rect.closest_point(center).distance_squared(center) < radius * radius
}

/// Minimal push-out of a circle from a rectangle
pub fn resolve_circle_rect(center: Vec2, radius: f32, rect: &Rect) -> Resolution {
    let closest = rect.closest_point(center);
    let delta = center - closest;
    let dist_sq = delta.length_squared();

    if dist_sq >= radius * radius {
        return Resolution::miss(center);
    }

    // Center sitting exactly on the closest point means it is inside the
    // rectangle; escape through the nearest face instead.
    if dist_sq < 1e-8 {
        let left = (center.x - rect.x).abs();
        let right = (rect.x + rect.w - center.x).abs();
        let top = (center.y - rect.y).abs();
        let bottom = (rect.y + rect.h - center.y).abs();

        let min_pen = left.min(right).min(top).min(bottom);
        let pos = if min_pen == left {
            Vec2::new(rect.x - radius, center.y)
        } else if min_pen == right {
            Vec2::new(rect.x + rect.w + radius, center.y)
        } else if min_pen == top {
            Vec2::new(center.x, rect.y - radius)
        } else {
            Vec2::new(center.x, rect.y + rect.h + radius)
        };
        return Resolution { pos, hit: true };
    }

    let dist = dist_sq.sqrt();
    let push = radius - dist;
    Resolution {
        pos: center + delta / dist * push,
        hit: true,
    }
}

/// Push a circle out of every obstacle on the map, keeping it in bounds.
///
/// Two passes so corner push-outs that land inside a neighboring obstacle get
/// resolved again.
pub fn resolve_circle_obstacles(center: Vec2, radius: f32, map: &MapData) -> Resolution {
    let mut pos = center;
    let mut hit = false;

    let max_x = radius.max(map.w - radius);
    let max_y = radius.max(map.h - radius);

    for _pass in 0..2 {
        pos.x = pos.x.clamp(radius, max_x);
        pos.y = pos.y.clamp(radius, max_y);
        for obstacle in &map.obstacles {
            let res = resolve_circle_rect(pos, radius, &obstacle.rect);
            if res.hit {
                pos = res.pos;
                hit = true;
                // An obstacle can shove us past the map edge; pull back in.
                pos.x = pos.x.clamp(radius, max_x);
                pos.y = pos.y.clamp(radius, max_y);
            }
        }
    }

    pos.x = pos.x.clamp(radius, max_x);
    pos.y = pos.y.clamp(radius, max_y);
    Resolution { pos, hit }
}

/// True when the circle overlaps no obstacle at all
pub fn circle_fits(center: Vec2, radius: f32, map: &MapData) -> bool {
    map.obstacles
        .iter()
        .all(|o| !circle_intersects_rect(center, radius, &o.rect))
}

/// Distance from `p` to the segment `a`..`b`
pub fn distance_point_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let ap = p - a;

    let ab_len_sq = ab.length_squared();
    if ab_len_sq <= 1e-6 {
        return ap.length();
    }

    let t = (ap.dot(ab) / ab_len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).length()
}

/// End point where a ray from `origin` along `dir` exits the map bounds.
///
/// `dir` must not be the zero vector.
pub fn ray_to_bounds(origin: Vec2, dir: Vec2, bounds_w: f32, bounds_h: f32) -> Vec2 {
    const EPS: f32 = 1e-6;
    let mut t_min = f32::INFINITY;

    if dir.x.abs() > EPS {
        for wall_x in [0.0, bounds_w] {
            let t = (wall_x - origin.x) / dir.x;
            if t > 0.0 {
                t_min = t_min.min(t);
            }
        }
    }
    if dir.y.abs() > EPS {
        for wall_y in [0.0, bounds_h] {
            let t = (wall_y - origin.y) / dir.y;
            if t > 0.0 {
                t_min = t_min.min(t);
            }
        }
    }

    if t_min.is_finite() {
        origin + dir * t_min
    } else {
        origin
    }
}

/// Reflect a velocity off an axis-aligned surface normal
#[inline]
pub fn reflect_axis_aligned(vel: Vec2, normal: Vec2) -> Vec2 {
    Vec2::new(
        if normal.x != 0.0 { -vel.x } else { vel.x },
        if normal.y != 0.0 { -vel.y } else { vel.y },
    )
}
