//! Soft-body outline dynamics for yolk enemies
//!
//! Each enemy carries a ring of spring-loaded radial nodes. Per frame every
//! node chases a target radius built from breathing noise, a fixed per-creature
//! asymmetry, and a velocity squish (front compresses, back stretches). The
//! springs give the overshoot that makes the outline feel gelatinous.

use glam::Vec2;
use serde::{Deserialize, Serialize};

const NODES_MIN: u32 = 10;
const NODES_MAX: u32 = 28;

const SPRING_K: f32 = 0.22;
const SPRING_DAMPING: f32 = 0.72;

/// Target radius stays inside this band of the rest radius
const TARGET_MIN: f32 = 0.70;
const TARGET_MAX: f32 = 1.38;

/// Squish amount per unit of speed, capped at a fraction of the rest radius
const SQUISH_PER_SPEED: f32 = 2.2;
const SQUISH_CAP: f32 = 0.45;

/// Per-creature shape parameters, rolled once at spawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlobParams {
    pub nodes: u32,
    /// Phase seed so identical tiers still wobble out of sync
    pub seed: f32,
    pub noise_scale: f32,
    pub squish_scale: f32,
    pub bias_angle: f32,
    pub bias_mag: f32,
    pub noise_mul_a: f32,
    pub noise_mul_b: f32,
    pub noise_time_a: f32,
    pub noise_time_b: f32,
}

impl Default for BlobParams {
    fn default() -> Self {
        Self {
            nodes: 18,
            seed: 0.0,
            noise_scale: 1.0,
            squish_scale: 1.0,
            bias_angle: 0.0,
            bias_mag: 0.0,
            noise_mul_a: 2.4,
            noise_mul_b: 4.2,
            noise_time_a: 340.0,
            noise_time_b: 190.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlobNode {
    /// Fixed angle around the body
    pub angle: f32,
    /// Current radius
    pub r: f32,
    /// Radial velocity
    pub vr: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlobShape {
    pub params: BlobParams,
    /// Rebuilt lazily whenever the node count disagrees with `params`
    #[serde(skip)]
    pub nodes: Vec<BlobNode>,
}

impl BlobShape {
    pub fn new(params: BlobParams) -> Self {
        Self {
            params,
            nodes: Vec::new(),
        }
    }

    fn rebuild(&mut self, radius: f32) {
        let count = self.params.nodes.clamp(NODES_MIN, NODES_MAX) as usize;
        self.nodes = (0..count)
            .map(|i| BlobNode {
                angle: (i as f32 / count as f32) * std::f32::consts::TAU,
                r: radius,
                vr: 0.0,
            })
            .collect();
    }

    /// Advance the node springs one tick.
    ///
    /// `vel` is the body's velocity in px per frame; `time_ms` is the sim
    /// clock driving the breathing noise.
    pub fn update(&mut self, radius: f32, vel: Vec2, time_ms: f32, dt_frames: f32) {
        let desired = self.params.nodes.clamp(NODES_MIN, NODES_MAX) as usize;
        if self.nodes.len() != desired {
            self.rebuild(radius);
        }

        let r0 = radius;
        let p = &self.params;

        let speed = vel.length();
        let dir = if speed > 1e-4 { vel / speed } else { Vec2::ZERO };

        let squish_scale = p.squish_scale.clamp(0.5, 1.25);
        let squish = (speed * SQUISH_PER_SPEED * squish_scale).clamp(0.0, r0 * SQUISH_CAP);

        let bias_mag = p.bias_mag.clamp(0.0, 0.14);
        let noise_scale = p.noise_scale.clamp(0.65, 1.35);
        let mul_a = p.noise_mul_a.clamp(1.6, 3.6);
        let mul_b = p.noise_mul_b.clamp(3.2, 6.0);
        let time_a = p.noise_time_a.clamp(240.0, 520.0);
        let time_b = p.noise_time_b.clamp(140.0, 340.0);

        for node in &mut self.nodes {
            let normal = Vec2::new(node.angle.cos(), node.angle.sin());

            // Front compresses, back stretches.
            let align = normal.dot(dir);
            let stretch = -align * squish;

            // Two slow sines so the body keeps breathing while parked.
            let noise = noise_scale
                * (0.16 * (time_ms / time_a + p.seed * 0.9 + node.angle * mul_a).sin()
                    + 0.10 * (time_ms / time_b + p.seed * 1.7 + node.angle * mul_b).sin());

            let asym = r0 * bias_mag * (node.angle - p.bias_angle).cos();
            let target =
                (r0 * (1.0 + noise) + asym + stretch).clamp(r0 * TARGET_MIN, r0 * TARGET_MAX);

            let accel = (target - node.r) * SPRING_K;
            node.vr = node.vr * SPRING_DAMPING + accel * dt_frames;
            node.r += node.vr * dt_frames;
        }
    }

    /// Outline points in map coordinates, for renderers
    pub fn outline_points(&self, center: Vec2) -> Vec<Vec2> {
        self.nodes
            .iter()
            .map(|n| center + Vec2::new(n.angle.cos(), n.angle.sin()) * n.r)
            .collect()
    }
}
