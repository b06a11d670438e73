//! Packing structure footprints into a circular resource zone.
//!
//! Each footprint gets a uniformly random position inside the circle, then
//! footprints are settled in order of distance from the center. A footprint
//! overlapping an already settled one is pushed straight away from the
//! center until it is clear. The radius only grows.

use std::f64::consts::TAU;

use glam::DVec3;
use haven_math::{AabbList, Cuboid, Vec3i};
use haven_world::Persistent;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Zone-relative placement of a set of footprints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceZonePlan {
    center: Vec3i,
    radius: f64,
    /// Offset of each footprint's local origin, relative to `center`.
    offsets: Vec<Vec3i>,
}

impl ResourceZonePlan {
    /// Packs `footprints` (plan outlines at y = 0) into a circle of at least
    /// `min_radius` around the origin.
    pub fn new<R: Rng + ?Sized>(footprints: &[&AabbList], min_radius: f64, rng: &mut R) -> Self {
        let mut plan = Self {
            center: Vec3i::ZERO,
            radius: min_radius.max(0.0),
            offsets: Vec::with_capacity(footprints.len()),
        };
        let bounds: Vec<Cuboid> = footprints
            .iter()
            .map(|f| f.bounds().unwrap_or(Cuboid::new(Vec3i::ZERO, Vec3i::ZERO)))
            .collect();

        for b in &bounds {
            let s = b.size();
            let half_diagonal = (s.x as f64).hypot(s.z as f64) / 2.0;
            plan.radius = plan.radius.max(half_diagonal);
        }

        let centers: Vec<(f64, f64)> = bounds
            .iter()
            .map(|b| sample_center(b, plan.radius, rng))
            .collect();
        plan.offsets = bounds
            .iter()
            .zip(&centers)
            .map(|(b, &(cx, cz))| {
                let s = b.size();
                let local_center = (b.min.x as f64 + s.x as f64 / 2.0, b.min.z as f64 + s.z as f64 / 2.0);
                Vec3i::new((cx - local_center.0).round() as i32, 0, (cz - local_center.1).round() as i32)
            })
            .collect();

        let mut order: Vec<usize> = (0..footprints.len()).collect();
        order.sort_by(|&a, &b| {
            let da = centers[a].0.hypot(centers[a].1);
            let db = centers[b].0.hypot(centers[b].1);
            da.total_cmp(&db)
        });

        let mut settled: Vec<usize> = Vec::with_capacity(order.len());
        for &i in &order {
            let pushes = plan.settle(footprints, &settled, i);
            if pushes > 0 {
                debug!(index = i, pushes, offset = %plan.offsets[i], "footprint pushed clear");
            }
            let placed = bounds[i].translated(plan.offsets[i]);
            plan.expand_radius_if_necessary(&placed);
            settled.push(i);
        }
        plan
    }

    /// Push footprint `i` away from the center until it overlaps none of
    /// `settled`. Returns the number of pushes.
    fn settle(&mut self, footprints: &[&AabbList], settled: &[usize], i: usize) -> u32 {
        let direction = self.push_direction(footprints[i], i);
        let mut pushes = 0;
        loop {
            let mut moved = false;
            for &j in settled {
                let mut relative = self.offsets[i] - self.offsets[j];
                if footprints[j].avoid_intersection(footprints[i], &mut relative, direction) {
                    self.offsets[i] = self.offsets[j] + relative;
                    moved = true;
                    pushes += 1;
                }
            }
            if !moved {
                return pushes;
            }
        }
    }

    fn push_direction(&self, footprint: &AabbList, i: usize) -> DVec3 {
        let Some(b) = footprint.bounds() else {
            return DVec3::X;
        };
        let s = b.size();
        let cx = self.offsets[i].x as f64 + b.min.x as f64 + s.x as f64 / 2.0;
        let cz = self.offsets[i].z as f64 + b.min.z as f64 + s.z as f64 / 2.0;
        let dir = DVec3::new(cx, 0.0, cz);
        if dir.length_squared() < 1e-9 {
            DVec3::X
        } else {
            dir.normalize()
        }
    }

    /// Grow the radius so that `bounds` (zone-relative) lies inside the
    /// circle. Returns whether the radius changed.
    pub fn expand_radius_if_necessary(&mut self, bounds: &Cuboid) -> bool {
        let needed = corner_distance(bounds);
        if needed > self.radius {
            self.radius = needed;
            true
        } else {
            false
        }
    }

    /// Absolute center of the zone.
    pub fn center(&self) -> Vec3i {
        self.center
    }

    /// Move the zone. Placements keep their relative layout.
    pub fn set_center(&mut self, center: Vec3i) {
        self.center = center;
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Placement of footprint `i` relative to the center.
    pub fn relative_offset(&self, i: usize) -> Vec3i {
        self.offsets[i]
    }

    /// Absolute placement of footprint `i`.
    pub fn offset(&self, i: usize) -> Vec3i {
        self.center + self.offsets[i]
    }
}

/// Distance from the origin to the farthest horizontal corner of `bounds`.
fn corner_distance(bounds: &Cuboid) -> f64 {
    let far_x = (bounds.min.x.abs()).max(bounds.max.x.abs()) as f64;
    let far_z = (bounds.min.z.abs()).max(bounds.max.z.abs()) as f64;
    far_x.hypot(far_z)
}

/// Uniform random center for a rectangle of `bounds`' plan size such that the
/// whole rectangle lies inside the circle of `radius`.
fn sample_center<R: Rng + ?Sized>(bounds: &Cuboid, radius: f64, rng: &mut R) -> (f64, f64) {
    let s = bounds.size();
    let (hx, hz) = (s.x as f64 / 2.0, s.z as f64 / 2.0);
    let theta = rng.random::<f64>() * TAU;
    let (ux, uz) = (theta.cos(), theta.sin());

    // Far corner in the direction of travel: solve |t·u + h| = radius.
    let (cx, cz) = (hx * ux.signum(), hz * uz.signum());
    let dot = ux * cx + uz * cz;
    let disc = dot * dot - (hx * hx + hz * hz) + radius * radius;
    let t_max = (-dot + disc.max(0.0).sqrt()).max(0.0);

    let r = rng.random::<f64>().sqrt() * t_max;
    (r * ux, r * uz)
}

impl Persistent for ResourceZonePlan {}
