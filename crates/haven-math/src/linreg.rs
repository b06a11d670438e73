//! Incremental least-squares plane fit for terrain heights.
//!
//! Fits `height ≈ c1 + c2·x + c3·z`. Samples are kept only as raw integer
//! sums so that adding or removing a sample is O(1); the coefficients are
//! solved on demand. Sums use `i128`, which leaves ample headroom for tens of
//! thousands of samples at world-scale coordinates.

use serde::{Deserialize, Serialize};

/// Running sums for an incremental plane regression over integer samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainHeightLinReg {
    n: i64,
    sum_x: i128,
    sum_z: i128,
    sum_y: i128,
    sum_xx: i128,
    sum_zz: i128,
    sum_yy: i128,
    sum_xz: i128,
    sum_xy: i128,
    sum_zy: i128,
}

/// Centered scatter sums, each scaled by `n` (so `cxx = n·Σx² - (Σx)²`).
struct Scatter {
    n: f64,
    cxx: i128,
    czz: i128,
    cxz: i128,
    cxy: i128,
    czy: i128,
    cyy: i128,
}

impl TerrainHeightLinReg {
    /// An empty regression.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples currently included.
    pub fn len(&self) -> i64 {
        self.n
    }

    /// True when no samples are included.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Include the sample `height` at column `(x, z)`.
    pub fn add(&mut self, x: i32, z: i32, height: i32) {
        self.accumulate(x, z, height, 1);
    }

    /// Remove a sample previously passed to [`add`](Self::add).
    pub fn remove(&mut self, x: i32, z: i32, height: i32) {
        self.accumulate(x, z, height, -1);
    }

    fn accumulate(&mut self, x: i32, z: i32, y: i32, sign: i128) {
        let (x, z, y) = (x as i128, z as i128, y as i128);
        self.n += sign as i64;
        self.sum_x += sign * x;
        self.sum_z += sign * z;
        self.sum_y += sign * y;
        self.sum_xx += sign * x * x;
        self.sum_zz += sign * z * z;
        self.sum_yy += sign * y * y;
        self.sum_xz += sign * x * z;
        self.sum_xy += sign * x * y;
        self.sum_zy += sign * z * y;
    }

    fn scatter(&self) -> Scatter {
        let n = self.n as i128;
        Scatter {
            n: self.n as f64,
            cxx: n * self.sum_xx - self.sum_x * self.sum_x,
            czz: n * self.sum_zz - self.sum_z * self.sum_z,
            cxz: n * self.sum_xz - self.sum_x * self.sum_z,
            cxy: n * self.sum_xy - self.sum_x * self.sum_y,
            czy: n * self.sum_zy - self.sum_z * self.sum_y,
            cyy: n * self.sum_yy - self.sum_y * self.sum_y,
        }
    }

    /// Coefficients `[c1, c2, c3]` of `height ≈ c1 + c2·x + c3·z`.
    ///
    /// Degenerate sample layouts fall back to lower-rank fits: when every
    /// sample shares the same x (or z) that slope is zero and the other is
    /// fitted alone; when x and z are perfectly correlated only x is fitted;
    /// when every sample is at one column the fit is the mean height. With no
    /// samples every coefficient is zero.
    pub fn beta(&self) -> [f64; 3] {
        if self.n == 0 {
            return [0.0, 0.0, 0.0];
        }
        let (bx, bz) = self.slopes();
        let n = self.n as f64;
        let c1 = (self.sum_y as f64 - bx * self.sum_x as f64 - bz * self.sum_z as f64) / n;
        [c1, bx, bz]
    }

    /// Height at `x = z = 0`.
    pub fn intercept(&self) -> f64 {
        self.beta()[0]
    }

    /// Height change per unit of x.
    pub fn x_param(&self) -> f64 {
        self.beta()[1]
    }

    /// Height change per unit of z.
    pub fn z_param(&self) -> f64 {
        self.beta()[2]
    }

    /// Fitted height at `(x, z)`.
    pub fn predict(&self, x: f64, z: f64) -> f64 {
        let [c1, c2, c3] = self.beta();
        c1 + c2 * x + c3 * z
    }

    fn slopes(&self) -> (f64, f64) {
        let s = self.scatter();
        let x_flat = s.cxx == 0;
        let z_flat = s.czz == 0;

        match (x_flat, z_flat) {
            (true, true) => (0.0, 0.0),
            (true, false) => (0.0, s.czy as f64 / s.czz as f64),
            (false, true) => (s.cxy as f64 / s.cxx as f64, 0.0),
            (false, false) if is_singular(&s) => (s.cxy as f64 / s.cxx as f64, 0.0),
            (false, false) => {
                let (cxx, czz, cxz) = (s.cxx as f64, s.czz as f64, s.cxz as f64);
                let (cxy, czy) = (s.cxy as f64, s.czy as f64);
                let det = cxx * czz - cxz * cxz;
                ((cxy * czz - czy * cxz) / det, (czy * cxx - cxy * cxz) / det)
            }
        }
    }

    /// Population variance of the sampled heights.
    pub fn variance(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let s = self.scatter();
        s.cyy as f64 / (s.n * s.n)
    }

    /// Sum of squared residuals of the current fit.
    pub fn residual_sum_of_squares(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let s = self.scatter();
        let (bx, bz) = self.slopes();
        let explained = bx * s.cxy as f64 + bz * s.czy as f64;
        let fitted = bx * bx * s.cxx as f64 + 2.0 * bx * bz * s.cxz as f64 + bz * bz * s.czz as f64;
        ((s.cyy as f64 - 2.0 * explained + fitted) / s.n).max(0.0)
    }

    /// Coefficient of determination.
    ///
    /// 1 when there are no samples or the heights have no variance, since
    /// there is nothing left to explain.
    pub fn r_squared(&self) -> f64 {
        if self.n == 0 {
            return 1.0;
        }
        let s = self.scatter();
        if s.cyy == 0 {
            return 1.0;
        }
        let total = s.cyy as f64 / s.n;
        (1.0 - self.residual_sum_of_squares() / total).clamp(0.0, 1.0)
    }
}

/// True when the x/z scatter matrix has a zero determinant.
fn is_singular(s: &Scatter) -> bool {
    match (s.cxx.checked_mul(s.czz), s.cxz.checked_mul(s.cxz)) {
        (Some(a), Some(b)) => a == b,
        _ => {
            let (cxx, czz, cxz) = (s.cxx as f64, s.czz as f64, s.cxz as f64);
            (cxx * czz - cxz * cxz).abs() <= 1e-12 * (cxx * czz)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_empty_regression() {
        let reg = TerrainHeightLinReg::new();
        assert_eq!(reg.beta(), [0.0, 0.0, 0.0]);
        assert_eq!(reg.r_squared(), 1.0);
        assert_eq!(reg.variance(), 0.0);
        assert_eq!(reg.residual_sum_of_squares(), 0.0);
    }

    #[test]
    fn test_unit_slope_in_x_with_constant_z() {
        let mut reg = TerrainHeightLinReg::new();
        for x in 0..4 {
            reg.add(x, 7, 10 + x);
        }
        assert!(approx(reg.x_param(), 1.0), "x_param = {}", reg.x_param());
        assert!(approx(reg.z_param(), 0.0));
        assert!(approx(reg.intercept(), 10.0));
        assert!(approx(reg.r_squared(), 1.0));
    }

    #[test]
    fn test_unit_slope_in_x_on_a_square() {
        let mut reg = TerrainHeightLinReg::new();
        for (x, z) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            reg.add(x, z, 5 + x);
        }
        assert!(approx(reg.x_param(), 1.0));
        assert!(approx(reg.z_param(), 0.0));
        assert!(approx(reg.r_squared(), 1.0));
        assert!(approx(reg.residual_sum_of_squares(), 0.0));
    }

    #[test]
    fn test_full_plane_fit() {
        let mut reg = TerrainHeightLinReg::new();
        for x in -3..4 {
            for z in -2..5 {
                reg.add(x, z, 100 + 2 * x - 3 * z);
            }
        }
        let [c1, c2, c3] = reg.beta();
        assert!(approx(c1, 100.0));
        assert!(approx(c2, 2.0));
        assert!(approx(c3, -3.0));
        assert!(approx(reg.predict(10.0, 10.0), 90.0));
    }

    #[test]
    fn test_identical_samples_are_degenerate_but_defined() {
        let mut reg = TerrainHeightLinReg::new();
        for _ in 0..5 {
            reg.add(3, 3, 42);
        }
        assert_eq!(reg.r_squared(), 1.0);
        assert_eq!(reg.variance(), 0.0);
        assert!(approx(reg.intercept(), 42.0));
    }

    #[test]
    fn test_single_column_with_varying_height_fits_the_mean() {
        let mut reg = TerrainHeightLinReg::new();
        reg.add(0, 0, 10);
        reg.add(0, 0, 20);
        assert!(approx(reg.intercept(), 15.0));
        assert!(approx(reg.variance(), 25.0));
        assert!(approx(reg.r_squared(), 0.0));
    }

    #[test]
    fn test_diagonal_samples_fall_back_to_x_only() {
        let mut reg = TerrainHeightLinReg::new();
        for i in 0..5 {
            reg.add(i, i, 3 * i);
        }
        assert!(approx(reg.x_param(), 3.0));
        assert!(approx(reg.z_param(), 0.0));
        assert!(reg.beta().iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_remove_restores_previous_fit() {
        let mut reg = TerrainHeightLinReg::new();
        for x in 0..5 {
            for z in 0..5 {
                reg.add(x, z, x + z);
            }
        }
        let before = reg;
        reg.add(100, -100, 9999);
        assert_ne!(reg, before);
        reg.remove(100, -100, 9999);
        assert_eq!(reg, before);
    }

    #[test]
    fn test_large_world_coordinates_do_not_overflow() {
        let mut reg = TerrainHeightLinReg::new();
        let base = 30_000_000;
        for i in 0..100 {
            for j in 0..100 {
                reg.add(base + i, base - j, 64 + i / 10);
            }
        }
        assert_eq!(reg.len(), 10_000);
        assert!((reg.x_param() - 0.1).abs() < 0.01, "x_param = {}", reg.x_param());
        assert!(reg.z_param().abs() < 1e-6);
        assert!(reg.r_squared() > 0.9);
    }

    #[test]
    fn test_noisy_fit_has_r_squared_below_one() {
        let mut reg = TerrainHeightLinReg::new();
        let heights = [3, 7, 2, 9, 4, 6, 1, 8, 5];
        for (i, h) in heights.iter().enumerate() {
            reg.add((i % 3) as i32, (i / 3) as i32, *h);
        }
        let r2 = reg.r_squared();
        assert!((0.0..1.0).contains(&r2), "r_squared = {r2}");
        assert!(reg.residual_sum_of_squares() > 0.0);
    }
}
