use crate::catalog::CurvePoint;
use anyhow::bail;

/// Natural cubic spline through a power profile's curve points.
///
/// The fitted curve passes exactly through every knot and has a continuous
/// second derivative between segments, with the second derivative pinned to
/// zero at both ends. With only two knots this degenerates to linear
/// interpolation between them.
#[derive(Debug, Clone)]
pub struct Spline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    // second derivative of the curve at each knot
    m: Vec<f64>,
}

impl Spline {
    /// Fits a spline through the given curve points. Requires at least two
    /// points with strictly increasing utilization.
    pub fn new(points: &[CurvePoint]) -> anyhow::Result<Spline> {
        if points.len() < 2 {
            bail!(
                "power curve needs at least 2 points, got {}",
                points.len()
            );
        }
        for pair in points.windows(2) {
            if pair[1].utilization <= pair[0].utilization {
                bail!(
                    "power curve points must be strictly increasing in utilization ({} then {})",
                    pair[0].utilization,
                    pair[1].utilization
                );
            }
        }

        let xs: Vec<f64> = points.iter().map(|p| p.utilization).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.watts).collect();
        let m = second_derivatives(&xs, &ys);

        Ok(Spline { xs, ys, m })
    }

    /// Evaluates the spline at the given utilization percentage.
    ///
    /// Inputs outside the knot domain are clamped to the boundary knots, so
    /// the curve never extrapolates beyond the measured wattage range.
    pub fn at(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1];
        }

        // index of the segment [x_i, x_i+1] containing x
        let i = self.xs.partition_point(|&knot| knot <= x) - 1;
        let h = self.xs[i + 1] - self.xs[i];
        let a = self.xs[i + 1] - x;
        let b = x - self.xs[i];

        self.m[i] * a.powi(3) / (6.0 * h)
            + self.m[i + 1] * b.powi(3) / (6.0 * h)
            + (self.ys[i] / h - self.m[i] * h / 6.0) * a
            + (self.ys[i + 1] / h - self.m[i + 1] * h / 6.0) * b
    }
}

/// Solves the natural-spline tridiagonal system for the second derivative at
/// each knot (Thomas algorithm). The natural boundary fixes the first and
/// last values to zero.
fn second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut m = vec![0.0; n];
    if n == 2 {
        return m;
    }

    // sub/main/super diagonals and right-hand side, natural boundary rows
    let mut diag = vec![1.0; n];
    let mut upper = vec![0.0; n];
    let mut lower = vec![0.0; n];
    let mut rhs = vec![0.0; n];
    for i in 1..n - 1 {
        let h0 = xs[i] - xs[i - 1];
        let h1 = xs[i + 1] - xs[i];
        lower[i] = h0;
        diag[i] = 2.0 * (h0 + h1);
        upper[i] = h1;
        rhs[i] = 6.0 * ((ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0);
    }

    // forward sweep
    for i in 1..n {
        let w = lower[i] / diag[i - 1];
        diag[i] -= w * upper[i - 1];
        rhs[i] -= w * rhs[i - 1];
    }

    // back substitution
    m[n - 1] = rhs[n - 1] / diag[n - 1];
    for i in (0..n - 1).rev() {
        m[i] = (rhs[i] - upper[i] * m[i + 1]) / diag[i];
    }

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(pairs: &[(f64, f64)]) -> Vec<CurvePoint> {
        pairs
            .iter()
            .map(|&(utilization, watts)| CurvePoint { utilization, watts })
            .collect()
    }

    #[test]
    fn reproduces_every_knot_exactly() -> anyhow::Result<()> {
        let knots = [(0.0, 1.21), (10.0, 3.05), (50.0, 7.16), (100.0, 10.02)];
        let spline = Spline::new(&points(&knots))?;

        for (x, y) in knots {
            assert!(
                (spline.at(x) - y).abs() < 1e-9,
                "expected {} at {}, got {}",
                y,
                x,
                spline.at(x)
            );
        }
        Ok(())
    }

    #[test]
    fn two_points_degenerate_to_linear_interpolation() -> anyhow::Result<()> {
        let spline = Spline::new(&points(&[(0.0, 2.0), (100.0, 12.0)]))?;

        for x in [0.0, 12.5, 25.0, 50.0, 77.3, 100.0] {
            let linear = 2.0 + (12.0 - 2.0) * x / 100.0;
            assert!((spline.at(x) - linear).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn clamps_outside_the_knot_domain() -> anyhow::Result<()> {
        let spline = Spline::new(&points(&[(0.0, 2.0), (100.0, 12.0)]))?;

        assert_eq!(spline.at(-20.0), 2.0);
        assert_eq!(spline.at(150.0), 12.0);
        Ok(())
    }

    #[test]
    fn interpolates_symmetric_knots_symmetrically() -> anyhow::Result<()> {
        // symmetric inputs should produce a curve symmetric about x = 50
        let spline = Spline::new(&points(&[(0.0, 1.0), (50.0, 4.0), (100.0, 1.0)]))?;

        for x in [5.0, 20.0, 35.0] {
            assert!((spline.at(x) - spline.at(100.0 - x)).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn rejects_degenerate_curves() {
        assert!(Spline::new(&points(&[(0.0, 1.0)])).is_err());
        assert!(Spline::new(&points(&[(0.0, 1.0), (0.0, 2.0)])).is_err());
        assert!(Spline::new(&points(&[(50.0, 1.0), (10.0, 2.0)])).is_err());
    }
}
