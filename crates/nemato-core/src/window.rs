//! Window and aperture functions.
//!
//! Windows are real `[H, W]` masks multiplied into illumination waves to
//! define the field diaphragm of the input light. All of them are built on a
//! normalised radius grid that reaches 1 at the middle of each edge.

use ndarray::Array2;
use std::f64::consts::PI;

/// Normalised radius of every pixel of a `[H, W]` grid.
///
/// Pixel centres sit at half-integer offsets from the grid centre; each axis
/// is scaled by half its length times `scale`.
pub fn radius(shape: (usize, usize), scale: f64) -> Array2<f64> {
    let (h, w) = shape;
    let ny = (h / 2) as f64 * scale;
    let nx = (w / 2) as f64 * scale;
    Array2::from_shape_fn(shape, |(i, j)| {
        let y = i as f64 - h as f64 / 2.0 + 0.5;
        let x = j as f64 - w as f64 / 2.0 + 0.5;
        ((x / nx).powi(2) + (y / ny).powi(2)).sqrt()
    })
}

/// Blackman window, zero at and beyond unit radius.
pub fn blackman(shape: (usize, usize)) -> Array2<f64> {
    radius(shape, 1.0).mapv(|r| {
        if r >= 1.0 {
            0.0
        } else {
            0.42 + 0.5 * (PI * r).cos() + 0.08 * (2.0 * PI * r).cos()
        }
    })
}

/// Circular aperture of relative `diameter` with a Tukey edge of relative
/// width `alpha`.
pub fn aperture(shape: (usize, usize), diameter: f64, alpha: f64) -> Array2<f64> {
    tukey(&radius(shape, diameter), alpha, 1.0)
}

/// Tukey taper of a radius array: 1 inside `rmax·(1 - alpha)`, a raised
/// cosine down to 0 at `rmax`, and 0 beyond.
pub fn tukey(r: &Array2<f64>, alpha: f64, rmax: f64) -> Array2<f64> {
    let alpha = alpha * rmax;
    r.mapv(|r| {
        if r >= rmax {
            0.0
        } else if alpha > 0.0 && r > rmax - alpha {
            0.5 * (1.0 - (PI * (r - rmax) / alpha).cos())
        } else {
            1.0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_radius_is_symmetric() {
        let r = radius((4, 6), 1.0);
        assert_abs_diff_eq!(r[[0, 0]], r[[3, 5]], epsilon = 1e-12);
        assert_abs_diff_eq!(r[[1, 2]], r[[2, 3]], epsilon = 1e-12);
        // Centre pixels of an even grid sit half a pixel off-axis.
        assert_abs_diff_eq!(
            r[[2, 3]],
            ((0.5_f64 / 3.0).powi(2) + (0.5_f64 / 2.0).powi(2)).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_blackman_peaks_in_centre_and_vanishes_in_corners() {
        let w = blackman((33, 33));
        assert_abs_diff_eq!(w[[16, 16]], 1.0, epsilon = 1e-12);
        assert_eq!(w[[0, 0]], 0.0);
        assert!(w[[16, 8]] > 0.0 && w[[16, 8]] < 1.0);
    }

    #[test]
    fn test_aperture_profile() {
        let a = aperture((33, 33), 0.8, 0.1);
        assert_eq!(a[[16, 16]], 1.0);
        assert_eq!(a[[16, 0]], 0.0);
        assert!(a.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_tukey_edges() {
        let r = ndarray::arr2(&[[0.0, 0.85, 0.9, 0.95, 1.0, 1.2]]);
        let t = tukey(&r, 0.1, 1.0);
        assert_eq!(t[[0, 0]], 1.0);
        assert_eq!(t[[0, 1]], 1.0);
        assert_abs_diff_eq!(t[[0, 3]], 0.5, epsilon = 1e-12);
        assert_eq!(t[[0, 4]], 0.0);
        assert_eq!(t[[0, 5]], 0.0);

        let hard = tukey(&r, 0.0, 1.0);
        assert_eq!(hard[[0, 3]], 1.0);
    }
}
