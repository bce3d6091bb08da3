//! Parametric regions of a voxel grid.
//!
//! Regions delimit where a liquid-crystal director field lives (a droplet, a
//! slab, a fibre) inside an otherwise isotropic host. Coordinates are in
//! voxel units, measured from the grid centre, ordered `(x, y, z)`.
//! Regions are fully described by their TOML parameters.

use serde::{Deserialize, Serialize};

/// A closed region of the voxel grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    Sphere(Sphere),
    Ellipsoid(Ellipsoid),
    Cuboid(Cuboid),
    Cylinder(Cylinder),
}

/// A sphere defined by its centre and radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    #[serde(default)]
    pub centre: [f64; 3],
    pub radius: f64,
}

/// An ellipsoid defined by its centre and semi-axis lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    #[serde(default)]
    pub centre: [f64; 3],
    /// Semi-axis lengths along x, y, z.
    pub semi_axes: [f64; 3],
}

/// An axis-aligned cuboid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    #[serde(default)]
    pub centre: [f64; 3],
    /// Half-extents along x, y, z.
    pub half_extents: [f64; 3],
}

/// A cylinder with its axis along z.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    #[serde(default)]
    pub centre: [f64; 3],
    pub radius: f64,
    /// Length along z.
    pub length: f64,
}

impl Primitive {
    /// Check whether a point lies inside this region (boundary included).
    pub fn contains(&self, point: &[f64; 3]) -> bool {
        let c = self.centre();
        let [dx, dy, dz] = [point[0] - c[0], point[1] - c[1], point[2] - c[2]];
        match self {
            Primitive::Sphere(s) => dx * dx + dy * dy + dz * dz <= s.radius * s.radius,
            Primitive::Ellipsoid(e) => {
                let [a, b, c] = e.semi_axes;
                (dx / a).powi(2) + (dy / b).powi(2) + (dz / c).powi(2) <= 1.0
            }
            Primitive::Cuboid(b) => {
                dx.abs() <= b.half_extents[0]
                    && dy.abs() <= b.half_extents[1]
                    && dz.abs() <= b.half_extents[2]
            }
            Primitive::Cylinder(cyl) => {
                dx * dx + dy * dy <= cyl.radius * cyl.radius && dz.abs() <= cyl.length / 2.0
            }
        }
    }

    pub fn centre(&self) -> [f64; 3] {
        match self {
            Primitive::Sphere(s) => s.centre,
            Primitive::Ellipsoid(e) => e.centre,
            Primitive::Cuboid(b) => b.centre,
            Primitive::Cylinder(c) => c.centre,
        }
    }

    /// Half-extents of the axis-aligned bounding box.
    pub fn half_extents(&self) -> [f64; 3] {
        match self {
            Primitive::Sphere(s) => [s.radius; 3],
            Primitive::Ellipsoid(e) => e.semi_axes,
            Primitive::Cuboid(b) => b.half_extents,
            Primitive::Cylinder(c) => [c.radius, c.radius, c.length / 2.0],
        }
    }

    /// Axis-aligned bounding box: returns (min_corner, max_corner).
    pub fn bounding_box(&self) -> ([f64; 3], [f64; 3]) {
        let c = self.centre();
        let h = self.half_extents();
        (
            [c[0] - h[0], c[1] - h[1], c[2] - h[2]],
            [c[0] + h[0], c[1] + h[1], c[2] + h[2]],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containment() {
        let sphere = Primitive::Sphere(Sphere {
            centre: [1.0, 0.0, 0.0],
            radius: 2.0,
        });
        assert!(sphere.contains(&[3.0, 0.0, 0.0]));
        assert!(!sphere.contains(&[-1.5, 0.0, 0.0]));

        let cylinder = Primitive::Cylinder(Cylinder {
            centre: [0.0; 3],
            radius: 1.0,
            length: 4.0,
        });
        assert!(cylinder.contains(&[0.5, 0.5, 1.9]));
        assert!(!cylinder.contains(&[0.0, 0.0, 2.1]));
        assert!(!cylinder.contains(&[1.0, 0.1, 0.0]));

        let ellipsoid = Primitive::Ellipsoid(Ellipsoid {
            centre: [0.0; 3],
            semi_axes: [4.0, 1.0, 1.0],
        });
        assert!(ellipsoid.contains(&[3.9, 0.0, 0.0]));
        assert!(!ellipsoid.contains(&[0.0, 1.1, 0.0]));
    }

    #[test]
    fn test_parse_tagged_toml() {
        let p: Primitive = toml::from_str("type = \"cuboid\"\nhalf_extents = [1.0, 2.0, 3.0]\n").unwrap();
        assert_eq!(p.bounding_box(), ([-1.0, -2.0, -3.0], [1.0, 2.0, 3.0]));
    }
}
