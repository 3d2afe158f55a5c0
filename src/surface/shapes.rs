//! Procedural surfaces used for calibration and tests

use super::Surface;
use crate::float_types::Real;
use hashbrown::HashMap;
use nalgebra::Point3;

impl Surface {
    /// Geodesic sphere of `radius` centred at the origin: a regular
    /// icosahedron refined `subdivisions` times by edge-midpoint splitting,
    /// every vertex projected back onto the sphere.
    ///
    /// Faces are counter-clockwise seen from outside, so vertex normals point
    /// outward. Vertex count is `10 * 4^subdivisions + 2`.
    pub fn icosphere(radius: Real, subdivisions: usize) -> Surface {
        // golden ratio
        let phi: Real = (1.0 + (5.0 as Real).sqrt()) * 0.5;
        // normalise so the circum-radius is 1
        let inv_len = (1.0 + phi * phi).sqrt().recip();
        let a = inv_len;
        let b = phi * inv_len;

        let mut points: Vec<Point3<Real>> = [
            [-a, b, 0.0],
            [a, b, 0.0],
            [-a, -b, 0.0],
            [a, -b, 0.0],
            [0.0, -a, b],
            [0.0, a, b],
            [0.0, -a, -b],
            [0.0, a, -b],
            [b, 0.0, -a],
            [b, 0.0, a],
            [-b, 0.0, -a],
            [-b, 0.0, a],
        ]
        .iter()
        .map(|&[x, y, z]| Point3::new(x, y, z))
        .collect();

        let mut faces: Vec<[usize; 3]> = vec![
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];

        for _ in 0..subdivisions {
            let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
            let mut midpoint = |i: usize, j: usize, points: &mut Vec<Point3<Real>>| -> usize {
                *midpoints.entry((i.min(j), i.max(j))).or_insert_with(|| {
                    let m = Point3::from((points[i].coords + points[j].coords) * 0.5);
                    points.push(Point3::from(m.coords.normalize()));
                    points.len() - 1
                })
            };

            let mut refined = Vec::with_capacity(faces.len() * 4);
            for &[p, q, r] in &faces {
                let pq = midpoint(p, q, &mut points);
                let qr = midpoint(q, r, &mut points);
                let rp = midpoint(r, p, &mut points);
                refined.push([p, pq, rp]);
                refined.push([q, qr, pq]);
                refined.push([r, rp, qr]);
                refined.push([pq, qr, rp]);
            }
            faces = refined;
        }

        for p in &mut points {
            *p = Point3::from(p.coords * radius);
        }
        Surface::from_parts(points, faces)
    }

    /// Flat `n x n` vertex grid in the *XY* plane at `z = 0` with the given
    /// spacing, each cell split along its rising diagonal. Normals point +Z.
    pub fn grid_plane(n: usize, spacing: Real) -> Surface {
        let n = n.max(2);
        let vertices: Vec<Point3<Real>> = (0..n * n)
            .map(|idx| {
                let (i, j) = (idx % n, idx / n);
                Point3::new(i as Real * spacing, j as Real * spacing, 0.0)
            })
            .collect();

        let mut faces = Vec::with_capacity(2 * (n - 1) * (n - 1));
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                let v00 = j * n + i;
                let v10 = v00 + 1;
                let v01 = v00 + n;
                let v11 = v01 + 1;
                faces.push([v00, v10, v11]);
                faces.push([v00, v11, v01]);
            }
        }
        Surface::from_parts(vertices, faces)
    }
}
