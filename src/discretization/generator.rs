use super::mesh::Mesh;

const TAG_TOL: f64 = 1e-12;

/// Uniform 1D bar on `[0, length]` with `num_cells` two-node cells.
pub fn create_bar(length: f64, num_cells: usize) -> Mesh {
    let dx = length / num_cells as f64;
    let coordinates = (0..=num_cells).map(|i| i as f64 * dx).collect();
    let connectivity = (0..num_cells).flat_map(|c| [c, c + 1]).collect();

    let mut mesh = Mesh::new(1, coordinates, connectivity);
    mesh.tag_bounding_box(TAG_TOL * length);
    mesh
}

/// Structured triangle mesh of `[0, width[0]] × [0, width[1]]`.
/// Each of the `nx × ny` quads is split along its rising diagonal.
pub fn create_rectangle(width: [f64; 2], nx: usize, ny: usize) -> Mesh {
    let dx = width[0] / nx as f64;
    let dy = width[1] / ny as f64;

    let mut coordinates = Vec::with_capacity(2 * (nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            coordinates.push(i as f64 * dx);
            coordinates.push(j as f64 * dy);
        }
    }

    let id = |i: usize, j: usize| j * (nx + 1) + i;
    let mut connectivity = Vec::with_capacity(6 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let (n0, n1, n2, n3) = (id(i, j), id(i + 1, j), id(i + 1, j + 1), id(i, j + 1));
            connectivity.extend([n0, n1, n2]);
            connectivity.extend([n0, n2, n3]);
        }
    }

    let mut mesh = Mesh::new(2, coordinates, connectivity);
    mesh.tag_bounding_box(TAG_TOL * width[0].max(width[1]));
    mesh
}

/// Structured tetrahedral mesh of a box, six tets per hexahedron along the
/// main diagonal. Node order is flipped where needed so every tet has a
/// positive mapping determinant.
pub fn create_box(width: [f64; 3], nx: usize, ny: usize, nz: usize) -> Mesh {
    let h = [width[0] / nx as f64, width[1] / ny as f64, width[2] / nz as f64];

    let mut coordinates = Vec::with_capacity(3 * (nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                coordinates.extend([i as f64 * h[0], j as f64 * h[1], k as f64 * h[2]]);
            }
        }
    }

    let id = |i: usize, j: usize, k: usize| (k * (ny + 1) + j) * (nx + 1) + i;
    let paths: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    let mut connectivity = Vec::with_capacity(24 * nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                for path in paths {
                    let mut corner = [i, j, k];
                    let mut tet = [id(i, j, k), 0, 0, 0];
                    for (step, &axis) in path.iter().enumerate() {
                        corner[axis] += 1;
                        tet[step + 1] = id(corner[0], corner[1], corner[2]);
                    }
                    if signed_volume(&coordinates, &tet) < 0.0 {
                        tet.swap(2, 3);
                    }
                    connectivity.extend(tet);
                }
            }
        }
    }

    let mut mesh = Mesh::new(3, coordinates, connectivity);
    mesh.tag_bounding_box(TAG_TOL * width.iter().cloned().fold(0.0, f64::max));
    mesh
}

fn signed_volume(coordinates: &[f64], tet: &[usize; 4]) -> f64 {
    let p = |n: usize| &coordinates[3 * n..3 * n + 3];
    let (x0, x1, x2, x3) = (p(tet[0]), p(tet[1]), p(tet[2]), p(tet[3]));
    let e = |x: &[f64]| [x[0] - x0[0], x[1] - x0[1], x[2] - x0[2]];
    let (a, b, c) = (e(x1), e(x2), e(x3));
    a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
        + a[2] * (b[0] * c[1] - b[1] * c[0])
}
