use std::collections::HashMap;

/// A linear simplex mesh (bar2, tri3 or tet4).
///
/// Coordinates are stored node-major (`node * spatial_dim + d`) and the
/// connectivity cell-major (`cell * nodes_per_cell + a`). The mesh is
/// read-only once built.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub spatial_dim: usize,
    pub nodes_per_cell: usize,
    pub coordinates: Vec<f64>,
    pub connectivity: Vec<usize>,
    pub node_sets: HashMap<String, Vec<usize>>,
    pub side_sets: HashMap<String, Vec<Side>>,
    pub domains: Vec<Domain>,
}

/// A boundary side, identified by its parent cell and the local node it
/// excludes: side `face` of a simplex holds every local node except `face`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Side {
    pub cell: usize,
    pub face: usize,
}

/// A named subset of cells.
#[derive(Clone, Debug)]
pub struct Domain {
    pub name: String,
    pub cells: Vec<usize>,
}

impl Mesh {
    /// Build a mesh with a single domain holding every cell.
    pub fn new(spatial_dim: usize, coordinates: Vec<f64>, connectivity: Vec<usize>) -> Self {
        let nodes_per_cell = spatial_dim + 1;
        let num_cells = connectivity.len() / nodes_per_cell;
        Self {
            spatial_dim,
            nodes_per_cell,
            coordinates,
            connectivity,
            node_sets: HashMap::new(),
            side_sets: HashMap::new(),
            domains: vec![Domain {
                name: "body".to_string(),
                cells: (0..num_cells).collect(),
            }],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.coordinates.len() / self.spatial_dim
    }

    pub fn num_cells(&self) -> usize {
        self.connectivity.len() / self.nodes_per_cell
    }

    #[inline]
    pub fn cell_nodes(&self, cell: usize) -> &[usize] {
        let n = self.nodes_per_cell;
        &self.connectivity[cell * n..(cell + 1) * n]
    }

    #[inline]
    pub fn node_coords(&self, node: usize) -> &[f64] {
        let d = self.spatial_dim;
        &self.coordinates[node * d..(node + 1) * d]
    }

    /// Local node indices on side `face` of a cell.
    pub fn face_local_nodes(&self, face: usize) -> impl Iterator<Item = usize> {
        (0..self.nodes_per_cell).filter(move |&a| a != face)
    }

    /// Copy of this mesh with replaced nodal coordinates.
    pub fn with_coordinates(&self, coordinates: Vec<f64>) -> Self {
        Self {
            coordinates,
            ..self.clone()
        }
    }

    /// Tag every boundary side and node lying on the bounding box faces as
    /// `x-`, `x+`, `y-`, `y+`, `z-`, `z+`.
    pub fn tag_bounding_box(&mut self, tol: f64) {
        let dim = self.spatial_dim;
        let labels = [("x-", "x+"), ("y-", "y+"), ("z-", "z+")];

        for d in 0..dim {
            let coords = (0..self.num_nodes()).map(|n| self.node_coords(n)[d]);
            let lo = coords.clone().fold(f64::INFINITY, f64::min);
            let hi = coords.fold(f64::NEG_INFINITY, f64::max);

            for (bound, label) in [(lo, labels[d].0), (hi, labels[d].1)] {
                let on_plane = |node: usize| (self.node_coords(node)[d] - bound).abs() <= tol;

                let nodes: Vec<usize> = (0..self.num_nodes()).filter(|&n| on_plane(n)).collect();

                let mut sides = Vec::new();
                for cell in 0..self.num_cells() {
                    let cell_nodes = self.cell_nodes(cell);
                    for face in 0..self.nodes_per_cell {
                        if self.face_local_nodes(face).all(|a| on_plane(cell_nodes[a])) {
                            sides.push(Side { cell, face });
                        }
                    }
                }

                self.node_sets.insert(label.to_string(), nodes);
                self.side_sets.insert(label.to_string(), sides);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_follow_storage_layout() {
        let mesh = Mesh::new(2, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0], vec![0, 1, 2]);
        assert_eq!(mesh.num_nodes(), 3);
        assert_eq!(mesh.num_cells(), 1);
        assert_eq!(mesh.node_coords(1), &[1.0, 0.0]);
        assert_eq!(mesh.face_local_nodes(1).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(mesh.domains[0].cells, vec![0]);
    }

    #[test]
    fn bounding_box_tags_sides_and_nodes() {
        let mut mesh = Mesh::new(2, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0], vec![0, 1, 2]);
        mesh.tag_bounding_box(1e-12);
        assert_eq!(mesh.node_sets["x-"], vec![0, 2]);
        assert_eq!(mesh.side_sets["x-"], vec![Side { cell: 0, face: 1 }]);
        assert_eq!(mesh.side_sets["y-"], vec![Side { cell: 0, face: 2 }]);
        assert!(mesh.side_sets["x+"].is_empty());
        assert_eq!(mesh.node_sets["x+"], vec![1]);
    }
}
