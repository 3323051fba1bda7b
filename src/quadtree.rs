//! Barnes-Hut quadtree
//!
//! Built from scratch every tick over the position snapshot, then queried once per
//! node. Construction is `O(N log N)` for reasonably spread points and each query
//! visits `O(log N)` cells, so a full many-body pass costs `O(N log N)` per tick.
//! No state is carried from one tick to the next.

use rand::Rng;

use crate::config::Falloff;

/// Depth at which cells stop splitting and start stacking points
const MAX_DEPTH: usize = 32;

/// Side length used when every point sits on the same spot
const MIN_EXTENT: f64 = 1.0;

/// Parameters for one repulsion query
#[derive(Debug, Clone, Copy)]
pub struct RepulsionParams {
    /// Per-node strength (negative = repulsion), already scaled by alpha
    pub strength: f64,
    /// Opening criterion: a cell is approximated when `size / distance < theta`
    pub theta: f64,
    /// Distances below this are treated as this
    pub distance_min: f64,
    pub falloff: Falloff,
}

#[derive(Debug, Clone)]
struct Cell {
    x0: f64,
    y0: f64,
    size: f64,
    children: Option<[usize; 4]>,
    /// Point indices held by a leaf
    points: Vec<usize>,
    /// Number of points below this cell
    mass: f64,
    cx: f64,
    cy: f64,
}

impl Cell {
    fn new(x0: f64, y0: f64, size: f64) -> Self {
        Self {
            x0,
            y0,
            size,
            children: None,
            points: Vec::new(),
            mass: 0.0,
            cx: 0.0,
            cy: 0.0,
        }
    }

    fn quadrant(&self, [x, y]: [f64; 2]) -> usize {
        let half = self.size / 2.0;
        let right = usize::from(x >= self.x0 + half);
        let bottom = usize::from(y >= self.y0 + half);
        right | (bottom << 1)
    }
}

/// Spatial index over a position snapshot
#[derive(Debug, Clone)]
pub struct QuadTree {
    cells: Vec<Cell>,
    len: usize,
}

impl QuadTree {
    /// Build a tree over `positions`; non-finite points are left out
    pub fn build(positions: &[[f64; 2]]) -> Self {
        let finite: Vec<usize> = (0..positions.len())
            .filter(|&i| positions[i].iter().all(|c| c.is_finite()))
            .collect();

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &i in &finite {
            let [x, y] = positions[i];
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if finite.is_empty() {
            (min_x, min_y, max_x, max_y) = (0.0, 0.0, 0.0, 0.0);
        }

        // Square root cell, padded so points on the max edge fall inside
        let size = (max_x - min_x).max(max_y - min_y).max(MIN_EXTENT) * (1.0 + 1e-9);
        let mut tree = Self {
            cells: vec![Cell::new(min_x, min_y, size)],
            len: 0,
        };
        for i in finite {
            tree.insert(i, positions);
        }
        tree.accumulate(positions);
        tree
    }

    fn insert(&mut self, index: usize, positions: &[[f64; 2]]) {
        let point = positions[index];
        let mut cell = 0;
        let mut depth = 0;
        loop {
            if let Some(children) = self.cells[cell].children {
                cell = children[self.cells[cell].quadrant(point)];
                depth += 1;
                continue;
            }

            let leaf = &self.cells[cell];
            let stack = leaf.points.is_empty()
                || depth >= MAX_DEPTH
                || leaf.points.iter().all(|&p| positions[p] == point);
            if stack {
                self.cells[cell].points.push(index);
                self.len += 1;
                return;
            }

            self.split(cell, positions);
        }
    }

    fn split(&mut self, cell: usize, positions: &[[f64; 2]]) {
        let Cell { x0, y0, size, .. } = self.cells[cell];
        let half = size / 2.0;
        let first = self.cells.len();
        for q in 0..4 {
            let dx = if q & 1 == 1 { half } else { 0.0 };
            let dy = if q & 2 == 2 { half } else { 0.0 };
            self.cells.push(Cell::new(x0 + dx, y0 + dy, half));
        }
        let children = [first, first + 1, first + 2, first + 3];

        let points = std::mem::take(&mut self.cells[cell].points);
        for p in points {
            let q = self.cells[cell].quadrant(positions[p]);
            self.cells[children[q]].points.push(p);
        }
        self.cells[cell].children = Some(children);
    }

    /// Compute mass and centroid of every cell, children before parents
    fn accumulate(&mut self, positions: &[[f64; 2]]) {
        // Children are always pushed after their parent
        for cell in (0..self.cells.len()).rev() {
            let (mass, sx, sy) = match self.cells[cell].children {
                Some(children) => children.iter().fold((0.0, 0.0, 0.0), |(m, sx, sy), &c| {
                    let child = &self.cells[c];
                    (m + child.mass, sx + child.cx * child.mass, sy + child.cy * child.mass)
                }),
                None => self.cells[cell].points.iter().fold((0.0, 0.0, 0.0), |(m, sx, sy), &p| {
                    (m + 1.0, sx + positions[p][0], sy + positions[p][1])
                }),
            };
            let c = &mut self.cells[cell];
            c.mass = mass;
            if mass > 0.0 {
                c.cx = sx / mass;
                c.cy = sy / mass;
            }
        }
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of cells, leaves included
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Total mass and centroid of the whole tree
    pub fn centroid(&self) -> Option<[f64; 2]> {
        let root = &self.cells[0];
        (root.mass > 0.0).then_some([root.cx, root.cy])
    }

    /// Velocity change on point `index` from every other point
    ///
    /// Coincident points get a tiny jitter from `rng` so they have a direction to
    /// separate along.
    pub fn repulsion<R: Rng>(
        &self,
        index: usize,
        positions: &[[f64; 2]],
        params: &RepulsionParams,
        rng: &mut R,
    ) -> [f64; 2] {
        let [px, py] = positions[index];
        let theta2 = params.theta * params.theta;
        let mut force = [0.0, 0.0];
        let mut stack = vec![0];

        while let Some(cell) = stack.pop() {
            let c = &self.cells[cell];
            if c.mass == 0.0 {
                continue;
            }
            match c.children {
                None => {
                    for &other in c.points.iter().filter(|&&p| p != index) {
                        let [ox, oy] = positions[other];
                        add_pair(&mut force, ox - px, oy - py, 1.0, params, rng);
                    }
                }
                Some(children) => {
                    let (dx, dy) = (c.cx - px, c.cy - py);
                    let d2 = dx * dx + dy * dy;
                    if c.size * c.size < theta2 * d2 {
                        add_pair(&mut force, dx, dy, c.mass, params, rng);
                    } else {
                        stack.extend(children);
                    }
                }
            }
        }
        force
    }
}

/// Add the force exerted by a mass at offset `(dx, dy)`
fn add_pair<R: Rng>(
    force: &mut [f64; 2],
    mut dx: f64,
    mut dy: f64,
    mass: f64,
    params: &RepulsionParams,
    rng: &mut R,
) {
    if dx == 0.0 && dy == 0.0 {
        dx = jiggle(rng);
        dy = jiggle(rng);
    }
    let d = (dx * dx + dy * dy).sqrt();
    if d == 0.0 {
        return;
    }
    let floored = d.max(params.distance_min);
    let magnitude = match params.falloff {
        Falloff::InverseSquare => params.strength * mass / (floored * floored),
        Falloff::InverseLinear => params.strength * mass / floored,
    };
    force[0] += dx / d * magnitude;
    force[1] += dy / d * magnitude;
}

/// Tiny non-zero offset
pub(crate) fn jiggle<R: Rng>(rng: &mut R) -> f64 {
    (rng.r#gen::<f64>() - 0.5) * 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn params(theta: f64) -> RepulsionParams {
        RepulsionParams {
            strength: -300.0,
            theta,
            distance_min: 1.0,
            falloff: Falloff::InverseSquare,
        }
    }

    fn grid(n: usize) -> Vec<[f64; 2]> {
        (0..n * n)
            .map(|i| [(i % n) as f64 * 17.0 + (i as f64).sin(), (i / n) as f64 * 13.0])
            .collect()
    }

    fn brute_force(index: usize, positions: &[[f64; 2]], p: &RepulsionParams) -> [f64; 2] {
        let mut rng = StdRng::seed_from_u64(0);
        let mut force = [0.0, 0.0];
        let [px, py] = positions[index];
        for (j, [ox, oy]) in positions.iter().enumerate() {
            if j != index {
                add_pair(&mut force, ox - px, oy - py, 1.0, p, &mut rng);
            }
        }
        force
    }

    #[test]
    fn root_holds_every_point() {
        let positions = grid(6);
        let tree = QuadTree::build(&positions);

        assert_eq!(tree.len(), 36);
        let [cx, cy] = tree.centroid().unwrap();
        let mean_x = positions.iter().map(|p| p[0]).sum::<f64>() / 36.0;
        let mean_y = positions.iter().map(|p| p[1]).sum::<f64>() / 36.0;
        assert!((cx - mean_x).abs() < 1e-9);
        assert!((cy - mean_y).abs() < 1e-9);
    }

    #[test]
    fn theta_zero_matches_brute_force() {
        let positions = grid(5);
        let tree = QuadTree::build(&positions);
        let p = params(0.0);
        let mut rng = StdRng::seed_from_u64(0);

        for i in 0..positions.len() {
            let approx = tree.repulsion(i, &positions, &p, &mut rng);
            let exact = brute_force(i, &positions, &p);
            assert!((approx[0] - exact[0]).abs() < 1e-9);
            assert!((approx[1] - exact[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn default_theta_stays_close_to_exact() {
        let positions = grid(8);
        let tree = QuadTree::build(&positions);
        let p = params(0.9);
        let mut rng = StdRng::seed_from_u64(0);

        for i in [0, 7, 56, 63] {
            let approx = tree.repulsion(i, &positions, &p, &mut rng);
            let exact = brute_force(i, &positions, &p);
            let err = ((approx[0] - exact[0]).powi(2) + (approx[1] - exact[1]).powi(2)).sqrt();
            let norm = (exact[0].powi(2) + exact[1].powi(2)).sqrt();
            assert!(err <= 0.25 * norm + 1e-6, "node {i}: error {err} vs magnitude {norm}");
        }
    }

    #[test]
    fn repulsion_pushes_apart() {
        let positions = vec![[0.0, 0.0], [10.0, 0.0]];
        let tree = QuadTree::build(&positions);
        let mut rng = StdRng::seed_from_u64(0);

        let left = tree.repulsion(0, &positions, &params(0.9), &mut rng);
        let right = tree.repulsion(1, &positions, &params(0.9), &mut rng);
        assert!(left[0] < 0.0);
        assert!(right[0] > 0.0);
        assert!((left[0] + right[0]).abs() < 1e-12);
    }

    #[test]
    fn coincident_points_get_finite_separation() {
        let positions = vec![[5.0, 5.0]; 4];
        let tree = QuadTree::build(&positions);
        let mut rng = StdRng::seed_from_u64(42);

        assert_eq!(tree.len(), 4);
        for i in 0..4 {
            let f = tree.repulsion(i, &positions, &params(0.9), &mut rng);
            assert!(f[0].is_finite() && f[1].is_finite());
            assert!(f[0] != 0.0 || f[1] != 0.0);
        }
    }

    #[test]
    fn near_coincident_points_stop_splitting() {
        let positions = vec![[0.0, 0.0], [1e-300, 0.0], [100.0, 100.0]];
        let tree = QuadTree::build(&positions);

        assert_eq!(tree.len(), 3);
        assert!(tree.cell_count() <= 1 + 4 * MAX_DEPTH);
    }

    #[test]
    fn non_finite_points_are_skipped() {
        let positions = vec![[0.0, 0.0], [f64::NAN, 1.0], [3.0, 4.0]];
        let tree = QuadTree::build(&positions);

        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn inverse_linear_is_stronger_at_range() {
        let positions = vec![[0.0, 0.0], [50.0, 0.0]];
        let tree = QuadTree::build(&positions);
        let mut rng = StdRng::seed_from_u64(0);
        let linear = RepulsionParams {
            falloff: Falloff::InverseLinear,
            ..params(0.9)
        };

        let square = tree.repulsion(0, &positions, &params(0.9), &mut rng);
        let lin = tree.repulsion(0, &positions, &linear, &mut rng);
        assert!((square[0] - -300.0 / 2500.0).abs() < 1e-12);
        assert!((lin[0] - -300.0 / 50.0).abs() < 1e-12);
    }

    #[test]
    fn empty_tree_has_no_centroid() {
        let tree = QuadTree::build(&[]);
        assert!(tree.is_empty());
        assert!(tree.centroid().is_none());
    }
}
