//! Scan geometries: where in `(h, k, l, E)` the batch evaluates.

use tracing::warn;

/// A linear scan or a two-axis grid through `(h, k, l, E)` space.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanPath {
    /// `steps` points from `start` to `stop` inclusive.
    Line {
        start: [f64; 4],
        stop: [f64; 4],
        steps: usize,
    },
    /// Row-major grid spanned by two edges from a common origin.
    Grid {
        start: [f64; 4],
        corner1: [f64; 4],
        steps1: usize,
        corner2: [f64; 4],
        steps2: usize,
    },
}

impl ScanPath {
    pub fn line(start: [f64; 4], stop: [f64; 4], steps: usize) -> Self {
        ScanPath::Line { start, stop, steps }
    }

    pub fn grid(
        start: [f64; 4],
        corner1: [f64; 4],
        steps1: usize,
        corner2: [f64; 4],
        steps2: usize,
    ) -> Self {
        ScanPath::Grid { start, corner1, steps1, corner2, steps2 }
    }

    pub fn len(&self) -> usize {
        match *self {
            ScanPath::Line { steps, .. } => steps,
            ScanPath::Grid { steps1, steps2, .. } => steps1 * steps2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All scan positions, in evaluation order.
    pub fn points(&self) -> Vec<[f64; 4]> {
        match *self {
            ScanPath::Line { start, stop, steps } => (0..steps)
                .map(|i| lerp(&start, &stop, frac(i, steps)))
                .collect(),
            ScanPath::Grid { start, corner1, steps1, corner2, steps2 } => {
                let mut pts = Vec::with_capacity(steps1 * steps2);
                for i2 in 0..steps2 {
                    let row = lerp(&start, &corner2, frac(i2, steps2));
                    for i1 in 0..steps1 {
                        let edge = lerp(&start, &corner1, frac(i1, steps1));
                        let mut p = row;
                        for axis in 0..4 {
                            p[axis] += edge[axis] - start[axis];
                        }
                        pts.push(p);
                    }
                }
                pts
            }
        }
    }

    /// Index of the axis with the largest sweep. Plots and fits use the
    /// coordinate along this axis as their abscissa. For a grid, the
    /// first edge decides. Callers iterating a scan should compute this
    /// once per batch, not per point.
    pub fn scan_axis(&self) -> usize {
        let (start, stop) = match *self {
            ScanPath::Line { start, stop, .. } => (start, stop),
            ScanPath::Grid { start, corner1, .. } => (start, corner1),
        };
        let mut axis = 0;
        let mut span = 0.0;
        for i in 0..4 {
            let d = (stop[i] - start[i]).abs();
            if d > span {
                span = d;
                axis = i;
            }
        }
        if span == 0.0 {
            warn!("Scan has no extent along any axis.");
        }
        axis
    }
}

fn frac(i: usize, steps: usize) -> f64 {
    if steps < 2 {
        0.0
    } else {
        i as f64 / (steps - 1) as f64
    }
}

fn lerp(a: &[f64; 4], b: &[f64; 4], t: f64) -> [f64; 4] {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}
