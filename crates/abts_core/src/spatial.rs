//! Uniform grid for nearest-junction queries
//!
//! Points are projected onto a local equirectangular plane (longitude scaled
//! by the cosine of the mean latitude) and bucketed into square cells. A
//! query scans rings of cells outwards from the query cell and stops once
//! the next ring cannot hold anything closer than the best hit so far.

use rustc_hash::FxHashMap;

use crate::geo::Coord;
use crate::osm::OsmId;

/// Cell edge in projected degrees (~0.7 mi of latitude)
const DEFAULT_CELL_SIZE: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    lon_scale: f64,
    cells: FxHashMap<(i64, i64), Vec<(OsmId, f64, f64)>>,
    min_cell: (i64, i64),
    max_cell: (i64, i64),
}

impl SpatialIndex {
    pub fn build<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (OsmId, Coord)>,
    {
        Self::with_cell_size(points, DEFAULT_CELL_SIZE)
    }

    pub fn with_cell_size<I>(points: I, cell_size: f64) -> Self
    where
        I: IntoIterator<Item = (OsmId, Coord)>,
    {
        let points: Vec<(OsmId, Coord)> = points.into_iter().collect();
        let mean_lat = if points.is_empty() {
            0.0
        } else {
            points.iter().map(|(_, c)| c.lat).sum::<f64>() / points.len() as f64
        };

        let mut index = Self {
            cell_size,
            lon_scale: mean_lat.to_radians().cos().max(1e-6),
            cells: FxHashMap::default(),
            min_cell: (i64::MAX, i64::MAX),
            max_cell: (i64::MIN, i64::MIN),
        };

        for (id, coord) in points {
            let (x, y) = index.project(coord);
            let cell = index.cell_of(x, y);
            index.min_cell = (index.min_cell.0.min(cell.0), index.min_cell.1.min(cell.1));
            index.max_cell = (index.max_cell.0.max(cell.0), index.max_cell.1.max(cell.1));
            index.cells.entry(cell).or_default().push((id, x, y));
        }
        index
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Closest indexed point; ties go to the smaller id
    pub fn nearest(&self, coord: Coord) -> Option<OsmId> {
        if self.is_empty() {
            return None;
        }

        let (qx, qy) = self.project(coord);
        let (cx, cy) = self.cell_of(qx, qy);

        // rings needed to reach every occupied cell from the query cell
        let max_ring = [
            (cx - self.min_cell.0).abs(),
            (self.max_cell.0 - cx).abs(),
            (cy - self.min_cell.1).abs(),
            (self.max_cell.1 - cy).abs(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        let mut best: Option<(f64, OsmId)> = None;
        for ring in 0..=max_ring {
            for cell in ring_cells(cx, cy, ring) {
                let Some(points) = self.cells.get(&cell) else {
                    continue;
                };
                for &(id, x, y) in points {
                    let d2 = (x - qx).powi(2) + (y - qy).powi(2);
                    let better = match best {
                        None => true,
                        Some((best_d2, best_id)) => d2 < best_d2 || (d2 == best_d2 && id < best_id),
                    };
                    if better {
                        best = Some((d2, id));
                    }
                }
            }

            // everything beyond this ring is at least `ring * cell_size` away
            if let Some((best_d2, _)) = best {
                let reach = ring as f64 * self.cell_size;
                if best_d2 <= reach * reach {
                    break;
                }
            }
        }
        best.map(|(_, id)| id)
    }

    fn project(&self, coord: Coord) -> (f64, f64) {
        (coord.lon * self.lon_scale, coord.lat)
    }

    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }
}

/// Cells on the square ring at Chebyshev distance `ring`
fn ring_cells(cx: i64, cy: i64, ring: i64) -> Vec<(i64, i64)> {
    if ring == 0 {
        return vec![(cx, cy)];
    }
    let mut cells = Vec::with_capacity((8 * ring) as usize);
    for dx in -ring..=ring {
        cells.push((cx + dx, cy - ring));
        cells.push((cx + dx, cy + ring));
    }
    for dy in (-ring + 1)..ring {
        cells.push((cx - ring, cy + dy));
        cells.push((cx + ring, cy + dy));
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn brute_force(points: &[(OsmId, Coord)], q: Coord, lon_scale: f64) -> OsmId {
        let mut best = (f64::MAX, OsmId::MAX);
        for &(id, c) in points {
            let d2 = (c.lon * lon_scale - q.lon * lon_scale).powi(2) + (c.lat - q.lat).powi(2);
            if d2 < best.0 || (d2 == best.0 && id < best.1) {
                best = (d2, id);
            }
        }
        best.1
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::build(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.nearest(Coord::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_nearest_in_grid() {
        let points = vec![
            (1, Coord::new(51.500, -0.100)),
            (2, Coord::new(51.500, -0.095)),
            (3, Coord::new(51.505, -0.100)),
        ];
        let index = SpatialIndex::build(points);
        assert_eq!(index.nearest(Coord::new(51.5001, -0.0951)), Some(2));
        assert_eq!(index.nearest(Coord::new(51.5049, -0.1001)), Some(3));
    }

    #[test]
    fn test_far_query_still_finds_a_point() {
        let index = SpatialIndex::build(vec![(9, Coord::new(10.0, 10.0))]);
        assert_eq!(index.nearest(Coord::new(11.0, 12.0)), Some(9));
    }

    #[test]
    fn test_ring_cells_count() {
        assert_eq!(ring_cells(0, 0, 0).len(), 1);
        assert_eq!(ring_cells(0, 0, 1).len(), 8);
        assert_eq!(ring_cells(0, 0, 3).len(), 24);
    }

    proptest! {
        #[test]
        fn prop_matches_brute_force(
            raw in proptest::collection::vec((50.0f64..50.1, 1.0f64..1.1), 1..40),
            q_lat in 49.95f64..50.15,
            q_lon in 0.95f64..1.15,
        ) {
            let points: Vec<(OsmId, Coord)> = raw
                .iter()
                .enumerate()
                .map(|(i, (lat, lon))| (i as OsmId, Coord::new(*lat, *lon)))
                .collect();
            let index = SpatialIndex::with_cell_size(points.clone(), 0.005);
            let q = Coord::new(q_lat, q_lon);
            prop_assert_eq!(index.nearest(q), Some(brute_force(&points, q, index.lon_scale)));
        }
    }
}
