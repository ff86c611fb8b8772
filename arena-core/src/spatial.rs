//! Uniform-grid spatial hash for proximity queries.
//!
//! Rebuilt every tick: `clear()` then `insert()` every live entity. Queries
//! return every entity whose cell overlaps the query's bounding box, which is
//! a superset of the entities actually within range. Callers run the exact
//! circle tests themselves.

use glam::Vec2;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Default cell edge length (world units)
pub const DEFAULT_CELL_SIZE: f32 = 128.0;

type CellKey = (i32, i32);

#[derive(Debug, Clone)]
pub struct SpatialHash<T> {
    cell_size: f32,
    cells: HashMap<CellKey, Vec<T>>,
    len: usize,
}

impl<T: Copy + Eq + Hash> SpatialHash<T> {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            cells: HashMap::new(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Drop all buckets. Allocated vectors are kept for the next rebuild.
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn cell_of(&self, x: f32, y: f32) -> CellKey {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Bucket an entity by `floor(position / cell_size)`.
    pub fn insert(&mut self, item: T, pos: Vec2) {
        if !pos.is_finite() {
            return;
        }
        let key = self.cell_of(pos.x, pos.y);
        self.cells.entry(key).or_default().push(item);
        self.len += 1;
    }

    /// All entities in cells overlapping the box `[x-r, x+r] x [y-r, y+r]`,
    /// each returned once.
    pub fn query(&self, x: f32, y: f32, radius: f32) -> Vec<T> {
        let mut out = Vec::new();
        self.query_into(x, y, radius, &mut out);
        out
    }

    /// Same as [`query`](Self::query) but appends into a reusable buffer.
    pub fn query_into(&self, x: f32, y: f32, radius: f32, out: &mut Vec<T>) {
        if !(x.is_finite() && y.is_finite() && radius.is_finite()) {
            return;
        }
        let r = radius.max(0.0);
        let (min_x, min_y) = self.cell_of(x - r, y - r);
        let (max_x, max_y) = self.cell_of(x + r, y + r);
        let mut seen: HashSet<T> = HashSet::new();
        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    for item in bucket {
                        if seen.insert(*item) {
                            out.push(*item);
                        }
                    }
                }
            }
        }
    }
}

impl<T: Copy + Eq + Hash> Default for SpatialHash<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_query_same_cell() {
        let mut grid = SpatialHash::new(100.0);
        grid.insert(1u32, Vec2::new(10.0, 10.0));
        grid.insert(2u32, Vec2::new(20.0, 30.0));
        let mut found = grid.query(15.0, 15.0, 5.0);
        found.sort();
        assert_eq!(found, vec![1, 2]);
    }

    #[test]
    fn test_query_spans_neighbour_cells() {
        let mut grid = SpatialHash::new(100.0);
        grid.insert(1u32, Vec2::new(99.0, 50.0));
        grid.insert(2u32, Vec2::new(101.0, 50.0));
        grid.insert(3u32, Vec2::new(450.0, 50.0));
        let mut found = grid.query(100.0, 50.0, 10.0);
        found.sort();
        assert_eq!(found, vec![1, 2]);
    }

    #[test]
    fn test_negative_coordinates_use_floor() {
        let mut grid = SpatialHash::new(100.0);
        grid.insert(7u32, Vec2::new(-1.0, -1.0));
        assert_eq!(grid.query(-5.0, -5.0, 1.0), vec![7]);
        assert!(grid.query(50.0, 50.0, 1.0).is_empty());
    }

    #[test]
    fn test_no_duplicates_on_double_insert() {
        let mut grid = SpatialHash::new(50.0);
        grid.insert(1u32, Vec2::new(10.0, 10.0));
        grid.insert(1u32, Vec2::new(60.0, 10.0));
        assert_eq!(grid.query(30.0, 10.0, 60.0), vec![1]);
    }

    #[test]
    fn test_clear_empties_buckets() {
        let mut grid = SpatialHash::new(64.0);
        grid.insert(1u32, Vec2::new(1.0, 1.0));
        assert_eq!(grid.len(), 1);
        grid.clear();
        assert!(grid.is_empty());
        assert!(grid.query(1.0, 1.0, 100.0).is_empty());
    }

    #[test]
    fn test_non_finite_ignored() {
        let mut grid = SpatialHash::new(64.0);
        grid.insert(1u32, Vec2::new(f32::NAN, 0.0));
        assert!(grid.is_empty());
        assert!(grid.query(f32::NAN, 0.0, 10.0).is_empty());
    }
}
