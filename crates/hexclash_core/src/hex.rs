//! Hex grid math: distance, adjacency and pathfinding.
//!
//! The board uses an "odd-r" offset layout: pointy-top hexes stored as
//! `(col, row)`, with every odd row shifted half a cell to the right.
//! Distances are computed by converting to cube coordinates.
//!
//! Everything here is a pure function of its inputs. Neighbour order and
//! A* tie-breaking are fixed so that two runs of the same battle always
//! pick the same step.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// A cell on the battlefield, in offset coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HexCoord {
    /// Column, `0..width`.
    pub col: i32,
    /// Row, `0..height`.
    pub row: i32,
}

impl HexCoord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Check if this coordinate lies inside a `width × height` board.
    #[must_use]
    pub const fn in_bounds(self, width: u32, height: u32) -> bool {
        self.col >= 0 && self.row >= 0 && (self.col as u32) < width && (self.row as u32) < height
    }

    /// Reflect the row across the horizontal midline of a board with
    /// `total_height` rows. Used to place the away roster facing the home
    /// roster.
    #[must_use]
    pub const fn mirrored(self, total_height: u32) -> Self {
        Self {
            col: self.col,
            row: total_height as i32 - 1 - self.row,
        }
    }

    /// Cube coordinates `(x, y, z)` with `x + y + z == 0`.
    #[must_use]
    pub const fn to_cube(self) -> (i32, i32, i32) {
        let x = self.col - (self.row - (self.row & 1)) / 2;
        let z = self.row;
        (x, -x - z, z)
    }
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Neighbour offsets for even rows: E, NE, NW, W, SW, SE.
const EVEN_ROW_OFFSETS: [(i32, i32); 6] = [(1, 0), (0, -1), (-1, -1), (-1, 0), (-1, 1), (0, 1)];

/// Neighbour offsets for odd rows: E, NE, NW, W, SW, SE.
const ODD_ROW_OFFSETS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (0, 1), (1, 1)];

/// Hex distance between two cells (number of steps on an empty board).
#[must_use]
pub fn distance(a: HexCoord, b: HexCoord) -> u32 {
    let (ax, ay, az) = a.to_cube();
    let (bx, by, bz) = b.to_cube();
    ax.abs_diff(bx).max(ay.abs_diff(by)).max(az.abs_diff(bz))
}

/// The up-to-six neighbours of `c` that lie inside the board.
///
/// Order is always E, NE, NW, W, SW, SE with out-of-bounds cells skipped.
#[must_use]
pub fn valid_neighbors(c: HexCoord, width: u32, height: u32) -> Vec<HexCoord> {
    let offsets = if c.row & 1 == 0 {
        &EVEN_ROW_OFFSETS
    } else {
        &ODD_ROW_OFFSETS
    };

    offsets
        .iter()
        .map(|&(dc, dr)| HexCoord::new(c.col + dc, c.row + dr))
        .filter(|n| n.in_bounds(width, height))
        .collect()
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    coord: HexCoord,
    /// f_score = g_score + heuristic
    f_score: u32,
    /// Tie-breaker for determinism: lower rows first, then lower columns.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so we reverse the comparison for min-heap behavior.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[inline]
fn coords_to_tie_breaker(c: HexCoord) -> u64 {
    ((c.row as u32 as u64) << 32) | (c.col as u32 as u64)
}

/// Steps still needed to reach any cell adjacent to `goal`.
#[inline]
fn adjacency_heuristic(c: HexCoord, goal: HexCoord) -> u32 {
    distance(c, goal).saturating_sub(1)
}

/// Shortest path from `start` to a free cell adjacent to `goal`.
///
/// Cells in `blocked` are never entered (`start` itself is exempt, it is
/// normally occupied by the mover). The returned path excludes `start`
/// and ends on a neighbour of `goal`. It is empty when no such cell is
/// reachable, or when `start` is already adjacent to `goal`.
///
/// Callers only consume the first step each tick, since occupancy changes
/// as other units move.
#[must_use]
pub fn find_path(
    start: HexCoord,
    goal: HexCoord,
    blocked: &HashSet<HexCoord>,
    width: u32,
    height: u32,
) -> Vec<HexCoord> {
    if !start.in_bounds(width, height) || distance(start, goal) <= 1 {
        return Vec::new();
    }

    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<HexCoord, HexCoord> = HashMap::new();
    let mut g_score: HashMap<HexCoord, u32> = HashMap::new();

    g_score.insert(start, 0);
    open_set.push(AStarNode {
        coord: start,
        f_score: adjacency_heuristic(start, goal),
        tie_breaker: coords_to_tie_breaker(start),
    });

    while let Some(current) = open_set.pop() {
        let current_g = g_score.get(&current.coord).copied().unwrap_or(u32::MAX);

        if current.coord != start && distance(current.coord, goal) == 1 {
            return reconstruct_path(&came_from, start, current.coord);
        }

        // Stale heap entry for a node we already reached more cheaply.
        if current.f_score > current_g.saturating_add(adjacency_heuristic(current.coord, goal)) {
            continue;
        }

        for neighbor in valid_neighbors(current.coord, width, height) {
            if neighbor == goal || blocked.contains(&neighbor) {
                continue;
            }

            let tentative_g = current_g + 1;
            let neighbor_g = g_score.get(&neighbor).copied().unwrap_or(u32::MAX);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.coord);
                g_score.insert(neighbor, tentative_g);
                open_set.push(AStarNode {
                    coord: neighbor,
                    f_score: tentative_g + adjacency_heuristic(neighbor, goal),
                    tie_breaker: coords_to_tie_breaker(neighbor),
                });
            }
        }
    }

    Vec::new()
}

/// Reconstruct the path (excluding `start`) from the came_from map.
fn reconstruct_path(
    came_from: &HashMap<HexCoord, HexCoord>,
    start: HexCoord,
    end: HexCoord,
) -> Vec<HexCoord> {
    let mut path = vec![end];
    let mut current = end;

    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hex(col: i32, row: i32) -> HexCoord {
        HexCoord::new(col, row)
    }

    #[test]
    fn test_distance_basics() {
        assert_eq!(distance(hex(0, 0), hex(0, 0)), 0);
        assert_eq!(distance(hex(0, 0), hex(1, 0)), 1);
        assert_eq!(distance(hex(0, 0), hex(0, 1)), 1);
        assert_eq!(distance(hex(0, 0), hex(3, 0)), 3);
        assert_eq!(distance(hex(0, 0), hex(0, 2)), 2);
        assert_eq!(distance(hex(0, 3), hex(0, 4)), 1);
    }

    #[test]
    fn test_odd_row_shift() {
        // (1, 1) sits between (1, 0) and (2, 0) on an odd-r board.
        assert_eq!(distance(hex(1, 1), hex(1, 0)), 1);
        assert_eq!(distance(hex(1, 1), hex(2, 0)), 1);
        assert_eq!(distance(hex(1, 1), hex(0, 0)), 2);
    }

    #[test]
    fn test_neighbors_interior_cell() {
        let n = valid_neighbors(hex(3, 3), 7, 8);
        assert_eq!(n.len(), 6);
        for c in &n {
            assert_eq!(distance(hex(3, 3), *c), 1);
        }
    }

    #[test]
    fn test_neighbors_corner_cell() {
        let n = valid_neighbors(hex(0, 0), 7, 8);
        assert_eq!(n, vec![hex(1, 0), hex(0, 1)]);
    }

    #[test]
    fn test_neighbors_order_is_stable() {
        let a = valid_neighbors(hex(2, 5), 7, 8);
        let b = valid_neighbors(hex(2, 5), 7, 8);
        assert_eq!(a, b);
        assert_eq!(a[0], hex(3, 5));
    }

    #[test]
    fn test_mirroring() {
        assert_eq!(hex(2, 0).mirrored(8), hex(2, 7));
        assert_eq!(hex(2, 3).mirrored(8), hex(2, 4));
        assert_eq!(hex(2, 3).mirrored(8).mirrored(8), hex(2, 3));
    }

    #[test]
    fn test_straight_path() {
        let path = find_path(hex(0, 0), hex(5, 0), &HashSet::new(), 7, 8);
        assert_eq!(path.len(), 4);
        assert_eq!(path.last().copied(), Some(hex(4, 0)));
        assert_eq!(distance(hex(0, 0), path[0]), 1);
    }

    #[test]
    fn test_path_around_wall() {
        let blocked: HashSet<HexCoord> = (0..7).filter(|&r| r != 6).map(|r| hex(3, r)).collect();
        let path = find_path(hex(0, 2), hex(6, 2), &blocked, 7, 8);

        assert!(!path.is_empty());
        for step in &path {
            assert!(!blocked.contains(step), "path enters blocked cell {step}");
        }
        assert_eq!(distance(*path.last().unwrap(), hex(6, 2)), 1);
    }

    #[test]
    fn test_unreachable_returns_empty() {
        let blocked: HashSet<HexCoord> = (0..8).map(|r| hex(3, r)).collect();
        let path = find_path(hex(0, 2), hex(6, 2), &blocked, 7, 8);
        assert!(path.is_empty());
    }

    #[test]
    fn test_already_adjacent_returns_empty() {
        let path = find_path(hex(0, 3), hex(0, 4), &HashSet::new(), 7, 8);
        assert!(path.is_empty());
    }

    #[test]
    fn test_surrounded_goal_is_unreachable() {
        let goal = hex(3, 3);
        let blocked: HashSet<HexCoord> = valid_neighbors(goal, 7, 8).into_iter().collect();
        let path = find_path(hex(0, 0), goal, &blocked, 7, 8);
        assert!(path.is_empty());
    }

    #[test]
    fn test_path_determinism() {
        let blocked: HashSet<HexCoord> = [hex(2, 2), hex(3, 3), hex(2, 4)].into_iter().collect();
        let p1 = find_path(hex(0, 3), hex(6, 3), &blocked, 7, 8);
        let p2 = find_path(hex(0, 3), hex(6, 3), &blocked, 7, 8);
        assert_eq!(p1, p2);
    }

    fn arb_hex() -> impl Strategy<Value = HexCoord> {
        (0i32..7, 0i32..8).prop_map(|(c, r)| HexCoord::new(c, r))
    }

    proptest! {
        #[test]
        fn prop_distance_is_a_metric(a in arb_hex(), b in arb_hex(), c in arb_hex()) {
            prop_assert_eq!(distance(a, b), distance(b, a));
            prop_assert_eq!(distance(a, a), 0);
            prop_assert!(distance(a, c) <= distance(a, b) + distance(b, c));
        }

        #[test]
        fn prop_neighbors_are_adjacent_and_in_bounds(c in arb_hex()) {
            for n in valid_neighbors(c, 7, 8) {
                prop_assert_eq!(distance(c, n), 1);
                prop_assert!(n.in_bounds(7, 8));
            }
        }

        #[test]
        fn prop_open_board_path_is_shortest(a in arb_hex(), b in arb_hex()) {
            let path = find_path(a, b, &HashSet::new(), 7, 8);
            if distance(a, b) > 1 {
                prop_assert_eq!(path.len() as u32, distance(a, b) - 1);
            } else {
                prop_assert!(path.is_empty());
            }
        }
    }
}
