// Route planning on an occupancy grid
//
// A* over square cells with 8-way moves and Euclidean costs, followed by an
// averaging pass that rounds off the grid corners. Routes are plain world
// points in meters, the same frame the status record reports.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::{DEFAULT_GRID_SIZE, SEARCH_MARGIN_CELLS};

/// World position in meters
pub type Point = (f64, f64);

type Cell = (i64, i64);

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Open-set entry, ordered so the heap pops the lowest estimated total first
#[derive(Debug, Clone, Copy)]
struct Candidate {
    estimate: f64,
    cost: f64,
    cell: Cell,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .total_cmp(&self.estimate)
            .then_with(|| self.cell.cmp(&other.cell))
    }
}

fn distance(a: Cell, b: Cell) -> f64 {
    (((a.0 - b.0).pow(2) + (a.1 - b.1).pow(2)) as f64).sqrt()
}

pub struct PathPlanner {
    grid_size: f64,
    obstacles: HashSet<Cell>,
}

impl Default for PathPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}

impl PathPlanner {
    /// `grid_size` is the cell edge in meters; unusable sizes fall back to
    /// the default
    pub fn new(grid_size: f64) -> Self {
        let grid_size = if grid_size.is_finite() && grid_size > 0.0 {
            grid_size
        } else {
            warn!("Invalid grid size {}, using {}", grid_size, DEFAULT_GRID_SIZE);
            DEFAULT_GRID_SIZE
        };
        Self {
            grid_size,
            obstacles: HashSet::new(),
        }
    }

    pub fn grid_size(&self) -> f64 {
        self.grid_size
    }

    /// Block the cell containing `position`
    pub fn add_obstacle(&mut self, position: Point) {
        self.obstacles.insert(self.cell_of(position));
    }

    pub fn add_obstacles(&mut self, positions: impl IntoIterator<Item = Point>) {
        for position in positions {
            self.add_obstacle(position);
        }
    }

    pub fn clear_obstacles(&mut self) {
        self.obstacles.clear();
    }

    pub fn is_blocked(&self, position: Point) -> bool {
        self.obstacles.contains(&self.cell_of(position))
    }

    fn cell_of(&self, position: Point) -> Cell {
        (
            (position.0 / self.grid_size).floor() as i64,
            (position.1 / self.grid_size).floor() as i64,
        )
    }

    fn point_of(&self, cell: Cell) -> Point {
        (cell.0 as f64 * self.grid_size, cell.1 as f64 * self.grid_size)
    }

    /// Shortest route from `start` to `goal`, both ends included.
    ///
    /// Interior waypoints sit on cell corners. Returns `None` when the goal
    /// cell is blocked or walled off; the search stays within a margin
    /// around the two endpoints, so an enclosed goal fails instead of
    /// searching forever.
    pub fn find_path(&self, start: Point, goal: Point) -> Option<Vec<Point>> {
        let start_cell = self.cell_of(start);
        let goal_cell = self.cell_of(goal);

        if self.obstacles.contains(&goal_cell) {
            warn!("Goal ({:.1}, {:.1}) is inside an obstacle", goal.0, goal.1);
            return None;
        }

        let min = (
            start_cell.0.min(goal_cell.0) - SEARCH_MARGIN_CELLS,
            start_cell.1.min(goal_cell.1) - SEARCH_MARGIN_CELLS,
        );
        let max = (
            start_cell.0.max(goal_cell.0) + SEARCH_MARGIN_CELLS,
            start_cell.1.max(goal_cell.1) + SEARCH_MARGIN_CELLS,
        );

        let mut open = BinaryHeap::new();
        let mut best_cost: HashMap<Cell, f64> = HashMap::new();
        let mut came_from: HashMap<Cell, Cell> = HashMap::new();
        let mut closed: HashSet<Cell> = HashSet::new();

        best_cost.insert(start_cell, 0.0);
        open.push(Candidate {
            estimate: distance(start_cell, goal_cell),
            cost: 0.0,
            cell: start_cell,
        });

        while let Some(current) = open.pop() {
            if current.cell == goal_cell {
                let route = self.reconstruct(&came_from, goal_cell, start, goal);
                debug!("Route found: {} waypoints, {} cells expanded", route.len(), closed.len());
                return Some(route);
            }
            // Superseded heap entry
            if !closed.insert(current.cell) {
                continue;
            }

            for (dx, dy) in NEIGHBOURS {
                let next = (current.cell.0 + dx, current.cell.1 + dy);
                if next.0 < min.0 || next.0 > max.0 || next.1 < min.1 || next.1 > max.1 {
                    continue;
                }
                if self.obstacles.contains(&next) || closed.contains(&next) {
                    continue;
                }

                let cost = current.cost + distance(current.cell, next);
                if best_cost.get(&next).is_some_and(|&known| known <= cost) {
                    continue;
                }
                best_cost.insert(next, cost);
                came_from.insert(next, current.cell);
                open.push(Candidate {
                    estimate: cost + distance(next, goal_cell),
                    cost,
                    cell: next,
                });
            }
        }

        warn!(
            "No route from ({:.1}, {:.1}) to ({:.1}, {:.1})",
            start.0, start.1, goal.0, goal.1
        );
        None
    }

    fn reconstruct(
        &self,
        came_from: &HashMap<Cell, Cell>,
        goal_cell: Cell,
        start: Point,
        goal: Point,
    ) -> Vec<Point> {
        let mut cells = vec![goal_cell];
        let mut cell = goal_cell;
        while let Some(&previous) = came_from.get(&cell) {
            cells.push(previous);
            cell = previous;
        }
        cells.reverse();

        let mut route: Vec<Point> = cells.into_iter().map(|c| self.point_of(c)).collect();
        // Exact endpoints instead of their cell corners
        if let Some(first) = route.first_mut() {
            *first = start;
        }
        if route.len() > 1 {
            if let Some(last) = route.last_mut() {
                *last = goal;
            }
        } else {
            route.push(goal);
        }
        route
    }
}

/// Round off a route by averaging each interior point with its neighbours,
/// `iterations` times. The endpoints never move.
pub fn smooth_path(route: &[Point], iterations: usize) -> Vec<Point> {
    let mut smoothed = route.to_vec();
    if smoothed.len() < 3 {
        return smoothed;
    }

    for _ in 0..iterations {
        let previous = smoothed.clone();
        for i in 1..previous.len() - 1 {
            let (a, b, c) = (previous[i - 1], previous[i], previous[i + 1]);
            smoothed[i] = ((a.0 + b.0 + c.0) / 3.0, (a.1 + b.1 + c.1) / 3.0);
        }
    }
    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn test_straight_route_on_open_grid() {
        let planner = PathPlanner::new(2.0);
        let route = planner.find_path((0.0, 0.0), (10.0, 0.0)).unwrap();
        assert_eq!(
            route,
            vec![(0.0, 0.0), (2.0, 0.0), (4.0, 0.0), (6.0, 0.0), (8.0, 0.0), (10.0, 0.0)]
        );
    }

    #[test]
    fn test_diagonal_moves_allowed() {
        let planner = PathPlanner::new(1.0);
        let route = planner.find_path((0.0, 0.0), (5.0, 5.0)).unwrap();
        // One diagonal step per cell
        assert_eq!(route.len(), 6);
    }

    #[test]
    fn test_route_avoids_obstacles() {
        let mut planner = PathPlanner::new(1.0);
        planner.add_obstacles([(5.0, 5.0), (5.0, 6.0), (5.0, 7.0), (6.0, 5.0), (7.0, 5.0)]);

        let route = planner.find_path((0.0, 0.0), (10.0, 10.0)).unwrap();
        assert!(close(route[0], (0.0, 0.0)));
        assert!(close(*route.last().unwrap(), (10.0, 10.0)));
        assert!(route.iter().all(|&p| !planner.is_blocked(p)));
        // The blocked diagonal costs a detour
        assert!(route.len() > 11);
    }

    #[test]
    fn test_wall_forces_way_around() {
        let mut planner = PathPlanner::new(1.0);
        for y in -3..=3 {
            planner.add_obstacle((3.0, y as f64));
        }
        let route = planner.find_path((0.0, 0.0), (6.0, 0.0)).unwrap();
        assert!(route.iter().all(|&p| !planner.is_blocked(p)));
        assert!(route.iter().any(|p| p.1.abs() >= 4.0));
    }

    #[test]
    fn test_enclosed_goal_has_no_route() {
        let mut planner = PathPlanner::new(1.0);
        for (dx, dy) in NEIGHBOURS {
            planner.add_obstacle((10.0 + dx as f64, 10.0 + dy as f64));
        }
        assert!(planner.find_path((0.0, 0.0), (10.0, 10.0)).is_none());
    }

    #[test]
    fn test_blocked_goal_has_no_route() {
        let mut planner = PathPlanner::default();
        planner.add_obstacle((4.5, 4.5));
        assert!(planner.find_path((0.0, 0.0), (5.0, 5.0)).is_none());

        planner.clear_obstacles();
        assert!(planner.find_path((0.0, 0.0), (5.0, 5.0)).is_some());
    }

    #[test]
    fn test_negative_coordinates_use_their_own_cells() {
        let mut planner = PathPlanner::new(2.0);
        planner.add_obstacle((-1.0, -1.0));
        assert!(planner.is_blocked((-0.5, -1.5)));
        assert!(!planner.is_blocked((0.5, 0.5)));
    }

    #[test]
    fn test_start_in_goal_cell() {
        let planner = PathPlanner::new(2.0);
        let route = planner.find_path((0.2, 0.2), (1.5, 1.0)).unwrap();
        assert_eq!(route, vec![(0.2, 0.2), (1.5, 1.0)]);
    }

    #[test]
    fn test_invalid_grid_size_falls_back() {
        assert_eq!(PathPlanner::new(0.0).grid_size(), DEFAULT_GRID_SIZE);
        assert_eq!(PathPlanner::new(f64::NAN).grid_size(), DEFAULT_GRID_SIZE);
    }

    #[test]
    fn test_smoothing_keeps_endpoints() {
        let route = vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (4.0, 2.0)];
        let smoothed = smooth_path(&route, 3);
        assert_eq!(smoothed.len(), route.len());
        assert_eq!(smoothed[0], route[0]);
        assert_eq!(smoothed[3], route[3]);
        // The corner at (2, 0) is pulled inward
        assert!(smoothed[1].1 > 0.0);
    }

    #[test]
    fn test_smoothing_short_routes_untouched() {
        let route = vec![(0.0, 0.0), (3.0, 4.0)];
        assert_eq!(smooth_path(&route, 3), route);
        assert!(smooth_path(&[], 3).is_empty());
    }

    #[test]
    fn test_smoothing_straight_line_is_stable() {
        let route = vec![(0.0, 0.0), (2.0, 0.0), (4.0, 0.0), (6.0, 0.0)];
        let smoothed = smooth_path(&route, 3);
        assert!(smoothed.iter().zip(&route).all(|(&a, &b)| close(a, b)));
    }
}
