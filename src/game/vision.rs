//! Field of view: which cells and which players a given player can see
//!
//! Sight is a Euclidean disc around the viewer, clipped by line of sight.
//! Line of sight runs between cell centres. A cell blocks everything
//! strictly behind it on that segment; the target cell itself is always
//! reachable, so walls are visible. When the segment passes exactly through
//! a grid corner it steps diagonally and touches neither of the two side
//! cells, i.e. corner-grazing rays are never blocked.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use super::map::{GameMap, Terrain};
use super::player::{Player, PlayerSummary, Position, Role};

/// Role-dependent sight radii
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SightRules {
    /// Villager sight radius in cells
    pub villager_radius: f64,
    /// Werewolf radius = villager radius * multiplier
    pub werewolf_multiplier: f64,
}

impl Default for SightRules {
    fn default() -> Self {
        Self {
            villager_radius: 4.0,
            werewolf_multiplier: 1.5,
        }
    }
}

impl SightRules {
    pub fn radius(&self, role: Role) -> f64 {
        match role {
            Role::Villager => self.villager_radius,
            Role::Werewolf => self.villager_radius * self.werewolf_multiplier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisibleCell {
    pub x: i32,
    pub y: i32,
    pub terrain: Terrain,
}

/// Result of a vision query
#[derive(Debug, Clone, Serialize)]
pub struct VisionReport {
    pub radius: f64,
    /// Row-major order
    pub cells: Vec<VisibleCell>,
    /// Sorted by login
    pub players: Vec<PlayerSummary>,
}

/// True when nothing opaque lies strictly between the two cell centres.
///
/// Walks the cells crossed by the segment in order of the parameter `t` at
/// which it crosses each vertical or horizontal grid line. In units where
/// cells are 1 wide, the k-th vertical crossing happens at
/// `t = (2k - 1) / (2 |dx|)`; comparing two crossings is done by cross
/// multiplication so no floating point is involved.
pub fn has_line_of_sight(map: &GameMap, from: Position, to: Position) -> bool {
    let ax = i64::from(from.x.abs_diff(to.x));
    let ay = i64::from(from.y.abs_diff(to.y));
    let sx = (to.x - from.x).signum();
    let sy = (to.y - from.y).signum();

    let mut cur = from;
    let (mut kx, mut ky) = (1i64, 1i64);

    while cur != to {
        let order = if ay == 0 {
            Ordering::Less
        } else if ax == 0 {
            Ordering::Greater
        } else {
            ((2 * kx - 1) * ay).cmp(&((2 * ky - 1) * ax))
        };

        match order {
            Ordering::Less => {
                cur.x += sx;
                kx += 1;
            }
            Ordering::Greater => {
                cur.y += sy;
                ky += 1;
            }
            Ordering::Equal => {
                cur.x += sx;
                cur.y += sy;
                kx += 1;
                ky += 1;
            }
        }

        if cur != to && map.is_obstacle(cur) {
            return false;
        }
    }
    true
}

/// Computes vision for one viewer. Cost grows with the sight radius, not
/// with the map: only the disc's bounding box is scanned, one ray per cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisionEngine {
    pub sight: SightRules,
}

impl VisionEngine {
    pub fn new(sight: SightRules) -> Self {
        Self { sight }
    }

    /// Cells visible from `origin` within `radius`
    pub fn visible_cells(&self, map: &GameMap, origin: Position, radius: f64) -> Vec<VisibleCell> {
        let reach = radius.max(0.0).floor() as i32;
        let radius_sq = radius * radius;

        let min_x = origin.x.saturating_sub(reach).max(0);
        let max_x = origin.x.saturating_add(reach).min(map.width() - 1);
        let min_y = origin.y.saturating_sub(reach).max(0);
        let max_y = origin.y.saturating_add(reach).min(map.height() - 1);

        let mut cells = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let pos = Position::new(x, y);
                if origin.distance_sq(pos) as f64 > radius_sq {
                    continue;
                }
                let Some(terrain) = map.terrain(pos) else {
                    continue;
                };
                if has_line_of_sight(map, origin, pos) {
                    cells.push(VisibleCell { x, y, terrain });
                }
            }
        }
        cells
    }

    /// Full vision for `viewer`: visible cells, alive players standing on
    /// them, and every dead player regardless of range.
    pub fn compute<'a>(
        &self,
        map: &GameMap,
        viewer: &Player,
        others: impl IntoIterator<Item = &'a Player>,
    ) -> VisionReport {
        let radius = self.sight.radius(viewer.role);
        let cells = self.visible_cells(map, viewer.position, radius);
        let seen: HashSet<Position> = cells.iter().map(|c| Position::new(c.x, c.y)).collect();

        let mut players: Vec<PlayerSummary> = others
            .into_iter()
            .filter(|other| other.id != viewer.id)
            .filter(|other| !other.is_alive() || seen.contains(&other.position))
            .map(Player::summary)
            .collect();
        players.sort_by(|a, b| a.login.cmp(&b.login));

        VisionReport {
            radius,
            cells,
            players,
        }
    }
}
