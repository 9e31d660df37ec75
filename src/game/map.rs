//! Static world grid and terrain lookups

use serde::{Deserialize, Serialize};

use super::player::Position;

/// Largest accepted map side; keeps every cell index inside `i32`
pub const MAX_MAP_SIDE: u32 = 10_000;

/// Terrain of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Open,
    Obstacle,
}

impl Terrain {
    fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '.' => Some(Self::Open),
            '#' => Some(Self::Obstacle),
            _ => None,
        }
    }
}

/// Map loading errors
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Map has no cells")]
    Empty,

    #[error("Map row {row} has width {found}, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Map is {width}x{height}, sides are limited to {MAX_MAP_SIDE}")]
    TooLarge { width: usize, height: usize },

    #[error("Unknown map glyph {glyph:?} at ({x}, {y})")]
    UnknownGlyph { glyph: char, x: usize, y: usize },
}

/// Fixed-size grid, row-major, origin at the top-left corner.
///
/// The map never changes once a world is built, so it is shared read-only
/// between movement validation and vision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMap {
    width: i32,
    height: i32,
    cells: Vec<Terrain>,
}

impl GameMap {
    /// Build an obstacle-free map
    pub fn open(width: u32, height: u32) -> Result<Self, MapError> {
        if width == 0 || height == 0 {
            return Err(MapError::Empty);
        }
        let (w, h) = checked_dimensions(width as usize, height as usize)?;
        Ok(Self {
            width: w,
            height: h,
            cells: vec![Terrain::Open; width as usize * height as usize],
        })
    }

    /// Parse an ASCII map: `.` is open ground, `#` is an obstacle.
    /// Blank lines are ignored, every remaining row must have the same width.
    pub fn parse(text: &str) -> Result<Self, MapError> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect();

        let width = rows.first().map(|row| row.chars().count()).unwrap_or(0);
        if width == 0 {
            return Err(MapError::Empty);
        }
        let (w, h) = checked_dimensions(width, rows.len())?;

        let mut cells = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != width {
                return Err(MapError::Ragged {
                    row: y,
                    expected: width,
                    found,
                });
            }
            for (x, glyph) in row.chars().enumerate() {
                let terrain =
                    Terrain::from_glyph(glyph).ok_or(MapError::UnknownGlyph { glyph, x, y })?;
                cells.push(terrain);
            }
        }

        Ok(Self {
            width: w,
            height: h,
            cells,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Terrain at `pos`, `None` when out of bounds
    pub fn terrain(&self, pos: Position) -> Option<Terrain> {
        if !self.in_bounds(pos) {
            return None;
        }
        // In bounds, so both coordinates are non-negative
        let index = pos.y as usize * self.width as usize + pos.x as usize;
        self.cells.get(index).copied()
    }

    pub fn is_obstacle(&self, pos: Position) -> bool {
        self.terrain(pos) == Some(Terrain::Obstacle)
    }

    /// True when `pos` is a cell a player may stand on
    pub fn is_walkable(&self, pos: Position) -> bool {
        self.terrain(pos) == Some(Terrain::Open)
    }

    /// All walkable cells in row-major order
    pub fn open_cells(&self) -> Vec<Position> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Position::new(x, y)))
            .filter(|pos| self.is_walkable(*pos))
            .collect()
    }
}

fn checked_dimensions(width: usize, height: usize) -> Result<(i32, i32), MapError> {
    let too_large = MapError::TooLarge { width, height };
    let side = |n: usize| {
        u32::try_from(n)
            .ok()
            .filter(|n| *n <= MAX_MAP_SIDE)
            .and_then(|n| i32::try_from(n).ok())
    };
    match (side(width), side(height)) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(too_large),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ascii_rows() {
        let map = GameMap::parse("..#\n#..\n").unwrap();
        assert_eq!(map.width(), 3);
        assert_eq!(map.height(), 2);
        assert_eq!(map.terrain(Position::new(2, 0)), Some(Terrain::Obstacle));
        assert_eq!(map.terrain(Position::new(0, 1)), Some(Terrain::Obstacle));
        assert_eq!(map.terrain(Position::new(1, 1)), Some(Terrain::Open));
        assert_eq!(map.terrain(Position::new(3, 0)), None);
        assert_eq!(map.terrain(Position::new(-1, 0)), None);
    }

    #[test]
    fn rejects_bad_maps() {
        assert!(matches!(GameMap::parse(""), Err(MapError::Empty)));
        assert!(matches!(
            GameMap::parse("...\n..\n"),
            Err(MapError::Ragged { row: 1, expected: 3, found: 2 })
        ));
        assert!(matches!(
            GameMap::parse("..x\n"),
            Err(MapError::UnknownGlyph { glyph: 'x', x: 2, y: 0 })
        ));
        assert!(matches!(GameMap::open(0, 4), Err(MapError::Empty)));
    }

    #[test]
    fn rejects_oversized_maps() {
        assert!(matches!(
            GameMap::open(3_000_000_000, 1),
            Err(MapError::TooLarge { .. })
        ));
        assert!(matches!(
            GameMap::open(1, MAX_MAP_SIDE + 1),
            Err(MapError::TooLarge { .. })
        ));
        let row = ".".repeat(MAX_MAP_SIDE as usize + 1);
        assert!(matches!(
            GameMap::parse(&row),
            Err(MapError::TooLarge { .. })
        ));

        let edge = GameMap::open(MAX_MAP_SIDE, 1).unwrap();
        assert_eq!(edge.width(), MAX_MAP_SIDE as i32);
        assert!(edge.is_walkable(Position::new(MAX_MAP_SIDE as i32 - 1, 0)));
    }

    #[test]
    fn open_cells_skip_obstacles() {
        let map = GameMap::parse("#.\n.#\n").unwrap();
        assert_eq!(
            map.open_cells(),
            vec![Position::new(1, 0), Position::new(0, 1)]
        );
        assert!(!map.is_walkable(Position::new(5, 5)));
    }
}
