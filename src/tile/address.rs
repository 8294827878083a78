use serde::Serialize;

/// Address of one tile in a quad-tree tiling scheme.
///
/// `row` counts down from the top of the grid and `col` counts right from
/// the left edge, so in XYZ terms `x = col` and `y = row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileAddress {
    pub level: u8,
    pub row: u32,
    pub col: u32,
}

impl TileAddress {
    pub fn new(level: u8, row: u32, col: u32) -> Self {
        Self { level, row, col }
    }

    /// True when row and col fall inside the level's `2^level` grid.
    pub fn in_grid(&self) -> bool {
        if self.level >= 32 {
            return true;
        }
        let n = 1u64 << self.level;
        (self.row as u64) < n && (self.col as u64) < n
    }
}

impl std::fmt::Display for TileAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.row, self.col)
    }
}
