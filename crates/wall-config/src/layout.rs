/// Rows and columns of a tile grid.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Grid {
    pub rows: u32,
    pub columns: u32,
}

impl Grid {
    pub fn capacity(&self) -> u32 {
        self.rows * self.columns
    }
}

/// Grid used for `count` tiles.
///
/// Small walls use fixed shapes (1x2, 2x2, 3x2, 3x3); larger ones get the
/// smallest square that fits.
pub fn grid_for(count: usize) -> Grid {
    match count {
        0..=2 => Grid {
            rows: 1,
            columns: 2,
        },
        3..=4 => Grid {
            rows: 2,
            columns: 2,
        },
        5..=6 => Grid {
            rows: 3,
            columns: 2,
        },
        7..=9 => Grid {
            rows: 3,
            columns: 3,
        },
        n => {
            let mut side = (n as f64).sqrt().ceil() as u32;
            while (side as usize) * (side as usize) < n {
                side += 1;
            }
            Grid {
                rows: side,
                columns: side,
            }
        }
    }
}

/// Size of one cell when a `surface_width` x `surface_height` area is split by `grid`.
pub fn cell_size(surface_width: u32, surface_height: u32, grid: Grid) -> (u32, u32) {
    (
        surface_width / grid.columns.max(1),
        surface_height / grid.rows.max(1),
    )
}

/// Row-major `(row, column)` of tile `index`.
pub fn position(index: usize, grid: Grid) -> (u32, u32) {
    let columns = grid.columns.max(1) as usize;
    ((index / columns) as u32, (index % columns) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_shapes() {
        assert_eq!(grid_for(1), Grid { rows: 1, columns: 2 });
        assert_eq!(grid_for(2), Grid { rows: 1, columns: 2 });
        assert_eq!(grid_for(3), Grid { rows: 2, columns: 2 });
        assert_eq!(grid_for(6), Grid { rows: 3, columns: 2 });
        assert_eq!(grid_for(9), Grid { rows: 3, columns: 3 });
    }

    #[test]
    fn test_large_walls_are_square() {
        assert_eq!(grid_for(10), Grid { rows: 4, columns: 4 });
        assert_eq!(grid_for(16), Grid { rows: 4, columns: 4 });
        assert_eq!(grid_for(17), Grid { rows: 5, columns: 5 });
        for n in 1..100 {
            assert!(grid_for(n).capacity() as usize >= n);
        }
    }

    #[test]
    fn test_cell_size() {
        let grid = grid_for(4);
        assert_eq!(cell_size(1920, 1080, grid), (960, 540));
        let grid = grid_for(5);
        assert_eq!(cell_size(1920, 1080, grid), (960, 360));
    }

    #[test]
    fn test_positions_are_row_major() {
        let grid = grid_for(5);
        assert_eq!(position(0, grid), (0, 0));
        assert_eq!(position(1, grid), (0, 1));
        assert_eq!(position(2, grid), (1, 0));
        assert_eq!(position(4, grid), (2, 0));
    }
}
