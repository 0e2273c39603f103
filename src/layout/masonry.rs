use crate::config::LayoutConfig;
use crate::models::{Grid, ItemGeometry, MediaItem};

/// Masonry packer for a column grid measured in display cells.
///
/// Every item gets the full cell width and a height that follows its aspect
/// ratio; items go to the currently shortest column.
#[derive(Debug, Clone, Default)]
pub struct MasonryLayout {
    config: LayoutConfig,
}

impl MasonryLayout {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Pick `(cell_width, columns)` for a viewport width.
    ///
    /// Aims for `target_columns`, clamps to the configured width bounds, then
    /// recomputes the column count so nothing overflows and widens the cells
    /// to share the leftover space (still capped at `max_cell_width`). Only a
    /// viewport narrower than `min_cell_width` produces narrower cells.
    pub fn cell_width(&self, viewport_width: usize) -> (usize, usize) {
        let gap = self.config.gap;
        let available = viewport_width.max(1);
        let target_columns = self.config.target_columns.max(1);
        let min_width = self.config.min_cell_width.max(1);
        let max_width = self.config.max_cell_width.max(min_width);

        let target = available.saturating_sub(gap * (target_columns - 1)) / target_columns;
        let width = target.clamp(min_width, max_width);

        let columns = ((available + gap) / (width + gap)).max(1);
        let fill = available.saturating_sub(gap * (columns - 1)) / columns;
        (fill.min(max_width).max(1), columns)
    }

    /// Rows an item occupies, including border and label overhead.
    ///
    /// The pixel aspect ratio is corrected for non-square cells before the
    /// image rows are clamped into the configured band.
    pub fn item_height(&self, aspect_ratio: f64, cell_width: usize) -> usize {
        let aspect = if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
            aspect_ratio
        } else {
            1.0
        };
        let rows = (cell_width as f64 * self.config.cell_aspect / aspect).round();
        let rows = if rows.is_finite() { rows as usize } else { 0 };
        let max_rows = self.config.max_image_rows.max(self.config.min_image_rows);
        rows.clamp(self.config.min_image_rows, max_rows) + self.config.label_overhead
    }

    /// Pack `items` in order into a new grid snapshot.
    pub fn compute(&self, items: &[MediaItem], viewport_width: usize, viewport_height: usize) -> Grid {
        let gap = self.config.gap;
        let (cell_width, columns) = self.cell_width(viewport_width);

        let mut column_heights = vec![0usize; columns];
        let mut column_members: Vec<Vec<usize>> = vec![Vec::new(); columns];
        let mut geometries = Vec::with_capacity(items.len());
        let mut positions = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let column = shortest_column(&column_heights);
            let y = column_heights[column];
            let height = self.item_height(item.aspect_ratio(), cell_width);

            geometries.push(ItemGeometry {
                column,
                y,
                height,
                estimated: item.is_estimated(),
            });
            positions.push(column_members[column].len());
            column_members[column].push(index);
            column_heights[column] = y + height + gap;
        }

        let total_height = column_heights.iter().copied().max().unwrap_or(0);
        Grid::new(
            cell_width,
            gap,
            viewport_width,
            viewport_height,
            geometries,
            column_members,
            positions,
            total_height,
        )
    }
}

/// Index of the shortest column; the lowest index wins ties.
fn shortest_column(heights: &[usize]) -> usize {
    let mut index = 0;
    let mut best = heights.first().copied().unwrap_or(0);
    for (i, height) in heights.iter().enumerate().skip(1) {
        if *height < best {
            best = *height;
            index = i;
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn unknown(n: usize) -> Vec<MediaItem> {
        (0..n)
            .map(|i| MediaItem::new(PathBuf::from(format!("/m/{i}.png")), format!("{i}.png")))
            .collect()
    }

    fn sized(dims: &[(u32, u32)]) -> Vec<MediaItem> {
        dims.iter()
            .enumerate()
            .map(|(i, (w, h))| {
                MediaItem::with_dimensions(PathBuf::from(format!("/m/{i}.png")), format!("{i}.png"), *w, *h)
            })
            .collect()
    }

    fn assert_grid_invariants(grid: &Grid, count: usize) {
        let mut seen = vec![0usize; count];
        for column in 0..grid.columns {
            let members = grid.column(column);
            for (pos, idx) in members.iter().enumerate() {
                seen[*idx] += 1;
                let geom = grid.geometry(*idx).unwrap();
                assert_eq!(geom.column, column);
                assert_eq!(grid.position(*idx), Some(pos));
            }
            for pair in members.windows(2) {
                let a = grid.geometry(pair[0]).unwrap();
                let b = grid.geometry(pair[1]).unwrap();
                assert!(b.y >= a.y + a.height + grid.gap, "overlap in column {column}");
            }
        }
        assert!(seen.iter().all(|n| *n == 1), "each item in exactly one column");
        assert!(grid.columns * grid.cell_width + grid.gap * (grid.columns - 1) <= grid.viewport_width.max(1));
    }

    #[test]
    fn test_seven_unknown_items_in_three_columns() {
        let layout = MasonryLayout::default();
        let grid = layout.compute(&unknown(7), 120, 40);

        assert_eq!(grid.columns, 3);
        let config = layout.config();
        assert!(grid.cell_width >= config.min_cell_width && grid.cell_width <= config.max_cell_width);

        let height = grid.geometry(0).unwrap().height;
        assert!(grid.geometries().iter().all(|g| g.height == height && g.estimated));
        assert_eq!(grid.total_height, 3 * (height + grid.gap));
        assert_eq!(grid.column(0), &[0, 3, 6]);
        assert_eq!(grid.column(1), &[1, 4]);
        assert_eq!(grid.column(2), &[2, 5]);
        assert_eq!(grid.position(0), Some(0));
        assert_eq!(grid.position(6), Some(2));
        assert_grid_invariants(&grid, 7);
    }

    #[test]
    fn test_shortest_column_first() {
        let layout = MasonryLayout::default();
        // Tall, wide, wide, then the next item must go under a wide one.
        let items = sized(&[(100, 400), (400, 100), (400, 100), (100, 100)]);
        let grid = layout.compute(&items, 120, 40);

        assert_eq!(grid.geometry(3).unwrap().column, 1);
        assert!(!grid.geometry(3).unwrap().estimated);
        assert_grid_invariants(&grid, items.len());
    }

    #[test]
    fn test_mixed_aspect_invariants() {
        let layout = MasonryLayout::default();
        let dims: Vec<(u32, u32)> = (0..50u32)
            .map(|i| (100 + (i * 37) % 300, 100 + (i * 53) % 300))
            .collect();
        let items = sized(&dims);
        for width in [10, 40, 80, 120, 200, 400] {
            let grid = layout.compute(&items, width, 30);
            assert_grid_invariants(&grid, items.len());
            let tallest = (0..grid.columns)
                .filter_map(|c| grid.column(c).last())
                .map(|i| grid.geometry(*i).unwrap().bottom() + grid.gap)
                .max()
                .unwrap();
            assert_eq!(grid.total_height, tallest);
        }
    }

    #[test]
    fn test_cell_width_bounds() {
        let layout = MasonryLayout::default();
        let config = layout.config().clone();

        let (w, cols) = layout.cell_width(400);
        assert!(w <= config.max_cell_width);
        assert!(cols * w + (cols - 1) * config.gap <= 400);
        assert!(cols > 3);

        // Narrower than one minimum cell: a single column that fits.
        let (w, cols) = layout.cell_width(10);
        assert_eq!((w, cols), (10, 1));

        let (w, cols) = layout.cell_width(50);
        assert!(w >= config.min_cell_width);
        assert!(cols * w + (cols - 1) * config.gap <= 50);
    }

    #[test]
    fn test_item_height_corrects_cell_aspect() {
        let layout = MasonryLayout::default();
        let overhead = layout.config().label_overhead;

        // Square image in 40-wide cells that are twice as tall as wide.
        assert_eq!(layout.item_height(1.0, 40), 20 + overhead);
        // Portrait doubles the rows.
        assert_eq!(layout.item_height(0.5, 40), 40 + overhead);
        // Extreme shapes are clamped into the band.
        assert_eq!(layout.item_height(100.0, 40), layout.config().min_image_rows + overhead);
        assert_eq!(layout.item_height(0.01, 40), layout.config().max_image_rows + overhead);
        // Garbage ratios behave like the unit estimate.
        assert_eq!(layout.item_height(0.0, 40), layout.item_height(1.0, 40));
    }

    #[test]
    fn test_empty_list() {
        let grid = MasonryLayout::default().compute(&[], 120, 40);
        assert!(grid.is_empty());
        assert_eq!(grid.total_height, 1);
        assert_eq!(grid.columns, 3);
    }
}
