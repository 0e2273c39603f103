//! Scroll state, visible range and keyboard navigation over a masonry grid.
//!
//! Navigation:
//! - Up/Down walk the current column
//! - Left/Right jump to the item of the neighbouring column whose vertical
//!   center is closest to the current one

use std::collections::BTreeSet;

use crate::models::Grid;

/// Navigation direction for grid movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewportState {
    /// First visible row of the content.
    pub scroll_offset: usize,
    /// Selected item index. Indices are item identity, not grid position.
    pub selected: Option<usize>,
    pub visible: BTreeSet<usize>,
}

/// Items whose `[y, y + height + 1)` span intersects the viewport.
pub fn visible_items(grid: &Grid, scroll_offset: usize) -> BTreeSet<usize> {
    let top = scroll_offset;
    let bottom = scroll_offset + grid.viewport_height;
    grid.geometries()
        .iter()
        .enumerate()
        .filter(|(_, g)| g.y < bottom && g.y + g.height + 1 > top)
        .map(|(i, _)| i)
        .collect()
}

impl ViewportState {
    /// Clamp the offset into `[0, max_scroll]`. Returns true if it moved.
    pub fn clamp(&mut self, grid: &Grid) -> bool {
        let clamped = self.scroll_offset.min(grid.max_scroll());
        let changed = clamped != self.scroll_offset;
        self.scroll_offset = clamped;
        changed
    }

    pub fn scroll_by(&mut self, grid: &Grid, delta: isize) -> bool {
        let before = self.scroll_offset;
        self.scroll_offset = before.saturating_add_signed(delta).min(grid.max_scroll());
        self.scroll_offset != before
    }

    /// Scroll the minimum amount needed to show item `index`.
    ///
    /// Items taller than the viewport are pinned to the top. Returns whether
    /// the scroll offset changed.
    pub fn ensure_visible(&mut self, grid: &Grid, index: usize) -> bool {
        let Some(geom) = grid.geometry(index) else {
            return false;
        };
        let before = self.scroll_offset;
        let view = grid.viewport_height;

        if geom.height > view || geom.y < self.scroll_offset {
            self.scroll_offset = geom.y;
        } else if geom.bottom() > self.scroll_offset + view {
            self.scroll_offset = geom.bottom() - view;
        }
        self.scroll_offset = self.scroll_offset.min(grid.max_scroll());
        self.scroll_offset != before
    }

    /// Recompute the visible set. Returns true if it changed.
    pub fn update_visible(&mut self, grid: &Grid) -> bool {
        let visible = visible_items(grid, self.scroll_offset);
        let changed = visible != self.visible;
        self.visible = visible;
        changed
    }

    /// Move the selection. An empty selection lands on the first item.
    /// Returns true if the selection changed.
    pub fn navigate(&mut self, grid: &Grid, direction: Direction) -> bool {
        if grid.is_empty() {
            return false;
        }
        let target = match self.selected {
            Some(current) if current < grid.len() => neighbor(grid, current, direction),
            _ => Some(0),
        };
        match target {
            Some(next) if Some(next) != self.selected => {
                self.selected = Some(next);
                true
            }
            _ => false,
        }
    }
}

/// The item `direction` leads to from `index`, if any.
pub fn neighbor(grid: &Grid, index: usize, direction: Direction) -> Option<usize> {
    match direction {
        Direction::Up => move_in_column(grid, index, -1),
        Direction::Down => move_in_column(grid, index, 1),
        Direction::Left => move_to_column(grid, index, -1),
        Direction::Right => move_to_column(grid, index, 1),
    }
}

/// Step `delta` positions within the item's own column.
pub fn move_in_column(grid: &Grid, index: usize, delta: isize) -> Option<usize> {
    let column = grid.geometry(index)?.column;
    let position = grid.position(index)?.checked_add_signed(delta)?;
    grid.column(column).get(position).copied()
}

/// Nearest-center item in the column `delta` columns away.
pub fn move_to_column(grid: &Grid, index: usize, delta: isize) -> Option<usize> {
    let current = grid.geometry(index)?;
    let column = current.column.checked_add_signed(delta)?;
    let center = current.center2();

    grid.column(column)
        .iter()
        .copied()
        .min_by_key(|candidate| {
            grid.geometry(*candidate)
                .map(|g| g.center2().abs_diff(center))
                .unwrap_or(usize::MAX)
        })
}
