/// Placement of a single item inside a masonry grid, in display cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemGeometry {
    pub column: usize,
    pub y: usize,
    /// Total rows including border and label overhead.
    pub height: usize,
    /// Height was derived from the default unit aspect ratio.
    pub estimated: bool,
}

impl ItemGeometry {
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    /// Vertical midpoint, doubled to stay in integers.
    pub fn center2(&self) -> usize {
        self.y * 2 + self.height
    }
}

/// Immutable layout snapshot. A relayout produces a new `Grid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    pub cell_width: usize,
    pub columns: usize,
    pub gap: usize,
    pub viewport_width: usize,
    pub viewport_height: usize,
    pub total_height: usize,
    items: Vec<ItemGeometry>,
    column_members: Vec<Vec<usize>>,
    positions: Vec<usize>,
}

impl Grid {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        cell_width: usize,
        gap: usize,
        viewport_width: usize,
        viewport_height: usize,
        items: Vec<ItemGeometry>,
        column_members: Vec<Vec<usize>>,
        positions: Vec<usize>,
        total_height: usize,
    ) -> Self {
        Self {
            cell_width,
            columns: column_members.len(),
            gap,
            viewport_width,
            viewport_height,
            total_height: total_height.max(1),
            items,
            column_members,
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn geometry(&self, index: usize) -> Option<&ItemGeometry> {
        self.items.get(index)
    }

    pub fn geometries(&self) -> &[ItemGeometry] {
        &self.items
    }

    /// Item indices of a column, top to bottom.
    pub fn column(&self, column: usize) -> &[usize] {
        self.column_members
            .get(column)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Position of an item within its column. Counts from 0, not 1: the top
    /// item of every column is at position 0.
    pub fn position(&self, index: usize) -> Option<usize> {
        self.positions.get(index).copied()
    }

    /// Largest valid scroll offset.
    pub fn max_scroll(&self) -> usize {
        self.total_height.saturating_sub(self.viewport_height)
    }

    /// Left edge of a column in display cells.
    pub fn column_x(&self, column: usize) -> usize {
        column * (self.cell_width + self.gap)
    }
}
