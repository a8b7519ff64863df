//! Coarse occupancy index over document space.
//!
//! A [`PositionGrid`] divides an area into square cells and records which
//! cells are covered by avoidable parts. Routing consults it before moving a
//! segment. The document builds one lazily and drops it whenever an
//! avoidable part's geometry or visibility changes.

use log::debug;

use vellum_core::{
    capability::Capability,
    geometry::{Bounds, Point},
    key::PartKey,
};

use crate::{Document, part::Part};

/// Smallest cell edge a grid accepts.
const MIN_CELL_SIZE: f32 = 1.0 / 64.0;

/// Occupancy bitmap with a fixed origin and cell size.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionGrid {
    origin: Point,
    cell_size: f32,
    columns: usize,
    rows: usize,
    cells: Vec<bool>,
    /// The part left out when the grid was built.
    skipped: Option<PartKey>,
}

impl PositionGrid {
    /// Creates an empty grid covering `area` with at most `max_cells` cells.
    ///
    /// The cell size starts at `cell_size` and doubles until the grid fits
    /// the budget, so a sparse drawing spread over a large area gets a
    /// coarse grid.
    pub fn new(area: Bounds, cell_size: f32, max_cells: usize) -> Self {
        let max_cells = max_cells.max(1);
        let mut cell_size = cell_size.max(MIN_CELL_SIZE);
        let (columns, rows) = loop {
            let columns = span(area.width(), cell_size);
            let rows = span(area.height(), cell_size);
            match columns.checked_mul(rows) {
                Some(cells) if cells <= max_cells => break (columns, rows),
                _ => cell_size *= 2.0,
            }
        };
        Self {
            origin: area.min_point(),
            cell_size,
            columns,
            rows,
            cells: vec![false; columns * rows],
            skipped: None,
        }
    }

    /// Number of cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// The area covered by the grid's cells.
    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            self.origin.x(),
            self.origin.y(),
            self.columns as f32 * self.cell_size,
            self.rows as f32 * self.cell_size,
        )
    }

    /// Cell index ranges touched by `rect`, clamped to the grid.
    fn cell_range(&self, rect: &Bounds) -> Option<(usize, usize, usize, usize)> {
        if !self.bounds().intersects(rect) {
            return None;
        }
        let column = |x: f32| (((x - self.origin.x()) / self.cell_size).floor().max(0.0) as usize).min(self.columns - 1);
        let row = |y: f32| (((y - self.origin.y()) / self.cell_size).floor().max(0.0) as usize).min(self.rows - 1);
        Some((column(rect.min_x()), column(rect.max_x()), row(rect.min_y()), row(rect.max_y())))
    }

    /// Marks every cell touched by `rect` as occupied.
    pub fn set_occupied(&mut self, rect: &Bounds) {
        let Some((c0, c1, r0, r1)) = self.cell_range(rect) else {
            return;
        };
        for row in r0..=r1 {
            for column in c0..=c1 {
                self.cells[row * self.columns + column] = true;
            }
        }
    }

    pub fn is_occupied(&self, point: Point) -> bool {
        !self.is_unoccupied(&Bounds::new(point.x(), point.y(), 0.0, 0.0))
    }

    /// True if no cell touched by `rect` is occupied. Space outside the grid
    /// counts as free.
    pub fn is_unoccupied(&self, rect: &Bounds) -> bool {
        let Some((c0, c1, r0, r1)) = self.cell_range(rect) else {
            return true;
        };
        (r0..=r1).all(|row| (c0..=c1).all(|column| !self.cells[row * self.columns + column]))
    }

    pub fn clear(&mut self) {
        self.cells.fill(false);
    }
}

/// Cells needed to cover `length`, at least one.
fn span(length: f32, cell_size: f32) -> usize {
    ((length / cell_size).floor() as usize).saturating_add(1)
}

impl Document {
    /// The occupancy grid of avoidable parts, leaving out `skip`.
    ///
    /// The grid is cached until an avoidable part changes or a different
    /// part is skipped.
    pub fn position_grid(&mut self, skip: Option<PartKey>) -> &PositionGrid {
        let grid = match self.position_grid.take() {
            Some(grid) if grid.skipped == skip => grid,
            _ => self.build_position_grid(skip),
        };
        self.position_grid.insert(grid)
    }

    fn build_position_grid(&self, skip: Option<PartKey>) -> PositionGrid {
        let config = self.config.grid();
        let area = self.extent().inflate(config.cell_size() * 2.0);
        let mut grid = PositionGrid::new(area, config.cell_size(), config.max_cells());
        grid.skipped = skip;
        for layer in self.layers.iter().filter(|l| l.gate(Capability::Visible)) {
            for part in layer.parts() {
                self.stamp_avoidable(&mut grid, part, skip);
            }
        }
        debug!(columns = grid.columns, rows = grid.rows, cell_size = grid.cell_size; "Position grid built");
        grid
    }

    /// Marks avoidable parts under `key`. Non-node groups are searched
    /// through their children.
    fn stamp_avoidable(&self, grid: &mut PositionGrid, key: PartKey, skip: Option<PartKey>) {
        if Some(key) == skip {
            return;
        }
        let Some(part) = self.parts.get(key) else {
            return;
        };
        if !part.flag(Capability::Visible) {
            return;
        }
        if part.is_avoidable() {
            grid.set_occupied(&part.bounds());
        } else if part.node().is_none() {
            for child in part.children() {
                self.stamp_avoidable(grid, *child, skip);
            }
        }
    }

    /// True if `rect` crosses no avoidable part other than `skip`.
    pub fn is_unoccupied(&mut self, rect: &Bounds, skip: Option<PartKey>) -> bool {
        self.position_grid(skip).is_unoccupied(rect)
    }

    pub(crate) fn is_avoidable(&self, key: PartKey) -> bool {
        self.parts.get(key).is_some_and(Part::is_avoidable)
    }
}
