//! Configuration for new documents.
//!
//! All types implement [`serde::Deserialize`] so a configuration can be
//! loaded from TOML. Every field has a default, so partial files are fine.
//!
//! # Overview
//!
//! - [`DocumentConfig`] - Top-level configuration combining every section.
//! - [`GridConfig`] - Position grid cell size and cell budget, and the
//!   inflation used when collecting links near moved nodes.
//! - [`RoutingConfig`] - Delayed routing and overlap-correction settings.
//! - [`IdentityConfig`] - Whether new documents maintain part identifiers.
//! - [`CycleConfig`] - The initial link cycle policy.
//!
//! # Example
//!
//! ```
//! # use vellum::config::DocumentConfig;
//! let config = DocumentConfig::from_toml_str(
//!     r#"
//!     [routing]
//!     orthogonal_spacing = 6.0
//!
//!     [cycles]
//!     valid_cycle = "not_directed"
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.routing().orthogonal_spacing(), 6.0);
//! assert_eq!(config.grid().cell_size(), 8.0);
//! ```

use serde::Deserialize;

use vellum_core::policy::ValidCycle;

use crate::{DocumentError, Result};

/// Top-level document configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentConfig {
    #[serde(default)]
    grid: GridConfig,

    #[serde(default)]
    routing: RoutingConfig,

    #[serde(default)]
    identity: IdentityConfig,

    #[serde(default)]
    cycles: CycleConfig,
}

impl DocumentConfig {
    /// Combines the sections into a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Config`] if a numeric setting is out of range.
    pub fn new(
        grid: GridConfig,
        routing: RoutingConfig,
        identity: IdentityConfig,
        cycles: CycleConfig,
    ) -> Result<Self> {
        let config = Self {
            grid,
            routing,
            identity,
            cycles,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Config`] if the text is not valid TOML or a
    /// value has the wrong type, or if a numeric setting is not positive.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|err| DocumentError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every numeric setting.
    ///
    /// [`Document::with_config`](crate::Document::with_config) falls back to
    /// the default configuration when this check fails.
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        if self.routing.max_drain_passes == 0 {
            return Err(DocumentError::Config(
                "routing.max_drain_passes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    pub fn routing(&self) -> &RoutingConfig {
        &self.routing
    }

    pub fn identity(&self) -> &IdentityConfig {
        &self.identity
    }

    pub fn cycles(&self) -> &CycleConfig {
        &self.cycles
    }
}

/// Position grid settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    /// Edge length of one grid cell, in document units.
    #[serde(default = "GridConfig::default_cell_size")]
    cell_size: f32,

    /// Margin around a moved node within which links are re-routed.
    #[serde(default = "GridConfig::default_inflate")]
    inflate: f32,

    /// Most cells a position grid may hold. Larger areas get coarser cells.
    #[serde(default = "GridConfig::default_max_cells")]
    max_cells: usize,
}

impl GridConfig {
    /// Creates grid settings with the default cell budget.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Config`] unless `cell_size` is finite and
    /// positive.
    pub fn new(cell_size: f32, inflate: f32) -> Result<Self> {
        let config = Self {
            cell_size,
            inflate,
            max_cells: Self::default_max_cells(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Replaces the cell budget.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Config`] for a budget of zero.
    pub fn with_max_cells(mut self, max_cells: usize) -> Result<Self> {
        self.max_cells = max_cells;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(DocumentError::Config(format!(
                "grid.cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if self.max_cells == 0 {
            return Err(DocumentError::Config("grid.max_cells must be at least 1".to_string()));
        }
        Ok(())
    }

    fn default_cell_size() -> f32 {
        8.0
    }

    fn default_inflate() -> f32 {
        16.0
    }

    fn default_max_cells() -> usize {
        1 << 20
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn inflate(&self) -> f32 {
        self.inflate
    }

    pub fn max_cells(&self) -> usize {
        self.max_cells
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: Self::default_cell_size(),
            inflate: Self::default_inflate(),
            max_cells: Self::default_max_cells(),
        }
    }
}

/// Delayed routing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Also re-route links whose bounds come near a moved avoidable part.
    #[serde(default = "RoutingConfig::default_true")]
    route_after_nodes_dragged: bool,

    /// Spread overlapping orthogonal segments apart after routing.
    #[serde(default = "RoutingConfig::default_true")]
    avoid_orthogonal_overlaps: bool,

    /// Distance between spread segments.
    #[serde(default = "RoutingConfig::default_spacing")]
    orthogonal_spacing: f32,

    /// Upper bound on drain passes of the pending-route set.
    #[serde(default = "RoutingConfig::default_max_drain_passes")]
    max_drain_passes: usize,
}

impl RoutingConfig {
    fn default_true() -> bool {
        true
    }

    fn default_spacing() -> f32 {
        4.0
    }

    fn default_max_drain_passes() -> usize {
        64
    }

    pub fn route_after_nodes_dragged(&self) -> bool {
        self.route_after_nodes_dragged
    }

    pub fn avoid_orthogonal_overlaps(&self) -> bool {
        self.avoid_orthogonal_overlaps
    }

    pub fn orthogonal_spacing(&self) -> f32 {
        self.orthogonal_spacing
    }

    pub fn max_drain_passes(&self) -> usize {
        self.max_drain_passes
    }

    pub fn with_route_after_nodes_dragged(mut self, value: bool) -> Self {
        self.route_after_nodes_dragged = value;
        self
    }

    pub fn with_avoid_orthogonal_overlaps(mut self, value: bool) -> Self {
        self.avoid_orthogonal_overlaps = value;
        self
    }

    pub fn with_orthogonal_spacing(mut self, value: f32) -> Self {
        self.orthogonal_spacing = value;
        self
    }

    pub fn with_max_drain_passes(mut self, value: usize) -> Self {
        self.max_drain_passes = value;
        self
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            route_after_nodes_dragged: true,
            avoid_orthogonal_overlaps: true,
            orthogonal_spacing: Self::default_spacing(),
            max_drain_passes: Self::default_max_drain_passes(),
        }
    }
}

/// Identifier settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    maintains_part_id: bool,
}

impl IdentityConfig {
    pub fn new(maintains_part_id: bool) -> Self {
        Self { maintains_part_id }
    }

    pub fn maintains_part_id(&self) -> bool {
        self.maintains_part_id
    }
}

/// Cycle policy settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CycleConfig {
    #[serde(default)]
    valid_cycle: ValidCycle,
}

impl CycleConfig {
    pub fn new(valid_cycle: ValidCycle) -> Self {
        Self { valid_cycle }
    }

    pub fn valid_cycle(&self) -> ValidCycle {
        self.valid_cycle
    }
}
