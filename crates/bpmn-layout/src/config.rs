//! Configuration types for BPMN diagram layout.
//!
//! Two kinds of configuration exist:
//!
//! - [`LayoutConfig`] - engine constants (spacing, container margins, traversal
//!   caps, label metrics). Usually loaded once from a TOML file.
//! - [`LayoutOptions`] - per-invocation options recognised by the layout call
//!   (`poolExpansion`, `gridSnap`).
//!
//! All types implement [`serde::Deserialize`] with defaults for every field, so
//! partial configuration files are valid.
//!
//! # Example
//!
//! ```
//! # use bpmn_layout::config::{LayoutConfig, LayoutOptions};
//! let config = LayoutConfig::default();
//! assert_eq!(config.containers().lane_min_height(), 120.0);
//!
//! let options = LayoutOptions::default().with_grid_snap(10.0);
//! assert_eq!(options.grid_snap(), Some(10.0));
//! ```

use serde::Deserialize;

use bpmn_layout_core::geometry::Insets;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayoutConfig {
    /// Grid spacing between flow nodes.
    #[serde(default)]
    spacing: SpacingConfig,

    /// Pool and lane sizing.
    #[serde(default)]
    containers: ContainerConfig,

    /// Edge routing constants.
    #[serde(default)]
    routing: RoutingConfig,

    /// Label size estimation and declutter.
    #[serde(default)]
    labels: LabelConfig,

    /// Bounds for traversals over possibly cyclic flow graphs.
    #[serde(default)]
    traversal: TraversalConfig,
}

impl LayoutConfig {
    /// Returns the spacing configuration.
    pub fn spacing(&self) -> &SpacingConfig {
        &self.spacing
    }

    /// Returns the container configuration.
    pub fn containers(&self) -> &ContainerConfig {
        &self.containers
    }

    /// Returns the routing configuration.
    pub fn routing(&self) -> &RoutingConfig {
        &self.routing
    }

    /// Returns the label configuration.
    pub fn labels(&self) -> &LabelConfig {
        &self.labels
    }

    /// Returns the traversal configuration.
    pub fn traversal(&self) -> &TraversalConfig {
        &self.traversal
    }
}

/// Spacing of the layered grid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpacingConfig {
    horizontal_gap: f32,
    vertical_gap: f32,
    origin_x: f32,
    origin_y: f32,
    subprocess_padding: Insets,
    chain_gap: f32,
}

impl Default for SpacingConfig {
    fn default() -> Self {
        Self {
            horizontal_gap: 50.0,
            vertical_gap: 50.0,
            origin_x: 150.0,
            origin_y: 80.0,
            subprocess_padding: Insets::new(40.0, 30.0, 30.0, 30.0),
            chain_gap: 40.0,
        }
    }
}

impl SpacingConfig {
    /// Horizontal gap between adjacent grid columns.
    pub fn horizontal_gap(&self) -> f32 {
        self.horizontal_gap
    }

    /// Vertical gap between adjacent grid rows.
    pub fn vertical_gap(&self) -> f32 {
        self.vertical_gap
    }

    /// Top-left corner of the diagram content.
    pub fn origin(&self) -> (f32, f32) {
        (self.origin_x, self.origin_y)
    }

    /// Padding between an expanded subprocess border and its children.
    pub fn subprocess_padding(&self) -> Insets {
        self.subprocess_padding
    }

    /// Gap between a host and its exception chain, and between chain nodes.
    pub fn chain_gap(&self) -> f32 {
        self.chain_gap
    }
}

/// Pool and lane sizing constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    lane_element_height: f32,
    lane_margin: f32,
    lane_min_height: f32,
    pool_margin: f32,
    pool_header_width: f32,
    pool_gap: f32,
    pool_min_width: f32,
    pool_min_height: f32,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            lane_element_height: 80.0,
            lane_margin: 40.0,
            lane_min_height: 120.0,
            pool_margin: 30.0,
            pool_header_width: 30.0,
            pool_gap: 40.0,
            pool_min_width: 600.0,
            pool_min_height: 150.0,
        }
    }
}

impl ContainerConfig {
    /// Height budget per element used by the lane expansion estimate.
    pub fn lane_element_height(&self) -> f32 {
        self.lane_element_height
    }

    /// Margin above and below lane content.
    pub fn lane_margin(&self) -> f32 {
        self.lane_margin
    }

    /// Smallest height a lane is given.
    pub fn lane_min_height(&self) -> f32 {
        self.lane_min_height
    }

    /// Margin between pool border and content.
    pub fn pool_margin(&self) -> f32 {
        self.pool_margin
    }

    /// Width of the vertical participant header band.
    pub fn pool_header_width(&self) -> f32 {
        self.pool_header_width
    }

    /// Vertical gap between stacked pools.
    pub fn pool_gap(&self) -> f32 {
        self.pool_gap
    }

    pub fn pool_min_width(&self) -> f32 {
        self.pool_min_width
    }

    pub fn pool_min_height(&self) -> f32 {
        self.pool_min_height
    }
}

/// Edge routing constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    lane_clamp_tolerance: f32,
    detour_clearance: f32,
    self_loop_offset: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            lane_clamp_tolerance: 6.0,
            detour_clearance: 20.0,
            self_loop_offset: 20.0,
        }
    }
}

impl RoutingConfig {
    /// How far intra-lane waypoints may leave the lane band.
    pub fn lane_clamp_tolerance(&self) -> f32 {
        self.lane_clamp_tolerance
    }

    /// Distance kept between a detour segment and the obstacles it avoids.
    pub fn detour_clearance(&self) -> f32 {
        self.detour_clearance
    }

    pub fn self_loop_offset(&self) -> f32 {
        self.self_loop_offset
    }
}

/// Label metrics and declutter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    wrap_width: f32,
    line_height: f32,
    char_width: f32,
    gap: f32,
    max_passes: usize,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            wrap_width: 90.0,
            line_height: 14.0,
            char_width: 6.5,
            gap: 5.0,
            max_passes: 3,
        }
    }
}

impl LabelConfig {
    /// Width at which label text wraps to a new line.
    pub fn wrap_width(&self) -> f32 {
        self.wrap_width
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    /// Average glyph width used for text size estimation.
    pub fn char_width(&self) -> f32 {
        self.char_width
    }

    /// Distance between a label and its anchor.
    pub fn gap(&self) -> f32 {
        self.gap
    }

    /// Number of declutter passes over all labels.
    pub fn max_passes(&self) -> usize {
        self.max_passes
    }
}

/// Bounds for traversals over the (possibly cyclic) flow graph.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    max_depth: usize,
    max_row_passes: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 25,
            max_row_passes: 8,
        }
    }
}

impl TraversalConfig {
    /// Depth cap for branch classification and exception chain discovery.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Iteration cap for the branch row repair loop.
    pub fn max_row_passes(&self) -> usize {
        self.max_row_passes
    }
}

/// Options recognised by a single layout invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    /// Pool/lane auto-expansion. `None` enables it when participants exist.
    #[serde(default)]
    pool_expansion: Option<bool>,

    /// Post-pass rounding of all coordinates to this pixel grid.
    #[serde(default)]
    grid_snap: Option<f32>,
}

impl LayoutOptions {
    pub fn with_pool_expansion(mut self, enabled: bool) -> Self {
        self.pool_expansion = Some(enabled);
        self
    }

    pub fn with_grid_snap(mut self, grid: f32) -> Self {
        self.grid_snap = Some(grid);
        self
    }

    /// Explicit pool expansion choice, if any.
    pub fn pool_expansion(&self) -> Option<bool> {
        self.pool_expansion
    }

    /// Grid size for coordinate snapping, ignoring non-positive values.
    pub fn grid_snap(&self) -> Option<f32> {
        self.grid_snap.filter(|grid| *grid > 0.0)
    }
}
