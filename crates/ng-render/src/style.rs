use serde::{Deserialize, Serialize};

/// Dimensions used to lay out nodes and frames.
///
/// Everything is expressed in model units (pixels at zoom 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutStyle {
    /// Base spacing unit. Most other sizes are multiples of it.
    pub unit: f32,
    pub header_height: f32,
    /// Minimal width of an expanded node.
    pub node_width: f32,
    /// Radius of rounded corners; also the grab radius of the resize handle.
    pub round_radius: f32,
    /// Hit radius around a connector center.
    pub connector_radius: f32,
    pub collapse_arrow_size: f32,
    /// Grid step used when snapping with Shift held.
    pub snap_size: f32,
    /// Approximate advance of one label character. Hosts with real text
    /// metrics can supply their own [`GraphLayout`](crate::GraphLayout).
    pub char_width: f32,
}

impl Default for LayoutStyle {
    fn default() -> Self {
        Self {
            unit: 8.0,
            header_height: 40.0,
            node_width: 200.0,
            round_radius: 8.0,
            connector_radius: 6.0,
            collapse_arrow_size: 12.0,
            snap_size: 20.0,
            char_width: 7.0,
        }
    }
}

impl LayoutStyle {
    /// Height of one property row.
    pub fn row_height(&self) -> f32 {
        self.unit * 4.0
    }

    pub fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.char_width
    }
}
