pub mod hit;
pub mod layout;
pub mod scene;
pub mod style;

pub use hit::{NodeHit, find_connector, frame_at, hit_node, hit_nodes, nodes_inside};
pub use layout::{BoxLayout, FrameShape, GraphLayout, NodeShape, PropertyShape};
pub use scene::Scene;
pub use style::LayoutStyle;
