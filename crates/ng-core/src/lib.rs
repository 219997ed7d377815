pub mod error;
pub mod geometry;
pub mod id;
pub mod model;
pub mod persist;
pub mod registry;

pub use error::GraphError;
pub use geometry::{Dimension, Point, Rect};
pub use id::{FrameId, NodeId, PortId};
pub use model::*;
pub use persist::{PersistedGroup, load, load_str, save, save_string};
pub use registry::{DefaultRegistry, NodeFactory, TypeRegistry};
