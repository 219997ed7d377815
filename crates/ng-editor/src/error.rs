use crate::keymap::KeymapError;
use ng_core::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Keymap(#[from] KeymapError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
