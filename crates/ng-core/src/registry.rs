//! Node type lookup and node construction.

use crate::error::GraphError;
use crate::geometry::Point;
use crate::id::NodeId;
use crate::model::{Node, NodeDefinition};
use indexmap::IndexMap;
use std::sync::Arc;

/// Source of node type definitions.
pub trait TypeRegistry {
    fn lookup(&self, type_id: &str) -> Option<Arc<NodeDefinition>>;
    fn all(&self) -> Vec<Arc<NodeDefinition>>;
}

/// Registry backed by an ordered list of definitions.
#[derive(Debug, Clone, Default)]
pub struct DefaultRegistry {
    definitions: IndexMap<String, Arc<NodeDefinition>>,
}

impl DefaultRegistry {
    pub fn new(definitions: impl IntoIterator<Item = NodeDefinition>) -> Self {
        let mut registry = Self::default();
        for definition in definitions {
            registry.register(definition);
        }
        registry
    }

    /// Parse a JSON array of node definitions.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let definitions: Vec<NodeDefinition> = serde_json::from_str(json)?;
        Ok(Self::new(definitions))
    }

    /// Add a definition; a later definition with the same id replaces the earlier one.
    pub fn register(&mut self, definition: NodeDefinition) {
        self.definitions
            .insert(definition.id.clone(), Arc::new(definition));
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl TypeRegistry for DefaultRegistry {
    fn lookup(&self, type_id: &str) -> Option<Arc<NodeDefinition>> {
        self.definitions.get(type_id).cloned()
    }

    fn all(&self) -> Vec<Arc<NodeDefinition>> {
        self.definitions.values().cloned().collect()
    }
}

/// Builds nodes from type ids.
pub struct NodeFactory {
    registry: Box<dyn TypeRegistry>,
}

impl NodeFactory {
    pub fn new(registry: impl TypeRegistry + 'static) -> Self {
        Self {
            registry: Box::new(registry),
        }
    }

    pub fn registry(&self) -> &dyn TypeRegistry {
        self.registry.as_ref()
    }

    pub fn definitions(&self) -> Vec<Arc<NodeDefinition>> {
        self.registry.all()
    }

    /// Create a node of `type_id` with a fresh id.
    pub fn create_node(&self, type_id: &str, location: Point) -> Result<Node, GraphError> {
        self.create_node_with_id(NodeId::fresh("node_"), type_id, location)
    }

    /// Create a node with a caller-chosen id (used when loading documents).
    pub fn create_node_with_id(
        &self,
        id: NodeId,
        type_id: &str,
        location: Point,
    ) -> Result<Node, GraphError> {
        let definition = self
            .registry
            .lookup(type_id)
            .ok_or_else(|| GraphError::UnknownNodeType(type_id.to_owned()))?;
        Ok(Node::new(id, definition, location))
    }
}

impl std::fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeFactory")
            .field("types", &self.registry.all().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITIONS: &str = r#"[
        {
            "id": "const",
            "label": "Constant",
            "categories": "Input",
            "properties": [
                {
                    "type": "OUTPUT",
                    "id": "value",
                    "label": "Value",
                    "linkable": true,
                    "editable": true,
                    "valueType": { "type": "real", "range": { "min": 0, "max": 1 } },
                    "defaultValue": 0.5
                }
            ]
        },
        {
            "id": "image",
            "label": "Image",
            "properties": [
                { "type": "INPUT", "id": "src", "label": "Src", "valueType": { "type": "image" } }
            ]
        }
    ]"#;

    #[test]
    fn registry_from_json() {
        let registry = DefaultRegistry::from_json(DEFINITIONS).unwrap();
        assert_eq!(registry.len(), 2);
        let constant = registry.lookup("const").unwrap();
        assert_eq!(constant.categories.as_deref(), Some("Input"));
        let range = constant.properties[0].value_type.bounded_range().unwrap();
        assert_eq!(range.clamp(3.0), 1.0);
        let image = registry.lookup("image").unwrap();
        assert!(!image.properties[0].linkable);
        assert_eq!(
            image.properties[0].value_type.value_type,
            crate::model::ValueType::Custom("image".into())
        );
    }

    #[test]
    fn factory_initializes_defaults() {
        let factory = NodeFactory::new(DefaultRegistry::from_json(DEFINITIONS).unwrap());
        let node = factory.create_node("const", Point::new(4.0, 2.0)).unwrap();
        assert_eq!(node.location, Point::new(4.0, 2.0));
        assert_eq!(
            node.find_property("value").unwrap().value(),
            Some(&serde_json::json!(0.5))
        );
    }

    #[test]
    fn unknown_type_fails_fast() {
        let factory = NodeFactory::new(DefaultRegistry::default());
        let err = factory.create_node("nope", Point::ORIGIN).unwrap_err();
        assert!(matches!(err, GraphError::UnknownNodeType(t) if t == "nope"));
    }
}
