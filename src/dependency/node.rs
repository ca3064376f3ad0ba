//! Snapshot descriptor of a service inside the dependency graph.

use serde::{Deserialize, Serialize};

use crate::service::Service;

/// The parts of a service the resolver cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNode {
    /// Unique service name.
    pub name: String,
    /// Ordering hint within a layer (lower first).
    pub priority: i32,
    /// Declared dependencies, duplicates removed, declaration order kept.
    pub dependencies: Vec<String>,
}

impl ServiceNode {
    /// Create a node, collapsing repeated dependency names.
    pub fn new(name: impl Into<String>, priority: i32, dependencies: Vec<String>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if !unique.contains(&dep) {
                unique.push(dep);
            }
        }
        Self {
            name: name.into(),
            priority,
            dependencies: unique,
        }
    }

    /// Capture a node from a registered service.
    pub fn from_service<C: 'static>(service: &dyn Service<C>) -> Self {
        Self::new(service.name(), service.priority(), service.dependencies())
    }
}
