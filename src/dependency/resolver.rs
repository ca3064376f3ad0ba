//! Dependency resolution.
//!
//! # Responsibilities
//! - Report dependencies that point outside the active set
//! - Detect cycles (three-colour DFS) and report the offending path
//! - Group services into layers with Kahn's algorithm
//!
//! # Design Decisions
//! - Pure computation over a snapshot; no registry access, no I/O
//! - Edges to inactive services are ignored (treated as satisfied)
//! - Layers are ordered by ascending priority, ties broken by name, so the
//!   same input always yields the same plan

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::dependency::node::ServiceNode;
use crate::error::{LifecycleError, Result};
use crate::service::Service;

/// DFS colouring. Absent from the map means unvisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Computes a layered initialization order for a set of services.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    nodes: IndexMap<String, ServiceNode>,
}

impl DependencyResolver {
    /// Build a resolver over the active services of one run.
    pub fn new<C: 'static>(services: &[Arc<dyn Service<C>>]) -> Self {
        Self::from_nodes(
            services
                .iter()
                .map(|service| ServiceNode::from_service(service.as_ref())),
        )
    }

    /// Build a resolver from plain nodes. A repeated name keeps the first node.
    pub fn from_nodes(nodes: impl IntoIterator<Item = ServiceNode>) -> Self {
        let mut map = IndexMap::new();
        for node in nodes {
            map.entry(node.name.clone()).or_insert(node);
        }
        Self { nodes: map }
    }

    /// Number of services in the snapshot.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dependencies that are not part of the snapshot, keyed by dependent.
    ///
    /// Informational only: such dependencies are treated as already satisfied.
    pub fn validate_dependencies(&self) -> BTreeMap<String, Vec<String>> {
        let mut missing = BTreeMap::new();
        for node in self.nodes.values() {
            let absent: Vec<String> = node
                .dependencies
                .iter()
                .filter(|dep| !self.nodes.contains_key(dep.as_str()))
                .cloned()
                .collect();
            if !absent.is_empty() {
                missing.insert(node.name.clone(), absent);
            }
        }
        missing
    }

    /// Fail with the first cycle found among in-snapshot edges.
    ///
    /// Walks with an explicit stack, so long dependency chains cannot
    /// exhaust the thread stack.
    pub fn detect_cycle(&self) -> Result<()> {
        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.nodes.len());
        // Current DFS path: (node, index of the next dependency to visit).
        let mut stack: Vec<(&ServiceNode, usize)> = Vec::new();

        for root in self.nodes.values() {
            if marks.contains_key(root.name.as_str()) {
                continue;
            }
            marks.insert(root.name.as_str(), Mark::InProgress);
            stack.push((root, 0));

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                let index = frame.1;
                frame.1 += 1;

                let Some(dep) = node.dependencies.get(index) else {
                    marks.insert(node.name.as_str(), Mark::Done);
                    stack.pop();
                    continue;
                };
                let Some(dep_node) = self.nodes.get(dep.as_str()) else {
                    continue;
                };

                match marks.get(dep.as_str()).copied() {
                    Some(Mark::InProgress) => {
                        let start = stack
                            .iter()
                            .position(|(n, _)| n.name == *dep)
                            .unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[start..].iter().map(|(n, _)| n.name.clone()).collect();
                        cycle.push(dep.clone());
                        return Err(LifecycleError::CycleDetected { path: cycle });
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(dep_node.name.as_str(), Mark::InProgress);
                        stack.push((dep_node, 0));
                    }
                }
            }
        }
        Ok(())
    }

    /// Group the snapshot into dependency layers.
    ///
    /// Every in-snapshot dependency of a service sits in a strictly earlier
    /// layer; members of one layer share no edges.
    pub fn resolve(&self) -> Result<Vec<Vec<String>>> {
        self.detect_cycle()?;

        let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(self.nodes.len());
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for node in self.nodes.values() {
            let mut degree = 0;
            for dep in &node.dependencies {
                if self.nodes.contains_key(dep.as_str()) {
                    degree += 1;
                    dependents
                        .entry(dep.as_str())
                        .or_default()
                        .push(node.name.as_str());
                }
            }
            in_degree.insert(node.name.as_str(), degree);
        }

        let mut current: Vec<&str> = self
            .nodes
            .keys()
            .map(String::as_str)
            .filter(|name| in_degree.get(name) == Some(&0))
            .collect();
        let mut layers: Vec<Vec<String>> = Vec::new();
        let mut placed = 0;

        while !current.is_empty() {
            current.sort_by(|a, b| {
                self.priority(a)
                    .cmp(&self.priority(b))
                    .then_with(|| a.cmp(b))
            });

            let mut next = Vec::new();
            for name in &current {
                for dependent in dependents.get(name).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        if *degree > 0 {
                            *degree -= 1;
                            if *degree == 0 {
                                next.push(*dependent);
                            }
                        }
                    }
                }
            }

            placed += current.len();
            layers.push(current.into_iter().map(str::to_string).collect());
            current = next;
        }

        if placed < self.nodes.len() {
            // Unreachable once detect_cycle has passed.
            tracing::error!(
                remaining = self.nodes.len() - placed,
                "Dependency resolution stalled with unresolved services"
            );
        }

        Ok(layers)
    }

    /// Flattened resolution order, truncated after `name`.
    pub fn dependency_order(&self, name: &str) -> Result<Vec<String>> {
        if !self.nodes.contains_key(name) {
            return Err(LifecycleError::UnknownService(name.to_string()));
        }

        let mut order = Vec::new();
        for service in self.resolve()?.into_iter().flatten() {
            let reached = service == name;
            order.push(service);
            if reached {
                break;
            }
        }
        Ok(order)
    }

    fn priority(&self, name: &str) -> i32 {
        self.nodes.get(name).map_or(0, |node| node.priority)
    }
}
