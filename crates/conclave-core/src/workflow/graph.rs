//! Dependency layering for step graphs

use crate::error::{Error, Result};
use crate::model::{PlanStep, TemplateStep};
use std::collections::{HashMap, HashSet};

/// Something with an ID and dependency edges
pub trait StepNode {
    /// Node ID
    fn node_id(&self) -> &str;
    /// IDs this node waits for
    fn node_dependencies(&self) -> &[String];
}

impl StepNode for PlanStep {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

impl StepNode for TemplateStep {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// Group steps into layers where every step depends only on earlier layers.
///
/// Kahn level order: dependencies on unknown IDs are ignored and each layer
/// keeps declaration order. Duplicate IDs and cycles are rejected.
pub fn compute_parallel_groups<N: StepNode>(steps: &[N]) -> Result<Vec<Vec<String>>> {
    let mut known = HashSet::with_capacity(steps.len());
    for step in steps {
        if !known.insert(step.node_id()) {
            return Err(Error::Workflow(format!("duplicate step id: {}", step.node_id())));
        }
    }

    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(steps.len());
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for step in steps {
        let deps: HashSet<&str> = step
            .node_dependencies()
            .iter()
            .map(String::as_str)
            .filter(|d| known.contains(d) && *d != step.node_id())
            .collect();
        in_degree.insert(step.node_id(), deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(step.node_id());
        }
    }

    let mut groups = Vec::new();
    let mut placed = 0;
    let mut current: Vec<&str> = steps
        .iter()
        .map(StepNode::node_id)
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();

    while !current.is_empty() {
        placed += current.len();
        let mut ready = HashSet::new();
        for id in &current {
            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }
        groups.push(current.iter().map(|id| id.to_string()).collect());
        current = steps
            .iter()
            .map(StepNode::node_id)
            .filter(|id| ready.contains(id))
            .collect();
    }

    if placed < steps.len() {
        let stuck: Vec<&str> = steps
            .iter()
            .map(StepNode::node_id)
            .filter(|id| in_degree.get(id).is_some_and(|d| *d > 0))
            .collect();
        return Err(Error::Workflow(format!(
            "dependency cycle among steps: {}",
            stuck.join(", ")
        )));
    }

    Ok(groups)
}
