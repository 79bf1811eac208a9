//! petgraph-based job dependency graph built from `needs`.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use super::types::WorkflowDocument;

/// A `needs` entry naming a job that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNeed {
    pub job: String,
    pub needs: String,
}

pub struct NeedsGraph {
    /// Edges point from a dependency to the job that needs it.
    pub graph: DiGraph<String, ()>,
    pub unknown: Vec<UnknownNeed>,
}

impl NeedsGraph {
    pub fn build(doc: &WorkflowDocument) -> Self {
        let mut graph = DiGraph::new();
        let mut job_indices: HashMap<&str, NodeIndex> = HashMap::new();
        let mut unknown = Vec::new();

        for job in &doc.jobs {
            let idx = graph.add_node(job.id.clone());
            job_indices.insert(job.id.as_str(), idx);
        }

        for job in &doc.jobs {
            let target = job_indices[job.id.as_str()];
            for need in &job.needs {
                match job_indices.get(need.as_str()) {
                    Some(&source) => {
                        graph.add_edge(source, target, ());
                    }
                    None => unknown.push(UnknownNeed {
                        job: job.id.clone(),
                        needs: need.clone(),
                    }),
                }
            }
        }

        NeedsGraph { graph, unknown }
    }

    /// Job ids in dependency order, or the id of a job on a cycle.
    pub fn execution_order(&self) -> Result<Vec<&str>, &str> {
        toposort(&self.graph, None)
            .map(|indices| {
                indices
                    .into_iter()
                    .map(|idx| self.graph[idx].as_str())
                    .collect()
            })
            .map_err(|cycle| self.graph[cycle.node_id()].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::load;

    #[test]
    fn order_and_unknown_needs() {
        let doc = load(
            "name: Graph order\non: push\njobs:\n  b:\n    needs: [a, ghost]\n    runs-on: x\n    steps: [{run: echo b}]\n  a:\n    runs-on: x\n    steps: [{run: echo a}]\n",
        )
        .unwrap();
        let graph = NeedsGraph::build(&doc);
        assert_eq!(graph.execution_order(), Ok(vec!["a", "b"]));
        assert_eq!(
            graph.unknown,
            vec![UnknownNeed {
                job: "b".into(),
                needs: "ghost".into(),
            }]
        );
    }
}
