use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::Schema;
use crate::spec::RelationStrategy;

/// Summary of the entity relation graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report on the relations that create new instances.
///
/// An edge `a -> b` means instances of `a` create instances of `b`. A cycle
/// means relation materialization may never settle unless overrides break
/// the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationGraphReport {
    pub summary: RelationGraphSummary,
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic report of the `create` relations in a schema.
pub fn build_relation_graph_report(schema: &Schema) -> RelationGraphReport {
    let graph = build_adjacency(schema);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = RelationGraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => RelationGraphReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => RelationGraphReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

fn build_adjacency(schema: &Schema) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for entity in schema.entities() {
        graph.entry(entity.name().to_string()).or_default();

        for (_, relation) in entity.relations() {
            if let RelationStrategy::Create { max, .. } = relation.strategy
                && max > 0
            {
                graph.entry(relation.target_entity.clone()).or_default();
                graph
                    .entry(entity.name().to_string())
                    .or_default()
                    .insert(relation.target_entity.clone());
            }
        }
    }

    graph
}

/// Kahn's algorithm over `node -> dependents` edges.
///
/// Ties are broken by node order, so the result is deterministic. On failure
/// the nodes that could not be ordered are returned.
pub fn toposort<N>(graph: &BTreeMap<N, BTreeSet<N>>) -> Result<Vec<N>, Vec<N>>
where
    N: Ord + Clone,
{
    let mut indegree: BTreeMap<N, usize> = BTreeMap::new();

    for node in graph.keys() {
        indegree.entry(node.clone()).or_insert(0);
    }

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    let total = indegree.len();
    let mut ready: BTreeSet<N> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then(|| node.clone()))
        .collect();

    let mut order = Vec::with_capacity(total);

    while let Some(node) = ready.pop_first() {
        if let Some(targets) = graph.get(&node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.clone());
                    }
                }
            }
        }
        order.push(node);
    }

    if order.len() == total {
        Ok(order)
    } else {
        let cycle_nodes: Vec<N> = indegree
            .into_iter()
            .filter_map(|(node, count)| (count > 0).then_some(node))
            .collect();
        Err(cycle_nodes)
    }
}
