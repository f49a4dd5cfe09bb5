use std::collections::{BTreeMap, BTreeSet};

use fixtura_core::toposort;

use crate::errors::GenerationError;
use crate::instance::{CellId, InstanceArena};

/// Evaluation order for every cell of an arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationPlan {
    order: Vec<CellId>,
}

impl EvaluationPlan {
    pub fn order(&self) -> &[CellId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Order cells so each one comes after the cells it reads.
///
/// All references must be resolved first. Cells that depend on each other
/// circularly are reported as a [`GenerationError::Cycle`].
pub fn plan_evaluation(arena: &InstanceArena) -> Result<EvaluationPlan, GenerationError> {
    let mut graph: BTreeMap<CellId, BTreeSet<CellId>> = BTreeMap::new();

    for cell_id in arena.cell_ids() {
        let cell = arena.cell(cell_id);
        if let Some(reference) = cell.unresolved_references().first() {
            return Err(GenerationError::UnresolvedReference(format!(
                "'{reference}' of '{}' must be resolved before planning",
                arena.cell_label(cell_id)
            )));
        }
        graph.entry(cell_id).or_default();
        for dependency in cell.dependencies() {
            graph.entry(dependency).or_default().insert(cell_id);
        }
    }

    match toposort(&graph) {
        Ok(order) => Ok(EvaluationPlan { order }),
        Err(remaining) => {
            let cells = cycle_members(&graph, remaining)
                .into_iter()
                .map(|cell| arena.cell_label(cell))
                .collect();
            Err(GenerationError::Cycle { cells })
        }
    }
}

/// Narrow the cells left over by the sort to those on a cycle, dropping the
/// ones that merely depend on one.
fn cycle_members(
    graph: &BTreeMap<CellId, BTreeSet<CellId>>,
    remaining: Vec<CellId>,
) -> Vec<CellId> {
    let mut members: BTreeSet<CellId> = remaining.into_iter().collect();
    loop {
        let dead_ends: Vec<CellId> = members
            .iter()
            .filter(|cell| {
                graph
                    .get(*cell)
                    .is_none_or(|dependents| dependents.iter().all(|d| !members.contains(d)))
            })
            .copied()
            .collect();
        if dead_ends.is_empty() {
            return members.into_iter().collect();
        }
        for cell in dead_ends {
            members.remove(&cell);
        }
    }
}
