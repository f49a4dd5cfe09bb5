use fixtura_core::{Reference, Value, ValueSpec};
use rand::RngCore;
use tracing::debug;

use crate::errors::GenerationError;
use crate::instance::{CellId, FieldCell, InstanceArena, ResolvedTarget};
use crate::model::GenerationReport;
use crate::planner::EvaluationPlan;
use crate::provider::ValueProvider;

/// Outcome of evaluating one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// The cell was already defined; nothing was computed.
    Cached,
    Computed,
}

/// Compute the value of `cell` unless it is already defined.
///
/// Referenced cells must be defined beforehand, which an evaluation plan
/// guarantees.
pub fn evaluate_cell<P: ValueProvider + ?Sized>(
    arena: &mut InstanceArena,
    cell: CellId,
    provider: &P,
    rng: &mut dyn RngCore,
) -> Result<Evaluation, GenerationError> {
    if arena.cell(cell).is_defined() {
        return Ok(Evaluation::Cached);
    }
    let value = generate_value(arena, cell, provider, rng).map_err(|err| match err {
        GenerationError::Provider(message) => {
            GenerationError::Provider(format!("{}: {message}", arena.cell_label(cell)))
        }
        other => other,
    })?;
    arena.cell_mut(cell).set_evaluated(value);
    Ok(Evaluation::Computed)
}

fn generate_value<P: ValueProvider + ?Sized>(
    arena: &InstanceArena,
    cell: CellId,
    provider: &P,
    rng: &mut dyn RngCore,
) -> Result<Value, GenerationError> {
    let field = arena.cell(cell);
    match field.spec() {
        ValueSpec::Constant { value, .. } => Ok(value.clone()),
        ValueSpec::Provider {
            generator, args, ..
        } => provider.invoke(generator, args, rng),
        ValueSpec::Dynamic { expression, .. } => {
            expression.render(|reference| reference_value(arena, field, reference))
        }
        ValueSpec::Relation(relation) => Ok(relation.relation_type.default_value()),
    }
}

fn reference_value(
    arena: &InstanceArena,
    field: &FieldCell,
    reference: &Reference,
) -> Result<Value, GenerationError> {
    match field.resolved_reference(reference)? {
        ResolvedTarget::Cell(target) => arena.value(target).cloned(),
        ResolvedTarget::Instance(instance) => Ok(Value::Instance(instance)),
        ResolvedTarget::Absent => Ok(Value::Null),
    }
}

/// Evaluate every cell in plan order, recording provider usage in `report`.
pub fn execute_plan<P: ValueProvider + ?Sized>(
    arena: &mut InstanceArena,
    plan: &EvaluationPlan,
    provider: &P,
    rng: &mut dyn RngCore,
    report: &mut GenerationReport,
) -> Result<(), GenerationError> {
    for &cell in plan.order() {
        let generator = match arena.cell(cell).spec() {
            ValueSpec::Provider { generator, .. } => Some(generator.clone()),
            _ => None,
        };
        if evaluate_cell(arena, cell, provider, rng)? == Evaluation::Computed {
            report.cells_evaluated += 1;
            if let Some(generator) = generator {
                report.record_generator_usage(&generator);
            }
        }
    }
    debug!(
        cells = plan.len(),
        evaluated = report.cells_evaluated,
        "evaluation finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use fixtura_core::Entity;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::provider::FakeProvider;
    use crate::resolver::resolve_all;

    #[test]
    fn dynamic_values_concatenate_and_single_references_keep_type() {
        let entity = Arc::new(
            Entity::new("person")
                .with_field("first", ValueSpec::constant(None, Value::Text("Ada".into())))
                .unwrap()
                .with_field("age", ValueSpec::constant(None, Value::Int(36)))
                .unwrap()
                .with_field("greeting", ValueSpec::dynamic(None, "Hi $first, $age").unwrap())
                .unwrap()
                .with_field("years", ValueSpec::dynamic(None, "$age").unwrap())
                .unwrap(),
        );
        let mut arena = InstanceArena::new();
        let id = arena.instantiate(&entity, &BTreeMap::new(), None).unwrap();
        resolve_all(&mut arena).unwrap();

        let provider = FakeProvider::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for name in ["first", "age", "greeting", "years"] {
            let cell = arena.cell_id(id, name).unwrap();
            evaluate_cell(&mut arena, cell, &provider, &mut rng).unwrap();
        }

        let greeting = arena.cell_id(id, "greeting").unwrap();
        assert_eq!(
            arena.value(greeting).unwrap(),
            &Value::Text("Hi Ada, 36".into())
        );
        let years = arena.cell_id(id, "years").unwrap();
        assert_eq!(arena.value(years).unwrap(), &Value::Int(36));
    }

    #[test]
    fn defined_cells_are_not_recomputed() {
        let entity = Arc::new(
            Entity::new("token")
                .with_field("value", ValueSpec::provider(None, "uuid4", BTreeMap::new()))
                .unwrap(),
        );
        let mut arena = InstanceArena::new();
        let id = arena.instantiate(&entity, &BTreeMap::new(), None).unwrap();
        let cell = arena.cell_id(id, "value").unwrap();
        let provider = FakeProvider::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        assert_eq!(
            evaluate_cell(&mut arena, cell, &provider, &mut rng).unwrap(),
            Evaluation::Computed
        );
        let first = arena.value(cell).unwrap().clone();
        assert_eq!(
            evaluate_cell(&mut arena, cell, &provider, &mut rng).unwrap(),
            Evaluation::Cached
        );
        assert_eq!(arena.value(cell).unwrap(), &first);
    }

    #[test]
    fn reading_an_unevaluated_reference_fails() {
        let entity = Arc::new(
            Entity::new("person")
                .with_field("alias", ValueSpec::dynamic(None, "$name").unwrap())
                .unwrap()
                .with_field("name", ValueSpec::constant(None, Value::Null))
                .unwrap(),
        );
        let mut arena = InstanceArena::new();
        let id = arena.instantiate(&entity, &BTreeMap::new(), None).unwrap();
        resolve_all(&mut arena).unwrap();
        let alias = arena.cell_id(id, "alias").unwrap();
        let provider = FakeProvider::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = evaluate_cell(&mut arena, alias, &provider, &mut rng).unwrap_err();
        assert!(matches!(err, GenerationError::UndefinedValue(_)));
    }
}
