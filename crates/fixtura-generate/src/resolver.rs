//! Reference resolution.
//!
//! References are walked from a context instance, one path segment at a time.
//! Intermediate segments must name relation fields that already hold an
//! instance, so resolution runs after relations are materialized.

use fixtura_core::{InstanceId, Reference, SELF_ANCHOR, Value};
use tracing::debug;

use crate::errors::GenerationError;
use crate::instance::{CellId, InstanceArena, ResolvedTarget};

/// Resolve `reference` starting at `context`.
pub fn resolve(
    arena: &InstanceArena,
    reference: &Reference,
    context: InstanceId,
) -> Result<ResolvedTarget, GenerationError> {
    let segments: Vec<&str> = reference.segments().collect();
    let Some((last, path)) = segments.split_last() else {
        return Err(GenerationError::InvalidReference(format!(
            "'{reference}' is empty"
        )));
    };

    let mut current = context;
    for segment in path {
        if *segment == SELF_ANCHOR {
            continue;
        }
        let cell = field_cell(arena, reference, current, segment)?;
        match arena.cell(cell).defined_value() {
            Some(Value::Instance(next)) => current = *next,
            Some(Value::Null) => return Ok(ResolvedTarget::Absent),
            Some(_) => {
                return Err(GenerationError::InvalidReference(format!(
                    "'{reference}': '{}' does not hold a single instance",
                    arena.cell_label(cell)
                )));
            }
            None => {
                return Err(GenerationError::UnresolvedReference(format!(
                    "'{reference}': '{}' is not linked to an instance yet",
                    arena.cell_label(cell)
                )));
            }
        }
    }

    if *last == SELF_ANCHOR {
        Ok(ResolvedTarget::Instance(current))
    } else {
        field_cell(arena, reference, current, last).map(ResolvedTarget::Cell)
    }
}

fn field_cell(
    arena: &InstanceArena,
    reference: &Reference,
    instance: InstanceId,
    field: &str,
) -> Result<CellId, GenerationError> {
    arena.cell_id(instance, field).ok_or_else(|| {
        GenerationError::InvalidReference(format!(
            "'{reference}': {} has no field '{field}'",
            arena.get(instance).label()
        ))
    })
}

/// Resolve every pending reference of one cell.
pub fn resolve_cell_references(
    arena: &mut InstanceArena,
    cell: CellId,
) -> Result<usize, GenerationError> {
    let field = arena.cell(cell);
    let context = field.context();
    let resolved = field
        .unresolved_references()
        .into_iter()
        .map(|reference| {
            let target = resolve(arena, &reference, context)?;
            Ok((reference, target))
        })
        .collect::<Result<Vec<_>, GenerationError>>()?;

    let count = resolved.len();
    let field = arena.cell_mut(cell);
    for (reference, target) in resolved {
        field.add_resolved_reference(reference, target);
    }
    Ok(count)
}

/// Resolve the references of every cell in the arena.
pub fn resolve_all(arena: &mut InstanceArena) -> Result<usize, GenerationError> {
    let cells: Vec<CellId> = arena.cell_ids().collect();
    let mut total = 0;
    for cell in cells {
        total += resolve_cell_references(arena, cell)?;
    }
    debug!(references = total, "references resolved");
    Ok(total)
}
