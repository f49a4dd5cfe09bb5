//! Conversion of generated instances into JSON records.

use std::collections::BTreeMap;

use fixtura_core::{InstanceId, Value};
use serde_json::{Map, Value as JsonValue};

use crate::errors::GenerationError;
use crate::instance::InstanceArena;
use crate::model::RelatedMode;

/// Export every instance, grouped by entity, in creation order.
///
/// Entities listed in `entity_names` appear even when they have no
/// instances.
pub fn export_records<'a>(
    arena: &InstanceArena,
    entity_names: impl IntoIterator<Item = &'a str>,
    mode: RelatedMode,
) -> Result<BTreeMap<String, Vec<JsonValue>>, GenerationError> {
    let mut records: BTreeMap<String, Vec<JsonValue>> = entity_names
        .into_iter()
        .map(|name| (name.to_string(), Vec::new()))
        .collect();

    for instance in arena.iter() {
        let record = serialize_instance(arena, instance.id(), mode)?;
        records
            .entry(instance.entity_name().to_string())
            .or_default()
            .push(record);
    }
    Ok(records)
}

/// Serialize one instance as a JSON object with fields in declaration
/// order.
///
/// In [`RelatedMode::Inline`] related instances are nested; an instance that
/// is already being serialized higher up is written as its label instead, so
/// cyclic graphs terminate.
pub fn serialize_instance(
    arena: &InstanceArena,
    id: InstanceId,
    mode: RelatedMode,
) -> Result<JsonValue, GenerationError> {
    let mut path = Vec::new();
    serialize_nested(arena, id, mode, &mut path)
}

fn serialize_nested(
    arena: &InstanceArena,
    id: InstanceId,
    mode: RelatedMode,
    path: &mut Vec<InstanceId>,
) -> Result<JsonValue, GenerationError> {
    let instance = arena.get(id);
    path.push(id);

    let mut object = Map::new();
    for (cell, (_, declared)) in instance.cells().iter().zip(instance.entity().fields()) {
        if mode == RelatedMode::Omit && declared.is_relation() {
            continue;
        }
        let value = cell.value().map_err(|_| {
            GenerationError::UndefinedValue(format!(
                "{}.{} was never evaluated",
                instance.label(),
                cell.name()
            ))
        })?;
        object.insert(
            cell.name().to_string(),
            value_to_json(arena, value, mode, path)?,
        );
    }

    path.pop();
    Ok(JsonValue::Object(object))
}

fn value_to_json(
    arena: &InstanceArena,
    value: &Value,
    mode: RelatedMode,
    path: &mut Vec<InstanceId>,
) -> Result<JsonValue, GenerationError> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bool(value) => JsonValue::Bool(*value),
        Value::Int(value) => JsonValue::from(*value),
        Value::Float(value) => JsonValue::from(*value),
        Value::Text(value) => JsonValue::String(value.clone()),
        Value::Date(value) => JsonValue::String(value.format("%Y-%m-%d").to_string()),
        Value::Instance(related) => {
            if mode == RelatedMode::Inline && !path.contains(related) {
                serialize_nested(arena, *related, mode, path)?
            } else {
                JsonValue::String(arena.get(*related).label())
            }
        }
        Value::List(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| value_to_json(arena, item, mode, path))
                .collect::<Result<_, _>>()?,
        ),
    })
}
