//! Translation of schema documents into the entity model.

use std::collections::BTreeMap;

use crate::document::{FakerDocument, FieldDocument, SchemaDocument};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::spec::{RelationSpec, RelationStrategy, RelationType, ValueSpec};
use crate::value::Value;

const DEFAULT_INT_MIN: i64 = -1_000_000;
const DEFAULT_INT_MAX: i64 = 1_000_000;
const DEFAULT_MAX_CHARS: i64 = 20;

/// Build the entity model described by `document`.
///
/// Reciprocal relation fields are added as well, so the returned schema is
/// ready for generation.
pub fn parse_schema(document: &SchemaDocument) -> Result<Schema> {
    let mut schema = Schema::new();
    for (name, entity_doc) in &document.entities {
        let mut entity = Entity::new(name.clone());
        for (field_name, field_doc) in entity_doc.fields.iter() {
            let spec = value_spec_from_document(field_name, field_doc)
                .map_err(|err| contextualize(err, name, field_name))?;
            match spec {
                ValueSpec::Relation(relation) => entity
                    .add_relation(field_name, relation)
                    .map_err(|err| contextualize(err, name, field_name))?,
                other => entity.add_field(field_name, other)?,
            }
        }
        schema.add_entity(entity)?;
    }
    schema.complete_relations()?;
    Ok(schema)
}

pub fn parse_yaml_schema(source: &str) -> Result<Schema> {
    parse_schema(&SchemaDocument::from_yaml_str(source)?)
}

pub fn parse_json_schema(source: &str) -> Result<Schema> {
    parse_schema(&SchemaDocument::from_json_str(source)?)
}

/// Pick the value spec variant a field document describes.
pub fn value_spec_from_document(name: &str, doc: &FieldDocument) -> Result<ValueSpec> {
    let field_type = doc.field_type.as_str();

    // An explicit value wins even for relation fields: that is how overrides
    // point a relation at a concrete instance (`value: "$SELF"`).
    if let Some(value) = &doc.value {
        if let Some(text) = value.as_str().filter(|text| text.contains('$')) {
            return ValueSpec::dynamic(Some(field_type), text);
        }
        return Ok(ValueSpec::constant(
            Some(field_type),
            Value::from_literal(value, Some(field_type)),
        ));
    }

    if let Some(faker) = &doc.faker {
        let (generator, args) = provider_call(faker)?;
        return Ok(ValueSpec::provider(Some(field_type), &generator, args));
    }

    if field_type == "relation" {
        return relation_from_document(name, doc).map(ValueSpec::Relation);
    }

    Ok(provider_for_type(field_type))
}

fn provider_call(faker: &FakerDocument) -> Result<(String, BTreeMap<String, serde_json::Value>)> {
    match faker {
        FakerDocument::Name(name) => Ok((name.clone(), BTreeMap::new())),
        FakerDocument::Call(calls) => {
            let mut calls = calls.iter();
            let (Some((name, args)), None) = (calls.next(), calls.next()) else {
                return Err(Error::configuration(
                    "exactly one faker function must be specified",
                ));
            };
            Ok((name.clone(), args.clone().unwrap_or_default()))
        }
    }
}

fn relation_from_document(name: &str, doc: &FieldDocument) -> Result<RelationSpec> {
    let relation_type: RelationType = doc
        .relation_type
        .as_deref()
        .ok_or_else(|| Error::configuration("relation fields require 'relation_type'"))?
        .parse()?;
    let to = doc
        .to
        .as_deref()
        .ok_or_else(|| Error::configuration("relation fields require 'to: <entity>.<key>'"))?;
    let (target_entity, target_key) = to
        .split_once('.')
        .filter(|(entity, key)| !entity.is_empty() && !key.is_empty() && !key.contains('.'))
        .ok_or_else(|| {
            Error::configuration(format!("relation target '{to}' must be '<entity>.<key>'"))
        })?;
    let strategy = match doc.relation_strategy.as_deref() {
        Some(strategy) => strategy.parse()?,
        None => RelationStrategy::CREATE_ONE,
    };

    let mut relation = RelationSpec::new(relation_type, target_entity, target_key, strategy)?;

    relation.local_field = match (&doc.local_field, relation_type) {
        (Some(local_field), _) => Some(local_field.clone()),
        (None, RelationType::OneToMany) => None,
        (None, _) => Some(format!("{name}_{target_key}")),
    };
    relation.remote_name = doc.remote_name.clone();

    for (field, override_doc) in &doc.relation_overrides {
        let spec = value_spec_from_document(field, override_doc)?;
        if spec.is_relation() {
            return Err(Error::configuration(format!(
                "override '{field}' must give the relation a value, not declare a new relation"
            )));
        }
        relation.overrides.insert(field.clone(), spec);
    }

    Ok(relation)
}

/// Provider used when a field only declares its type.
pub fn provider_for_type(field_type: &str) -> ValueSpec {
    let mut args = BTreeMap::new();
    let generator = match field_type {
        "integer" => {
            args.insert("min_value".to_string(), DEFAULT_INT_MIN.into());
            args.insert("max_value".to_string(), DEFAULT_INT_MAX.into());
            "pyint"
        }
        "string" => {
            args.insert("max_chars".to_string(), DEFAULT_MAX_CHARS.into());
            "pystr"
        }
        "date" => "date",
        "float" => "pyfloat",
        "boolean" => "pybool",
        other => return ValueSpec::constant(Some(other), Value::Null),
    };
    ValueSpec::provider(Some(field_type), generator, args)
}

fn contextualize(err: Error, entity: &str, field: &str) -> Error {
    match err {
        Error::Configuration(message) => {
            Error::Configuration(format!("{entity}.{field}: {message}"))
        }
        Error::InvalidReference(message) => {
            Error::InvalidReference(format!("{entity}.{field}: {message}"))
        }
        other => other,
    }
}
