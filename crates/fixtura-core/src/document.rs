use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::Schema as JsonSchemaObject;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;

/// Top-level schema document (YAML or JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDocument {
    /// Entities keyed by name.
    pub entities: BTreeMap<String, EntityDocument>,
}

impl SchemaDocument {
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

/// Entity declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EntityDocument {
    /// Fields in declaration order.
    pub fields: FieldDocuments,
}

/// Field declaration.
///
/// `value` holds a constant, or a dynamic expression when it is a string
/// containing `$`. `faker` names a provider generator. Relation keys apply
/// when `type` is `relation`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDocument {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faker: Option<FakerDocument>,
    /// `one_to_one`, `one_to_many` or `many_to_one` (`1t1`, `1tm`, `mt1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
    /// Relation target as `<entity>.<key>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_name: Option<String>,
    /// `pick_random`, `create`, `create(n)`, `create(n,m)` or `none`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relation_overrides: BTreeMap<String, FieldDocument>,
}

/// Provider generator reference: a bare name or `{name: {kwargs}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FakerDocument {
    Name(String),
    Call(BTreeMap<String, Option<BTreeMap<String, serde_json::Value>>>),
}

/// Field documents keeping the order in which they were declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDocuments(pub Vec<(String, FieldDocument)>);

impl FieldDocuments {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDocument)> {
        self.0.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn push(&mut self, name: impl Into<String>, field: FieldDocument) {
        self.0.push((name.into(), field));
    }
}

impl Serialize for FieldDocuments {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, field) in &self.0 {
            map.serialize_entry(name, field)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldDocuments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = FieldDocuments;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to field declarations")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, field)) = access.next_entry::<String, FieldDocument>()? {
                    if fields.iter().any(|(existing, _)| existing == &name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate field '{name}'"
                        )));
                    }
                    fields.push((name, field));
                }
                Ok(FieldDocuments(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

impl JsonSchema for FieldDocuments {
    fn schema_name() -> String {
        "FieldDocuments".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> JsonSchemaObject {
        <BTreeMap<String, FieldDocument>>::json_schema(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_keeps_field_order() {
        let doc = SchemaDocument::from_yaml_str(
            r#"
entities:
  user:
    fields:
      zeta: {type: integer}
      alpha: {type: string, value: "x"}
      mid: {type: date}
"#,
        )
        .unwrap();
        let names: Vec<&str> = doc.entities["user"].fields.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn yaml_and_json_fields_compare_equal() {
        let yaml = SchemaDocument::from_yaml_str(
            r#"
entities:
  u:
    fields:
      a: {type: integer, faker: {pyint: {min_value: 1}}}
      b: {type: string, value: "$a x"}
"#,
        )
        .unwrap();
        let json = SchemaDocument::from_json_str(
            r#"{"entities": {"u": {"fields": {
                "a": {"type": "integer", "faker": {"pyint": {"min_value": 1}}},
                "b": {"type": "string", "value": "$a x"}
            }}}}"#,
        )
        .unwrap();
        assert_eq!(yaml.entities["u"].fields, json.entities["u"].fields);

        let mut reordered = FieldDocuments::default();
        for (name, field) in json.entities["u"].fields.0.iter().rev() {
            reordered.push(name.clone(), field.clone());
        }
        assert_ne!(yaml.entities["u"].fields, reordered);
    }

    #[test]
    fn faker_accepts_name_or_call() {
        let doc = SchemaDocument::from_json_str(
            r#"{"entities": {"u": {"fields": {
                "a": {"type": "integer", "faker": {"pyint": {"min_value": 1}}},
                "b": {"type": "string", "faker": "name"}
            }}}}"#,
        )
        .unwrap();
        let fields = &doc.entities["u"].fields;
        assert!(matches!(fields.0[0].1.faker, Some(FakerDocument::Call(_))));
        assert!(matches!(fields.0[1].1.faker, Some(FakerDocument::Name(_))));
    }

    #[test]
    fn duplicate_field_names_fail_to_parse() {
        let err = SchemaDocument::from_json_str(
            r#"{"entities": {"u": {"fields": {
                "a": {"type": "integer"},
                "a": {"type": "string"}
            }}}}"#,
        );
        assert!(err.is_err());
    }
}
