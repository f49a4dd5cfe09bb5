use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::expression::{Expression, Reference, SELF_ANCHOR};
use crate::value::Value;

/// Discriminant of [`ValueSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSpecKind {
    Constant,
    Dynamic,
    Provider,
    Relation,
}

/// How the value of a field is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSpec {
    /// Fixed value.
    Constant {
        field_type: Option<String>,
        value: Value,
    },
    /// Literal text mixed with references to other fields.
    Dynamic {
        field_type: Option<String>,
        expression: Expression,
    },
    /// Leaf value drawn from a value provider.
    Provider {
        field_type: Option<String>,
        generator: String,
        args: BTreeMap<String, serde_json::Value>,
    },
    /// Link to instances of another entity.
    Relation(RelationSpec),
}

impl ValueSpec {
    pub fn constant(field_type: Option<&str>, value: Value) -> Self {
        ValueSpec::Constant {
            field_type: field_type.map(str::to_string),
            value,
        }
    }

    pub fn dynamic(field_type: Option<&str>, source: &str) -> Result<Self> {
        Ok(ValueSpec::Dynamic {
            field_type: field_type.map(str::to_string),
            expression: Expression::parse(source)?,
        })
    }

    pub fn provider(
        field_type: Option<&str>,
        generator: &str,
        args: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        ValueSpec::Provider {
            field_type: field_type.map(str::to_string),
            generator: generator.to_string(),
            args,
        }
    }

    pub fn kind(&self) -> ValueSpecKind {
        match self {
            ValueSpec::Constant { .. } => ValueSpecKind::Constant,
            ValueSpec::Dynamic { .. } => ValueSpecKind::Dynamic,
            ValueSpec::Provider { .. } => ValueSpecKind::Provider,
            ValueSpec::Relation(_) => ValueSpecKind::Relation,
        }
    }

    pub fn field_type(&self) -> Option<&str> {
        match self {
            ValueSpec::Constant { field_type, .. }
            | ValueSpec::Dynamic { field_type, .. }
            | ValueSpec::Provider { field_type, .. } => field_type.as_deref(),
            ValueSpec::Relation(_) => Some("relation"),
        }
    }

    pub fn as_relation(&self) -> Option<&RelationSpec> {
        match self {
            ValueSpec::Relation(relation) => Some(relation),
            _ => None,
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, ValueSpec::Relation(_))
    }

    /// References that must be resolved before the value can be produced.
    pub fn references(&self) -> Vec<&Reference> {
        match self {
            ValueSpec::Dynamic { expression, .. } => expression.references().collect(),
            _ => Vec::new(),
        }
    }
}

/// Cardinality of a relation, seen from the entity that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationType {
    OneToOne,
    OneToMany,
    ManyToOne,
}

impl RelationType {
    /// Cardinality of the reciprocal field on the target entity.
    pub fn inverse(self) -> Self {
        match self {
            RelationType::OneToOne => RelationType::OneToOne,
            RelationType::OneToMany => RelationType::ManyToOne,
            RelationType::ManyToOne => RelationType::OneToMany,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::OneToOne => "one_to_one",
            RelationType::OneToMany => "one_to_many",
            RelationType::ManyToOne => "many_to_one",
        }
    }

    /// Value of a relation field that was never linked.
    pub fn default_value(self) -> Value {
        match self {
            RelationType::OneToMany => Value::List(Vec::new()),
            RelationType::OneToOne | RelationType::ManyToOne => Value::Null,
        }
    }
}

impl FromStr for RelationType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "one_to_one" | "1t1" => Ok(RelationType::OneToOne),
            "one_to_many" | "1tm" => Ok(RelationType::OneToMany),
            "many_to_one" | "mt1" => Ok(RelationType::ManyToOne),
            other => Err(Error::configuration(format!(
                "unknown relation_type '{other}', expected one of \
                 'one_to_one', 'one_to_many' or 'many_to_one'"
            ))),
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the target of a relation is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationStrategy {
    /// Reuse one already known instance of the target entity.
    PickRandom,
    /// Create between `min` and `max` new targets (inclusive).
    Create { min: usize, max: usize },
    /// Leave the relation at its default value.
    None,
}

impl RelationStrategy {
    pub const CREATE_ONE: RelationStrategy = RelationStrategy::Create { min: 1, max: 1 };

    /// Check that the strategy is usable with `relation_type`.
    pub fn validate_for(self, relation_type: RelationType) -> Result<()> {
        match (self, relation_type) {
            (RelationStrategy::PickRandom, RelationType::OneToMany) => Err(Error::configuration(
                "relation_strategy 'pick_random' is not supported for one_to_many relations",
            )),
            (RelationStrategy::Create { min, max }, _) if min > max => Err(Error::configuration(
                format!("relation_strategy 'create({min},{max})' has min greater than max"),
            )),
            (RelationStrategy::Create { min: 1, max: 1 }, _) => Ok(()),
            (RelationStrategy::Create { .. }, RelationType::OneToMany) => Ok(()),
            (strategy @ RelationStrategy::Create { .. }, relation_type) => {
                Err(Error::configuration(format!(
                    "relation_strategy '{strategy}' is only valid for one_to_many relations, \
                     not {relation_type}"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl FromStr for RelationStrategy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        match value {
            "pick_random" => return Ok(RelationStrategy::PickRandom),
            "create" => return Ok(RelationStrategy::CREATE_ONE),
            "none" => return Ok(RelationStrategy::None),
            _ => {}
        }

        let invalid = || {
            Error::configuration(format!(
                "invalid relation_strategy '{value}', expected one of 'pick_random', \
                 'create', 'create(n)', 'create(n,m)' or 'none'"
            ))
        };
        let args = value
            .strip_prefix("create(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let bounds = args
            .split(',')
            .map(|bound| bound.trim().parse::<usize>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;
        let (min, max) = match bounds.as_slice() {
            [count] => (*count, *count),
            [min, max] => (*min, *max),
            _ => return Err(invalid()),
        };
        if min > max {
            return Err(Error::configuration(format!(
                "relation_strategy '{value}' has min greater than max"
            )));
        }
        Ok(RelationStrategy::Create { min, max })
    }
}

impl fmt::Display for RelationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationStrategy::PickRandom => f.write_str("pick_random"),
            RelationStrategy::Create { min: 1, max: 1 } => f.write_str("create"),
            RelationStrategy::Create { min, max } if min == max => write!(f, "create({min})"),
            RelationStrategy::Create { min, max } => write!(f, "create({min},{max})"),
            RelationStrategy::None => f.write_str("none"),
        }
    }
}

/// Declared link from one entity to another.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSpec {
    pub relation_type: RelationType,
    /// Companion foreign-key field holding the target key.
    pub local_field: Option<String>,
    pub target_entity: String,
    pub target_key: String,
    /// Reciprocal field created on the target entity.
    pub remote_name: Option<String>,
    pub strategy: RelationStrategy,
    /// Field overrides applied to targets created by this relation.
    pub overrides: BTreeMap<String, ValueSpec>,
}

impl RelationSpec {
    pub fn new(
        relation_type: RelationType,
        target_entity: impl Into<String>,
        target_key: impl Into<String>,
        strategy: RelationStrategy,
    ) -> Result<Self> {
        strategy.validate_for(relation_type)?;
        Ok(Self {
            relation_type,
            local_field: None,
            target_entity: target_entity.into(),
            target_key: target_key.into(),
            remote_name: None,
            strategy,
            overrides: BTreeMap::new(),
        })
    }

    pub fn with_local_field(mut self, local_field: impl Into<String>) -> Self {
        self.local_field = Some(local_field.into());
        self
    }

    pub fn with_remote_name(mut self, remote_name: impl Into<String>) -> Self {
        self.remote_name = Some(remote_name.into());
        self
    }

    pub fn with_override(mut self, field: impl Into<String>, spec: ValueSpec) -> Self {
        self.overrides.insert(field.into(), spec);
        self
    }

    /// Fields that exist because this relation exists on field `name`.
    ///
    /// The local foreign-key field reads the target key through the relation
    /// (`parent_id = $parent.id`).
    pub fn derived_fields(&self, name: &str) -> Result<Vec<(String, ValueSpec)>> {
        let Some(local_field) = &self.local_field else {
            return Ok(Vec::new());
        };
        if self.relation_type == RelationType::OneToMany {
            return Err(Error::configuration(format!(
                "relation '{name}': one_to_many relations cannot declare local_field '{local_field}'"
            )));
        }
        let reference = Reference::parse(&format!("{name}.{}", self.target_key))?;
        Ok(vec![(
            local_field.clone(),
            ValueSpec::Dynamic {
                field_type: None,
                expression: Expression::from_reference(reference),
            },
        )])
    }

    /// Spec of the reciprocal field on the target entity.
    pub fn reciprocal(&self, owner_entity: &str, field_name: &str) -> Option<RelationSpec> {
        self.remote_name.as_ref()?;
        Some(RelationSpec {
            relation_type: self.relation_type.inverse(),
            local_field: None,
            target_entity: owner_entity.to_string(),
            target_key: SELF_ANCHOR.to_string(),
            remote_name: Some(field_name.to_string()),
            strategy: RelationStrategy::None,
            overrides: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strategies() {
        assert_eq!(
            "pick_random".parse::<RelationStrategy>().unwrap(),
            RelationStrategy::PickRandom
        );
        assert_eq!(
            "create".parse::<RelationStrategy>().unwrap(),
            RelationStrategy::CREATE_ONE
        );
        assert_eq!(
            "create(2)".parse::<RelationStrategy>().unwrap(),
            RelationStrategy::Create { min: 2, max: 2 }
        );
        assert_eq!(
            "create(1, 3)".parse::<RelationStrategy>().unwrap(),
            RelationStrategy::Create { min: 1, max: 3 }
        );
        assert_eq!("none".parse::<RelationStrategy>().unwrap(), RelationStrategy::None);
    }

    #[test]
    fn rejects_inverted_create_bounds() {
        let err = "create(3,1)".parse::<RelationStrategy>().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn rejects_garbage_strategies() {
        for value in ["random", "create()", "create(a)", "create(1,2,3)", "create(-1)"] {
            assert!(value.parse::<RelationStrategy>().is_err(), "{value}");
        }
    }

    #[test]
    fn pick_random_is_invalid_for_one_to_many() {
        let err = RelationSpec::new(
            RelationType::OneToMany,
            "child",
            "id",
            RelationStrategy::PickRandom,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn counted_create_is_invalid_for_to_one() {
        let err = RelationStrategy::Create { min: 2, max: 3 }
            .validate_for(RelationType::ManyToOne)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn relation_derives_local_field() {
        let relation = RelationSpec::new(
            RelationType::ManyToOne,
            "company",
            "id",
            RelationStrategy::CREATE_ONE,
        )
        .unwrap()
        .with_local_field("company_id");
        let derived = relation.derived_fields("company").unwrap();
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].0, "company_id");
        let refs: Vec<&str> = derived[0].1.references().iter().map(|r| r.path()).collect();
        assert_eq!(refs, vec!["company.id"]);
    }

    #[test]
    fn reciprocal_inverts_cardinality() {
        let relation = RelationSpec::new(
            RelationType::ManyToOne,
            "company",
            "id",
            RelationStrategy::PickRandom,
        )
        .unwrap()
        .with_remote_name("employees");
        let reciprocal = relation.reciprocal("employee", "company").unwrap();
        assert_eq!(reciprocal.relation_type, RelationType::OneToMany);
        assert_eq!(reciprocal.target_entity, "employee");
        assert_eq!(reciprocal.remote_name.as_deref(), Some("company"));
        assert_eq!(reciprocal.strategy, RelationStrategy::None);
    }
}
