use std::collections::BTreeMap;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::expression::SELF_ANCHOR;
use crate::spec::{RelationSpec, RelationStrategy, ValueSpec};

/// Set of entities a generation run works on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    entities: BTreeMap<String, Entity>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: Entity) -> Result<()> {
        if self.entities.contains_key(entity.name()) {
            return Err(Error::configuration(format!(
                "entity '{}' is declared twice",
                entity.name()
            )));
        }
        self.entities.insert(entity.name().to_string(), entity);
        Ok(())
    }

    pub fn with_entity(mut self, entity: Entity) -> Result<Self> {
        self.add_entity(entity)?;
        Ok(self)
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn into_entities(self) -> BTreeMap<String, Entity> {
        self.entities
    }

    /// Add the reciprocal field of every relation that declares a
    /// `remote_name`, and check that relation targets exist.
    ///
    /// Reciprocal fields that are already present are left alone, so calling
    /// this more than once is harmless. A self-referential one-to-one relation
    /// whose `remote_name` is the relation itself is its own reciprocal.
    pub fn complete_relations(&mut self) -> Result<()> {
        let mut additions: Vec<(String, String, RelationSpec)> = Vec::new();

        for (owner, entity) in &self.entities {
            for (field, relation) in entity.relations() {
                let target = self.entities.get(&relation.target_entity).ok_or_else(|| {
                    Error::configuration(format!(
                        "relation '{owner}.{field}' targets unknown entity '{}'",
                        relation.target_entity
                    ))
                })?;
                if relation.target_key != SELF_ANCHOR && target.field(&relation.target_key).is_none()
                {
                    return Err(Error::configuration(format!(
                        "relation '{owner}.{field}' targets unknown field '{}.{}'",
                        relation.target_entity, relation.target_key
                    )));
                }

                if relation.strategy == RelationStrategy::None {
                    continue;
                }
                let (Some(remote_name), Some(reciprocal)) =
                    (relation.remote_name.as_ref(), relation.reciprocal(owner, field))
                else {
                    continue;
                };

                match target.field(remote_name) {
                    Some(ValueSpec::Relation(existing))
                        if existing.target_entity == *owner
                            && existing.remote_name.as_deref() == Some(field) => {}
                    Some(_) => {
                        return Err(Error::configuration(format!(
                            "relation '{owner}.{field}' cannot add reciprocal field \
                             '{}.{remote_name}': the field already exists",
                            relation.target_entity
                        )));
                    }
                    None => additions.push((
                        relation.target_entity.clone(),
                        remote_name.clone(),
                        reciprocal,
                    )),
                }
            }
        }

        for (target, remote_name, reciprocal) in additions {
            if let Some(entity) = self.entities.get_mut(&target) {
                entity.add_field(remote_name, ValueSpec::Relation(reciprocal))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::RelationType;
    use crate::value::Value;

    fn company() -> Entity {
        Entity::new("company")
            .with_field("id", ValueSpec::constant(Some("integer"), Value::Int(1)))
            .unwrap()
    }

    fn employee(strategy: RelationStrategy) -> Entity {
        let relation = RelationSpec::new(RelationType::ManyToOne, "company", "id", strategy)
            .unwrap()
            .with_local_field("company_id")
            .with_remote_name("employees");
        Entity::new("employee")
            .with_relation("company", relation)
            .unwrap()
    }

    #[test]
    fn adds_reciprocal_fields_once() {
        let mut schema = Schema::new()
            .with_entity(company())
            .unwrap()
            .with_entity(employee(RelationStrategy::PickRandom))
            .unwrap();
        schema.complete_relations().unwrap();
        schema.complete_relations().unwrap();

        let company = schema.entity("company").unwrap();
        let employees = company.field("employees").and_then(ValueSpec::as_relation).unwrap();
        assert_eq!(employees.relation_type, RelationType::OneToMany);
        assert_eq!(employees.target_entity, "employee");
        assert_eq!(company.len(), 2);
    }

    #[test]
    fn none_strategy_adds_no_reciprocal() {
        let mut schema = Schema::new()
            .with_entity(company())
            .unwrap()
            .with_entity(employee(RelationStrategy::None))
            .unwrap();
        schema.complete_relations().unwrap();
        assert!(schema.entity("company").unwrap().field("employees").is_none());
    }

    #[test]
    fn unknown_target_entity_is_a_configuration_error() {
        let mut schema = Schema::new()
            .with_entity(employee(RelationStrategy::CREATE_ONE))
            .unwrap();
        let err = schema.complete_relations().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn self_referential_one_to_one_is_its_own_reciprocal() {
        let relation = RelationSpec::new(
            RelationType::OneToOne,
            "person",
            "id",
            RelationStrategy::PickRandom,
        )
        .unwrap()
        .with_remote_name("partner");
        let person = Entity::new("person")
            .with_field("id", ValueSpec::constant(None, Value::Int(1)))
            .unwrap()
            .with_relation("partner", relation)
            .unwrap();
        let mut schema = Schema::new().with_entity(person).unwrap();
        schema.complete_relations().unwrap();
        assert_eq!(schema.entity("person").unwrap().len(), 2);
    }
}
