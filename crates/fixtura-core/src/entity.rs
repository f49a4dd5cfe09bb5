use crate::error::{Error, Result};
use crate::spec::{RelationSpec, ValueSpec};

/// Named record type with an ordered set of field specs.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    name: String,
    fields: Vec<(String, ValueSpec)>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a field; names must be unique within the entity.
    pub fn add_field(&mut self, name: impl Into<String>, spec: ValueSpec) -> Result<()> {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(Error::configuration(format!(
                "entity '{}' already has a field named '{name}'",
                self.name
            )));
        }
        self.fields.push((name, spec));
        Ok(())
    }

    /// Add a relation field together with the fields it derives.
    pub fn add_relation(&mut self, name: impl Into<String>, relation: RelationSpec) -> Result<()> {
        let name = name.into();
        let derived = relation.derived_fields(&name)?;
        self.add_field(name, ValueSpec::Relation(relation))?;
        for (derived_name, spec) in derived {
            self.add_field(derived_name, spec)?;
        }
        Ok(())
    }

    pub fn with_field(mut self, name: impl Into<String>, spec: ValueSpec) -> Result<Self> {
        self.add_field(name, spec)?;
        Ok(self)
    }

    pub fn with_relation(mut self, name: impl Into<String>, relation: RelationSpec) -> Result<Self> {
        self.add_relation(name, relation)?;
        Ok(self)
    }

    pub fn field(&self, name: &str) -> Option<&ValueSpec> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, spec)| spec)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(field, _)| field == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ValueSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &RelationSpec)> {
        self.fields
            .iter()
            .filter_map(|(name, spec)| spec.as_relation().map(|relation| (name.as_str(), relation)))
    }
}
