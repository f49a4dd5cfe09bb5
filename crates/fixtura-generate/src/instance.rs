//! Instances and the field cells they own.
//!
//! Every instance of a run lives in one [`InstanceArena`] and is addressed by
//! its [`InstanceId`]. Cells point at other cells or instances through ids, so
//! the object graph may contain cycles without shared ownership.

use std::collections::BTreeMap;
use std::sync::Arc;

use fixtura_core::{Entity, InstanceId, Reference, Value, ValueSpec};

use crate::errors::GenerationError;

/// Address of a field cell: the owning instance and the field position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId {
    pub instance: InstanceId,
    pub field: usize,
}

impl CellId {
    pub const fn new(instance: InstanceId, field: usize) -> Self {
        Self { instance, field }
    }
}

/// Lifecycle of a cell value.
///
/// A cell moves from `Unresolved` to exactly one of the defined states and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum CellState {
    Unresolved,
    Overridden(Value),
    Evaluated(Value),
}

/// What a reference of a cell points at once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
    Cell(CellId),
    Instance(InstanceId),
    /// The path crossed a relation with no instance behind it.
    Absent,
}

/// Field slot of one instance.
#[derive(Debug, Clone)]
pub struct FieldCell {
    name: String,
    spec: ValueSpec,
    owner: InstanceId,
    context: InstanceId,
    state: CellState,
    resolved: BTreeMap<Reference, ResolvedTarget>,
}

impl FieldCell {
    fn new(name: &str, spec: ValueSpec, owner: InstanceId, context: InstanceId) -> Self {
        Self {
            name: name.to_string(),
            spec,
            owner,
            context,
            state: CellState::Unresolved,
            resolved: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ValueSpec {
        &self.spec
    }

    pub fn owner(&self) -> InstanceId {
        self.owner
    }

    /// Instance that references of this cell are resolved from. This is the
    /// owner unless the value spec came from a relation override, in which case it
    /// is the instance that declared the override.
    pub fn context(&self) -> InstanceId {
        self.context
    }

    pub fn state(&self) -> &CellState {
        &self.state
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self.state, CellState::Unresolved)
    }

    pub fn defined_value(&self) -> Option<&Value> {
        match &self.state {
            CellState::Unresolved => None,
            CellState::Overridden(value) | CellState::Evaluated(value) => Some(value),
        }
    }

    pub fn value(&self) -> Result<&Value, GenerationError> {
        self.defined_value().ok_or_else(|| {
            GenerationError::UndefinedValue(format!("field '{}' has no value yet", self.name))
        })
    }

    /// Set the value from outside evaluation (relation linking).
    pub fn override_value(&mut self, value: Value) -> Result<(), GenerationError> {
        if self.is_defined() {
            return Err(GenerationError::configuration(format!(
                "field '{}' already has a value",
                self.name
            )));
        }
        self.state = CellState::Overridden(value);
        Ok(())
    }

    /// Append an instance to a list-valued relation, starting the list when
    /// the cell is still unresolved.
    pub fn push_related(&mut self, instance: InstanceId) -> Result<(), GenerationError> {
        match &mut self.state {
            CellState::Unresolved => {
                self.state = CellState::Overridden(Value::List(vec![Value::Instance(instance)]));
                Ok(())
            }
            CellState::Overridden(Value::List(items)) => {
                items.push(Value::Instance(instance));
                Ok(())
            }
            _ => Err(GenerationError::configuration(format!(
                "field '{}' does not hold a list of related instances",
                self.name
            ))),
        }
    }

    pub(crate) fn set_evaluated(&mut self, value: Value) {
        if !self.is_defined() {
            self.state = CellState::Evaluated(value);
        }
    }

    pub fn unresolved_references(&self) -> Vec<Reference> {
        self.spec
            .references()
            .into_iter()
            .filter(|reference| !self.resolved.contains_key(*reference))
            .cloned()
            .collect()
    }

    pub fn add_resolved_reference(&mut self, reference: Reference, target: ResolvedTarget) {
        self.resolved.insert(reference, target);
    }

    pub fn resolved_reference(
        &self,
        reference: &Reference,
    ) -> Result<ResolvedTarget, GenerationError> {
        self.resolved.get(reference).copied().ok_or_else(|| {
            GenerationError::UnresolvedReference(format!(
                "'{reference}' of field '{}' was read before resolution",
                self.name
            ))
        })
    }

    pub fn resolved_references(&self) -> impl Iterator<Item = (&Reference, &ResolvedTarget)> {
        self.resolved.iter()
    }

    /// Cells whose values this cell needs before it can be evaluated.
    pub fn dependencies(&self) -> impl Iterator<Item = CellId> + '_ {
        self.resolved.values().filter_map(|target| match target {
            ResolvedTarget::Cell(cell) => Some(*cell),
            ResolvedTarget::Instance(_) | ResolvedTarget::Absent => None,
        })
    }
}

/// One materialized entity.
#[derive(Debug, Clone)]
pub struct Instance {
    id: InstanceId,
    entity: Arc<Entity>,
    ordinal: usize,
    cells: Vec<FieldCell>,
}

impl Instance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    pub fn entity_name(&self) -> &str {
        self.entity.name()
    }

    /// Position among the instances of the same entity.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn label(&self) -> String {
        format!("{}#{}", self.entity.name(), self.ordinal)
    }

    pub fn cells(&self) -> &[FieldCell] {
        &self.cells
    }

    pub fn cell(&self, name: &str) -> Option<&FieldCell> {
        self.cells.iter().find(|cell| cell.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.cells.iter().position(|cell| cell.name == name)
    }
}

/// Owner of every instance created during a run.
#[derive(Debug, Clone, Default)]
pub struct InstanceArena {
    instances: Vec<Instance>,
    ordinals: BTreeMap<String, usize>,
}

impl InstanceArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an instance of `entity` with one unresolved cell per field.
    ///
    /// Fields named in `overrides` take the override spec instead of the
    /// declared one; their references resolve from `override_context` when
    /// given.
    pub fn instantiate(
        &mut self,
        entity: &Arc<Entity>,
        overrides: &BTreeMap<String, ValueSpec>,
        override_context: Option<InstanceId>,
    ) -> Result<InstanceId, GenerationError> {
        if let Some(unknown) = overrides.keys().find(|name| entity.field(name).is_none()) {
            return Err(GenerationError::configuration(format!(
                "override '{unknown}' is not a field of entity '{}'",
                entity.name()
            )));
        }

        let id = InstanceId::new(self.instances.len());
        let cells = entity
            .fields()
            .map(|(name, spec)| match overrides.get(name) {
                Some(replacement) => FieldCell::new(
                    name,
                    replacement.clone(),
                    id,
                    override_context.unwrap_or(id),
                ),
                None => FieldCell::new(name, spec.clone(), id, id),
            })
            .collect();

        let ordinal = self.ordinals.entry(entity.name().to_string()).or_insert(0);
        let instance = Instance {
            id,
            entity: Arc::clone(entity),
            ordinal: *ordinal,
            cells,
        };
        *ordinal += 1;
        self.instances.push(instance);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Panics when `id` was not produced by this arena.
    pub fn get(&self, id: InstanceId) -> &Instance {
        &self.instances[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    pub fn instances_of<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Instance> {
        self.instances
            .iter()
            .filter(move |instance| instance.entity_name() == entity)
    }

    pub fn count_of(&self, entity: &str) -> usize {
        self.ordinals.get(entity).copied().unwrap_or(0)
    }

    pub fn cell(&self, id: CellId) -> &FieldCell {
        &self.instances[id.instance.index()].cells[id.field]
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut FieldCell {
        &mut self.instances[id.instance.index()].cells[id.field]
    }

    pub fn cell_id(&self, instance: InstanceId, name: &str) -> Option<CellId> {
        self.get(instance)
            .field_index(name)
            .map(|field| CellId::new(instance, field))
    }

    pub fn cell_ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.instances.iter().flat_map(|instance| {
            (0..instance.cells.len()).map(move |field| CellId::new(instance.id, field))
        })
    }

    /// `entity#ordinal.field`, used in errors and logs.
    pub fn cell_label(&self, id: CellId) -> String {
        let instance = self.get(id.instance);
        format!("{}.{}", instance.label(), instance.cells[id.field].name)
    }

    pub fn value(&self, id: CellId) -> Result<&Value, GenerationError> {
        self.cell(id).defined_value().ok_or_else(|| {
            GenerationError::UndefinedValue(format!("'{}' has no value yet", self.cell_label(id)))
        })
    }
}
