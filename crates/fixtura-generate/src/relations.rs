//! Relation materialization.
//!
//! Relations are processed pass by pass: every pass links the relation
//! fields of the instances found in the previous one and returns the
//! instances it created, which the next pass handles in turn.

use std::collections::BTreeMap;
use std::sync::Arc;

use fixtura_core::{Entity, InstanceId, RelationSpec, RelationStrategy, RelationType, Value};
use rand::{Rng, RngCore};
use tracing::debug;

use crate::errors::GenerationError;
use crate::evaluate::evaluate_cell;
use crate::instance::{CellId, InstanceArena};
use crate::pool::KnownInstances;
use crate::provider::ValueProvider;
use crate::resolver::resolve_cell_references;

pub struct RelationMaker<'a> {
    entities: &'a BTreeMap<String, Arc<Entity>>,
    known: KnownInstances,
}

impl<'a> RelationMaker<'a> {
    pub fn new(entities: &'a BTreeMap<String, Arc<Entity>>) -> Self {
        Self {
            entities,
            known: KnownInstances::new(),
        }
    }

    pub fn known(&self) -> &KnownInstances {
        &self.known
    }

    /// Run one pass over `instances` and return the instances it created.
    pub fn make_relations<P: ValueProvider + ?Sized>(
        &mut self,
        arena: &mut InstanceArena,
        instances: &[InstanceId],
        provider: &P,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<InstanceId>, GenerationError> {
        self.known.register_all(arena, instances);
        let mut created = Vec::new();
        for &instance in instances {
            created.extend(self.make_relations_for_instance(arena, instance, provider, rng)?);
        }
        Ok(created)
    }

    pub fn make_relations_for_instance<P: ValueProvider + ?Sized>(
        &mut self,
        arena: &mut InstanceArena,
        instance: InstanceId,
        provider: &P,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<InstanceId>, GenerationError> {
        let relation_cells: Vec<(CellId, RelationSpec)> = arena
            .get(instance)
            .entity()
            .fields()
            .enumerate()
            .filter_map(|(index, (_, spec))| {
                spec.as_relation()
                    .map(|relation| (CellId::new(instance, index), relation.clone()))
            })
            .collect();

        let mut created = Vec::new();
        for (cell, declared) in relation_cells {
            if arena.cell(cell).is_defined() {
                continue;
            }
            created.extend(self.make_one_relation(arena, cell, &declared, provider, rng)?);
        }
        Ok(created)
    }

    fn make_one_relation<P: ValueProvider + ?Sized>(
        &mut self,
        arena: &mut InstanceArena,
        cell: CellId,
        declared: &RelationSpec,
        provider: &P,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<InstanceId>, GenerationError> {
        let relation = match arena.cell(cell).spec().as_relation() {
            Some(relation) => relation.clone(),
            None => {
                self.resolve_overridden_relation(arena, cell, declared, provider, rng)?;
                return Ok(Vec::new());
            }
        };
        relation
            .strategy
            .validate_for(relation.relation_type)
            .map_err(|err| label_error(arena, cell, err.into()))?;

        match relation.relation_type {
            RelationType::OneToOne | RelationType::ManyToOne => {
                self.make_to_one_relation(arena, cell, &relation, rng)
            }
            RelationType::OneToMany => self.make_to_many_relation(arena, cell, &relation, rng),
        }
    }

    fn make_to_one_relation(
        &mut self,
        arena: &mut InstanceArena,
        cell: CellId,
        relation: &RelationSpec,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<InstanceId>, GenerationError> {
        let owner = arena.cell(cell).owner();
        match relation.strategy {
            RelationStrategy::PickRandom => {
                let Some(target) = self.pick_target(arena, relation, owner, rng)? else {
                    debug!(
                        cell = %arena.cell_label(cell),
                        "no unpaired instance left, relation stays empty"
                    );
                    arena.cell_mut(cell).override_value(Value::Null)?;
                    return Ok(Vec::new());
                };
                arena.cell_mut(cell).override_value(Value::Instance(target))?;
                self.link_reciprocal(arena, relation, owner, target)?;
                Ok(Vec::new())
            }
            RelationStrategy::Create { .. } => {
                let target = self.create_target(arena, relation, owner)?;
                arena.cell_mut(cell).override_value(Value::Instance(target))?;
                self.link_reciprocal(arena, relation, owner, target)?;
                Ok(vec![target])
            }
            RelationStrategy::None => Ok(Vec::new()),
        }
    }

    fn make_to_many_relation(
        &mut self,
        arena: &mut InstanceArena,
        cell: CellId,
        relation: &RelationSpec,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<InstanceId>, GenerationError> {
        let owner = arena.cell(cell).owner();
        let RelationStrategy::Create { min, max } = relation.strategy else {
            // pick_random was rejected by validation; none is settled later.
            return Ok(Vec::new());
        };

        let count = if min == max {
            min
        } else {
            rng.random_range(min..=max)
        };
        let mut targets = Vec::with_capacity(count);
        for _ in 0..count {
            targets.push(self.create_target(arena, relation, owner)?);
        }
        arena.cell_mut(cell).override_value(Value::List(
            targets.iter().copied().map(Value::Instance).collect(),
        ))?;
        for &target in &targets {
            self.link_reciprocal(arena, relation, owner, target)?;
        }
        Ok(targets)
    }

    /// Pick a known instance of the relation target.
    ///
    /// A one-to-one relation with a reciprocal only considers instances whose
    /// reciprocal is still free, and returns `None` once every one is taken.
    fn pick_target(
        &self,
        arena: &InstanceArena,
        relation: &RelationSpec,
        owner: InstanceId,
        rng: &mut dyn RngCore,
    ) -> Result<Option<InstanceId>, GenerationError> {
        let pool = self.known.instances_of(&relation.target_entity);
        if pool.is_empty() {
            return Err(GenerationError::EmptyPool {
                entity: relation.target_entity.clone(),
            });
        }

        let candidates: Vec<InstanceId> = match (&relation.remote_name, relation.relation_type) {
            (Some(remote_name), RelationType::OneToOne) => pool
                .iter()
                .copied()
                .filter(|&candidate| {
                    candidate != owner
                        && arena
                            .cell_id(candidate, remote_name)
                            .is_some_and(|remote| !arena.cell(remote).is_defined())
                })
                .collect(),
            _ => pool.to_vec(),
        };

        if candidates.is_empty() {
            return Ok(None);
        }
        Ok(Some(candidates[rng.random_range(0..candidates.len())]))
    }

    fn create_target(
        &self,
        arena: &mut InstanceArena,
        relation: &RelationSpec,
        owner: InstanceId,
    ) -> Result<InstanceId, GenerationError> {
        let entity = self.entities.get(&relation.target_entity).ok_or_else(|| {
            GenerationError::configuration(format!(
                "relation targets unknown entity '{}'",
                relation.target_entity
            ))
        })?;
        arena.instantiate(entity, &relation.overrides, Some(owner))
    }

    /// Give a relation field replaced by an override its value now, so the
    /// reciprocal side is linked like any other relation.
    fn resolve_overridden_relation<P: ValueProvider + ?Sized>(
        &self,
        arena: &mut InstanceArena,
        cell: CellId,
        declared: &RelationSpec,
        provider: &P,
        rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        resolve_cell_references(arena, cell)?;
        evaluate_cell(arena, cell, provider, rng)?;

        let owner = arena.cell(cell).owner();
        let targets: Vec<InstanceId> = match arena.value(cell)? {
            Value::Null => {
                return Err(GenerationError::configuration(format!(
                    "'{}' must point to an instance of '{}', got null",
                    arena.cell_label(cell),
                    declared.target_entity
                )));
            }
            Value::Instance(target) if declared.relation_type != RelationType::OneToMany => {
                vec![*target]
            }
            Value::List(items) if declared.relation_type == RelationType::OneToMany => items
                .iter()
                .map(|item| {
                    item.as_instance().ok_or_else(|| {
                        GenerationError::configuration(format!(
                            "'{}' must list instances of '{}'",
                            arena.cell_label(cell),
                            declared.target_entity
                        ))
                    })
                })
                .collect::<Result<_, _>>()?,
            other => {
                return Err(GenerationError::configuration(format!(
                    "'{}' is a {} relation and cannot hold '{other}'",
                    arena.cell_label(cell),
                    declared.relation_type
                )));
            }
        };

        for target in targets {
            let entity = arena.get(target).entity_name();
            if entity != declared.target_entity {
                return Err(GenerationError::configuration(format!(
                    "'{}' must point to '{}', got {}",
                    arena.cell_label(cell),
                    declared.target_entity,
                    arena.get(target).label()
                )));
            }
            self.link_reciprocal(arena, declared, owner, target)?;
        }
        Ok(())
    }

    /// Record `owner` on the reciprocal field of `target`.
    fn link_reciprocal(
        &self,
        arena: &mut InstanceArena,
        relation: &RelationSpec,
        owner: InstanceId,
        target: InstanceId,
    ) -> Result<(), GenerationError> {
        let Some(remote_name) = &relation.remote_name else {
            return Ok(());
        };
        let remote = arena.cell_id(target, remote_name).ok_or_else(|| {
            GenerationError::configuration(format!(
                "{} has no reciprocal field '{remote_name}'",
                arena.get(target).label()
            ))
        })?;

        match relation.relation_type {
            RelationType::ManyToOne => arena.cell_mut(remote).push_related(owner),
            RelationType::OneToOne | RelationType::OneToMany => {
                match arena.cell(remote).defined_value() {
                    None => arena.cell_mut(remote).override_value(Value::Instance(owner)),
                    Some(Value::Instance(existing)) if *existing == owner => Ok(()),
                    Some(_) => Err(GenerationError::configuration(format!(
                        "'{}' is already linked to another instance",
                        arena.cell_label(remote)
                    ))),
                }
            }
        }
    }

    /// Give relation fields that nothing linked their empty value.
    ///
    /// Runs once no pass creates instances anymore; only `none` relations can
    /// still be undefined by then.
    pub fn settle_defaults(&self, arena: &mut InstanceArena) -> Result<usize, GenerationError> {
        let pending: Vec<(CellId, Value)> = arena
            .cell_ids()
            .filter_map(|id| {
                let cell = arena.cell(id);
                match (cell.is_defined(), cell.spec().as_relation()) {
                    (false, Some(relation)) => Some((id, relation.relation_type.default_value())),
                    _ => None,
                }
            })
            .collect();

        let settled = pending.len();
        for (id, value) in pending {
            arena.cell_mut(id).override_value(value)?;
        }
        Ok(settled)
    }
}

fn label_error(arena: &InstanceArena, cell: CellId, err: GenerationError) -> GenerationError {
    match err {
        GenerationError::Configuration(message) => {
            GenerationError::Configuration(format!("{}: {message}", arena.cell_label(cell)))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use fixtura_core::{Schema, ValueSpec};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::provider::FakeProvider;

    fn entities(schema: Schema) -> BTreeMap<String, Arc<Entity>> {
        schema
            .into_entities()
            .into_iter()
            .map(|(name, entity)| (name, Arc::new(entity)))
            .collect()
    }

    fn run_passes(
        entities: &BTreeMap<String, Arc<Entity>>,
        seeds: &[(&str, usize)],
    ) -> Result<InstanceArena, GenerationError> {
        let mut arena = InstanceArena::new();
        let mut frontier = Vec::new();
        for (name, count) in seeds {
            for _ in 0..*count {
                frontier.push(arena.instantiate(&entities[*name], &BTreeMap::new(), None)?);
            }
        }
        let provider = FakeProvider::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut maker = RelationMaker::new(entities);
        while !frontier.is_empty() {
            frontier = maker.make_relations(&mut arena, &frontier, &provider, &mut rng)?;
        }
        maker.settle_defaults(&mut arena)?;
        Ok(arena)
    }

    fn company_schema(strategy: RelationStrategy) -> Schema {
        let company = Entity::new("company")
            .with_field("id", ValueSpec::constant(None, Value::Int(1)))
            .unwrap();
        let employee = Entity::new("employee")
            .with_relation(
                "employer",
                RelationSpec::new(RelationType::ManyToOne, "company", "id", strategy)
                    .unwrap()
                    .with_remote_name("employees"),
            )
            .unwrap();
        let mut schema = Schema::new()
            .with_entity(company)
            .unwrap()
            .with_entity(employee)
            .unwrap();
        schema.complete_relations().unwrap();
        schema
    }

    #[test]
    fn pick_random_links_both_sides() {
        let entities = entities(company_schema(RelationStrategy::PickRandom));
        let arena = run_passes(&entities, &[("company", 2), ("employee", 5)]).unwrap();

        let mut listed = 0;
        for company in arena.instances_of("company") {
            let employees = company.cell("employees").unwrap().value().unwrap();
            for employee in employees.as_list().unwrap() {
                let employee = employee.as_instance().unwrap();
                let employer = arena.get(employee).cell("employer").unwrap();
                assert_eq!(employer.value().unwrap(), &Value::Instance(company.id()));
                listed += 1;
            }
        }
        assert_eq!(listed, 5);
    }

    #[test]
    fn create_adds_instances_and_settles() {
        let entities = entities(company_schema(RelationStrategy::CREATE_ONE));
        let arena = run_passes(&entities, &[("employee", 3)]).unwrap();
        assert_eq!(arena.count_of("company"), 3);
        for company in arena.instances_of("company") {
            let employees = company.cell("employees").unwrap().value().unwrap();
            assert_eq!(employees.as_list().unwrap().len(), 1);
        }
    }

    #[test]
    fn overridden_relation_must_not_be_null() {
        let company = Entity::new("company")
            .with_field("id", ValueSpec::constant(None, Value::Int(1)))
            .unwrap()
            .with_relation(
                "ceo",
                RelationSpec::new(
                    RelationType::OneToOne,
                    "employee",
                    "id",
                    RelationStrategy::CREATE_ONE,
                )
                .unwrap()
                .with_override("employer", ValueSpec::constant(None, Value::Null)),
            )
            .unwrap();
        let employee = Entity::new("employee")
            .with_field("id", ValueSpec::constant(None, Value::Int(2)))
            .unwrap()
            .with_relation(
                "employer",
                RelationSpec::new(
                    RelationType::ManyToOne,
                    "company",
                    "id",
                    RelationStrategy::PickRandom,
                )
                .unwrap()
                .with_remote_name("employees"),
            )
            .unwrap();
        let mut schema = Schema::new()
            .with_entity(company)
            .unwrap()
            .with_entity(employee)
            .unwrap();
        schema.complete_relations().unwrap();

        let err = run_passes(&entities(schema), &[("company", 1)]).unwrap_err();
        match err {
            GenerationError::Configuration(message) => {
                assert!(message.contains("got null"), "{message}")
            }
            other => panic!("expected a configuration error, got {other}"),
        }
    }

    #[test]
    fn pick_random_without_targets_fails() {
        let entities = entities(company_schema(RelationStrategy::PickRandom));
        let err = run_passes(&entities, &[("employee", 1)]).unwrap_err();
        assert!(matches!(err, GenerationError::EmptyPool { entity } if entity == "company"));
    }

    #[test]
    fn none_relations_get_empty_defaults() {
        let entities = entities(company_schema(RelationStrategy::None));
        let arena = run_passes(&entities, &[("employee", 1)]).unwrap();
        let employee = arena.instances_of("employee").next().unwrap();
        assert_eq!(
            employee.cell("employer").unwrap().value().unwrap(),
            &Value::Null
        );
    }

    #[test]
    fn one_to_many_creates_within_bounds_and_sets_back_links() {
        let office = Entity::new("office")
            .with_field("id", ValueSpec::constant(None, Value::Int(1)))
            .unwrap();
        let company = Entity::new("company")
            .with_relation(
                "offices",
                RelationSpec::new(
                    RelationType::OneToMany,
                    "office",
                    "id",
                    RelationStrategy::Create { min: 2, max: 4 },
                )
                .unwrap()
                .with_remote_name("company"),
            )
            .unwrap();
        let mut schema = Schema::new()
            .with_entity(office)
            .unwrap()
            .with_entity(company)
            .unwrap();
        schema.complete_relations().unwrap();
        let entities = entities(schema);
        let arena = run_passes(&entities, &[("company", 3)]).unwrap();

        for company in arena.instances_of("company") {
            let offices = company.cell("offices").unwrap().value().unwrap();
            let offices = offices.as_list().unwrap();
            assert!((2..=4).contains(&offices.len()));
            for office in offices {
                let office = arena.get(office.as_instance().unwrap());
                assert_eq!(
                    office.cell("company").unwrap().value().unwrap(),
                    &Value::Instance(company.id())
                );
            }
        }
    }

    #[test]
    fn one_to_one_pairs_are_exclusive() {
        let person = Entity::new("person")
            .with_field("id", ValueSpec::constant(None, Value::Int(1)))
            .unwrap()
            .with_relation(
                "partner",
                RelationSpec::new(
                    RelationType::OneToOne,
                    "person",
                    "id",
                    RelationStrategy::PickRandom,
                )
                .unwrap()
                .with_remote_name("partner"),
            )
            .unwrap();
        let mut schema = Schema::new().with_entity(person).unwrap();
        schema.complete_relations().unwrap();
        let entities = entities(schema);
        let arena = run_passes(&entities, &[("person", 5)]).unwrap();

        let mut unpaired = 0;
        for person in arena.instances_of("person") {
            match person.cell("partner").unwrap().value().unwrap() {
                Value::Instance(partner) => {
                    assert_ne!(*partner, person.id());
                    let back = arena.get(*partner).cell("partner").unwrap();
                    assert_eq!(back.value().unwrap(), &Value::Instance(person.id()));
                }
                Value::Null => unpaired += 1,
                other => panic!("unexpected partner value {other:?}"),
            }
        }
        assert_eq!(unpaired, 1);
    }
}
