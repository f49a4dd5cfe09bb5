use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use fixtura_core::{Entity, InstanceId, Schema, build_relation_graph_report};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::errors::GenerationError;
use crate::evaluate::execute_plan;
use crate::export::export_records;
use crate::instance::{CellState, InstanceArena};
use crate::model::{EntityReport, GenerateOptions, GenerationReport};
use crate::planner::plan_evaluation;
use crate::provider::{FakeProvider, ValueProvider};
use crate::relations::RelationMaker;
use crate::resolver::resolve_all;

/// Fully generated object graph of a run.
#[derive(Debug, Clone)]
pub struct GeneratedGraph {
    pub arena: InstanceArena,
    pub entities: BTreeMap<String, Arc<Entity>>,
    pub report: GenerationReport,
}

impl GeneratedGraph {
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Exported records per entity name.
    pub records: BTreeMap<String, Vec<JsonValue>>,
    pub report: GenerationReport,
}

/// Entry point for generating instances from a schema.
#[derive(Debug, Clone)]
pub struct GenerationEngine<P = FakeProvider> {
    options: GenerateOptions,
    provider: P,
}

impl GenerationEngine<FakeProvider> {
    pub fn new(options: GenerateOptions) -> Self {
        let provider = FakeProvider::new(options.locale);
        Self { options, provider }
    }
}

impl<P: ValueProvider> GenerationEngine<P> {
    pub fn with_provider(options: GenerateOptions, provider: P) -> Self {
        Self { options, provider }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Generate and export records for every entity of `schema`.
    pub fn run(&self, schema: &Schema) -> Result<GenerationResult, GenerationError> {
        let start = Instant::now();
        let graph = self.generate_graph(schema)?;
        let records = export_records(
            &graph.arena,
            graph.entity_names(),
            self.options.related,
        )?;
        info!(
            run_id = %graph.report.run_id,
            related = %self.options.related,
            duration_ms = start.elapsed().as_millis() as u64,
            "records exported"
        );
        Ok(GenerationResult {
            records,
            report: graph.report,
        })
    }

    /// Build the instance graph: seed instances, materialize relations,
    /// resolve references, then evaluate every cell.
    pub fn generate_graph(&self, schema: &Schema) -> Result<GeneratedGraph, GenerationError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut report = GenerationReport::new(run_id.clone(), self.options.seed);

        info!(
            run_id = %run_id,
            entities = schema.len(),
            seed = self.options.seed,
            "generation started"
        );

        match self.build(schema, &mut report) {
            Ok((arena, entities)) => {
                info!(
                    run_id = %run_id,
                    instances = report.instances_total,
                    cells = report.cells_total,
                    relation_passes = report.relation_passes,
                    "generation completed"
                );
                Ok(GeneratedGraph {
                    arena,
                    entities,
                    report,
                })
            }
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "generation failed");
                Err(err)
            }
        }
    }

    fn build(
        &self,
        schema: &Schema,
        report: &mut GenerationReport,
    ) -> Result<(InstanceArena, BTreeMap<String, Arc<Entity>>), GenerationError> {
        let mut schema = schema.clone();
        schema.complete_relations()?;
        self.check_counts(&schema)?;

        let relation_graph = build_relation_graph_report(&schema);
        if let Some(cycle) = &relation_graph.cycle {
            warn!(
                entities = %cycle.join(", "),
                "create relations form a cycle; generation may not settle"
            );
        }

        let entities: BTreeMap<String, Arc<Entity>> = schema
            .into_entities()
            .into_iter()
            .map(|(name, entity)| (name, Arc::new(entity)))
            .collect();

        let mut rng = ChaCha8Rng::seed_from_u64(self.options.seed);
        let mut arena = InstanceArena::new();

        let mut frontier: Vec<InstanceId> = Vec::new();
        for (name, entity) in &entities {
            let count = self.options.count_for(name);
            for _ in 0..count {
                frontier.push(arena.instantiate(entity, &BTreeMap::new(), None)?);
            }
            debug!(entity = %name, count, "seed instances created");
        }
        let seeded = arena.len();

        let mut maker = RelationMaker::new(&entities);
        while !frontier.is_empty() {
            report.relation_passes += 1;
            if report.relation_passes > self.options.max_relation_passes {
                return Err(GenerationError::configuration(format!(
                    "relations still create instances after {} passes; \
                     check for create cycles between entities",
                    self.options.max_relation_passes
                )));
            }
            frontier = maker.make_relations(&mut arena, &frontier, &self.provider, &mut rng)?;
            debug!(
                pass = report.relation_passes,
                created = frontier.len(),
                "relation pass finished"
            );
        }
        let settled = maker.settle_defaults(&mut arena)?;
        debug!(settled, "relation defaults settled");

        resolve_all(&mut arena)?;
        let plan = plan_evaluation(&arena)?;
        execute_plan(&mut arena, &plan, &self.provider, &mut rng, report)?;

        fill_report(report, &arena, &entities, seeded);
        Ok((arena, entities))
    }

    fn check_counts(&self, schema: &Schema) -> Result<(), GenerationError> {
        match self
            .options
            .counts
            .keys()
            .find(|name| schema.entity(name).is_none())
        {
            Some(unknown) => Err(GenerationError::configuration(format!(
                "count given for unknown entity '{unknown}'"
            ))),
            None => Ok(()),
        }
    }
}

fn fill_report(
    report: &mut GenerationReport,
    arena: &InstanceArena,
    entities: &BTreeMap<String, Arc<Entity>>,
    seeded: usize,
) {
    let mut seeded_by_entity: BTreeMap<&str, usize> = BTreeMap::new();
    for instance in arena.iter().take(seeded) {
        *seeded_by_entity.entry(instance.entity_name()).or_insert(0) += 1;
    }

    report.entities = entities
        .keys()
        .map(|name| {
            let seeded = seeded_by_entity.get(name.as_str()).copied().unwrap_or(0);
            EntityReport {
                entity: name.clone(),
                seeded,
                created: arena.count_of(name) - seeded,
            }
        })
        .collect();
    report.instances_total = arena.len();
    report.cells_total = arena.cell_ids().count();
    report.cells_overridden = arena
        .cell_ids()
        .filter(|id| matches!(arena.cell(*id).state(), CellState::Overridden(_)))
        .count();
}
