use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::provider::LocaleKey;

/// How relation fields appear in exported records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedMode {
    /// Related instances are nested as objects.
    #[default]
    Inline,
    /// Related instances are written as `entity#ordinal` labels.
    Reference,
    /// Relation fields are left out.
    Omit,
}

impl RelatedMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Reference => "reference",
            Self::Omit => "omit",
        }
    }
}

impl FromStr for RelatedMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inline" => Ok(Self::Inline),
            "reference" => Ok(Self::Reference),
            "omit" => Ok(Self::Omit),
            other => Err(format!(
                "unknown related mode '{other}' (expected inline, reference or omit)"
            )),
        }
    }
}

impl fmt::Display for RelatedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Seed instances per entity when `counts` has no entry for it.
    pub default_count: usize,
    /// Seed instances per entity name.
    pub counts: BTreeMap<String, usize>,
    /// Seed of the run's random number generator.
    pub seed: u64,
    pub related: RelatedMode,
    pub locale: LocaleKey,
    /// Upper bound on relation materialization passes.
    pub max_relation_passes: usize,
}

impl GenerateOptions {
    pub fn count_for(&self, entity: &str) -> usize {
        self.counts
            .get(entity)
            .copied()
            .unwrap_or(self.default_count)
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            default_count: 3,
            counts: BTreeMap::new(),
            seed: 0,
            related: RelatedMode::Inline,
            locale: LocaleKey::EnUs,
            max_relation_passes: 100,
        }
    }
}

/// Instance counts for one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity: String,
    /// Instances created up front.
    pub seeded: usize,
    /// Instances created by relations.
    pub created: usize,
}

impl EntityReport {
    pub fn total(&self) -> usize {
        self.seeded + self.created
    }
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub seed: u64,
    pub entities: Vec<EntityReport>,
    pub relation_passes: usize,
    pub instances_total: usize,
    pub cells_total: usize,
    pub cells_overridden: usize,
    pub cells_evaluated: usize,
    pub provider_calls: usize,
    pub generator_usage: BTreeMap<String, u64>,
}

impl GenerationReport {
    pub fn new(run_id: String, seed: u64) -> Self {
        Self {
            run_id,
            seed,
            entities: Vec::new(),
            relation_passes: 0,
            instances_total: 0,
            cells_total: 0,
            cells_overridden: 0,
            cells_evaluated: 0,
            provider_calls: 0,
            generator_usage: BTreeMap::new(),
        }
    }

    pub fn entity(&self, name: &str) -> Option<&EntityReport> {
        self.entities.iter().find(|report| report.entity == name)
    }

    pub fn record_generator_usage(&mut self, generator: &str) {
        *self.generator_usage.entry(generator.to_string()).or_insert(0) += 1;
        self.provider_calls += 1;
    }
}
