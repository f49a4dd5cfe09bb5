mod logging;
mod settings;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use fixtura_core::{Error as CoreError, SchemaDocument, parse_json_schema, parse_yaml_schema};
use fixtura_generate::export::export_records;
use fixtura_generate::output::{write_records_csv, write_records_json};
use fixtura_generate::{FakeProvider, GenerationEngine, GenerationError, LocaleKey, RelatedMode};
use settings::{FixturaSettings, OutputFormat, SettingsError};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("schema error: {0}")]
    Core(#[from] CoreError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "fixtura", version, about = "Generate related test data from entity schemas")]
struct Cli {
    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Append JSON log events to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate instances for every entity of a schema.
    Generate(GenerateArgs),
    /// Print the JSON Schema of the schema document format.
    SchemaJson,
    /// List the generator names accepted in `faker` declarations.
    Generators,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Schema document (`.yaml`, `.yml` or `.json`).
    #[arg(long)]
    schema: PathBuf,
    /// Seed instances per entity.
    #[arg(long)]
    count: Option<usize>,
    /// Seed instances for one entity, as `name=N`. Repeatable.
    #[arg(long = "entity-count", value_name = "NAME=N", value_parser = parse_entity_count)]
    entity_counts: Vec<(String, usize)>,
    #[arg(long)]
    seed: Option<u64>,
    /// How related instances appear in the output: inline, reference or omit.
    #[arg(long)]
    related: Option<RelatedMode>,
    /// Locale of provider text: en_US or pt_BR.
    #[arg(long)]
    locale: Option<LocaleKey>,
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    /// Output file for json (stdout when absent) or directory for csv.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Settings file; defaults to ./fixtura.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the generation report as JSON to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "command failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Generate(args) => {
            let settings = FixturaSettings::discover(args.config.as_deref())?;
            let level = cli
                .log_level
                .or_else(|| settings.log_level.clone())
                .unwrap_or_else(|| "info".to_string());
            logging::init_logging(&level, cli.log_file.as_deref())?;
            run_generate(args, &settings)
        }
        Command::SchemaJson => {
            let schema = schemars::schema_for!(SchemaDocument);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Command::Generators => {
            for generator in FakeProvider::generators() {
                println!("{generator}");
            }
            Ok(())
        }
    }
}

fn run_generate(args: GenerateArgs, settings: &FixturaSettings) -> Result<(), CliError> {
    let timer = Instant::now();
    let mut options = settings.generate_options();
    if let Some(count) = args.count {
        options.default_count = count;
    }
    options.counts.extend(args.entity_counts);
    if let Some(seed) = args.seed {
        options.seed = seed;
    }
    if let Some(related) = args.related {
        options.related = related;
    }
    if let Some(locale) = args.locale {
        options.locale = locale;
    }
    let format = args.format.or(settings.format).unwrap_or_default();

    let schema = load_schema(&args.schema)?;
    tracing::info!(
        schema = %args.schema.display(),
        entities = schema.len(),
        format = ?format,
        "schema loaded"
    );

    let engine = GenerationEngine::new(options);
    let graph = engine.generate_graph(&schema)?;
    let related = match (format, engine.options().related) {
        (OutputFormat::Csv, RelatedMode::Inline) => RelatedMode::Reference,
        (_, related) => related,
    };
    let records = export_records(&graph.arena, graph.entity_names(), related)?;

    match format {
        OutputFormat::Json => match &args.out {
            Some(path) => {
                let bytes = write_records_json(path, &records)?;
                tracing::info!(path = %path.display(), bytes, "records written");
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                serde_json::to_writer_pretty(&mut stdout, &records)?;
                writeln!(stdout)?;
            }
        },
        OutputFormat::Csv => {
            let dir = args.out.clone().ok_or_else(|| {
                CliError::InvalidConfig("csv output needs --out <directory>".to_string())
            })?;
            let bytes = write_records_csv(&dir, &graph.entities, &records, related)?;
            tracing::info!(dir = %dir.display(), bytes, "csv files written");
        }
    }

    if let Some(path) = &args.report {
        std::fs::write(path, serde_json::to_vec_pretty(&graph.report)?)?;
        tracing::info!(path = %path.display(), "report written");
    }

    tracing::info!(
        run_id = %graph.report.run_id,
        instances = graph.report.instances_total,
        duration_ms = timer.elapsed().as_millis() as u64,
        "run finished"
    );
    Ok(())
}

fn load_schema(path: &Path) -> Result<fixtura_core::Schema, CliError> {
    let source = std::fs::read_to_string(path)?;
    let schema = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => parse_json_schema(&source)?,
        _ => parse_yaml_schema(&source)?,
    };
    Ok(schema)
}

fn parse_entity_count(value: &str) -> Result<(String, usize), String> {
    let (name, count) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=N, got '{value}'"))?;
    let count = count
        .trim()
        .parse()
        .map_err(|err| format!("invalid count for '{name}': {err}"))?;
    Ok((name.trim().to_string(), count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_counts_parse() {
        assert_eq!(
            parse_entity_count("company=4").unwrap(),
            ("company".to_string(), 4)
        );
        assert!(parse_entity_count("company").is_err());
        assert!(parse_entity_count("company=many").is_err());
    }

    #[test]
    fn cli_accepts_generate_flags() {
        let cli = Cli::try_parse_from([
            "fixtura",
            "generate",
            "--schema",
            "schema.yaml",
            "--entity-count",
            "company=2",
            "--related",
            "omit",
            "--locale",
            "pt_BR",
            "--format",
            "csv",
        ])
        .unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.entity_counts, vec![("company".to_string(), 2)]);
        assert_eq!(args.related, Some(RelatedMode::Omit));
        assert_eq!(args.locale, Some(LocaleKey::PtBr));
        assert_eq!(args.format, Some(OutputFormat::Csv));
    }
}
