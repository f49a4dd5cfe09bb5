use std::env;
use std::path::PathBuf;

use fixtura_core::parse_yaml_schema;
use fixtura_generate::{GenerateOptions, GenerationEngine};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let mut schema_path: Option<PathBuf> = None;
    let mut options = GenerateOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seed" => options.seed = args.next().ok_or("missing seed")?.parse()?,
            "--count" => options.default_count = args.next().ok_or("missing count")?.parse()?,
            _ => {
                if schema_path.is_none() {
                    schema_path = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let schema_path = schema_path.ok_or("missing schema path")?;
    let schema = parse_yaml_schema(&std::fs::read_to_string(&schema_path)?)?;

    let result = GenerationEngine::new(options).run(&schema)?;
    println!("{}", serde_json::to_string_pretty(&result.records)?);
    Ok(())
}
