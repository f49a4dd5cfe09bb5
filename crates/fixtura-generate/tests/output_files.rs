use std::fs;
use std::path::PathBuf;

use fixtura_core::parse_yaml_schema;
use fixtura_generate::output::{write_records_csv, write_records_json};
use fixtura_generate::{GenerateOptions, GenerationEngine, RelatedMode};

const SCHEMA: &str = r#"
entities:
  team:
    fields:
      name: {type: string, value: core}
      members:
        type: relation
        relation_type: one_to_many
        to: player.id
        remote_name: team
        relation_strategy: create(2,2)
  player:
    fields:
      id: {type: integer, faker: {pyint: {min_value: 1, max_value: 99}}}
      nickname: {type: string, faker: user_name}
"#;

fn temp_out_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("fixtura_generate_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp out dir");
    dir
}

fn options(related: RelatedMode) -> GenerateOptions {
    let mut options = GenerateOptions::default();
    options.counts.insert("team".to_string(), 1);
    options.counts.insert("player".to_string(), 0);
    options.related = related;
    options
}

#[test]
fn csv_files_follow_field_order() {
    let schema = parse_yaml_schema(SCHEMA).expect("parse schema");
    let engine = GenerationEngine::new(options(RelatedMode::Reference));
    let graph = engine.generate_graph(&schema).expect("generate graph");
    let records = fixtura_generate::export::export_records(
        &graph.arena,
        graph.entity_names(),
        RelatedMode::Reference,
    )
    .expect("export records");

    let dir = temp_out_dir("csv");
    let bytes = write_records_csv(&dir, &graph.entities, &records, RelatedMode::Reference)
        .expect("write csv");
    assert!(bytes > 0);

    let players = fs::read_to_string(dir.join("player.csv")).expect("read player.csv");
    let mut lines = players.lines();
    assert_eq!(lines.next(), Some("id,nickname,team"));
    assert_eq!(lines.count(), 2);

    let teams = fs::read_to_string(dir.join("team.csv")).expect("read team.csv");
    assert!(teams.contains("core,player#0;player#1"));
}

#[test]
fn csv_headers_do_not_depend_on_instances() {
    let schema = parse_yaml_schema(SCHEMA).expect("parse schema");
    let mut options = options(RelatedMode::Omit);
    options.counts.insert("team".to_string(), 0);
    let graph = GenerationEngine::new(options)
        .generate_graph(&schema)
        .expect("generate graph");
    let records = fixtura_generate::export::export_records(
        &graph.arena,
        graph.entity_names(),
        RelatedMode::Omit,
    )
    .expect("export records");

    let dir = temp_out_dir("csv_empty");
    write_records_csv(&dir, &graph.entities, &records, RelatedMode::Omit).expect("write csv");

    let players = fs::read_to_string(dir.join("player.csv")).expect("read player.csv");
    assert_eq!(players.lines().collect::<Vec<_>>(), vec!["id,nickname"]);
    let teams = fs::read_to_string(dir.join("team.csv")).expect("read team.csv");
    assert_eq!(teams.lines().collect::<Vec<_>>(), vec!["name"]);
}

#[test]
fn json_output_groups_records_by_entity() {
    let schema = parse_yaml_schema(SCHEMA).expect("parse schema");
    let result = GenerationEngine::new(options(RelatedMode::Omit))
        .run(&schema)
        .expect("run generation");

    let path = temp_out_dir("json").join("records.json");
    write_records_json(&path, &result.records).expect("write json");

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read json")).expect("parse json");
    assert_eq!(written["player"].as_array().map(Vec::len), Some(2));
    assert!(written["team"][0].get("members").is_none());
}
