use std::fs;
use std::path::Path;

use fixtura_core::{
    Error, RelationStrategy, RelationType, Schema, Value, ValueSpec, ValueSpecKind,
    parse_json_schema, parse_yaml_schema,
};

fn load_company_schema() -> Schema {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schemas/examples/company.yaml");
    let source = fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("missing schema at {}", path.display()));
    parse_yaml_schema(&source).expect("parse company schema")
}

#[test]
fn example_schema_translates() {
    let schema = load_company_schema();
    assert_eq!(
        schema.entity_names().collect::<Vec<_>>(),
        vec!["company", "employee", "office"]
    );

    let employee = schema.entity("employee").expect("employee entity");
    let names: Vec<&str> = employee.field_names().collect();
    assert_eq!(
        names,
        vec![
            "id",
            "first_name",
            "last_name",
            "full_name",
            "role",
            "employer",
            "company_id",
            "signature"
        ]
    );

    let company_id = employee.field("company_id").expect("derived local field");
    assert_eq!(company_id.kind(), ValueSpecKind::Dynamic);
    let refs: Vec<&str> = company_id.references().iter().map(|r| r.path()).collect();
    assert_eq!(refs, vec!["employer.id"]);

    let role = employee.field("role").expect("role");
    assert_eq!(
        role,
        &ValueSpec::constant(Some("string"), Value::Text("engineer".to_string()))
    );
}

#[test]
fn reciprocal_fields_are_added() {
    let schema = load_company_schema();

    let company = schema.entity("company").expect("company entity");
    let employees = company
        .field("employees")
        .and_then(ValueSpec::as_relation)
        .expect("reciprocal employees field");
    assert_eq!(employees.relation_type, RelationType::OneToMany);
    assert_eq!(employees.strategy, RelationStrategy::None);

    let office = schema.entity("office").expect("office entity");
    let company_link = office
        .field("company")
        .and_then(ValueSpec::as_relation)
        .expect("reciprocal company field");
    assert_eq!(company_link.relation_type, RelationType::ManyToOne);
    assert!(company_link.local_field.is_none());
}

#[test]
fn overrides_are_translated() {
    let schema = load_company_schema();
    let ceo = schema
        .entity("company")
        .and_then(|company| company.field("ceo"))
        .and_then(ValueSpec::as_relation)
        .expect("ceo relation");
    assert_eq!(ceo.local_field.as_deref(), Some("ceo_id"));
    let employer = ceo.overrides.get("employer").expect("employer override");
    let refs: Vec<&str> = employer.references().iter().map(|r| r.path()).collect();
    assert_eq!(refs, vec!["SELF"]);
}

#[test]
fn type_only_fields_get_providers() {
    let schema = parse_json_schema(
        r#"{"entities": {"thing": {"fields": {
            "count": {"type": "integer"},
            "label": {"type": "string"},
            "day": {"type": "date"},
            "blob": {"type": "binary"}
        }}}}"#,
    )
    .expect("parse schema");
    let thing = schema.entity("thing").expect("thing");
    assert_eq!(thing.field("count").map(ValueSpec::kind), Some(ValueSpecKind::Provider));
    assert_eq!(thing.field("label").map(ValueSpec::kind), Some(ValueSpecKind::Provider));
    assert_eq!(thing.field("day").map(ValueSpec::kind), Some(ValueSpecKind::Provider));
    assert_eq!(
        thing.field("blob"),
        Some(&ValueSpec::constant(Some("binary"), Value::Null))
    );
}

#[test]
fn inverted_create_bounds_are_rejected() {
    let err = parse_yaml_schema(
        r#"
entities:
  parent:
    fields:
      id: {type: integer}
      children:
        type: relation
        relation_type: one_to_many
        to: child.id
        relation_strategy: create(3,1)
  child:
    fields:
      id: {type: integer}
"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}

#[test]
fn pick_random_on_one_to_many_is_rejected() {
    let err = parse_yaml_schema(
        r#"
entities:
  parent:
    fields:
      children:
        type: relation
        relation_type: 1tm
        to: child.id
        relation_strategy: pick_random
  child:
    fields:
      id: {type: integer}
"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}

#[test]
fn malformed_references_are_rejected() {
    let err = parse_yaml_schema(
        r#"
entities:
  user:
    fields:
      price: {type: string, value: "costs $5"}
"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidReference(_)), "{err}");
}

#[test]
fn multiple_faker_functions_are_rejected() {
    let err = parse_json_schema(
        r#"{"entities": {"u": {"fields": {
            "a": {"type": "integer", "faker": {"pyint": {}, "pystr": {}}}
        }}}}"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}
