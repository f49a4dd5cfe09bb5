pub mod csv;
pub mod json;

pub use self::csv::{write_entity_csv, write_records_csv};
pub use self::json::write_records_json;
