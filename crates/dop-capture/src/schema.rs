//! Validation of custom event data against an event type's
//! `additionalDataSchema` (JSON Schema, draft 6).
//!
//! `id` is dropped from the schema's top-level `required` list before
//! validating: it belongs to the entity, not to the payload. Nested
//! `required` lists are left as declared.

use jsonschema::Draft;
use serde_json::Value;

/// Validate `instance` against `schema`.
///
/// Returns every violation found, each prefixed with the JSON pointer of the
/// offending value (`/` for the root). A schema that does not compile is
/// reported as a single violation.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), Vec<String>> {
    let schema = without_required_id(schema);
    let validator = jsonschema::options()
        .with_draft(Draft::Draft6)
        .build(&schema)
        .map_err(|e| vec![format!("invalid schema: {e}")])?;

    let errors: Vec<String> = validator
        .iter_errors(instance)
        .map(|error| {
            let path = error.instance_path.to_string();
            format!("{}: {}", pointer(&path), error)
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn without_required_id(schema: &Value) -> Value {
    let mut schema = schema.clone();
    if let Some(Value::Array(required)) = schema.get_mut("required") {
        required.retain(|name| name.as_str() != Some("id"));
    }
    schema
}

fn pointer(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
