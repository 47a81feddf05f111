use schemars::schema_for;

use crate::QuillConfig;

/// JSON schema for `quill.toml`, for editor tooling and CI validation.
#[must_use]
pub fn json_schema() -> serde_json::Value {
    let schema = schema_for!(QuillConfig);
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
}
