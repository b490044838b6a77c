//! Structured response contract between the pipeline and the model.
//!
//! Every generation stage declares a [`ResponseSchema`]: an ordered list of
//! named fields, each with a [`FieldKind`]. The schema does three jobs:
//!
//! - renders the format instructions appended to the stage prompt
//!   ([`ResponseSchema::format_instructions`]);
//! - parses and **normalizes** a raw response into a JSON object whose
//!   declared fields are guaranteed to have their declared shape
//!   ([`ResponseSchema::parse`]);
//! - reports shape drift in the raw response as diagnostics via the
//!   `jsonschema` crate ([`ResponseSchema::diagnose`]), which is logged and
//!   never fails a parse.
//!
//! Normalization is what lets the rest of the crate use plain typed records.
//! Models frequently answer a list field with a bare string, a text field
//! with a list, or omit fields altogether; the rules are:
//!
//! | Kind | string | array | null / absent |
//! |------|--------|-------|---------------|
//! | [`FieldKind::List`] | `[s]`, or `[]` when blank | elements as text | `[]` |
//! | [`FieldKind::Text`] | `s` | joined with `", "` | placeholder |
//! | [`FieldKind::TextOrList`] | kept as text | elements as text | placeholder or `[]` |
//!
//! Generation never fails outright: [`parse_response`] logs the failure and
//! returns `None`, and each stage substitutes its deterministic fallback.

mod extract;

pub use extract::{extract_json_value, value_kind};

use crate::error::ParseError;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

// ── Field declarations ─────────────────────────────────────────────

/// Expected shape of a response field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A single piece of text.
    Text,
    /// A list of text items.
    List,
    /// Either a single text or a list of texts, preserved as given.
    TextOrList,
    /// A non-negative integer.
    Integer,
    /// An array of nested objects, normalized by a nested schema.
    Records,
}

impl FieldKind {
    fn instruction_type(self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::List => "list of strings",
            FieldKind::TextOrList => "string or list of strings",
            FieldKind::Integer => "integer",
            FieldKind::Records => "list of objects",
        }
    }

    fn json_schema(self) -> Value {
        match self {
            FieldKind::Text => json!({"type": "string"}),
            FieldKind::List => json!({"type": "array", "items": {"type": "string"}}),
            FieldKind::TextOrList => json!({
                "anyOf": [
                    {"type": "string"},
                    {"type": "array", "items": {"type": "string"}}
                ]
            }),
            FieldKind::Integer => json!({"type": "integer", "minimum": 0}),
            FieldKind::Records => json!({"type": "array", "items": {"type": "object"}}),
        }
    }
}

/// One named field of a [`ResponseSchema`].
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: FieldKind,
    /// Value used for an absent text field.
    pub placeholder: Option<&'static str>,
    /// A response without this field is rejected instead of defaulted.
    pub required: bool,
    /// Schema applied to each element of a [`FieldKind::Records`] field.
    pub nested: Option<Box<ResponseSchema>>,
}

impl FieldSpec {
    fn new(name: &'static str, description: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            description,
            kind,
            placeholder: None,
            required: false,
            nested: None,
        }
    }

    pub fn text(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldKind::Text)
    }

    pub fn list(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldKind::List)
    }

    pub fn text_or_list(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldKind::TextOrList)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldKind::Integer)
    }

    /// An array of objects, each normalized by `nested`.
    pub fn records(
        name: &'static str,
        description: &'static str,
        nested: ResponseSchema,
    ) -> Self {
        let mut spec = Self::new(name, description, FieldKind::Records);
        spec.nested = Some(Box::new(nested));
        spec
    }

    /// Set the placeholder used when the field is missing.
    pub fn or(mut self, placeholder: &'static str) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    /// Reject responses that omit this field.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

// ── ResponseSchema ─────────────────────────────────────────────────

/// Ordered field declarations for one generation stage.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    stage: &'static str,
    fields: Vec<FieldSpec>,
}

impl ResponseSchema {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            fields: Vec::new(),
        }
    }

    /// Append a field declaration (builder pattern).
    pub fn with(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Stage name used in log lines.
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Instructions appended to the prompt telling the model how to answer.
    pub fn format_instructions(&self) -> String {
        let mut out = String::from(
            "The output should be a markdown code snippet formatted in the following schema, \
             including the leading and trailing \"```json\" and \"```\":\n\n```json\n{\n",
        );
        self.push_field_lines(&mut out, 1);
        out.push_str("}\n```");
        out
    }

    fn push_field_lines(&self, out: &mut String, depth: usize) {
        let indent = "\t".repeat(depth);
        for field in &self.fields {
            out.push_str(&format!(
                "{indent}\"{}\": {}  // {}\n",
                field.name,
                field.kind.instruction_type(),
                field.description
            ));
            if let Some(nested) = &field.nested {
                nested.push_field_lines(out, depth + 1);
            }
        }
    }

    /// JSON Schema describing the strict shape of a conforming response.
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                let mut schema = f.kind.json_schema();
                if let Some(nested) = &f.nested {
                    schema["items"] = nested.json_schema();
                }
                schema["description"] = Value::String(f.description.to_string());
                (f.name.to_string(), schema)
            })
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Describe every way `value` deviates from the strict schema.
    ///
    /// Deviations are tolerated by [`normalize`](Self::normalize); this is
    /// purely for logging.
    pub fn diagnose(&self, value: &Value) -> Vec<String> {
        let schema = self.json_schema();
        let validator = match jsonschema::validator_for(&schema) {
            Ok(v) => v,
            Err(e) => return vec![format!("schema for {} is invalid: {e}", self.stage)],
        };
        validator
            .iter_errors(value)
            .map(|e| format!("{}: {e}", e.instance_path()))
            .collect()
    }

    /// Bring every declared field of `object` into its declared shape.
    ///
    /// Undeclared fields pass through untouched.
    pub fn normalize(&self, mut object: Map<String, Value>) -> Map<String, Value> {
        for field in &self.fields {
            let raw = object.remove(field.name).unwrap_or(Value::Null);
            if let Some(value) = normalize_field(field, raw) {
                object.insert(field.name.to_string(), value);
            }
        }
        object
    }

    /// Extract, check and normalize a raw response into a JSON object.
    pub fn parse_object(&self, raw: &str) -> Result<Map<String, Value>, ParseError> {
        let value = extract_json_value(raw)?;
        let issues = self.diagnose(&value);
        if !issues.is_empty() {
            debug!(
                "{} response drifted from schema ({} issue(s)): {}",
                self.stage,
                issues.len(),
                issues.join("; ")
            );
        }
        let Value::Object(object) = value else {
            return Err(ParseError::NotAnObject(value_kind(&value)));
        };
        if let Some(missing) = self
            .fields
            .iter()
            .find(|f| f.required && object.get(f.name).is_none_or(Value::is_null))
        {
            return Err(ParseError::MissingField(missing.name));
        }
        Ok(self.normalize(object))
    }

    /// Parse a raw response into a typed record.
    pub fn parse<T: DeserializeOwned>(&self, raw: &str) -> Result<T, ParseError> {
        let object = self.parse_object(raw)?;
        Ok(serde_json::from_value(Value::Object(object))?)
    }

    /// Normalize an already-parsed nested object into a typed record.
    pub fn parse_record<T: DeserializeOwned>(
        &self,
        object: Map<String, Value>,
    ) -> Result<T, ParseError> {
        Ok(serde_json::from_value(Value::Object(self.normalize(object)))?)
    }
}

fn normalize_field(field: &FieldSpec, raw: Value) -> Option<Value> {
    let placeholder = || Value::String(field.placeholder.unwrap_or_default().to_string());
    match field.kind {
        FieldKind::Text => Some(match raw {
            Value::Null => placeholder(),
            Value::Array(items) if items.is_empty() => placeholder(),
            other => Value::String(value_to_text(&other).unwrap_or_default()),
        }),
        FieldKind::List => Some(Value::Array(
            value_to_list(raw).into_iter().map(Value::String).collect(),
        )),
        FieldKind::TextOrList => Some(match raw {
            Value::Null => match field.placeholder {
                Some(p) => Value::String(p.to_string()),
                None => Value::Array(Vec::new()),
            },
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .filter_map(value_to_text)
                    .map(Value::String)
                    .collect(),
            ),
            other => Value::String(value_to_text(&other).unwrap_or_default()),
        }),
        FieldKind::Integer => match raw {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .map(Value::from),
            Value::String(s) => s.trim().parse::<u64>().ok().map(Value::from),
            _ => None,
        },
        FieldKind::Records => {
            let objects = match raw {
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Object(o) => Some(o),
                        _ => None,
                    })
                    .collect(),
                Value::Object(o) => vec![o],
                _ => Vec::new(),
            };
            Some(Value::Array(
                objects
                    .into_iter()
                    .map(|o| match &field.nested {
                        Some(nested) => Value::Object(nested.normalize(o)),
                        None => Value::Object(o),
                    })
                    .collect(),
            ))
        }
    }
}

/// Render a scalar-ish JSON value as text. `null` has no text.
fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(value_to_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

fn value_to_list(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => vec![s],
        Value::Array(items) => items.iter().filter_map(value_to_text).collect(),
        other => value_to_text(&other).into_iter().collect(),
    }
}

// ── OneOrMany ──────────────────────────────────────────────────────

/// A field the model may answer with either one text or a list of texts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    /// Non-empty items, one per entry. A blank single text yields nothing.
    pub fn items(&self) -> Vec<&str> {
        match self {
            OneOrMany::One(s) if s.trim().is_empty() => Vec::new(),
            OneOrMany::One(s) => vec![s.as_str()],
            OneOrMany::Many(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// Render for display, joining lists with `"; "`.
    pub fn to_text(&self) -> String {
        match self {
            OneOrMany::One(s) => s.clone(),
            OneOrMany::Many(items) => items.join("; "),
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(s: &str) -> Self {
        OneOrMany::One(s.to_string())
    }
}

// ── Parse with fallback ────────────────────────────────────────────

/// Parse a generation result, logging any failure.
///
/// `raw` is the generator's outcome: a transport failure and an unusable
/// response are handled identically. Returns `None` when the stage should
/// substitute its fallback record.
pub fn parse_response<T: DeserializeOwned>(
    schema: &ResponseSchema,
    raw: Result<String, String>,
) -> Option<T> {
    let text = match raw {
        Ok(text) => text,
        Err(e) => {
            warn!("{} generation failed, using fallback: {e}", schema.stage());
            return None;
        }
    };
    match schema.parse::<T>(&text) {
        Ok(record) => Some(record),
        Err(e) => {
            let preview: String = text.chars().take(120).collect();
            warn!(
                "{} response unusable, using fallback: {e} (response starts: {preview:?})",
                schema.stage()
            );
            None
        }
    }
}

/// [`parse_response`], substituting `fallback` on failure.
pub fn parse_or_fallback<T: DeserializeOwned>(
    schema: &ResponseSchema,
    raw: Result<String, String>,
    fallback: impl FnOnce() -> T,
) -> T {
    parse_response(schema, raw).unwrap_or_else(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize, Debug)]
    struct Sample {
        title: String,
        key_events: Vec<String>,
        character_development: OneOrMany,
        #[serde(default)]
        chapter_number: Option<u32>,
    }

    fn sample_schema() -> ResponseSchema {
        ResponseSchema::new("sample")
            .with(FieldSpec::text("title", "The title").or("Untitled"))
            .with(FieldSpec::list("key_events", "Important events"))
            .with(FieldSpec::text_or_list(
                "character_development",
                "How characters changed",
            ))
            .with(FieldSpec::integer("chapter_number", "The chapter number"))
    }

    #[test]
    fn bare_string_list_field_becomes_single_item() {
        let s: Sample = sample_schema()
            .parse(r#"{"title": "T", "key_events": "A single event"}"#)
            .unwrap();
        assert_eq!(s.key_events, vec!["A single event".to_string()]);
    }

    #[test]
    fn blank_string_list_field_becomes_empty() {
        let s: Sample = sample_schema()
            .parse(r#"{"title": "T", "key_events": "   "}"#)
            .unwrap();
        assert!(s.key_events.is_empty());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let s: Sample = sample_schema().parse("{}").unwrap();
        assert_eq!(s.title, "Untitled");
        assert!(s.key_events.is_empty());
        assert_eq!(s.character_development, OneOrMany::Many(vec![]));
        assert_eq!(s.chapter_number, None);
    }

    #[test]
    fn list_given_for_text_is_joined() {
        let s: Sample = sample_schema()
            .parse(r#"{"title": ["Part", "One"]}"#)
            .unwrap();
        assert_eq!(s.title, "Part, One");
    }

    #[test]
    fn text_or_list_preserves_shape() {
        let one: Sample = sample_schema()
            .parse(r#"{"character_development": "Asha grows bolder"}"#)
            .unwrap();
        assert_eq!(one.character_development.items(), vec!["Asha grows bolder"]);

        let many: Sample = sample_schema()
            .parse(r#"{"character_development": ["a", null, 3]}"#)
            .unwrap();
        assert_eq!(many.character_development.items(), vec!["a", "3"]);
    }

    #[test]
    fn integer_accepts_numeric_strings() {
        let s: Sample = sample_schema().parse(r#"{"chapter_number": "4"}"#).unwrap();
        assert_eq!(s.chapter_number, Some(4));
        let s: Sample = sample_schema()
            .parse(r#"{"chapter_number": "four"}"#)
            .unwrap();
        assert_eq!(s.chapter_number, None);
    }

    #[test]
    fn non_object_is_rejected() {
        let err = sample_schema().parse::<Sample>("[1, 2]").unwrap_err();
        assert!(matches!(err, ParseError::NotAnObject("array")));
    }

    #[test]
    fn required_field_missing_is_rejected() {
        let schema = ResponseSchema::new("wrapper").with(
            FieldSpec::records("characters", "Character profiles", sample_schema()).required(),
        );
        let err = schema.parse_object(r#"{"people": []}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingField("characters")));
    }

    #[test]
    fn records_keep_only_objects_and_normalize_them() {
        let schema = ResponseSchema::new("wrapper").with(FieldSpec::records(
            "items",
            "Nested records",
            sample_schema(),
        ));
        let obj = schema
            .parse_object(r#"{"items": [{"key_events": "one"}, "junk", {"title": "B"}]}"#)
            .unwrap();
        let items = obj["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["key_events"], json!(["one"]));
        assert_eq!(items[0]["title"], "Untitled");
        assert_eq!(items[1]["title"], "B");
    }

    #[test]
    fn nested_fields_appear_in_instructions() {
        let schema = ResponseSchema::new("wrapper").with(FieldSpec::records(
            "items",
            "Nested records",
            sample_schema(),
        ));
        let text = schema.format_instructions();
        assert!(text.contains("\t\"items\": list of objects"));
        assert!(text.contains("\t\t\"title\": string"));
    }

    #[test]
    fn undeclared_fields_pass_through() {
        let obj = sample_schema()
            .parse_object(r#"{"mood": "wistful"}"#)
            .unwrap();
        assert_eq!(obj["mood"], "wistful");
    }

    #[test]
    fn diagnose_reports_drift() {
        let issues = sample_schema().diagnose(&json!({"key_events": "one"}));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("key_events"));
        assert!(sample_schema().diagnose(&json!({"key_events": []})).is_empty());
    }

    #[test]
    fn format_instructions_list_every_field() {
        let text = sample_schema().format_instructions();
        assert!(text.contains("```json"));
        assert!(text.contains("\"key_events\": list of strings"));
        assert!(text.contains("\"character_development\": string or list of strings"));
    }

    #[test]
    fn fallback_used_for_prose_and_transport_errors() {
        let schema = sample_schema();
        let from_prose = parse_or_fallback(&schema, Ok("not json".into()), || Sample {
            title: "fallback".into(),
            key_events: vec![],
            character_development: OneOrMany::default(),
            chapter_number: None,
        });
        assert_eq!(from_prose.title, "fallback");

        let from_error: Option<Sample> = parse_response(&schema, Err("HTTP 500".into()));
        assert!(from_error.is_none());
    }
}
