//! Schema templates for knowledge assets
//!
//! A [`SchemaTemplate`] is a named JSON-LD target shape. It serves two roles:
//! the example-filled template JSON is embedded into LLM prompts as
//! scaffolding, and the declared required fields act as a minimal post-hoc
//! validator over whatever the model returns.

use serde_json::{Value, json};

use crate::error::{Error, Result};

/// Expected value kind for a required top-level field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A plain string
    Text,
    /// A string holding a timestamp
    DateTime,
    /// A nested object
    Object,
    /// An ordered list of objects
    ObjectList,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::Text | FieldKind::DateTime => value.is_string(),
            FieldKind::Object => value.is_object(),
            FieldKind::ObjectList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_object)),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            FieldKind::Text => "a string",
            FieldKind::DateTime => "a timestamp string",
            FieldKind::Object => "an object",
            FieldKind::ObjectList => "a list of objects",
        }
    }
}

/// A required top-level field of the target shape
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// A named JSON-LD target shape with example values and required fields
#[derive(Debug, Clone)]
pub struct SchemaTemplate {
    name: String,
    template: Value,
    required: Vec<FieldSpec>,
    /// Field holding the synthesized title
    title_field: &'static str,
    /// Field holding the verbatim source text
    description_field: &'static str,
    /// Field holding the asset timestamp
    date_field: &'static str,
}

impl SchemaTemplate {
    /// The built-in schema.org Event memory template
    pub fn memory() -> Self {
        let template = json!({
            "@context": "http://schema.org",
            "@type": "Event",
            "name": "<short title summarizing the event>",
            "description": "<the exact content of the input text>",
            "startDate": "yyyy-mm-ddTHH:mm:ssZ",
            "organizer": {
                "@type": "Organization",
                "@id": "uuid:generic:organizer",
                "name": "Anonymous Organizer",
                "url": "https://example.com/organizer"
            },
            "keywords": [
                {
                    "@type": "Text",
                    "@id": "uuid:keyword1",
                    "name": "keyword1"
                }
            ],
            "about": [
                {
                    "@type": "Thing",
                    "@id": "uuid:thing1",
                    "name": "Topic1",
                    "url": "https://example.com/Topic1"
                }
            ],
            "license": "https://creativecommons.org/licenses/by/4.0/"
        });

        Self {
            name: "Event".to_string(),
            template,
            required: vec![
                FieldSpec { name: "name", kind: FieldKind::Text },
                FieldSpec { name: "description", kind: FieldKind::Text },
                FieldSpec { name: "startDate", kind: FieldKind::DateTime },
                FieldSpec { name: "keywords", kind: FieldKind::ObjectList },
                FieldSpec { name: "about", kind: FieldKind::ObjectList },
            ],
            title_field: "name",
            description_field: "description",
            date_field: "startDate",
        }
    }

    /// Schema type name (e.g. "Event")
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The example-filled template as compact JSON, for prompt embedding
    pub fn template_json(&self) -> String {
        self.template.to_string()
    }

    /// The schema.org type IRI, for query patterns
    pub fn type_iri(&self) -> String {
        format!("http://schema.org/{}", self.name)
    }

    /// Field holding the synthesized title
    pub fn title_field(&self) -> &str {
        self.title_field
    }

    /// Field holding the verbatim source text
    pub fn description_field(&self) -> &str {
        self.description_field
    }

    /// Field holding the asset timestamp
    pub fn date_field(&self) -> &str {
        self.date_field
    }

    /// Validate a document against the template's required fields.
    ///
    /// This is intentionally minimal: required top-level fields must be
    /// present and carry the declared value kind. Anything beyond that is
    /// the graph node's concern.
    pub fn validate(&self, document: &Value) -> Result<()> {
        let object = document.as_object().ok_or_else(|| {
            Error::InvalidInput("document is not a JSON object".to_string())
        })?;

        for field in &self.required {
            match object.get(field.name) {
                None => {
                    return Err(Error::InvalidInput(format!(
                        "missing required field '{}'",
                        field.name
                    )));
                }
                Some(value) if !field.kind.matches(value) => {
                    return Err(Error::InvalidInput(format!(
                        "field '{}' must be {}",
                        field.name,
                        field.kind.describe()
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}
