//! Content normalization
//!
//! Free text becomes a schema-conformant JSON-LD document through one
//! generative-model call followed by extraction, deserialization, and
//! validation. The model's output is never trusted on the one invariant
//! that matters: the description field must carry the source text verbatim,
//! and any drift is overwritten deterministically.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::llm::TextGenerator;
use crate::schema::SchemaTemplate;

use super::StructuredEnvelope;
use super::source::{RawInput, RawPayload};

/// Content normalizer
///
/// Stateless between inputs; the only side effect is the outbound model
/// call. There is no retry at this layer: the batch orchestrator's per-item
/// isolation is the retry boundary.
#[derive(Clone)]
pub struct Normalizer {
    generator: Arc<dyn TextGenerator>,
}

impl Normalizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Normalize one raw input into a publishable envelope.
    ///
    /// Pre-structured input skips the model entirely and is only wrapped in
    /// a `public` partition when not already partitioned.
    pub async fn normalize(
        &self,
        input: &RawInput,
        template: &SchemaTemplate,
    ) -> Result<StructuredEnvelope> {
        match &input.payload {
            RawPayload::Structured(document) => {
                debug!(source = %input.name, "Wrapping pre-structured document");
                Ok(StructuredEnvelope::from_document(document.clone()))
            }
            RawPayload::FreeText(text) => self.normalize_text(&input.name, text, template).await,
        }
    }

    async fn normalize_text(
        &self,
        source: &str,
        text: &str,
        template: &SchemaTemplate,
    ) -> Result<StructuredEnvelope> {
        let prompt = build_memory_prompt(text, template);

        let response = self.generator.generate(&prompt).await?;

        let block = extract_json_block(&response).ok_or_else(|| {
            Error::Transform(
                source.to_string(),
                "no JSON-LD object found in model response".to_string(),
            )
        })?;

        let document: Value = serde_json::from_str(block).map_err(|e| {
            Error::Transform(
                source.to_string(),
                format!("failed to parse JSON-LD block: {}", e),
            )
        })?;

        let mut envelope = StructuredEnvelope::from_document(document);
        if !envelope.public.is_object() {
            return Err(Error::Transform(
                source.to_string(),
                "model output is not a JSON object".to_string(),
            ));
        }

        apply_date_default(&mut envelope.public, template);
        ensure_entity_identifiers(&mut envelope.public);

        // The description must carry the source text verbatim. A mismatch is
        // a definitional fix, not a failure.
        let description = envelope.public.get(template.description_field());
        if description.and_then(Value::as_str) != Some(text) {
            warn!(
                source = %source,
                "Generated description does not match input text, overwriting"
            );
            envelope.public[template.description_field()] = json!(text);
        }

        template
            .validate(&envelope.public)
            .map_err(|e| Error::Transform(source.to_string(), e.to_string()))?;

        Ok(envelope)
    }
}

/// Fill the template's date field with the current time when the model left
/// it absent or empty.
fn apply_date_default(document: &mut Value, template: &SchemaTemplate) {
    let missing = document
        .get(template.date_field())
        .and_then(Value::as_str)
        .map(str::trim)
        .is_none_or(str::is_empty);

    if missing && document.is_object() {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        debug!(field = template.date_field(), "Defaulting date field to current time");
        document[template.date_field()] = json!(now);
    }
}

/// Synthesize `uuid:` identifiers for entity objects the model left without
/// an `@id`. The prompt asks for identifiers, but the model cannot be relied
/// on to always produce them.
fn ensure_entity_identifiers(document: &mut Value) {
    let Some(object) = document.as_object_mut() else {
        return;
    };

    for value in object.values_mut() {
        let Some(entries) = value.as_array_mut() else {
            continue;
        };
        for entry in entries {
            if let Some(entity) = entry.as_object_mut()
                && !entity.contains_key("@id")
            {
                entity.insert("@id".to_string(), json!(format!("uuid:{}", Uuid::new_v4())));
            }
        }
    }
}

/// Build the extraction prompt for one free-text input
fn build_memory_prompt(text: &str, template: &SchemaTemplate) -> String {
    format!(
        r#"You are tasked with creating a structured memory JSON-LD object for a knowledge graph. Your goal is to extract all relevant information from the provided input text to populate the JSON-LD memory template below.

** Template **
The memory should follow this JSON-LD structure:
{template}

** Instructions **
1. Extract the main idea of the input text and use it to create a concise and descriptive title. This goes in the "{title}" field.
2. Store the original input text verbatim in "{description}".
3. For the "about" field:
   - Identify the key topics or entities mentioned in the input and add them as Thing objects.
   - Use concise, descriptive names for these topics.
   - Where possible, use a provided URL or a well-known URL for the entity as the @id. If no URL is available, synthesize a uuid-based identifier from the most relevant term. @id fields must be valid uuids or URLs.
4. For the "keywords" field:
   - Extract relevant terms or concepts from the input and list them as keywords.
   - Ensure the keywords capture the essence of the content, focusing on technical terms or significant ideas.
5. Ensure all fields align with the schema.org ontology and accurately represent the input.
6. Populate "{date}" either with a specifically available date, or the current time.

** Input **
{input}

** Output **
Generate the memory in the exact JSON-LD format provided above, fully populated based on the input. Make sure to only output the JSON-LD object. DO NOT OUTPUT ANYTHING ELSE, DO NOT ADD ANY COMMENTS OR REMARKS, JUST THE JSON-LD CONTENT WRAPPED IN {{ }}."#,
        template = template.template_json(),
        title = template.title_field(),
        description = template.description_field(),
        date = template.date_field(),
        input = text,
    )
}

/// Extract the first balanced brace-delimited block from a response.
///
/// Tracks string literals and escapes so braces inside JSON strings do not
/// unbalance the scan.
pub(crate) fn extract_json_block(response: &str) -> Option<&str> {
    let start = response.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in response[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
