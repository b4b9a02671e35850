//! SPARQL query construction
//!
//! Builds a prompt from the schema template, one worked example, and the
//! formatting rules, then extracts the first fenced sparql block from the
//! model response. A missing block is a [`crate::Error::Generation`]; the
//! caller substitutes the fallback query - that substitution is the defined
//! recovery path, not an edge case.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::llm::TextGenerator;
use crate::schema::SchemaTemplate;

use super::StructuredQuery;

/// Worked example embedded into the construction prompt
pub const EXAMPLE_QUERY: &str = r#"SELECT DISTINCT ?name ?description
WHERE {
  ?s a <http://schema.org/Event> .
  ?s <http://schema.org/name> ?name .
  ?s <http://schema.org/description> ?description .

  OPTIONAL {
    ?s <http://schema.org/keywords> ?keyword .
    ?keyword <http://schema.org/name> ?keywordName .
  }

  OPTIONAL {
    ?s <http://schema.org/about> ?about .
    ?about <http://schema.org/name> ?aboutName .
  }

  FILTER(
    CONTAINS(LCASE(?name), "example_keyword") ||
    (BOUND(?keywordName) && CONTAINS(LCASE(?keywordName), "example_keyword")) ||
    (BOUND(?aboutName) && CONTAINS(LCASE(?aboutName), "example_keyword"))
  )
}
LIMIT 10"#;

/// Static, known-valid fallback query
pub const FALLBACK_QUERY: &str = r#"SELECT DISTINCT ?name ?description
WHERE {
  ?s a <http://schema.org/Event> .
  ?s <http://schema.org/name> ?name .
  ?s <http://schema.org/description> ?description .
}
LIMIT 10"#;

/// Query constructor
#[derive(Clone)]
pub struct QueryConstructor {
    generator: Arc<dyn TextGenerator>,
}

impl QueryConstructor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Convert a natural-language question into a structured query.
    ///
    /// Deterministic given a deterministic generator: the same question
    /// and template always produce the same prompt, and the extraction is
    /// purely mechanical.
    pub async fn construct(
        &self,
        question: &str,
        template: &SchemaTemplate,
        example: &str,
    ) -> Result<StructuredQuery> {
        info!(question = %question, "Generating SPARQL query");

        let prompt = build_query_prompt(question, template, example);

        let response = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        let query = extract_sparql_block(&response).ok_or_else(|| {
            Error::Generation("no sparql code block found in model response".to_string())
        })?;

        debug!(query = %query, "Generated SPARQL query");

        Ok(StructuredQuery::Generated(query.to_string()))
    }
}

/// Build the construction prompt
fn build_query_prompt(question: &str, template: &SchemaTemplate, example: &str) -> String {
    format!(
        r#"You are tasked with generating a SPARQL query to retrieve information from a decentralized knowledge graph. The query should align with the JSON-LD memory template provided below:

{template}

** Examples **
Use the following SPARQL example to understand the format:
{example}

** Instructions **
1. Analyze the user query and identify the key fields and concepts it refers to.
2. Use these fields and concepts to construct a SPARQL query.
3. Ensure the SPARQL query follows standard syntax and can be executed against the knowledge graph.
4. Use 'OR' logic when constructing the query to ensure broader matching results. For example, if multiple keywords or concepts are provided, the query should match any of them, not all.
5. Replace the examples with actual terms from the user's query.
6. Always select distinct results by adding the DISTINCT keyword.
7. Always select {title} and {description}. Do not select other fields.
8. Output the SPARQL query wrapped in a sparql code block for clarity (e.g., ```sparql
QUERY
```).

** User Query **
{question}

** Output **
Provide only the SPARQL query wrapped in a sparql code block."#,
        template = template.template_json(),
        example = example,
        title = template.title_field(),
        description = template.description_field(),
        question = question,
    )
}

/// Extract the first fenced sparql block from a response
pub(crate) fn extract_sparql_block(response: &str) -> Option<&str> {
    let start = response.find("```sparql")?;
    let body_start = start + "```sparql".len();
    let end = response[body_start..].find("```")?;
    Some(response[body_start..body_start + end].trim())
}
