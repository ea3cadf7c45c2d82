//! Structured documentation records shared by the fetcher and the vector store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Documentation describing a single workflow node.
///
/// `node_type` is the identity; re-fetching a node replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDocumentation {
    /// Vendor-qualified node identifier, e.g. `n8n-nodes-base.httpRequest`.
    pub node_type: String,
    /// Human readable node name.
    pub display_name: String,
    /// Short description of what the node does.
    pub description: String,
    /// Documented node version.
    pub version: String,
    /// Configurable parameters in page order.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Usage examples in page order.
    #[serde(default)]
    pub examples: Vec<Example>,
    /// Page the record was scraped from.
    pub source_url: String,
    /// When the page was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl NodeDocumentation {
    /// Builds a record with empty sections, stamped with the current time.
    pub fn new(
        node_type: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            display_name: display_name.into(),
            description: description.into(),
            version: "1.0".to_string(),
            parameters: Vec::new(),
            examples: Vec::new(),
            source_url: String::new(),
            fetched_at: Utc::now(),
        }
    }

    /// Text fed to the embedding service when no vector is supplied.
    pub fn embedding_text(&self) -> String {
        let mut parts = Vec::with_capacity(2 + self.parameters.len() + self.examples.len());
        parts.push(self.display_name.clone());
        parts.push(self.description.clone());
        for param in &self.parameters {
            parts.push(format!("{}: {}", param.name, param.description));
        }
        for example in &self.examples {
            parts.push(format!("{} {}", example.title, example.description));
        }
        parts.join(" ")
    }
}

/// One configurable node parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name as shown in the editor.
    pub name: String,
    /// Declared type, `string` when the page does not say.
    #[serde(rename = "type")]
    pub param_type: String,
    /// Free text description.
    pub description: String,
    /// Whether the page marks the parameter as required.
    pub required: bool,
    /// Documented default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Documented option values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Usage example attached to a node page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Heading of the example section.
    pub title: String,
    /// Prose preceding the code block.
    pub description: String,
    /// First code block of the section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_text_covers_every_section() {
        let mut doc = NodeDocumentation::new("n8n-nodes-base.slack", "Slack", "Send messages");
        doc.parameters.push(Parameter {
            name: "channel".into(),
            param_type: "string".into(),
            description: "Target channel".into(),
            required: true,
            default: None,
            options: None,
        });
        doc.examples.push(Example {
            title: "Post".into(),
            description: "Posts a greeting".into(),
            code: None,
        });

        assert_eq!(
            doc.embedding_text(),
            "Slack Send messages channel: Target channel Post Posts a greeting"
        );
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let doc = NodeDocumentation::new("n8n-nodes-base.set", "Set", "Sets values");
        let json = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(json["nodeType"], "n8n-nodes-base.set");
        assert_eq!(json["displayName"], "Set");
        assert!(json.get("fetchedAt").is_some());
    }
}
