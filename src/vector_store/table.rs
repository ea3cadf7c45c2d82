//! Postgres identifiers for the documentation table.

use crate::error::{DocsError, Result};

/// Fully-qualified Postgres table name (schema + table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: String,
    table: String,
}

impl Default for TableName {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            table: "node_documentation".to_string(),
        }
    }
}

impl TableName {
    /// Builds a new table identifier.
    pub fn new<S, T>(schema: S, table: T) -> Result<Self>
    where
        S: Into<String>,
        T: Into<String>,
    {
        let schema = schema.into();
        let table = table.into();
        if schema.trim().is_empty() {
            return Err(DocsError::Config("schema name is required".into()));
        }
        if table.trim().is_empty() {
            return Err(DocsError::Config("table name is required".into()));
        }
        Ok(Self { schema, table })
    }

    /// Fully-qualified table reference with quoted identifiers.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// Name of the cosine similarity index on the embedding column.
    pub fn embedding_index_name(&self) -> String {
        format!(
            "{}_{}_embedding_idx",
            sanitize_ident(&self.schema),
            sanitize_ident(&self.table)
        )
    }
}

/// Quotes Postgres identifiers, escaping embedded quotes.
fn quote_ident(input: &str) -> String {
    let escaped = input.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

fn sanitize_ident(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_sanitizes() {
        let table = TableName::new("docs", "node \"docs\"").expect("table");
        assert_eq!(table.qualified(), "\"docs\".\"node \"\"docs\"\"\"");
        assert_eq!(table.embedding_index_name(), "docs_node__docs__embedding_idx");
    }

    #[test]
    fn rejects_blank_names() {
        assert!(TableName::new(" ", "t").is_err());
        assert!(TableName::new("public", "").is_err());
    }
}
