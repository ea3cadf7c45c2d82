//! Node-type parsing and documentation URL inference.

use std::fmt;

/// Package assumed when a node type carries no vendor prefix.
pub const DEFAULT_PACKAGE: &str = "n8n-nodes-base";

const DOCS_ROOT: &str = "integrations/builtin";

/// Integrations documented under the app section even though nothing in the name says so.
const APP_NODES: &[&str] = &[
    "activecampaign", "airtable", "asana", "aws", "clickup", "discord", "dropbox", "github",
    "gitlab", "gmail", "googlecalendar", "googledrive", "googlesheets", "hubspot", "jira",
    "mailchimp", "mattermost", "microsoftexcel", "microsoftoutlook", "microsoftteams", "mongodb",
    "mysql", "notion", "openai", "pipedrive", "postgres", "redis", "salesforce", "shopify",
    "slack", "stripe", "telegram", "trello", "twilio", "twitter", "whatsapp", "wordpress",
    "zendesk", "zoom",
];

/// Cluster node name prefixes that document root nodes rather than sub-nodes.
const ROOT_NODE_PREFIXES: &[&str] = &["agent", "chain", "vectorstore", "openai"];

/// Sections of the documentation site that hold node pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Built-in core nodes.
    Core,
    /// Third-party application integrations.
    App,
    /// Trigger nodes.
    Trigger,
    /// Langchain cluster root nodes.
    ClusterRoot,
    /// Langchain cluster sub-nodes.
    ClusterSub,
}

impl NodeCategory {
    /// Every category, in index scanning order.
    pub const ALL: [NodeCategory; 5] = [
        NodeCategory::Core,
        NodeCategory::App,
        NodeCategory::Trigger,
        NodeCategory::ClusterRoot,
        NodeCategory::ClusterSub,
    ];

    /// Path below the integrations root where this category's pages live.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Core => "core-nodes",
            Self::App => "app-nodes",
            Self::Trigger => "trigger-nodes",
            Self::ClusterRoot => "cluster-nodes/root-nodes",
            Self::ClusterSub => "cluster-nodes/sub-nodes",
        }
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// A node type split into its package and node name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeName<'a> {
    /// Vendor package, e.g. `n8n-nodes-base`.
    pub package: &'a str,
    /// Node name within the package, e.g. `httpRequest`.
    pub name: &'a str,
}

impl<'a> NodeName<'a> {
    /// Splits on the last dot; bare names fall back to the base package.
    pub fn parse(node_type: &'a str) -> Self {
        match node_type.rsplit_once('.') {
            Some((package, name)) if !package.is_empty() && !name.is_empty() => {
                Self { package, name }
            }
            _ => Self {
                package: DEFAULT_PACKAGE,
                name: node_type.trim_matches('.'),
            },
        }
    }

    /// True for langchain cluster packages.
    pub fn is_langchain(&self) -> bool {
        self.package.contains("langchain")
    }

    fn page_slug(&self) -> String {
        format!("{}.{}", self.package, self.name.to_lowercase())
    }
}

/// Case-insensitive identity of a node type.
///
/// Page slugs on the site lowercase the node name, so `n8n-nodes-base.httpRequest`
/// and `n8n-nodes-base.httprequest` name the same node.
pub fn node_key(node_type: &str) -> String {
    node_type.to_lowercase()
}

/// Documentation sections to try for a node, most likely first.
pub fn candidate_categories(node_type: &str) -> Vec<NodeCategory> {
    let node = NodeName::parse(node_type);
    let lowered = node.name.to_lowercase();

    if node.is_langchain() {
        if ROOT_NODE_PREFIXES.iter().any(|prefix| lowered.starts_with(prefix)) {
            return vec![NodeCategory::ClusterRoot, NodeCategory::ClusterSub];
        }
        return vec![NodeCategory::ClusterSub, NodeCategory::ClusterRoot];
    }
    if lowered.ends_with("trigger") {
        return vec![NodeCategory::Trigger, NodeCategory::App, NodeCategory::Core];
    }
    if APP_NODES.contains(&lowered.as_str()) {
        return vec![NodeCategory::App, NodeCategory::Core];
    }
    vec![NodeCategory::Core, NodeCategory::App]
}

/// Ordered page URLs that may document `node_type` under `base_url`.
pub fn candidate_urls(base_url: &str, node_type: &str) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    let slug = NodeName::parse(node_type).page_slug();
    candidate_categories(node_type)
        .into_iter()
        .map(|category| format!("{base}/{DOCS_ROOT}/{}/{slug}/", category.path_segment()))
        .collect()
}

/// Readable name derived from the node portion of a node type.
///
/// `n8n-nodes-base.httpRequest` becomes `HTTP Request`.
pub fn format_display_name(node_type: &str) -> String {
    let name = NodeName::parse(node_type).name;
    let mut spaced = String::with_capacity(name.len() + 8);
    let mut prev: Option<char> = None;
    for ch in name.chars() {
        if ch.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
            spaced.push(' ');
        }
        spaced.push(ch);
        prev = Some(ch);
    }

    spaced
        .split_whitespace()
        .map(normalize_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_word(word: &str) -> String {
    const ACRONYMS: &[&str] = &[
        "AI", "API", "AWS", "CSV", "FTP", "HTML", "HTTP", "JSON", "JWT", "LLM", "QA", "RSS",
        "SFTP", "SQL", "SSH", "URL", "XML",
    ];
    let upper = word.to_uppercase();
    if ACRONYMS.contains(&upper.as_str()) {
        return upper;
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_qualified_and_bare_names() {
        let node = NodeName::parse("n8n-nodes-langchain.lmChatOpenAi");
        assert_eq!(node.package, "n8n-nodes-langchain");
        assert_eq!(node.name, "lmChatOpenAi");

        let bare = NodeName::parse("httpRequest");
        assert_eq!(bare.package, DEFAULT_PACKAGE);
        assert_eq!(bare.name, "httpRequest");
    }

    #[test]
    fn core_nodes_try_core_then_app() {
        assert_eq!(
            candidate_urls("https://docs.test/", "n8n-nodes-base.httpRequest"),
            vec![
                "https://docs.test/integrations/builtin/core-nodes/n8n-nodes-base.httprequest/",
                "https://docs.test/integrations/builtin/app-nodes/n8n-nodes-base.httprequest/",
            ]
        );
    }

    #[test]
    fn known_apps_try_app_first() {
        assert_eq!(
            candidate_categories("n8n-nodes-base.googleSheets"),
            vec![NodeCategory::App, NodeCategory::Core]
        );
    }

    #[test]
    fn triggers_try_trigger_section_first() {
        assert_eq!(
            candidate_categories("n8n-nodes-base.slackTrigger"),
            vec![NodeCategory::Trigger, NodeCategory::App, NodeCategory::Core]
        );
    }

    #[test]
    fn langchain_root_and_sub_variants() {
        assert_eq!(
            candidate_categories("n8n-nodes-langchain.agent"),
            vec![NodeCategory::ClusterRoot, NodeCategory::ClusterSub]
        );
        let urls = candidate_urls("https://docs.test", "n8n-nodes-langchain.embeddingsOpenAi");
        assert_eq!(
            urls[0],
            "https://docs.test/integrations/builtin/cluster-nodes/sub-nodes/n8n-nodes-langchain.embeddingsopenai/"
        );
    }

    #[test]
    fn display_names_split_camel_case_and_fix_acronyms() {
        assert_eq!(format_display_name("n8n-nodes-base.httpRequest"), "HTTP Request");
        assert_eq!(format_display_name("n8n-nodes-base.googleSheets"), "Google Sheets");
        assert_eq!(format_display_name("n8n-nodes-base.executeSql"), "Execute SQL");
        assert_eq!(format_display_name("n8n-nodes-langchain.lmChatOpenAi"), "Lm Chat Open AI");
        assert_eq!(format_display_name("webhook"), "Webhook");
    }
}
