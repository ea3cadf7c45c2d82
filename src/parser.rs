//! Best-effort extraction of node documentation from HTML pages.
//!
//! Pages are walked in document order into a flat list of blocks (headings,
//! paragraphs, code blocks, tables and lists), and every field is derived from
//! that list. Missing sections leave fields unset; `ParsedPage::into_documentation`
//! fills in the documented defaults.

use chrono::Utc;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::docs::{Example, NodeDocumentation, Parameter};
use crate::urls::format_display_name;

/// Version reported when a page does not state one.
pub const DEFAULT_VERSION: &str = "1.0";
/// Parameter type reported when a page does not state one.
pub const DEFAULT_PARAM_TYPE: &str = "string";

const IGNORED_TAGS: &[&str] = &[
    "script", "style", "template", "noscript", "svg", "nav", "header", "footer", "aside",
];

const PARAM_TYPES: &[&str] = &[
    "string",
    "number",
    "boolean",
    "options",
    "multioptions",
    "collection",
    "fixedcollection",
    "json",
    "date",
    "datetime",
    "array",
    "object",
    "color",
];

/// Fields recovered from a page; `None` or empty means the section was missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// First heading text.
    pub display_name: Option<String>,
    /// First paragraph after the heading (or in the content area).
    pub description: Option<String>,
    /// `Version: X.Y` value found anywhere in the page.
    pub version: Option<String>,
    /// Parameters from a settings table or a parameters list.
    pub parameters: Vec<Parameter>,
    /// Example sections.
    pub examples: Vec<Example>,
}

impl ParsedPage {
    /// Completes the record, substituting defaults for anything missing.
    pub fn into_documentation(self, node_type: &str, source_url: &str) -> NodeDocumentation {
        NodeDocumentation {
            node_type: node_type.to_string(),
            display_name: self
                .display_name
                .unwrap_or_else(|| format_display_name(node_type)),
            description: self.description.unwrap_or_default(),
            version: self
                .version
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            parameters: self.parameters,
            examples: self.examples,
            source_url: source_url.to_string(),
            fetched_at: Utc::now(),
        }
    }
}

/// Reusable HTML-to-record parser.
#[derive(Clone)]
pub struct DocParser {
    selectors: RootSelectors,
    version: Regex,
    type_hint: Regex,
    default_value: Regex,
    options: Regex,
}

impl Default for DocParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocParser {
    /// Compiles selectors and patterns.
    pub fn new() -> Self {
        Self {
            selectors: RootSelectors::new(),
            version: Regex::new(r"(?i)\bversion:\s*v?(\d+(?:\.\d+)+)").expect("version pattern"),
            type_hint: Regex::new(r"\(\s*([A-Za-z]+)\s*\)").expect("type hint pattern"),
            default_value: Regex::new(r"(?i)\bdefault(?:s to|:)\s*`?([^`.,;]+)`?")
                .expect("default pattern"),
            options: Regex::new(r"(?i)\boptions:\s*([^.;]+)").expect("options pattern"),
        }
    }

    /// Parses `html` into a complete record for `node_type`.
    pub fn parse_documentation(
        &self,
        node_type: &str,
        html: &str,
        source_url: &str,
    ) -> NodeDocumentation {
        self.parse_page(html).into_documentation(node_type, source_url)
    }

    /// Extracts whatever fields the page provides.
    pub fn parse_page(&self, html: &str) -> ParsedPage {
        let document = Html::parse_document(html);
        let root = self.selectors.pick_root(&document);
        let blocks = collect_blocks(root);

        let heading_idx = blocks.iter().position(Block::is_heading);

        let display_name = heading_idx.and_then(|idx| blocks[idx].heading_text().map(str::to_string));
        let description = heading_idx
            .and_then(|idx| first_paragraph(&blocks[idx + 1..]))
            .or_else(|| first_paragraph(&blocks))
            .map(str::to_string);

        let full_text = collapse_whitespace(&document.root_element().text().collect::<Vec<_>>().join(" "));
        let version = self
            .version
            .captures(&full_text)
            .map(|caps| caps[1].to_string());

        let mut parameters = self.table_parameters(&blocks);
        if parameters.is_empty() {
            parameters = self.list_parameters(&blocks);
        }
        let examples = extract_examples(&blocks);

        ParsedPage {
            display_name,
            description,
            version,
            parameters,
            examples,
        }
    }

    fn table_parameters(&self, blocks: &[Block<'_>]) -> Vec<Parameter> {
        let mut last_heading: Option<&str> = None;
        for block in blocks {
            match block {
                Block::Heading { text, .. } => last_heading = Some(text.as_str()),
                Block::Table(table) => {
                    let Some(heading) = last_heading else {
                        continue;
                    };
                    let heading = heading.to_lowercase();
                    if ["parameter", "option", "setting"]
                        .iter()
                        .any(|word| heading.contains(word))
                    {
                        let params = self.table_rows(*table);
                        if !params.is_empty() {
                            return params;
                        }
                    }
                }
                _ => {}
            }
        }
        Vec::new()
    }

    fn table_rows(&self, table: ElementRef<'_>) -> Vec<Parameter> {
        let mut params = Vec::new();
        for row in table.select(&self.selectors.row) {
            let cells: Vec<String> = row
                .select(&self.selectors.cell)
                .map(|cell| extract_text(&cell))
                .collect();
            let Some(raw_name) = cells.first() else {
                continue;
            };
            let description = cells.get(1).cloned().unwrap_or_default();
            let param_type = cells
                .get(2)
                .map(|cell| cell.trim().to_lowercase())
                .filter(|cell| !cell.is_empty())
                .unwrap_or_else(|| DEFAULT_PARAM_TYPE.to_string());
            let required =
                raw_name.contains('*') || description.to_lowercase().contains("required");
            let name = clean_name(raw_name);
            if name.is_empty() {
                continue;
            }
            params.push(self.build_parameter(name, param_type, description, required));
        }
        params
    }

    fn list_parameters(&self, blocks: &[Block<'_>]) -> Vec<Parameter> {
        let Some(start) = blocks.iter().position(|block| {
            block
                .heading_text()
                .is_some_and(|text| text.to_lowercase().contains("parameters"))
        }) else {
            return Vec::new();
        };
        let list = blocks[start + 1..]
            .iter()
            .take_while(|block| !block.is_heading())
            .find_map(|block| match block {
                Block::List(list) => Some(*list),
                _ => None,
            });
        let Some(list) = list else {
            return Vec::new();
        };

        list.child_elements()
            .filter(|child| child.value().name() == "li")
            .filter_map(|item| self.list_item_parameter(&extract_text(&item)))
            .collect()
    }

    fn list_item_parameter(&self, text: &str) -> Option<Parameter> {
        let (raw_name, description) = match text.split_once(':') {
            Some((name, rest)) => (name, rest.trim().to_string()),
            None => (text, String::new()),
        };
        let mut param_type = DEFAULT_PARAM_TYPE.to_string();
        let mut required = description.to_lowercase().contains("required");
        for caps in self.type_hint.captures_iter(text) {
            let hint = caps[1].to_lowercase();
            if PARAM_TYPES.contains(&hint.as_str()) {
                param_type = hint;
            } else if hint == "required" {
                required = true;
            }
        }
        let name = clean_name(&self.type_hint.replace_all(raw_name, ""));
        if name.is_empty() {
            return None;
        }
        required |= raw_name.contains('*');
        Some(self.build_parameter(name, param_type, description, required))
    }

    fn build_parameter(
        &self,
        name: String,
        param_type: String,
        description: String,
        required: bool,
    ) -> Parameter {
        let default = self
            .default_value
            .captures(&description)
            .map(|caps| caps[1].trim().to_string())
            .filter(|value| !value.is_empty());
        let options = self
            .options
            .captures(&description)
            .map(|caps| {
                caps[1]
                    .split(',')
                    .map(|option| option.trim().trim_matches('`').to_string())
                    .filter(|option| !option.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|options| !options.is_empty());
        Parameter {
            name,
            param_type,
            description,
            required,
            default,
            options,
        }
    }
}

#[derive(Clone)]
struct RootSelectors {
    article: Selector,
    main: Selector,
    body: Selector,
    row: Selector,
    cell: Selector,
}

impl RootSelectors {
    fn new() -> Self {
        Self {
            article: Selector::parse("article").expect("article selector"),
            main: Selector::parse("main, [role=main], .content").expect("main selector"),
            body: Selector::parse("body").expect("body selector"),
            row: Selector::parse("tr").expect("row selector"),
            cell: Selector::parse("td").expect("cell selector"),
        }
    }

    fn pick_root<'a>(&self, document: &'a Html) -> ElementRef<'a> {
        document
            .select(&self.article)
            .next()
            .or_else(|| document.select(&self.main).next())
            .or_else(|| document.select(&self.body).next())
            .unwrap_or_else(|| document.root_element())
    }
}

enum Block<'a> {
    Heading { text: String },
    Paragraph(String),
    Code(String),
    Table(ElementRef<'a>),
    List(ElementRef<'a>),
}

impl Block<'_> {
    fn is_heading(&self) -> bool {
        matches!(self, Block::Heading { .. })
    }

    fn heading_text(&self) -> Option<&str> {
        match self {
            Block::Heading { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }
}

fn collect_blocks(root: ElementRef<'_>) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    for element in root.descendent_elements() {
        let tag = element.value().name();
        let block = match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                Some(Block::Heading {
                    text: extract_text(&element),
                })
            }
            "p" if !has_ancestor(&element, &["table", "li", "pre"]) => {
                Some(Block::Paragraph(extract_text(&element)))
            }
            "pre" => Some(Block::Code(tidy_code(&element.text().collect::<String>()))),
            "table" => Some(Block::Table(element)),
            "ul" | "ol" if !has_ancestor(&element, &["li", "table"]) => Some(Block::List(element)),
            _ => None,
        };
        let Some(block) = block else {
            continue;
        };
        if has_ancestor(&element, IGNORED_TAGS) {
            continue;
        }
        let empty = match &block {
            Block::Heading { text, .. } | Block::Paragraph(text) | Block::Code(text) => {
                text.is_empty()
            }
            _ => false,
        };
        if !empty {
            blocks.push(block);
        }
    }
    blocks
}

fn first_paragraph<'b>(blocks: &'b [Block<'_>]) -> Option<&'b str> {
    blocks.iter().find_map(|block| match block {
        Block::Paragraph(text) => Some(text.as_str()),
        _ => None,
    })
}

fn extract_examples(blocks: &[Block<'_>]) -> Vec<Example> {
    let mut examples = Vec::new();
    for (idx, block) in blocks.iter().enumerate() {
        let Some(title) = block.heading_text() else {
            continue;
        };
        if !title.to_lowercase().contains("example") {
            continue;
        }

        let mut paragraphs = Vec::new();
        let mut code = None;
        for next in &blocks[idx + 1..] {
            match next {
                Block::Heading { .. } => break,
                Block::Code(snippet) => {
                    code = Some(snippet.clone());
                    break;
                }
                Block::Paragraph(text) => paragraphs.push(text.as_str()),
                Block::Table(_) | Block::List(_) => {}
            }
        }
        if paragraphs.is_empty() && code.is_none() {
            continue;
        }
        examples.push(Example {
            title: title.to_string(),
            description: paragraphs.join(" "),
            code,
        });
    }
    examples
}

fn has_ancestor(element: &ElementRef<'_>, tags: &[&str]) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| tags.contains(&ancestor.value().name()))
}

fn clean_name(raw: &str) -> String {
    raw.replace('*', "").trim().to_string()
}

fn extract_text(element: &ElementRef<'_>) -> String {
    let mut raw = String::new();
    for piece in element.text() {
        raw.push_str(piece);
    }
    collapse_whitespace(&raw)
}

fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim().to_string()
}

fn tidy_code(input: &str) -> String {
    let lines: Vec<&str> = input.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|line| !line.is_empty());
    let end = lines.iter().rposition(|line| !line.is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}
