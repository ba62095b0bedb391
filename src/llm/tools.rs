use crate::domain::chat::ToolDefinition;
use serde_json::{json, Value};

pub const GET_PAGE_TEXT: &str = "get_page_text";
pub const SEARCH_TEXT: &str = "search_text";
pub const GET_TEXT_AROUND: &str = "get_text_around";
pub const SUBMIT_INVOICE: &str = "submit_invoice";

const MAX_SEARCH_RESULTS: usize = 20;
const MAX_SNIPPETS: usize = 5;
const DEFAULT_CONTEXT_CHARS: usize = 200;
const MIN_CONTEXT_CHARS: usize = 20;
const MAX_CONTEXT_CHARS: usize = 2000;

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::function(
            GET_PAGE_TEXT,
            "Return the full text of one page of the document.",
            json!({
                "type": "object",
                "properties": {
                    "page": { "type": "integer", "description": "1-based page number" }
                },
                "required": ["page"]
            }),
        ),
        ToolDefinition::function(
            SEARCH_TEXT,
            "Case-insensitive search; returns matching lines with page and line numbers.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" }
                },
                "required": ["query"]
            }),
        ),
        ToolDefinition::function(
            GET_TEXT_AROUND,
            "Return the text surrounding each occurrence of a phrase.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "chars": {
                        "type": "integer",
                        "description": "characters of context on each side (default 200)"
                    }
                },
                "required": ["query"]
            }),
        ),
        ToolDefinition::function(
            SUBMIT_INVOICE,
            "Submit the final structured invoice. Call exactly once.",
            invoice_schema(),
        ),
    ]
}

fn invoice_schema() -> Value {
    let nullable_string = json!({ "type": ["string", "null"] });
    let nullable_number = json!({ "type": ["number", "null"] });
    json!({
        "type": "object",
        "properties": {
            "invoice_date": { "type": ["string", "null"], "description": "YYYY-MM-DD" },
            "supplier_name": nullable_string,
            "invoice_number": nullable_string,
            "total_amount": nullable_number,
            "gst_amount": nullable_number,
            "currency": { "type": ["string", "null"], "description": "ISO 4217 code" },
            "gst_number": nullable_string,
            "due_date": { "type": ["string", "null"], "description": "YYYY-MM-DD" },
            "notes": nullable_string,
            "entries": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "label": { "type": "string" },
                        "amount": nullable_number,
                        "type": { "type": "string" },
                        "attrs": { "type": "object" }
                    },
                    "required": ["label", "amount"]
                }
            }
        },
        "required": ["entries"]
    })
}

/// Runs the investigation tools against the document text.
pub struct ToolDispatcher<'a> {
    full_text: &'a str,
    pages: &'a [String],
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(full_text: &'a str, pages: &'a [String]) -> Self {
        Self { full_text, pages }
    }

    /// Always produces a tool result; problems are reported to the model as text.
    pub fn dispatch(&self, name: &str, args: &Value) -> String {
        match name {
            GET_PAGE_TEXT => match args.get("page").and_then(as_index) {
                Some(page) => self.get_page_text(page),
                None => "Error: 'page' must be a positive integer".to_string(),
            },
            SEARCH_TEXT => match query_arg(args) {
                Some(query) => self.search_text(query),
                None => "Error: 'query' must be a non-empty string".to_string(),
            },
            GET_TEXT_AROUND => match query_arg(args) {
                Some(query) => {
                    let chars = args
                        .get("chars")
                        .and_then(as_index)
                        .unwrap_or(DEFAULT_CONTEXT_CHARS)
                        .clamp(MIN_CONTEXT_CHARS, MAX_CONTEXT_CHARS);
                    self.get_text_around(query, chars)
                }
                None => "Error: 'query' must be a non-empty string".to_string(),
            },
            other => format!("Error: unknown tool '{}'", other),
        }
    }

    pub fn get_page_text(&self, page: usize) -> String {
        match page.checked_sub(1).and_then(|i| self.pages.get(i)) {
            Some(text) => text.clone(),
            None => format!(
                "Error: page {} out of range (document has {} page{})",
                page,
                self.pages.len(),
                if self.pages.len() == 1 { "" } else { "s" }
            ),
        }
    }

    pub fn search_text(&self, query: &str) -> String {
        let needle = query.to_lowercase();
        let mut hits = Vec::new();

        'pages: for (page_idx, page) in self.pages.iter().enumerate() {
            for (line_idx, line) in page.lines().enumerate() {
                if line.to_lowercase().contains(&needle) {
                    hits.push(format!("[page {}, line {}] {}", page_idx + 1, line_idx + 1, line.trim()));
                    if hits.len() >= MAX_SEARCH_RESULTS {
                        break 'pages;
                    }
                }
            }
        }

        if hits.is_empty() {
            format!("No matches for \"{}\"", query)
        } else {
            hits.join("\n")
        }
    }

    pub fn get_text_around(&self, query: &str, chars: usize) -> String {
        let haystack: Vec<char> = self.full_text.chars().collect();
        let lower: Vec<char> = haystack.iter().flat_map(|c| c.to_lowercase()).collect();
        let needle: Vec<char> = query.to_lowercase().chars().collect();

        // to_lowercase 可能改變長度，對不上時退回逐字比對
        let search_space = if lower.len() == haystack.len() { &lower } else { &haystack };

        let mut snippets = Vec::new();
        let mut i = 0;
        while i + needle.len() <= search_space.len() && snippets.len() < MAX_SNIPPETS {
            if search_space[i..i + needle.len()] == needle[..] {
                let start = i.saturating_sub(chars);
                let end = (i + needle.len() + chars).min(haystack.len());
                let snippet: String = haystack[start..end].iter().collect();
                snippets.push(format!("...{}...", snippet));
                i += needle.len();
            } else {
                i += 1;
            }
        }

        if snippets.is_empty() {
            format!("No matches for \"{}\"", query)
        } else {
            snippets.join("\n\n")
        }
    }
}

fn as_index(value: &Value) -> Option<usize> {
    let index = match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    index.filter(|n| *n > 0)
}

fn query_arg(args: &Value) -> Option<&str> {
    args.get("query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages() -> Vec<String> {
        vec![
            "Mercury Energy\nInvoice INV-1042\nDate 1 Aug 2024".to_string(),
            "Usage charge 278 kWh $99.66\nGST 15% $37.24\nTotal due $285.50".to_string(),
        ]
    }

    #[test]
    fn test_get_page_text() {
        let pages = pages();
        let full = pages.join("\n\n");
        let tools = ToolDispatcher::new(&full, &pages);

        assert!(tools.dispatch(GET_PAGE_TEXT, &json!({"page": 2})).contains("$285.50"));
        assert!(tools.dispatch(GET_PAGE_TEXT, &json!({"page": "1"})).contains("INV-1042"));
        assert_eq!(
            tools.dispatch(GET_PAGE_TEXT, &json!({"page": 3})),
            "Error: page 3 out of range (document has 2 pages)"
        );
        assert!(tools.dispatch(GET_PAGE_TEXT, &json!({"page": 0})).starts_with("Error"));
    }

    #[test]
    fn test_search_text_reports_page_and_line() {
        let pages = pages();
        let full = pages.join("\n\n");
        let tools = ToolDispatcher::new(&full, &pages);

        let result = tools.dispatch(SEARCH_TEXT, &json!({"query": "gst"}));
        assert_eq!(result, "[page 2, line 2] GST 15% $37.24");

        let none = tools.dispatch(SEARCH_TEXT, &json!({"query": "water"}));
        assert_eq!(none, "No matches for \"water\"");
    }

    #[test]
    fn test_get_text_around_clamps_context() {
        let pages = pages();
        let full = pages.join("\n\n");
        let tools = ToolDispatcher::new(&full, &pages);

        let result = tools.dispatch(GET_TEXT_AROUND, &json!({"query": "Total due", "chars": 1}));
        // chars 下限為 20
        assert!(result.contains("GST 15% $37.24"));
        assert!(result.contains("$285.50"));
    }

    #[test]
    fn test_unknown_tool_and_bad_args() {
        let pages = pages();
        let tools = ToolDispatcher::new("", &pages);
        assert_eq!(tools.dispatch("delete_everything", &json!({})), "Error: unknown tool 'delete_everything'");
        assert!(tools.dispatch(SEARCH_TEXT, &json!({"query": "  "})).starts_with("Error"));
    }

    #[test]
    fn test_definitions_cover_all_tools() {
        let names: Vec<String> = tool_definitions().into_iter().map(|t| t.function.name).collect();
        assert_eq!(names, vec![GET_PAGE_TEXT, SEARCH_TEXT, GET_TEXT_AROUND, SUBMIT_INVOICE]);
    }
}
