// src/ingest/mod.rs
pub mod providers;
pub mod types;

pub use types::{Article, FetchOutcome, FetchQuery, NewsSource, RawArticle, SkipReason, SortOrder};

/// Clean a headline for display: decode HTML entities, fold whitespace, trim.
/// Identity (fingerprinting) always uses the raw title, never this output.
pub fn normalize_title(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("static regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}
