//! Display-safe rendering of log messages
//!
//! Rendering runs in a fixed order: escape the raw message, then wrap
//! semantic matches (severity words, success words, IPs, timestamps), then
//! wrap matches of the active filter text. Highlighting only ever touches text
//! between tags, and never splits an entity like `&lt;`.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static ERROR_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(error|failed|exception|warning|warn|critical)\b").expect("valid regex")
});

static SUCCESS_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(success|completed|started|listening on|ready)\b").expect("valid regex")
});

static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}(:\d+)?\b").expect("valid regex")
});

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}([.,]\d{3})?(Z|[+-]\d{2}:?\d{2})?\b")
        .expect("valid regex")
});

static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(?:amp|lt|gt|quot|#39);").expect("valid regex"));

static SPAN_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^<span class="([a-z-]+)">$"#).expect("valid regex"));

/// Presentation marker wrapped around a highlighted match
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HighlightClass {
    Error,
    Success,
    Ip,
    Timestamp,
    Search,
}

impl HighlightClass {
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Error => "log-highlight-error",
            Self::Success => "log-highlight-success",
            Self::Ip => "log-highlight-ip",
            Self::Timestamp => "log-highlight-timestamp",
            Self::Search => "log-search-highlight",
        }
    }

    pub fn from_css_class(class: &str) -> Option<Self> {
        match class {
            "log-highlight-error" => Some(Self::Error),
            "log-highlight-success" => Some(Self::Success),
            "log-highlight-ip" => Some(Self::Ip),
            "log-highlight-timestamp" => Some(Self::Timestamp),
            "log-search-highlight" => Some(Self::Search),
            _ => None,
        }
    }

    fn open_tag(&self) -> String {
        format!(r#"<span class="{}">"#, self.css_class())
    }
}

const CLOSE_TAG: &str = "</span>";

/// Escape every markup-significant character
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse of [`escape_html`]
pub fn unescape_html(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| match &caps[0] {
            "&amp;" => "&",
            "&lt;" => "<",
            "&gt;" => ">",
            "&quot;" => "\"",
            _ => "'",
        })
        .into_owned()
}

/// Wrap severity, success, address and timestamp matches in an escaped message
pub fn highlight_content(escaped: &str) -> String {
    let mut markup = wrap_matches(escaped, &ERROR_TERMS, HighlightClass::Error);
    markup = wrap_matches(&markup, &SUCCESS_TERMS, HighlightClass::Success);
    markup = wrap_matches(&markup, &IPV4, HighlightClass::Ip);
    wrap_matches(&markup, &TIMESTAMP, HighlightClass::Timestamp)
}

/// Wrap matches of the filter text in already-highlighted markup
pub fn highlight_search(markup: &str, filter_text: &str) -> String {
    match search_regex(filter_text) {
        Some(re) => wrap_matches(markup, &re, HighlightClass::Search),
        None => markup.to_string(),
    }
}

/// Full pipeline for a single message; prefer [`Highlighter`] when rendering many
pub fn render(message: &str, filter_text: &str) -> String {
    Highlighter::new(filter_text).render(message)
}

/// Build the search pattern; it runs against escaped text so the filter is escaped too
fn search_regex(filter_text: &str) -> Option<Regex> {
    if filter_text.is_empty() {
        return None;
    }
    let pattern = format!("(?i){}", regex::escape(&escape_html(filter_text)));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            debug!(error = %e, "search highlight disabled for this filter");
            None
        }
    }
}

/// Per-filter renderer that runs the full pipeline
#[derive(Clone, Debug, Default)]
pub struct Highlighter {
    search: Option<Regex>,
}

impl Highlighter {
    pub fn new(filter_text: &str) -> Self {
        Self {
            search: search_regex(filter_text),
        }
    }

    /// Escape, highlight, then mark search hits
    pub fn render(&self, message: &str) -> String {
        let escaped = escape_html(message);
        let highlighted = highlight_content(&escaped);
        match &self.search {
            Some(re) => wrap_matches(&highlighted, re, HighlightClass::Search),
            None => highlighted,
        }
    }
}

/// Apply `re` to the text between tags, wrapping each match in `class`
fn wrap_matches(markup: &str, re: &Regex, class: HighlightClass) -> String {
    let mut out = String::with_capacity(markup.len() + 32);
    for token in tokenize(markup) {
        match token {
            Token::Tag(tag) => out.push_str(tag),
            Token::Text(text) => wrap_text(text, re, class, &mut out),
        }
    }
    out
}

fn wrap_text(text: &str, re: &Regex, class: HighlightClass, out: &mut String) {
    let entities: Vec<Range<usize>> = ENTITY.find_iter(text).map(|m| m.range()).collect();
    let splits_entity = |pos: usize| entities.iter().any(|e| pos > e.start && pos < e.end);

    let mut last = 0;
    for m in re.find_iter(text) {
        if m.is_empty() || splits_entity(m.start()) || splits_entity(m.end()) {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(&class.open_tag());
        out.push_str(m.as_str());
        out.push_str(CLOSE_TAG);
        last = m.end();
    }
    out.push_str(&text[last..]);
}

enum Token<'a> {
    Tag(&'a str),
    Text(&'a str),
}

/// Split markup into tags and text; after escaping, any `<` starts one of our tags
fn tokenize(markup: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = markup;
    while !rest.is_empty() {
        match rest.find('<') {
            Some(0) => {
                let end = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
                tokens.push(Token::Tag(&rest[..end]));
                rest = &rest[end..];
            }
            Some(i) => {
                tokens.push(Token::Text(&rest[..i]));
                rest = &rest[i..];
            }
            None => {
                tokens.push(Token::Text(rest));
                rest = "";
            }
        }
    }
    tokens
}

/// A run of plain text with the markers that enclose it (outermost first)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkupSegment {
    pub text: String,
    pub classes: Vec<HighlightClass>,
}

/// Decode rendered markup back into styled text runs
///
/// Unknown tags are dropped; text is unescaped.
pub fn parse_markup(markup: &str) -> Vec<MarkupSegment> {
    let mut segments: Vec<MarkupSegment> = Vec::new();
    let mut stack: Vec<Option<HighlightClass>> = Vec::new();

    for token in tokenize(markup) {
        match token {
            Token::Tag(CLOSE_TAG) => {
                stack.pop();
            }
            Token::Tag(tag) => {
                let class = SPAN_OPEN
                    .captures(tag)
                    .and_then(|caps| HighlightClass::from_css_class(&caps[1]));
                stack.push(class);
            }
            Token::Text(text) => {
                let classes: Vec<HighlightClass> = stack.iter().flatten().copied().collect();
                let text = unescape_html(text);
                match segments.last_mut() {
                    Some(last) if last.classes == classes => last.text.push_str(&text),
                    _ => segments.push(MarkupSegment { text, classes }),
                }
            }
        }
    }

    segments
}
