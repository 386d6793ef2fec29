use regex::Regex;

use logscope_types::{ArcLogEntry, EntryKind, LogEntry};

/// Level selector for the log view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LevelFilter {
    #[default]
    All,
    /// Transport errors and container stderr
    Error,
    /// Status messages from the client itself
    System,
    /// Stream start confirmations
    Success,
}

impl LevelFilter {
    /// Check whether an entry kind passes this level
    pub fn accepts(&self, kind: EntryKind) -> bool {
        match self {
            Self::All => true,
            Self::Error => matches!(kind, EntryKind::Error | EntryKind::LogStderr),
            Self::System => kind == EntryKind::System,
            Self::Success => kind == EntryKind::StreamStarted,
        }
    }

    /// Get display label for this level
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Error => "error",
            Self::System => "system",
            Self::Success => "success",
        }
    }

    /// Cycle to the next level
    pub fn next(&self) -> Self {
        match self {
            Self::All => Self::Error,
            Self::Error => Self::System,
            Self::System => Self::Success,
            Self::Success => Self::All,
        }
    }

    /// Cycle to the previous level
    pub fn prev(&self) -> Self {
        match self {
            Self::All => Self::Success,
            Self::Error => Self::All,
            Self::System => Self::Error,
            Self::Success => Self::System,
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all" => Some(Self::All),
            "error" | "errors" => Some(Self::Error),
            "system" => Some(Self::System),
            "success" => Some(Self::Success),
            _ => None,
        }
    }
}

/// Compiled filter for log entries
///
/// The text is matched literally and case-insensitively against the message.
#[derive(Clone)]
pub struct CompiledFilter {
    /// Escaped, case-insensitive pattern (None = no text filter)
    regex: Option<Regex>,

    /// Original filter text
    text: String,

    /// Level constraint
    level: LevelFilter,
}

impl CompiledFilter {
    /// Create a new filter from filter text and a level
    pub fn new(text: &str, level: LevelFilter) -> Result<Self, regex::Error> {
        let regex = if text.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("(?i){}", regex::escape(text)))?)
        };

        Ok(Self {
            regex,
            text: text.to_string(),
            level,
        })
    }

    /// Filter that lets everything through
    pub fn everything() -> Self {
        Self {
            regex: None,
            text: String::new(),
            level: LevelFilter::All,
        }
    }

    /// Check if a log entry matches this filter
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if !self.level.accepts(entry.kind) {
            return false;
        }

        match &self.regex {
            Some(re) => re.is_match(&entry.message),
            None => true,
        }
    }

    /// Project a snapshot down to the matching entries, keeping order
    pub fn apply(&self, entries: &[ArcLogEntry]) -> Vec<ArcLogEntry> {
        entries.iter().filter(|e| self.matches(e)).cloned().collect()
    }

    /// Find all match positions in a string (for highlighting)
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        match &self.regex {
            Some(re) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            None => Vec::new(),
        }
    }

    /// Get the original filter text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Check if filter is empty (matches everything)
    pub fn is_empty(&self) -> bool {
        self.regex.is_none() && self.level == LevelFilter::All
    }

    /// Check if filter has a text pattern
    pub fn has_text(&self) -> bool {
        self.regex.is_some()
    }
}

impl Default for CompiledFilter {
    fn default() -> Self {
        Self::everything()
    }
}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("text", &self.text)
            .field("level", &self.level)
            .finish()
    }
}
