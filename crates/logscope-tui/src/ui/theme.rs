use ratatui::style::{Color, Modifier, Style};

use logscope_logs::HighlightClass;
use logscope_types::{ConnectionState, EntryKind};

/// Color theme for the application
pub struct Theme;

impl Theme {
    // Base colors
    pub const BG: Color = Color::Reset;
    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;

    // Accent colors
    pub const PRIMARY: Color = Color::Cyan;
    pub const HIGHLIGHT: Color = Color::Yellow;

    // Status colors
    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;

    pub fn border() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(Self::HIGHLIGHT)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        Style::default().fg(Self::FG)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn text_highlight() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    /// Row marker for the selected entry
    pub fn selected() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn status_bar() -> Style {
        Style::default().fg(Self::FG).bg(Color::DarkGray)
    }

    pub fn status_bar_key() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error() -> Style {
        Style::default()
            .fg(Self::ERROR)
            .add_modifier(Modifier::BOLD)
    }

    /// Style for a highlight marker in a rendered message
    pub fn highlight(class: HighlightClass) -> Style {
        match class {
            HighlightClass::Error => Style::default()
                .fg(Self::ERROR)
                .add_modifier(Modifier::BOLD),
            HighlightClass::Success => Style::default().fg(Self::SUCCESS),
            HighlightClass::Ip => Style::default().fg(Color::Magenta),
            HighlightClass::Timestamp => Style::default().fg(Color::Blue),
            HighlightClass::Search => Style::default()
                .fg(Color::Black)
                .bg(Self::HIGHLIGHT)
                .add_modifier(Modifier::BOLD),
        }
    }

    /// Base style for an entry's message
    pub fn message(kind: EntryKind) -> Style {
        match kind {
            EntryKind::Error | EntryKind::LogStderr => Style::default().fg(Color::LightRed),
            EntryKind::System => Style::default().fg(Color::Gray),
            _ => Self::text(),
        }
    }

    /// Style for an entry's kind label
    pub fn kind_label(kind: EntryKind) -> Style {
        let color = match kind {
            EntryKind::System => Self::PRIMARY,
            EntryKind::Error | EntryKind::LogStderr => Self::ERROR,
            EntryKind::StreamStarted => Self::SUCCESS,
            EntryKind::StreamStopped => Self::WARNING,
            EntryKind::LogLine => Self::FG,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn connection(state: ConnectionState) -> Style {
        let color = match state {
            ConnectionState::Streaming => Self::SUCCESS,
            ConnectionState::AwaitingToken
            | ConnectionState::Connecting
            | ConnectionState::Reconnecting => Self::WARNING,
            ConnectionState::Stopped => Self::ERROR,
            ConnectionState::Idle => Self::FG_DIM,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }
}
