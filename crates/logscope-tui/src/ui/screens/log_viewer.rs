use chrono::Local;
use ratatui::{
    Frame,
    layout::{Alignment, Margin, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use unicode_width::UnicodeWidthStr;

use logscope_logs::LogSummary;
use logscope_types::{ArcLogEntry, ConnectionSnapshot};

use crate::app::{AppState, InputMode};
use crate::ui::components::{StatusBar, viewer_hints};
use crate::ui::markup::{markup_lines, truncate_spans, wrap_spans};
use crate::ui::{Layout, Theme};

/// Log viewer screen
pub struct LogViewerScreen;

impl LogViewerScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState) {
        let snapshot = state.logs.snapshot();
        let summary = state.logs.summary();

        // A notice from the UI wins over the stream's last error
        let banner = match (&state.ui.message, &snapshot.last_error) {
            (Some(msg), _) => Some((msg.clone(), Theme::text_highlight())),
            (None, Some(err)) if state.ui.dismissed_error.as_ref() != Some(err) => {
                Some((err.clone(), Theme::error()))
            }
            (None, _) => None,
        };
        let show_input = state.ui.input_mode != InputMode::Normal
            || state.ui.filter_error.is_some()
            || state.logs.filter().has_text();

        let areas = Layout::log_viewer(frame.area(), banner.is_some(), show_input);

        Self::render_header(frame, areas.header, state, &snapshot, &summary);
        if let (Some(area), Some((text, style))) = (areas.banner, banner) {
            Self::render_banner(frame, area, text, style);
        }
        if let Some(area) = areas.input {
            Self::render_input_bar(frame, area, state);
        }
        Self::render_logs(frame, areas.logs, state, &summary);
        Self::render_status_bar(frame, areas.status, state);
    }

    fn render_header(
        frame: &mut Frame,
        area: Rect,
        state: &AppState,
        snapshot: &ConnectionSnapshot,
        summary: &LogSummary,
    ) {
        let mut status = summary.status.to_string();
        if snapshot.attempt > 0 {
            status.push_str(&format!(" ({})", snapshot.attempt));
        }

        let title = Line::from(vec![
            Span::styled("logscope", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(summary.active.clone(), Theme::text_highlight()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(status, Theme::connection(snapshot.state)),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(format!("level: {}", state.level().label()), Theme::text()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(
                format!("{} lines, {} shown", summary.lines, summary.shown),
                Theme::text(),
            ),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(
                format!("{} errors", summary.errors),
                if summary.errors > 0 {
                    Theme::error()
                } else {
                    Theme::text()
                },
            ),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(format!("last {}", summary.last_label()), Theme::text_dim()),
        ]);

        let header = Paragraph::new(title).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );
        frame.render_widget(header, area);
    }

    fn render_banner(frame: &mut Frame, area: Rect, text: String, style: Style) {
        let banner = Paragraph::new(Line::from(vec![
            Span::styled(" ⚠ ", style),
            Span::styled(text, style),
            Span::styled("  [Esc] Dismiss", Theme::text_dim()),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(style),
        );
        frame.render_widget(banner, area);
    }

    fn render_input_bar(frame: &mut Frame, area: Rect, state: &AppState) {
        let active = state.ui.input_mode != InputMode::Normal;
        let mut spans = vec![];

        let (title, prompt) = match state.ui.input_mode {
            InputMode::Container => (" Container ", " container: "),
            InputMode::Filter => (" Search/Filter ", " /"),
            InputMode::Normal => (" Search/Filter ", " Filter: "),
        };
        spans.push(Span::styled(
            prompt,
            if active {
                Theme::text_highlight()
            } else {
                Theme::text_dim()
            },
        ));

        let text = if active {
            state.ui.input.as_str()
        } else {
            state.logs.filter().text()
        };
        spans.push(Span::styled(text.to_string(), Theme::text_highlight()));

        if active {
            spans.push(Span::styled(
                "█",
                Style::default()
                    .fg(Theme::HIGHLIGHT)
                    .add_modifier(Modifier::SLOW_BLINK),
            ));
        }

        if let Some(err) = &state.ui.filter_error {
            spans.push(Span::styled(format!("  ⚠ {}", err), Theme::error()));
        }

        if active {
            spans.push(Span::styled("  [Enter] Apply  [Esc] Cancel", Theme::text_dim()));
        } else {
            spans.push(Span::styled("  [n] Clear  [/] Edit", Theme::text_dim()));
        }

        let border = if active {
            Theme::border_focused()
        } else if state.ui.filter_error.is_some() {
            Theme::error()
        } else {
            Theme::border()
        };

        let bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(Span::styled(title, Theme::title())),
        );
        frame.render_widget(bar, area);
    }

    fn render_logs(frame: &mut Frame, area: Rect, state: &mut AppState, summary: &LogSummary) {
        let entries = state.logs.filtered();

        let title = if state.logs.filter().is_empty() {
            format!(" Logs ({}) ", summary.lines)
        } else {
            format!(" Logs ({} of {}) ", entries.len(), summary.lines)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border())
            .title(Span::styled(title, Theme::title()));
        let inner = block.inner(area);

        if entries.is_empty() {
            let empty = if summary.lines == 0 {
                "No logs available"
            } else {
                "No logs match the current filters"
            };
            let widget = Paragraph::new(Line::from(Span::styled(empty, Theme::text_dim())))
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(widget, area);
            return;
        }

        // Leave a column for the scrollbar
        let width = inner.width.saturating_sub(1) as usize;

        // Expanded entries wrap, so their height depends on the pane width
        let view: &AppState = state;
        let heights: Vec<usize> = entries
            .iter()
            .map(|e| {
                if view.is_expanded(e) {
                    Self::format_entry(e, false, view, width).len()
                } else {
                    1
                }
            })
            .collect();
        let window = state.viewport(&heights, inner.height as usize);
        let state: &AppState = state;
        let lines: Vec<Line> = window
            .clone()
            .flat_map(|i| Self::format_entry(&entries[i], i == state.ui.selected, state, width))
            .collect();

        frame.render_widget(Paragraph::new(lines).block(block), area);

        if window.len() < entries.len() {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));
            let mut scrollbar_state = ScrollbarState::default()
                .content_length(entries.len())
                .position(state.ui.selected);
            frame.render_stateful_widget(
                scrollbar,
                area.inner(Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }
    }

    /// One entry as display lines: marker, time, kind label, highlighted message
    fn format_entry(
        entry: &ArcLogEntry,
        selected: bool,
        state: &AppState,
        width: usize,
    ) -> Vec<Line<'static>> {
        let mut prefix = vec![if selected {
            Span::styled("▶ ", Theme::selected())
        } else {
            Span::raw("  ")
        }];

        if state.ui.show_timestamps {
            let time = entry.timestamp.with_timezone(&Local).format("%H:%M:%S");
            prefix.push(Span::styled(format!("[{}] ", time), Theme::text_dim()));
        }

        if let Some(label) = entry.kind.label() {
            prefix.push(Span::styled(format!("{:<7} ", label), Theme::kind_label(entry.kind)));
        }

        let expanded = state.is_expanded(entry);
        if entry.is_expandable() {
            prefix.push(Span::styled(if expanded { "▾ " } else { "▸ " }, Theme::text_dim()));
        }

        let prefix_width: usize = prefix.iter().map(|s| s.content.width()).sum();
        let message_width = width.saturating_sub(prefix_width);

        let markup = state.logs.markup(entry);
        let mut message_lines = markup_lines(&markup, Theme::message(entry.kind)).into_iter();
        let first = message_lines.next().unwrap_or_default();

        if expanded {
            let indent = " ".repeat(prefix_width);
            let mut rows = std::iter::once(first)
                .chain(message_lines)
                .flat_map(|line| wrap_spans(line, message_width));
            let mut lines = vec![Line::from([prefix, rows.next().unwrap_or_default()].concat())];
            for row in rows {
                let mut spans = vec![Span::raw(indent.clone())];
                spans.extend(row);
                lines.push(Line::from(spans));
            }
            return lines;
        }

        let mut first = truncate_spans(first, message_width);
        if message_lines.next().is_some() {
            first.push(Span::styled(" …", Theme::text_dim()));
        }
        vec![Line::from([prefix, first].concat())]
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState) {
        let follow = if state.logs.auto_scroll() {
            "follow ▼"
        } else {
            "paused"
        };
        let right = format!("{} │ {}", state.level().label(), follow);

        let bar = StatusBar::new()
            .hints(viewer_hints(state.ui.input_mode))
            .right(right);
        frame.render_widget(bar, area);
    }
}
