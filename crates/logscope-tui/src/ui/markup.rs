//! Rendered-message markup to terminal spans

use ratatui::style::Style;
use ratatui::text::Span;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use logscope_logs::parse_markup;

use crate::ui::Theme;

/// Turn highlight markup into styled lines, split at newlines
///
/// Marker styles are patched over `base`, innermost last.
pub fn markup_lines(markup: &str, base: Style) -> Vec<Vec<Span<'static>>> {
    let mut lines: Vec<Vec<Span<'static>>> = vec![Vec::new()];

    for segment in parse_markup(markup) {
        let style = segment
            .classes
            .iter()
            .fold(base, |style, class| style.patch(Theme::highlight(*class)));

        for (i, part) in segment.text.split('\n').enumerate() {
            if i > 0 {
                lines.push(Vec::new());
            }
            if !part.is_empty() {
                let part = part.trim_end_matches('\r').replace('\t', "    ");
                if let Some(line) = lines.last_mut() {
                    line.push(Span::styled(part, style));
                }
            }
        }
    }

    lines
}

/// Cut spans to at most `width` columns, ending with an ellipsis if anything was cut
pub fn truncate_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Span<'static>> {
    let total: usize = spans.iter().map(|s| s.content.width()).sum();
    if total <= width {
        return spans;
    }

    let budget = width.saturating_sub(1);
    let mut used = 0;
    let mut out = Vec::new();

    for span in spans {
        if used >= budget {
            break;
        }
        let span_width = span.content.width();
        if used + span_width <= budget {
            used += span_width;
            out.push(span);
            continue;
        }

        let mut cut = String::new();
        for c in span.content.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > budget {
                break;
            }
            used += w;
            cut.push(c);
        }
        out.push(Span::styled(cut, span.style));
        break;
    }

    if width > 0 {
        out.push(Span::styled("…", Theme::text_dim()));
    }
    out
}

/// Break spans into rows of at most `width` columns, keeping styles
pub fn wrap_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Vec<Span<'static>>> {
    let mut rows: Vec<Vec<Span<'static>>> = vec![Vec::new()];
    if width == 0 {
        rows[0] = spans;
        return rows;
    }

    let mut used = 0;
    for span in spans {
        let mut piece = String::new();
        for c in span.content.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > width && used > 0 {
                if !piece.is_empty() {
                    if let Some(row) = rows.last_mut() {
                        row.push(Span::styled(std::mem::take(&mut piece), span.style));
                    }
                }
                rows.push(Vec::new());
                used = 0;
            }
            used += w;
            piece.push(c);
        }
        if !piece.is_empty() {
            if let Some(row) = rows.last_mut() {
                row.push(Span::styled(piece, span.style));
            }
        }
    }
    rows
}
