use ratatui::layout::{Constraint, Direction, Layout as RatatuiLayout, Rect};

/// Areas of the log viewer screen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewerAreas {
    pub header: Rect,
    pub banner: Option<Rect>,
    pub input: Option<Rect>,
    pub logs: Rect,
    pub status: Rect,
}

/// Layout helper for consistent screen layouts
pub struct Layout;

impl Layout {
    /// Header, optional banner, optional input bar, logs, status bar
    pub fn log_viewer(area: Rect, show_banner: bool, show_input: bool) -> ViewerAreas {
        let mut constraints = vec![Constraint::Length(3)];
        if show_banner {
            constraints.push(Constraint::Length(3));
        }
        if show_input {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Min(1));
        constraints.push(Constraint::Length(1));

        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        let mut idx = 0;
        let mut next = || {
            let rect = chunks[idx];
            idx += 1;
            rect
        };

        let header = next();
        let banner = show_banner.then(&mut next);
        let input = show_input.then(&mut next);
        let logs = next();
        let status = next();

        ViewerAreas {
            header,
            banner,
            input,
            logs,
            status,
        }
    }

    /// Centered popup of at most `width` x `height`
    pub fn popup(area: Rect, width: u16, height: u16) -> Rect {
        let width = width.min(area.width.saturating_sub(4));
        let height = height.min(area.height.saturating_sub(4));
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        Rect::new(x, y, width, height)
    }
}
