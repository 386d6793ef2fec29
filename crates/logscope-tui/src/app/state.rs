use std::collections::HashSet;
use std::ops::Range;

use logscope_logs::LevelFilter;
use logscope_stream::ContainerLogs;
use logscope_types::ArcLogEntry;
use tracing::debug;

/// Lines moved by a page up/down
const PAGE: usize = 20;

/// Which prompt, if any, owns the keyboard
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    Filter,
    Container,
}

/// UI-specific transient state
pub struct UiState {
    pub input_mode: InputMode,

    /// Text typed into the open prompt
    pub input: String,

    /// Why the last filter could not be applied
    pub filter_error: Option<String>,

    pub help_visible: bool,

    /// Selected entry, as an index into the filtered view
    pub selected: usize,

    /// First entry drawn in the log pane
    pub offset: usize,

    pub show_timestamps: bool,

    /// Ids of entries shown in full
    pub expanded: HashSet<u64>,

    /// Notice shown in the banner until dismissed (export results, command errors)
    pub message: Option<String>,

    /// Stream error the user has already dismissed
    pub dismissed_error: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            input_mode: InputMode::Normal,
            input: String::new(),
            filter_error: None,
            help_visible: false,
            selected: 0,
            offset: 0,
            show_timestamps: true,
            expanded: HashSet::new(),
            message: None,
            dismissed_error: None,
        }
    }
}

/// Global application state
pub struct AppState {
    /// The container log view being displayed
    pub logs: ContainerLogs,

    /// Container selected on the command line or through the prompt
    pub container: Option<String>,

    pub ui: UiState,

    /// Whether app should quit
    pub should_quit: bool,

    /// Dirty flag for rendering - only render when true
    pub render_dirty: bool,
}

impl AppState {
    pub fn new(logs: ContainerLogs, container: Option<String>) -> Self {
        Self {
            logs,
            container,
            ui: UiState::default(),
            should_quit: false,
            render_dirty: true,
        }
    }

    pub fn level(&self) -> LevelFilter {
        self.logs.filter().level()
    }

    /// Open the filter prompt, pre-filled with the active filter text
    pub fn open_filter(&mut self) {
        self.ui.input_mode = InputMode::Filter;
        self.ui.input = self.logs.filter().text().to_string();
        self.ui.filter_error = None;
    }

    /// Open the container prompt, pre-filled with the current container
    pub fn open_container_prompt(&mut self) {
        self.ui.input_mode = InputMode::Container;
        self.ui.input = self.container.clone().unwrap_or_default();
    }

    pub fn cancel_input(&mut self) {
        self.ui.input_mode = InputMode::Normal;
        self.ui.input.clear();
        self.ui.filter_error = None;
    }

    pub fn input_char(&mut self, c: char) {
        self.ui.input.push(c);
    }

    pub fn input_backspace(&mut self) {
        self.ui.input.pop();
    }

    pub fn input_clear(&mut self) {
        self.ui.input.clear();
    }

    /// Commit the open prompt
    ///
    /// Returns the container to stream when the container prompt was submitted.
    pub fn submit_input(&mut self) -> Option<String> {
        match self.ui.input_mode {
            InputMode::Normal => None,
            InputMode::Filter => {
                let text = self.ui.input.clone();
                if self.set_filter(&text, self.level()) {
                    self.ui.input_mode = InputMode::Normal;
                    self.ui.input.clear();
                }
                None
            }
            InputMode::Container => {
                let name = self.ui.input.trim().to_string();
                if name.is_empty() {
                    self.show_message("Container name is required".to_string());
                    return None;
                }
                self.ui.input_mode = InputMode::Normal;
                self.ui.input.clear();
                self.container = Some(name.clone());
                Some(name)
            }
        }
    }

    /// Drop the text filter, keeping the level
    pub fn clear_filter(&mut self) {
        self.set_filter("", self.level());
    }

    pub fn cycle_level(&mut self, forward: bool) {
        let level = if forward {
            self.level().next()
        } else {
            self.level().prev()
        };
        let text = self.logs.filter().text().to_string();
        self.set_filter(&text, level);
    }

    fn set_filter(&mut self, text: &str, level: LevelFilter) -> bool {
        match self.logs.set_filter(text, level) {
            Ok(()) => {
                self.ui.filter_error = None;
                self.ui.selected = 0;
                self.ui.offset = 0;
                true
            }
            Err(e) => {
                debug!(filter = text, error = %e, "rejected filter");
                self.ui.filter_error = Some(format!("Invalid filter: {}", e));
                false
            }
        }
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.logs.set_auto_scroll(false);
        self.ui.selected = self.ui.selected.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.logs.set_auto_scroll(false);
        // Clamped to the filtered view when drawn
        self.ui.selected = self.ui.selected.saturating_add(n);
    }

    pub fn page_up(&mut self) {
        self.scroll_up(PAGE);
    }

    pub fn page_down(&mut self) {
        self.scroll_down(PAGE);
    }

    pub fn scroll_to_top(&mut self) {
        self.logs.set_auto_scroll(false);
        self.ui.selected = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.logs.set_auto_scroll(false);
        self.ui.selected = usize::MAX;
    }

    pub fn toggle_auto_scroll(&mut self) {
        let follow = !self.logs.auto_scroll();
        self.logs.set_auto_scroll(follow);
    }

    pub fn toggle_timestamps(&mut self) {
        self.ui.show_timestamps = !self.ui.show_timestamps;
    }

    /// Expand or collapse the selected entry, if it is long enough to need it
    pub fn toggle_expand(&mut self, view: &[ArcLogEntry]) {
        let Some(entry) = view.get(self.ui.selected.min(view.len().saturating_sub(1))) else {
            return;
        };
        if !entry.is_expandable() {
            return;
        }
        if !self.ui.expanded.remove(&entry.id) {
            self.ui.expanded.insert(entry.id);
        }
    }

    pub fn is_expanded(&self, entry: &ArcLogEntry) -> bool {
        self.ui.expanded.contains(&entry.id)
    }

    /// Forget per-entry view state after the buffer was cleared or replaced
    pub fn reset_view(&mut self) {
        self.ui.selected = 0;
        self.ui.offset = 0;
        self.ui.expanded.clear();
        self.logs.set_auto_scroll(true);
    }

    /// Pick the entries to draw given each entry's height in lines
    ///
    /// Keeps the selection on screen; in follow mode the selection tracks the
    /// newest entry.
    pub fn viewport(&mut self, heights: &[usize], height: usize) -> Range<usize> {
        let total = heights.len();
        if total == 0 {
            self.ui.selected = 0;
            self.ui.offset = 0;
            return 0..0;
        }

        self.ui.selected = if self.logs.auto_scroll() {
            total - 1
        } else {
            self.ui.selected.min(total - 1)
        };

        let selected = self.ui.selected;
        let mut offset = self.ui.offset.min(selected);
        while offset < selected && heights[offset..=selected].iter().sum::<usize>() > height {
            offset += 1;
        }

        let mut end = offset;
        let mut used = 0;
        while end < total && (end == offset || used + heights[end] <= height) {
            used += heights[end];
            end += 1;
        }

        self.ui.offset = offset;
        offset..end
    }

    pub fn show_message(&mut self, msg: String) {
        self.ui.message = Some(msg);
    }

    /// Close the banner: a UI notice first, then the stream's last error
    pub fn dismiss_message(&mut self) {
        if self.ui.message.take().is_none() {
            self.ui.dismissed_error = self.logs.last_error();
        }
    }
}
