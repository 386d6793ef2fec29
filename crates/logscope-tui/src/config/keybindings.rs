use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;

use crate::app::Action;

/// A key combination
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn ctrl(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    pub fn shift(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::SHIFT,
        }
    }

    pub fn from_event(event: &KeyEvent) -> Self {
        Self {
            code: event.code,
            modifiers: event.modifiers,
        }
    }
}

/// Context for keybindings
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyContext {
    Global,
    LogViewer,
    /// Filter or container prompt is open
    Input,
}

/// Keybinding configuration
pub struct KeyBindings {
    bindings: HashMap<KeyContext, HashMap<KeyBinding, Action>>,
}

impl KeyBindings {
    pub fn new() -> Self {
        let mut bindings = HashMap::new();

        let mut global = HashMap::new();
        global.insert(KeyBinding::new(KeyCode::Char('?')), Action::ToggleHelp);
        global.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::Quit);
        global.insert(KeyBinding::new(KeyCode::Char('q')), Action::Quit);
        bindings.insert(KeyContext::Global, global);

        // less-like navigation plus stream commands
        let mut viewer = HashMap::new();
        viewer.insert(KeyBinding::new(KeyCode::Char('j')), Action::ScrollDown(1));
        viewer.insert(KeyBinding::new(KeyCode::Down), Action::ScrollDown(1));
        viewer.insert(KeyBinding::new(KeyCode::Char('k')), Action::ScrollUp(1));
        viewer.insert(KeyBinding::new(KeyCode::Up), Action::ScrollUp(1));
        viewer.insert(KeyBinding::ctrl(KeyCode::Char('d')), Action::PageDown);
        viewer.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::PageUp);
        viewer.insert(KeyBinding::new(KeyCode::PageDown), Action::PageDown);
        viewer.insert(KeyBinding::new(KeyCode::PageUp), Action::PageUp);
        viewer.insert(KeyBinding::new(KeyCode::Char('g')), Action::ScrollToTop);
        viewer.insert(KeyBinding::shift(KeyCode::Char('G')), Action::ScrollToBottom);
        viewer.insert(KeyBinding::new(KeyCode::Home), Action::ScrollToTop);
        viewer.insert(KeyBinding::new(KeyCode::End), Action::ScrollToBottom);
        viewer.insert(KeyBinding::new(KeyCode::Char('f')), Action::ToggleAutoScroll);
        viewer.insert(KeyBinding::new(KeyCode::Char('t')), Action::ToggleTimestamps);
        viewer.insert(KeyBinding::new(KeyCode::Enter), Action::ToggleExpand);
        viewer.insert(KeyBinding::new(KeyCode::Char('/')), Action::OpenFilter);
        viewer.insert(KeyBinding::new(KeyCode::Char('n')), Action::ClearFilter);
        viewer.insert(KeyBinding::new(KeyCode::Char('l')), Action::CycleLevel);
        viewer.insert(KeyBinding::shift(KeyCode::Char('L')), Action::CycleLevelBack);
        viewer.insert(KeyBinding::new(KeyCode::Char('s')), Action::RestartStream);
        viewer.insert(KeyBinding::new(KeyCode::Char('x')), Action::StopStream);
        viewer.insert(KeyBinding::new(KeyCode::Char('c')), Action::ClearLogs);
        viewer.insert(KeyBinding::new(KeyCode::Char('o')), Action::OpenContainerPrompt);
        viewer.insert(KeyBinding::new(KeyCode::Char('e')), Action::ExportLogs);
        viewer.insert(KeyBinding::new(KeyCode::Esc), Action::DismissMessage);
        bindings.insert(KeyContext::LogViewer, viewer);

        let mut input = HashMap::new();
        input.insert(KeyBinding::new(KeyCode::Enter), Action::InputSubmit);
        input.insert(KeyBinding::new(KeyCode::Esc), Action::InputCancel);
        input.insert(KeyBinding::new(KeyCode::Backspace), Action::InputBackspace);
        input.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::InputClear);
        input.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::InputCancel);
        bindings.insert(KeyContext::Input, input);

        Self { bindings }
    }

    /// Look up action for key event in given context
    pub fn get_action(&self, context: KeyContext, key: &KeyEvent) -> Option<Action> {
        let binding = KeyBinding::from_event(key);

        if let Some(action) = self
            .bindings
            .get(&context)
            .and_then(|context_bindings| context_bindings.get(&binding))
        {
            return Some(action.clone());
        }

        // Fall back to global bindings
        self.bindings
            .get(&KeyContext::Global)?
            .get(&binding)
            .cloned()
    }

    /// Handle key event while a prompt is open
    /// Returns Some(Action) for special keys and typed characters
    pub fn get_input_action(&self, key: &KeyEvent) -> Option<Action> {
        let binding = KeyBinding::from_event(key);

        if let Some(action) = self
            .bindings
            .get(&KeyContext::Input)
            .and_then(|input_bindings| input_bindings.get(&binding))
        {
            return Some(action.clone());
        }

        match key.code {
            KeyCode::Char(c)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                Some(Action::Input(c))
            }
            _ => None,
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_viewer_bindings() {
        let kb = KeyBindings::new();
        assert_eq!(
            kb.get_action(KeyContext::LogViewer, &key(KeyCode::Char('/'))),
            Some(Action::OpenFilter)
        );
        assert_eq!(
            kb.get_action(KeyContext::LogViewer, &key(KeyCode::Char('x'))),
            Some(Action::StopStream)
        );
        assert_eq!(
            kb.get_action(
                KeyContext::LogViewer,
                &KeyEvent::new(KeyCode::Char('G'), KeyModifiers::SHIFT)
            ),
            Some(Action::ScrollToBottom)
        );
    }

    #[test]
    fn test_global_fallback() {
        let kb = KeyBindings::new();
        assert_eq!(
            kb.get_action(KeyContext::LogViewer, &key(KeyCode::Char('q'))),
            Some(Action::Quit)
        );
        assert_eq!(kb.get_action(KeyContext::LogViewer, &key(KeyCode::F(5))), None);
    }

    #[test]
    fn test_input_mode_captures_characters() {
        let kb = KeyBindings::new();
        // 'q' types into the prompt instead of quitting
        assert_eq!(kb.get_input_action(&key(KeyCode::Char('q'))), Some(Action::Input('q')));
        assert_eq!(
            kb.get_input_action(&KeyEvent::new(KeyCode::Char('E'), KeyModifiers::SHIFT)),
            Some(Action::Input('E'))
        );
        assert_eq!(kb.get_input_action(&key(KeyCode::Enter)), Some(Action::InputSubmit));
        assert_eq!(kb.get_input_action(&key(KeyCode::Esc)), Some(Action::InputCancel));
        assert_eq!(
            kb.get_input_action(&KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT)),
            None
        );
    }
}
