/// All possible actions in the application (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleHelp,

    // Stream commands
    StartStream(String),
    RestartStream,
    StopStream,
    ClearLogs,
    ExportLogs,

    // Prompts
    OpenFilter,
    OpenContainerPrompt,
    Input(char),
    InputBackspace,
    InputClear,
    InputSubmit,
    InputCancel,

    // Filtering
    ClearFilter,
    CycleLevel,
    CycleLevelBack,

    // Navigation
    ScrollUp(usize),
    ScrollDown(usize),
    PageUp,
    PageDown,
    ScrollToTop,
    ScrollToBottom,

    // Display toggles
    ToggleAutoScroll,
    ToggleTimestamps,
    ToggleExpand,

    // Notices
    ShowMessage(String),
    DismissMessage,

    Render,
}
