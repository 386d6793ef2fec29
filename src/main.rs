mod config;

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use logscope_stream::{
    ConnectionHandle, ContainerLogs, HttpTokenProvider, StreamError, WebSocketTransport,
};
use logscope_tui::{
    Action, AppState, Event, EventHandler, HelpOverlay, InputMode, KeyBindings, KeyContext,
    LogViewerScreen, Tui,
};

use crate::config::{Config, Overrides};

const API_TOKEN_ENV: &str = "LOGSCOPE_API_TOKEN";

/// Logscope - follow a container's log stream in the terminal
#[derive(Parser, Debug)]
#[command(name = "logscope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Container to stream (optional, will prompt if not provided)
    #[arg(value_name = "CONTAINER")]
    container: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Base URL of the credential endpoint
    #[arg(long)]
    api_url: Option<String>,

    /// Base URL of the log streaming endpoint
    #[arg(long)]
    ws_url: Option<String>,

    /// Number of log entries kept in memory
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Diagnostic log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?.merge(Overrides {
        api_url: args.api_url,
        ws_url: args.ws_url,
        buffer_size: args.buffer_size,
        log_level: args.log_level,
        log_file: args.log_file,
    });
    config.validate()?;

    init_tracing(&config)?;

    let result = run_app(config, args.container).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level()?.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &config.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

async fn run_app(config: Config, container: Option<String>) -> Result<()> {
    let tokens = HttpTokenProvider::new(
        &config.api_url,
        &config.token_path,
        config.request_timeout(),
    )?
    .with_bearer(std::env::var(API_TOKEN_ENV).ok());
    let transport = WebSocketTransport::new(config.ws_url.clone());

    let logs = ContainerLogs::spawn(
        Arc::new(transport),
        Arc::new(tokens),
        config.reconnect_policy(),
        config.buffer_size,
    );
    let commands = Commands::new(logs.handle().clone());
    let mut events = EventHandler::new(Duration::from_millis(100), logs.handle().subscribe());

    let mut state = AppState::new(logs, None);
    let keybindings = KeyBindings::new();

    // Failures from spawned stream commands come back as banner messages
    let (message_tx, mut message_rx) = mpsc::unbounded_channel::<String>();

    let mut tui = Tui::new()?;

    match container {
        Some(name) => handle_action(&mut state, &commands, &message_tx, Action::StartStream(name)),
        None => state.open_container_prompt(),
    }

    render(&mut tui, &mut state)?;

    loop {
        tokio::select! {
            Some(event) = events.next() => {
                match event {
                    Event::Key(key) => {
                        let action = if state.ui.input_mode != InputMode::Normal {
                            keybindings.get_input_action(&key)
                        } else if state.ui.help_visible {
                            // Any key closes the overlay; quit still works
                            keybindings
                                .get_action(KeyContext::Global, &key)
                                .filter(|a| *a == Action::Quit)
                                .or(Some(Action::ToggleHelp))
                        } else {
                            keybindings.get_action(KeyContext::LogViewer, &key)
                        };
                        if let Some(action) = action {
                            handle_action(&mut state, &commands, &message_tx, action);
                        }
                    }
                    // New entries land in the buffer directly; ticks just redraw them
                    Event::Tick | Event::Resize(_, _) | Event::Status(_) => {
                        state.render_dirty = true;
                    }
                    Event::Error(e) => {
                        state.show_message(e);
                    }
                }
            }

            Some(message) = message_rx.recv() => {
                state.show_message(message);
            }
        }

        if state.should_quit {
            break;
        }

        if state.render_dirty {
            render(&mut tui, &mut state)?;
        }
    }

    events.shutdown();
    commands.shutdown().await;
    tui.restore()?;

    Ok(())
}

fn render(tui: &mut Tui, state: &mut AppState) -> Result<()> {
    tui.draw(|frame| {
        LogViewerScreen::render(frame, state);
        if state.ui.help_visible {
            HelpOverlay::render(frame);
        }
    })?;
    state.render_dirty = false;
    Ok(())
}

/// Runs stream commands off the UI loop
struct Commands {
    handle: ConnectionHandle,
}

impl Commands {
    fn new(handle: ConnectionHandle) -> Self {
        Self { handle }
    }

    fn start(&self, container: String, messages: &mpsc::UnboundedSender<String>) {
        let handle = self.handle.clone();
        let messages = messages.clone();
        tokio::spawn(async move {
            match handle.start(&container).await {
                Ok(()) => {}
                // Already reported through the connection snapshot
                Err(e @ (StreamError::Auth(_) | StreamError::Transport(_))) => {
                    warn!(container = %container, error = %e, "failed to start stream");
                }
                Err(e) => {
                    let _ = messages.send(format!("Failed to start logs: {e}"));
                }
            }
        });
    }

    fn stop(&self, messages: &mpsc::UnboundedSender<String>) {
        let handle = self.handle.clone();
        let messages = messages.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.stop().await {
                let _ = messages.send(format!("Failed to stop logs: {e}"));
            }
        });
    }

    fn clear(&self, messages: &mpsc::UnboundedSender<String>) {
        let handle = self.handle.clone();
        let messages = messages.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.clear().await {
                let _ = messages.send(format!("Failed to clear logs: {e}"));
            }
        });
    }

    async fn shutdown(&self) {
        if let Err(e) = self.handle.stop().await {
            warn!(error = %e, "stream did not stop cleanly");
        }
        self.handle.shutdown();
    }
}

fn handle_action(
    state: &mut AppState,
    commands: &Commands,
    messages: &mpsc::UnboundedSender<String>,
    action: Action,
) {
    match action {
        Action::Quit => {
            state.should_quit = true;
        }
        Action::ToggleHelp => {
            state.ui.help_visible = !state.ui.help_visible;
        }

        Action::StartStream(container) => {
            info!(container = %container, "starting stream");
            if state.container.as_deref() != Some(container.as_str()) {
                state.reset_view();
            }
            state.container = Some(container.clone());
            commands.start(container, messages);
        }
        Action::RestartStream => match state.container.clone() {
            Some(container) => commands.start(container, messages),
            None => state.open_container_prompt(),
        },
        Action::StopStream => commands.stop(messages),
        Action::ClearLogs => {
            commands.clear(messages);
            state.reset_view();
        }
        Action::ExportLogs => export(state),

        Action::OpenFilter => state.open_filter(),
        Action::OpenContainerPrompt => state.open_container_prompt(),
        Action::Input(c) => state.input_char(c),
        Action::InputBackspace => state.input_backspace(),
        Action::InputClear => state.input_clear(),
        Action::InputSubmit => {
            if let Some(container) = state.submit_input() {
                handle_action(state, commands, messages, Action::StartStream(container));
            }
        }
        Action::InputCancel => state.cancel_input(),
        Action::ClearFilter => state.clear_filter(),
        Action::CycleLevel => state.cycle_level(true),
        Action::CycleLevelBack => state.cycle_level(false),

        Action::ScrollUp(n) => state.scroll_up(n),
        Action::ScrollDown(n) => state.scroll_down(n),
        Action::PageUp => state.page_up(),
        Action::PageDown => state.page_down(),
        Action::ScrollToTop => state.scroll_to_top(),
        Action::ScrollToBottom => state.scroll_to_bottom(),
        Action::ToggleAutoScroll => state.toggle_auto_scroll(),
        Action::ToggleTimestamps => state.toggle_timestamps(),
        Action::ToggleExpand => {
            let view = state.logs.filtered();
            state.toggle_expand(&view);
        }

        Action::ShowMessage(msg) => state.show_message(msg),
        Action::DismissMessage => state.dismiss_message(),
        Action::Render => {}
    }
    state.render_dirty = true;
}

fn export(state: &mut AppState) {
    let name = state.container.as_deref().unwrap_or("logs");
    let path = PathBuf::from(format!(
        "{}_{}.log",
        name,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));

    match state.logs.export(&path) {
        Ok(lines) => state.show_message(format!("Exported {} logs to {}", lines, path.display())),
        Err(e) => state.show_message(format!("Failed to export logs: {e}")),
    }
}
