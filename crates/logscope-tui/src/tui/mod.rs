//! Terminal setup and the event loop's input side

mod event;
mod terminal;

pub use event::{Event, EventHandler};
pub use terminal::Tui;
