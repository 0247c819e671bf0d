//! Terminal chat surface: input box, conversation pane, pending-image bar and
//! theme toggle, driven by a single actor.
mod command;
mod feeders;
mod session;
mod styles;
mod transcript;
mod tui;
mod view;

pub use command::{Command, parse_command};
pub use feeders::spawn_chat_feeders;
pub use session::{Action, ChatSession, MALFORMED_REPLY, error_reply};
pub use styles::Palette;
pub use transcript::{Notice, NoticeLevel, Segment, TranscriptLine, render_message};
pub use tui::{ChatActor, ChatMsg, restore_terminal, setup_terminal};
