//! Chat state owned by the UI actor: transcript, pending attachments, theme.
//!
//! Everything here is synchronous. Operations that need I/O return an
//! [`Action`] for the actor to run in a spawned task; results come back
//! through [`ChatSession::attachment_decoded`] and [`ChatSession::reply`].

use crate::command::{Command, parse_command};
use crate::styles::Palette;
use crate::transcript::{
    Notice, NoticeLevel, TranscriptLine, describe_image, render_message, render_notice,
};
use std::path::PathBuf;
use std::sync::Arc;
use tilechat_attach::{AttachmentManager, AttachmentState, Completion, FileHandle, Ticket};
use tilechat_common::{ChatError, ChatMessage, ImageRef, KeyValueStore, Settings, Transcript};

pub const MALFORMED_REPLY: &str =
    "Sorry, I couldn't understand this response. Please try again later.";

const HELP: &[&str] = &[
    "Commands:",
    "  /attach <path>...   add images (quote paths with spaces)",
    "  /remove <n>         drop image n from the pending set",
    "  /remove             drop all pending images",
    "  /theme              toggle dark/light theme",
    "  /quit               exit",
    "Enter sends the message with any pending images.",
];

/// Work the actor has to start on the session's behalf.
#[derive(Debug)]
pub enum Action {
    None,
    Send(ChatMessage),
    Decode(Vec<(Ticket, FileHandle)>),
    Quit,
}

#[derive(Debug)]
enum FeedEntry {
    Message(usize),
    Notice(Notice),
}

pub struct ChatSession {
    transcript: Transcript,
    feed: Vec<FeedEntry>,
    lines: Vec<TranscriptLine>,
    attachments: AttachmentManager,
    settings: Settings,
    store: Arc<dyn KeyValueStore>,
    palette: Palette,
    busy: u32,
}

impl ChatSession {
    /// A store that cannot be read falls back to default settings.
    pub fn new(attachments: AttachmentManager, store: Arc<dyn KeyValueStore>) -> Self {
        let settings = Settings::load(store.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "settings unavailable; using defaults");
            Settings::default()
        });
        let mut session = Self {
            transcript: Transcript::default(),
            feed: Vec::new(),
            lines: Vec::new(),
            attachments,
            settings,
            store,
            palette: Palette::new(settings.dark_mode),
            busy: 0,
        };
        session.notice(Notice::info(
            "Ask about tiles, or /attach a photo. /help lists commands.",
        ));
        session
    }

    /// Force the theme for this run without persisting it.
    pub fn with_theme(mut self, dark: Option<bool>) -> Self {
        if let Some(dark) = dark {
            self.settings.dark_mode = dark;
            self.set_palette();
        }
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn attachments(&self) -> &AttachmentManager {
        &self.attachments
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// Requests sent and not yet answered.
    pub fn busy(&self) -> u32 {
        self.busy
    }

    /// Preview labels for decoded attachments, in send order.
    pub fn attachment_labels(&self) -> Vec<String> {
        self.attachments
            .snapshot()
            .iter()
            .map(describe_image)
            .collect()
    }

    pub fn decoding_names(&self) -> Vec<String> {
        self.attachments
            .pending_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Handle a line from the input box: a command, or a message to send.
    pub fn submit(&mut self, line: &str) -> Action {
        let text = line.trim();
        if text.starts_with('/') {
            return self.command(parse_command(text));
        }

        // Nothing typed and nothing decoded: ignore.
        if text.is_empty() && self.attachments.is_empty() {
            return Action::None;
        }

        let images = self.attachments.take_for_send();
        let message = ChatMessage::user(Some(text.to_string()), images);
        if message.is_empty() {
            return Action::None;
        }

        tracing::info!(
            message_id = %message.id(),
            text_len = text.len(),
            images = message.attachments().len(),
            "sending message"
        );
        self.push_message(message.clone());
        for name in self.decoding_names() {
            self.notice(Notice::info(format!(
                "{name} is still loading; it will be sent with your next message."
            )));
        }
        self.busy = self.busy.saturating_add(1);
        Action::Send(message)
    }

    fn command(&mut self, cmd: Command) -> Action {
        match cmd {
            Command::Attach(paths) => return self.attach(paths),
            Command::Remove(index) => self.remove(index),
            Command::Theme => self.toggle_theme(),
            Command::Help => self.notice(Notice {
                level: NoticeLevel::Info,
                lines: HELP.iter().map(|s| s.to_string()).collect(),
            }),
            Command::Quit => return Action::Quit,
            Command::Usage(usage) => self.notice(Notice::error(format!("Usage: {usage}"))),
            Command::Unknown(s) => {
                self.notice(Notice::error(format!("Unknown command: {s}. Try /help.")))
            }
        }
        Action::None
    }

    /// Describe and reserve files; accepted ones are returned for decoding.
    pub fn attach(&mut self, paths: Vec<PathBuf>) -> Action {
        let mut handles = Vec::with_capacity(paths.len());
        for path in paths {
            match FileHandle::from_path(&path) {
                Ok(handle) => handles.push(handle),
                Err(e) => self.notice(Notice::error(e.to_string())),
            }
        }
        self.attach_files(handles)
    }

    pub fn attach_files(&mut self, files: Vec<FileHandle>) -> Action {
        if files.is_empty() {
            return Action::None;
        }
        let reservation = self.attachments.reserve(files);
        for err in &reservation.rejected {
            self.notice(Notice::error(err.to_string()));
        }
        if reservation.accepted.is_empty() {
            Action::None
        } else {
            Action::Decode(reservation.accepted)
        }
    }

    pub fn attachment_decoded(
        &mut self,
        ticket: Ticket,
        result: tilechat_common::Result<ImageRef>,
    ) {
        match self.attachments.complete(ticket, result) {
            Completion::Attached { name } => {
                if self.attachments.state() == AttachmentState::Full {
                    tracing::debug!(file = %name, "attachment set full");
                }
            }
            Completion::Failed(err) => self.notice(Notice::error(err.to_string())),
            Completion::Discarded => {}
        }
    }

    /// Remove a pending image by 0-based index, or all of them.
    pub fn remove(&mut self, index: Option<usize>) {
        let removed = self.attachments.remove_at(index);
        match (index, removed.len()) {
            (Some(i), 0) => self.notice(Notice::error(format!("No pending image #{}", i + 1))),
            (None, _) => self.notice(Notice::info("Pending images cleared.")),
            (Some(_), _) => {
                let names: Vec<_> = removed.iter().map(ImageRef::name).collect();
                self.notice(Notice::info(format!("Removed {}.", names.join(", "))))
            }
        }
    }

    /// Record the outcome of a send. Failures become assistant messages.
    pub fn reply(&mut self, result: tilechat_common::Result<String>) {
        self.busy = self.busy.saturating_sub(1);
        let text = match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "send failed");
                error_reply(&e)
            }
        };
        self.push_message(ChatMessage::assistant(text));
    }

    pub fn toggle_theme(&mut self) {
        match self.settings.toggle_theme(self.store.as_ref()) {
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "theme preference not saved");
                self.notice(Notice::error(format!("Theme not saved: {e}")));
            }
        }
        self.set_palette();
    }

    pub fn notice(&mut self, notice: Notice) {
        self.lines.extend(render_notice(&notice, &self.palette));
        self.feed.push(FeedEntry::Notice(notice));
    }

    fn push_message(&mut self, message: ChatMessage) {
        self.lines.extend(render_message(&message, &self.palette));
        self.feed.push(FeedEntry::Message(self.transcript.len()));
        self.transcript.push(message);
    }

    fn set_palette(&mut self) {
        self.palette = Palette::new(self.settings.dark_mode);
        self.lines = self
            .feed
            .iter()
            .flat_map(|entry| match entry {
                FeedEntry::Message(i) => {
                    render_message(&self.transcript.messages()[*i], &self.palette)
                }
                FeedEntry::Notice(n) => render_notice(n, &self.palette),
            })
            .collect();
    }
}

/// Assistant-visible text for a failed send.
pub fn error_reply(err: &ChatError) -> String {
    match err {
        ChatError::MalformedResponse(_) => MALFORMED_REPLY.to_string(),
        ChatError::Network { message, .. } => format!("Connection error: {message}"),
        other => format!("Connection error: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilechat_common::{MemoryStore, Role};

    fn session() -> ChatSession {
        ChatSession::new(AttachmentManager::new(3, 1024), Arc::new(MemoryStore::default()))
    }

    fn png(name: &str) -> FileHandle {
        FileHandle::in_memory(name, "image/png", vec![1u8, 2, 3])
    }

    fn decode_all(session: &mut ChatSession, action: Action) {
        let Action::Decode(accepted) = action else {
            panic!("expected decode, got {action:?}");
        };
        for (ticket, file) in accepted {
            let image = ImageRef::new(file.name.clone(), vec![1u8, 2, 3], file.content_type);
            session.attachment_decoded(ticket, Ok(image));
        }
    }

    fn plain_lines(session: &ChatSession) -> Vec<String> {
        session.lines().iter().map(TranscriptLine::plain).collect()
    }

    #[test]
    fn empty_submit_is_ignored() {
        let mut s = session();
        assert!(matches!(s.submit("   "), Action::None));
        assert!(s.transcript().is_empty());
        assert_eq!(s.busy(), 0);
    }

    #[test]
    fn text_submit_sends_and_records() {
        let mut s = session();
        let Action::Send(msg) = s.submit("  which grout?  ") else {
            panic!("expected send");
        };
        assert_eq!(msg.text(), Some("which grout?"));
        assert_eq!(s.transcript().len(), 1);
        assert_eq!(s.busy(), 1);
    }

    #[test]
    fn send_takes_pending_images_in_order() {
        let mut s = session();
        let action = s.attach_files(vec![png("a.png"), png("b.png")]);
        decode_all(&mut s, action);

        let Action::Send(msg) = s.submit("") else {
            panic!("expected send");
        };
        assert_eq!(msg.text(), None);
        let names: Vec<_> = msg.attachments().iter().map(ImageRef::name).collect();
        assert_eq!(names, ["a.png", "b.png"]);
        assert!(s.attachments().snapshot().is_empty());
    }

    #[test]
    fn in_flight_only_does_not_send() {
        let mut s = session();
        let _pending = s.attach_files(vec![png("a.png")]);
        assert!(matches!(s.submit(""), Action::None));
        assert_eq!(s.decoding_names(), ["a.png"]);
    }

    #[test]
    fn image_still_decoding_at_send_goes_with_the_next_message() {
        let mut s = session();
        let Action::Decode(accepted) = s.attach_files(vec![png("a.png")]) else {
            panic!("expected decode");
        };

        let Action::Send(first) = s.submit("look at this") else {
            panic!("expected send");
        };
        assert!(first.attachments().is_empty());
        assert!(plain_lines(&s).iter().any(|l| l.contains("a.png is still loading")));

        decode_all(&mut s, Action::Decode(accepted));
        assert_eq!(s.attachment_labels().len(), 1);

        let Action::Send(second) = s.submit("and this?") else {
            panic!("expected send");
        };
        let names: Vec<_> = second.attachments().iter().map(ImageRef::name).collect();
        assert_eq!(names, ["a.png"]);
        assert_eq!(s.attachments().occupied(), 0);
    }

    #[test]
    fn rejections_become_notices_naming_the_file() {
        let mut s = session();
        let files = vec![
            FileHandle::in_memory("notes.txt", "text/plain", b"x".to_vec()),
            png("1.png"),
            png("2.png"),
            png("3.png"),
            png("4.png"),
        ];
        let action = s.attach_files(files);
        decode_all(&mut s, action);

        let text = plain_lines(&s).join("\n");
        assert!(text.contains("notes.txt is not an image file"));
        assert!(text.contains("4.png was not attached"));
        assert_eq!(s.attachment_labels().len(), 3);
    }

    #[test]
    fn failed_decode_is_reported() {
        let mut s = session();
        let Action::Decode(accepted) = s.attach_files(vec![png("bad.png")]) else {
            panic!("expected decode");
        };
        let (ticket, _) = accepted.into_iter().next().unwrap();
        s.attachment_decoded(
            ticket,
            Err(ChatError::FileReadError {
                name: "bad.png".into(),
                reason: "truncated".into(),
            }),
        );
        assert!(plain_lines(&s).iter().any(|l| l.contains("failed to read bad.png")));
        assert_eq!(s.attachments().occupied(), 0);
    }

    #[test]
    fn remove_commands_use_one_based_indices() {
        let mut s = session();
        let action = s.attach_files(vec![png("a.png"), png("b.png"), png("c.png")]);
        decode_all(&mut s, action);

        s.submit("/remove 2");
        let names: Vec<_> = s
            .attachments()
            .snapshot()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, ["a.png", "c.png"]);

        s.submit("/remove 9");
        assert_eq!(s.attachments().len(), 2);

        s.submit("/remove");
        assert!(s.attachments().is_empty());
    }

    #[test]
    fn errors_become_assistant_messages() {
        let mut s = session();
        s.submit("hi");
        s.reply(Err(ChatError::MalformedResponse("no candidates".into())));
        s.submit("again");
        s.reply(Err(ChatError::Network {
            status: Some(500),
            message: "HTTP error! status: 500".into(),
        }));

        let replies: Vec<_> = s
            .transcript()
            .messages()
            .iter()
            .filter(|m| m.role() == Role::Assistant)
            .map(|m| m.text().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            replies,
            [
                MALFORMED_REPLY.to_string(),
                "Connection error: HTTP error! status: 500".to_string()
            ]
        );
        assert_eq!(s.busy(), 0);
    }

    #[test]
    fn overlapping_replies_append_in_completion_order() {
        let mut s = session();
        s.submit("first");
        s.submit("second");
        assert_eq!(s.busy(), 2);
        s.reply(Ok("answer two".into()));
        s.reply(Ok("answer one".into()));
        let texts: Vec<_> = s
            .transcript()
            .messages()
            .iter()
            .filter_map(|m| m.text())
            .collect();
        assert_eq!(texts, ["first", "second", "answer two", "answer one"]);
    }

    #[test]
    fn theme_toggle_persists_and_restyles() {
        let store = Arc::new(MemoryStore::default());
        let mut s = ChatSession::new(AttachmentManager::default(), store.clone());
        assert!(!s.settings().dark_mode);
        s.submit("hello");
        let before = s.lines().to_vec();

        s.submit("/theme");
        assert!(s.settings().dark_mode);
        assert_eq!(store.get("darkMode").unwrap().as_deref(), Some("true"));
        assert_ne!(s.lines()[..before.len()], before[..]);

        let reloaded = ChatSession::new(AttachmentManager::default(), store);
        assert!(reloaded.settings().dark_mode);
    }

    #[test]
    fn theme_override_is_not_persisted() {
        let store = Arc::new(MemoryStore::default());
        let s =
            ChatSession::new(AttachmentManager::default(), store.clone()).with_theme(Some(true));
        assert_eq!(s.palette().name(), "dark");
        assert_eq!(store.get("darkMode").unwrap(), None);
    }

    #[test]
    fn unknown_and_quit_commands() {
        let mut s = session();
        assert!(matches!(s.submit("/quit"), Action::Quit));
        assert!(matches!(s.submit("/frobnicate"), Action::None));
        assert!(plain_lines(&s).iter().any(|l| l.contains("Unknown command: /frobnicate")));
    }
}
