use crate::{
    session::{Action, ChatSession},
    transcript::Notice,
    view::{self, ViewSnap},
};
use anyhow::Result;
use async_trait::async_trait;
use crossterm::{
    event::{Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
};
use std::{
    io::{self, Stdout},
    sync::Arc,
    time::{Duration, Instant},
};
use tilechat_actors::{Actor, Context, ShutdownHandle};
use tilechat_attach::{ImageReader, Ticket};
use tilechat_common::ImageRef;
use tilechat_llm::ChatTransport;

const BRAILLE_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub enum ChatMsg {
    InputEvent(CtEvent),
    Tick,
    Submit(String),
    AttachmentDecoded {
        ticket: Ticket,
        result: tilechat_common::Result<ImageRef>,
    },
    Reply(tilechat_common::Result<String>),
    OpError(String),
    Shutdown,
}

/// Put the terminal into raw mode on the alternate screen.
pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let mut term = Terminal::new(CrosstermBackend::new(stdout))?;
    term.clear()?;
    Ok(term)
}

/// Undo [`setup_terminal`]. Safe to call more than once.
pub fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

pub struct ChatActor<B: Backend> {
    session: ChatSession,

    // deps
    transport: Arc<dyn ChatTransport>,
    reader: Arc<dyn ImageReader>,
    model: String,

    // terminal
    term: Terminal<B>,
    tick_rate: Duration,
    last_tick: Instant,

    // input box
    input: String,
    input_cursor: usize,
    scroll: usize, // from bottom
    dirty: bool,

    spin_idx: usize,

    shutdown: ShutdownHandle,
}

impl<B: Backend + Send + 'static> ChatActor<B> {
    pub fn new(
        term: Terminal<B>,
        session: ChatSession,
        transport: Arc<dyn ChatTransport>,
        reader: Arc<dyn ImageReader>,
        shutdown: ShutdownHandle,
    ) -> Self {
        let model = transport.model_name().to_string();
        Self {
            session,
            transport,
            reader,
            model,
            term,
            tick_rate: Duration::from_millis(80),
            last_tick: Instant::now(),
            input: String::new(),
            input_cursor: 0,
            scroll: 0,
            dirty: true,
            spin_idx: 0,
            shutdown,
        }
    }

    fn cursor_left(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        self.input_cursor -= 1;
        while self.input_cursor > 0 && !self.input.is_char_boundary(self.input_cursor) {
            self.input_cursor -= 1;
        }
    }

    fn cursor_right(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        self.input_cursor += 1;
        while self.input_cursor < self.input.len()
            && !self.input.is_char_boundary(self.input_cursor)
        {
            self.input_cursor += 1;
        }
    }

    fn insert_char(&mut self, ch: char) {
        self.input.insert(self.input_cursor, ch);
        self.input_cursor += ch.len_utf8();
    }

    fn backspace(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        let mut prev = self.input_cursor - 1;
        while prev > 0 && !self.input.is_char_boundary(prev) {
            prev -= 1;
        }
        self.input.drain(prev..self.input_cursor);
        self.input_cursor = prev;
    }

    fn delete(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        let start = self.input_cursor;
        let mut end = start + 1;
        while end < self.input.len() && !self.input.is_char_boundary(end) {
            end += 1;
        }
        self.input.drain(start..end);
    }

    fn spinner(&self) -> &'static str {
        if self.session.busy() > 0 {
            BRAILLE_FRAMES[self.spin_idx % BRAILLE_FRAMES.len()]
        } else {
            " "
        }
    }

    fn step_spinner(&mut self) {
        if self.session.busy() > 0 {
            self.spin_idx = (self.spin_idx + 1) % BRAILLE_FRAMES.len();
            self.dirty = true;
        }
    }

    fn draw(&mut self) -> Result<()> {
        let spinner = self.spinner();
        let snap = ViewSnap {
            palette: self.session.palette(),
            model: &self.model,
            input: &self.input,
            input_cursor: self.input_cursor,
            lines: self.session.lines(),
            scroll: self.scroll,
            busy: self.session.busy(),
            spinner,
            attachments: self.session.attachment_labels(),
            decoding: self.session.decoding_names(),
            capacity: self.session.attachments().capacity(),
        };
        view::draw(&mut self.term, &snap)
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<ChatMsg> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL)
            | (KeyCode::Char('q'), KeyModifiers::CONTROL) => return Some(ChatMsg::Shutdown),
            (KeyCode::PageUp, _) => self.scroll = self.scroll.saturating_add(5),
            (KeyCode::PageDown, _) => self.scroll = self.scroll.saturating_sub(5),
            (KeyCode::Up, _) => self.scroll = self.scroll.saturating_add(1),
            (KeyCode::Down, _) => self.scroll = self.scroll.saturating_sub(1),
            (KeyCode::Enter, _) => {
                let line = std::mem::take(&mut self.input);
                self.input_cursor = 0;
                self.dirty = true;
                return Some(ChatMsg::Submit(line));
            }
            (KeyCode::Left, _) => self.cursor_left(),
            (KeyCode::Right, _) => self.cursor_right(),
            (KeyCode::Home, _) => self.input_cursor = 0,
            (KeyCode::End, _) => self.input_cursor = self.input.len(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Esc, _) => {
                self.input.clear();
                self.input_cursor = 0;
            }
            (KeyCode::Char(ch), _) => self.insert_char(ch),
            _ => return None,
        }
        self.dirty = true;
        None
    }

    fn submit(&mut self, line: &str, ctx: &mut Context<Self>) {
        let action = self.session.submit(line);
        self.run_action(action, ctx);
    }

    fn quit(&mut self, ctx: &mut Context<Self>) {
        tracing::info!("chat ui shutting down");
        self.shutdown.signal();
        ctx.stop();
    }

    fn run_action(&mut self, action: Action, ctx: &mut Context<Self>) {
        let me = ctx.addr();
        match action {
            Action::None => {}
            Action::Quit => self.quit(ctx),
            Action::Send(message) => {
                // Follow the newest message.
                self.scroll = 0;
                let transport = self.transport.clone();
                tokio::spawn(async move {
                    let result = transport.send(&message).await;
                    let _ = me.send(ChatMsg::Reply(result)).await;
                });
            }
            Action::Decode(accepted) => {
                for (ticket, file) in accepted {
                    let reader = self.reader.clone();
                    let me = me.clone();
                    tokio::spawn(async move {
                        let result = reader.read(&file).await;
                        let _ = me.send(ChatMsg::AttachmentDecoded { ticket, result }).await;
                    });
                }
            }
        }
        self.dirty = true;
    }
}

#[async_trait]
impl<B: Backend + Send + 'static> Actor for ChatActor<B> {
    type Msg = ChatMsg;

    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            ChatMsg::InputEvent(ev) => match ev {
                // Handled in place; a full mailbox must not drop Enter or Ctrl-C.
                CtEvent::Key(k) => match self.handle_key(k) {
                    Some(ChatMsg::Submit(line)) => self.submit(&line, ctx),
                    Some(ChatMsg::Shutdown) => self.quit(ctx),
                    _ => {}
                },
                CtEvent::Resize(..) => self.dirty = true,
                _ => {}
            },
            ChatMsg::Submit(line) => self.submit(&line, ctx),
            ChatMsg::AttachmentDecoded { ticket, result } => {
                self.session.attachment_decoded(ticket, result);
                self.dirty = true;
            }
            ChatMsg::Reply(result) => {
                self.session.reply(result);
                self.dirty = true;
            }
            ChatMsg::OpError(e) => {
                tracing::warn!(error = %e, "ui operation failed");
                self.session.notice(Notice::error(format!("Error: {e}")));
                self.dirty = true;
            }
            ChatMsg::Tick => {
                self.step_spinner();
                if self.dirty || self.last_tick.elapsed() >= self.tick_rate {
                    self.draw()?;
                    self.last_tick = Instant::now();
                    self.dirty = false;
                }
            }
            ChatMsg::Shutdown => self.quit(ctx),
        }

        Ok(())
    }
}
