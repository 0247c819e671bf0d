use crate::tui::{ChatActor, ChatMsg};
use crossterm::event::{self, Event};
use ratatui::backend::Backend;
use std::time::Duration;
use tilechat_actors::{Addr, ShutdownHandle};
use tokio::time;

const INPUT_POLL: Duration = Duration::from_millis(100);
const TICK: Duration = Duration::from_millis(80);

/// Forward terminal events and redraw ticks to the chat actor until shutdown.
pub fn spawn_chat_feeders<B: Backend + Send + 'static>(
    chat: Addr<ChatActor<B>>,
    shutdown: ShutdownHandle,
) {
    let chat_in = chat.clone();
    let mut shutdown_input = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            // Poll with a timeout so the blocking thread returns and shutdown is noticed.
            let ev = tokio::task::spawn_blocking(|| -> std::io::Result<Option<Event>> {
                if event::poll(INPUT_POLL)? {
                    event::read().map(Some)
                } else {
                    Ok(None)
                }
            });
            tokio::select! {
                _ = shutdown_input.recv() => break,
                ev = ev => match ev {
                    Ok(Ok(Some(e))) => {
                        if chat_in.send(ChatMsg::InputEvent(e)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => {
                        let _ = chat_in.send(ChatMsg::OpError(format!("input: {e}"))).await;
                    }
                    Err(_) => break,
                }
            }
        }
    });

    let chat_tick = chat;
    let mut shutdown_tick = shutdown.subscribe();
    tokio::spawn(async move {
        let mut interval = time::interval(TICK);
        loop {
            tokio::select! {
                _ = shutdown_tick.recv() => break,
                _ = interval.tick() => {
                    let _ = chat_tick.try_send(ChatMsg::Tick);
                }
            }
        }
    });
}
