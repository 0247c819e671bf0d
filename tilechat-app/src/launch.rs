use anyhow::Result;
use std::sync::Arc;
use tilechat_actors::Supervisor;
use tilechat_attach::{AttachmentManager, FsImageReader};
use tilechat_common::JsonFileStore;
use tilechat_config::ChatConfig;
use tilechat_tui::{ChatActor, ChatSession, restore_terminal, setup_terminal, spawn_chat_feeders};

const UI_MAILBOX: usize = 256;

/// Build every component from config, take over the terminal and block until
/// shutdown. The terminal is restored on every exit path, panics included.
pub async fn run(cfg: ChatConfig, theme: Option<bool>) -> Result<()> {
    // Fail on bad config before touching the terminal.
    let transport = tilechat_llm::connect(&cfg.gemini)?;

    let settings_path = cfg.storage.settings_path();
    tracing::debug!(path = %settings_path.display(), "settings store");
    let store = Arc::new(JsonFileStore::new(settings_path));

    let attachments =
        AttachmentManager::new(cfg.attachments.capacity, cfg.attachments.max_file_bytes);
    let session = ChatSession::new(attachments, store).with_theme(theme);

    install_panic_hook();
    let term = setup_terminal().inspect_err(|_| {
        let _ = restore_terminal();
    })?;

    let mut supervisor = Supervisor::new();
    let shutdown = supervisor.shutdown_handle();
    let chat = ChatActor::new(
        term,
        session,
        transport,
        Arc::new(FsImageReader),
        shutdown.clone(),
    );
    let addr = supervisor.spawn(chat, UI_MAILBOX);
    spawn_chat_feeders(addr, shutdown);

    let result = supervisor.run_until_ctrl_c().await;
    restore_terminal()?;
    tracing::info!("tilechat stopped");
    result
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        tracing::error!(panic = %info, "panic");
        previous(info);
    }));
}
