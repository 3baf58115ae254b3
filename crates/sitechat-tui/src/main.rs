use std::sync::Arc;
use anyhow::Result;
use sitechat_core::{ChatSession, ChatTransport, Config, FileIdentityStore, HttpTransport, Identity};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

mod app;
mod bridge;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use bridge::{ChannelUi, UiUpdate};
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::init();

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "config unreadable, using defaults");
        Config::new()
    });
    let session = Arc::new(ChatSession::new(
        HttpTransport::new(&config),
        load_identity(),
        config.error_message.clone(),
    ));
    info!(endpoint = %config.endpoint, user_id = %session.identity(), "starting chat widget");

    let (tx, mut updates) = mpsc::unbounded_channel();
    let mut app = App::new(session, ChannelUi::new(tx), config.placeholder.clone());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut terminal, &mut app, &mut events, &mut updates).await;

    tui::restore()?;
    result
}

async fn run<T: ChatTransport + 'static>(
    terminal: &mut Tui,
    app: &mut App<T>,
    events: &mut EventHandler,
    updates: &mut mpsc::UnboundedReceiver<UiUpdate>,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(frame, app))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event)?,
            Some(update) = updates.recv() => {
                app.apply(update);
                // Apply the rest of the burst before redrawing
                while let Ok(update) = updates.try_recv() {
                    app.apply(update);
                }
            }
            else => break,
        }
    }

    Ok(())
}

/// Durable identity from the data dir, or a session-only one if that fails
fn load_identity() -> Identity {
    let durable = FileIdentityStore::in_data_dir().and_then(|store| {
        debug!(path = %store.path().display(), "loading identity");
        Identity::load_or_create(&store)
    });

    match durable {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "identity store unavailable, using a session-only identity");
            Identity::generate()
        }
    }
}
