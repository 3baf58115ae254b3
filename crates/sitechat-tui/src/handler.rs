use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use sitechat_core::ChatTransport;

use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event<T: ChatTransport + 'static>(app: &mut App<T>, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
    Ok(())
}

fn handle_key<T: ChatTransport + 'static>(app: &mut App<T>, key: KeyEvent) {
    // Global keys that work with the window open or closed
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('o') => {
                app.toggle_chat();
                return;
            }
            _ => {}
        }
    }

    if app.chat_open {
        handle_chat_key(app, key);
    } else {
        handle_launcher_key(app, key);
    }
}

fn handle_launcher_key<T: ChatTransport + 'static>(app: &mut App<T>, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Enter => app.set_chat_open(true),
        _ => {}
    }
}

fn handle_chat_key<T: ChatTransport + 'static>(app: &mut App<T>, key: KeyEvent) {
    let half_page = (app.chat_height / 2).max(1);

    match key.code {
        // Minimize
        KeyCode::Esc => app.set_chat_open(false),

        // Shift/Alt+Enter break the line, plain Enter sends
        KeyCode::Enter
            if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            app.insert_char('\n');
        }
        KeyCode::Enter => app.submit(),

        KeyCode::PageUp => app.scroll_up(half_page),
        KeyCode::PageDown => app.scroll_down(half_page),

        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}
