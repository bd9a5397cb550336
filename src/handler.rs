use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, ChatView, InputMode, LoginView, Screen};
use crate::tui::AppEvent;

const PAGE: u16 = 10;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Apply a line-editing key to `text`; other keys are ignored.
fn edit_line(text: &mut String, cursor: &mut usize, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < text.chars().count() {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            *cursor = (*cursor + 1).min(text.chars().count());
        }
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = text.chars().count(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick().await,
    }
    app.sync_session();
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match &mut app.screen {
        Screen::Login(view) => match handle_login(view, key) {
            LoginAction::Submit => app.submit_credentials(),
            LoginAction::Quit => app.should_quit = true,
            LoginAction::None => {}
        },
        Screen::Chat(view) => match handle_chat(view, key) {
            ChatAction::Send => app.send_message(),
            ChatAction::Logout => app.logout(),
            ChatAction::Quit => app.should_quit = true,
            ChatAction::None => {}
        },
    }
}

enum LoginAction {
    Submit,
    Quit,
    None,
}

fn handle_login(view: &mut LoginView, key: KeyEvent) -> LoginAction {
    let form = &mut view.form;
    match key.code {
        KeyCode::Esc => return LoginAction::Quit,
        KeyCode::Enter => return LoginAction::Submit,
        KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            form.toggle_mode();
        }
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => form.focus_next(),
        _ => {
            let mut cursor = form.cursor;
            edit_line(form.focused_value_mut(), &mut cursor, key);
            form.cursor = cursor;
        }
    }
    LoginAction::None
}

enum ChatAction {
    Send,
    Logout,
    Quit,
    None,
}

fn handle_chat(view: &mut ChatView, key: KeyEvent) -> ChatAction {
    match key.code {
        KeyCode::PageUp => {
            view.scroll_back = view.scroll_back.saturating_add(PAGE);
            return ChatAction::None;
        }
        KeyCode::PageDown => {
            view.scroll_back = view.scroll_back.saturating_sub(PAGE);
            return ChatAction::None;
        }
        KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return ChatAction::Logout;
        }
        _ => {}
    }

    match view.input_mode {
        InputMode::Editing => match key.code {
            KeyCode::Esc => view.input_mode = InputMode::Normal,
            KeyCode::Enter => return ChatAction::Send,
            _ => edit_line(&mut view.conversation.input, &mut view.cursor, key),
        },
        InputMode::Normal => match key.code {
            KeyCode::Char('q') => return ChatAction::Quit,
            KeyCode::Char('L') => return ChatAction::Logout,
            KeyCode::Char('i') | KeyCode::Enter => {
                view.input_mode = InputMode::Editing;
                view.cursor = view.conversation.input.chars().count();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                view.scroll_back = view.scroll_back.saturating_add(1);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                view.scroll_back = view.scroll_back.saturating_sub(1);
            }
            KeyCode::Char('G') | KeyCode::End => view.scroll_back = 0,
            _ => {}
        },
    }
    ChatAction::None
}
