use std::path::PathBuf;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ragchat_core::{DispatchRejection, SelectedFile, UploadRejection};

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Line-editing keys shared by the composer and the upload prompt.
/// Returns false when the key is not an editing key.
fn edit_line(text: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    let char_count = text.chars().count();
    *cursor = (*cursor).min(char_count);

    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = char_count;
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Compose => handle_compose(app, key),
        InputMode::FilePrompt => handle_file_prompt(app, key),
    }
}

fn handle_compose(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Esc => app.should_quit = true,

        KeyCode::Enter => match app.session.send() {
            Ok(()) => {
                app.scroll_chat_to_bottom();
            }
            Err(DispatchRejection::EmptyDraft) | Err(DispatchRejection::Busy) => {}
        },

        // Upload controls
        KeyCode::Char('o') if ctrl => app.open_file_prompt(),
        KeyCode::Char('u') if ctrl => match app.session.upload() {
            Ok(()) => {}
            Err(UploadRejection::NoFile) => app.open_file_prompt(),
            Err(UploadRejection::Busy) => {}
        },
        KeyCode::Char('x') if ctrl => {
            app.session.uploads_mut().clear();
        }

        // Manual resync
        KeyCode::Char('r') if ctrl => {
            app.session.refresh();
        }

        // Chat scrolling
        KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::PageUp => app.scroll_chat_up(app.half_page()),
        KeyCode::PageDown => app.scroll_chat_down(app.half_page()),

        // Everything else edits the draft, unless a turn is in flight
        _ => {
            let App { session, draft_cursor, .. } = app;
            if let Some(draft) = session.dispatcher_mut().edit() {
                edit_line(draft, draft_cursor, key);
            }
        }
    }
}

fn handle_file_prompt(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_file_prompt(),
        KeyCode::Enter => submit_file_prompt(app),
        _ => {
            if edit_line(&mut app.file_input, &mut app.file_input_cursor, key) {
                app.file_input_error = None;
            }
        }
    }
}

fn submit_file_prompt(app: &mut App) {
    let input = app.file_input.trim();
    if input.is_empty() {
        app.file_input_error = Some("Enter a path to a PDF".to_string());
        return;
    }

    let path = expand_home(input);
    if !path.is_file() {
        app.file_input_error = Some(format!("No such file: {}", path.display()));
        return;
    }
    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        app.file_input_error = Some("Only PDF documents can be uploaded".to_string());
        return;
    }

    if app.session.uploads_mut().select(SelectedFile::new(path)) {
        app.close_file_prompt();
    }
}

fn expand_home(input: &str) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(input)
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_chat_up(3),
        MouseEventKind::ScrollDown => app.scroll_chat_down(3),
        _ => {}
    }
}
