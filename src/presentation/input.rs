use crate::application::{App, AppMode};
use crate::infrastructure::FileRepository;
use crossterm::event::{KeyCode, KeyModifiers};

pub struct InputHandler;

impl InputHandler {
    pub fn handle_key_event(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        match app.mode {
            AppMode::Normal => Self::handle_normal_mode(app, key, modifiers),
            AppMode::Editing => Self::handle_editing_mode(app, key),
            AppMode::Help => Self::handle_help_mode(app, key),
            AppMode::SaveAs | AppMode::LoadFile => Self::handle_filename_input_mode(app, key),
            AppMode::ConfirmExit => {
                app.confirm_exit(matches!(key, KeyCode::Char('y') | KeyCode::Char('Y')));
            }
        }
    }

    fn handle_normal_mode(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        if modifiers.contains(KeyModifiers::CONTROL) {
            match key {
                KeyCode::Char('s') => app.start_save_as(),
                KeyCode::Char('o') => app.start_load_file(),
                KeyCode::Char('r') => app.add_row(),
                KeyCode::Char('d') => app.delete_row(),
                KeyCode::Char('n') => app.add_column(),
                KeyCode::Char('x') => app.delete_column(),
                KeyCode::Char('f') => app.toggle_formula_view(),
                _ => {}
            }
            return;
        }

        app.status_message = None;

        match key {
            KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1, 0),
            KeyCode::Down | KeyCode::Char('j') => app.move_selection(1, 0),
            KeyCode::Left | KeyCode::Char('h') => app.move_selection(0, -1),
            KeyCode::Right | KeyCode::Char('l') => app.move_selection(0, 1),
            KeyCode::Enter | KeyCode::F(2) => app.start_editing(),
            KeyCode::Char('=') => {
                app.start_editing();
                app.input = "=".to_string();
                app.cursor_position = 1;
            }
            KeyCode::Backspace | KeyCode::Delete => {
                app.spreadsheet
                    .update_cell(app.selected_row, app.selected_col, "");
            }
            KeyCode::F(5) => app.recalculate(),
            KeyCode::F(1) | KeyCode::Char('?') => {
                app.mode = AppMode::Help;
                app.help_scroll = 0;
            }
            KeyCode::Char('q') => app.request_exit(),
            _ => {}
        }
    }

    fn handle_editing_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Enter => app.finish_editing(),
            KeyCode::Esc => app.cancel_editing(),
            _ => edit_line(&mut app.input, &mut app.cursor_position, key),
        }
    }

    fn handle_help_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') | KeyCode::Char('q') => {
                app.mode = AppMode::Normal;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.help_scroll = app.help_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.help_scroll += 1;
            }
            KeyCode::PageUp => {
                app.help_scroll = app.help_scroll.saturating_sub(5);
            }
            KeyCode::PageDown => {
                app.help_scroll += 5;
            }
            KeyCode::Home => {
                app.help_scroll = 0;
            }
            _ => {}
        }
    }

    fn handle_filename_input_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Enter => {
                let path = app.prompt_path();
                if app.mode == AppMode::SaveAs {
                    let result = FileRepository::save_spreadsheet(&app.spreadsheet, &path);
                    app.set_save_result(path, result);
                } else {
                    let result = FileRepository::load_spreadsheet(&mut app.spreadsheet, &path);
                    app.set_load_result(path, result);
                }
            }
            KeyCode::Esc => app.cancel_filename_input(),
            _ => edit_line(&mut app.filename_input, &mut app.cursor_position, key),
        }
    }
}

/// Single-line editing shared by the cell editor and the filename prompt.
/// `cursor` counts characters, not bytes.
fn edit_line(buffer: &mut String, cursor: &mut usize, key: KeyCode) {
    let len = buffer.chars().count();
    *cursor = (*cursor).min(len);
    let byte_at = |buffer: &String, index: usize| {
        buffer
            .char_indices()
            .nth(index)
            .map_or(buffer.len(), |(offset, _)| offset)
    };

    match key {
        KeyCode::Backspace if *cursor > 0 => {
            let offset = byte_at(buffer, *cursor - 1);
            buffer.remove(offset);
            *cursor -= 1;
        }
        KeyCode::Delete if *cursor < len => {
            let offset = byte_at(buffer, *cursor);
            buffer.remove(offset);
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(len),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = len,
        KeyCode::Char(c) => {
            let offset = byte_at(buffer, *cursor);
            buffer.insert(offset, c);
            *cursor += 1;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Spreadsheet;
    use tempfile::tempdir;

    fn press(app: &mut App, key: KeyCode) {
        InputHandler::handle_key_event(app, key, KeyModifiers::NONE);
    }

    fn ctrl(app: &mut App, c: char) {
        InputHandler::handle_key_event(app, KeyCode::Char(c), KeyModifiers::CONTROL);
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_edit_cell_through_keys() {
        let mut app = App::default();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, AppMode::Editing);
        type_text(&mut app, "=mmax(1,5)");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.spreadsheet.get_display_value(0, 0), "5");
        assert_eq!(app.selected_row, 1);
    }

    #[test]
    fn test_equals_starts_formula() {
        let mut app = App::default();
        press(&mut app, KeyCode::Char('='));
        assert_eq!(app.mode, AppMode::Editing);
        assert_eq!(app.input, "=");
        type_text(&mut app, "2^10");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.spreadsheet.get_display_value(0, 0), "1024");
    }

    #[test]
    fn test_line_editing_handles_multibyte_text() {
        let mut buffer = "añb".to_string();
        let mut cursor = 3;
        edit_line(&mut buffer, &mut cursor, KeyCode::Left);
        edit_line(&mut buffer, &mut cursor, KeyCode::Backspace);
        assert_eq!(buffer, "ab");
        assert_eq!(cursor, 1);
        edit_line(&mut buffer, &mut cursor, KeyCode::Char('é'));
        assert_eq!(buffer, "aéb");
        edit_line(&mut buffer, &mut cursor, KeyCode::Delete);
        assert_eq!(buffer, "aé");
        edit_line(&mut buffer, &mut cursor, KeyCode::Home);
        edit_line(&mut buffer, &mut cursor, KeyCode::Backspace);
        assert_eq!(buffer, "aé");
        edit_line(&mut buffer, &mut cursor, KeyCode::End);
        assert_eq!(cursor, 2);
    }

    #[test]
    fn test_escape_cancels_edit() {
        let mut app = App::default();
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "123");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.spreadsheet.get_expression(0, 0), "");
    }

    #[test]
    fn test_navigation_keys() {
        let mut app = App::default();
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char('l'));
        assert_eq!((app.selected_row, app.selected_col), (1, 1));
        press(&mut app, KeyCode::Char('k'));
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Left);
        assert_eq!((app.selected_row, app.selected_col), (0, 0));
    }

    #[test]
    fn test_structure_shortcuts() {
        let mut app = App::new(Spreadsheet::new(2, 2));
        ctrl(&mut app, 'r');
        ctrl(&mut app, 'n');
        assert_eq!((app.spreadsheet.rows(), app.spreadsheet.cols()), (3, 3));
        ctrl(&mut app, 'd');
        ctrl(&mut app, 'x');
        assert_eq!((app.spreadsheet.rows(), app.spreadsheet.cols()), (2, 2));
    }

    #[test]
    fn test_clear_cell_and_toggle_view() {
        let mut app = App::default();
        app.spreadsheet.update_cell(0, 0, "=1+1");
        ctrl(&mut app, 'f');
        assert!(app.spreadsheet.is_formula_view());
        ctrl(&mut app, 'f');
        press(&mut app, KeyCode::Delete);
        assert_eq!(app.spreadsheet.get_expression(0, 0), "");
    }

    #[test]
    fn test_help_mode() {
        let mut app = App::default();
        press(&mut app, KeyCode::F(1));
        assert_eq!(app.mode, AppMode::Help);
        press(&mut app, KeyCode::PageDown);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.help_scroll, 4);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, AppMode::Normal);
    }

    #[test]
    fn test_quit_requires_confirmation() {
        let mut app = App::default();
        press(&mut app, KeyCode::Char('q'));
        assert_eq!(app.mode, AppMode::ConfirmExit);
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.mode, AppMode::Normal);
        assert!(!app.should_quit);

        press(&mut app, KeyCode::Char('q'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_save_and_load_through_prompts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.json");

        let mut app = App::new(Spreadsheet::new(2, 2));
        app.spreadsheet.update_cell(0, 0, "4");
        app.spreadsheet.update_cell(0, 1, "=A1*A1");

        ctrl(&mut app, 's');
        assert_eq!(app.mode, AppMode::SaveAs);
        app.filename_input.clear();
        app.cursor_position = 0;
        type_text(&mut app, &path.display().to_string());
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, AppMode::Normal);
        assert!(app.status_message.as_deref().unwrap().starts_with("Saved to"));

        let mut other = App::default();
        other.filename = Some(path.clone());
        ctrl(&mut other, 'o');
        assert_eq!(other.mode, AppMode::LoadFile);
        press(&mut other, KeyCode::Enter);
        assert_eq!(other.spreadsheet.rows(), 2);
        assert_eq!(other.spreadsheet.get_display_value(0, 1), "16");
        assert_eq!(other.filename, Some(path));
    }

    #[test]
    fn test_failed_load_reports_status() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nope").unwrap();

        let mut app = App::default();
        app.filename = Some(path);
        ctrl(&mut app, 'o');
        press(&mut app, KeyCode::Enter);
        assert!(app.status_message.as_deref().unwrap().starts_with("Load failed"));
        assert_eq!(app.spreadsheet.rows(), 20);
    }
}
