//! Application state management for the terminal grid.
//!
//! This module contains the main application state and mode management
//! for the terminal user interface.

use crate::domain::{PersistenceResult, Spreadsheet};
use std::path::PathBuf;

/// Filename offered by the save/load prompts when none is known yet.
pub const DEFAULT_FILENAME: &str = "mysheet.json";

/// Represents the current mode of the application.
///
/// The mode determines how key presses are interpreted and which
/// prompt or popup is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Navigation mode - arrow keys move the selection, shortcuts available
    Normal,
    /// The selected cell's raw text is being edited
    Editing,
    /// Help popup is displayed
    Help,
    /// Save prompt is open
    SaveAs,
    /// Load prompt is open
    LoadFile,
    /// Waiting for the user to confirm quitting
    ConfirmExit,
}

/// Main application state containing the grid and UI state.
///
/// # Examples
///
/// ```
/// use gridcalc::application::App;
///
/// let app = App::default();
/// assert_eq!(app.selected_row, 0);
/// assert_eq!(app.selected_col, 0);
/// ```
#[derive(Debug)]
pub struct App {
    pub spreadsheet: Spreadsheet,
    /// Currently selected row (zero-based)
    pub selected_row: usize,
    /// Currently selected column (zero-based)
    pub selected_col: usize,
    /// Top-left row visible in the viewport
    pub scroll_row: usize,
    /// Left-most column visible in the viewport
    pub scroll_col: usize,
    pub mode: AppMode,
    /// Edit buffer for the selected cell
    pub input: String,
    /// Cursor position within the active input buffer, in characters
    pub cursor_position: usize,
    /// File the grid was last saved to or loaded from
    pub filename: Option<PathBuf>,
    pub help_scroll: usize,
    /// Temporary status message to display
    pub status_message: Option<String>,
    /// Input buffer for filename entry
    pub filename_input: String,
    pub viewport_rows: usize,
    pub viewport_cols: usize,
    pub should_quit: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new(Spreadsheet::default())
    }
}

impl App {
    pub fn new(spreadsheet: Spreadsheet) -> Self {
        Self {
            spreadsheet,
            selected_row: 0,
            selected_col: 0,
            scroll_row: 0,
            scroll_col: 0,
            mode: AppMode::Normal,
            input: String::new(),
            cursor_position: 0,
            filename: None,
            help_scroll: 0,
            status_message: None,
            filename_input: String::new(),
            viewport_rows: 20,
            viewport_cols: 8,
            should_quit: false,
        }
    }

    /// Name of the selected cell, e.g. `"C7"`.
    pub fn selected_cell_name(&self) -> String {
        Spreadsheet::cell_name(self.selected_row, self.selected_col)
    }

    /// Switches to editing mode, loading the selected cell's raw expression.
    pub fn start_editing(&mut self) {
        self.mode = AppMode::Editing;
        self.input = self
            .spreadsheet
            .get_expression(self.selected_row, self.selected_col)
            .to_string();
        self.cursor_position = self.input.chars().count();
    }

    /// Stores the edit buffer into the selected cell and moves down a row.
    pub fn finish_editing(&mut self) {
        let text = std::mem::take(&mut self.input);
        self.spreadsheet
            .update_cell(self.selected_row, self.selected_col, &text);

        if self.selected_row + 1 < self.spreadsheet.rows() {
            self.selected_row += 1;
            self.ensure_cursor_visible();
        }

        self.mode = AppMode::Normal;
        self.cursor_position = 0;
    }

    pub fn cancel_editing(&mut self) {
        self.mode = AppMode::Normal;
        self.input.clear();
        self.cursor_position = 0;
    }

    pub fn move_selection(&mut self, d_row: isize, d_col: isize) {
        let max_row = self.spreadsheet.rows().saturating_sub(1);
        let max_col = self.spreadsheet.cols().saturating_sub(1);
        self.selected_row = self.selected_row.saturating_add_signed(d_row).min(max_row);
        self.selected_col = self.selected_col.saturating_add_signed(d_col).min(max_col);
        self.ensure_cursor_visible();
    }

    pub fn add_row(&mut self) {
        self.spreadsheet.add_row();
        self.status_message = Some(format!("Added row {}", self.spreadsheet.rows()));
    }

    pub fn delete_row(&mut self) {
        if self.spreadsheet.delete_row() {
            self.status_message = Some(format!("Deleted row {}", self.spreadsheet.rows() + 1));
            self.clamp_selection();
        } else {
            self.status_message = Some("Cannot delete the only row".to_string());
        }
    }

    pub fn add_column(&mut self) {
        self.spreadsheet.add_column();
        self.status_message = Some(format!(
            "Added column {}",
            Spreadsheet::column_name(self.spreadsheet.cols())
        ));
    }

    pub fn delete_column(&mut self) {
        if self.spreadsheet.delete_column() {
            self.status_message = Some(format!(
                "Deleted column {}",
                Spreadsheet::column_name(self.spreadsheet.cols() + 1)
            ));
            self.clamp_selection();
        } else {
            self.status_message = Some("Cannot delete the only column".to_string());
        }
    }

    pub fn recalculate(&mut self) {
        self.spreadsheet.recalculate_all();
        self.status_message = Some("Recalculated".to_string());
    }

    pub fn toggle_formula_view(&mut self) {
        let formulas = self.spreadsheet.toggle_formula_view();
        self.status_message = Some(if formulas {
            "Showing expressions".to_string()
        } else {
            "Showing values".to_string()
        });
    }

    pub fn start_save_as(&mut self) {
        self.start_filename_prompt(AppMode::SaveAs);
    }

    pub fn start_load_file(&mut self) {
        self.start_filename_prompt(AppMode::LoadFile);
    }

    fn start_filename_prompt(&mut self, mode: AppMode) {
        self.mode = mode;
        self.filename_input = self
            .filename
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        self.cursor_position = self.filename_input.chars().count();
        self.status_message = None;
    }

    pub fn cancel_filename_input(&mut self) {
        self.mode = AppMode::Normal;
        self.filename_input.clear();
        self.cursor_position = 0;
    }

    /// Path typed into the filename prompt, falling back to the default.
    pub fn prompt_path(&self) -> PathBuf {
        let trimmed = self.filename_input.trim();
        if trimmed.is_empty() {
            PathBuf::from(DEFAULT_FILENAME)
        } else {
            PathBuf::from(trimmed)
        }
    }

    /// Processes the result of a save operation.
    pub fn set_save_result(&mut self, path: PathBuf, result: PersistenceResult<()>) {
        match result {
            Ok(()) => {
                self.status_message = Some(format!("Saved to {}", path.display()));
                self.filename = Some(path);
            }
            Err(error) => {
                self.status_message = Some(format!("Save failed: {}", error));
            }
        }
        self.finish_filename_prompt();
    }

    /// Processes the result of a load operation. On success the view is
    /// reset to the top-left cell.
    pub fn set_load_result(&mut self, path: PathBuf, result: PersistenceResult<()>) {
        match result {
            Ok(()) => {
                self.selected_row = 0;
                self.selected_col = 0;
                self.scroll_row = 0;
                self.scroll_col = 0;
                self.status_message = Some(format!("Loaded from {}", path.display()));
                self.filename = Some(path);
            }
            Err(error) => {
                self.status_message = Some(format!("Load failed: {}", error));
            }
        }
        self.finish_filename_prompt();
    }

    fn finish_filename_prompt(&mut self) {
        self.mode = AppMode::Normal;
        self.filename_input.clear();
        self.cursor_position = 0;
    }

    pub fn request_exit(&mut self) {
        self.mode = AppMode::ConfirmExit;
    }

    pub fn confirm_exit(&mut self, confirmed: bool) {
        if confirmed {
            self.should_quit = true;
        } else {
            self.mode = AppMode::Normal;
        }
    }

    pub fn update_viewport_size(&mut self, rows: usize, cols: usize) {
        self.viewport_rows = rows.max(1);
        self.viewport_cols = cols.max(1);
        self.ensure_cursor_visible();
    }

    /// Scrolls so the selected cell lies inside the viewport.
    pub fn ensure_cursor_visible(&mut self) {
        if self.selected_row < self.scroll_row {
            self.scroll_row = self.selected_row;
        } else if self.selected_row >= self.scroll_row + self.viewport_rows {
            self.scroll_row = self.selected_row + 1 - self.viewport_rows;
        }

        if self.selected_col < self.scroll_col {
            self.scroll_col = self.selected_col;
        } else if self.selected_col >= self.scroll_col + self.viewport_cols {
            self.scroll_col = self.selected_col + 1 - self.viewport_cols;
        }
    }

    fn clamp_selection(&mut self) {
        self.move_selection(0, 0);
        self.scroll_row = self.scroll_row.min(self.selected_row);
        self.scroll_col = self.scroll_col.min(self.selected_col);
    }
}
