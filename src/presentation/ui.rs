use crate::application::{App, AppMode};
use crate::domain::Spreadsheet;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

/// Width of every grid column, in terminal cells.
pub const COLUMN_WIDTH: u16 = 10;
const ROW_LABEL_WIDTH: u16 = 5;
const HEADER_HEIGHT: u16 = 1;
const STATUS_HEIGHT: u16 = 3;

/// Number of grid rows and columns that fit in a terminal of this size.
pub fn viewport_for(width: u16, height: u16) -> (usize, usize) {
    // Table borders plus the column-letter row.
    let rows = height.saturating_sub(HEADER_HEIGHT + STATUS_HEIGHT + 3);
    let cols = width.saturating_sub(2 + ROW_LABEL_WIDTH) / (COLUMN_WIDTH + 1);
    (rows.max(1) as usize, cols.max(1) as usize)
}

pub fn render_ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(STATUS_HEIGHT),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_grid(f, app, chunks[1]);
    render_status_bar(f, app, chunks[2]);

    if app.mode == AppMode::Help {
        render_help_popup(f, app.help_scroll);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let header = Paragraph::new(format!(
        "gridcalc | {} | {}",
        app.selected_cell_name(),
        app.spreadsheet
            .get_expression(app.selected_row, app.selected_col)
    ))
    .style(Style::default().fg(Color::Cyan));
    f.render_widget(header, area);
}

fn render_grid(f: &mut Frame, app: &App, area: Rect) {
    let sheet = &app.spreadsheet;
    let last_row = (app.scroll_row + app.viewport_rows).min(sheet.rows());
    let last_col = (app.scroll_col + app.viewport_cols).min(sheet.cols());

    let mut headers = vec![Cell::from("")];
    for col in app.scroll_col..last_col {
        let style = if col == app.selected_col {
            Style::default().bg(Color::LightBlue).fg(Color::Black)
        } else {
            Style::default().fg(Color::Yellow)
        };
        headers.push(Cell::from(Spreadsheet::column_name(col + 1)).style(style));
    }

    let mut rows = vec![Row::new(headers).height(1)];

    for row in app.scroll_row..last_row {
        let label_style = if row == app.selected_row {
            Style::default().bg(Color::LightBlue).fg(Color::Black)
        } else {
            Style::default().fg(Color::Yellow)
        };
        let mut cells = vec![Cell::from(format!("{}", row + 1)).style(label_style)];

        for col in app.scroll_col..last_col {
            let text = sheet.get_display_value(row, col);
            let style = if row == app.selected_row && col == app.selected_col {
                Style::default().bg(Color::Blue).fg(Color::White)
            } else if text.starts_with("#ERROR") {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            cells.push(Cell::from(text).style(style));
        }

        rows.push(Row::new(cells).height(1));
    }

    let mut widths = vec![Constraint::Length(ROW_LABEL_WIDTH)];
    widths.extend((app.scroll_col..last_col).map(|_| Constraint::Length(COLUMN_WIDTH)));

    let title = format!(
        "{}x{}{}",
        sheet.rows(),
        sheet.cols(),
        if sheet.is_formula_view() { " [expressions]" } else { "" }
    );
    let table = Table::new(rows, widths)
        .block(Block::default().borders(Borders::ALL).title(title))
        .column_spacing(1);

    f.render_widget(table, area);
}

fn status_text(app: &App) -> String {
    match app.mode {
        AppMode::Normal => app.status_message.clone().unwrap_or_else(|| {
            let filename = app
                .filename
                .as_ref()
                .map_or_else(|| "unsaved".to_string(), |path| path.display().to_string());
            format!("File: {} | Enter: edit | Ctrl+S: save | Ctrl+O: load | F1/?: help | q: quit", filename)
        }),
        AppMode::Editing => format!("{}: {} (Enter to save, Esc to cancel)", app.selected_cell_name(), app.input),
        AppMode::Help => "↑↓/jk: scroll | PgUp/PgDn: fast scroll | Home: top | Esc/q: close help".to_string(),
        AppMode::SaveAs => format!("Save as: {} (Enter to save, Esc to cancel)", app.filename_input),
        AppMode::LoadFile => format!("Load file: {} (Enter to load, Esc to cancel)", app.filename_input),
        AppMode::ConfirmExit => "Really quit? (y/n)".to_string(),
    }
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let style = match app.mode {
        AppMode::Normal => Style::default(),
        AppMode::Editing => Style::default().fg(Color::Green),
        AppMode::Help => Style::default().fg(Color::Cyan),
        AppMode::SaveAs | AppMode::LoadFile => Style::default().fg(Color::Yellow),
        AppMode::ConfirmExit => Style::default().fg(Color::Red),
    };
    let status = Paragraph::new(status_text(app))
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(style);
    f.render_widget(status, area);
}

fn render_help_popup(f: &mut Frame, scroll: usize) {
    let area = f.area();
    let popup_area = Rect {
        x: area.width / 10,
        y: area.height / 10,
        width: area.width * 4 / 5,
        height: area.height * 4 / 5,
    };

    f.render_widget(Clear, popup_area);

    let help_lines: Vec<&str> = HELP_TEXT.lines().collect();
    let visible_height = popup_area.height.saturating_sub(2) as usize;

    let start_line = scroll.min(help_lines.len().saturating_sub(visible_height));
    let end_line = (start_line + visible_height).min(help_lines.len());

    let help_widget = Paragraph::new(help_lines[start_line..end_line].join("\n"))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Help (line {}/{})", start_line + 1, help_lines.len()))
                .style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().fg(Color::White));

    f.render_widget(help_widget, popup_area);
}

/// Renders the whole grid as aligned plain text, one line per row, for
/// non-interactive output.
pub fn plain_table(sheet: &Spreadsheet) -> String {
    let label_width = sheet.rows().to_string().len();
    let columns: Vec<Vec<String>> = (0..sheet.cols())
        .map(|col| {
            (0..sheet.rows())
                .map(|row| sheet.get_display_value(row, col))
                .collect()
        })
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(col, values)| {
            values
                .iter()
                .map(|value| value.chars().count())
                .chain(std::iter::once(Spreadsheet::column_name(col + 1).len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = format!("{:label_width$}", "");
    for (col, width) in widths.iter().enumerate() {
        out.push_str(&format!(" | {:width$}", Spreadsheet::column_name(col + 1)));
    }
    out = out.trim_end().to_string();
    out.push('\n');

    for row in 0..sheet.rows() {
        let mut line = format!("{:>label_width$}", row + 1);
        for (values, width) in columns.iter().zip(&widths) {
            line.push_str(&format!(" | {:width$}", values[row]));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

const HELP_TEXT: &str = r#"GRIDCALC

=== CELLS ===
• Text starting with = is a formula; anything else is shown as typed
• Cells are named by column letters and row number: A1, B12, AA3
• Names are case insensitive
• A formula that refers to a text or empty cell shows #ERROR

=== OPERATORS (highest precedence first) ===
( )             Grouping
-x  +x          Negation / identity
++x  x++        Add one (also: inc x, x inc)
--x  x--        Subtract one (also: dec x, x dec)
^               Power, right-associative     =2^3^2 → 512
*  /            Multiply, divide              =A1*2
mod  %          Remainder                     =7 mod 3 → 1
div             Integer division              =7 div 2 → 3
+  -            Add, subtract

Note: write 5 - -3, not 5--3 (-- is decrement)

=== FUNCTIONS ===
mmin(a, b, ...) Smallest argument             =mmin(A1, B1, 7)
mmax(a, b, ...) Largest argument              =mmax(A1, 0)

=== ERRORS ===
Division by zero, circular references, references outside the
grid and syntax errors show as #ERROR: <reason> in the cell.

=== KEYS ===
Arrows / hjkl   Move selection
Enter / F2      Edit selected cell
=               Start a new formula in the selected cell
Delete          Clear selected cell
F5              Recalculate everything
Ctrl+F          Toggle between values and expressions
Ctrl+R / Ctrl+D Add / delete last row
Ctrl+N / Ctrl+X Add / delete last column
Ctrl+S / Ctrl+O Save / load (JSON)
F1 or ?         This help
q               Quit (asks for confirmation)"#;
