use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::EvalError;

/// Leading character that marks a cell's text as a formula.
pub const FORMULA_MARKER: char = '=';

/// Initial grid extents used when nothing else is configured.
pub const DEFAULT_ROWS: usize = 20;
pub const DEFAULT_COLS: usize = 20;

/// The last computed result of a cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    /// Literal (non-formula) text, kept verbatim.
    Text(String),
    Error(EvalError),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(text) => f.write_str(text),
            CellValue::Error(err) => write!(f, "#ERROR: {}", err),
        }
    }
}

/// One grid slot: the raw text typed by the user and its computed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub expression: String,
    pub value: CellValue,
}

impl Cell {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            value: CellValue::Empty,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.expression.trim().is_empty()
    }

    pub fn is_formula(&self) -> bool {
        self.expression.trim_start().starts_with(FORMULA_MARKER)
    }

    /// The expression with surrounding whitespace and the formula marker
    /// removed, or `None` for literal cells.
    pub fn formula_body(&self) -> Option<&str> {
        self.expression.trim().strip_prefix(FORMULA_MARKER)
    }
}

/// A rectangular table of cells.
///
/// Every row always has the same number of columns and the grid never
/// shrinks below 1×1.
///
/// # Examples
///
/// ```
/// use gridcalc::domain::Spreadsheet;
///
/// let mut sheet = Spreadsheet::new(3, 3);
/// sheet.update_cell(0, 0, "5");
/// sheet.update_cell(0, 1, "=A1*2");
/// assert_eq!(sheet.get_display_value(0, 1), "10");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Spreadsheet {
    pub(crate) cells: Vec<Vec<Cell>>,
    formula_view: bool,
}

impl Default for Spreadsheet {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS, DEFAULT_COLS)
    }
}

impl Spreadsheet {
    /// Creates an empty grid; zero extents are raised to one.
    pub fn new(rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            cells: (0..rows).map(|_| vec![Cell::default(); cols]).collect(),
            formula_view: false,
        }
    }

    /// Builds a grid from raw expressions without recalculating.
    ///
    /// Returns `None` when `rows` is empty, ragged, or has an empty row.
    pub fn from_expressions(rows: Vec<Vec<String>>) -> Option<Self> {
        let width = rows.first()?.len();
        if width == 0 || rows.iter().any(|row| row.len() != width) {
            return None;
        }
        Some(Self {
            cells: rows
                .into_iter()
                .map(|row| row.into_iter().map(Cell::new).collect())
                .collect(),
            formula_view: false,
        })
    }

    /// Projects the grid onto its raw expressions.
    pub fn expressions(&self) -> Vec<Vec<String>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|cell| cell.expression.clone()).collect())
            .collect()
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows() && col < self.cols()
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(row)?.get(col)
    }

    pub(crate) fn get_cell_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        self.cells.get_mut(row)?.get_mut(col)
    }

    /// Raw text of a cell, or an empty string outside the grid.
    pub fn get_expression(&self, row: usize, col: usize) -> &str {
        self.get_cell(row, col)
            .map_or("", |cell| cell.expression.as_str())
    }

    /// Text to show for a cell: its computed value, or its raw expression
    /// while formula view is on. Empty outside the grid.
    pub fn get_display_value(&self, row: usize, col: usize) -> String {
        match self.get_cell(row, col) {
            Some(cell) if self.formula_view => cell.expression.clone(),
            Some(cell) => cell.value.to_string(),
            None => String::new(),
        }
    }

    pub fn is_formula_view(&self) -> bool {
        self.formula_view
    }

    /// Flips between showing computed values and raw expressions.
    pub fn toggle_formula_view(&mut self) -> bool {
        self.formula_view = !self.formula_view;
        self.formula_view
    }

    /// Stores new raw text for a cell and recalculates the whole grid.
    ///
    /// Returns `false` without recalculating when the coordinates are outside
    /// the grid or the text is unchanged.
    pub fn update_cell(&mut self, row: usize, col: usize, text: &str) -> bool {
        let Some(cell) = self.get_cell_mut(row, col) else {
            return false;
        };
        if cell.expression == text {
            return false;
        }
        cell.expression = text.to_string();
        self.recalculate_all();
        true
    }

    pub fn add_row(&mut self) {
        let cols = self.cols().max(1);
        self.cells.push(vec![Cell::default(); cols]);
        self.recalculate_all();
    }

    /// Removes the last row unless it is the only one.
    pub fn delete_row(&mut self) -> bool {
        if self.rows() <= 1 {
            return false;
        }
        self.cells.pop();
        self.recalculate_all();
        true
    }

    pub fn add_column(&mut self) {
        for row in &mut self.cells {
            row.push(Cell::default());
        }
        self.recalculate_all();
    }

    /// Removes the last column unless it is the only one.
    pub fn delete_column(&mut self) -> bool {
        if self.cols() <= 1 {
            return false;
        }
        for row in &mut self.cells {
            row.pop();
        }
        self.recalculate_all();
        true
    }

    /// Replaces the grid contents with another grid's cells, keeping the
    /// current view mode.
    pub fn replace_with(&mut self, other: Spreadsheet) {
        self.cells = other.cells;
        self.recalculate_all();
    }

    /// Converts a 1-based column number to letters: 1 -> "A", 26 -> "Z",
    /// 27 -> "AA". Returns an empty string for 0.
    pub fn column_name(col: usize) -> String {
        let mut result = String::new();
        let mut n = col;
        while n > 0 {
            let rem = (n - 1) % 26;
            result.insert(0, char::from(b'A' + rem as u8));
            n = (n - 1) / 26;
        }
        result
    }

    /// Converts column letters (any case) to a 1-based column number.
    pub fn column_number(letters: &str) -> Option<usize> {
        if letters.is_empty() {
            return None;
        }
        let mut result: usize = 0;
        for ch in letters.chars() {
            if !ch.is_ascii_alphabetic() {
                return None;
            }
            let digit = (ch.to_ascii_uppercase() as usize) - ('A' as usize) + 1;
            result = result.checked_mul(26)?.checked_add(digit)?;
        }
        Some(result)
    }

    /// Display name of a 0-based coordinate, e.g. `(11, 1)` -> `"B12"`.
    pub fn cell_name(row: usize, col: usize) -> String {
        format!("{}{}", Self::column_name(col + 1), row + 1)
    }

    /// Parses a display name such as `"b12"` into a 0-based `(row, col)`.
    pub fn parse_cell_name(name: &str) -> Option<(usize, usize)> {
        let split = name.find(|ch: char| !ch.is_ascii_alphabetic())?;
        let (letters, digits) = name.split_at(split);
        if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return None;
        }
        let col = Self::column_number(letters)?.checked_sub(1)?;
        let row = digits.parse::<usize>().ok()?.checked_sub(1)?;
        Some((row, col))
    }
}

/// Serializes only the raw expressions, as a nested array of strings.
impl Serialize for Spreadsheet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.rows()))?;
        for row in &self.cells {
            let expressions: Vec<&str> = row.iter().map(|cell| cell.expression.as_str()).collect();
            seq.serialize_element(&expressions)?;
        }
        seq.end()
    }
}

/// Deserialized grids carry raw expressions only; values stay empty until
/// the caller recalculates.
impl<'de> Deserialize<'de> for Spreadsheet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, SeqAccess, Visitor};

        struct GridVisitor;

        impl<'de> Visitor<'de> for GridVisitor {
            type Value = Spreadsheet;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a non-empty array of equal-length arrays of strings")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut rows: Vec<Vec<String>> = Vec::new();
                while let Some(row) = seq.next_element::<Vec<String>>()? {
                    rows.push(row);
                }
                Spreadsheet::from_expressions(rows)
                    .ok_or_else(|| de::Error::custom("grid must be a non-empty rectangle"))
            }
        }

        deserializer.deserialize_seq(GridVisitor)
    }
}
