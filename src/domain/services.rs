//! Grid recalculation.
//!
//! Every edit triggers a full row-major pass over the grid. Formula cells are
//! evaluated on demand: a reference to another cell re-enters
//! [`RecalcContext::evaluate_cell`] for that cell, guarded by the chain of
//! names currently being evaluated.

use std::collections::HashSet;

use super::errors::{EvalError, EvalResult};
use super::evaluator::{CellResolver, ExpressionEvaluator};
use super::models::{CellValue, Spreadsheet};
use super::parser::parse_expression;

/// Budget for one top-level evaluation: every formula entered along the
/// reference chain costs its tree height plus one. Past this the cell that
/// started the chain gets [`EvalError::TooDeep`].
pub const MAX_EVALUATION_DEPTH: usize = 4096;

/// State for evaluating one top-level cell.
///
/// The chain holds every cell name entered and not yet finished. Reaching a
/// name that is already in it means the formulas form a cycle.
pub struct RecalcContext<'a> {
    sheet: &'a Spreadsheet,
    chain: HashSet<String>,
    depth: usize,
}

impl<'a> RecalcContext<'a> {
    pub fn new(sheet: &'a Spreadsheet) -> Self {
        Self {
            sheet,
            chain: HashSet::new(),
            depth: 0,
        }
    }

    /// Numeric value of the cell at `(row, col)`, evaluating its formula and
    /// everything it references.
    pub fn evaluate_cell(&mut self, row: usize, col: usize) -> EvalResult<f64> {
        let sheet = self.sheet;
        let name = Spreadsheet::cell_name(row, col);
        let cell = sheet
            .get_cell(row, col)
            .ok_or_else(|| EvalError::OutOfRange(name.clone()))?;

        if self.chain.contains(&name) {
            return Err(EvalError::CircularReference(name));
        }
        log::trace!("evaluating {}", name);
        self.chain.insert(name.clone());

        let Some(body) = cell.formula_body() else {
            self.chain.remove(&name);
            return parse_literal(&cell.expression).ok_or(EvalError::NotANumber(name));
        };

        let expr = parse_expression(body)?;
        let cost = expr.depth() + 1;
        if self.depth + cost > MAX_EVALUATION_DEPTH {
            log::debug!("evaluation depth exceeded at {}", name);
            return Err(EvalError::TooDeep(name));
        }

        self.depth += cost;
        let result = ExpressionEvaluator::new(self).evaluate(&expr);
        self.depth -= cost;

        let value = result?;
        self.chain.remove(&name);
        Ok(value)
    }
}

impl CellResolver for RecalcContext<'_> {
    fn resolve(&mut self, name: &str) -> EvalResult<f64> {
        match Spreadsheet::parse_cell_name(name) {
            Some((row, col)) if self.sheet.in_bounds(row, col) => self.evaluate_cell(row, col),
            _ => Err(EvalError::OutOfRange(name.to_string())),
        }
    }
}

/// Numeric value of a literal cell. Only plain decimal spellings count, so
/// words like `inf` or `NaN` stay text.
fn parse_literal(text: &str) -> Option<f64> {
    let text = text.trim();
    if !text
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    text.parse().ok()
}

impl Spreadsheet {
    /// Computed value of one cell, without touching any stored value.
    pub fn compute_value(&self, row: usize, col: usize) -> CellValue {
        let Some(cell) = self.get_cell(row, col) else {
            return CellValue::Empty;
        };

        if cell.is_blank() {
            CellValue::Empty
        } else if !cell.is_formula() {
            CellValue::Text(cell.expression.clone())
        } else {
            match RecalcContext::new(self).evaluate_cell(row, col) {
                Ok(number) => CellValue::Number(number),
                Err(err) => {
                    log::debug!("{}: {}", Spreadsheet::cell_name(row, col), err);
                    CellValue::Error(err)
                }
            }
        }
    }

    /// Recomputes every cell in row-major order.
    ///
    /// Errors never abort the pass; they become the failing cell's value.
    pub fn recalculate_all(&mut self) {
        let mut errors = 0usize;
        for row in 0..self.rows() {
            for col in 0..self.cols() {
                let value = self.compute_value(row, col);
                if matches!(value, CellValue::Error(_)) {
                    errors += 1;
                }
                if let Some(cell) = self.get_cell_mut(row, col) {
                    cell.value = value;
                }
            }
        }
        log::debug!(
            "recalculated {}x{} grid, {} cell(s) in error",
            self.rows(),
            self.cols(),
            errors
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_with(rows: usize, cols: usize, entries: &[(&str, &str)]) -> Spreadsheet {
        let mut sheet = Spreadsheet::new(rows, cols);
        for (name, text) in entries {
            let (row, col) = Spreadsheet::parse_cell_name(name).unwrap();
            sheet.update_cell(row, col, text);
        }
        sheet
    }

    fn display(sheet: &Spreadsheet, name: &str) -> String {
        let (row, col) = Spreadsheet::parse_cell_name(name).unwrap();
        sheet.get_display_value(row, col)
    }

    fn value(sheet: &Spreadsheet, name: &str) -> CellValue {
        let (row, col) = Spreadsheet::parse_cell_name(name).unwrap();
        sheet.get_cell(row, col).unwrap().value.clone()
    }

    #[test]
    fn test_literal_cells_display_verbatim() {
        let sheet = sheet_with(2, 2, &[("A1", "hello world"), ("B1", "  42 "), ("A2", "   ")]);
        assert_eq!(display(&sheet, "A1"), "hello world");
        assert_eq!(display(&sheet, "B1"), "  42 ");
        assert_eq!(value(&sheet, "A2"), CellValue::Empty);
        assert_eq!(display(&sheet, "B2"), "");
    }

    #[test]
    fn test_basic_scenario() {
        let sheet = sheet_with(3, 3, &[("A1", "5"), ("B1", "=A1*2"), ("C1", "=mmax(A1,B1,7)")]);
        assert_eq!(display(&sheet, "A1"), "5");
        assert_eq!(display(&sheet, "B1"), "10");
        assert_eq!(display(&sheet, "C1"), "10");
    }

    #[test]
    fn test_forward_references_resolve_in_one_pass() {
        let sheet = sheet_with(3, 1, &[("A1", "=A2+A3"), ("A2", "=A3*2"), ("A3", "4")]);
        assert_eq!(display(&sheet, "A1"), "12");
        assert_eq!(display(&sheet, "A2"), "8");
    }

    #[test]
    fn test_self_reference() {
        let sheet = sheet_with(2, 2, &[("A1", "=A1+1")]);
        assert_eq!(
            value(&sheet, "A1"),
            CellValue::Error(EvalError::CircularReference("A1".to_string()))
        );
    }

    #[test]
    fn test_mutual_cycle_marks_both_cells() {
        let sheet = sheet_with(2, 2, &[("A1", "=B1"), ("B1", "=A1")]);
        for name in ["A1", "B1"] {
            let shown = display(&sheet, name);
            assert!(shown.starts_with("#ERROR"), "{name}: {shown}");
            assert!(shown.contains("Circular reference"), "{name}: {shown}");
        }
    }

    #[test]
    fn test_cycle_reached_through_dependency() {
        let sheet = sheet_with(
            3,
            3,
            &[("A1", "=B1+1"), ("B1", "=C1+1"), ("C1", "=B1"), ("A2", "=A1")],
        );
        for name in ["A1", "B1", "C1", "A2"] {
            assert!(matches!(
                value(&sheet, name),
                CellValue::Error(EvalError::CircularReference(_))
            ));
        }
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let sheet = sheet_with(2, 2, &[("A1", "2"), ("B1", "=A1*3"), ("A2", "=A1+B1"), ("B2", "=A2+B1+A1")]);
        assert_eq!(display(&sheet, "A2"), "8");
        assert_eq!(display(&sheet, "B2"), "16");
    }

    #[test]
    fn test_out_of_range_reference() {
        let sheet = sheet_with(5, 5, &[("A1", "=Z999")]);
        assert_eq!(
            value(&sheet, "A1"),
            CellValue::Error(EvalError::OutOfRange("Z999".to_string()))
        );
    }

    #[test]
    fn test_unmappable_names_are_out_of_range() {
        let sheet = sheet_with(
            2,
            2,
            &[("A1", "=A0+1"), ("B1", "=A99999999999999999999999"), ("A2", "=ZZZZZZZZZZZZZZZ1")],
        );
        assert_eq!(
            value(&sheet, "A1"),
            CellValue::Error(EvalError::OutOfRange("A0".to_string()))
        );
        assert_eq!(
            value(&sheet, "B1"),
            CellValue::Error(EvalError::OutOfRange("A99999999999999999999999".to_string()))
        );
        assert_eq!(
            value(&sheet, "A2"),
            CellValue::Error(EvalError::OutOfRange("ZZZZZZZZZZZZZZZ1".to_string()))
        );
    }

    #[test]
    fn test_non_finite_spellings_are_not_numbers() {
        let sheet = sheet_with(
            2,
            3,
            &[("A1", "inf"), ("B1", "NaN"), ("C1", "1e3"), ("A2", "=A1+1"), ("B2", "=B1+1"), ("C2", "=C1+1")],
        );
        assert_eq!(
            value(&sheet, "A2"),
            CellValue::Error(EvalError::NotANumber("A1".to_string()))
        );
        assert_eq!(
            value(&sheet, "B2"),
            CellValue::Error(EvalError::NotANumber("B1".to_string()))
        );
        assert_eq!(display(&sheet, "C2"), "1001");
    }

    /// Column A where each cell adds one to the cell below; the bottom
    /// cell is `0`.
    fn counting_chain(len: usize) -> Spreadsheet {
        let rows = (0..len)
            .map(|row| {
                if row + 1 == len {
                    vec!["0".to_string()]
                } else {
                    vec![format!("=A{}+1", row + 2)]
                }
            })
            .collect();
        Spreadsheet::from_expressions(rows).unwrap()
    }

    /// Deep chains recurse once per referenced cell, so run them with room
    /// to spare regardless of the test thread's default stack.
    fn with_large_stack(test: impl FnOnce() + Send + 'static) {
        std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(test)
            .unwrap()
            .join()
            .unwrap();
    }

    #[test]
    fn test_long_reference_chain_resolves() {
        with_large_stack(|| {
            let sheet = counting_chain(1000);
            assert_eq!(sheet.compute_value(0, 0), CellValue::Number(999.0));
        });
    }

    #[test]
    fn test_reference_chain_past_budget_is_cell_error() {
        with_large_stack(|| {
            let sheet = counting_chain(5000);
            let top = sheet.compute_value(0, 0);
            assert!(matches!(top, CellValue::Error(EvalError::TooDeep(_))));
            assert!(top.to_string().starts_with("#ERROR: References through A"));
            assert_eq!(sheet.compute_value(4000, 0), CellValue::Number(999.0));
        });
    }

    #[test]
    fn test_reference_to_text_or_empty_cell() {
        let sheet = sheet_with(2, 2, &[("A1", "apple"), ("B1", "=A1+1"), ("A2", "=B2*2")]);
        assert_eq!(
            value(&sheet, "B1"),
            CellValue::Error(EvalError::NotANumber("A1".to_string()))
        );
        assert_eq!(
            value(&sheet, "A2"),
            CellValue::Error(EvalError::NotANumber("B2".to_string()))
        );
    }

    #[test]
    fn test_literal_numbers_are_trimmed() {
        let sheet = sheet_with(1, 2, &[("A1", " 2.5 "), ("B1", "=A1*2")]);
        assert_eq!(display(&sheet, "B1"), "5");
    }

    #[test]
    fn test_error_does_not_abort_pass() {
        let sheet = sheet_with(2, 2, &[("A1", "=10/0"), ("B1", "3"), ("A2", "=B1+1"), ("B2", "=(")]);
        let shown = display(&sheet, "A1");
        assert!(shown.starts_with("#ERROR"));
        assert!(shown.contains("Division by zero"));
        assert_eq!(display(&sheet, "A2"), "4");
        assert!(matches!(value(&sheet, "B2"), CellValue::Error(EvalError::Syntax { .. })));
    }

    #[test]
    fn test_errors_propagate_through_references() {
        let sheet = sheet_with(1, 2, &[("A1", "=1/0"), ("B1", "=A1+1")]);
        assert_eq!(value(&sheet, "B1"), CellValue::Error(EvalError::DivisionByZero));
    }

    #[test]
    fn test_edits_recompute_dependents() {
        let mut sheet = sheet_with(1, 2, &[("A1", "1"), ("B1", "=A1+1")]);
        assert_eq!(display(&sheet, "B1"), "2");
        sheet.update_cell(0, 0, "41");
        assert_eq!(display(&sheet, "B1"), "42");
        sheet.update_cell(0, 0, "");
        assert!(display(&sheet, "B1").starts_with("#ERROR"));
    }

    #[test]
    fn test_recalculation_is_idempotent() {
        let mut sheet = sheet_with(
            3,
            3,
            &[("A1", "3"), ("B1", "=A1^2"), ("C1", "=B1 mod 4"), ("A2", "=A3"), ("A3", "=A2"), ("B2", "x")],
        );
        let before = sheet.clone();
        sheet.recalculate_all();
        assert_eq!(sheet, before);
    }

    #[test]
    fn test_compute_value_outside_grid() {
        let sheet = Spreadsheet::new(1, 1);
        assert_eq!(sheet.compute_value(3, 3), CellValue::Empty);
    }

    #[test]
    fn test_context_chain_is_released_after_success() {
        let sheet = sheet_with(1, 2, &[("A1", "2"), ("B1", "=A1+A1")]);
        let mut ctx = RecalcContext::new(&sheet);
        assert_eq!(ctx.evaluate_cell(0, 1), Ok(4.0));
        assert_eq!(ctx.evaluate_cell(0, 1), Ok(4.0));
    }
}
