//! Row and text truncation per spec.md §4.9: every tool that returns tabular
//! data truncates to `max_rows` rows and `max_text_bytes` per text field,
//! setting `truncated: true` on the envelope when either limit bites.

use super::SecurityError;

#[derive(Debug, Clone)]
pub struct OutputBudget {
    max_rows: usize,
    max_text_bytes: usize,
}

impl OutputBudget {
    pub fn new(max_rows: usize, max_text_bytes: usize) -> Self {
        Self {
            max_rows,
            max_text_bytes,
        }
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn max_text_bytes(&self) -> usize {
        self.max_text_bytes
    }

    pub fn check_rows(&self, count: usize) -> Result<(), SecurityError> {
        if count > self.max_rows {
            Err(SecurityError::TooManyRows {
                count,
                max: self.max_rows,
            })
        } else {
            Ok(())
        }
    }

    /// Truncate a single text field to `max_text_bytes`, on a char boundary.
    /// Returns `(text, was_truncated)`.
    pub fn enforce_text(&self, text: &str) -> (String, bool) {
        if text.len() <= self.max_text_bytes {
            return (text.to_string(), false);
        }
        let mut end = self.max_text_bytes;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        (text[..end].to_string(), true)
    }

    /// Truncate `rows` to `max_rows`. Returns `(rows, was_truncated)`.
    pub fn enforce_rows<T>(&self, rows: Vec<T>) -> (Vec<T>, bool) {
        if rows.len() <= self.max_rows {
            (rows, false)
        } else {
            let truncated: Vec<T> = rows.into_iter().take(self.max_rows).collect();
            (truncated, true)
        }
    }
}

impl Default for OutputBudget {
    fn default() -> Self {
        Self::new(10_000, 8192)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_budget_is_ok() {
        let budget = OutputBudget::new(100, 1000);
        assert!(budget.check_rows(50).is_ok());
    }

    #[test]
    fn exceeds_row_budget() {
        let budget = OutputBudget::new(100, 1000);
        let result = budget.check_rows(200);
        assert!(matches!(
            result,
            Err(SecurityError::TooManyRows { count: 200, max: 100 })
        ));
    }

    #[test]
    fn enforce_text_under_limit_is_unchanged() {
        let budget = OutputBudget::new(10, 100);
        let (text, truncated) = budget.enforce_text("short");
        assert_eq!(text, "short");
        assert!(!truncated);
    }

    #[test]
    fn enforce_text_over_limit_truncates() {
        let budget = OutputBudget::new(10, 5);
        let (text, truncated) = budget.enforce_text("hello world");
        assert_eq!(text, "hello");
        assert!(truncated);
    }

    #[test]
    fn enforce_rows_truncates() {
        let budget = OutputBudget::new(5, 1000);
        let (rows, truncated): (Vec<i32>, bool) = budget.enforce_rows(vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(rows.len(), 5);
        assert!(truncated);
    }

    #[test]
    fn enforce_rows_under_limit_unchanged() {
        let budget = OutputBudget::new(5, 1000);
        let (rows, truncated): (Vec<i32>, bool) = budget.enforce_rows(vec![1, 2, 3]);
        assert_eq!(rows, vec![1, 2, 3]);
        assert!(!truncated);
    }
}
