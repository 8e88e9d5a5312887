//! Terminal rendering of data frames.

use polars::prelude::*;

/// Placeholder shown for null cells.
pub const NULL_CELL: &str = "NA";

/// Decimals shown for floats on screen.
pub const DISPLAY_PRECISION: usize = 3;

/// A titled frame rendered as a plain-text or Markdown table.
#[derive(Debug, Clone)]
pub struct TableView<'a> {
    title: String,
    frame: &'a DataFrame,
    precision: usize,
}

impl<'a> TableView<'a> {
    /// Create a view over `frame`.
    pub fn new(title: impl Into<String>, frame: &'a DataFrame) -> Self {
        Self {
            title: title.into(),
            frame,
            precision: DISPLAY_PRECISION,
        }
    }

    /// Override the number of decimals shown for floats.
    pub const fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    fn headers(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn rows(&self) -> PolarsResult<Vec<Vec<String>>> {
        let columns = self.frame.get_columns();
        (0..self.frame.height())
            .map(|row| {
                columns
                    .iter()
                    .map(|c| Ok(display_cell(&c.get(row)?, self.precision)))
                    .collect()
            })
            .collect()
    }

    /// Format as ASCII table for terminal display.
    ///
    /// # Errors
    ///
    /// Returns an error if a cell cannot be read.
    pub fn to_ascii_table(&self) -> PolarsResult<String> {
        let headers = self.headers();
        let rows = self.rows()?;

        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        let total = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        let rule = total.max(self.title.chars().count());

        let mut output = String::new();
        output.push_str(&format!("\n{}\n", self.title));
        output.push_str(&"=".repeat(rule));
        output.push('\n');

        if headers.is_empty() {
            output.push_str("(no columns)\n");
            return Ok(output);
        }

        output.push_str(&pad_row(&headers, &widths));
        output.push_str(&"-".repeat(rule));
        output.push('\n');
        for row in &rows {
            output.push_str(&pad_row(row, &widths));
        }
        if rows.is_empty() {
            output.push_str("(no rows)\n");
        }

        Ok(output)
    }

    /// Format as a Markdown table.
    ///
    /// # Errors
    ///
    /// Returns an error if a cell cannot be read.
    pub fn to_markdown(&self) -> PolarsResult<String> {
        let headers = self.headers();
        let mut output = format!("## {}\n\n", self.title);

        if headers.is_empty() {
            output.push_str("_No columns._\n");
            return Ok(output);
        }

        output.push_str(&format!("| {} |\n", headers.join(" | ")));
        output.push_str(&format!(
            "|{}\n",
            headers.iter().map(|_| "---|").collect::<String>()
        ));
        for row in self.rows()? {
            let escaped: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
            output.push_str(&format!("| {} |\n", escaped.join(" | ")));
        }

        Ok(output)
    }
}

fn pad_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, w))| {
            // First column is the label column
            if i == 0 {
                format!("{cell:<w$}")
            } else {
                format!("{cell:>w$}")
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line.push('\n');
    line
}

/// Format a cell for display.
pub fn display_cell(value: &AnyValue<'_>, precision: usize) -> String {
    match value {
        AnyValue::Null => NULL_CELL.to_string(),
        AnyValue::Float64(v) => format!("{v:.precision$}"),
        AnyValue::Float32(v) => format!("{v:.precision$}"),
        AnyValue::String(s) => (*s).to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df!(
            "entity_id" => ["ECOPETROL", "ISA"],
            "gamma_crra" => [Some(1.23456), None],
        )
        .unwrap()
    }

    #[test]
    fn test_ascii_table_layout() {
        let frame = sample();
        let text = TableView::new("Gammas", &frame).to_ascii_table().unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "Gammas");
        assert!(lines[2].chars().all(|c| c == '='));
        assert_eq!(lines[3], "entity_id  gamma_crra");
        assert_eq!(lines[5], "ECOPETROL       1.235");
        assert_eq!(lines[6], "ISA                NA");
    }

    #[test]
    fn test_markdown_table() {
        let frame = sample();
        let md = TableView::new("Gammas", &frame)
            .with_precision(2)
            .to_markdown()
            .unwrap();

        assert!(md.starts_with("## Gammas\n\n"));
        assert!(md.contains("| entity_id | gamma_crra |\n|---|---|\n"));
        assert!(md.contains("| ECOPETROL | 1.23 |"));
        assert!(md.contains("| ISA | NA |"));
    }

    #[test]
    fn test_empty_frame() {
        let frame = DataFrame::empty();
        let text = TableView::new("Nothing", &frame).to_ascii_table().unwrap();
        assert!(text.contains("(no columns)"));

        let frame = df!("entity_id" => Vec::<String>::new()).unwrap();
        let text = TableView::new("Nothing", &frame).to_ascii_table().unwrap();
        assert!(text.contains("(no rows)"));
    }
}
