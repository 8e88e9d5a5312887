//! KPI summaries of risk-aversion coefficients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean coefficient for one estimation method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MethodMean {
    /// Display label of the method (CRRA, FTP, GARCH).
    pub method: String,

    /// Canonical column the mean was taken over.
    pub column: String,

    /// Mean over non-null values, `None` when every value is null.
    pub mean: Option<f64>,

    /// Number of non-null values that went into the mean.
    pub count: usize,
}

impl MethodMean {
    /// Mean of the present values in `values`.
    pub fn from_values(
        method: impl Into<String>,
        column: impl Into<String>,
        values: impl IntoIterator<Item = Option<f64>>,
    ) -> Self {
        let (sum, count) = values
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));

        Self {
            method: method.into(),
            column: column.into(),
            mean: (count > 0).then(|| sum / count as f64),
            count,
        }
    }
}

impl fmt::Display for MethodMean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mean {
            Some(mean) => write!(f, "{}: {:.3} (n={})", self.method, mean, self.count),
            None => write!(f, "{}: NA", self.method),
        }
    }
}

/// Average coefficients over a set of assets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KpiSummary {
    /// What the averages cover, e.g. "all assets" or "selection".
    pub scope: String,

    /// Number of assets in scope.
    pub assets: usize,

    /// One entry per method whose column is present.
    pub methods: Vec<MethodMean>,
}

impl KpiSummary {
    /// Create a summary.
    pub const fn new(scope: String, assets: usize, methods: Vec<MethodMean>) -> Self {
        Self {
            scope,
            assets,
            methods,
        }
    }

    /// Mean for a method label, if present.
    pub fn mean_for(&self, method: &str) -> Option<f64> {
        self.methods
            .iter()
            .find(|m| m.method.eq_ignore_ascii_case(method))
            .and_then(|m| m.mean)
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\nAverage risk aversion: {} ({} assets)\n",
            self.scope, self.assets
        ));
        output.push_str(&"=".repeat(48));
        output.push('\n');
        output.push_str(&format!("{:<20} {:>12} {:>12}\n", "Method", "Mean", "Assets"));
        output.push_str(&"-".repeat(48));
        output.push('\n');

        for m in &self.methods {
            let mean = m.mean.map_or_else(|| "NA".to_string(), |v| format!("{v:.3}"));
            output.push_str(&format!("{:<20} {:>12} {:>12}\n", m.method, mean, m.count));
        }
        if self.methods.is_empty() {
            output.push_str("(no gamma columns)\n");
        }

        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "## Average risk aversion: {}\n\n**Assets:** {}\n\n",
            self.scope, self.assets
        ));

        if self.methods.is_empty() {
            output.push_str("_No gamma columns._\n");
            return output;
        }

        output.push_str("| Method | Mean | Assets |\n");
        output.push_str("|--------|------|--------|\n");
        for m in &self.methods {
            let mean = m.mean.map_or_else(|| "NA".to_string(), |v| format!("{v:.3}"));
            output.push_str(&format!("| {} | {} | {} |\n", m.method, mean, m.count));
        }

        output
    }
}

impl fmt::Display for KpiSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Average risk aversion: {} ({} assets)", self.scope, self.assets)?;
        for m in &self.methods {
            writeln!(f, "  {m}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_mean_skips_nulls() {
        let m = MethodMean::from_values("CRRA", "gamma_crra", [Some(1.0), None, Some(3.0)]);
        assert_eq!(m.mean, Some(2.0));
        assert_eq!(m.count, 2);
    }

    #[test]
    fn test_method_mean_all_null() {
        let m = MethodMean::from_values("FTP", "gamma_ftp", [None, None]);
        assert_eq!(m.mean, None);
        assert_eq!(m.count, 0);
        assert_eq!(m.to_string(), "FTP: NA");
    }

    #[test]
    fn test_summary_rendering() {
        let summary = KpiSummary::new(
            "all assets".to_string(),
            3,
            vec![
                MethodMean::from_values("CRRA", "gamma_crra", [Some(1.5), Some(2.5)]),
                MethodMean::from_values("GARCH", "gamma_garch", [None]),
            ],
        );

        assert_eq!(summary.mean_for("crra"), Some(2.0));
        assert_eq!(summary.mean_for("GARCH"), None);
        assert_eq!(summary.mean_for("FTP"), None);

        let table = summary.to_ascii_table();
        assert!(table.contains("all assets (3 assets)"));
        assert!(table.contains("2.000"));

        let md = summary.to_markdown();
        assert!(md.contains("| CRRA | 2.000 | 2 |"));
        assert!(md.contains("| GARCH | NA | 0 |"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = KpiSummary::new("selection".to_string(), 0, vec![]);
        assert!(summary.to_ascii_table().contains("(no gamma columns)"));
        assert!(summary.to_markdown().contains("_No gamma columns._"));
    }
}
