//! Summary page: average coefficients per method.

use super::{PageView, f64_values, present_gammas};
use crate::assets::{AssetFilter, AssetSelection};
use crate::dataset::Dataset;
use crate::error::Result;
use aversion_output::{KpiSummary, MethodMean};
use polars::prelude::*;
use serde::Serialize;

/// Mean gamma per method, over the risk view and over the selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryPage {
    /// Averages over every asset of the risk view
    pub overall: KpiSummary,
    /// Averages over the selected assets, when a selection is active
    pub selection: Option<KpiSummary>,
}

impl SummaryPage {
    /// Build the page from the dataset's risk view.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while filtering.
    pub fn build(dataset: &Dataset, selection: &AssetSelection) -> Result<Self> {
        Self::from_frame(&dataset.risk_view()?, selection)
    }

    /// Build the page from an already filtered risk view.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while filtering.
    pub fn from_frame(risk: &DataFrame, selection: &AssetSelection) -> Result<Self> {
        let overall = kpis("all assets", risk)?;
        let selection = if selection.is_all() {
            None
        } else {
            Some(kpis("selection", &selection.apply(risk)?)?)
        };
        Ok(Self { overall, selection })
    }
}

fn kpis(scope: &str, frame: &DataFrame) -> Result<KpiSummary> {
    let methods = present_gammas(frame)
        .into_iter()
        .map(|field| -> PolarsResult<MethodMean> {
            let values = f64_values(frame, field.name())?;
            Ok(MethodMean::from_values(
                field.method_label().unwrap_or_default(),
                field.name(),
                values,
            ))
        })
        .collect::<PolarsResult<Vec<_>>>()?;

    Ok(KpiSummary::new(scope.to_string(), frame.height(), methods))
}

impl PageView for SummaryPage {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn to_text(&self) -> Result<String> {
        let mut output = self.overall.to_ascii_table();
        if let Some(selection) = &self.selection {
            output.push_str(&selection.to_ascii_table());
        }
        Ok(output)
    }

    fn to_markdown(&self) -> Result<String> {
        let mut output = self.overall.to_markdown();
        if let Some(selection) = &self.selection {
            output.push('\n');
            output.push_str(&selection.to_markdown());
        }
        Ok(output)
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
