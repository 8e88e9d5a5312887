//! Heatmaps: correlation between estimates, and monthly mean volatility.

use super::volatility::{VolatilitySeries, load_series};
use super::{PageView, f64_values, present_gammas, present_volatilities};
use crate::assets::{AssetFilter, AssetSelection};
use crate::dataset::Dataset;
use crate::error::{DashboardError, Result};
use aversion_output::TableView;
use chrono::{Datelike, NaiveDate};
use ndarray::Array2;
use polars::prelude::*;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// Pearson correlation matrix over pairwise complete observations.
///
/// Cells are NaN when a pair has fewer than two joint observations or one of
/// the two columns is constant over them.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    columns: Vec<String>,
    values: Array2<f64>,
    pairs: Array2<usize>,
}

impl CorrelationMatrix {
    /// Correlate the named columns of `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::InsufficientData`] with fewer than two
    /// columns, or a polars error if a column is missing.
    pub fn compute(frame: &DataFrame, columns: &[&str]) -> Result<Self> {
        if columns.len() < 2 {
            return Err(DashboardError::InsufficientData(format!(
                "correlation needs at least two columns, got {}",
                columns.len()
            )));
        }

        let data = columns
            .iter()
            .map(|c| f64_values(frame, c))
            .collect::<PolarsResult<Vec<_>>>()?;

        let n = columns.len();
        let mut values = Array2::from_elem((n, n), f64::NAN);
        let mut pairs = Array2::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let (r, count) = pearson(&data[i], &data[j]);
                let r = r.unwrap_or(f64::NAN);
                values[[i, j]] = r;
                values[[j, i]] = r;
                pairs[[i, j]] = count;
                pairs[[j, i]] = count;
            }
        }

        Ok(Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            values,
            pairs,
        })
    }

    /// Column names, in matrix order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The raw matrix, NaN where undefined.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Joint observation counts.
    pub const fn pairs(&self) -> &Array2<usize> {
        &self.pairs
    }

    /// Correlation between two named columns.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        let r = self.values[[i, j]];
        (!r.is_nan()).then_some(r)
    }

    /// Matrix rows with undefined cells as `None`.
    pub fn rows(&self) -> Vec<Vec<Option<f64>>> {
        self.values
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|v| (!v.is_nan()).then_some(*v)).collect())
            .collect()
    }

    /// The matrix as a frame with a leading `field` column.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails to assemble the columns.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let rows = self.rows();
        let mut columns = vec![Column::new("field".into(), self.columns.clone())];
        for (j, name) in self.columns.iter().enumerate() {
            columns.push(Column::new(
                name.as_str().into(),
                rows.iter().map(|r| r[j]).collect::<Vec<_>>(),
            ));
        }
        DataFrame::new(columns)
    }
}

/// Pearson r over rows where both values are present, and the row count used.
fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> (Option<f64>, usize) {
    let joint: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .collect();

    let n = joint.len();
    if n < 2 {
        return (None, n);
    }

    let mean_x = joint.iter().map(|(a, _)| a).sum::<f64>() / n as f64;
    let mean_y = joint.iter().map(|(_, b)| b).sum::<f64>() / n as f64;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in &joint {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return (None, n);
    }
    ((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0).into(), n)
}

/// Mean sigma per asset and calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySigma {
    assets: Vec<String>,
    months: Vec<NaiveDate>,
    values: Array2<f64>,
}

impl MonthlySigma {
    /// Pivot a series into assets by months. `None` for an empty series.
    pub fn from_series(series: &VolatilitySeries) -> Option<Self> {
        let mut sums: BTreeMap<(&str, NaiveDate), (f64, usize)> = BTreeMap::new();
        let mut assets = BTreeSet::new();
        let mut months = BTreeSet::new();

        for o in &series.observations {
            let month = month_start(o.date);
            assets.insert(o.entity_id.as_str());
            months.insert(month);
            if let Some(sigma) = o.sigma_t.filter(|s| s.is_finite()) {
                let cell = sums.entry((o.entity_id.as_str(), month)).or_default();
                cell.0 += sigma;
                cell.1 += 1;
            }
        }

        if assets.is_empty() {
            return None;
        }

        let assets: Vec<&str> = assets.into_iter().collect();
        let months: Vec<NaiveDate> = months.into_iter().collect();
        let values = Array2::from_shape_fn((assets.len(), months.len()), |(i, j)| {
            sums.get(&(assets[i], months[j]))
                .map_or(f64::NAN, |(sum, count)| sum / *count as f64)
        });

        Some(Self {
            assets: assets.into_iter().map(str::to_string).collect(),
            months,
            values,
        })
    }

    /// Assets, sorted.
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// First day of each month, sorted.
    pub fn months(&self) -> &[NaiveDate] {
        &self.months
    }

    /// Mean sigma for an asset and month, if any observation fell there.
    pub fn get(&self, asset: &str, month: NaiveDate) -> Option<f64> {
        let i = self.assets.iter().position(|a| a == asset)?;
        let j = self.months.iter().position(|m| *m == month_start(month))?;
        let v = self.values[[i, j]];
        (!v.is_nan()).then_some(v)
    }

    fn month_labels(&self) -> Vec<String> {
        self.months
            .iter()
            .map(|m| m.format("%Y-%m").to_string())
            .collect()
    }

    /// The pivot as a frame: `entity_id` then one column per month.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails to assemble the columns.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let mut columns = vec![Column::new("entity_id".into(), self.assets.clone())];
        for (j, label) in self.month_labels().into_iter().enumerate() {
            let values: Vec<Option<f64>> = self
                .values
                .column(j)
                .iter()
                .map(|v| (!v.is_nan()).then_some(*v))
                .collect();
            columns.push(Column::new(label.into(), values));
        }
        DataFrame::new(columns)
    }

    fn to_json(&self) -> serde_json::Value {
        let rows: Vec<Vec<Option<f64>>> = self
            .values
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|v| (!v.is_nan()).then_some(*v)).collect())
            .collect();
        json!({
            "assets": self.assets,
            "months": self.month_labels(),
            "values": rows,
        })
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// The heatmaps page.
#[derive(Debug, Clone)]
pub struct HeatmapPage {
    /// Correlation between the present estimate columns
    pub correlation: Option<CorrelationMatrix>,
    /// Why the correlation matrix is missing
    pub correlation_message: Option<String>,
    /// Monthly mean sigma per asset
    pub monthly: Option<MonthlySigma>,
    /// Why the monthly pivot is missing
    pub monthly_message: Option<String>,
}

impl HeatmapPage {
    /// Build both heatmaps.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while filtering or reading columns.
    pub fn build(dataset: &Dataset, selection: &AssetSelection) -> Result<Self> {
        let risk = selection.apply(&dataset.risk_view()?)?;
        let (correlation, correlation_message) = Self::correlate(&risk)?;

        let (series, message) = load_series(dataset)?;
        let series = series.map(|s| s.filtered(dataset.exclusion()).filtered(selection));
        let monthly = series.as_ref().and_then(MonthlySigma::from_series);
        let monthly_message = if monthly.is_some() {
            None
        } else {
            Some(message.unwrap_or_else(|| {
                "The monthly heatmap needs sigma series by date and asset.".to_string()
            }))
        };

        Ok(Self {
            correlation,
            correlation_message,
            monthly,
            monthly_message,
        })
    }

    /// Correlation matrix over the gamma and volatility columns of `risk`.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while reading columns.
    pub fn correlate(risk: &DataFrame) -> Result<(Option<CorrelationMatrix>, Option<String>)> {
        let columns: Vec<&str> = present_gammas(risk)
            .into_iter()
            .chain(present_volatilities(risk))
            .map(|f| f.name())
            .collect();

        if columns.len() < 2 {
            return Ok((
                None,
                Some("Not enough columns to build the correlation heatmap.".to_string()),
            ));
        }
        Ok((Some(CorrelationMatrix::compute(risk, &columns)?), None))
    }
}

impl PageView for HeatmapPage {
    fn name(&self) -> &'static str {
        "heatmap"
    }

    fn to_text(&self) -> Result<String> {
        let mut output = String::new();
        match &self.correlation {
            Some(c) => output.push_str(
                &TableView::new("Correlation matrix", &c.to_frame()?).to_ascii_table()?,
            ),
            None => output.push_str(&format!(
                "\n{}\n",
                self.correlation_message.as_deref().unwrap_or_default()
            )),
        }
        match &self.monthly {
            Some(m) => output.push_str(
                &TableView::new("Conditional volatility, monthly mean", &m.to_frame()?)
                    .with_precision(4)
                    .to_ascii_table()?,
            ),
            None => output.push_str(&format!(
                "\n{}\n",
                self.monthly_message.as_deref().unwrap_or_default()
            )),
        }
        Ok(output)
    }

    fn to_markdown(&self) -> Result<String> {
        let mut output = String::new();
        match &self.correlation {
            Some(c) => {
                output.push_str(&TableView::new("Correlation matrix", &c.to_frame()?).to_markdown()?);
            }
            None => output.push_str(&format!(
                "> {}\n",
                self.correlation_message.as_deref().unwrap_or_default()
            )),
        }
        output.push('\n');
        match &self.monthly {
            Some(m) => output.push_str(
                &TableView::new("Conditional volatility, monthly mean", &m.to_frame()?)
                    .with_precision(4)
                    .to_markdown()?,
            ),
            None => output.push_str(&format!(
                "> {}\n",
                self.monthly_message.as_deref().unwrap_or_default()
            )),
        }
        Ok(output)
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(json!({
            "correlation": self.correlation.as_ref().map(|c| json!({
                "columns": c.columns(),
                "values": c.rows(),
            })),
            "correlation_message": self.correlation_message,
            "monthly": self.monthly.as_ref().map(MonthlySigma::to_json),
            "monthly_message": self.monthly_message,
        }))
    }
}
