//! Volatility dynamics: conditional sigma per asset over time.
//!
//! The series comes from the time-series file when there is one, in long form
//! (`date`, `entity_id`, `sigma_t`) or wide form (`date` plus one column per
//! asset). Otherwise the long-form sigma file is used.

use super::{PageView, f64_values, str_values};
use crate::assets::{AssetFilter, AssetSelection, ExclusionSet};
use crate::dataset::Dataset;
use crate::error::Result;
use aversion_data::{CanonicalField, EntityCleaner, NamedFrame, has_column, normalize_key};
use aversion_output::TableView;
use chrono::{NaiveDate, NaiveDateTime};
use derive_more::Display;
use polars::prelude::*;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Accepted date layouts, tried in order.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y", "%Y/%m/%d"];

/// Header of an optional per-date gamma column, compared case-insensitively.
const GAMMA_T: &str = "gamma";

/// Shape of the file a series was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum SeriesLayout {
    /// One row per asset and date
    #[display("long")]
    Long,
    /// One column per asset
    #[display("wide")]
    Wide,
}

/// One conditional volatility observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    /// Cleaned asset name
    pub entity_id: String,
    /// Observation date
    pub date: NaiveDate,
    /// Conditional volatility
    pub sigma_t: Option<f64>,
    /// Return, when the file carries one
    #[serde(rename = "return")]
    pub ret: Option<f64>,
    /// Risk aversion at this date, when the file carries one
    pub gamma: Option<f64>,
}

/// A parsed long-form series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilitySeries {
    /// File the series came from
    pub source: String,
    /// Layout of that file
    pub layout: SeriesLayout,
    /// Observations sorted by asset then date
    pub observations: Vec<Observation>,
    /// Rows dropped because the date could not be parsed
    pub dropped_rows: usize,
    /// Whether a per-date gamma column was found
    pub has_gamma: bool,
}

impl VolatilitySeries {
    /// Parse a normalized time-series table.
    ///
    /// Returns `Ok(None)` when the table has no `date` column.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while reading columns.
    pub fn from_table(table: &NamedFrame, cleaner: &EntityCleaner) -> Result<Option<Self>> {
        let frame = &table.frame;
        let date = CanonicalField::Date.name();
        let key = CanonicalField::EntityId.name();
        let sigma = CanonicalField::SigmaT.name();

        if !has_column(frame, date) {
            return Ok(None);
        }

        let (layout, rows) = if has_column(frame, key) && has_column(frame, sigma) {
            (SeriesLayout::Long, long_rows(frame)?)
        } else {
            (SeriesLayout::Wide, wide_rows(frame, cleaner)?)
        };

        let mut observations = Vec::with_capacity(rows.len());
        let mut dropped_rows = 0;
        for row in rows {
            match row.date.as_deref().and_then(parse_date) {
                Some(date) => observations.push(Observation {
                    entity_id: row.entity_id,
                    date,
                    sigma_t: row.sigma_t,
                    ret: row.ret,
                    gamma: row.gamma,
                }),
                None => dropped_rows += 1,
            }
        }
        if dropped_rows > 0 {
            warn!(file = %table.name, dropped_rows, "dropped rows with unparseable dates");
        }

        observations.sort_by(|a, b| (&a.entity_id, a.date).cmp(&(&b.entity_id, b.date)));
        debug!(file = %table.name, %layout, rows = observations.len(), "parsed volatility series");

        Ok(Some(Self {
            source: table.name.clone(),
            layout,
            observations,
            dropped_rows,
            has_gamma: layout == SeriesLayout::Long && gamma_column(frame).is_some(),
        }))
    }

    /// Observations whose asset passes `filter`.
    pub fn filtered<F: AssetFilter>(&self, filter: &F) -> Self {
        Self {
            observations: self
                .observations
                .iter()
                .filter(|o| filter.keeps(&o.entity_id))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    /// Per-asset statistics, sorted by asset.
    pub fn stats(&self) -> Vec<AssetVolatility> {
        let mut by_asset: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
        for o in &self.observations {
            by_asset.entry(o.entity_id.as_str()).or_default().push(o);
        }

        by_asset
            .into_iter()
            .map(|(asset, obs)| AssetVolatility::from_observations(asset, &obs))
            .collect()
    }

    /// The series as a data frame.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails to assemble the columns.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let obs = &self.observations;
        let mut columns: Vec<Column> = vec![
            Column::new(
                CanonicalField::EntityId.name().into(),
                obs.iter().map(|o| o.entity_id.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                CanonicalField::Date.name().into(),
                obs.iter().map(|o| o.date).collect::<Vec<_>>(),
            ),
            Column::new(
                CanonicalField::SigmaT.name().into(),
                obs.iter().map(|o| o.sigma_t).collect::<Vec<_>>(),
            ),
        ];
        if obs.iter().any(|o| o.ret.is_some()) {
            columns.push(Column::new(
                CanonicalField::Return.name().into(),
                obs.iter().map(|o| o.ret).collect::<Vec<_>>(),
            ));
        }
        if self.has_gamma {
            columns.push(Column::new(
                GAMMA_T.into(),
                obs.iter().map(|o| o.gamma).collect::<Vec<_>>(),
            ));
        }
        DataFrame::new(columns)
    }
}

/// Summary of one asset's series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetVolatility {
    /// Asset name
    pub entity_id: String,
    /// Number of dated observations
    pub observations: usize,
    /// First date
    pub first_date: NaiveDate,
    /// Last date
    pub last_date: NaiveDate,
    /// Mean of non-null sigma
    pub mean_sigma: Option<f64>,
    /// Max of non-null sigma
    pub max_sigma: Option<f64>,
    /// Latest non-null sigma
    pub last_sigma: Option<f64>,
    /// Mean of non-null gamma(t)
    pub mean_gamma: Option<f64>,
    /// Latest non-null gamma(t)
    pub last_gamma: Option<f64>,
}

impl AssetVolatility {
    fn from_observations(asset: &str, obs: &[&Observation]) -> Self {
        let sigmas: Vec<f64> = obs.iter().filter_map(|o| o.sigma_t).collect();
        let gammas: Vec<f64> = obs.iter().filter_map(|o| o.gamma).collect();

        Self {
            entity_id: asset.to_string(),
            observations: obs.len(),
            first_date: obs.iter().map(|o| o.date).min().unwrap_or_default(),
            last_date: obs.iter().map(|o| o.date).max().unwrap_or_default(),
            mean_sigma: mean(&sigmas),
            max_sigma: sigmas.iter().copied().reduce(f64::max),
            last_sigma: obs.iter().rev().find_map(|o| o.sigma_t),
            mean_gamma: mean(&gammas),
            last_gamma: obs.iter().rev().find_map(|o| o.gamma),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// The volatility dynamics page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityPage {
    /// Series after exclusion and selection, if one could be read
    pub series: Option<VolatilitySeries>,
    /// Per-asset statistics
    pub stats: Vec<AssetVolatility>,
    /// Why the series is missing or where it fell back from
    pub message: Option<String>,
}

impl VolatilityPage {
    /// Build the page from the dataset's series files.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while reading a series.
    pub fn build(dataset: &Dataset, selection: &AssetSelection) -> Result<Self> {
        let (series, message) = load_series(dataset)?;
        Ok(Self::from_series(series, message, dataset.exclusion(), selection))
    }

    /// Build the page from a parsed series.
    pub fn from_series(
        series: Option<VolatilitySeries>,
        message: Option<String>,
        exclusion: &ExclusionSet,
        selection: &AssetSelection,
    ) -> Self {
        let series = series.map(|s| s.filtered(exclusion).filtered(selection));
        let stats = series.as_ref().map(VolatilitySeries::stats).unwrap_or_default();
        Self {
            series,
            stats,
            message,
        }
    }

    fn stats_frame(&self) -> PolarsResult<DataFrame> {
        let s = &self.stats;
        let mut columns = vec![
            Column::new(
                "entity_id".into(),
                s.iter().map(|a| a.entity_id.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                "observations".into(),
                s.iter().map(|a| a.observations as u64).collect::<Vec<_>>(),
            ),
            Column::new(
                "last_date".into(),
                s.iter().map(|a| a.last_date.to_string()).collect::<Vec<_>>(),
            ),
            Column::new("mean_sigma".into(), s.iter().map(|a| a.mean_sigma).collect::<Vec<_>>()),
            Column::new("max_sigma".into(), s.iter().map(|a| a.max_sigma).collect::<Vec<_>>()),
            Column::new("last_sigma".into(), s.iter().map(|a| a.last_sigma).collect::<Vec<_>>()),
        ];
        if self.series.as_ref().is_some_and(|x| x.has_gamma) {
            columns.push(Column::new(
                "mean_gamma".into(),
                s.iter().map(|a| a.mean_gamma).collect::<Vec<_>>(),
            ));
            columns.push(Column::new(
                "last_gamma".into(),
                s.iter().map(|a| a.last_gamma).collect::<Vec<_>>(),
            ));
        }
        DataFrame::new(columns)
    }

    fn header(&self) -> String {
        match &self.series {
            Some(s) => format!(
                "Conditional volatility from {} ({} layout, {} observations)",
                s.source,
                s.layout,
                s.observations.len()
            ),
            None => "Conditional volatility".to_string(),
        }
    }
}

impl PageView for VolatilityPage {
    fn name(&self) -> &'static str {
        "volatility"
    }

    fn to_text(&self) -> Result<String> {
        let mut output = String::new();
        if let Some(message) = &self.message {
            output.push_str(&format!("\n{message}\n"));
        }
        if self.series.is_some() {
            output.push_str(&TableView::new(self.header(), &self.stats_frame()?).to_ascii_table()?);
        }
        Ok(output)
    }

    fn to_markdown(&self) -> Result<String> {
        let mut output = String::new();
        if let Some(message) = &self.message {
            output.push_str(&format!("> {message}\n\n"));
        }
        if self.series.is_some() {
            output.push_str(&TableView::new(self.header(), &self.stats_frame()?).to_markdown()?);
        }
        Ok(output)
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(json!({
            "message": self.message,
            "series": self.series,
            "stats": self.stats,
        }))
    }
}

/// Read the best available series from the dataset.
///
/// Returns the series, if any, and a message explaining a missing series or a
/// fallback.
///
/// # Errors
///
/// Returns an error if polars fails while reading a series.
pub fn load_series(dataset: &Dataset) -> Result<(Option<VolatilitySeries>, Option<String>)> {
    let cleaner = dataset.cleaner();
    let mut message = None;

    if let Some(table) = dataset.timeseries() {
        match VolatilitySeries::from_table(table, cleaner)? {
            Some(series) => return Ok((Some(series), None)),
            None => {
                warn!(file = %table.name, "time series has no date column");
                message = Some(format!("File {} has no clear date column.", table.name));
            }
        }
    }

    if let Some(table) = dataset.sigma_long() {
        let key = CanonicalField::EntityId.name();
        let sigma = CanonicalField::SigmaT.name();
        if has_column(&table.frame, key) && has_column(&table.frame, sigma) {
            if let Some(series) = VolatilitySeries::from_table(table, cleaner)? {
                return Ok((Some(series), message));
            }
        }
        let note = format!(
            "File {} needs date, entity_id and sigma_t columns.",
            table.name
        );
        message = Some(match message {
            Some(m) => format!("{m} {note}"),
            None => note,
        });
        return Ok((None, message));
    }

    let message = message.unwrap_or_else(|| {
        "No time-series file found. Export a CSV with columns date, entity_id, \
         sigma_t and return to see conditional volatility."
            .to_string()
    });
    Ok((None, Some(message)))
}

/// Parse a date in any of [`DATE_FORMATS`].
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(raw, fmt)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(raw, fmt).ok().map(|dt| dt.date()))
    })
}

struct RawRow {
    entity_id: String,
    date: Option<String>,
    sigma_t: Option<f64>,
    ret: Option<f64>,
    gamma: Option<f64>,
}

fn gamma_column(frame: &DataFrame) -> Option<String> {
    frame
        .get_column_names()
        .iter()
        .find(|c| normalize_key(c.as_str()) == GAMMA_T)
        .map(|c| c.to_string())
}

fn optional_f64(frame: &DataFrame, name: Option<&str>) -> PolarsResult<Vec<Option<f64>>> {
    match name {
        Some(name) => f64_values(frame, name),
        None => Ok(vec![None; frame.height()]),
    }
}

fn long_rows(frame: &DataFrame) -> PolarsResult<Vec<RawRow>> {
    let ret = CanonicalField::Return.name();
    let gamma = gamma_column(frame);

    let ids = str_values(frame, CanonicalField::EntityId.name())?;
    let dates = str_values(frame, CanonicalField::Date.name())?;
    let sigmas = f64_values(frame, CanonicalField::SigmaT.name())?;
    let rets = optional_f64(frame, has_column(frame, ret).then_some(ret))?;
    let gammas = optional_f64(frame, gamma.as_deref())?;

    Ok(ids
        .into_iter()
        .zip(dates)
        .zip(sigmas)
        .zip(rets)
        .zip(gammas)
        // rows without an asset name cannot be attributed
        .filter_map(|((((id, date), sigma_t), ret), gamma)| {
            Some(RawRow {
                entity_id: id?,
                date,
                sigma_t,
                ret,
                gamma,
            })
        })
        .collect())
}

fn wide_rows(frame: &DataFrame, cleaner: &EntityCleaner) -> PolarsResult<Vec<RawRow>> {
    let date = CanonicalField::Date.name();
    let dates = str_values(frame, date)?;
    let mut rows = Vec::new();

    for column in frame.get_column_names() {
        if column.as_str() == date {
            continue;
        }
        let asset = cleaner.clean(column.as_str());
        let values = f64_values(frame, column.as_str())?;
        rows.extend(dates.iter().zip(values).map(|(d, sigma_t)| RawRow {
            entity_id: asset.clone(),
            date: d.clone(),
            sigma_t,
            ret: None,
            gamma: None,
        }));
    }

    Ok(rows)
}
