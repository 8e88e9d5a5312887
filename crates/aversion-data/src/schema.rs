//! Canonical column schema and source kinds.

use derive_more::Display;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical asset-record and volatility-observation fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    /// Cleaned display name of the asset or macro series
    EntityId,

    /// Risk aversion from the CRRA model
    GammaCrra,

    /// Risk aversion from the FTP model
    GammaFtp,

    /// Risk aversion from the GARCH-driven estimate
    GammaGarch,

    /// Historical volatility
    VolHist,

    /// Conditional (GARCH) volatility
    VolGarch,

    /// Observation date
    Date,

    /// Conditional volatility at a date
    SigmaT,

    /// Return at a date
    Return,
}

impl CanonicalField {
    /// Returns all canonical fields in schema order.
    pub const fn all() -> [Self; 9] {
        [
            Self::EntityId,
            Self::GammaCrra,
            Self::GammaFtp,
            Self::GammaGarch,
            Self::VolHist,
            Self::VolGarch,
            Self::Date,
            Self::SigmaT,
            Self::Return,
        ]
    }

    /// The three risk-aversion coefficients.
    pub const fn gammas() -> [Self; 3] {
        [Self::GammaCrra, Self::GammaFtp, Self::GammaGarch]
    }

    /// The two cross-sectional volatility measures.
    pub const fn volatilities() -> [Self; 2] {
        [Self::VolHist, Self::VolGarch]
    }

    /// Column name used in reconciled tables.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EntityId => "entity_id",
            Self::GammaCrra => "gamma_crra",
            Self::GammaFtp => "gamma_ftp",
            Self::GammaGarch => "gamma_garch",
            Self::VolHist => "vol_hist",
            Self::VolGarch => "vol_garch",
            Self::Date => "date",
            Self::SigmaT => "sigma_t",
            Self::Return => "return",
        }
    }

    /// Short label for the estimation method of a gamma field.
    pub const fn method_label(&self) -> Option<&'static str> {
        match self {
            Self::GammaCrra => Some("CRRA"),
            Self::GammaFtp => Some("FTP"),
            Self::GammaGarch => Some("GARCH"),
            _ => None,
        }
    }

    /// Parse a field from its canonical column name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|f| f.name() == name)
    }

    /// Polars dtype of the column once reconciled.
    pub fn dtype(&self) -> DataType {
        match self {
            Self::EntityId | Self::Date => DataType::String,
            _ => DataType::Float64,
        }
    }

    /// Whether the field holds a number that should be coerced to f64.
    pub const fn is_numeric(&self) -> bool {
        !matches!(self, Self::EntityId | Self::Date)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// p-value and persistence columns of the GARCH diagnostics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticField {
    /// Augmented Dickey-Fuller stationarity test
    #[display("adf_p")]
    Adf,

    /// ARCH-LM conditional heteroscedasticity test
    #[display("arch_lm_p")]
    ArchLm,

    /// Ljung-Box on standardized residuals
    #[display("ljung_resid_p")]
    LjungResid,

    /// Ljung-Box on squared standardized residuals
    #[display("ljung_resid2_p")]
    LjungResidSquared,

    /// Jarque-Bera normality test
    #[display("jarque_bera_p")]
    JarqueBera,

    /// Persistence sum alpha + beta
    #[display("alpha_beta")]
    AlphaBeta,
}

impl DiagnosticField {
    /// All diagnostic fields in table order.
    pub const fn all() -> [Self; 6] {
        [
            Self::Adf,
            Self::ArchLm,
            Self::LjungResid,
            Self::LjungResidSquared,
            Self::JarqueBera,
            Self::AlphaBeta,
        ]
    }

    /// Column name used in reconciled tables.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Adf => "adf_p",
            Self::ArchLm => "arch_lm_p",
            Self::LjungResid => "ljung_resid_p",
            Self::LjungResidSquared => "ljung_resid2_p",
            Self::JarqueBera => "jarque_bera_p",
            Self::AlphaBeta => "alpha_beta",
        }
    }

    /// Whether the column is a test p-value (as opposed to a model parameter).
    pub const fn is_p_value(&self) -> bool {
        !matches!(self, Self::AlphaBeta)
    }
}

/// The kinds of result files the dashboard knows how to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Complete results table with every gamma
    #[display("master")]
    Master,

    /// CRRA-only results
    #[display("crra")]
    Crra,

    /// FTP-only results
    #[display("ftp")]
    Ftp,

    /// GARCH-only results
    #[display("garch")]
    Garch,

    /// GARCH assumption tests
    #[display("diagnostics")]
    Diagnostics,

    /// Conditional volatility time series (long or wide)
    #[display("timeseries")]
    TimeSeries,

    /// Long-form sigma series fallback
    #[display("sigma_long")]
    SigmaLong,
}

impl SourceKind {
    /// All source kinds in load order.
    pub const fn all() -> [Self; 7] {
        [
            Self::Master,
            Self::Crra,
            Self::Ftp,
            Self::Garch,
            Self::Diagnostics,
            Self::TimeSeries,
            Self::SigmaLong,
        ]
    }

    /// Partial per-method tables, in join order.
    pub const fn partials() -> [Self; 3] {
        [Self::Crra, Self::Ftp, Self::Garch]
    }

    /// Default candidate file names, highest priority first.
    pub const fn default_candidates(&self) -> &'static [&'static str] {
        match self {
            Self::Master => &[
                "resultados_completos_tablero.csv",
                "tablero_final_completo.csv",
                "tablero_final.csv",
                "resultados_completos.csv",
            ],
            Self::Crra => &["resultados_CRRA.csv", "gamma_CRRA.csv"],
            Self::Ftp => &["resultados_FTP.csv", "gamma_FTP.csv"],
            Self::Garch => &[
                "resultados_GARCH.csv",
                "gamma_GARCH.csv",
                "garch_results.csv",
            ],
            Self::Diagnostics => &["garch_supuestos.csv", "garch_tests.csv"],
            Self::TimeSeries => &[
                "garch_timeseries.csv",
                "garch_series.csv",
                "sigma_timeseries.csv",
                "sigma_t.csv",
            ],
            Self::SigmaLong => &["sigma_long.csv", "vol_series_long.csv"],
        }
    }

    /// Whether rows are keyed by entity alone (one row per asset).
    pub const fn is_entity_table(&self) -> bool {
        !matches!(self, Self::TimeSeries | Self::SigmaLong)
    }
}

/// Empty frame carrying the full canonical column set.
pub fn empty_canonical_frame() -> PolarsResult<DataFrame> {
    let columns = CanonicalField::all()
        .iter()
        .map(|f| Series::new_empty(f.name().into(), &f.dtype()).into())
        .collect::<Vec<Column>>();
    DataFrame::new(columns)
}
