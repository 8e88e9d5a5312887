#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/aversion/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod report;
pub mod summary;
pub mod table;

pub use export::{
    DEFAULT_FLOAT_PRECISION, ExportError, ExportFormat, Exporter, RecordsExport, TableExport,
    round_to,
};
pub use report::{Report, ReportBuilder, ReportError};
pub use summary::{KpiSummary, MethodMean};
pub use table::{DISPLAY_PRECISION, TableView};
