//! Aversion CLI binary.
//!
//! Renders the dashboard pages for a directory of estimation results.

use aversion::views::{
    DiagnosticsPage, DownloadsPage, GammaTable, HeatmapPage, SourcesPage, SummaryPage,
    VolatilityPage,
};
use aversion::{AssetSelection, DashboardConfig, Dataset, ExclusionSet, PageView};
use aversion_data::{CsvLoader, LoadCache};
use aversion_output::ReportBuilder;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aversion")]
#[command(about = "Aversion: risk-aversion estimates dashboard", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the result CSV files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Comma-separated identifiers left out of the risk comparison
    #[arg(long, global = true)]
    exclude: Option<String>,

    /// Comma-separated assets to focus on
    #[arg(long, global = true)]
    assets: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which files were loaded and how the master table was built
    Sources,

    /// Average gamma per method
    Summary,

    /// Gamma estimates per asset
    Gammas {
        /// Write the displayed table to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Conditional volatility series
    Volatility,

    /// GARCH assumption tests
    Diagnostics {
        /// Write the displayed table to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Write the rejection counts to a .csv or .json file
        #[arg(long)]
        export_counts: Option<PathBuf>,
    },

    /// Correlation and monthly sigma heatmaps
    Heatmap,

    /// List the data directory and export the full tables
    Downloads {
        /// Directory to write the exports to
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (mut config, config_path) = DashboardConfig::discover(cli.config.as_deref())?;
    if let Some(path) = &config_path {
        info!(file = %path.display(), "using configuration file");
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(list) = &cli.exclude {
        config.exclude = ExclusionSet::parse_list(list).ids().map(str::to_string).collect();
    }

    let cache = Arc::new(LoadCache::new());
    let loader = CsvLoader::new(&config.data_dir, Arc::clone(&cache));
    let dataset = Dataset::load(&config, &loader)?;

    let selection = cli
        .assets
        .as_deref()
        .map(AssetSelection::parse_list)
        .unwrap_or_default();
    let available = dataset.available_assets()?;
    for id in selection.unknown(&available) {
        warn!(asset = id, "selected asset not in the data");
    }

    let data_dir = config.data_dir.as_path();
    match cli.command {
        Commands::Sources => {
            let page = SourcesPage::build(&dataset, cache.stats());
            print_page(&page, cli.format, data_dir)?;
        }
        Commands::Summary => {
            let page = SummaryPage::build(&dataset, &selection)?;
            print_page(&page, cli.format, data_dir)?;
        }
        Commands::Gammas { export } => {
            let table = GammaTable::build(&dataset, &selection)?;
            if let Some(warning) = table.warning() {
                warn!("{warning}");
            }
            print_page(&table, cli.format, data_dir)?;
            if let Some(path) = export {
                table.export(&path, config.float_precision)?;
                eprintln!("Wrote {}", path.display());
            }
        }
        Commands::Volatility => {
            let page = VolatilityPage::build(&dataset, &selection)?;
            print_page(&page, cli.format, data_dir)?;
        }
        Commands::Diagnostics {
            export,
            export_counts,
        } => {
            let page = DiagnosticsPage::build(&dataset, &selection, config.significance)?;
            print_page(&page, cli.format, data_dir)?;
            if let Some(path) = export {
                page.export(&path, config.float_precision)?;
                eprintln!("Wrote {}", path.display());
            }
            if let Some(path) = export_counts {
                page.export_rejections(&path)?;
                eprintln!("Wrote {}", path.display());
            }
        }
        Commands::Heatmap => {
            let page = HeatmapPage::build(&dataset, &selection)?;
            print_page(&page, cli.format, data_dir)?;
        }
        Commands::Downloads { out_dir } => {
            let page = DownloadsPage::build(&dataset, &loader)?;
            print_page(&page, cli.format, data_dir)?;
            if let Some(dir) = out_dir {
                for path in DownloadsPage::write_exports(&dataset, &dir, config.float_precision)? {
                    eprintln!("Wrote {}", path.display());
                }
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so that page output on stdout stays machine readable.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_page<P: PageView>(
    page: &P,
    format: Format,
    data_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        Format::Text => println!("{}", page.to_text()?),
        Format::Markdown => println!("{}", page.to_markdown()?),
        Format::Json => {
            let report = ReportBuilder::new()
                .page(page.name())
                .data_dir(data_dir)
                .contents(&page.to_json()?)?
                .build()?;
            println!("{}", report.to_json()?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "aversion",
            "gammas",
            "--data-dir",
            "results",
            "--assets",
            "ISA,ECOPETROL",
            "--format",
            "json",
            "-vv",
            "--export",
            "out.csv",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("results")));
        assert_eq!(cli.assets.as_deref(), Some("ISA,ECOPETROL"));
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Gammas { export } => assert_eq!(export, Some(PathBuf::from("out.csv"))),
            _ => panic!("expected gammas"),
        }
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["aversion", "--format", "xml", "summary"]).is_err());
    }
}
