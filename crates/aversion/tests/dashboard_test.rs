//! End-to-end tests over a data directory.

use approx::assert_relative_eq;
use aversion::data::{CanonicalField, CsvLoader, LoadCache, MasterOrigin, read_csv};
use aversion::output::round_to;
use aversion::views::{
    DiagnosticsPage, DownloadsPage, GammaTable, HeatmapPage, SummaryPage, VolatilityPage,
};
use aversion::{AssetSelection, DashboardConfig, Dataset, ExclusionSet, PageView};
use chrono::NaiveDate;
use polars::prelude::{DataFrame, DataType};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn f64_cells(frame: &DataFrame, name: &str) -> Vec<Option<f64>> {
    frame
        .column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .as_materialized_series()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

fn str_cells(frame: &DataFrame, name: &str) -> Vec<Option<String>> {
    frame
        .column(name)
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

fn load(dir: &Path) -> Dataset {
    let loader = CsvLoader::new(dir, Arc::new(LoadCache::new()));
    Dataset::load(&DashboardConfig::default(), &loader).unwrap()
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "resultados_CRRA.csv",
        "Activo,gamma_CRRA,Volatilidad\n\
         Datos históricos de ECOPETROL (Bogota),2.0,0.30\n\
         Datos históricos de ISA (Bogota),4.0,0.2049\n\
         TRM,100.0,0.05\n\
         IBR,50.0,0.01\n",
    );
    write(
        dir.path(),
        "gamma_FTP.csv",
        "asset,Gamma FTP\nECOPETROL,3.0\nISA,5.0\nNUTRESA,7.0\nDTB3,9.0\n",
    );
    write(
        dir.path(),
        "garch_results.csv",
        "name,GARCH,sigma_last\nECOPETROL,1.0,0.4\nISA,2.0,0.1\nTPM,3.0,0.2\n",
    );
    write(
        dir.path(),
        "garch_supuestos.csv",
        "Activo,ADF_p,ARCH_LM_p,Ljung_resid_p,Ljung_resid2_p,JarqueBera_p,alpha+beta\n\
         ECOPETROL,0.01,0.30,0.50,0.02,0.00,0.97\n\
         ISA,0.20,0.01,0.60,0.70,0.00,1.01\n\
         TRM,0.00,0.00,0.00,0.00,0.00,0.50\n",
    );
    write(
        dir.path(),
        "garch_timeseries.csv",
        "Fecha,ECOPETROL,ISA,TRM\n\
         2024-01-02,0.010,0.020,0.001\n\
         2024-01-31,0.030,,0.001\n\
         2024-02-01,0.050,0.040,0.001\n\
         not a date,9.9,9.9,9.9\n",
    );
    dir
}

#[test]
fn test_master_reconstruction_and_exclusion() {
    let dir = fixture();
    let dataset = load(dir.path());

    assert_eq!(
        dataset.master_origin(),
        &MasterOrigin::Merged(vec![
            "resultados_CRRA.csv".to_string(),
            "gamma_FTP.csv".to_string(),
            "garch_results.csv".to_string(),
        ])
    );

    // raw master keeps every entity from every partial file
    let raw = aversion::assets::entity_ids(dataset.master()).unwrap();
    assert_eq!(
        raw,
        vec!["DTB3", "ECOPETROL", "IBR", "ISA", "NUTRESA", "TPM", "TRM"]
    );

    // risk view drops the four macro identifiers
    assert_eq!(
        dataset.available_assets().unwrap(),
        vec!["ECOPETROL", "ISA", "NUTRESA"]
    );

    for field in [
        CanonicalField::GammaCrra,
        CanonicalField::GammaFtp,
        CanonicalField::GammaGarch,
        CanonicalField::VolHist,
        CanonicalField::VolGarch,
    ] {
        assert!(dataset.master().column(field.name()).is_ok(), "{field}");
    }
}

#[test]
fn test_summary_and_gammas() {
    let dir = fixture();
    let dataset = load(dir.path());

    let summary = SummaryPage::build(&dataset, &AssetSelection::all()).unwrap();
    assert_eq!(summary.overall.assets, 3);
    assert_relative_eq!(summary.overall.mean_for("CRRA").unwrap(), 3.0);
    assert_relative_eq!(summary.overall.mean_for("FTP").unwrap(), 5.0);
    assert_relative_eq!(summary.overall.mean_for("GARCH").unwrap(), 1.5);

    let selection = AssetSelection::parse_list("ISA");
    let table = GammaTable::build(&dataset, &selection).unwrap();
    assert_eq!(table.frame().height(), 1);
    assert_eq!(table.methods(), ["CRRA", "FTP", "GARCH"]);

}

#[test]
fn test_gamma_export_round_trip() {
    let dir = fixture();
    let dataset = load(dir.path());
    let precision = 2;

    // NUTRESA only has an FTP gamma, so the other cells are null
    let table = GammaTable::build(&dataset, &AssetSelection::all()).unwrap();
    let shown = table.frame();
    assert_eq!(shown.height(), 3);

    let out = dir.path().join("gammas.csv");
    table.export(&out, precision).unwrap();
    let back = read_csv(&out).unwrap();

    assert_eq!(back.get_column_names(), shown.get_column_names());
    assert_eq!(back.height(), shown.height());
    assert_eq!(str_cells(&back, "entity_id"), str_cells(shown, "entity_id"));

    // integral gammas come back as integers; compare after casting
    for name in shown.get_column_names().iter().skip(1) {
        let expected: Vec<Option<f64>> = f64_cells(shown, name)
            .into_iter()
            .map(|v| v.map(|x| round_to(x, precision)))
            .collect();
        let actual = f64_cells(&back, name);
        assert_eq!(actual.len(), expected.len(), "{name}");
        for (a, e) in actual.iter().zip(&expected) {
            match (a, e) {
                (Some(a), Some(e)) => assert_relative_eq!(*a, *e, epsilon = 1e-12),
                (None, None) => {}
                _ => panic!("{name}: {a:?} != {e:?}"),
            }
        }
    }

    let isa_vol = f64_cells(&back, "vol_hist")[1];
    assert_eq!(isa_vol, Some(0.2));
    assert_eq!(f64_cells(&back, "gamma_crra")[2], None);
}

#[test]
fn test_volatility_and_heatmaps() {
    let dir = fixture();
    let dataset = load(dir.path());

    let page = VolatilityPage::build(&dataset, &AssetSelection::all()).unwrap();
    let series = page.series.as_ref().unwrap();
    assert_eq!(series.dropped_rows, 3);
    // TRM is excluded from the risk comparison
    assert_eq!(
        page.stats.iter().map(|s| s.entity_id.as_str()).collect::<Vec<_>>(),
        vec!["ECOPETROL", "ISA"]
    );
    let eco = &page.stats[0];
    assert_eq!(eco.observations, 3);
    assert_relative_eq!(eco.mean_sigma.unwrap(), 0.03);
    assert_relative_eq!(eco.last_sigma.unwrap(), 0.05);
    assert_eq!(eco.last_date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());

    let heat = HeatmapPage::build(&dataset, &AssetSelection::all()).unwrap();
    let corr = heat.correlation.as_ref().unwrap();
    assert_eq!(corr.columns().len(), 5);
    let monthly = heat.monthly.as_ref().unwrap();
    assert_eq!(monthly.assets(), ["ECOPETROL", "ISA"]);
    let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert_relative_eq!(monthly.get("ECOPETROL", jan).unwrap(), 0.02);
    assert_relative_eq!(monthly.get("ISA", jan).unwrap(), 0.02);

    assert!(heat.to_text().unwrap().contains("2024-02"));
}

#[test]
fn test_diagnostics_and_downloads() {
    let dir = fixture();
    let dataset = load(dir.path());

    let page = DiagnosticsPage::build(&dataset, &AssetSelection::all(), 0.05).unwrap();
    assert_eq!(page.table().unwrap().height(), 2);
    let rejected: Vec<usize> = page.rejections().iter().map(|r| r.rejected).collect();
    assert_eq!(rejected, vec![1, 1, 0, 1, 2]);
    assert_eq!(page.persistence().unwrap().stationary, 1);

    let out = dir.path().join("exports");
    let written = DownloadsPage::write_exports(&dataset, &out, 6).unwrap();
    assert_eq!(written.len(), 2);
    let tests = read_csv(&out.join("garch_tests.csv")).unwrap();
    // raw export keeps TRM
    assert_eq!(tests.height(), 3);
}

#[test]
fn test_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = load(dir.path()).with_exclusion(ExclusionSet::default());

    assert_eq!(dataset.master_origin(), &MasterOrigin::Empty);
    assert_eq!(dataset.master().height(), 0);
    for field in CanonicalField::all() {
        assert!(dataset.master().column(field.name()).is_ok(), "{field}");
    }

    let summary = SummaryPage::build(&dataset, &AssetSelection::all()).unwrap();
    assert_eq!(summary.overall.assets, 0);
    assert!(summary.overall.methods.iter().all(|m| m.mean.is_none()));

    let gammas = GammaTable::build(&dataset, &AssetSelection::all()).unwrap();
    assert_eq!(gammas.frame().height(), 0);

    let volatility = VolatilityPage::build(&dataset, &AssetSelection::all()).unwrap();
    assert!(volatility.series.is_none());
    assert!(volatility.message.is_some());

    let diagnostics = DiagnosticsPage::build(&dataset, &AssetSelection::all(), 0.05).unwrap();
    assert!(diagnostics.table().is_none());
}
