//! End-to-end generation: yearly grid files in, artifacts + page + manifest out.

use std::fs;
use std::path::Path;

use rainmap::config::Config;
use rainmap::emit::{read_artifact, sha256_hex, Manifest, MANIFEST_FILE};
use rainmap::pipeline::{process_all, run};
use rainmap::locate::discover;
use tempfile::TempDir;

fn write_csv(path: &Path, rows: &[&str]) {
    let mut out = String::from("time,lat,lon,pcp\n");
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    fs::write(path, out).unwrap();
}

fn config_for(dir: &TempDir) -> Config {
    Config {
        dataset_dir: dir.path().join("data"),
        site_dir: dir.path().join("site"),
        workers: 1,
        ..Config::default()
    }
}

/// A(mean 10), B(mean 5), C(no valid samples)
fn write_sample_year(data: &Path, year: &str) {
    write_csv(
        &data.join(format!("IPED_mean_{}.csv", year)),
        &[
            "1,20.0,75.0,8",
            "1,20.0,76.0,5",
            "1,21.0,75.0,",
            "2,20.0,75.0,12",
            "2,20.0,76.0,NaN",
            "2,21.0,75.0,NaN",
        ],
    );
}

#[test]
fn sample_year_end_to_end() {
    let dir = TempDir::new().unwrap();
    let cfg = config_for(&dir);
    fs::create_dir_all(&cfg.dataset_dir).unwrap();
    write_sample_year(&cfg.dataset_dir, "2020");

    let report = run(&cfg).unwrap();
    assert_eq!(report.years, vec!["2020"]);
    assert!(report.skipped.is_empty());

    let points = read_artifact(&cfg.site_dir, "2020").unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!((points[0].lat, points[0].lon), (20.0, 75.0));
    assert_eq!(points[0].intensity, 1.0);
    assert!((points[1].intensity - 5.0 / 9.9).abs() < 1e-9);
    assert!(!points.iter().any(|p| p.lat == 21.0));
}

#[test]
fn bad_year_is_skipped_and_others_still_produced() {
    let dir = TempDir::new().unwrap();
    let cfg = config_for(&dir);
    fs::create_dir_all(&cfg.dataset_dir).unwrap();
    write_sample_year(&cfg.dataset_dir, "2001");
    fs::write(cfg.dataset_dir.join("IPED_mean_2002.csv"), "time,lat,lon\n1,2,3\n").unwrap();
    write_sample_year(&cfg.dataset_dir, "2003");

    let report = run(&cfg).unwrap();
    assert_eq!(report.years, vec!["2001", "2002", "2003"]);
    assert_eq!(report.generated.len(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].year, "2002");
    assert!(report.skipped[0].reason.contains("pcp"));
    assert!(!cfg.site_dir.join("heatmap_data_2002.json").exists());

    let manifest: Manifest =
        serde_json::from_str(&fs::read_to_string(cfg.site_dir.join(MANIFEST_FILE)).unwrap()).unwrap();
    assert_eq!(manifest.years.len(), 2);
    assert_eq!(manifest.skipped[0].year, "2002");
}

#[test]
fn regeneration_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let cfg = config_for(&dir);
    fs::create_dir_all(&cfg.dataset_dir).unwrap();
    write_sample_year(&cfg.dataset_dir, "2010");
    let path = cfg.site_dir.join("heatmap_data_2010.json");

    let first = run(&cfg).unwrap();
    let bytes1 = fs::read(&path).unwrap();
    let second = run(&cfg).unwrap();
    let bytes2 = fs::read(&path).unwrap();

    assert_eq!(bytes1, bytes2);
    assert_eq!(first.generated[0].sha256, second.generated[0].sha256);
}

#[test]
fn worker_count_does_not_change_output() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config_for(&dir);
    fs::create_dir_all(&cfg.dataset_dir).unwrap();
    for y in ["1999", "2000", "2001", "2002", "2003"] {
        write_sample_year(&cfg.dataset_dir, y);
    }
    let sources = discover(&cfg.dataset_dir, &cfg.file_prefix, &cfg.file_ext).unwrap();

    let sequential = process_all(&cfg, &sources);
    cfg.workers = 3;
    let parallel = process_all(&cfg, &sources);
    assert_eq!(sequential, parallel);
}

#[test]
fn empty_dataset_dir_still_writes_page() {
    let dir = TempDir::new().unwrap();
    let cfg = config_for(&dir);

    let report = run(&cfg).unwrap();
    assert!(report.years.is_empty());
    let html = fs::read_to_string(&report.page).unwrap();
    assert!(html.contains("\"years\":[]"));
    assert!(html.contains("\"initialYear\":null"));
}

#[test]
fn page_lists_years_in_order() {
    let dir = TempDir::new().unwrap();
    let cfg = config_for(&dir);
    fs::create_dir_all(&cfg.dataset_dir).unwrap();
    for y in ["2003", "2001", "2002"] {
        write_sample_year(&cfg.dataset_dir, y);
    }
    let report = run(&cfg).unwrap();
    let html = fs::read_to_string(&report.page).unwrap();
    assert!(html.contains("\"years\":[\"2001\",\"2002\",\"2003\"]"));
    assert!(html.contains("\"initialYear\":\"2001\""));
}

#[test]
fn dense_json_grid_is_accepted() {
    let dir = TempDir::new().unwrap();
    let cfg = Config { file_ext: "json".to_string(), ..config_for(&dir) };
    fs::create_dir_all(&cfg.dataset_dir).unwrap();
    fs::write(
        cfg.dataset_dir.join("IPED_mean_2015.json"),
        r#"{"time":[0,1],"lat":[20.0,21.0],"lon":[75.0],
            "pcp":[[[8.0],[null]],[[12.0],[null]]]}"#,
    )
    .unwrap();

    let report = run(&cfg).unwrap();
    assert_eq!(report.generated.len(), 1);
    let points = read_artifact(&cfg.site_dir, "2015").unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].intensity, 1.0);
}

#[test]
fn repeated_year_label_writes_one_matching_artifact() {
    let dir = TempDir::new().unwrap();
    let cfg = Config { workers: 2, ..config_for(&dir) };
    fs::create_dir_all(&cfg.dataset_dir).unwrap();
    write_sample_year(&cfg.dataset_dir, "2001");
    write_csv(&cfg.dataset_dir.join("IPED_mean_old_2001.csv"), &["1,10.0,70.0,3", "1,10.0,71.0,6"]);

    let report = run(&cfg).unwrap();
    assert_eq!(report.years, vec!["2001"]);
    assert_eq!(report.generated.len(), 1);
    let record = &report.generated[0];
    assert!(record.source.ends_with("IPED_mean_old_2001.csv"));

    let bytes = fs::read(cfg.site_dir.join("heatmap_data_2001.json")).unwrap();
    assert_eq!(sha256_hex(&bytes), record.sha256);

    let html = fs::read_to_string(&report.page).unwrap();
    assert!(html.contains("\"years\":[\"2001\"]"));
}
