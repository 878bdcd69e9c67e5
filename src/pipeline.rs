use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;

use crate::aggregate::aggregate_year;
use crate::config::Config;
use crate::emit::{write_artifact, write_manifest, ArtifactRecord, Manifest, SkippedYear};
use crate::grid::load_grid;
use crate::locate::{discover, YearSource};
use crate::logging::{log, log_year_aggregated, log_year_skipped, obj, ts_now, v_str, Domain, Level, ProfileScope};
use crate::page::{compose_page, write_page};

#[derive(Debug, Clone, PartialEq)]
pub enum YearOutcome {
    Generated(ArtifactRecord),
    Skipped(SkippedYear),
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub years: Vec<String>,
    pub generated: Vec<ArtifactRecord>,
    pub skipped: Vec<SkippedYear>,
    pub page: PathBuf,
    pub manifest: PathBuf,
}

fn try_year(cfg: &Config, src: &YearSource) -> Result<ArtifactRecord> {
    let grid = load_grid(&src.path, &cfg.variable).with_context(|| format!("load {}", src.path.display()))?;
    let artifact = aggregate_year(&src.year, &grid, cfg.percentile);
    log_year_aggregated(&src.year, artifact.cells, artifact.points.len(), artifact.local_max);
    write_artifact(&cfg.site_dir, &artifact, &src.path)
}

fn skipped(src: &YearSource, reason: String) -> YearOutcome {
    log_year_skipped(&src.year, &reason);
    YearOutcome::Skipped(SkippedYear {
        year: src.year.clone(),
        source: src.path.display().to_string(),
        reason,
    })
}

/// One year end to end. Failures are reported, never propagated.
pub fn process_year(cfg: &Config, src: &YearSource) -> YearOutcome {
    let _scope = ProfileScope::with_context("process_year", &[("year", v_str(&src.year))]);
    match try_year(cfg, src) {
        Ok(record) => YearOutcome::Generated(record),
        Err(err) => skipped(src, format!("{:#}", err)),
    }
}

/// Process every source on up to `cfg.workers` threads. Output order
/// matches `sources` regardless of the worker count.
pub fn process_all(cfg: &Config, sources: &[YearSource]) -> Vec<YearOutcome> {
    let workers = cfg.workers.max(1).min(sources.len().max(1));
    if workers == 1 {
        return sources.iter().map(|s| process_year(cfg, s)).collect();
    }
    let chunk = sources.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .chunks(chunk)
            .map(|part| (part, scope.spawn(move || part.iter().map(|s| process_year(cfg, s)).collect::<Vec<_>>())))
            .collect();
        handles
            .into_iter()
            .flat_map(|(part, handle)| match handle.join() {
                Ok(outcomes) => outcomes,
                Err(_) => part.iter().map(|s| skipped(s, "worker panicked".to_string())).collect(),
            })
            .collect()
    })
}

pub fn run(cfg: &Config) -> Result<RunReport> {
    cfg.validate()?;
    let _scope = ProfileScope::new("run");

    let sources = discover(&cfg.dataset_dir, &cfg.file_prefix, &cfg.file_ext)?;
    if sources.is_empty() {
        log(
            Level::Warn,
            Domain::Locate,
            "no_sources",
            obj(&[
                ("msg", v_str("no yearly files found; writing an empty page")),
                ("dir", v_str(&cfg.dataset_dir.display().to_string())),
                ("prefix", v_str(&cfg.file_prefix)),
                ("ext", v_str(&cfg.file_ext)),
            ]),
        );
    }
    log(
        Level::Info,
        Domain::System,
        "run_start",
        obj(&[
            ("msg", v_str("Generating JSON data for each year (relative normalization)")),
            ("years", json!(sources.len())),
            ("workers", json!(cfg.workers)),
            ("percentile", json!(cfg.percentile)),
        ]),
    );

    let mut generated = Vec::new();
    let mut skipped_years = Vec::new();
    for outcome in process_all(cfg, &sources) {
        match outcome {
            YearOutcome::Generated(r) => generated.push(r),
            YearOutcome::Skipped(s) => skipped_years.push(s),
        }
    }

    let years: Vec<String> = sources.iter().map(|s| s.year.clone()).collect();
    let html = compose_page(cfg, &years);
    let page = write_page(&cfg.site_dir, &html, years.len())?;

    let manifest = Manifest {
        generated_at: ts_now(),
        percentile: cfg.percentile,
        years: generated.clone(),
        skipped: skipped_years.clone(),
    };
    let manifest_path = write_manifest(&cfg.site_dir, &manifest)?;

    log(
        Level::Info,
        Domain::System,
        "run_complete",
        obj(&[
            ("generated", json!(generated.len())),
            ("skipped", json!(skipped_years.len())),
            ("page", v_str(&page.display().to_string())),
        ]),
    );

    Ok(RunReport {
        years,
        generated,
        skipped: skipped_years,
        page,
        manifest: manifest_path,
    })
}

