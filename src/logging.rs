//! Structured logging for the rain map generator.
//!
//! Every record is one JSON line carrying a run id, a sequence number, a
//! level and a domain. Records go to stdout and to the per-run files under
//! `LOG_DIR/<run_id>/` (`events.jsonl` for info and above, `trace.jsonl`
//! for trace/debug).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Locate,    // Dataset discovery
    Aggregate, // Time-mean, percentile, normalization
    Emit,      // Artifact and manifest writes
    Compose,   // Page assembly
    Boundary,  // Region collection fetch and indexing
    View,      // Interaction engine transitions
    System,    // Startup, shutdown
    Profile,   // Timing
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Locate => "locate",
            Domain::Aggregate => "aggregate",
            Domain::Emit => "emit",
            Domain::Compose => "compose",
            Domain::Boundary => "boundary",
            Domain::View => "view",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
}

fn open_sink(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
            return RunContext { run_id, events: None, trace: None };
        }

        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        RunContext {
            events: open_sink(run_dir.join("events.jsonl")),
            trace: open_sink(run_dir.join("trace.jsonl")),
            run_id,
        }
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["year", "region", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(writer) = writer {
        if let Ok(mut w) = writer.lock() {
            let _ = writeln!(w, "{}", line);
        }
    }
}

/// Flush the per-run files. Call once before the process exits.
pub fn flush() {
    if let Some(ctx) = RUN_CONTEXT.get() {
        for sink in [&ctx.events, &ctx.trace].into_iter().flatten() {
            if let Ok(mut w) = sink.lock() {
                let _ = w.flush();
            }
        }
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    println!("{}", line);
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_year_discovered(year: &str, path: &str) {
    log(
        Level::Debug,
        Domain::Locate,
        "year_discovered",
        obj(&[("year", v_str(year)), ("path", v_str(path))]),
    );
}

pub fn log_year_shadowed(year: &str, ignored: &str, used: &str) {
    log(
        Level::Warn,
        Domain::Locate,
        "year_shadowed",
        obj(&[
            ("year", v_str(year)),
            ("msg", v_str(&format!("Duplicate year {}: using {}, ignoring {}", year, used, ignored))),
            ("ignored", v_str(ignored)),
            ("used", v_str(used)),
        ]),
    );
}

/// SourceReadError: the year is skipped, the run continues.
pub fn log_year_skipped(year: &str, reason: &str) {
    log(
        Level::Error,
        Domain::Aggregate,
        "year_skipped",
        obj(&[
            ("year", v_str(year)),
            ("msg", v_str(&format!("Error processing {}: {}", year, reason))),
            ("reason", v_str(reason)),
        ]),
    );
}

pub fn log_year_aggregated(year: &str, cells: usize, points: usize, local_max: f64) {
    log(
        Level::Debug,
        Domain::Aggregate,
        "year_aggregated",
        obj(&[
            ("year", v_str(year)),
            ("cells", json!(cells)),
            ("points", json!(points)),
            ("local_max", v_num(local_max)),
        ]),
    );
}

pub fn log_artifact_written(year: &str, path: &str, points: usize, sha256: &str) {
    log(
        Level::Info,
        Domain::Emit,
        "artifact_written",
        obj(&[
            ("year", v_str(year)),
            ("msg", v_str(&format!("Saved {}", path))),
            ("path", v_str(path)),
            ("points", json!(points)),
            ("sha256", v_str(sha256)),
        ]),
    );
}

pub fn log_page_written(path: &str, years: usize, bytes: usize) {
    log(
        Level::Info,
        Domain::Compose,
        "page_written",
        obj(&[
            ("msg", v_str(&format!("Interactive map generated: {}", path))),
            ("path", v_str(path)),
            ("years", json!(years)),
            ("bytes", json!(bytes)),
        ]),
    );
}

pub fn log_boundary_loaded(url: &str, regions: usize, holes: usize) {
    log(
        Level::Info,
        Domain::Boundary,
        "loaded",
        obj(&[
            ("url", v_str(url)),
            ("regions", json!(regions)),
            ("mask_holes", json!(holes)),
        ]),
    );
}

/// BoundaryLoadError: map stays usable without masking or search.
pub fn log_boundary_failed(url: &str, reason: &str) {
    log(
        Level::Error,
        Domain::Boundary,
        "failed",
        obj(&[
            ("msg", v_str(&format!("Error loading GeoJSON: {}", reason))),
            ("url", v_str(url)),
        ]),
    );
}

pub fn log_view_event(event: &str, fields: &[(&str, Value)]) {
    log(Level::Debug, Domain::View, event, obj(fields));
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Map<String, Value>,
    started: Instant,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self::with_context(label, &[])
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            context: obj(fields),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = std::mem::take(&mut self.context);
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_split_fields_lifts_year() {
        let (top, data) = split_fields(obj(&[("year", v_str("2020")), ("points", json!(3))]));
        assert_eq!(top.get("year").unwrap(), "2020");
        assert!(data.contains_key("points"));
        assert!(!data.contains_key("year"));
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }
}
