use anyhow::Result;
use serde_json::json;

use rainmap::config::Config;
use rainmap::logging::{self, log, obj, v_str, Domain, Level};
use rainmap::pipeline;

fn main() -> Result<()> {
    let cfg = Config::from_env();
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("dataset_dir", v_str(&cfg.dataset_dir.display().to_string())),
            ("site_dir", v_str(&cfg.site_dir.display().to_string())),
            ("variable", v_str(&cfg.variable)),
        ]),
    );

    let result = pipeline::run(&cfg);
    match &result {
        Ok(report) => {
            log(
                Level::Info,
                Domain::System,
                "shutdown",
                obj(&[
                    ("years", json!(report.years)),
                    ("generated", json!(report.generated.len())),
                    ("skipped", json!(report.skipped.iter().map(|s| s.year.as_str()).collect::<Vec<_>>())),
                    ("manifest", v_str(&report.manifest.display().to_string())),
                ]),
            );
        }
        Err(err) => {
            log(
                Level::Fatal,
                Domain::System,
                "run_failed",
                obj(&[("msg", v_str(&format!("{:#}", err)))]),
            );
        }
    }
    logging::flush();
    result.map(|_| ())
}
