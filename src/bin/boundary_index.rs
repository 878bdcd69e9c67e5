//! Boundary inspection: fetch the region collection the map page uses,
//! build the search index and the full-country mask, print a summary.
//!
//! Usage:
//!   cargo run --bin boundary_index                      # BOUNDARY_URL or the default
//!   cargo run --bin boundary_index -- states.geojson    # local file

use rainmap::boundary::{load_index, source_for};
use rainmap::config::Config;
use rainmap::logging::{self, log_boundary_failed, log_boundary_loaded};

#[tokio::main]
async fn main() {
    let cfg = Config::from_env();
    let location = std::env::args().nth(1).unwrap_or_else(|| cfg.boundary_url.clone());

    let source = match source_for(&location) {
        Ok(s) => s,
        Err(err) => {
            log_boundary_failed(&location, &format!("{:#}", err));
            logging::flush();
            std::process::exit(1);
        }
    };

    let index = match load_index(source.as_ref()).await {
        Ok(idx) => idx,
        Err(err) => {
            log_boundary_failed(&location, &format!("{:#}", err));
            logging::flush();
            std::process::exit(2);
        }
    };

    let mask = index.full_mask();
    log_boundary_loaded(&location, index.names().len(), mask.holes.len());

    println!();
    println!("{:<40} {:>6} {:>28}", "Region", "Parts", "Bounds (S,W,N,E)");
    println!("{}", "-".repeat(76));
    for name in index.names() {
        let parts = index
            .get(name)
            .and_then(|f| f.geometry.as_ref())
            .map(|g| g.part_count())
            .unwrap_or(0);
        let bounds = index
            .bounds_of(name)
            .map(|b| format!("{:.2},{:.2},{:.2},{:.2}", b.south, b.west, b.north, b.east))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<40} {:>6} {:>28}", name, parts, bounds);
    }
    println!();
    println!("features: {}", index.len());
    println!("named regions: {}", index.names().len());
    println!("mask holes (full country): {}", mask.holes.len());
    logging::flush();
}
