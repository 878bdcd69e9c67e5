use anyhow::{anyhow, Result};
use std::path::PathBuf;

pub const DEFAULT_BOUNDARY_URL: &str =
    "https://raw.githubusercontent.com/geohacker/india/master/state/india_telengana.geojson";
pub const DEFAULT_TILE_URL: &str =
    "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png";

/// Feature property keys checked for a region's display name, first match wins.
pub const NAME_KEYS: [&str; 2] = ["NAME_1", "name"];

#[derive(Debug, Clone)]
pub struct Config {
    pub dataset_dir: PathBuf,
    pub file_prefix: String,
    pub file_ext: String,
    pub variable: String,
    pub site_dir: PathBuf,
    /// Fraction in [0, 1] used for the per-year local max.
    pub percentile: f64,
    pub workers: usize,
    pub boundary_url: String,
    pub tile_url: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub title: String,
    pub source_label: String,
    pub region_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("rain/IPED_Mean_Source_Data"),
            file_prefix: "IPED_mean".to_string(),
            file_ext: "csv".to_string(),
            variable: "pcp".to_string(),
            site_dir: PathBuf::from("rain/site"),
            percentile: 0.98,
            workers: num_cpus::get().max(1),
            boundary_url: DEFAULT_BOUNDARY_URL.to_string(),
            tile_url: DEFAULT_TILE_URL.to_string(),
            center_lat: 22.0,
            center_lon: 78.0,
            zoom: 5,
            title: "Average Annual Rainfall".to_string(),
            source_label: "IPED Mean Source Data".to_string(),
            region_label: "India".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            dataset_dir: std::env::var("RAIN_DATASET_DIR").map(PathBuf::from).unwrap_or(d.dataset_dir),
            file_prefix: std::env::var("RAIN_FILE_PREFIX").unwrap_or(d.file_prefix),
            file_ext: std::env::var("RAIN_FILE_EXT").unwrap_or(d.file_ext),
            variable: std::env::var("RAIN_VARIABLE").unwrap_or(d.variable),
            site_dir: std::env::var("RAIN_SITE_DIR").map(PathBuf::from).unwrap_or(d.site_dir),
            percentile: std::env::var("RAIN_PERCENTILE").ok().and_then(|v| v.parse::<f64>().ok()).map(|p| p.clamp(0.0, 1.0)).unwrap_or(d.percentile),
            workers: std::env::var("RAIN_WORKERS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.workers),
            boundary_url: std::env::var("BOUNDARY_URL").unwrap_or(d.boundary_url),
            tile_url: std::env::var("TILE_URL").unwrap_or(d.tile_url),
            center_lat: std::env::var("MAP_CENTER_LAT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.center_lat),
            center_lon: std::env::var("MAP_CENTER_LON").ok().and_then(|v| v.parse().ok()).unwrap_or(d.center_lon),
            zoom: std::env::var("MAP_ZOOM").ok().and_then(|v| v.parse().ok()).unwrap_or(d.zoom),
            title: std::env::var("PAGE_TITLE").unwrap_or(d.title),
            source_label: std::env::var("DATA_SOURCE_LABEL").unwrap_or(d.source_label),
            region_label: std::env::var("REGION_LABEL").unwrap_or(d.region_label),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow!("workers must be at least 1"));
        }
        if self.variable.trim().is_empty() {
            return Err(anyhow!("variable name is empty"));
        }
        if !(0.0..=1.0).contains(&self.percentile) {
            return Err(anyhow!("percentile {} outside [0, 1]", self.percentile));
        }
        url::Url::parse(&self.boundary_url)
            .map_err(|e| anyhow!("bad boundary url {}: {}", self.boundary_url, e))?;
        let probe = self
            .tile_url
            .replace("{s}", "a")
            .replace("{z}", "0")
            .replace("{x}", "0")
            .replace("{y}", "0")
            .replace("{r}", "");
        url::Url::parse(&probe)
            .map_err(|e| anyhow!("bad tile url {}: {}", self.tile_url, e))?;
        if !(self.tile_url.contains("{z}") && self.tile_url.contains("{x}") && self.tile_url.contains("{y}")) {
            return Err(anyhow!("tile url must template {{z}}/{{x}}/{{y}}: {}", self.tile_url));
        }
        Ok(())
    }

    /// Full-country view restored by reset.
    pub fn default_view(&self) -> crate::view::Viewport {
        crate::view::Viewport::Center {
            lat: self.center_lat,
            lon: self.center_lon,
            zoom: self.zoom,
        }
    }
}
