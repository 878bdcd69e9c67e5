use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregate::{IntensityPoint, YearArtifact};
use crate::logging::log_artifact_written;

pub const MANIFEST_FILE: &str = "manifest.json";

pub fn artifact_file_name(year: &str) -> String {
    format!("heatmap_data_{}.json", year)
}

/// Compact JSON array of `[lat, lon, intensity]` triples.
pub fn artifact_bytes(artifact: &YearArtifact) -> Result<Vec<u8>> {
    serde_json::to_vec(&artifact.points).context("serialize artifact")
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub year: String,
    pub source: String,
    pub file: String,
    pub points: usize,
    pub cells: usize,
    pub local_max: f64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedYear {
    pub year: String,
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: String,
    pub percentile: f64,
    pub years: Vec<ArtifactRecord>,
    pub skipped: Vec<SkippedYear>,
}

/// Write one year's artifact into `site_dir`, replacing any previous one.
pub fn write_artifact(site_dir: &Path, artifact: &YearArtifact, source: &Path) -> Result<ArtifactRecord> {
    fs::create_dir_all(site_dir).with_context(|| format!("create {}", site_dir.display()))?;
    let file = artifact_file_name(&artifact.year);
    let path = site_dir.join(&file);
    let bytes = artifact_bytes(artifact)?;
    fs::write(&path, &bytes).with_context(|| format!("write {}", path.display()))?;

    let record = ArtifactRecord {
        year: artifact.year.clone(),
        source: source.display().to_string(),
        file,
        points: artifact.points.len(),
        cells: artifact.cells,
        local_max: artifact.local_max,
        sha256: sha256_hex(&bytes),
    };
    log_artifact_written(&record.year, &path.display().to_string(), record.points, &record.sha256);
    Ok(record)
}

pub fn write_manifest(site_dir: &Path, manifest: &Manifest) -> Result<PathBuf> {
    fs::create_dir_all(site_dir).with_context(|| format!("create {}", site_dir.display()))?;
    let path = site_dir.join(MANIFEST_FILE);
    let text = serde_json::to_string_pretty(manifest).context("serialize manifest")?;
    fs::write(&path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// Load a previously written artifact back into points.
pub fn read_artifact(site_dir: &Path, year: &str) -> Result<Vec<IntensityPoint>> {
    let path = site_dir.join(artifact_file_name(year));
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_from_year() {
        assert_eq!(artifact_file_name("2019"), "heatmap_data_2019.json");
    }

    #[test]
    fn bytes_are_positional_triples() {
        let art = YearArtifact {
            year: "2020".to_string(),
            local_max: 9.9,
            cells: 3,
            points: vec![
                IntensityPoint { lat: 20.0, lon: 75.0, intensity: 1.0 },
                IntensityPoint { lat: 20.0, lon: 76.0, intensity: 0.5 },
            ],
        };
        let text = String::from_utf8(artifact_bytes(&art).unwrap()).unwrap();
        assert_eq!(text, "[[20.0,75.0,1.0],[20.0,76.0,0.5]]");
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
