//! Yearly grid sample sets and the file formats they are read from.
//!
//! A grid file holds one precipitation variable sampled over
//! (time, lat, lon). Readers keep cells in the order the grid first lists
//! them so that downstream output order is stable across runs.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Time series of one spatial cell. `None` marks a missing sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSeries {
    pub lat: f64,
    pub lon: f64,
    pub samples: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridSampleSet {
    pub cells: Vec<CellSeries>,
}

impl GridSampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Append an observation, creating the cell on first sight.
    pub fn push(&mut self, index: &mut HashMap<(u64, u64), usize>, lat: f64, lon: f64, value: Option<f64>) {
        let value = value.filter(|v| !v.is_nan());
        let key = (lat.to_bits(), lon.to_bits());
        let idx = *index.entry(key).or_insert_with(|| {
            self.cells.push(CellSeries { lat, lon, samples: Vec::new() });
            self.cells.len() - 1
        });
        self.cells[idx].samples.push(value);
    }
}

/// Seam between the aggregator and whatever format a year is stored in.
pub trait GridSource {
    fn load(&self, path: &Path, variable: &str) -> Result<GridSampleSet>;
}

/// Pick a reader from the file extension.
pub fn source_for(path: &Path) -> Result<Box<dyn GridSource>> {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("csv") => Ok(Box::new(CsvGrid)),
        Some("json") => Ok(Box::new(JsonGrid)),
        other => Err(anyhow!("unsupported grid format: {:?}", other)),
    }
}

pub fn load_grid(path: &Path, variable: &str) -> Result<GridSampleSet> {
    source_for(path)?.load(path, variable)
}

// =============================================================================
// CSV (long form)
// =============================================================================

/// One observation per row: `time,lat,lon,<variable>` in any column order.
pub struct CsvGrid;

const MISSING_TOKENS: [&str; 5] = ["", "nan", "na", "--", "null"];

fn parse_value(field: &str) -> Result<Option<f64>, String> {
    let f = field.trim();
    if MISSING_TOKENS.contains(&f.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    match f.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Err(format!("non-finite value {:?}", f)),
        Err(e) => Err(format!("bad value {:?}: {}", f, e)),
    }
}

fn parse_coord(field: &str, name: &str) -> Result<f64, String> {
    let f = field.trim();
    match f.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(format!("non-finite {}: {:?}", name, f)),
        Err(e) => Err(format!("bad {} {:?}: {}", name, f, e)),
    }
}

struct Columns {
    time: usize,
    lat: usize,
    lon: usize,
    value: usize,
}

impl Columns {
    fn from_header(header: &[String], variable: &str) -> Result<Self, String> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| format!("missing column {:?} in header {:?}", name, header))
        };
        Ok(Self {
            time: find("time")?,
            lat: find("lat")?,
            lon: find("lon")?,
            value: find(variable)?,
        })
    }

    fn width(&self) -> usize {
        self.time.max(self.lat).max(self.lon).max(self.value) + 1
    }
}

impl GridSource for CsvGrid {
    fn load(&self, path: &Path, variable: &str) -> Result<GridSampleSet> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut lines = reader.lines().enumerate();
        let mut cols: Option<Columns> = None;
        for (_, line) in lines.by_ref() {
            let line = line.with_context(|| format!("read {}", path.display()))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let header: Vec<String> = trimmed.split(',').map(|s| s.trim().to_string()).collect();
            cols = Some(Columns::from_header(&header, variable).map_err(|e| anyhow!(e))?);
            break;
        }
        let cols = cols.ok_or_else(|| anyhow!("{}: missing header", path.display()))?;

        let mut grid = GridSampleSet::new();
        let mut index = HashMap::new();

        for (lineno, line) in lines {
            let line = line.with_context(|| format!("read {}", path.display()))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = trimmed.split(',').collect();
            if parts.len() < cols.width() {
                return Err(anyhow!(
                    "line {}: expected {}+ columns, got {}",
                    lineno + 1,
                    cols.width(),
                    parts.len()
                ));
            }
            let row = (|| -> Result<(f64, f64, Option<f64>), String> {
                // time only has to be present; the mean ignores its value
                if parts[cols.time].trim().is_empty() {
                    return Err("empty time".to_string());
                }
                let lat = parse_coord(parts[cols.lat], "lat")?;
                let lon = parse_coord(parts[cols.lon], "lon")?;
                let value = parse_value(parts[cols.value])?;
                Ok((lat, lon, value))
            })()
            .map_err(|e| anyhow!("line {}: {}", lineno + 1, e))?;
            grid.push(&mut index, row.0, row.1, row.2);
        }
        Ok(grid)
    }
}

// =============================================================================
// JSON (dense, indexed [time][lat][lon])
// =============================================================================

pub struct JsonGrid;

fn coord_axis(doc: &Value, name: &str) -> Result<Vec<f64>> {
    doc.get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("missing axis {:?}", name))?
        .iter()
        .map(|v| v.as_f64().ok_or_else(|| anyhow!("non-numeric {} coordinate: {}", name, v)))
        .collect()
}

impl GridSource for JsonGrid {
    fn load(&self, path: &Path, variable: &str) -> Result<GridSampleSet> {
        let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let doc: Value = serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;

        let times = doc
            .get("time")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("missing axis \"time\""))?
            .len();
        let lats = coord_axis(&doc, "lat")?;
        let lons = coord_axis(&doc, "lon")?;
        let data = doc
            .get(variable)
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("missing variable {:?}", variable))?;
        if data.len() != times {
            return Err(anyhow!("{}: {} time slices for {} times", variable, data.len(), times));
        }

        let mut grid = GridSampleSet {
            cells: Vec::with_capacity(lats.len() * lons.len()),
        };
        for &lat in &lats {
            for &lon in &lons {
                grid.cells.push(CellSeries { lat, lon, samples: Vec::with_capacity(times) });
            }
        }

        for (t, slice) in data.iter().enumerate() {
            let rows = slice
                .as_array()
                .filter(|r| r.len() == lats.len())
                .ok_or_else(|| anyhow!("time slice {}: expected {} lat rows", t, lats.len()))?;
            for (i, row) in rows.iter().enumerate() {
                let vals = row
                    .as_array()
                    .filter(|r| r.len() == lons.len())
                    .ok_or_else(|| anyhow!("time slice {} row {}: expected {} lon values", t, i, lons.len()))?;
                for (j, v) in vals.iter().enumerate() {
                    let sample = match v {
                        Value::Null => None,
                        Value::Number(n) => match n.as_f64() {
                            Some(v) if v.is_finite() => Some(v),
                            _ => return Err(anyhow!("non-finite sample at [{}][{}][{}]: {}", t, i, j, n)),
                        },
                        other => return Err(anyhow!("non-numeric sample at [{}][{}][{}]: {}", t, i, j, other)),
                    };
                    grid.cells[i * lons.len() + j].samples.push(sample);
                }
            }
        }
        Ok(grid)
    }
}
