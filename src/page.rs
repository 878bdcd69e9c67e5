//! Single-file map page: basemap, heat layer per year, region search and
//! the inverse mask. Only the year labels come from the pipeline; artifacts
//! are fetched by the page when a year is shown.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, NAME_KEYS};
use crate::logging::log_page_written;
use crate::mask::{MASK_STYLE, WORLD_RING};
use crate::view::HEAT_OPTIONS;

pub const PAGE_FILE: &str = "map.html";

pub const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.7.1/dist/leaflet.css";
pub const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.7.1/dist/leaflet.js";
pub const LEAFLET_HEAT_JS: &str = "https://cdnjs.cloudflare.com/ajax/libs/leaflet.heat/0.2.0/leaflet-heat.js";

const TILE_ATTRIBUTION: &str = "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors &copy; <a href=\"https://carto.com/attributions\">CARTO</a>";

/// JSON for inline `<script>`: `</` cannot close the element early.
pub fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Everything the page script reads, as one object.
pub fn page_config(cfg: &Config, years: &[String]) -> Value {
    json!({
        "years": years,
        "initialYear": years.first(),
        "title": cfg.title,
        "sourceLabel": cfg.source_label,
        "regionLabel": cfg.region_label,
        "boundaryUrl": cfg.boundary_url,
        "nameKeys": NAME_KEYS,
        "tileUrl": cfg.tile_url,
        "tileAttribution": TILE_ATTRIBUTION,
        "center": [cfg.center_lat, cfg.center_lon],
        "zoom": cfg.zoom,
        "heat": HEAT_OPTIONS.to_json(),
        "worldRing": WORLD_RING,
        "maskStyle": MASK_STYLE,
    })
}

/// Substitute every placeholder in one left-to-right pass. Inserted values
/// are never rescanned, so a value containing a placeholder stays literal.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = values
            .iter()
            .filter_map(|(key, value)| rest.find(key).map(|at| (at, *key, *value)))
            .min_by_key(|(at, key, _)| (*at, std::cmp::Reverse(key.len())));
        let Some((at, key, value)) = next else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..at]);
        out.push_str(value);
        rest = &rest[at + key.len()..];
    }
}

pub fn compose_page(cfg: &Config, years: &[String]) -> String {
    let title = escape_html(&cfg.title);
    let config = script_json(&page_config(cfg, years));
    fill_template(
        TEMPLATE,
        &[
            ("__LEAFLET_CSS__", LEAFLET_CSS),
            ("__LEAFLET_JS__", LEAFLET_JS),
            ("__LEAFLET_HEAT_JS__", LEAFLET_HEAT_JS),
            ("__PAGE_TITLE__", title.as_str()),
            ("__MAP_CONFIG__", config.as_str()),
        ],
    )
}

pub fn write_page(site_dir: &Path, html: &str, years: usize) -> Result<PathBuf> {
    fs::create_dir_all(site_dir).with_context(|| format!("create {}", site_dir.display()))?;
    let path = site_dir.join(PAGE_FILE);
    fs::write(&path, html).with_context(|| format!("write {}", path.display()))?;
    log_page_written(&path.display().to_string(), years, html.len());
    Ok(path)
}

const TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>__PAGE_TITLE__</title>
  <link rel="stylesheet" href="__LEAFLET_CSS__">
  <script src="__LEAFLET_JS__"></script>
  <script src="__LEAFLET_HEAT_JS__"></script>
  <style>
    html, body { height: 100%; margin: 0; font-family: Arial, Helvetica, sans-serif; }
    #map { width: 100%; height: 100%; background: #fff; }
    .panel {
      background: rgba(255, 255, 255, 0.92);
      border: 1px solid #ccc;
      border-radius: 5px;
      box-shadow: 0 0 15px rgba(0, 0, 0, 0.2);
      padding: 8px 10px;
      font: 14px/16px Arial, Helvetica, sans-serif;
    }
    .panel h4 { margin: 0 0 5px; color: #333; }
    .legend i { width: 18px; height: 18px; float: left; margin-right: 8px; opacity: 0.8; }
    .search-row { margin-bottom: 10px; }
    .search-row input { width: 200px; padding: 5px; border: 1px solid #ddd; border-radius: 3px; font-size: 14px; }
    .year-row { display: flex; align-items: center; gap: 5px; }
    .year-row select { padding: 5px; border: 1px solid #ddd; border-radius: 3px; font-size: 14px; }
    .year-btn { background: #f0f0f0; border: 1px solid #ccc; border-radius: 3px; padding: 5px 10px; cursor: pointer; font-size: 14px; }
    .year-btn:hover:enabled { background: #e0e0e0; }
    .year-btn:disabled { cursor: default; opacity: 0.4; }
    .reset-btn { margin-top: 6px; width: 100%; padding: 5px; background: #f8d7da; border: 1px solid #f5c6cb; color: #721c24; border-radius: 3px; cursor: pointer; font-size: 13px; }
    .reset-btn:hover:enabled { background: #f1b0b7; }
    .reset-btn:disabled { cursor: default; opacity: 0.5; }
  </style>
</head>
<body>
  <div id="map"></div>
  <script>
    var CONFIG = __MAP_CONFIG__;

    var map = L.map('map').setView(CONFIG.center, CONFIG.zoom);
    L.tileLayer(CONFIG.tileUrl, {
      attribution: CONFIG.tileAttribution,
      subdomains: 'abcd',
      maxZoom: 20
    }).addTo(map);

    // Everything the interaction handlers mutate lives here.
    var view = {
      years: CONFIG.years,
      selected: -1,
      focused: null,
      heatLayer: null,
      maskLayer: null,
      regions: {},
      allFeatures: [],
      boundariesLoaded: false
    };

    // ---------------------------------------------------------------------
    // Controls
    // ---------------------------------------------------------------------

    var controls = L.control({ position: 'topleft' });
    controls.onAdd = function () {
      var div = L.DomUtil.create('div', 'panel');

      var search = L.DomUtil.create('div', 'search-row', div);
      var input = L.DomUtil.create('input', '', search);
      input.type = 'text';
      input.id = 'regionSearch';
      input.placeholder = 'Search State...';
      input.setAttribute('list', 'regionList');
      input.disabled = true;
      var datalist = L.DomUtil.create('datalist', '', search);
      datalist.id = 'regionList';

      var row = L.DomUtil.create('div', 'year-row', div);
      L.DomUtil.create('strong', '', row).innerText = 'Year: ';
      var prev = L.DomUtil.create('button', 'year-btn', row);
      prev.id = 'prevYear';
      prev.innerHTML = '&lt;';
      var select = L.DomUtil.create('select', '', row);
      select.id = 'yearSelect';
      view.years.forEach(function (y) {
        var opt = document.createElement('option');
        opt.value = y;
        opt.innerText = y;
        select.appendChild(opt);
      });
      var next = L.DomUtil.create('button', 'year-btn', row);
      next.id = 'nextYear';
      next.innerHTML = '&gt;';

      var reset = L.DomUtil.create('button', 'reset-btn', div);
      reset.id = 'resetView';
      reset.innerText = 'Reset to ' + CONFIG.regionLabel;
      reset.disabled = true;

      L.DomEvent.disableClickPropagation(div);
      return div;
    };
    controls.addTo(map);

    var titleControl = L.control({ position: 'topright' });
    titleControl.onAdd = function () {
      var div = L.DomUtil.create('div', 'panel');
      var h = L.DomUtil.create('h4', '', div);
      h.id = 'mapTitle';
      h.innerText = CONFIG.title;
      L.DomUtil.create('p', '', div).innerText = 'Data Source: ' + CONFIG.sourceLabel;
      return div;
    };
    titleControl.addTo(map);

    var legend = L.control({ position: 'bottomright' });
    legend.onAdd = function () {
      var div = L.DomUtil.create('div', 'panel legend');
      var grades = [['Low', 'blue'], ['Medium', 'lime'], ['High', 'red']];
      var html = '<strong>Intensity</strong><br>';
      grades.forEach(function (g) {
        html += '<i style="background:' + g[1] + '"></i> ' + g[0] + '<br>';
      });
      div.innerHTML = html;
      return div;
    };
    legend.addTo(map);

    var yearSelect = document.getElementById('yearSelect');
    var prevBtn = document.getElementById('prevYear');
    var nextBtn = document.getElementById('nextYear');
    var searchInput = document.getElementById('regionSearch');
    var resetBtn = document.getElementById('resetView');

    // ---------------------------------------------------------------------
    // Geometry and mask
    // ---------------------------------------------------------------------

    function displayName(props) {
      if (!props) return null;
      for (var i = 0; i < CONFIG.nameKeys.length; i++) {
        var v = props[CONFIG.nameKeys[i]];
        if (typeof v === 'string' && v !== '') return v;
      }
      return null;
    }

    // One [lat, lon] outer ring per polygon part; inner rings are dropped.
    function outerRings(feature) {
      var g = feature.geometry;
      if (!g) return [];
      var parts = g.type === 'Polygon' ? [g.coordinates]
        : g.type === 'MultiPolygon' ? g.coordinates : [];
      return parts
        .filter(function (rings) { return rings.length > 0; })
        .map(function (rings) {
          return rings[0]
            .filter(function (p) { return p.length >= 2; })
            .map(function (p) { return [p[1], p[0]]; });
        });
    }

    function applyMask(features) {
      if (view.maskLayer) {
        map.removeLayer(view.maskLayer);
      }
      var holes = [];
      features.forEach(function (f) { holes = holes.concat(outerRings(f)); });
      view.maskLayer = L.polygon([CONFIG.worldRing].concat(holes), CONFIG.maskStyle).addTo(map);
    }

    function focusRegion(name) {
      var feature = view.regions[name];
      if (!feature || outerRings(feature).length === 0) return;
      map.fitBounds(L.geoJSON(feature).getBounds());
      applyMask([feature]);
      view.focused = name;
    }

    function resetView() {
      if (view.boundariesLoaded) {
        applyMask(view.allFeatures);
      }
      map.setView(CONFIG.center, CONFIG.zoom);
      view.focused = null;
      searchInput.value = '';
    }

    // ---------------------------------------------------------------------
    // Years
    // ---------------------------------------------------------------------

    function updateNav() {
      yearSelect.selectedIndex = view.selected;
      prevBtn.disabled = !(view.selected > 0);
      nextBtn.disabled = !(view.selected >= 0 && view.selected < view.years.length - 1);
    }

    function selectYear(idx) {
      if (idx < 0 || idx >= view.years.length) return;
      view.selected = idx;
      updateNav();
      var year = view.years[idx];
      document.getElementById('mapTitle').innerText = CONFIG.title + ' (' + year + ')';

      var file = 'heatmap_data_' + year + '.json';
      console.log('Loading ' + file);
      fetch(file)
        .then(function (res) {
          if (!res.ok) throw new Error('HTTP ' + res.status + ' for ' + file);
          return res.json();
        })
        .then(function (points) {
          // A slower response for an earlier selection must not win.
          if (view.years[view.selected] !== year) {
            console.log('Discarding stale data for ' + year);
            return;
          }
          if (view.heatLayer) {
            map.removeLayer(view.heatLayer);
          }
          view.heatLayer = L.heatLayer(points, CONFIG.heat).addTo(map);
        })
        .catch(function (err) {
          console.error('Error loading heatmap data for ' + year + ':', err);
          if (view.years[view.selected] === year && view.heatLayer) {
            map.removeLayer(view.heatLayer);
            view.heatLayer = null;
          }
        });
    }

    yearSelect.addEventListener('change', function () {
      selectYear(yearSelect.selectedIndex);
    });
    prevBtn.addEventListener('click', function () {
      if (view.selected > 0) selectYear(view.selected - 1);
    });
    nextBtn.addEventListener('click', function () {
      if (view.selected >= 0 && view.selected < view.years.length - 1) selectYear(view.selected + 1);
    });

    // ---------------------------------------------------------------------
    // Boundaries: search and reset are wired once this settles
    // ---------------------------------------------------------------------

    var boundariesReady = fetch(CONFIG.boundaryUrl)
      .then(function (res) {
        if (!res.ok) throw new Error('HTTP ' + res.status);
        return res.json();
      })
      .then(function (data) {
        var datalist = document.getElementById('regionList');
        view.allFeatures = data.features || [];
        view.allFeatures.forEach(function (feature) {
          var name = displayName(feature.properties);
          if (!name) return;
          if (!view.regions[name]) {
            var opt = document.createElement('option');
            opt.value = name;
            datalist.appendChild(opt);
          }
          view.regions[name] = feature;
        });
        view.boundariesLoaded = true;
        applyMask(view.allFeatures);
        return true;
      })
      .catch(function (err) {
        console.error('Error loading GeoJSON:', err);
        return false;
      });

    boundariesReady.then(function (loaded) {
      searchInput.disabled = !loaded;
      resetBtn.disabled = false;
      searchInput.addEventListener('change', function (e) {
        focusRegion(e.target.value);
      });
      resetBtn.addEventListener('click', resetView);
    });

    if (view.years.length > 0) {
      selectYear(0);
    } else {
      updateNav();
      document.getElementById('mapTitle').innerText = CONFIG.title + ' (no data)';
    }
  </script>
</body>
</html>
"##;
