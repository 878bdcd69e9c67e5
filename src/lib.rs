//! Yearly precipitation grids to per-year heatmap artifacts and a static
//! map page with year navigation and region masking.

pub mod aggregate;
pub mod boundary;
pub mod config;
pub mod emit;
pub mod geometry;
pub mod grid;
pub mod locate;
pub mod logging;
pub mod mask;
pub mod page;
pub mod pipeline;
pub mod retry;
pub mod view;
