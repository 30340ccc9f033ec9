//! Core entry point for the returns_dashboard crate.
//!
//! The crate has two halves: an export pipeline that turns dashboard data into
//! an image-only A4 PDF ([`export::ReportExporter`]), and a client plus state
//! holders for the returns endpoints ([`api::ReturnsClient`],
//! [`returns::ReturnsList`]).

pub mod api;
pub mod config;
pub mod export;
pub mod html;
pub mod locale;
pub mod logo;
pub mod model;
pub mod offscreen;
pub mod paginate;
pub mod raster;
pub mod resource;
pub mod returns;
