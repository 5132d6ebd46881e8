//! Vellum: route table, filesystem page cache, and reload-time prerendering
//! for a small content site.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
