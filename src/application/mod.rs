//! Application services: rendering, prerender expansion and reload.

pub mod error;
pub mod prerender;
pub mod reload;
pub mod render;
pub mod repos;
