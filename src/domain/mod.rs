//! Domain layer types and invariants.

pub mod error;
pub mod identity;
pub mod prerender;
pub mod routes;
pub mod site;
