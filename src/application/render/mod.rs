//! Page rendering: compiled templates and the per-path render pipeline.
//!
//! The pipeline owns no mutable state of its own. Templates live behind an
//! atomically swapped snapshot and rendered pages live on disk, so a live
//! request and a reload may run side by side.

mod pipeline;
mod templates;
mod types;

pub use pipeline::RenderPipeline;
pub use templates::{
    CompileError, CompileReport, RenderError, TemplateFailure, TemplateSet, TemplateStore,
};
pub use types::{PageContext, PrerenderError, PrerenderOutcome, RenderOutcome, SkipReason};
