//! Full reload cycle: clear the cache, recompile templates, prerender.

use std::{sync::Arc, time::Instant};

use futures::future::join_all;
use metrics::histogram;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::cache::CacheError;

use super::{
    prerender::{self, SpecFailure},
    render::{CompileError, PrerenderOutcome, RenderPipeline, SkipReason},
    repos::ContentSource,
};

const METRIC_RELOAD_MS: &str = "vellum_reload_ms";

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to clear the page cache")]
    Clear(#[source] CacheError),
    #[error("failed to compile templates")]
    Compile(#[source] CompileError),
}

/// A path whose prerender failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathFailure {
    pub path: String,
    pub reason: String,
}

/// What one completed reload did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    pub cleared: usize,
    pub templates: Vec<String>,
    pub paths: usize,
    pub stored: usize,
    pub skipped: usize,
    pub failed: Vec<PathFailure>,
    pub skipped_specs: Vec<SpecFailure>,
    pub not_found_page: bool,
    pub elapsed_ms: u64,
}

/// Runs reload cycles one at a time.
pub struct Reloader {
    pipeline: RenderPipeline,
    source: Arc<dyn ContentSource>,
    gate: Mutex<()>,
}

impl Reloader {
    pub fn new(pipeline: RenderPipeline, source: Arc<dyn ContentSource>) -> Self {
        Self {
            pipeline,
            source,
            gate: Mutex::new(()),
        }
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Clear, compile, then prerender every declared path concurrently.
    ///
    /// Clear and compile failures abort the cycle. Per-spec and per-path
    /// failures are recorded in the report. A second caller waits for the
    /// running cycle to finish before starting its own.
    #[instrument(skip(self), target = "vellum::reload")]
    pub async fn reload(&self) -> Result<ReloadReport, ReloadError> {
        let _guard = self.gate.lock().await;
        let started_at = Instant::now();

        let cleared = self.pipeline.cache().clear().await.map_err(|err| {
            error!(target = "vellum::reload", error = %err, "cache clear failed");
            ReloadError::Clear(err)
        })?;

        let compiled = self
            .pipeline
            .templates()
            .compile_all()
            .await
            .map_err(|err| {
                error!(target = "vellum::reload", error = %err, "template compile failed");
                ReloadError::Compile(err)
            })?;

        let expansion = prerender::expand(&self.pipeline.site().prerender, self.source.as_ref()).await;

        let renders = expansion.paths.iter().map(|path| async move {
            (path, self.pipeline.prerender(path).await)
        });

        let mut report = ReloadReport {
            cleared,
            templates: compiled.templates,
            paths: expansion.paths.len(),
            skipped_specs: expansion.failures,
            ..ReloadReport::default()
        };

        for (path, result) in join_all(renders).await {
            match result {
                Ok(PrerenderOutcome::Stored) => report.stored += 1,
                Ok(PrerenderOutcome::Skipped(reason)) => {
                    if reason == SkipReason::NoRoute {
                        warn!(target = "vellum::reload", path = %path, "prerender path has no route");
                    }
                    report.skipped += 1;
                }
                Err(err) => {
                    warn!(target = "vellum::reload", path = %path, error = %err, "prerender failed");
                    report.failed.push(PathFailure {
                        path: path.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        match self.pipeline.render_not_found_page().await {
            Ok(stored) => report.not_found_page = stored,
            Err(err) => {
                warn!(target = "vellum::reload", error = %err, "not-found page failed to render");
            }
        }

        let elapsed = started_at.elapsed();
        report.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        histogram!(METRIC_RELOAD_MS).record(elapsed.as_secs_f64() * 1000.0);

        info!(
            target = "vellum::reload",
            cleared = report.cleared,
            templates = report.templates.len(),
            paths = report.paths,
            stored = report.stored,
            skipped = report.skipped,
            failed = report.failed.len(),
            skipped_specs = report.skipped_specs.len(),
            elapsed_ms = report.elapsed_ms,
            "reload complete"
        );

        Ok(report)
    }
}
