//! Request-time and prerender-time page rendering.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error, warn};

use crate::{
    cache::{CacheKey, PageCache},
    domain::{identity::Identity, site::SiteDefinition},
};

use super::{
    templates::{RenderError, TemplateStore},
    types::{PageContext, PrerenderError, PrerenderOutcome, RenderOutcome, SkipReason},
};

const METRIC_CACHE_HIT: &str = "vellum_cache_hit_total";
const METRIC_CACHE_MISS: &str = "vellum_cache_miss_total";
const METRIC_RENDER: &str = "vellum_render_total";
const METRIC_NOT_FOUND: &str = "vellum_not_found_total";
const METRIC_CACHE_POLLUTION: &str = "vellum_cache_pollution_total";

/// Decides for each path whether to serve from cache, render, or report not found.
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    site: Arc<SiteDefinition>,
    templates: Arc<TemplateStore>,
    cache: PageCache,
}

impl RenderPipeline {
    pub fn new(site: Arc<SiteDefinition>, templates: Arc<TemplateStore>, cache: PageCache) -> Self {
        Self {
            site,
            templates,
            cache,
        }
    }

    pub fn site(&self) -> &SiteDefinition {
        &self.site
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Serve a live request.
    ///
    /// Only a template failure is an error. Cache I/O problems are logged and
    /// the request proceeds as if the cache were cold.
    pub async fn handle(
        &self,
        path: &str,
        identity: Option<&Identity>,
    ) -> Result<RenderOutcome, RenderError> {
        let key = CacheKey::from_path(path);

        match self.cache.read_key(&key).await {
            Ok(Some(body)) => {
                let Some(route) = self.site.routes.find(path) else {
                    if CacheKey::is_canonical_path(path) {
                        error!(
                            target = "vellum::render::pipeline",
                            path,
                            key = %key,
                            "cache entry has no matching route"
                        );
                        counter!(METRIC_CACHE_POLLUTION).increment(1);
                    } else {
                        debug!(
                            target = "vellum::render::pipeline",
                            path,
                            key = %key,
                            "unrouted alias of a cached path"
                        );
                    }
                    return Ok(self.not_found().await);
                };
                counter!(METRIC_CACHE_HIT).increment(1);
                return Ok(RenderOutcome::Cached {
                    mime: route.mime().to_string(),
                    body,
                });
            }
            Ok(None) => {
                counter!(METRIC_CACHE_MISS).increment(1);
            }
            Err(err) => {
                warn!(
                    target = "vellum::render::pipeline",
                    path,
                    error = %err,
                    "cache read failed, rendering instead"
                );
                counter!(METRIC_CACHE_MISS).increment(1);
            }
        }

        let Some(matched) = self.site.routes.match_path(path) else {
            return Ok(self.not_found().await);
        };
        let route = matched.route();

        // Cacheable output is shared by every caller, so it never sees an identity.
        let user = if route.is_cacheable() { None } else { identity };
        let context = PageContext::from_match(path, &matched, user);

        let body = match self.templates.render(route.page(), &context) {
            Ok(body) => body,
            Err(err) => {
                counter!(METRIC_RENDER, "result" => "failed").increment(1);
                error!(
                    target = "vellum::render::pipeline",
                    path,
                    page = route.page(),
                    error = %err,
                    "render failed"
                );
                return Err(err);
            }
        };
        counter!(METRIC_RENDER, "result" => "ok").increment(1);

        let mut stored = false;
        if route.is_cacheable() {
            match self.cache.write_key(&key, &body).await {
                Ok(()) => stored = true,
                Err(err) => warn!(
                    target = "vellum::render::pipeline",
                    path,
                    error = %err,
                    "failed to cache rendered page"
                ),
            }
        }

        debug!(
            target = "vellum::render::pipeline",
            path,
            page = route.page(),
            stored,
            "page rendered"
        );

        Ok(RenderOutcome::Rendered {
            mime: route.mime().to_string(),
            body,
            stored,
        })
    }

    /// Render `path` into the cache without serving it.
    ///
    /// The cache is never read. Routes that are not cacheable or are
    /// restricted are skipped.
    pub async fn prerender(&self, path: &str) -> Result<PrerenderOutcome, PrerenderError> {
        let Some(matched) = self.site.routes.match_path(path) else {
            warn!(
                target = "vellum::render::prerender",
                path, "prerender path matches no route"
            );
            return Ok(PrerenderOutcome::Skipped(SkipReason::NoRoute));
        };
        let route = matched.route();

        if route.is_restricted() {
            return Ok(PrerenderOutcome::Skipped(SkipReason::Restricted));
        }
        if !route.is_cacheable() {
            return Ok(PrerenderOutcome::Skipped(SkipReason::NotCacheable));
        }

        debug!(target = "vellum::render::prerender", path, "rendering");
        let context = PageContext::from_match(path, &matched, None);
        let body = self.templates.render(route.page(), &context)?;
        self.cache.write(path, &body).await?;
        counter!(METRIC_RENDER, "result" => "prerendered").increment(1);

        Ok(PrerenderOutcome::Stored)
    }

    /// Render the site's not-found page into its reserved cache entry.
    ///
    /// Returns `false` when the site declares no such page or the active
    /// template set does not contain it.
    pub async fn render_not_found_page(&self) -> Result<bool, PrerenderError> {
        let Some(page) = self.site.not_found_page.as_deref() else {
            return Ok(false);
        };
        if !self.templates.contains(page) {
            debug!(
                target = "vellum::render::prerender",
                page, "not-found template absent"
            );
            return Ok(false);
        }

        let body = self.templates.render(page, &PageContext::not_found(page))?;
        self.cache.write_key(&CacheKey::not_found(), &body).await?;
        Ok(true)
    }

    async fn not_found(&self) -> RenderOutcome {
        counter!(METRIC_NOT_FOUND).increment(1);
        let body = match self.cache.read_key(&CacheKey::not_found()).await {
            Ok(body) => body,
            Err(err) => {
                warn!(
                    target = "vellum::render::pipeline",
                    error = %err,
                    "failed to read cached not-found page"
                );
                None
            }
        };
        RenderOutcome::NotFound { body }
    }
}
