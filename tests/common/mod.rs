#![allow(dead_code)]

use std::{fs, path::PathBuf, sync::Arc};

use tempfile::TempDir;
use vellum::{
    application::{
        reload::Reloader,
        render::{RenderPipeline, TemplateStore},
        repos::ContentSource,
    },
    cache::PageCache,
    domain::{prerender::DistinctQuery, site::SiteDefinition},
    infra::memory::StaticContentSource,
};

pub const POST_ID: &str = "1700000000000";

pub const BLOG_TEMPLATES: &[(&str, &str)] = &[
    (
        "layout.html",
        "<html>{% block body %}{% endblock %}{% if user %}<i>{{ user.id }}</i>{% endif %}</html>",
    ),
    (
        "page.html",
        "{% extends 'layout.html' %}{% block body %}index={{ index }} tag={{ currtag }} post={{ post }} single={{ 'true' if single else 'false' }}{% endblock %}",
    ),
    ("raw.html", "raw {{ post }}"),
    (
        "editor.html",
        "editor {{ content }}{% if user %} by {{ user.id }}{% endif %}",
    ),
    ("admin.html", "admin{% if user %} {{ user.id }}{% endif %}"),
    ("rss.xml", "<rss><channel>{{ mime }}</channel></rss>"),
    ("404.html", "nothing here"),
];

/// A blog site rooted in a scratch directory.
pub struct Fixture {
    pub dir: TempDir,
    pub reloader: Arc<Reloader>,
}

impl Fixture {
    pub async fn blog() -> Self {
        Self::with_source(blog_source()).await
    }

    pub async fn with_source<S: ContentSource + 'static>(source: S) -> Self {
        let site = SiteDefinition::blog().expect("blog site");
        Self::build(site, BLOG_TEMPLATES, Arc::new(source)).await
    }

    pub async fn build(
        site: SiteDefinition,
        templates: &[(&str, &str)],
        source: Arc<dyn ContentSource>,
    ) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let template_dir = dir.path().join("templates");
        fs::create_dir_all(&template_dir).expect("template dir");
        for (name, body) in templates {
            fs::write(template_dir.join(name), body).expect("write template");
        }

        let store = Arc::new(TemplateStore::new(&template_dir));
        store.compile_all().await.expect("templates compile");

        let cache = PageCache::new(dir.path().join("render"));
        let pipeline = RenderPipeline::new(Arc::new(site), store, cache);

        Self {
            dir,
            reloader: Arc::new(Reloader::new(pipeline, source)),
        }
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        self.reloader.pipeline()
    }

    pub fn cache(&self) -> &PageCache {
        self.pipeline().cache()
    }

    pub fn template_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("templates").join(name)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("render")
    }

    pub fn write_template(&self, name: &str, body: &str) {
        fs::write(self.template_path(name), body).expect("write template");
    }

    /// Every cache file with its contents, sorted by name.
    pub fn cache_contents(&self) -> Vec<(String, Vec<u8>)> {
        let Ok(entries) = fs::read_dir(self.cache_dir()) else {
            return Vec::new();
        };
        let mut files: Vec<_> = entries
            .map(|entry| entry.expect("dir entry"))
            .filter(|entry| entry.file_type().map(|ty| ty.is_file()).unwrap_or(false))
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let body = fs::read(entry.path()).expect("read cache file");
                (name, body)
            })
            .filter(|(name, _)| name.starts_with('@'))
            .collect();
        files.sort();
        files
    }
}

pub fn blog_source() -> StaticContentSource {
    StaticContentSource::new()
        .with_values(DistinctQuery::tags(), ["rust", "notes"])
        .with_values(DistinctQuery::post_ids(true), [POST_ID])
}
