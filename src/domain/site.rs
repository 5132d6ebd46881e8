//! Static site definition: routes, prerender specs and the not-found page.

use super::{
    error::DomainError,
    prerender::{DistinctQuery, GroupGenerator, PrerenderSpec},
    routes::{Route, RouteTable},
};

pub const NOT_FOUND_PAGE: &str = "404.html";

/// Everything the render pipeline needs to know about a site's layout.
#[derive(Debug, Default)]
pub struct SiteDefinition {
    pub routes: RouteTable,
    pub prerender: Vec<PrerenderSpec>,
    pub not_found_page: Option<String>,
}

impl SiteDefinition {
    pub fn new(routes: RouteTable, prerender: Vec<PrerenderSpec>) -> Self {
        Self {
            routes,
            prerender,
            not_found_page: None,
        }
    }

    pub fn with_not_found_page(mut self, page: impl Into<String>) -> Self {
        self.not_found_page = Some(page.into());
        self
    }

    /// The blog layout: paginated index, tag listings, posts, raw posts,
    /// previews, the editor, the admin shell and the RSS feed.
    pub fn blog() -> Result<Self, DomainError> {
        let routes = RouteTable::new(vec![
            Route::builder("^/$", "page.html")
                .cacheable()
                .default_value("index", 0)
                .build()?,
            Route::builder("^/page/([0-9]+)$", "page.html")
                .cacheable()
                .param("index")
                .build()?,
            Route::builder("^/editor(/([0-9]*))?$", "editor.html")
                .skip_param()
                .param("content")
                .build()?,
            Route::builder(r"^/tags/([a-z0-9\-]{1,16})$", "page.html")
                .cacheable()
                .param("currtag")
                .build()?,
            Route::builder("^/posts/([0-9]{13})$", "page.html")
                .cacheable()
                .param("post")
                .single()
                .build()?,
            Route::builder("^/preview/([0-9]{13})$", "page.html")
                .param("post")
                .single()
                .restricted()
                .build()?,
            Route::builder("^/raw/([0-9]{13})$", "raw.html")
                .cacheable()
                .param("post")
                .build()?,
            Route::builder("^/admin/?$", "admin.html").build()?,
            Route::builder("^/rss/?$", "rss.xml")
                .cacheable()
                .mime("text/xml")
                .build()?,
        ]);

        let prerender = vec![
            PrerenderSpec::literal("/"),
            PrerenderSpec::new("/page/{0}", vec![GroupGenerator::range(0, 5)])?,
            PrerenderSpec::new(
                "/tags/{0}",
                vec![GroupGenerator::Store(DistinctQuery::tags())],
            )?,
            PrerenderSpec::new(
                "/posts/{0}",
                vec![GroupGenerator::Store(DistinctQuery::post_ids(true))],
            )?,
            PrerenderSpec::new(
                "/raw/{0}",
                vec![GroupGenerator::Store(DistinctQuery::post_ids(true))],
            )?,
            PrerenderSpec::new("/rss{0}", vec![GroupGenerator::fixed(["", "/"])])?,
        ];

        Ok(Self::new(routes, prerender).with_not_found_page(NOT_FOUND_PAGE))
    }
}
