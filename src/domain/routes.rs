//! Declarative route table.
//!
//! Routes are evaluated in definition order and the first whose matcher
//! accepts the whole path wins. Matchers only expose "match → capture list",
//! so the regex implementation can be replaced without touching the
//! render pipeline.

use std::fmt;

use regex::Regex;
use serde_json::Value;

use super::error::DomainError;

pub const DEFAULT_MIME: &str = "text/html";

/// Capture slots produced by a successful match, in group order.
///
/// A slot is `None` when its group did not participate in the match.
pub type Captures = Vec<Option<String>>;

/// Narrow path matching seam used by [`RouteTable`].
pub trait PathMatcher: Send + Sync + fmt::Debug {
    /// Human readable form of the pattern, used in logs and errors.
    fn pattern(&self) -> &str;

    /// Number of capture slots a successful match yields.
    fn capture_count(&self) -> usize;

    /// Match the whole path, returning every capture slot on success.
    fn captures(&self, path: &str) -> Option<Captures>;
}

/// Anchored regular-expression matcher.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    pattern: String,
    regex: Regex,
}

impl RegexMatcher {
    /// Compile `pattern`, rejecting patterns that are not anchored at both ends.
    ///
    /// The anchors bind the whole expression: `^/a|/b$` accepts exactly `/a`
    /// or `/b`.
    pub fn new(pattern: &str) -> Result<Self, DomainError> {
        if !pattern.starts_with('^') || !pattern.ends_with('$') || pattern.ends_with("\\$") {
            return Err(DomainError::unanchored(pattern));
        }

        let body = &pattern[1..pattern.len() - 1];
        let regex = Regex::new(&format!("^(?:{body})$")).map_err(|source| {
            DomainError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }
}

impl PathMatcher for RegexMatcher {
    fn pattern(&self) -> &str {
        &self.pattern
    }

    fn capture_count(&self) -> usize {
        self.regex.captures_len().saturating_sub(1)
    }

    fn captures(&self, path: &str) -> Option<Captures> {
        let captures = self.regex.captures(path)?;
        Some(
            captures
                .iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect(),
        )
    }
}

/// Immutable route descriptor.
#[derive(Debug)]
pub struct Route {
    matcher: Box<dyn PathMatcher>,
    page: String,
    cacheable: bool,
    params: Vec<Option<String>>,
    mime: String,
    restricted: bool,
    single: bool,
    defaults: Vec<(String, Value)>,
}

impl Route {
    /// Start a route backed by an anchored regular expression.
    pub fn builder(pattern: impl Into<String>, page: impl Into<String>) -> RouteBuilder {
        RouteBuilder::new(MatcherSource::Pattern(pattern.into()), page.into())
    }

    /// Start a route backed by a custom matcher.
    pub fn with_matcher(matcher: Box<dyn PathMatcher>, page: impl Into<String>) -> RouteBuilder {
        RouteBuilder::new(MatcherSource::Custom(matcher), page.into())
    }

    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn is_single(&self) -> bool {
        self.single
    }

    /// Declared parameter layout; `None` marks a discarded capture slot.
    pub fn params(&self) -> &[Option<String>] {
        &self.params
    }

    pub fn defaults(&self) -> &[(String, Value)] {
        &self.defaults
    }
}

enum MatcherSource {
    Pattern(String),
    Custom(Box<dyn PathMatcher>),
}

/// Builder for [`Route`]; validation happens in [`RouteBuilder::build`].
pub struct RouteBuilder {
    matcher: MatcherSource,
    page: String,
    cacheable: bool,
    params: Vec<Option<String>>,
    mime: String,
    restricted: bool,
    single: bool,
    defaults: Vec<(String, Value)>,
}

impl RouteBuilder {
    fn new(matcher: MatcherSource, page: String) -> Self {
        Self {
            matcher,
            page,
            cacheable: false,
            params: Vec::new(),
            mime: DEFAULT_MIME.to_string(),
            restricted: false,
            single: false,
            defaults: Vec::new(),
        }
    }

    /// Allow rendered output to be persisted and re-served.
    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    /// Name the next capture slot.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Some(name.into()));
        self
    }

    /// Consume the next capture slot without exposing it to the template.
    pub fn skip_param(mut self) -> Self {
        self.params.push(None);
        self
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    /// Exclude the route from prerendering.
    pub fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }

    /// Mark the sole capture as a content identifier.
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// Attach a constant context value.
    pub fn default_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<Route, DomainError> {
        let matcher: Box<dyn PathMatcher> = match self.matcher {
            MatcherSource::Pattern(pattern) => Box::new(RegexMatcher::new(&pattern)?),
            MatcherSource::Custom(matcher) => matcher,
        };

        let captures = matcher.capture_count();
        if self.params.len() > captures {
            return Err(DomainError::ParamOverflow {
                pattern: matcher.pattern().to_string(),
                declared: self.params.len(),
                captures,
            });
        }

        Ok(Route {
            matcher,
            page: self.page,
            cacheable: self.cacheable,
            params: self.params,
            mime: self.mime,
            restricted: self.restricted,
            single: self.single,
            defaults: self.defaults,
        })
    }
}

/// A route together with the captures it produced for one path.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    route: &'a Route,
    captures: Captures,
}

impl<'a> RouteMatch<'a> {
    pub fn route(&self) -> &'a Route {
        self.route
    }

    pub fn captures(&self) -> &[Option<String>] {
        &self.captures
    }

    /// Named parameters in declaration order.
    ///
    /// Unnamed slots and groups that did not participate are omitted.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.route
            .params
            .iter()
            .zip(self.captures.iter())
            .filter_map(|(name, value)| Some((name.as_deref()?, value.as_deref()?)))
    }
}

/// Ordered, first-match-wins route list.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.iter().find_map(|route| {
            route
                .matcher
                .captures(path)
                .map(|captures| RouteMatch { route, captures })
        })
    }

    pub fn find(&self, path: &str) -> Option<&Route> {
        self.match_path(path).map(|matched| matched.route)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_route_wins() {
        let table = RouteTable::new(vec![
            Route::builder("^/posts/([0-9]+)$", "numeric.html")
                .param("id")
                .build()
                .unwrap(),
            Route::builder("^/posts/(.+)$", "any.html")
                .param("slug")
                .build()
                .unwrap(),
        ]);

        assert_eq!(table.find("/posts/42").unwrap().page(), "numeric.html");
        assert_eq!(table.find("/posts/hello").unwrap().page(), "any.html");

        let reversed = RouteTable::new(vec![
            Route::builder("^/posts/(.+)$", "any.html")
                .param("slug")
                .build()
                .unwrap(),
            Route::builder("^/posts/([0-9]+)$", "numeric.html")
                .param("id")
                .build()
                .unwrap(),
        ]);
        assert_eq!(reversed.find("/posts/42").unwrap().page(), "any.html");
    }

    #[test]
    fn matching_is_anchored() {
        let table = RouteTable::new(vec![Route::builder("^/tags/([a-z]+)$", "page.html")
            .param("tag")
            .build()
            .unwrap()]);

        assert!(table.find("/tags/rust").is_some());
        assert!(table.find("/tags/rust/extra").is_none());
        assert!(table.find("/prefix/tags/rust").is_none());
    }

    #[test]
    fn anchors_bind_top_level_alternation() {
        let table = RouteTable::new(vec![Route::builder("^/a|/b$", "page.html").build().unwrap()]);

        assert!(table.find("/a").is_some());
        assert!(table.find("/b").is_some());
        assert!(table.find("/a/extra").is_none());
        assert!(table.find("/x/b").is_none());
        assert_eq!(table.find("/a").unwrap().pattern(), "^/a|/b$");
    }

    #[test]
    fn unnamed_slots_consume_captures() {
        let route = Route::builder("^/editor(/([0-9]*))?$", "editor.html")
            .skip_param()
            .param("content")
            .build()
            .unwrap();
        let table = RouteTable::new(vec![route]);

        let matched = table.match_path("/editor/12").unwrap();
        let params: Vec<_> = matched.params().collect();
        assert_eq!(params, vec![("content", "12")]);

        let bare = table.match_path("/editor").unwrap();
        assert_eq!(bare.params().count(), 0);
        assert_eq!(bare.captures(), &[None::<String>, None]);
    }

    #[test]
    fn undeclared_captures_are_ignored() {
        let route = Route::builder("^/a/([0-9]+)/([0-9]+)$", "page.html")
            .param("first")
            .build()
            .unwrap();
        let table = RouteTable::new(vec![route]);
        let matched = table.match_path("/a/1/2").unwrap();
        assert_eq!(matched.params().collect::<Vec<_>>(), vec![("first", "1")]);
    }

    #[test]
    fn builder_rejects_unanchored_patterns() {
        let err = Route::builder("^/rss/?", "rss.xml").build().unwrap_err();
        assert!(matches!(err, DomainError::UnanchoredPattern { .. }));

        let err = Route::builder("/rss$", "rss.xml").build().unwrap_err();
        assert!(matches!(err, DomainError::UnanchoredPattern { .. }));
    }

    #[test]
    fn builder_rejects_params_beyond_captures() {
        let err = Route::builder("^/page/([0-9]+)$", "page.html")
            .param("index")
            .param("extra")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::ParamOverflow {
                declared: 2,
                captures: 1,
                ..
            }
        ));
    }

    #[test]
    fn builder_rejects_invalid_expressions() {
        let err = Route::builder("^/page/([0-9]+$", "page.html")
            .build()
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidPattern { .. }));
    }

    #[test]
    fn route_defaults_to_html_and_uncached() {
        let route = Route::builder("^/admin/?$", "admin.html").build().unwrap();
        assert_eq!(route.mime(), DEFAULT_MIME);
        assert!(!route.is_cacheable());
        assert!(!route.is_restricted());
        assert!(!route.is_single());
    }

    #[derive(Debug)]
    struct LiteralMatcher(&'static str);

    impl PathMatcher for LiteralMatcher {
        fn pattern(&self) -> &str {
            self.0
        }

        fn capture_count(&self) -> usize {
            0
        }

        fn captures(&self, path: &str) -> Option<Captures> {
            (path == self.0).then(Vec::new)
        }
    }

    #[test]
    fn custom_matchers_plug_into_the_table() {
        let route = Route::with_matcher(Box::new(LiteralMatcher("/about")), "about.html")
            .cacheable()
            .build()
            .unwrap();
        let table = RouteTable::new(vec![route]);

        assert_eq!(table.find("/about").unwrap().page(), "about.html");
        assert!(table.find("/about/").is_none());
    }
}
