//! Expansion of prerender specs into concrete paths.

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::prerender::{GroupGenerator, PrerenderSpec};

use super::repos::ContentSource;

/// A spec that produced no paths because its store query failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Expansion {
    /// Paths in spec order, then generator order, then value order.
    pub paths: Vec<String>,
    pub failures: Vec<SpecFailure>,
}

/// Expand every spec against `source`.
///
/// Each generator substitutes only its own placeholder into the template,
/// so generator `i` contributes one path per value with every other
/// placeholder left as written. A failing store query drops that spec
/// entirely and expansion carries on with the next.
pub async fn expand(specs: &[PrerenderSpec], source: &dyn ContentSource) -> Expansion {
    let mut expansion = Expansion::default();

    for spec in specs {
        match expand_spec(spec, source).await {
            Ok(paths) => {
                debug!(
                    target = "vellum::prerender",
                    spec = spec.path(),
                    count = paths.len(),
                    "expanded prerender spec"
                );
                expansion.paths.extend(paths);
            }
            Err(failure) => {
                warn!(
                    target = "vellum::prerender",
                    spec = %failure.path,
                    reason = %failure.reason,
                    "skipping prerender spec"
                );
                expansion.failures.push(failure);
            }
        }
    }

    expansion
}

async fn expand_spec(
    spec: &PrerenderSpec,
    source: &dyn ContentSource,
) -> Result<Vec<String>, SpecFailure> {
    if spec.groups().is_empty() {
        return Ok(vec![spec.path().to_string()]);
    }

    let mut paths = Vec::new();
    for (index, group) in spec.groups().iter().enumerate() {
        match group {
            GroupGenerator::Fixed(values) => {
                paths.extend(values.iter().map(|value| spec.substitute(index, value)));
            }
            GroupGenerator::Range { start, end } => {
                paths.extend((*start..=*end).map(|value| spec.substitute(index, &value.to_string())));
            }
            GroupGenerator::Store(query) => {
                let values = source
                    .distinct_values(query)
                    .await
                    .map_err(|err| SpecFailure {
                        path: spec.path().to_string(),
                        reason: err.to_string(),
                    })?;
                paths.extend(values.iter().map(|value| spec.substitute(index, value)));
            }
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::repos::RepoError,
        domain::prerender::{DistinctField, DistinctQuery},
    };
    use async_trait::async_trait;

    struct Tags(Result<Vec<&'static str>, ()>);

    #[async_trait]
    impl ContentSource for Tags {
        async fn distinct_values(&self, query: &DistinctQuery) -> Result<Vec<String>, RepoError> {
            assert_eq!(query.field, DistinctField::Tags);
            match &self.0 {
                Ok(values) => Ok(values.iter().map(|v| v.to_string()).collect()),
                Err(()) => Err(RepoError::Timeout),
            }
        }
    }

    #[tokio::test]
    async fn range_expands_inclusively_in_order() {
        let specs = vec![PrerenderSpec::new("/page/{0}", vec![GroupGenerator::range(0, 5)]).unwrap()];
        let expansion = expand(&specs, &Tags(Ok(vec![]))).await;
        assert_eq!(
            expansion.paths,
            vec!["/page/0", "/page/1", "/page/2", "/page/3", "/page/4", "/page/5"]
        );
        assert!(expansion.failures.is_empty());
    }

    #[tokio::test]
    async fn inverted_range_is_empty() {
        let specs = vec![PrerenderSpec::new("/page/{0}", vec![GroupGenerator::range(3, 1)]).unwrap()];
        assert!(expand(&specs, &Tags(Ok(vec![]))).await.paths.is_empty());
    }

    #[tokio::test]
    async fn literal_and_fixed_specs_keep_spec_order() {
        let specs = vec![
            PrerenderSpec::literal("/"),
            PrerenderSpec::new("/rss{0}", vec![GroupGenerator::fixed(["", "/"])]).unwrap(),
            PrerenderSpec::new("/tags/{0}", vec![GroupGenerator::Store(DistinctQuery::tags())])
                .unwrap(),
        ];
        let expansion = expand(&specs, &Tags(Ok(vec!["rust", "go"]))).await;
        assert_eq!(
            expansion.paths,
            vec!["/", "/rss", "/rss/", "/tags/rust", "/tags/go"]
        );
    }

    #[tokio::test]
    async fn store_failure_skips_only_that_spec() {
        let specs = vec![
            PrerenderSpec::literal("/"),
            PrerenderSpec::new("/tags/{0}", vec![GroupGenerator::Store(DistinctQuery::tags())])
                .unwrap(),
            PrerenderSpec::new("/page/{0}", vec![GroupGenerator::range(0, 1)]).unwrap(),
        ];
        let expansion = expand(&specs, &Tags(Err(()))).await;
        assert_eq!(expansion.paths, vec!["/", "/page/0", "/page/1"]);
        assert_eq!(expansion.failures.len(), 1);
        assert_eq!(expansion.failures[0].path, "/tags/{0}");
    }

    #[tokio::test]
    async fn each_generator_fills_only_its_placeholder() {
        let specs = vec![
            PrerenderSpec::new(
                "/{0}/{1}",
                vec![GroupGenerator::fixed(["a"]), GroupGenerator::range(1, 2)],
            )
            .unwrap(),
        ];
        let expansion = expand(&specs, &Tags(Ok(vec![]))).await;
        assert_eq!(expansion.paths, vec!["/a/{1}", "/{0}/1", "/{0}/2"]);
    }
}
