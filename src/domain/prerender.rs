//! Declarative prerender specifications.

use serde::Serialize;

use super::error::DomainError;

/// Field whose distinct values the backing store enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistinctField {
    /// Tag names attached to posts.
    Tags,
    /// Post identifiers (creation timestamps in milliseconds).
    Timestamp,
}

/// Predicate restricting which posts contribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFilter {
    All,
    VisibleOnly,
}

/// "Distinct values of field F under filter P."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DistinctQuery {
    pub field: DistinctField,
    pub filter: ContentFilter,
}

impl DistinctQuery {
    pub fn tags() -> Self {
        Self {
            field: DistinctField::Tags,
            filter: ContentFilter::All,
        }
    }

    pub fn post_ids(visible_only: bool) -> Self {
        Self {
            field: DistinctField::Timestamp,
            filter: if visible_only {
                ContentFilter::VisibleOnly
            } else {
                ContentFilter::All
            },
        }
    }
}

/// Produces the substitution values for one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupGenerator {
    /// Values listed verbatim.
    Fixed(Vec<String>),
    /// Integers `start..=end`; empty when `start > end`.
    Range { start: i64, end: i64 },
    /// Values queried from the backing store once per reload.
    Store(DistinctQuery),
}

impl GroupGenerator {
    pub fn fixed<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fixed(values.into_iter().map(Into::into).collect())
    }

    pub fn range(start: i64, end: i64) -> Self {
        Self::Range { start, end }
    }
}

/// Path template plus the generators for its placeholders.
///
/// Generator `i` substitutes placeholder `{i}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrerenderSpec {
    path: String,
    groups: Vec<GroupGenerator>,
}

impl PrerenderSpec {
    /// A spec whose only output is `path` itself.
    pub fn literal(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            groups: Vec::new(),
        }
    }

    pub fn new(path: impl Into<String>, groups: Vec<GroupGenerator>) -> Result<Self, DomainError> {
        let path = path.into();
        for index in 0..groups.len() {
            let placeholder = placeholder(index);
            if !path.contains(&placeholder) {
                return Err(DomainError::MissingPlaceholder {
                    path,
                    placeholder,
                    index,
                });
            }
        }
        Ok(Self { path, groups })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn groups(&self) -> &[GroupGenerator] {
        &self.groups
    }

    /// Replace every occurrence of placeholder `index` with `value`.
    pub fn substitute(&self, index: usize, value: &str) -> String {
        self.path.replace(&placeholder(index), value)
    }
}

fn placeholder(index: usize) -> String {
    format!("{{{index}}}")
}
