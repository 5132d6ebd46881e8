//! Runtime template store backed by minijinja.
//!
//! Every file in the template directory is registered under its file name,
//! so any template can `include`, `extend` or `import` any other. A compiled
//! set is published with one pointer swap and only when every file compiled.

use std::{fmt, io, path::PathBuf, sync::Arc};

use arc_swap::ArcSwap;
use bytes::Bytes;
use futures::future::join_all;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// A single file that could not be read or compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateFailure {
    pub name: String,
    pub reason: String,
}

impl fmt::Display for TemplateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to list template directory `{}`", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} template(s) failed to compile: {}", failures.len(), join_failures(failures))]
    Templates { failures: Vec<TemplateFailure> },
}

fn join_failures(failures: &[TemplateFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no compiled template named `{page}`")]
    UnknownPage { page: String },
    #[error("template `{page}` failed to render")]
    Evaluation {
        page: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Summary of a successful [`TemplateStore::compile_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileReport {
    pub templates: Vec<String>,
}

/// Immutable compiled snapshot.
pub struct TemplateSet {
    env: Environment<'static>,
    pages: Vec<String>,
}

impl TemplateSet {
    fn empty() -> Self {
        Self {
            env: new_environment(),
            pages: Vec::new(),
        }
    }

    pub fn contains(&self, page: &str) -> bool {
        self.pages.binary_search_by(|name| name.as_str().cmp(page)).is_ok()
    }

    /// Page identifiers in the set, sorted.
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn render<S: Serialize>(&self, page: &str, context: &S) -> Result<Bytes, RenderError> {
        let template = self.env.get_template(page).map_err(|err| {
            if err.kind() == ErrorKind::TemplateNotFound {
                RenderError::UnknownPage {
                    page: page.to_string(),
                }
            } else {
                RenderError::Evaluation {
                    page: page.to_string(),
                    source: err,
                }
            }
        })?;

        template
            .render(context)
            .map(Bytes::from)
            .map_err(|source| RenderError::Evaluation {
                page: page.to_string(),
                source,
            })
    }
}

impl fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateSet")
            .field("pages", &self.pages)
            .finish_non_exhaustive()
    }
}

fn new_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env.set_keep_trailing_newline(true);
    env
}

/// Owner of the active [`TemplateSet`].
#[derive(Debug)]
pub struct TemplateStore {
    dir: PathBuf,
    active: ArcSwap<TemplateSet>,
}

impl TemplateStore {
    /// Create a store with an empty active set; call [`Self::compile_all`] to populate it.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            active: ArcSwap::from_pointee(TemplateSet::empty()),
        }
    }

    /// Current snapshot. Holding it keeps that set alive across a swap.
    pub fn snapshot(&self) -> Arc<TemplateSet> {
        self.active.load_full()
    }

    pub fn contains(&self, page: &str) -> bool {
        self.active.load().contains(page)
    }

    pub fn pages(&self) -> Vec<String> {
        self.active.load().pages().to_vec()
    }

    pub fn render<S: Serialize>(&self, page: &str, context: &S) -> Result<Bytes, RenderError> {
        self.active.load().render(page, context)
    }

    /// Read and compile every template file, then publish the new set.
    ///
    /// On any failure the previously published set stays active and every
    /// per-file failure is returned.
    pub async fn compile_all(&self) -> Result<CompileReport, CompileError> {
        let names = self.list_templates().await?;

        let reads = names.iter().map(|name| {
            let path = self.dir.join(name);
            async move { (name, fs::read_to_string(&path).await) }
        });

        let mut env = new_environment();
        let mut failures = Vec::new();
        let mut pages = Vec::with_capacity(names.len());

        for (name, read) in join_all(reads).await {
            let source = match read {
                Ok(source) => source,
                Err(err) => {
                    failures.push(TemplateFailure {
                        name: name.clone(),
                        reason: format!("read failed: {err}"),
                    });
                    continue;
                }
            };

            debug!(target = "vellum::templates", template = %name, "compiling template");
            match env.add_template_owned(name.clone(), source) {
                Ok(()) => pages.push(name.clone()),
                Err(err) => failures.push(TemplateFailure {
                    name: name.clone(),
                    reason: err.to_string(),
                }),
            }
        }

        if !failures.is_empty() {
            for failure in &failures {
                warn!(
                    target = "vellum::templates",
                    template = %failure.name,
                    reason = %failure.reason,
                    "template failed to compile"
                );
            }
            return Err(CompileError::Templates { failures });
        }

        pages.sort();
        self.active.store(Arc::new(TemplateSet {
            env,
            pages: pages.clone(),
        }));

        info!(
            target = "vellum::templates",
            count = pages.len(),
            dir = %self.dir.display(),
            "templates compiled"
        );

        Ok(CompileReport { templates: pages })
    }

    async fn list_templates(&self) -> Result<Vec<String>, CompileError> {
        let directory_error = |source| CompileError::Directory {
            path: self.dir.clone(),
            source,
        };

        let mut dir = fs::read_dir(&self.dir).await.map_err(directory_error)?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(directory_error)? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                warn!(
                    target = "vellum::templates",
                    entry = ?file_name,
                    "skipping template with non UTF-8 name"
                );
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type().await.map_err(directory_error)?.is_dir() {
                continue;
            }
            names.push(name.to_string());
        }
        names.sort();
        Ok(names)
    }
}
