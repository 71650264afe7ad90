//! Schema file loading with transitive import resolution.
//!
//! Imports resolve relative to the importing file's directory first, then
//! through the configured search paths. Cycles are detected on canonical
//! paths and reported with the full import chain. Parsed files are cached,
//! so a diamond of imports parses each file once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::ast::Schema;
use crate::diagnostic::Diagnostic;
use crate::parser;
use crate::validate;

/// Errors surfaced while loading schema files.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {count} parse error(s); first: {first}")]
    Parse {
        path: PathBuf,
        count: usize,
        first: Diagnostic,
    },
    #[error("{path}: {count} validation error(s); first: {first}")]
    Validation {
        path: PathBuf,
        count: usize,
        first: Diagnostic,
    },
    #[error("import '{import}' not found (from {from})")]
    ImportNotFound { import: String, from: PathBuf },
    #[error("import cycle: {}", format_chain(.chain))]
    ImportCycle { chain: Vec<PathBuf> },
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// One loaded file: its AST plus its resolved imports keyed by local name.
#[derive(Debug)]
pub struct LoadedSchema {
    pub path: PathBuf,
    pub schema: Schema,
    pub imports: HashMap<String, Arc<LoadedSchema>>,
}

/// The loader. Holds the search paths and the per-path cache.
#[derive(Debug, Default)]
pub struct Loader {
    search_paths: Vec<PathBuf>,
    cache: HashMap<PathBuf, Arc<LoadedSchema>>,
}

impl Loader {
    pub fn new() -> Self {
        Loader::default()
    }

    pub fn with_search_paths(paths: Vec<PathBuf>) -> Self {
        Loader {
            search_paths: paths,
            cache: HashMap::new(),
        }
    }

    /// Load `path` and, transitively, everything it imports. The loaded
    /// schemas are validated with their imports in scope.
    pub fn load(&mut self, path: &Path) -> Result<Arc<LoadedSchema>, LoadError> {
        let canonical = canonicalize(path)?;
        let mut chain = Vec::new();
        self.load_canonical(canonical, &mut chain)
    }

    fn load_canonical(
        &mut self,
        path: PathBuf,
        chain: &mut Vec<PathBuf>,
    ) -> Result<Arc<LoadedSchema>, LoadError> {
        if let Some(cached) = self.cache.get(&path) {
            debug!(path = %path.display(), "schema cache hit");
            return Ok(Arc::clone(cached));
        }
        if chain.contains(&path) {
            let mut cycle = chain.clone();
            cycle.push(path);
            return Err(LoadError::ImportCycle { chain: cycle });
        }

        debug!(path = %path.display(), "loading schema");
        let source = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let result = parser::parse(&source);
        let errors: Vec<&Diagnostic> = result.diagnostics.iter().filter(|d| d.is_error()).collect();
        if let Some(first) = errors.first() {
            return Err(LoadError::Parse {
                path,
                count: errors.len(),
                first: (*first).clone(),
            });
        }
        let schema = result.schema;

        chain.push(path.clone());
        let mut imports = HashMap::new();
        for import in &schema.imports {
            let resolved = self.resolve_import(&import.path, &path)?;
            let loaded = self.load_canonical(resolved, chain)?;
            imports.insert(import.local_name().to_string(), loaded);
        }
        chain.pop();

        let import_schemas: HashMap<String, Schema> = imports
            .iter()
            .map(|(name, loaded)| (name.clone(), loaded.schema.clone()))
            .collect();
        let findings = validate::validate_with_imports(&schema, &import_schemas);
        let errors: Vec<&Diagnostic> = findings.iter().filter(|d| d.is_error()).collect();
        if let Some(first) = errors.first() {
            return Err(LoadError::Validation {
                path,
                count: errors.len(),
                first: (*first).clone(),
            });
        }

        let loaded = Arc::new(LoadedSchema {
            path: path.clone(),
            schema,
            imports,
        });
        self.cache.insert(path, Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Search the importing file's directory, then the search paths.
    fn resolve_import(&self, import: &str, from: &Path) -> Result<PathBuf, LoadError> {
        let mut candidates = Vec::new();
        if let Some(dir) = from.parent() {
            candidates.push(dir.join(import));
        }
        for search in &self.search_paths {
            candidates.push(search.join(import));
        }
        for candidate in candidates {
            if candidate.is_file() {
                return canonicalize(&candidate);
            }
        }
        Err(LoadError::ImportNotFound {
            import: import.to_string(),
            from: from.to_path_buf(),
        })
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, LoadError> {
    path.canonicalize().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
