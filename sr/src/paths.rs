//! Model directory resolution.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SrError};

/// Name of the bundled models directory under an installation root.
pub const MODELS_DIR: &str = "models";

/// Per-user base directory (~/.srvk).
pub const DEFAULT_BASE_DIR: &str = ".srvk";

/// A `.param`/`.bin` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub param: PathBuf,
    pub model: PathBuf,
}

impl ModelFiles {
    pub fn new(param: impl Into<PathBuf>, model: impl Into<PathBuf>) -> Self {
        Self {
            param: param.into(),
            model: model.into(),
        }
    }

    /// `<dir>/x{scale}.param` and `<dir>/x{scale}.bin`.
    pub fn in_dir(dir: &Path, scale: u32) -> Self {
        Self {
            param: dir.join(format!("x{scale}.param")),
            model: dir.join(format!("x{scale}.bin")),
        }
    }

    /// Fails with [`SrError::MissingArtifact`] unless both files exist.
    pub fn ensure_exist(&self) -> Result<()> {
        if self.param.is_file() && self.model.is_file() {
            return Ok(());
        }
        Err(SrError::MissingArtifact {
            param: self.param.clone(),
            model: self.model.clone(),
        })
    }
}

/// Finds the directory of a model given by name or path.
#[derive(Debug, Clone)]
pub struct ModelLocator {
    search_roots: Vec<PathBuf>,
}

impl Default for ModelLocator {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ModelLocator {
    /// Searches `extra_roots` first, then [`ModelLocator::default_roots`].
    pub fn new(extra_roots: Vec<PathBuf>) -> Self {
        let mut search_roots = extra_roots;
        search_roots.extend(Self::default_roots());
        Self { search_roots }
    }

    /// Searches exactly `roots`.
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { search_roots: roots }
    }

    /// `models/` next to the executable, then ~/.srvk/models.
    pub fn default_roots() -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(dir) = install_root() {
            roots.push(dir.join(MODELS_DIR));
        }
        if let Some(home) = dirs::home_dir() {
            roots.push(home.join(DEFAULT_BASE_DIR).join(MODELS_DIR));
        }
        roots
    }

    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    /// Resolves `model` to a directory.
    ///
    /// Absolute paths and existing relative directories are used as given.
    /// Otherwise the first search root holding `<root>/<model>` wins. When no
    /// root has it, the first candidate is returned so the missing-artifact
    /// error names a real location.
    pub fn resolve_dir(&self, model: &str) -> PathBuf {
        let dir = PathBuf::from(model);
        if dir.is_absolute() || dir.is_dir() {
            return dir;
        }
        let candidates: Vec<PathBuf> = self.search_roots.iter().map(|r| r.join(model)).collect();
        if let Some(found) = candidates.iter().find(|c| c.is_dir()) {
            debug!(model, dir = %found.display(), "model resolved from search roots");
            return found.clone();
        }
        candidates.into_iter().next().unwrap_or(dir)
    }

    /// Model files for `model` at `scale`.
    pub fn resolve(&self, model: &str, scale: u32) -> ModelFiles {
        ModelFiles::in_dir(&self.resolve_dir(model), scale)
    }
}

fn install_root() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    exe.parent().map(Path::to_path_buf)
}
