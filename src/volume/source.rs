//! Atlas file resolution.
//!
//! An [`AtlasResolver`] holds an ordered list of strategies. Each strategy
//! describes what it looks for and tries to produce a readable file; the
//! resolver returns the first success and otherwise reports every attempt.
//! Strategies only read the file system, so a failed attempt leaves nothing
//! behind.
//!
//! ```no_run
//! use atlasmesh::volume::source::{AtlasResolver, ExactFile};
//!
//! let resolver = AtlasResolver::new()
//!     .with_strategy(ExactFile::new("atlas/aseg.nii.gz"))
//!     .with_templateflow_defaults("/data/templateflow");
//! let resolved = resolver.resolve().unwrap();
//! println!("using {} ({})", resolved.path.display(), resolved.strategy);
//! ```

use std::path::{Path, PathBuf};

use crate::error::{AtlasError, Result};

/// File extensions recognised as NIfTI volumes.
pub const NIFTI_EXTENSIONS: &[&str] = &[".nii.gz", ".nii"];

/// One way of locating an atlas file.
pub trait AtlasStrategy {
    /// Short human-readable description, used in diagnostics.
    fn describe(&self) -> String;

    /// Try to produce an existing atlas file.
    fn fetch(&self) -> Result<PathBuf>;
}

/// Use a specific file if it exists.
#[derive(Debug, Clone)]
pub struct ExactFile {
    path: PathBuf,
}

impl ExactFile {
    /// Strategy for a single known path.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl AtlasStrategy for ExactFile {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn fetch(&self) -> Result<PathBuf> {
        if self.path.is_file() {
            Ok(self.path.clone())
        } else {
            Err(AtlasError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", self.path.display()),
            )))
        }
    }
}

/// Search a directory tree for a file whose name contains every fragment.
///
/// Matches are sorted by path so the choice is deterministic; the first
/// one wins.
#[derive(Debug, Clone)]
pub struct DirectorySearch {
    name: String,
    root: PathBuf,
    fragments: Vec<String>,
    extensions: Vec<String>,
}

impl DirectorySearch {
    /// Search `root` recursively for NIfTI files containing all `fragments`.
    pub fn new<P: Into<PathBuf>>(name: &str, root: P, fragments: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            root: root.into(),
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            extensions: NIFTI_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Restrict matches to the given file name suffixes.
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|s| s.to_string()).collect();
        self
    }

    fn matches(&self, file_name: &str) -> bool {
        self.fragments.iter().all(|f| file_name.contains(f.as_str()))
            && self.extensions.iter().any(|e| file_name.ends_with(e.as_str()))
    }

    fn collect(&self, dir: &Path, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.collect(&path, found)?;
            } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if self.matches(name) {
                    found.push(path);
                }
            }
        }
        Ok(())
    }
}

impl AtlasStrategy for DirectorySearch {
    fn describe(&self) -> String {
        format!(
            "{} ({} matching {:?})",
            self.name,
            self.root.display(),
            self.fragments
        )
    }

    fn fetch(&self) -> Result<PathBuf> {
        let mut found = Vec::new();
        self.collect(&self.root, &mut found)?;
        found.sort();
        if found.len() > 1 {
            log::debug!("{}: {} candidates, using the first", self.name, found.len());
        }
        found.into_iter().next().ok_or_else(|| {
            AtlasError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no matching files".to_string(),
            ))
        })
    }
}

/// A successfully resolved atlas file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAtlas {
    /// Path of the atlas volume.
    pub path: PathBuf,
    /// Description of the strategy that found it.
    pub strategy: String,
}

/// Ordered list of atlas strategies, tried until one succeeds.
#[derive(Default)]
pub struct AtlasResolver {
    strategies: Vec<Box<dyn AtlasStrategy>>,
}

impl AtlasResolver {
    /// Create a resolver with no strategies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy; earlier strategies take priority.
    pub fn with_strategy<S: AtlasStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Append the TemplateFlow search order for a subcortical segmentation:
    /// FreeSurfer `aseg` at 1 mm, any 1 mm `dseg`, any 2 mm `dseg`, any
    /// segmentation, then the FSL MNI template's `dseg`.
    pub fn with_templateflow_defaults<P: AsRef<Path>>(self, root: P) -> Self {
        let root = root.as_ref();
        let nlin = root.join("tpl-MNI152NLin2009cAsym");
        let fsl = root.join("tpl-MNI152NLin6Asym");
        self.with_strategy(
            DirectorySearch::new("FreeSurfer aseg", &nlin, &["res-01", "desc-aseg", "_dseg"])
                .with_extensions(&[".nii.gz"]),
        )
        .with_strategy(DirectorySearch::new("Any dseg file", &nlin, &["res-01", "_dseg"]))
        .with_strategy(DirectorySearch::new(
            "Lower resolution dseg",
            &nlin,
            &["res-02", "_dseg"],
        ))
        .with_strategy(DirectorySearch::new("Any segmentation", &nlin, &["seg"]))
        .with_strategy(DirectorySearch::new("FSL MNI template", &fsl, &["_dseg"]))
    }

    /// Number of strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether no strategies are configured.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try each strategy in order and return the first file found.
    pub fn resolve(&self) -> Result<ResolvedAtlas> {
        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let description = strategy.describe();
            log::info!("Trying {}...", description);
            match strategy.fetch() {
                Ok(path) => {
                    log::info!("Found atlas: {}", path.display());
                    return Ok(ResolvedAtlas {
                        path,
                        strategy: description,
                    });
                }
                Err(e) => {
                    log::warn!("  {} failed: {}", description, e);
                    attempts.push(format!("{}: {}", description, e));
                }
            }
        }
        Err(AtlasError::AtlasNotFound { attempts })
    }
}

/// TemplateFlow cache directory: `$TEMPLATEFLOW_HOME`, else
/// `$HOME/.cache/templateflow`.
pub fn templateflow_home() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("TEMPLATEFLOW_HOME") {
        return Some(PathBuf::from(dir));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache").join("templateflow"))
}
