use anyhow::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const METADATA_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Input scanner for metadata locations.
///
/// A location is either a single file or a directory that is walked
/// recursively. Files are sorted into metadata dumps (`.yaml`, `.yml`,
/// `.json`) and Rust sources (`.rs`); everything else is ignored. The `target`
/// directory and hidden directories are skipped.
///
/// # Example
///
/// ```no_run
/// use openapi_from_metadata::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} Rust files", result.rust_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    excluded: Vec<PathBuf>,
}

/// Result of scanning one location.
pub struct ScanResult {
    /// Directory module paths of Rust sources are computed from
    pub source_root: PathBuf,
    /// Metadata dump files, in path order
    pub metadata_files: Vec<PathBuf>,
    /// Rust source files, in path order
    pub rust_files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.metadata_files.is_empty() && self.rust_files.is_empty()
    }
}

/// The crate directory containing `path`: the nearest ancestor with a
/// `Cargo.toml`, or the directory itself when there is none.
pub fn source_root(path: &Path) -> PathBuf {
    let start = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(path)
    };
    start
        .ancestors()
        .find(|dir| dir.join("Cargo.toml").is_file())
        .unwrap_or(start)
        .to_path_buf()
}

impl FileScanner {
    /// Creates a new `FileScanner` for a file or directory.
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            excluded: Vec::new(),
        }
    }

    /// Leave out a file that lives among the inputs but is not metadata,
    /// such as the configuration or the output document.
    pub fn exclude(mut self, path: &Path) -> Self {
        self.excluded.push(normalize(path));
        self
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.excluded.iter().any(|excluded| *excluded == path)
    }

    /// Scans the location and classifies the files found.
    ///
    /// Inaccessible entries are recorded as warnings and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the location does not exist.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.exists() {
            anyhow::bail!("Input path does not exist: {}", self.root_path.display());
        }

        let mut result = ScanResult {
            source_root: source_root(&self.root_path),
            metadata_files: Vec::new(),
            rust_files: Vec::new(),
            warnings: Vec::new(),
        };

        let walk = WalkDir::new(&self.root_path).sort_by_file_name().into_iter();
        for entry in walk.filter_entry(|e| e.depth() == 0 || !is_skipped(e)) {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if !path.is_file() || self.is_excluded(path) {
                        continue;
                    }
                    match path.extension().and_then(|s| s.to_str()) {
                        Some("rs") => result.rust_files.push(path.to_path_buf()),
                        Some(ext) if METADATA_EXTENSIONS.contains(&ext) => {
                            result.metadata_files.push(path.to_path_buf())
                        }
                        _ => debug!("Ignoring {}", path.display()),
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    result.warnings.push(warning);
                }
            }
        }

        Ok(result)
    }
}

/// Hidden entries and build output
fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.file_type().is_dir() && name == "target")
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
