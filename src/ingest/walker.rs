use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions the ingestion pipeline knows how to load (case-insensitive):
/// plain text and markdown, PDF, and the recognized code languages.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["txt", "md", "pdf", "py", "c", "cpp", "h", "go", "rs"];

/// A file discovered under the ingestion root
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub extension: String,
}

/// Whether `extension` (lowercase, without the dot) is in the supported set
pub fn is_supported_extension(extension: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension)
}

/// Discover all supported files under `root`, recursively.
///
/// Symlinked directories are not traversed. Entries that cannot be read
/// are skipped with a warning, as are files with unsupported extensions;
/// `.meta` metadata sidecars are skipped silently since they are
/// re-attached to their source document at load time.
pub fn discover_files(root: &Path) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        if extension == "meta" {
            continue;
        }

        if !is_supported_extension(&extension) {
            log::warn!("Skipping unsupported file type: {}", path.display());
            continue;
        }

        let relative_path = path
            .strip_prefix(root)
            .map_err(|_| {
                crate::error::RagchatError::Config(format!(
                    "Failed to compute relative path for: {}",
                    path.display()
                ))
            })?
            .to_string_lossy()
            .to_string();

        files.push(SourceFile {
            relative_path,
            absolute_path: path.to_path_buf(),
            extension,
        });
    }

    log::info!("Discovered {} files in {}", files.len(), root.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("notes/code")).unwrap();
        fs::write(root.join("README.md"), "# Docs").unwrap();
        fs::write(root.join("notes.txt"), "plain text note").unwrap();
        fs::write(root.join("notes/code/tool.py"), "def main(): pass").unwrap();
        fs::write(root.join("notes/code/lib.rs"), "fn main() {}").unwrap();
        fs::write(root.join("notes.meta"), "{}").unwrap(); // sidecar, skipped
        fs::write(root.join("image.png"), b"\x89PNG\r\n\x1a\n").unwrap(); // unsupported

        let files = discover_files(root).unwrap();

        assert_eq!(files.len(), 4);
        assert!(files.iter().any(|f| f.relative_path.contains("README.md")));
        assert!(files.iter().any(|f| f.relative_path.contains("notes.txt")));
        assert!(files.iter().any(|f| f.relative_path.contains("tool.py")));
        assert!(files.iter().any(|f| f.relative_path.contains("lib.rs")));
        assert!(!files.iter().any(|f| f.relative_path.contains("image.png")));
        assert!(!files.iter().any(|f| f.relative_path.contains("notes.meta")));
    }

    #[test]
    fn test_discover_files_empty() {
        let temp_dir = TempDir::new().unwrap();
        let files = discover_files(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 0);
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinked_directories_are_not_traversed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/a.txt"), "note").unwrap();
        std::os::unix::fs::symlink(root.join("sub"), root.join("link")).unwrap();

        let files = discover_files(root).unwrap();

        // a.txt is found once, under its real path only
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "sub/a.txt");
    }

    #[test]
    fn test_extension_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("UPPER.MD"), "# caps").unwrap();
        let files = discover_files(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].extension, "md");
    }
}
