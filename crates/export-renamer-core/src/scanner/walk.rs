use glob::Pattern;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use walkdir::WalkDir;

/// Non-recursive listing of the regular files directly inside `dir`, sorted by
/// name. Entries matching any of `ignore_globs` are left out.
///
/// Symlinks are not followed and never listed. Unreadable entries are logged
/// and skipped; an unreadable `dir` itself is an error.
pub fn list_files(dir: &Path, ignore_globs: &[String]) -> io::Result<Vec<PathBuf>> {
    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    // Fail up front on the directory itself; walkdir would only report it per entry.
    std::fs::read_dir(dir).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("Error reading directory {}: {}", dir.display(), err),
        )
    })?;

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if err.io_error().map(|e| e.kind()) == Some(io::ErrorKind::PermissionDenied) {
                    error!("Access denied reading entry in {}: {}", dir.display(), err);
                } else {
                    error!("Error reading entry in {}: {}", dir.display(), err);
                }
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let ignored = ignore_patterns.iter().any(|pattern| {
            pattern.matches_path(&path)
                || path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| pattern.matches(n))
        });
        if ignored {
            debug!(file = %path.display(), "Ignored by pattern");
            continue;
        }
        files.push(path);
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_lists_only_top_level_regular_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.html"), "a").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("deep.txt"), "d").unwrap();

        let files = list_files(dir.path(), &[]).unwrap();
        assert_eq!(names(&files), vec!["a.html", "b.txt"]);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempdir().unwrap();
        assert!(list_files(dir.path(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_ignore_patterns() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("keep.docx"), "k").unwrap();
        fs::write(dir.path().join("~$lock.docx"), "l").unwrap();
        fs::write(dir.path().join("page.pdf"), "p").unwrap();

        let files = list_files(dir.path(), &["~$*".to_string(), "*.pdf".to_string()]).unwrap();
        assert_eq!(names(&files), vec!["keep.docx"]);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = tempdir().unwrap();
        let err = list_files(&dir.path().join("absent"), &[]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();
        let files = list_files(dir.path(), &[]).unwrap();
        assert_eq!(names(&files), vec!["real.txt"]);
    }
}
