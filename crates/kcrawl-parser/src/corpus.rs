//! Local corpus documents
//!
//! Reads `.txt` and `.md` files from a directory tree so they can serve as
//! an offline retrieval source.

use std::path::{Path, PathBuf};

use crate::{ParserError, Result};

/// A text document read from the corpus directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusDocument {
    pub path: PathBuf,
    pub content: String,
}

impl CorpusDocument {
    /// Paragraphs separated by blank lines, trimmed and non-empty
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.content
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

fn is_corpus_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref(),
        Some("txt" | "md" | "markdown")
    )
}

/// Recursively read all corpus documents under `dir`, sorted by path.
///
/// Symlinked files are read; symlinked directories are not descended into.
/// Files that are not valid UTF-8 are skipped with a warning.
pub fn read_corpus(dir: &Path) -> Result<Vec<CorpusDocument>> {
    let mut paths = Vec::new();
    collect_paths(dir, &mut paths)?;
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match std::fs::read_to_string(&path) {
            Ok(content) => documents.push(CorpusDocument {
                content: content.replace("\r\n", "\n"),
                path,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable corpus file");
            }
        }
    }

    tracing::debug!(dir = %dir.display(), count = documents.len(), "Read corpus documents");
    Ok(documents)
}

fn collect_paths(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let io_err = |e: std::io::Error| ParserError::IoError {
        path: dir.display().to_string(),
        source: e,
    };

    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        // file_type() does not follow symlinks
        let file_type = entry.file_type().map_err(io_err)?;
        let path = entry.path();
        if file_type.is_dir() {
            collect_paths(&path, out)?;
        } else if file_type.is_symlink() && path.is_dir() {
            tracing::debug!(path = %path.display(), "Not following symlinked corpus directory");
        } else if is_corpus_file(&path) {
            out.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_corpus_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "水库调度\r\n\r\n第二段").unwrap();
        std::fs::write(dir.path().join("sub/b.md"), "# 重力坝").unwrap();
        std::fs::write(dir.path().join("ignored.pdf"), "binary").unwrap();

        let docs = read_corpus(dir.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].paragraphs().collect::<Vec<_>>(), vec!["水库调度", "第二段"]);
        assert!(docs[1].path.ends_with("sub/b.md"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_is_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.txt"), "水库调度").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("sub/a.txt"), dir.path().join("link.txt"))
            .unwrap();

        let docs = read_corpus(dir.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.content == "水库调度"));
    }

    #[test]
    fn test_missing_dir() {
        let err = read_corpus(Path::new("/nonexistent/corpus")).unwrap_err();
        assert!(matches!(err, ParserError::IoError { .. }));
    }
}
