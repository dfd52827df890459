//! Recursive name search.

use std::path::{Path, PathBuf};

use fileward_core::FileEntry;
use jwalk::{DirEntryIter, Parallelism, WalkDir};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::OPERATION_CHANNEL_SIZE;

/// A read-only search for entries under `root` whose name contains a query,
/// ignoring case.
///
/// Nothing is cached: each call to [`iter`](Self::iter) walks the tree again.
#[derive(Debug, Clone)]
pub struct Search {
    root: PathBuf,
    query: String,
    include_hidden: bool,
    max_depth: Option<usize>,
}

impl Search {
    pub fn new(root: impl Into<PathBuf>, query: &str) -> Self {
        Self {
            root: root.into(),
            query: query.to_lowercase(),
            include_hidden: true,
            max_depth: None,
        }
    }

    /// Whether dot-files and dot-directories are searched.
    pub fn include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Limit how deep below the root the walk goes.
    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk.
    pub fn iter(&self) -> SearchIter {
        let walker = WalkDir::new(&self.root)
            .parallelism(Parallelism::Serial)
            .skip_hidden(!self.include_hidden)
            .follow_links(false)
            .sort(true)
            .max_depth(self.max_depth.unwrap_or(usize::MAX));

        SearchIter {
            entries: walker.into_iter(),
            query: self.query.clone(),
        }
    }

    /// Walk on a blocking thread and deliver matches as a stream.
    ///
    /// Must be called from within a tokio runtime. Dropping the stream stops
    /// the walk at the next match.
    pub fn stream(self) -> ReceiverStream<FileEntry> {
        let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

        tokio::task::spawn_blocking(move || {
            for entry in self.iter() {
                if tx.blocking_send(entry).is_err() {
                    break;
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

impl IntoIterator for &Search {
    type Item = FileEntry;
    type IntoIter = SearchIter;

    fn into_iter(self) -> SearchIter {
        self.iter()
    }
}

/// Lazy iterator over search matches, in sorted walk order.
pub struct SearchIter {
    entries: DirEntryIter<((), ())>,
    query: String,
}

impl std::fmt::Debug for SearchIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIter")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl Iterator for SearchIter {
    type Item = FileEntry;

    fn next(&mut self) -> Option<FileEntry> {
        for entry in self.entries.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            // The root itself is never a match.
            if entry.depth() == 0 {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_lowercase();
            if !name.contains(&self.query) {
                continue;
            }

            let path = entry.path();
            match entry.metadata() {
                Ok(metadata) => match FileEntry::from_metadata(&path, &metadata) {
                    Ok(found) => return Some(found),
                    Err(err) => {
                        tracing::debug!(path = %path.display(), error = %err, "skipping entry");
                    }
                },
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "skipping entry");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio_stream::StreamExt;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("2024").join("q1")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("Report-final.pdf"), "a").unwrap();
        fs::write(root.join("2024").join("q1").join("quarterly_REPORT.txt"), "b").unwrap();
        fs::write(root.join("2024").join("notes.md"), "c").unwrap();
        fs::write(root.join(".cache").join("report.tmp"), "d").unwrap();
        dir
    }

    fn names(entries: impl IntoIterator<Item = FileEntry>) -> Vec<String> {
        let mut names: Vec<String> = entries.into_iter().map(|e| e.name).collect();
        names.sort();
        names
    }

    #[test]
    fn test_case_insensitive_recursive_match() {
        let dir = tree();
        let search = Search::new(dir.path(), "report");
        assert_eq!(
            names(&search),
            ["Report-final.pdf", "quarterly_REPORT.txt", "report.tmp"]
        );
    }

    #[test]
    fn test_search_is_restartable() {
        let dir = tree();
        let search = Search::new(dir.path(), "REPORT");
        assert_eq!(names(search.iter()), names(search.iter()));
    }

    #[test]
    fn test_hidden_can_be_skipped() {
        let dir = tree();
        let search = Search::new(dir.path(), "report").include_hidden(false);
        assert_eq!(names(&search), ["Report-final.pdf", "quarterly_REPORT.txt"]);
    }

    #[test]
    fn test_max_depth() {
        let dir = tree();
        let search = Search::new(dir.path(), "report").max_depth(Some(1));
        assert_eq!(names(&search), ["Report-final.pdf"]);
    }

    #[test]
    fn test_empty_query_matches_everything_but_root() {
        let dir = tree();
        let all = names(&Search::new(dir.path(), ""));
        assert_eq!(all.len(), 7);
        assert!(all.contains(&"q1".to_string()));
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Search::new(dir.path().join("gone"), "x").iter().count(), 0);
    }

    #[tokio::test]
    async fn test_stream_matches_iter() {
        let dir = tree();
        let search = Search::new(dir.path(), "report");
        let expected = names(&search);
        let streamed: Vec<FileEntry> = search.stream().collect().await;
        assert_eq!(names(streamed), expected);
    }
}
