//! Inline-file manager: `<<` heredoc-style recipe blocks that get written out to a uniquely-named
//! temp file, whose path is spliced into the recipe text in place of the `<<` marker.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;

const TEMP_FILE_PREFIX: &str = "NMK";

/// Whether a closed inline file should be deleted at shutdown (the default) or left on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keep {
    Keep,
    NoKeep,
}

struct OpenInlineFile {
    path: PathBuf,
    handle: File,
}

/// One inline file that has been closed (its `<<` terminator seen) and is now either pending
/// deletion at shutdown or explicitly kept.
struct ClosedInlineFile {
    path: PathBuf,
    keep: Keep,
}

/// Tracks every inline file created during a parse run so they can all be cleaned up (or left, per
/// `KEEP`) when the run ends.
#[derive(Default)]
pub struct InlineFileManager {
    open: Vec<OpenInlineFile>,
    closed: Vec<ClosedInlineFile>,
}

impl InlineFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new temp file and open it for writing. Returns its path so the caller can splice
    /// the name into the recipe text.
    pub fn open(&mut self, dir: &Path) -> io::Result<PathBuf> {
        let file = Builder::new().prefix(TEMP_FILE_PREFIX).tempfile_in(dir)?;
        let (handle, path) = file.keep().map_err(|e| e.error)?;
        self.open.push(OpenInlineFile {
            path: path.clone(),
            handle,
        });
        Ok(path)
    }

    /// Write one raw recipe-block line, terminated `\r\n`, to the most-recently-opened inline file.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let current = self.open.last_mut().expect("write_line called with no inline file open");
        current.handle.write_all(line.as_bytes())?;
        current.handle.write_all(b"\r\n")
    }

    /// Close the most-recently-opened inline file (its `<<` terminator line was seen).
    pub fn close(&mut self, keep: Keep) {
        if let Some(file) = self.open.pop() {
            self.closed.push(ClosedInlineFile {
                path: file.path,
                keep,
            });
        }
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Delete every closed inline file not marked `Keep`. Called at shutdown.
    pub fn cleanup(&self) {
        for file in &self.closed {
            if file.keep == Keep::NoKeep {
                let _ = std::fs::remove_file(&file.path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = InlineFileManager::new();
        let path = manager.open(dir.path()).unwrap();
        assert!(path.exists());
        assert_eq!(manager.open_count(), 1);
    }

    #[test]
    fn write_then_close_produces_crlf_terminated_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = InlineFileManager::new();
        let path = manager.open(dir.path()).unwrap();
        manager.write_line("hello").unwrap();
        manager.write_line("world").unwrap();
        manager.close(Keep::NoKeep);
        assert_eq!(manager.open_count(), 0);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "hello\r\nworld\r\n");
    }

    #[test]
    fn cleanup_deletes_nokeep_but_not_keep_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = InlineFileManager::new();

        let keep_path = manager.open(dir.path()).unwrap();
        manager.close(Keep::Keep);

        let nokeep_path = manager.open(dir.path()).unwrap();
        manager.close(Keep::NoKeep);

        manager.cleanup();

        assert!(keep_path.exists());
        assert!(!nokeep_path.exists());
    }

    #[test]
    fn two_inline_files_in_sequence_each_get_unique_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = InlineFileManager::new();
        let a = manager.open(dir.path()).unwrap();
        manager.close(Keep::NoKeep);
        let b = manager.open(dir.path()).unwrap();
        manager.close(Keep::NoKeep);
        assert_ne!(a, b);
    }
}
