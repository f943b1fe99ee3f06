//! Destinations for received files

use bytes::Bytes;
use parking_lot::Mutex;
use rand::RngCore;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Persists a completed file
pub trait FileSink: Send {
    /// Store `content` under `name`, returning a description of where it went
    fn persist(&mut self, name: &str, content: &[u8]) -> io::Result<String>;
}

/// Writes files into a directory under a random prefix
///
/// A file announced as `report.txt` lands at `<dir>/<16 hex chars>-report.txt`.
/// Only the final component of the announced name is used, so a peer cannot
/// write outside the directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create a sink writing into `dir` (created on first use)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySink { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn target_path(&self, name: &str) -> PathBuf {
        let base = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("unnamed");

        let mut prefix = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut prefix);
        self.dir.join(format!("{}-{}", hex::encode(prefix), base))
    }
}

impl FileSink for DirectorySink {
    fn persist(&mut self, name: &str, content: &[u8]) -> io::Result<String> {
        fs::create_dir_all(&self.dir)?;
        let path = self.target_path(name);
        fs::write(&path, content)?;
        info!(path = %path.display(), bytes = content.len(), "File written");
        Ok(path.display().to_string())
    }
}

/// Keeps received files in memory
///
/// Clones share the same storage, so a test can hand one clone to the
/// receiver and inspect another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    files: Arc<Mutex<Vec<(String, Bytes)>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every file persisted so far, in order
    pub fn files(&self) -> Vec<(String, Bytes)> {
        self.files.lock().clone()
    }

    /// Content of the most recent file called `name`
    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.files
            .lock()
            .iter()
            .rev()
            .find(|(stored, _)| stored == name)
            .map(|(_, content)| content.clone())
    }

    /// Number of files persisted
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    /// Whether nothing has been persisted
    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl FileSink for MemorySink {
    fn persist(&mut self, name: &str, content: &[u8]) -> io::Result<String> {
        self.files
            .lock()
            .push((name.to_string(), Bytes::copy_from_slice(content)));
        Ok(format!("memory:{}", name))
    }
}
