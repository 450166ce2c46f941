//! FileSystem trait abstraction for the local side of a sync pass.
//!
//! Paths are home-relative and `/`-separated (e.g. `.config/fish/config.fish`).
//!
//! Implementations:
//! - `InMemoryFs` - For testing
//! - `NativeFs` (in the dotsync binary) - Uses tokio::fs rooted at the home directory

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Is a directory: {0}")]
    IsDirectory(String),

    #[error("Not valid UTF-8 text: {0}")]
    NotText(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, FsError>;

/// File metadata
#[derive(Debug, Clone)]
pub struct FileStat {
    /// Modification time in milliseconds since epoch
    pub mtime_millis: u64,
    /// File size in bytes
    pub size: u64,
    /// Whether this is a directory
    pub is_dir: bool,
}

/// Directory entry
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// File or directory name (not full path)
    pub name: String,
    /// Whether this is a directory
    pub is_dir: bool,
}

/// Platform-independent filesystem abstraction.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read file contents
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Write file contents (creates parent directories if needed)
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;

    /// List directory contents
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>>;

    /// Check if path exists
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Get file metadata
    async fn stat(&self, path: &str) -> Result<FileStat>;
}

/// In-memory filesystem for testing
pub struct InMemoryFs {
    files: RwLock<HashMap<String, Vec<u8>>>,
    dirs: RwLock<BTreeSet<String>>,
    /// Tracks file modification times (path -> mtime in ms)
    mtimes: RwLock<HashMap<String, u64>>,
    /// Paths whose writes fail with `FsError::Io`
    denied: RwLock<HashSet<String>>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert(String::new()); // Root directory
        Self {
            files: RwLock::new(HashMap::new()),
            dirs: RwLock::new(dirs),
            mtimes: RwLock::new(HashMap::new()),
            denied: RwLock::new(HashSet::new()),
        }
    }

    /// Set a specific mtime for testing "latest wins" scenarios
    pub fn set_mtime(&self, path: &str, mtime: u64) {
        let path = Self::normalize_path(path);
        let mut mtimes = self.mtimes.write().unwrap_or_else(|e| e.into_inner());
        mtimes.insert(path, mtime);
    }

    /// Make every later write to `path` fail.
    pub fn deny_writes(&self, path: &str) {
        let path = Self::normalize_path(path);
        self.denied
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path);
    }

    /// Current content of a file as text, for assertions.
    pub fn read_string(&self, path: &str) -> Option<String> {
        let path = Self::normalize_path(path);
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files
            .get(&path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    fn current_time_ms() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn normalize_path(path: &str) -> String {
        path.trim_matches('/').to_string()
    }

    fn parent_path(path: &str) -> Option<String> {
        if path.is_empty() {
            return None;
        }
        match path.rfind('/') {
            Some(pos) => Some(path[..pos].to_string()),
            None => Some(String::new()),
        }
    }

    fn mkdir_all(&self, path: &str) {
        let mut dirs = self.dirs.write().unwrap_or_else(|e| e.into_inner());
        let mut current = Some(path.to_string());
        while let Some(dir) = current {
            current = Self::parent_path(&dir);
            dirs.insert(dir);
        }
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = Self::normalize_path(path);
        if self
            .dirs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&path)
        {
            return Err(FsError::IsDirectory(path));
        }
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files
            .get(&path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path))
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let path = Self::normalize_path(path);

        if self
            .denied
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&path)
        {
            return Err(FsError::Io(format!("permission denied: {}", path)));
        }

        // Create parent directories
        if let Some(parent) = Self::parent_path(&path) {
            self.mkdir_all(&parent);
        }

        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.insert(path.clone(), content.to_vec());
        drop(files);

        // Update mtime
        let mut mtimes = self.mtimes.write().unwrap_or_else(|e| e.into_inner());
        mtimes.insert(path, Self::current_time_ms());
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let path = Self::normalize_path(path);
        let dirs = self.dirs.read().unwrap_or_else(|e| e.into_inner());
        if !dirs.contains(&path) {
            return Err(FsError::NotFound(path));
        }

        let is_child = |candidate: &str| Self::parent_path(candidate).as_deref() == Some(path.as_str());
        let name_of = |candidate: &str| match candidate.rfind('/') {
            Some(pos) => candidate[pos + 1..].to_string(),
            None => candidate.to_string(),
        };

        let mut entries: Vec<FileEntry> = dirs
            .iter()
            .filter(|d| !d.is_empty() && is_child(d))
            .map(|d| FileEntry {
                name: name_of(d),
                is_dir: true,
            })
            .collect();

        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        entries.extend(files.keys().filter(|f| is_child(f)).map(|f| FileEntry {
            name: name_of(f),
            is_dir: false,
        }));

        Ok(entries)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let path = Self::normalize_path(path);
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        let dirs = self.dirs.read().unwrap_or_else(|e| e.into_inner());
        Ok(files.contains_key(&path) || dirs.contains(&path))
    }

    async fn stat(&self, path: &str) -> Result<FileStat> {
        let path = Self::normalize_path(path);

        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        if let Some(content) = files.get(&path) {
            let mtimes = self.mtimes.read().unwrap_or_else(|e| e.into_inner());
            let mtime = mtimes.get(&path).copied().unwrap_or(0);
            return Ok(FileStat {
                mtime_millis: mtime,
                size: content.len() as u64,
                is_dir: false,
            });
        }

        let dirs = self.dirs.read().unwrap_or_else(|e| e.into_inner());
        if dirs.contains(&path) {
            return Ok(FileStat {
                mtime_millis: 0,
                size: 0,
                is_dir: true,
            });
        }

        Err(FsError::NotFound(path))
    }
}

// Lets tests keep a handle on the filesystem they pass into an operation.
#[async_trait]
impl<T: FileSystem> FileSystem for std::sync::Arc<T> {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        (**self).read(path).await
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        (**self).write(path, content).await
    }

    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        (**self).list(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        (**self).exists(path).await
    }

    async fn stat(&self, path: &str) -> Result<FileStat> {
        (**self).stat(path).await
    }
}

/// Collect every regular file at or below `path`, sorted.
///
/// A file path yields itself.
pub async fn walk_files<F: FileSystem + ?Sized>(fs: &F, path: &str) -> Result<Vec<String>> {
    let root = path.trim_matches('/').to_string();
    if !fs.stat(&root).await?.is_dir {
        return Ok(vec![root]);
    }

    let mut files = Vec::new();
    let mut pending = vec![root];
    while let Some(dir) = pending.pop() {
        for entry in fs.list(&dir).await? {
            let child = if dir.is_empty() {
                entry.name
            } else {
                format!("{}/{}", dir, entry.name)
            };
            if entry.is_dir {
                pending.push(child);
            } else {
                files.push(child);
            }
        }
    }
    files.sort();
    Ok(files)
}
