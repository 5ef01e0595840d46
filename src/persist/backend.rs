//! Opaque byte storage behind the snapshot.

use std::fs;
use std::io;
use std::path::PathBuf;

/// Durable storage for the serialized snapshot.
///
/// The engine does not assume a medium; a file is the default, but an
/// object store or test double fits the same two calls. Constructed
/// explicitly and passed down, never a process-wide singleton.
pub trait PersistenceBackend: Send + Sync {
    /// Reads the snapshot blob. `None` means no snapshot exists yet
    /// (cold start), which is not an error.
    fn read_blob(&self) -> io::Result<Option<Vec<u8>>>;

    /// Replaces the snapshot blob.
    fn write_blob(&self, bytes: &[u8]) -> io::Result<()>;
}

/// File-based backend writing via temp file + atomic rename.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl PersistenceBackend for FileBackend {
    fn read_blob(&self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_blob(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash mid-write never leaves a torn blob
        let temp = self.temp_path();
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}
