//! Atomic recording file writes

use cassette_core::Result;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes to `<path>.tmp` and renames over `path` on commit
///
/// A reader never observes a half-written recording: either the old file or
/// the complete new one is visible. Dropping the writer without committing
/// removes the temp file.
pub(crate) struct AtomicWriter {
    temp_path: PathBuf,
    final_path: PathBuf,
    file: Option<File>,
}

impl AtomicWriter {
    pub(crate) fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let final_path = path.as_ref().to_path_buf();

        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut temp = final_path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp_path = PathBuf::from(temp);

        let file = File::create(&temp_path)?;

        Ok(Self {
            temp_path,
            final_path,
            file: Some(file),
        })
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(data)?;
        }
        Ok(())
    }

    pub(crate) fn commit(mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
        }

        fs::rename(&self.temp_path, &self.final_path)?;
        Ok(())
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        // No-op after a successful commit (the temp file was renamed away)
        let _ = fs::remove_file(&self.temp_path);
    }
}

/// Write `data` to `path` atomically
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut writer = AtomicWriter::new(path)?;
    writer.write(data)?;
    writer.commit()
}
