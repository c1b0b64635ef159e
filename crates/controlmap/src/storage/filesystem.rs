use std::io::Write;
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::StorageError;

/// Filesystem layout for uploaded documents and job artifacts.
///
/// ```text
/// <upload_directory>/<upload_id><ext>
/// <output_directory>/<job_id>/<framework>_<provider>.{json,xlsx}
/// ```
pub struct FileStorage {
    upload_directory: PathBuf,
    output_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(upload_directory: P, output_directory: Q) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn upload_directory(&self) -> &Path {
        &self.upload_directory
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Stores an uploaded document as `<upload_id><extension>`.
    pub fn store_upload(
        &self,
        upload_id: &str,
        extension: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        self.ensure_directory(&self.upload_directory)?;
        let path = self
            .upload_directory
            .join(format!("{}{}", upload_id, extension.to_lowercase()));
        write_new(&path, content)?;
        Ok(path)
    }

    /// Best-effort removal of a stored upload whose processing failed.
    pub fn discard_upload(&self, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove upload {}: {}", path.display(), e);
        }
    }

    /// Writes every artifact of one job into `<output>/<job_id>/`.
    ///
    /// Either all files are written or none remain: a failure part way removes
    /// what was already written.
    pub fn store_artifacts(
        &self,
        job_id: &str,
        files: &[(String, Vec<u8>)],
    ) -> Result<Vec<PathBuf>, StorageError> {
        let dir_path = self.output_directory.join(job_id);
        self.ensure_directory(&dir_path)?;

        let mut written = Vec::with_capacity(files.len());
        for (name, content) in files {
            let path = dir_path.join(name);
            match write_new(&path, content) {
                Ok(()) => written.push(path),
                Err(e) => {
                    remove_partial(&dir_path, &written);
                    return Err(e);
                }
            }
        }

        Ok(written)
    }

    /// Removes a job's artifact directory, for outputs that were written but
    /// never recorded on the job.
    pub fn discard_artifacts(&self, job_id: &str) {
        let dir_path = self.output_directory.join(job_id);
        if dir_path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir_path) {
                warn!("Failed to remove artifacts {}: {}", dir_path.display(), e);
            }
        }
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        std::fs::read(path).map_err(|e| StorageError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

/// Creates `path` exclusively (O_CREAT | O_EXCL) and writes `content`.
fn write_new(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(StorageError::FileExists(path.to_path_buf()));
        }
        Err(e) => {
            return Err(StorageError::WriteFile {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}

fn remove_partial(dir_path: &Path, written: &[PathBuf]) {
    for path in written {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove partial artifact {}: {}", path.display(), e);
        }
    }
    // Only succeeds when nothing else lives in the job directory.
    let _ = std::fs::remove_dir(dir_path);
}
