use std::io::{Cursor, Write};
use std::path::Path;

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{ArchiveError, ControlMapError, Result};
use crate::sanitize;
use crate::storage::FileStorage;
use crate::worker::job::{Batch, Job, JobStatus};

/// A ready-to-send ZIP of every completed job's outputs.
#[derive(Debug, Clone)]
pub struct BatchArchive {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub entries: Vec<String>,
}

fn entry_name(path: &Path, job: &Job) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ArchiveError::MissingArtifact {
                job_id: job.id.clone(),
                path: path.to_path_buf(),
            }
            .into()
        })
}

/// Packages the JSON and Excel outputs of each completed job.
///
/// Only valid once every job is terminal. Failed jobs contribute nothing,
/// and a batch without any completed job has no archive.
pub fn build_archive(batch: &Batch, jobs: &[Job], storage: &FileStorage) -> Result<BatchArchive> {
    if jobs.iter().any(|j| !j.status.is_terminal()) {
        return Err(ArchiveError::BatchRunning(batch.id.clone()).into());
    }

    let completed: Vec<&Job> = jobs
        .iter()
        .filter(|j| j.status == JobStatus::Completed)
        .collect();
    if completed.is_empty() {
        return Err(ArchiveError::NoCompletedJobs.into());
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut entries = Vec::with_capacity(completed.len() * 2);

    for job in completed {
        let Some(artifacts) = &job.artifacts else {
            return Err(ArchiveError::MissingArtifact {
                job_id: job.id.clone(),
                path: storage.output_directory().join(&job.id),
            }
            .into());
        };

        for path in [&artifacts.json, &artifacts.excel] {
            let name = entry_name(path, job)?;
            let content = storage.read(path).map_err(|_| ArchiveError::MissingArtifact {
                job_id: job.id.clone(),
                path: path.clone(),
            })?;

            let write_err = |e: &dyn std::fmt::Display| -> ControlMapError {
                ArchiveError::WriteEntry {
                    name: name.clone(),
                    message: e.to_string(),
                }
                .into()
            };
            zip.start_file(name.as_str(), options)
                .map_err(|e| write_err(&e))?;
            zip.write_all(&content).map_err(|e| write_err(&e))?;
            entries.push(name);
        }
    }

    let bytes = zip
        .finish()
        .map_err(|e| ArchiveError::WriteEntry {
            name: "archive".to_string(),
            message: e.to_string(),
        })?
        .into_inner();

    let filename = sanitize::archive_filename(&batch.framework_name);
    info!(
        batch_id = %batch.id,
        entries = entries.len(),
        size = bytes.len(),
        "Built batch archive"
    );

    Ok(BatchArchive {
        filename,
        bytes,
        entries,
    })
}
