//! Load package storage: job file naming, job lifecycle states, and the
//! directory layout packages live in while being loaded.
//!
//! A package directory holds the schema snapshot it was produced against,
//! the expected schema update, optional package state, and one folder per
//! job lifecycle state. Jobs move between states by file rename.

use crate::error::{CoreError, CoreResult};
use crate::schema::{Schema, SchemaUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SCHEMA_FILE: &str = "schema.json";
const SCHEMA_UPDATE_FILE: &str = "schema_update.json";
const PACKAGE_STATE_FILE: &str = "package_state.json";
const COMPLETED_FILE: &str = "completed.json";
const EXCEPTION_SUFFIX: &str = ".exception";

/// Lifecycle state of a job inside a load package
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    NewJobs,
    StartedJobs,
    CompletedJobs,
    FailedJobs,
}

impl JobState {
    /// All states, in lifecycle order
    pub const ALL: [JobState; 4] = [
        JobState::NewJobs,
        JobState::StartedJobs,
        JobState::CompletedJobs,
        JobState::FailedJobs,
    ];

    /// Folder name inside the package directory
    pub fn folder(&self) -> &'static str {
        match self {
            JobState::NewJobs => "new_jobs",
            JobState::StartedJobs => "started_jobs",
            JobState::CompletedJobs => "completed_jobs",
            JobState::FailedJobs => "failed_jobs",
        }
    }

    /// Terminal states count toward table-chain completion
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::CompletedJobs | JobState::FailedJobs)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.folder())
    }
}

/// Data format of a job file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Jsonl,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Jsonl => "jsonl",
        }
    }

    pub fn from_extension(extension: &str) -> CoreResult<Self> {
        match extension {
            "csv" => Ok(FileFormat::Csv),
            "jsonl" => Ok(FileFormat::Jsonl),
            other => Err(CoreError::UnknownFileFormat {
                extension: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Parsed name of one job file: `<table>.<file_id>.<retry_count>.<format>`
///
/// The job id (`<table>.<file_id>.<format>`) excludes the retry count and
/// stays stable while a job is retried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedJobFileName {
    pub table_name: String,
    pub file_id: String,
    pub retry_count: u32,
    pub file_format: FileFormat,
}

impl ParsedJobFileName {
    /// Create a fresh job file name with a random file id and zero retries
    pub fn new(table_name: impl Into<String>, file_format: FileFormat) -> Self {
        Self {
            table_name: table_name.into(),
            file_id: Uuid::new_v4().simple().to_string()[..10].to_string(),
            retry_count: 0,
            file_format,
        }
    }

    /// Identity of the job, stable across retries
    pub fn job_id(&self) -> String {
        format!(
            "{}.{}.{}",
            self.table_name,
            self.file_id,
            self.file_format.extension()
        )
    }

    /// Full file name including the retry count
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.table_name,
            self.file_id,
            self.retry_count,
            self.file_format.extension()
        )
    }

    /// Same job with the retry count bumped
    pub fn with_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }

    /// Parse a job file name of the form `<table>.<file_id>.<retry>.<format>`
    pub fn parse(file_name: &str) -> CoreResult<Self> {
        let parts: Vec<&str> = file_name.split('.').collect();
        if parts.len() != 4 {
            return Err(CoreError::InvalidJobFileName {
                name: file_name.to_string(),
                reason: "expected <table>.<file_id>.<retry>.<format>".to_string(),
            });
        }
        if parts[0].is_empty() || parts[1].is_empty() {
            return Err(CoreError::InvalidJobFileName {
                name: file_name.to_string(),
                reason: "table name and file id must not be empty".to_string(),
            });
        }
        let retry_count: u32 =
            parts[2]
                .parse()
                .map_err(|_| CoreError::InvalidJobFileName {
                    name: file_name.to_string(),
                    reason: format!("retry count '{}' is not a number", parts[2]),
                })?;
        Ok(Self {
            table_name: parts[0].to_string(),
            file_id: parts[1].to_string(),
            retry_count,
            file_format: FileFormat::from_extension(parts[3])?,
        })
    }
}

impl std::fmt::Display for ParsedJobFileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.job_id())
    }
}

/// Snapshot of one job file with its package state, for listing and reporting
#[derive(Debug, Clone)]
pub struct LoadJobInfo {
    pub state: JobState,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
    pub job: ParsedJobFileName,
    pub failed_message: Option<String>,
}

/// Final status of a load package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    /// All jobs drained; failed jobs may still be recorded in the package
    Loaded,
    /// Load gave up on the package
    Aborted,
}

impl std::fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageStatus::Loaded => write!(f, "loaded"),
            PackageStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Completion marker written when a package finishes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageCompletion {
    pub status: PackageStatus,
    pub completed_at: DateTime<Utc>,
}

/// Extra destination work attached to a package by the extract step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageState {
    /// Tables to drop before the load (schema refresh)
    #[serde(default)]
    pub dropped_tables: Vec<String>,

    /// Tables to truncate before the load even if their disposition would not
    #[serde(default)]
    pub truncated_tables: Vec<String>,
}

/// Directory-backed storage for load packages
///
/// Layout: `<root>/<load_id>/{schema.json, schema_update.json,
/// package_state.json, new_jobs/, started_jobs/, completed_jobs/,
/// failed_jobs/}`. A `completed.json` marker ends the package lifecycle.
#[derive(Debug, Clone)]
pub struct PackageStorage {
    root: PathBuf,
}

impl PackageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a new package for `schema`, returning its load id.
    ///
    /// Load ids are microsecond timestamps, so listing order is creation
    /// order.
    pub fn create_package(&self, schema: &Schema) -> CoreResult<String> {
        fs::create_dir_all(&self.root).map_err(|e| CoreError::IoWithPath {
            path: self.root.display().to_string(),
            source: e,
        })?;

        for _ in 0..128 {
            let load_id = Utc::now().timestamp_micros().to_string();
            let package_path = self.root.join(&load_id);
            match fs::create_dir(&package_path) {
                Ok(()) => {
                    for state in JobState::ALL {
                        fs::create_dir(package_path.join(state.folder()))?;
                    }
                    write_json(&package_path.join(SCHEMA_FILE), schema)?;
                    log::debug!("created load package {load_id} for schema '{}'", schema.name);
                    return Ok(load_id);
                }
                // Two packages created within the same microsecond
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(CoreError::IoWithPath {
                        path: package_path.display().to_string(),
                        source: e,
                    })
                }
            }
        }

        Err(CoreError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "could not allocate a unique load id",
        )))
    }

    /// All package load ids, oldest first
    pub fn list_packages(&self) -> CoreResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Load ids of packages that have not been completed yet, oldest first
    pub fn pending_packages(&self) -> CoreResult<Vec<String>> {
        let mut pending = Vec::new();
        for load_id in self.list_packages()? {
            if !self.is_package_completed(&load_id)? {
                pending.push(load_id);
            }
        }
        Ok(pending)
    }

    fn package_path(&self, load_id: &str) -> PathBuf {
        self.root.join(load_id)
    }

    fn require_package(&self, load_id: &str) -> CoreResult<PathBuf> {
        let path = self.package_path(load_id);
        if !path.is_dir() {
            return Err(CoreError::PackageNotFound {
                load_id: load_id.to_string(),
            });
        }
        Ok(path)
    }

    /// Schema snapshot the package was produced against
    pub fn schema(&self, load_id: &str) -> CoreResult<Schema> {
        let path = self.require_package(load_id)?.join(SCHEMA_FILE);
        Schema::from_json(&read_file(&path)?)
    }

    /// Expected schema update shipped with the package (empty when absent)
    pub fn schema_update(&self, load_id: &str) -> CoreResult<SchemaUpdate> {
        let path = self.require_package(load_id)?.join(SCHEMA_UPDATE_FILE);
        if !path.exists() {
            return Ok(SchemaUpdate::new());
        }
        Ok(serde_json::from_str(&read_file(&path)?)?)
    }

    pub fn write_schema_update(&self, load_id: &str, update: &SchemaUpdate) -> CoreResult<()> {
        let path = self.require_package(load_id)?.join(SCHEMA_UPDATE_FILE);
        write_json(&path, update)
    }

    /// Package state shipped with the package (default when absent)
    pub fn package_state(&self, load_id: &str) -> CoreResult<PackageState> {
        let path = self.require_package(load_id)?.join(PACKAGE_STATE_FILE);
        if !path.exists() {
            return Ok(PackageState::default());
        }
        Ok(serde_json::from_str(&read_file(&path)?)?)
    }

    pub fn write_package_state(&self, load_id: &str, state: &PackageState) -> CoreResult<()> {
        let path = self.require_package(load_id)?.join(PACKAGE_STATE_FILE);
        write_json(&path, state)
    }

    /// Path of a job file in a given lifecycle state
    pub fn job_file_path(&self, load_id: &str, state: JobState, file_name: &str) -> PathBuf {
        self.package_path(load_id)
            .join(state.folder())
            .join(file_name)
    }

    /// Import a job file into the package's new_jobs folder
    pub fn import_job(
        &self,
        load_id: &str,
        job: &ParsedJobFileName,
        contents: &[u8],
    ) -> CoreResult<()> {
        self.require_package(load_id)?;
        let path = self.job_file_path(load_id, JobState::NewJobs, &job.file_name());
        fs::write(&path, contents).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// File names waiting in new_jobs, in name order (dispatch order)
    pub fn list_new_jobs(&self, load_id: &str) -> CoreResult<Vec<String>> {
        self.list_file_names(load_id, JobState::NewJobs)
    }

    /// Parsed jobs in one lifecycle state, in file name order
    pub fn list_jobs(&self, load_id: &str, state: JobState) -> CoreResult<Vec<ParsedJobFileName>> {
        self.list_file_names(load_id, state)?
            .iter()
            .map(|name| ParsedJobFileName::parse(name))
            .collect()
    }

    /// All jobs in the package with their current state
    pub fn list_all_jobs_with_states(
        &self,
        load_id: &str,
    ) -> CoreResult<Vec<(JobState, ParsedJobFileName)>> {
        let mut jobs = Vec::new();
        for state in JobState::ALL {
            for job in self.list_jobs(load_id, state)? {
                jobs.push((state, job));
            }
        }
        Ok(jobs)
    }

    /// Jobs in the package grouped by lifecycle state
    pub fn package_jobs(
        &self,
        load_id: &str,
    ) -> CoreResult<BTreeMap<JobState, Vec<ParsedJobFileName>>> {
        let mut grouped = BTreeMap::new();
        for state in JobState::ALL {
            grouped.insert(state, self.list_jobs(load_id, state)?);
        }
        Ok(grouped)
    }

    /// Narrow a job snapshot down to one table
    pub fn filter_jobs_for_table<'a>(
        jobs: &'a [(JobState, ParsedJobFileName)],
        table_name: &str,
    ) -> Vec<(JobState, &'a ParsedJobFileName)> {
        jobs.iter()
            .filter(|(_, job)| job.table_name == table_name)
            .map(|(state, job)| (*state, job))
            .collect()
    }

    fn list_file_names(&self, load_id: &str, state: JobState) -> CoreResult<Vec<String>> {
        let dir = self.require_package(load_id)?.join(state.folder());
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(EXCEPTION_SUFFIX) {
                continue;
            }
            names.push(name);
        }
        names.sort_unstable();
        Ok(names)
    }

    /// Move a job from new_jobs to started_jobs
    pub fn start_job(&self, load_id: &str, file_name: &str) -> CoreResult<ParsedJobFileName> {
        let job = ParsedJobFileName::parse(file_name)?;
        self.move_job(load_id, JobState::NewJobs, JobState::StartedJobs, file_name, file_name)?;
        Ok(job)
    }

    /// Move a job from started_jobs to completed_jobs
    pub fn complete_job(&self, load_id: &str, job: &ParsedJobFileName) -> CoreResult<PathBuf> {
        let file_name = job.file_name();
        self.move_job(
            load_id,
            JobState::StartedJobs,
            JobState::CompletedJobs,
            &file_name,
            &file_name,
        )
    }

    /// Move a job from started_jobs to failed_jobs, recording the failure
    /// message in a companion file
    pub fn fail_job(
        &self,
        load_id: &str,
        job: &ParsedJobFileName,
        message: &str,
    ) -> CoreResult<PathBuf> {
        let file_name = job.file_name();
        let dest = self.move_job(
            load_id,
            JobState::StartedJobs,
            JobState::FailedJobs,
            &file_name,
            &file_name,
        )?;
        let exception_path = self.job_file_path(
            load_id,
            JobState::FailedJobs,
            &format!("{file_name}{EXCEPTION_SUFFIX}"),
        );
        fs::write(&exception_path, message).map_err(|e| CoreError::IoWithPath {
            path: exception_path.display().to_string(),
            source: e,
        })?;
        Ok(dest)
    }

    /// Move a job from started_jobs back to new_jobs with the retry count
    /// bumped, returning the renamed job
    pub fn retry_job(&self, load_id: &str, job: &ParsedJobFileName) -> CoreResult<ParsedJobFileName> {
        let retried = job.with_retry();
        self.move_job(
            load_id,
            JobState::StartedJobs,
            JobState::NewJobs,
            &job.file_name(),
            &retried.file_name(),
        )?;
        Ok(retried)
    }

    fn move_job(
        &self,
        load_id: &str,
        from: JobState,
        to: JobState,
        from_name: &str,
        to_name: &str,
    ) -> CoreResult<PathBuf> {
        self.require_package(load_id)?;
        let source = self.job_file_path(load_id, from, from_name);
        if !source.is_file() {
            return Err(CoreError::JobNotFound {
                load_id: load_id.to_string(),
                folder: from.folder().to_string(),
                file_name: from_name.to_string(),
            });
        }
        let dest = self.job_file_path(load_id, to, to_name);
        fs::rename(&source, &dest).map_err(|e| CoreError::IoWithPath {
            path: source.display().to_string(),
            source: e,
        })?;
        Ok(dest)
    }

    /// Snapshot of one job file (size, timestamps, failure message)
    pub fn job_info(
        &self,
        load_id: &str,
        state: JobState,
        job: &ParsedJobFileName,
    ) -> CoreResult<LoadJobInfo> {
        let file_name = job.file_name();
        let path = self.job_file_path(load_id, state, &file_name);
        let metadata = fs::metadata(&path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let created_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let failed_message = if state == JobState::FailedJobs {
            let exception_path = self.job_file_path(
                load_id,
                state,
                &format!("{file_name}{EXCEPTION_SUFFIX}"),
            );
            match fs::read_to_string(&exception_path) {
                Ok(message) => Some(message),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => {
                    log::warn!("Cannot read {}: {}", exception_path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        Ok(LoadJobInfo {
            state,
            file_path: path,
            file_size: metadata.len(),
            created_at,
            job: job.clone(),
            failed_message,
        })
    }

    /// Infos for all failed jobs in the package
    pub fn failed_jobs_infos(&self, load_id: &str) -> CoreResult<Vec<LoadJobInfo>> {
        self.list_jobs(load_id, JobState::FailedJobs)?
            .iter()
            .map(|job| self.job_info(load_id, JobState::FailedJobs, job))
            .collect()
    }

    /// Write the completion marker, ending the package lifecycle
    pub fn complete_package(&self, load_id: &str, status: PackageStatus) -> CoreResult<()> {
        let path = self.require_package(load_id)?.join(COMPLETED_FILE);
        write_json(
            &path,
            &PackageCompletion {
                status,
                completed_at: Utc::now(),
            },
        )
    }

    /// Completion marker of a package, when present
    pub fn completion(&self, load_id: &str) -> CoreResult<Option<PackageCompletion>> {
        let path = self.require_package(load_id)?.join(COMPLETED_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&read_file(&path)?)?))
    }

    pub fn is_package_completed(&self, load_id: &str) -> CoreResult<bool> {
        Ok(self.require_package(load_id)?.join(COMPLETED_FILE).exists())
    }
}

fn read_file(path: &Path) -> CoreResult<String> {
    fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })
}

/// Write JSON atomically via a temp file rename
fn write_json<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let temp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&temp_path, json).map_err(|e| CoreError::IoWithPath {
        path: temp_path.display().to_string(),
        source: e,
    })?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "package_test.rs"]
mod tests;
