//! Project store: one JSON record per project under the data directory.
//!
//! ```text
//! <data_dir>/
//!   .kanban.lock          # fs2 lock held for every store operation
//!   <slug>.json           # project record
//!   <slug>.json.tmp       # in-flight atomic write (ignored by readers)
//! ```
//!
//! All operations run under one process-wide mutex plus the data-dir file
//! lock, and hold them for disk I/O only. Callers must never keep a store
//! operation open across platform calls.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS, TEMP_SUFFIX};
use crate::model::Project;

const LOCK_FILE: &str = ".kanban.lock";
const RECORD_EXT: &str = ".json";
const MAX_SLUG_SUFFIX: u32 = 9999;

static STORE_LOCK: Mutex<()> = Mutex::new(());

/// Both locks held for the duration of one store operation.
struct StoreGuard {
    _file: FileLock,
    _process: MutexGuard<'static, ()>,
}

#[derive(Debug, Clone)]
pub struct ProjectStore {
    data_dir: PathBuf,
    lock_timeout_ms: u64,
}

impl ProjectStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn record_path(&self, slug: &str) -> PathBuf {
        self.data_dir.join(format!("{slug}{RECORD_EXT}"))
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    fn lock(&self) -> Result<StoreGuard> {
        // A panic while holding the mutex leaves no partial state behind:
        // writes are atomic renames, so a poisoned lock is still usable.
        let process = STORE_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.ensure_dir()?;
        let file = FileLock::acquire(self.data_dir.join(LOCK_FILE), self.lock_timeout_ms)?;
        Ok(StoreGuard {
            _file: file,
            _process: process,
        })
    }

    /// Load every project record, keyed by slug.
    pub fn load_all(&self) -> Result<BTreeMap<String, Project>> {
        let _guard = self.lock()?;

        let entries = fs::read_dir(&self.data_dir)
            .map_err(|err| Error::ReadError(format!("{}: {err}", self.data_dir.display())))?;

        let mut projects = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|err| Error::ReadError(err.to_string()))?;
            let file_type = entry
                .file_type()
                .map_err(|err| Error::ReadError(err.to_string()))?;
            if file_type.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let lower = name.to_ascii_lowercase();
            if lower.ends_with(TEMP_SUFFIX) || !lower.ends_with(RECORD_EXT) {
                continue;
            }

            let path = entry.path();
            let bytes =
                fs::read(&path).map_err(|err| Error::ReadError(format!("{name}: {err}")))?;
            let stem = &name[..name.len() - RECORD_EXT.len()];
            let project = Project::from_json(&bytes, stem)
                .map_err(|err| Error::ReadError(format!("parse {name}: {err}")))?;

            tracing::debug!(slug = %project.slug, file = %name, "loaded project");
            projects.insert(project.slug.clone(), project);
        }

        Ok(projects)
    }

    /// Load one project by exact slug.
    pub fn get(&self, slug: &str) -> Result<Project> {
        let slug = slug.trim();
        self.load_all()?
            .remove(slug)
            .ok_or_else(|| Error::NotFound(slug.to_string()))
    }

    /// First free slug among `base`, `base-2`, ... `base-9999`.
    pub fn find_available_slug(&self, base: &str) -> Result<String> {
        let _guard = self.lock()?;
        self.find_available_slug_locked(base)
    }

    fn find_available_slug_locked(&self, base: &str) -> Result<String> {
        if !self.record_path(base).try_exists()? {
            return Ok(base.to_string());
        }
        for n in 2..=MAX_SLUG_SUFFIX {
            let candidate = format!("{base}-{n}");
            if !self.record_path(&candidate).try_exists()? {
                return Ok(candidate);
            }
        }
        Err(Error::SlugExhausted(base.to_string()))
    }

    /// Persist a new project under a unique slug; returns the stored record.
    pub fn create(&self, project: Project) -> Result<Project> {
        let _guard = self.lock()?;

        let mut project = project.normalized();
        project.slug = self.find_available_slug_locked(&project.slug)?;
        self.write_record(&project)?;

        tracing::info!(slug = %project.slug, name = %project.name, "created project record");
        Ok(project)
    }

    /// Persist a new project under exactly its own slug.
    ///
    /// Fails with [`Error::SlugTaken`] when a record already holds it.
    pub fn create_reserved(&self, project: Project) -> Result<Project> {
        let _guard = self.lock()?;

        let project = project.normalized();
        if self.record_path(&project.slug).try_exists()? {
            return Err(Error::SlugTaken(project.slug));
        }
        self.write_record(&project)?;

        tracing::info!(slug = %project.slug, name = %project.name, "created project record");
        Ok(project)
    }

    /// Overwrite an existing project record.
    pub fn update(&self, project: &Project) -> Result<Project> {
        let _guard = self.lock()?;

        let project = project.clone().normalized();
        if !self.record_path(&project.slug).try_exists()? {
            return Err(Error::NotFound(project.slug));
        }
        self.write_record(&project)?;

        tracing::debug!(slug = %project.slug, tasks = project.tasks.len(), "updated project record");
        Ok(project)
    }

    /// Remove a project record. Missing records are not an error.
    pub fn delete(&self, slug: &str) -> Result<()> {
        let _guard = self.lock()?;

        let slug = crate::model::slugify(slug);
        match fs::remove_file(self.record_path(&slug)) {
            Ok(()) => {
                tracing::info!(slug = %slug, "deleted project record");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_record(&self, project: &Project) -> Result<()> {
        let bytes = project.to_json()?;
        lock::write_atomic(self.record_path(&project.slug), &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectRole, Task, TaskStatus};
    use tempfile::TempDir;

    fn store() -> (TempDir, ProjectStore) {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new(dir.path().join("kanban-data"));
        (dir, store)
    }

    #[test]
    fn create_assigns_suffixed_slugs() {
        let (_dir, store) = store();
        let a = store.create(Project::new("g", "Alpha")).unwrap();
        let b = store.create(Project::new("g", "Alpha")).unwrap();
        let c = store.create(Project::new("g", "Alpha")).unwrap();
        assert_eq!(a.slug, "alpha");
        assert_eq!(b.slug, "alpha-2");
        assert_eq!(c.slug, "alpha-3");

        let all = store.load_all().unwrap();
        assert_eq!(
            all.keys().cloned().collect::<Vec<_>>(),
            vec!["alpha", "alpha-2", "alpha-3"]
        );
    }

    #[test]
    fn create_fails_when_suffixes_exhausted() {
        let (_dir, store) = store();
        store.ensure_dir().unwrap();
        fs::write(store.record_path("busy"), "{}").unwrap();
        for n in 2..=MAX_SLUG_SUFFIX {
            fs::write(store.record_path(&format!("busy-{n}")), "{}").unwrap();
        }
        let err = store.create(Project::new("g", "busy")).unwrap_err();
        assert!(matches!(err, Error::SlugExhausted(base) if base == "busy"));
    }

    #[test]
    fn create_reserved_refuses_a_taken_slug() {
        let (_dir, store) = store();
        let mut first = Project::new("g", "Alpha");
        first.slug = "alpha".into();
        store.create_reserved(first.clone()).unwrap();

        let err = store.create_reserved(first).unwrap_err();
        assert!(matches!(err, Error::SlugTaken(slug) if slug == "alpha"));
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn update_requires_existing_record() {
        let (_dir, store) = store();
        let mut project = Project::new("g", "Ghost");
        project.slug = "ghost".into();
        let err = store.update(&project).unwrap_err();
        assert!(matches!(err, Error::NotFound(slug) if slug == "ghost"));
    }

    #[test]
    fn update_round_trips_tasks() {
        let (_dir, store) = store();
        let mut project = store.create(Project::new("g", "Beta")).unwrap();
        project.add_forum("F");
        project.members.insert("L".into(), ProjectRole::Leader);
        let mut task = Task::new("T", "F");
        task.status = TaskStatus::InProgress;
        task.assignee_user_id = "M".into();
        project.tasks.insert("T".into(), task.clone());
        store.update(&project).unwrap();

        let loaded = store.get("beta").unwrap();
        assert_eq!(loaded.tasks["T"], task);
        assert_eq!(loaded.role_of("L"), Some(ProjectRole::Leader));
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = store();
        let project = store.create(Project::new("g", "Gamma")).unwrap();
        store.delete(&project.slug).unwrap();
        store.delete(&project.slug).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn load_ignores_temp_and_foreign_files() {
        let (_dir, store) = store();
        store.create(Project::new("g", "Delta")).unwrap();
        fs::write(store.data_dir().join("delta.json.tmp"), "{ partial").unwrap();
        fs::write(store.data_dir().join("notes.txt"), "hello").unwrap();
        fs::create_dir_all(store.data_dir().join("nested.json")).unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("delta"));
    }

    #[test]
    fn load_reports_parse_failures() {
        let (_dir, store) = store();
        store.ensure_dir().unwrap();
        fs::write(store.record_path("broken"), "{ nope").unwrap();
        let err = store.load_all().unwrap_err();
        assert!(matches!(err, Error::ReadError(msg) if msg.contains("broken.json")));
    }

    #[test]
    fn load_defaults_slug_from_file_stem() {
        let (_dir, store) = store();
        store.ensure_dir().unwrap();
        fs::write(store.record_path("legacy"), r#"{"guild_id":"g","name":"Old"}"#).unwrap();
        let all = store.load_all().unwrap();
        assert_eq!(all["legacy"].name, "Old");
    }

    #[test]
    fn rewrite_without_mutation_is_byte_identical() {
        let (_dir, store) = store();
        let mut project = store.create(Project::new("g", "Epsilon")).unwrap();
        project.add_forum("F");
        project.tasks.insert("T".into(), Task::new("T", "F"));
        store.update(&project).unwrap();

        let before = fs::read(store.record_path("epsilon")).unwrap();
        let loaded = store.get("epsilon").unwrap();
        store.update(&loaded).unwrap();
        let after = fs::read(store.record_path("epsilon")).unwrap();
        assert_eq!(before, after);
    }
}
