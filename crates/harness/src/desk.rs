use std::sync::Arc;

use shiftform_core::{Person, SchemaModel};
use shiftform_engine::{Designer, EngineConfig, EngineError, ManualClock, ReportSession};
use shiftform_storage::{FormStore, FormVersion, SqliteStorage, StorageError};
use tempfile::TempDir;

/// One designer/operator workstation: a form store, a hand-driven clock
/// and the engine config.
pub struct TestDesk {
    pub clock: ManualClock,
    pub store: SqliteStorage,
    pub config: EngineConfig,
    dir: Option<TempDir>,
}

impl TestDesk {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, StorageError> {
        Ok(Self {
            clock: ManualClock::new(1_000),
            store: SqliteStorage::open_in_memory()?,
            config,
            dir: None,
        })
    }

    /// A desk whose store lives in a temporary directory.
    pub fn on_disk() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = SqliteStorage::open(&db_path(&dir)?)?;
        Ok(Self {
            clock: ManualClock::new(1_000),
            store,
            config: EngineConfig::default(),
            dir: Some(dir),
        })
    }

    /// Closes and reopens a file-backed store.
    pub fn reopen(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(dir) = &self.dir else {
            return Err("in-memory desk cannot be reopened".into());
        };
        self.store = SqliteStorage::open(&db_path(dir)?)?;
        Ok(())
    }

    pub fn designer(&self, slug: &str, title: &str, schema: SchemaModel) -> Designer {
        Designer::new(slug, title, schema, &self.config, Arc::new(self.clock.clone()))
    }

    pub fn open_designer(&self, slug: &str) -> Result<Designer, EngineError> {
        Designer::open(&self.store, slug, &self.config, Arc::new(self.clock.clone()))
    }

    /// Lets the debounce window run out and commits the pending snapshot.
    pub fn settle(&self, designer: &mut Designer) -> bool {
        self.clock.advance(self.config.history.debounce_ms + 1);
        designer.poll()
    }

    /// Saves and publishes `schema` under `slug` in one go.
    pub fn publish(&mut self, slug: &str, title: &str, schema: SchemaModel) -> Result<FormVersion, EngineError> {
        let mut designer = self.designer(slug, title, schema);
        designer.publish(&mut self.store)
    }

    pub fn session(&self, slug: &str) -> Result<ReportSession, EngineError> {
        let version = self
            .store
            .latest_version(slug)?
            .ok_or_else(|| EngineError::FormNotFound(slug.to_string()))?;
        Ok(ReportSession::new(version, &self.config)?.with_roster(crew()))
    }
}

fn db_path(dir: &TempDir) -> Result<String, Box<dyn std::error::Error>> {
    dir.path()
        .join("shiftform.db")
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| "temp path is not utf-8".into())
}

/// A small shift crew.
pub fn crew() -> Vec<Person> {
    [("op-1", "Ana Ruiz"), ("op-2", "Bo Lind"), ("op-3", "Chidi Okafor"), ("op-4", "Dana Kim")]
        .into_iter()
        .map(|(id, name)| Person {
            id: id.to_string(),
            full_name: name.to_string(),
        })
        .collect()
}
