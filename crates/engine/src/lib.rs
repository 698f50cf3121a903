pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, HistoryConfig, ShiftConfig};
pub use error::EngineError;
pub use history::HistoryManager;
pub use session::{FieldView, ReportSession};

use std::sync::Arc;

use shiftform_core::{
    Field, FieldId, Group, GroupId, SchemaIssue, SchemaModel, Tab, TabId, validation::validate_schema,
};
use shiftform_storage::{FormStore, FormVersion, StorageError, TableDefinition, synthesize};

/// The schema-editing document: one form's `{fields, tabs, groups}` plus
/// its undo/redo history.
pub struct Designer {
    slug: String,
    title: String,
    schema: SchemaModel,
    history: HistoryManager<SchemaModel>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl Designer {
    pub fn new(slug: &str, title: &str, schema: SchemaModel, config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            slug: slug.to_string(),
            title: title.to_string(),
            history: HistoryManager::new(schema.clone(), &config.history),
            schema,
            clock,
            config: config.clone(),
        }
    }

    pub fn with_system_clock(slug: &str, title: &str, schema: SchemaModel, config: &EngineConfig) -> Self {
        Self::new(slug, title, schema, config, Arc::new(SystemClock))
    }

    /// Opens the stored draft of `slug`.
    pub fn open(
        store: &impl FormStore,
        slug: &str,
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let draft = store
            .load_draft(slug)?
            .ok_or_else(|| EngineError::FormNotFound(slug.to_string()))?;
        Ok(Self::new(&draft.slug, &draft.title, draft.schema, config, clock))
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// Switches to another form. History never carries across documents.
    pub fn load(&mut self, slug: &str, title: &str, schema: SchemaModel) {
        self.slug = slug.to_string();
        self.title = title.to_string();
        self.history.reset(schema.clone());
        self.schema = schema;
        tracing::info!(slug, "designer loaded form");
    }

    /// Runs one mutation on the live document and schedules a history snapshot.
    pub fn edit<R>(&mut self, mutate: impl FnOnce(&mut SchemaModel) -> R) -> R {
        let now = self.clock.now_ms();
        self.history.poll(now, &self.schema);
        let result = mutate(&mut self.schema);
        self.history.record_change(now);
        result
    }

    // ========================================================================
    // Schema commands (all undoable)
    // ========================================================================

    pub fn add_field(&mut self, field: Field) -> FieldId {
        self.edit(|s| s.add_field(field))
    }

    pub fn update_field(&mut self, id: FieldId, edit: impl FnOnce(&mut Field)) -> bool {
        self.edit(|s| s.update_field(id, edit))
    }

    pub fn remove_field(&mut self, id: FieldId) -> Option<Field> {
        self.edit(|s| s.remove_field(id))
    }

    pub fn move_field(&mut self, id: FieldId, index: usize) -> bool {
        self.edit(|s| s.move_field(id, index))
    }

    pub fn duplicate_field(&mut self, id: FieldId) -> Option<FieldId> {
        self.edit(|s| s.duplicate_field(id))
    }

    pub fn add_tab(&mut self, tab: Tab) -> TabId {
        self.edit(|s| s.add_tab(tab))
    }

    pub fn update_tab(&mut self, id: TabId, edit: impl FnOnce(&mut Tab)) -> bool {
        self.edit(|s| s.update_tab(id, edit))
    }

    pub fn remove_tab(&mut self, id: TabId) -> bool {
        self.edit(|s| s.remove_tab(id))
    }

    pub fn add_group(&mut self, group: Group) -> GroupId {
        self.edit(|s| s.add_group(group))
    }

    pub fn update_group(&mut self, id: GroupId, edit: impl FnOnce(&mut Group)) -> bool {
        self.edit(|s| s.update_group(id, edit))
    }

    pub fn remove_group(&mut self, id: GroupId) -> bool {
        self.edit(|s| s.remove_group(id))
    }

    /// Replaces the whole document, e.g. with a preset. Undoable like any edit.
    pub fn replace_schema(&mut self, schema: SchemaModel) {
        self.edit(|s| *s = schema);
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Commits a pending snapshot once its quiet period has passed.
    pub fn poll(&mut self) -> bool {
        self.history.poll(self.clock.now_ms(), &self.schema)
    }

    /// Commits a pending snapshot now.
    pub fn flush(&mut self) -> bool {
        self.history.flush(&self.schema)
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(&self.schema) {
            Some(previous) => {
                self.schema = previous;
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(&self.schema) {
            Some(next) => {
                self.schema = next;
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    // ========================================================================
    // Save / publish
    // ========================================================================

    pub fn validate(&self) -> Vec<SchemaIssue> {
        validate_schema(&self.schema)
    }

    /// Stores the draft. Nothing is written while any issue remains.
    pub fn save_draft(&mut self, store: &mut impl FormStore) -> Result<(), EngineError> {
        self.flush();
        let issues = self.validate();
        if !issues.is_empty() {
            tracing::info!(slug = %self.slug, issues = issues.len(), "draft not saved");
            return Err(EngineError::InvalidSchema(issues));
        }
        store.save_draft(&self.slug, &self.title, &self.schema)?;
        Ok(())
    }

    /// Saves the draft and freezes it as the next published version.
    pub fn publish(&mut self, store: &mut impl FormStore) -> Result<FormVersion, EngineError> {
        self.save_draft(store)?;
        match store.publish(&self.slug) {
            Ok(version) => Ok(version),
            Err(StorageError::InvalidSchema(issues)) => Err(EngineError::InvalidSchema(issues)),
            Err(e) => Err(e.into()),
        }
    }

    /// Report table for the live document.
    pub fn ddl(&self) -> TableDefinition {
        synthesize(&self.slug, &self.title, &self.schema.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftform_core::FieldKind;
    use shiftform_core::presets::production_report;
    use shiftform_storage::SqliteStorage;

    fn designer() -> (ManualClock, Designer) {
        let clock = ManualClock::new(0);
        let designer = Designer::new(
            "kiln",
            "Kiln",
            SchemaModel::blank(),
            &EngineConfig::default(),
            Arc::new(clock.clone()),
        );
        (clock, designer)
    }

    #[test]
    fn keystroke_burst_is_one_undo_step() {
        let (clock, mut d) = designer();
        let id = d.add_field(Field::new("t", "T", FieldKind::Text));
        for label in ["L", "La", "Lab", "Labe", "Label"] {
            clock.advance(100);
            d.update_field(id, |f| f.label = label.into());
        }
        clock.advance(400);
        assert!(d.poll());
        assert_eq!(d.undo_depth(), 1);

        assert!(d.undo());
        assert!(d.schema().fields.is_empty());
        assert!(d.redo());
        assert_eq!(d.schema().field(id).unwrap().label, "Label");
    }

    #[test]
    fn separated_edits_are_separate_steps() {
        let (clock, mut d) = designer();
        d.add_field(Field::new("a", "A", FieldKind::Text));
        clock.advance(500);
        d.add_field(Field::new("b", "B", FieldKind::Number));
        clock.advance(500);
        d.poll();
        assert_eq!(d.undo_depth(), 2);
        d.undo();
        assert_eq!(d.schema().fields.len(), 1);
    }

    #[test]
    fn loading_clears_history() {
        let (clock, mut d) = designer();
        d.add_field(Field::new("a", "A", FieldKind::Text));
        clock.advance(500);
        d.poll();
        assert!(d.can_undo());

        d.load("press", "Press", production_report());
        assert_eq!(d.slug(), "press");
        assert!(!d.can_undo());
        assert!(!d.can_redo());
        assert!(!d.undo());
    }

    #[test]
    fn invalid_schema_is_not_saved() {
        let (_, mut d) = designer();
        let mut store = SqliteStorage::open_in_memory().unwrap();
        d.add_field(Field::new("sel", "Pick", FieldKind::select(Vec::new())));
        assert!(matches!(d.save_draft(&mut store), Err(EngineError::InvalidSchema(_))));
        assert!(store.load_draft("kiln").unwrap().is_none());
    }

    #[test]
    fn publish_and_reopen() {
        let (clock, mut d) = designer();
        let mut store = SqliteStorage::open_in_memory().unwrap();
        d.replace_schema(production_report());
        let version = d.publish(&mut store).unwrap();
        assert_eq!(version.version, 1);
        assert_eq!(version.ddl, d.ddl().to_sql());

        let reopened = Designer::open(&store, "kiln", &EngineConfig::default(), Arc::new(clock)).unwrap();
        assert_eq!(reopened.schema(), d.schema());
        assert!(matches!(
            Designer::open(&store, "nope", &EngineConfig::default(), Arc::new(SystemClock)),
            Err(EngineError::FormNotFound(_))
        ));
    }
}
