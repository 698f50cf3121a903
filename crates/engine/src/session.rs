use shiftform_core::aggregate::{STOP_REASON, STOP_TIME, WORK_TIME, derive};
use shiftform_core::schema::column_name;
use shiftform_core::time::minutes;
use shiftform_core::validation::validate_values;
use shiftform_core::visibility::{is_required, is_visible};
use shiftform_core::{
    Applied, Derived, EditResult, FeedSchedule, Field, FieldKind, FieldValue, Person, Rejected, ReportId,
    Snapshot, TabId, TimeAxis, TonnageSeries, ValueIssue, ValueStore,
};
use shiftform_storage::{FormStore, FormVersion, ReportRecord, sqlite::now_ms};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// What a renderer needs for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldView<'a> {
    pub field: &'a Field,
    pub visible: bool,
    pub required: bool,
    pub value: Option<&'a FieldValue>,
    pub derived: Derived,
}

/// Data entry for one report against one published form version.
pub struct ReportSession {
    form: FormVersion,
    values: ValueStore,
    axis: TimeAxis,
    shift_length: u32,
    roster: Vec<Person>,
    submitted: Option<ReportId>,
}

impl ReportSession {
    /// Starts an empty report seeded with the form's default values.
    pub fn new(form: FormVersion, config: &EngineConfig) -> Result<Self, EngineError> {
        let values = ValueStore::with_defaults(&form.schema);
        Self::with_values(form, values, config)
    }

    /// Resumes a report from previously entered values.
    pub fn with_values(form: FormVersion, values: ValueStore, config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            axis: config.time_axis()?,
            shift_length: config.shift.length_minutes,
            form,
            values,
            roster: Vec::new(),
            submitted: None,
        })
    }

    pub fn with_roster(mut self, roster: Vec<Person>) -> Self {
        self.roster = roster;
        self
    }

    pub fn form(&self) -> &FormVersion {
        &self.form
    }

    pub fn axis(&self) -> &TimeAxis {
        &self.axis
    }

    pub fn roster(&self) -> &[Person] {
        &self.roster
    }

    pub fn snapshot(&self) -> &Snapshot {
        self.values.snapshot()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted.is_some()
    }

    pub fn report_id(&self) -> Option<ReportId> {
        self.submitted
    }

    fn writable(&self) -> Result<(), Rejected> {
        if self.submitted.is_some() {
            Err(Rejected::Submitted)
        } else {
            Ok(())
        }
    }

    fn field(&self, key: &str) -> Result<&Field, Rejected> {
        self.form
            .schema
            .field_by_key(key)
            .ok_or_else(|| Rejected::UnknownField(key.to_string()))
    }

    /// Replaces the value of one schema field.
    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) -> EditResult {
        let result = self.writable().and_then(|()| self.field(key).map(|_| ()));
        if let Err(reason) = result {
            return rejected(key, reason);
        }
        self.values.set(key, value);
        Ok(Applied::Exact)
    }

    /// Applies several field updates at once. Any unknown key rejects the whole batch.
    pub fn merge<K, I>(&mut self, updates: I) -> EditResult
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        if let Err(reason) = self.writable() {
            return rejected("", reason);
        }
        let updates: Vec<(String, FieldValue)> = updates.into_iter().map(|(k, v)| (k.into(), v)).collect();
        for (key, _) in &updates {
            if let Err(reason) = self.field(key) {
                return rejected(key, reason);
            }
        }
        self.values.merge(updates);
        Ok(Applied::Exact)
    }

    // ---- views ----

    pub fn view(&self, key: &str) -> Option<FieldView<'_>> {
        let field = self.form.schema.field_by_key(key)?;
        Some(self.view_of(field))
    }

    fn view_of<'a>(&'a self, field: &'a Field) -> FieldView<'a> {
        let snapshot = self.values.snapshot();
        FieldView {
            field,
            visible: is_visible(field, snapshot),
            required: is_required(field, snapshot),
            value: self.values.get(&field.key),
            derived: derive(field, snapshot, &self.roster),
        }
    }

    /// Every keyed field in schema order.
    pub fn views(&self) -> Vec<FieldView<'_>> {
        self.form
            .schema
            .fields
            .iter()
            .filter(|f| !f.key.is_empty())
            .map(|f| self.view_of(f))
            .collect()
    }

    pub fn views_in_tab(&self, tab_id: TabId) -> Vec<FieldView<'_>> {
        self.form
            .schema
            .fields_in_tab(tab_id)
            .filter(|f| !f.key.is_empty())
            .map(|f| self.view_of(f))
            .collect()
    }

    // ---- feed and tonnage ----

    pub fn feed(&self, key: &str) -> FeedSchedule {
        FeedSchedule::from_value(&self.axis, self.values.get(key))
    }

    pub fn tonnage(&self, key: &str) -> TonnageSeries {
        TonnageSeries::from_value(&self.axis, self.values.get(key))
    }

    /// Schedules live beside the schema fields, never on top of one.
    fn schedule_key(&self, key: &str) -> Result<(), Rejected> {
        if key.trim().is_empty() {
            return Err(Rejected::UnknownField(key.to_string()));
        }
        match self.form.schema.field_by_key(key) {
            Some(_) => Err(Rejected::NotSchedule(key.to_string())),
            None => Ok(()),
        }
    }

    /// Runs `edit` on a copy of the feed under `key` and stores it back only if accepted.
    fn edit_feed(&mut self, key: &str, edit: impl FnOnce(&mut FeedSchedule) -> EditResult) -> EditResult {
        if let Err(reason) = self.writable().and_then(|()| self.schedule_key(key)) {
            return rejected(key, reason);
        }
        let mut feed = self.feed(key);
        match edit(&mut feed) {
            Ok(applied) => {
                self.values.set(key, feed.to_value(&self.axis));
                Ok(applied)
            }
            Err(reason) => rejected(key, reason),
        }
    }

    pub fn set_feed_type(&mut self, key: &str, time: usize, slot: usize, kind: &str, is_custom: bool) -> EditResult {
        self.edit_feed(key, |feed| feed.set_type(time, slot, kind, is_custom))
    }

    pub fn set_feed_percent(&mut self, key: &str, time: usize, slot: usize, percent: f64) -> EditResult {
        self.edit_feed(key, |feed| feed.set_percent(time, slot, percent))
    }

    pub fn reset_feed_slot(&mut self, key: &str, time: usize, slot: usize) -> EditResult {
        self.edit_feed(key, |feed| feed.reset_slot(time, slot))
    }

    fn edit_tonnage(&mut self, key: &str, edit: impl FnOnce(&mut TonnageSeries) -> EditResult) -> EditResult {
        if let Err(reason) = self.writable().and_then(|()| self.schedule_key(key)) {
            return rejected(key, reason);
        }
        let mut tons = self.tonnage(key);
        match edit(&mut tons) {
            Ok(applied) => {
                self.values.set(key, tons.to_value(&self.axis));
                Ok(applied)
            }
            Err(reason) => rejected(key, reason),
        }
    }

    pub fn set_tonnage(&mut self, key: &str, time: usize, value: f64) -> EditResult {
        self.edit_tonnage(key, |tons| tons.set(time, value))
    }

    pub fn clear_tonnage(&mut self, key: &str, time: usize) -> EditResult {
        self.edit_tonnage(key, |tons| tons.clear(time))
    }

    // ---- time pairs ----

    /// Writes a time-pair field. Work plus stop may not exceed the shift length.
    pub fn set_time_pair(&mut self, key: &str, work: &str, stop: &str, reason: &str) -> EditResult {
        let check = self.writable().and_then(|()| match self.field(key)?.kind {
            FieldKind::TimePair(_) => Ok(()),
            _ => Err(Rejected::UnknownField(key.to_string())),
        });
        if let Err(reason) = check {
            return rejected(key, reason);
        }
        let total = minutes(work).saturating_add(minutes(stop));
        if total > self.shift_length {
            return rejected(
                key,
                Rejected::ExceedsShift {
                    minutes: total,
                    limit: self.shift_length,
                },
            );
        }
        self.values.set(
            key,
            FieldValue::record([
                (WORK_TIME, FieldValue::text(work)),
                (STOP_TIME, FieldValue::text(stop)),
                (STOP_REASON, FieldValue::text(reason)),
            ]),
        );
        Ok(Applied::Exact)
    }

    // ---- submission ----

    /// Problems that would block submission right now.
    pub fn issues(&self) -> Vec<ValueIssue> {
        validate_values(&self.form.schema, self.values.snapshot())
    }

    /// Validates, stores the report and locks the session.
    pub fn submit(&mut self, store: &mut impl FormStore) -> Result<ReportId, EngineError> {
        if self.submitted.is_some() {
            return Err(EngineError::AlreadySubmitted);
        }
        let issues = self.issues();
        if !issues.is_empty() {
            tracing::info!(slug = %self.form.slug, issues = issues.len(), "submit refused");
            return Err(EngineError::InvalidReport(issues));
        }

        let report_id = ReportId::new();
        let record = ReportRecord {
            report_id,
            slug: self.form.slug.clone(),
            version: self.form.version,
            tracking_code: tracking_code(&self.form.slug, report_id),
            report_date: self.report_date(),
            values: self.values.snapshot().clone(),
            submitted_at: now_ms(),
        };
        store.insert_report(&record)?;
        self.submitted = Some(report_id);
        tracing::info!(report = %report_id, tracking_code = %record.tracking_code, "report submitted");
        Ok(report_id)
    }

    /// Value of the first date field, if filled in.
    fn report_date(&self) -> Option<String> {
        self.form
            .schema
            .fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Date))
            .find_map(|f| self.values.get(&f.key))
            .and_then(FieldValue::as_text)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    }
}

fn tracking_code(slug: &str, report_id: ReportId) -> String {
    let prefix = column_name(slug).to_uppercase();
    let id = report_id.to_string();
    // Tail of a v7 uuid is random; the head is the timestamp.
    format!("{prefix}-{}", &id[id.len() - 8..]).to_uppercase()
}

fn rejected(key: &str, reason: Rejected) -> EditResult {
    tracing::debug!(key, %reason, "edit rejected");
    Err(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftform_core::presets::production_report;
    use shiftform_core::schema::SchemaModel;
    use shiftform_storage::SqliteStorage;

    fn published(schema: SchemaModel) -> (SqliteStorage, FormVersion) {
        let mut store = SqliteStorage::open_in_memory().unwrap();
        store.save_draft("kiln", "Kiln", &schema).unwrap();
        let version = store.publish("kiln").unwrap();
        (store, version)
    }

    fn session() -> (SqliteStorage, ReportSession) {
        let (store, version) = published(production_report());
        let session = ReportSession::new(version, &EngineConfig::default()).unwrap();
        (store, session)
    }

    #[test]
    fn defaults_are_seeded() {
        let (_, session) = session();
        assert_eq!(session.get("shift_duration"), Some(&FieldValue::text("12:00")));
    }

    #[test]
    fn set_rejects_unknown_keys() {
        let (_, mut session) = session();
        assert_eq!(
            session.set("nope", "x"),
            Err(Rejected::UnknownField("nope".into()))
        );
        assert_eq!(session.get("nope"), None);
        assert_eq!(
            session.merge([("line1_output", FieldValue::Number(3.0)), ("bad", FieldValue::Null)]),
            Err(Rejected::UnknownField("bad".into()))
        );
        assert_eq!(session.get("line1_output"), None);
    }

    #[test]
    fn views_follow_visibility() {
        let (_, mut session) = session();
        let reason = session.view("stop_reason").unwrap();
        assert!(!reason.visible);
        assert!(!reason.required);

        session.set("stopped", true).unwrap();
        let reason = session.view("stop_reason").unwrap();
        assert!(reason.visible);
        assert!(reason.required);
    }

    #[test]
    fn time_pair_cannot_exceed_shift() {
        let (_, mut session) = session();
        assert_eq!(
            session.set_time_pair("line1_time", "10:00", "03:00", ""),
            Err(Rejected::ExceedsShift { minutes: 780, limit: 720 })
        );
        assert_eq!(session.get("line1_time"), None);
        session.set_time_pair("line1_time", "08:00", "04:00", "belt").unwrap();
        let view = session.view("line1_time").unwrap();
        assert!(matches!(
            view.derived,
            Derived::TimePair { balance: Some(shiftform_core::Balance::Balanced), .. }
        ));
        assert_eq!(
            session.set_time_pair("line1_output", "01:00", "", ""),
            Err(Rejected::UnknownField("line1_output".into()))
        );
    }

    #[test]
    fn feed_edits_write_back_whole_schedule() {
        let (_, mut session) = session();
        session.set_feed_percent("feed_line1", 3, 0, 60.0).unwrap();
        session.set_feed_percent("feed_line1", 5, 0, 100.0).unwrap();
        let feed = session.feed("feed_line1");
        assert_eq!(feed.slot(4, 0).unwrap().percent, 60.0);
        assert_eq!(feed.slot(11, 0).unwrap().percent, 100.0);
        assert!(session.get("feed_line1").unwrap().member("08:00").is_some());

        let before = session.snapshot().clone();
        assert!(session.set_feed_type("feed_line1", 12, 0, "x", false).is_err());
        assert_eq!(session.snapshot(), &before);
    }

    #[test]
    fn schedules_never_overwrite_form_fields() {
        let (_, mut session) = session();
        session.set("shift", "day").unwrap();
        assert_eq!(
            session.set_feed_percent("shift", 0, 0, 10.0),
            Err(Rejected::NotSchedule("shift".into()))
        );
        assert_eq!(
            session.set_tonnage("line1_output", 0, 5.0),
            Err(Rejected::NotSchedule("line1_output".into()))
        );
        assert_eq!(session.reset_feed_slot("", 0, 0), Err(Rejected::UnknownField(String::new())));
        assert_eq!(session.get("shift"), Some(&FieldValue::text("day")));
        assert_eq!(session.get("line1_output"), None);
    }

    #[test]
    fn huge_time_pair_is_refused() {
        let (_, mut session) = session();
        assert_eq!(
            session.set_time_pair("line1_time", "99999999:00", "00:01", ""),
            Err(Rejected::ExceedsShift { minutes: u32::MAX, limit: 720 })
        );
        assert_eq!(session.get("line1_time"), None);
    }

    #[test]
    fn tonnage_edits_step_forward() {
        let (_, mut session) = session();
        session.set_tonnage("tons_line1", 2, 35.0).unwrap();
        assert_eq!(session.tonnage("tons_line1").get(11), Some(35.0));
        assert_eq!(session.set_tonnage("tons_line1", 0, -1.0), Err(Rejected::Negative(-1.0)));
        session.clear_tonnage("tons_line1", 6).unwrap();
        assert_eq!(session.tonnage("tons_line1").get(6), None);
        assert_eq!(session.tonnage("tons_line1").get(5), Some(35.0));
    }

    #[test]
    fn submit_locks_the_session() {
        let mut schema = SchemaModel::blank();
        schema.add_field(Field::new("day", "Day", FieldKind::Date).required());
        schema.add_field(Field::new("note", "Note", FieldKind::Text));
        let (mut store, version) = published(schema);
        let mut session = ReportSession::new(version, &EngineConfig::default()).unwrap();

        match session.submit(&mut store) {
            Err(EngineError::InvalidReport(issues)) => assert_eq!(issues[0].key, "day"),
            other => panic!("expected invalid report, got {other:?}"),
        }
        assert!(!session.is_submitted());

        session.set("day", "2026-03-02").unwrap();
        let id = session.submit(&mut store).unwrap();
        assert_eq!(session.report_id(), Some(id));

        let stored = store.get_report(id).unwrap().unwrap();
        assert_eq!(stored.report_date.as_deref(), Some("2026-03-02"));
        assert!(stored.tracking_code.starts_with("KILN-"));

        assert_eq!(session.set("note", "late"), Err(Rejected::Submitted));
        assert_eq!(session.set_tonnage("t", 0, 1.0), Err(Rejected::Submitted));
        assert!(matches!(session.submit(&mut store), Err(EngineError::AlreadySubmitted)));
    }
}
