use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;
use crate::schema::{Field, FieldKind, MatrixConfig};
use crate::time::{minutes, resolve_target};
use crate::values::Snapshot;

pub const WORK_TIME: &str = "work_time";
pub const STOP_TIME: &str = "stop_time";
pub const STOP_REASON: &str = "reason";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Sum,
    Avg,
    Min,
    Max,
    Diff,
}

impl Reducer {
    /// `None` marks a cell that did not read as a number. `Avg` skips it and
    /// is zero when nothing numeric remains; every other reducer counts it
    /// as zero.
    pub fn apply(self, cells: &[Option<f64>]) -> f64 {
        let coerced = || cells.iter().map(|c| c.unwrap_or(0.0));
        match self {
            Reducer::Sum => coerced().sum(),
            Reducer::Avg => {
                let (total, count) = cells.iter().flatten().fold((0.0, 0usize), |(t, n), v| (t + v, n + 1));
                if count == 0 { 0.0 } else { total / count as f64 }
            }
            _ if cells.is_empty() => 0.0,
            Reducer::Min => coerced().fold(f64::INFINITY, f64::min),
            Reducer::Max => coerced().fold(f64::NEG_INFINITY, f64::max),
            Reducer::Diff => {
                let max = coerced().fold(f64::NEG_INFINITY, f64::max);
                let min = coerced().fold(f64::INFINITY, f64::min);
                max - min
            }
        }
    }
}

/// Outcome of comparing a derived total with its target field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Balance {
    /// Target is empty or zero; nothing to compare yet.
    Pending,
    Balanced,
    Unbalanced { total: f64, expected: f64 },
}

impl Balance {
    pub fn compare(total: f64, expected: f64) -> Self {
        if expected == 0.0 {
            Balance::Pending
        } else if total == expected {
            Balance::Balanced
        } else {
            Balance::Unbalanced { total, expected }
        }
    }

    pub fn is_unbalanced(&self) -> bool {
        matches!(self, Balance::Unbalanced { .. })
    }
}

// ---- matrix ----

/// Numeric reading of one matrix cell. Absent cells fall back to the
/// configured default; non-numeric content reads as `None`.
pub fn matrix_cell(config: &MatrixConfig, value: Option<&FieldValue>, row: &str, column: &str) -> Option<f64> {
    match value.and_then(|v| v.member(row)).and_then(|r| r.member(column)) {
        Some(cell) => cell.to_number(),
        None => FieldValue::text(config.default_value.as_str()).to_number(),
    }
}

pub fn row_reduce(config: &MatrixConfig, value: Option<&FieldValue>, row: &str, op: Reducer) -> f64 {
    let cells: Vec<_> = config
        .columns
        .iter()
        .map(|col| matrix_cell(config, value, row, col))
        .collect();
    op.apply(&cells)
}

pub fn column_reduce(config: &MatrixConfig, value: Option<&FieldValue>, column: &str, op: Reducer) -> f64 {
    let cells: Vec<_> = config
        .rows
        .iter()
        .map(|row| matrix_cell(config, value, row, column))
        .collect();
    op.apply(&cells)
}

pub fn grand_reduce(config: &MatrixConfig, value: Option<&FieldValue>, op: Reducer) -> f64 {
    let cells: Vec<_> = config
        .rows
        .iter()
        .flat_map(|row| config.columns.iter().map(move |col| (row, col)))
        .map(|(row, col)| matrix_cell(config, value, row, col))
        .collect();
    op.apply(&cells)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSummary {
    pub op: Reducer,
    pub rows: Vec<(String, f64)>,
    pub columns: Vec<(String, f64)>,
    pub grand: f64,
}

pub fn matrix_summary(config: &MatrixConfig, value: Option<&FieldValue>, op: Reducer) -> MatrixSummary {
    MatrixSummary {
        op,
        rows: config
            .rows
            .iter()
            .map(|row| (row.clone(), row_reduce(config, value, row, op)))
            .collect(),
        columns: config
            .columns
            .iter()
            .map(|col| (col.clone(), column_reduce(config, value, col, op)))
            .collect(),
        grand: grand_reduce(config, value, op),
    }
}

/// Grand sum against the target field; only for numeric matrices that name one.
pub fn matrix_balance(field: &Field, snapshot: &Snapshot) -> Option<Balance> {
    let config = field.matrix_config()?;
    let target = field.validation.total_must_equal_field.as_deref()?;
    if !config.enforce_numeric {
        return None;
    }
    let total = grand_reduce(config, snapshot.get(&field.key), Reducer::Sum);
    Some(Balance::compare(total, resolve_target(snapshot.get(target))))
}

// ---- time pairs ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePairTotals {
    pub work: u32,
    pub stop: u32,
}

impl TimePairTotals {
    pub fn total(&self) -> u32 {
        self.work.saturating_add(self.stop)
    }
}

pub fn time_pair_totals(value: Option<&FieldValue>) -> TimePairTotals {
    let read = |member: &str| {
        value
            .and_then(|v| v.member(member))
            .and_then(FieldValue::as_text)
            .map_or(0, minutes)
    };
    TimePairTotals {
        work: read(WORK_TIME),
        stop: read(STOP_TIME),
    }
}

pub fn time_pair_reason(value: Option<&FieldValue>) -> &str {
    value
        .and_then(|v| v.member(STOP_REASON))
        .and_then(FieldValue::as_text)
        .unwrap_or("")
}

/// Work plus stop minutes against the target field (minutes when
/// colon-formatted, else numeric).
pub fn time_pair_balance(field: &Field, snapshot: &Snapshot) -> Option<Balance> {
    if !matches!(field.kind, FieldKind::TimePair(_)) {
        return None;
    }
    let target = field.validation.total_must_equal_field.as_deref()?;
    let total = time_pair_totals(snapshot.get(&field.key)).total();
    Some(Balance::compare(f64::from(total), resolve_target(snapshot.get(target))))
}

// ---- attendance ----

/// One roster entry supplied by master data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    /// Status text → number of roster people marked with it.
    pub by_status: BTreeMap<String, usize>,
    /// Roster people with no status recorded.
    pub unmarked: usize,
    /// Ids present in the value but missing from the roster.
    pub unknown: Vec<String>,
}

pub fn attendance_summary(value: Option<&FieldValue>, roster: &[Person]) -> AttendanceSummary {
    let marks = value.and_then(FieldValue::as_record);
    let mut summary = AttendanceSummary::default();
    for person in roster {
        match marks.and_then(|m| m.get(&person.id)).and_then(FieldValue::as_text) {
            Some(status) if !status.trim().is_empty() => {
                *summary.by_status.entry(status.to_string()).or_default() += 1;
            }
            _ => summary.unmarked += 1,
        }
    }
    if let Some(marks) = marks {
        summary.unknown = marks
            .keys()
            .filter(|id| !roster.iter().any(|p| &p.id == *id))
            .cloned()
            .collect();
    }
    summary
}

// ---- per-field derived values ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Derived {
    None,
    TimePair {
        totals: TimePairTotals,
        balance: Option<Balance>,
    },
    Matrix {
        summaries: Vec<MatrixSummary>,
        balance: Option<Balance>,
    },
    List {
        count: usize,
    },
    Attendance(AttendanceSummary),
}

/// Everything a renderer shows next to a field besides its raw value.
pub fn derive(field: &Field, snapshot: &Snapshot, roster: &[Person]) -> Derived {
    let value = snapshot.get(&field.key);
    match &field.kind {
        FieldKind::TimePair(_) => Derived::TimePair {
            totals: time_pair_totals(value),
            balance: time_pair_balance(field, snapshot),
        },
        FieldKind::Matrix(config) => Derived::Matrix {
            summaries: config
                .numeric_ops
                .iter()
                .map(|op| matrix_summary(config, value, *op))
                .collect(),
            balance: matrix_balance(field, snapshot),
        },
        FieldKind::RepeatableList(_) => Derived::List {
            count: value.and_then(FieldValue::as_list).map_or(0, <[_]>::len),
        },
        FieldKind::Attendance => Derived::Attendance(attendance_summary(value, roster)),
        FieldKind::Text
        | FieldKind::Number
        | FieldKind::Date
        | FieldKind::Time
        | FieldKind::Select { .. }
        | FieldKind::Textarea
        | FieldKind::Checkbox
        | FieldKind::Container => Derived::None,
    }
}
