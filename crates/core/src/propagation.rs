use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field_value::FieldValue;
use crate::time::TimeAxis;

pub const SLOTS_PER_POINT: usize = 2;
pub const PERCENT_BUDGET: f64 = 100.0;

/// Why a data-entry edit was refused. A refused edit changes nothing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejected {
    #[error("time index {index} is outside the {len} shift points")]
    TimeOutOfRange { index: usize, len: usize },

    #[error("slot {0} does not exist")]
    SlotOutOfRange(usize),

    #[error("value is not a finite number")]
    NotFinite,

    #[error("negative value {0}")]
    Negative(f64),

    #[error("duration of {minutes} minutes exceeds the {limit}-minute shift")]
    ExceedsShift { minutes: u32, limit: u32 },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("'{0}' holds a form field, not a schedule")]
    NotSchedule(String),

    #[error("report already submitted")]
    Submitted,
}

/// An accepted edit, possibly adjusted to stay in range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Applied {
    Exact,
    Clamped { requested: f64, applied: f64 },
}

pub type EditResult = Result<Applied, Rejected>;

/// One feed allocation at one time point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSlot {
    #[serde(rename = "type")]
    pub kind: String,
    pub percent: f64,
    pub is_custom: bool,
}

/// Feed allocations of one production line across the shift: a pair of
/// slots per time point. Every edit at index `t` overwrites `t` and all
/// later points with a fresh copy of the edited slot.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSchedule {
    points: Vec<[FeedSlot; SLOTS_PER_POINT]>,
}

impl FeedSchedule {
    pub fn new(points: usize) -> Self {
        Self {
            points: vec![Default::default(); points],
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn slot(&self, time: usize, slot: usize) -> Option<&FeedSlot> {
        self.points.get(time).and_then(|pair| pair.get(slot))
    }

    pub fn point(&self, time: usize) -> Option<&[FeedSlot; SLOTS_PER_POINT]> {
        self.points.get(time)
    }

    /// Sum of both slot percentages at one time point.
    pub fn allocated(&self, time: usize) -> f64 {
        self.points
            .get(time)
            .map_or(0.0, |pair| pair.iter().map(|s| s.percent).sum())
    }

    fn check(&self, time: usize, slot: usize) -> Result<(), Rejected> {
        if time >= self.points.len() {
            return Err(Rejected::TimeOutOfRange {
                index: time,
                len: self.points.len(),
            });
        }
        if slot >= SLOTS_PER_POINT {
            return Err(Rejected::SlotOutOfRange(slot));
        }
        Ok(())
    }

    /// Writes `template` into `slot` from `time` onwards, trimming its percent
    /// at each point to whatever budget the other slot leaves there.
    fn fill_forward(&mut self, time: usize, slot: usize, template: &FeedSlot) {
        let other = 1 - slot;
        for pair in &mut self.points[time..] {
            let mut next = template.clone();
            next.percent = next.percent.min(PERCENT_BUDGET - pair[other].percent).max(0.0);
            pair[slot] = next;
        }
    }

    pub fn set_type(&mut self, time: usize, slot: usize, kind: &str, is_custom: bool) -> EditResult {
        self.check(time, slot)?;
        let mut template = self.points[time][slot].clone();
        template.kind = kind.to_string();
        template.is_custom = is_custom;
        self.fill_forward(time, slot, &template);
        Ok(Applied::Exact)
    }

    /// Clamps to `[0, 100 - other slot]`. A full 100 on the primary slot
    /// empties the secondary slot from `time` onwards instead.
    pub fn set_percent(&mut self, time: usize, slot: usize, value: f64) -> EditResult {
        self.check(time, slot)?;
        if !value.is_finite() {
            return Err(Rejected::NotFinite);
        }
        let requested = value;
        let value = value.clamp(0.0, PERCENT_BUDGET);

        if slot == 0 && value >= PERCENT_BUDGET {
            for pair in &mut self.points[time..] {
                pair[1] = FeedSlot::default();
            }
        }

        let mut template = self.points[time][slot].clone();
        template.percent = value;
        self.fill_forward(time, slot, &template);

        let applied = self.points[time][slot].percent;
        if applied == requested {
            Ok(Applied::Exact)
        } else {
            Ok(Applied::Clamped { requested, applied })
        }
    }

    pub fn reset_slot(&mut self, time: usize, slot: usize) -> EditResult {
        self.check(time, slot)?;
        self.fill_forward(time, slot, &FeedSlot::default());
        Ok(Applied::Exact)
    }

    /// Record form keyed by time label; each entry lists its two slots.
    pub fn to_value(&self, axis: &TimeAxis) -> FieldValue {
        let entries = axis.labels().iter().zip(&self.points).map(|(label, pair)| {
            let slots = pair
                .iter()
                .map(|slot| {
                    FieldValue::record([
                        ("type", FieldValue::text(slot.kind.as_str())),
                        ("percent", FieldValue::Number(slot.percent)),
                        ("is_custom", FieldValue::Boolean(slot.is_custom)),
                    ])
                })
                .collect();
            (label.clone(), FieldValue::List(slots))
        });
        FieldValue::record(entries)
    }

    /// Reads the record form back. Missing or malformed entries become empty slots.
    pub fn from_value(axis: &TimeAxis, value: Option<&FieldValue>) -> Self {
        let mut schedule = Self::new(axis.len());
        let Some(record) = value.and_then(FieldValue::as_record) else {
            return schedule;
        };
        for (index, label) in axis.labels().iter().enumerate() {
            let Some(slots) = record.get(label).and_then(FieldValue::as_list) else {
                continue;
            };
            for (slot, raw) in slots.iter().take(SLOTS_PER_POINT).enumerate() {
                schedule.points[index][slot] = FeedSlot {
                    kind: raw
                        .member("type")
                        .and_then(FieldValue::as_text)
                        .unwrap_or("")
                        .to_string(),
                    percent: raw
                        .member("percent")
                        .and_then(FieldValue::to_number)
                        .unwrap_or(0.0)
                        .clamp(0.0, PERCENT_BUDGET),
                    is_custom: raw
                        .member("is_custom")
                        .and_then(FieldValue::as_boolean)
                        .unwrap_or(false),
                };
            }
            let [first, second] = &mut schedule.points[index];
            second.percent = second.percent.min(PERCENT_BUDGET - first.percent);
        }
        schedule
    }
}

/// Tonnage readings of one line: a step function that only changes where
/// a value is explicitly entered.
#[derive(Debug, Clone, PartialEq)]
pub struct TonnageSeries {
    points: Vec<Option<f64>>,
}

impl TonnageSeries {
    pub fn new(points: usize) -> Self {
        Self {
            points: vec![None; points],
        }
    }

    pub fn get(&self, time: usize) -> Option<f64> {
        self.points.get(time).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn set(&mut self, time: usize, value: f64) -> EditResult {
        if time >= self.points.len() {
            return Err(Rejected::TimeOutOfRange {
                index: time,
                len: self.points.len(),
            });
        }
        if !value.is_finite() {
            return Err(Rejected::NotFinite);
        }
        if value < 0.0 {
            return Err(Rejected::Negative(value));
        }
        for point in &mut self.points[time..] {
            *point = Some(value);
        }
        Ok(Applied::Exact)
    }

    pub fn clear(&mut self, time: usize) -> EditResult {
        if time >= self.points.len() {
            return Err(Rejected::TimeOutOfRange {
                index: time,
                len: self.points.len(),
            });
        }
        for point in &mut self.points[time..] {
            *point = None;
        }
        Ok(Applied::Exact)
    }

    pub fn to_value(&self, axis: &TimeAxis) -> FieldValue {
        let entries: BTreeMap<String, FieldValue> = axis
            .labels()
            .iter()
            .zip(&self.points)
            .filter_map(|(label, point)| point.map(|t| (label.clone(), FieldValue::Number(t))))
            .collect();
        FieldValue::Record(entries)
    }

    pub fn from_value(axis: &TimeAxis, value: Option<&FieldValue>) -> Self {
        let record = value.and_then(FieldValue::as_record);
        let points = axis
            .labels()
            .iter()
            .map(|label| {
                record
                    .and_then(|r| r.get(label))
                    .and_then(FieldValue::to_number)
                    .filter(|t| *t >= 0.0)
            })
            .collect();
        Self { points }
    }
}
