use std::path::Path;

use serde::{Deserialize, Serialize};
use shiftform_core::TimeAxis;
use shiftform_core::time::parse_clock;

use crate::error::EngineError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub history: HistoryConfig,
    pub shift: ShiftConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_undo: usize,
    pub max_redo: usize,
    /// Quiet period after the last edit before a snapshot is taken.
    pub debounce_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_undo: 50,
            max_redo: 40,
            debounce_ms: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftConfig {
    pub start: String,
    pub points: usize,
    pub step_minutes: u32,
    pub length_minutes: u32,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            start: "08:00".into(),
            points: 12,
            step_minutes: 60,
            length_minutes: 720,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let shift = &self.shift;
        if parse_clock(&shift.start).is_none() {
            return Err(EngineError::Config(format!("shift.start {:?} is not HH:MM", shift.start)));
        }
        if shift.points == 0 {
            return Err(EngineError::Config("shift.points must be positive".into()));
        }
        if shift.step_minutes == 0 {
            return Err(EngineError::Config("shift.step_minutes must be positive".into()));
        }
        if shift.length_minutes == 0 {
            return Err(EngineError::Config("shift.length_minutes must be positive".into()));
        }
        Ok(())
    }

    /// Labels of the shift's time points.
    pub fn time_axis(&self) -> Result<TimeAxis, EngineError> {
        self.validate()?;
        let start = parse_clock(&self.shift.start).unwrap_or_default();
        Ok(TimeAxis::hourly(start, self.shift.points, self.shift.step_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_plant_shift() {
        let config = EngineConfig::default();
        assert_eq!(config.history.max_undo, 50);
        assert_eq!(config.history.max_redo, 40);
        assert_eq!(config.history.debounce_ms, 400);
        let axis = config.time_axis().unwrap();
        assert_eq!(axis, TimeAxis::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [history]
            debounce_ms = 250

            [shift]
            start = "20:00"
            points = 6
            step_minutes = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.history.debounce_ms, 250);
        assert_eq!(config.history.max_undo, 50);
        let axis = config.time_axis().unwrap();
        assert_eq!(axis.labels(), ["20:00", "22:00", "00:00", "02:00", "04:00", "06:00"]);
    }

    #[test]
    fn rejects_bad_shift() {
        for text in [
            "[shift]\npoints = 0",
            "[shift]\nstep_minutes = 0",
            "[shift]\nstart = \"25:00\"",
            "[history]\nmax_undo = \"lots\"",
        ] {
            assert!(matches!(EngineConfig::from_toml(text), Err(EngineError::Config(_))), "{text}");
        }
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shiftform.toml");
        std::fs::write(&path, "[history]\nmax_redo = 10\n").unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap().history.max_redo, 10);
        assert!(EngineConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}
