use crate::field_value::FieldValue;

/// Parses `"HH:MM"` into total minutes. Anything malformed, empty, or with
/// minutes outside `0..60` is zero: absent data means zero duration.
pub fn minutes(s: &str) -> u32 {
    let Some((h, m)) = s.trim().split_once(':') else {
        return 0;
    };
    let (Ok(h), Ok(m)) = (h.parse::<u32>(), m.parse::<u32>()) else {
        return 0;
    };
    if m >= 60 {
        return 0;
    }
    h.saturating_mul(60).saturating_add(m)
}

/// Strict wall-clock parse: `"HH:MM"` with hours below 24. Minutes past midnight.
pub fn parse_clock(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let (h, m) = (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?);
    (h < 24 && m < 60).then_some(h * 60 + m)
}

/// Renders minutes back as zero-padded `"HH:MM"`.
pub fn format_minutes(total: u32) -> String {
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Resolves a comparison target: colon-formatted text is read as a
/// duration in minutes, anything else numerically. Unset or unreadable
/// targets resolve to zero.
pub fn resolve_target(value: Option<&FieldValue>) -> f64 {
    match value {
        Some(FieldValue::Text(s)) if s.contains(':') => f64::from(minutes(s)),
        Some(v) => v.to_number().unwrap_or(0.0),
        None => 0.0,
    }
}

/// Ordered labels for the fixed time points of a shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAxis {
    labels: Vec<String>,
}

impl TimeAxis {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// `points` labels spaced `step_minutes` apart from `start_minutes`,
    /// wrapping past midnight.
    pub fn hourly(start_minutes: u32, points: usize, step_minutes: u32) -> Self {
        let labels = (0..points)
            .map(|i| {
                let offset = step_minutes.saturating_mul(i as u32);
                format_minutes((start_minutes + offset) % (24 * 60))
            })
            .collect();
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

impl Default for TimeAxis {
    fn default() -> Self {
        Self::hourly(8 * 60, 12, 60)
    }
}
