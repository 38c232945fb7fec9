use std::fmt;

/// Best-effort side channel attached to a primary operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideChannel {
    Audit,
    Notification,
}

impl fmt::Display for SideChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideChannel::Audit => f.write_str("audit"),
            SideChannel::Notification => f.write_str("notification"),
        }
    }
}

/// Result of one side effect. `error` is set when the side effect failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SideEffectReport {
    pub channel: SideChannel,
    pub error: Option<String>,
}

impl SideEffectReport {
    pub fn succeeded(channel: SideChannel) -> Self {
        Self { channel, error: None }
    }

    pub fn failed(channel: SideChannel, error: impl Into<String>) -> Self {
        Self {
            channel,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Primary result of a state transition plus the reports of its side effects.
///
/// The primary value is committed before any side effect runs; a failed
/// audit write or notification only shows up in `side_effects`.
#[derive(Debug)]
pub struct ActionOutcome<T> {
    pub value: T,
    pub side_effects: Vec<SideEffectReport>,
}

impl<T> ActionOutcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            side_effects: Vec::new(),
        }
    }

    pub fn with_report(mut self, report: SideEffectReport) -> Self {
        self.side_effects.push(report);
        self
    }

    pub fn push(&mut self, report: SideEffectReport) {
        self.side_effects.push(report);
    }

    /// True when every side effect succeeded
    pub fn side_effects_ok(&self) -> bool {
        self.side_effects.iter().all(SideEffectReport::is_ok)
    }

    /// Reports for one channel
    pub fn reports(&self, channel: SideChannel) -> impl Iterator<Item = &SideEffectReport> {
        self.side_effects.iter().filter(move |r| r.channel == channel)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ActionOutcome<U> {
        ActionOutcome {
            value: f(self.value),
            side_effects: self.side_effects,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_without_reports_is_ok() {
        let outcome = ActionOutcome::new(5);
        assert!(outcome.side_effects_ok());
        assert_eq!(outcome.into_value(), 5);
    }

    #[test]
    fn test_failed_report_does_not_touch_value() {
        let outcome = ActionOutcome::new("done")
            .with_report(SideEffectReport::succeeded(SideChannel::Audit))
            .with_report(SideEffectReport::failed(SideChannel::Notification, "smtp down"));

        assert!(!outcome.side_effects_ok());
        assert_eq!(outcome.reports(SideChannel::Notification).count(), 1);
        assert!(outcome.reports(SideChannel::Audit).all(|r| r.is_ok()));
        assert_eq!(outcome.value, "done");
    }

    #[test]
    fn test_map_keeps_reports() {
        let outcome = ActionOutcome::new(2)
            .with_report(SideEffectReport::failed(SideChannel::Audit, "db locked"))
            .map(|v| v * 10);

        assert_eq!(outcome.value, 20);
        assert_eq!(outcome.side_effects.len(), 1);
    }
}
