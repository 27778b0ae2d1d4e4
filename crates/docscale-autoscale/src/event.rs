//! Triggering events.
//!
//! Scale-up and scale-down are invoked by alarm notifications or by hand.
//! The only field the procedures read is the alarm name, which arrives in
//! a different place depending on how the alarm was wired up.

use docscale_core::config::DispatchConfig;
use serde_json::Value;

/// The part of a triggering event the autoscaler reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerEvent {
    pub alarm_name: Option<String>,
}

/// Locations of the alarm name, tried in order.
const ALARM_NAME_POINTERS: &[&str] = &[
    "/alarmData/alarmName",
    "/detail/alarmName",
    "/AlarmName",
    "/alarm_name",
];

const SNS_MESSAGE_POINTER: &str = "/Records/0/Sns/Message";

impl TriggerEvent {
    pub fn for_alarm(alarm_name: impl Into<String>) -> Self {
        Self {
            alarm_name: Some(alarm_name.into()),
        }
    }

    /// Parse a JSON event document.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::from_value(&value))
    }

    /// Extract the alarm name from an event. Events without one (manual or
    /// scheduled invocations) yield `alarm_name: None`.
    pub fn from_value(value: &Value) -> Self {
        let direct = ALARM_NAME_POINTERS
            .iter()
            .find_map(|p| value.pointer(p).and_then(Value::as_str));
        if let Some(name) = direct {
            return Self::for_alarm(name);
        }

        // SNS delivers the alarm notification as a JSON string.
        value
            .pointer(SNS_MESSAGE_POINTER)
            .and_then(Value::as_str)
            .and_then(|message| serde_json::from_str::<Value>(message).ok())
            .map(|inner| Self::from_value(&inner))
            .unwrap_or_default()
    }

    /// Classify the alarm name by its suffix.
    pub fn alarm_key(&self, dispatch: &DispatchConfig) -> AlarmKey {
        match self.alarm_name.as_deref() {
            Some(name) if name.ends_with(&dispatch.scaleup_suffix) => AlarmKey::ScaleUp,
            Some(name) if name.ends_with(&dispatch.scaledown_suffix) => AlarmKey::ScaleDown,
            Some(_) => AlarmKey::Unrecognized,
            None => AlarmKey::Missing,
        }
    }
}

/// Dispatch key derived from an alarm name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKey {
    ScaleUp,
    ScaleDown,
    Unrecognized,
    Missing,
}
