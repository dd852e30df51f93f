use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    Skipped,
    Passed,
    Failed,
    Warning,
}

impl VerifyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyStatus::Skipped => "skipped",
            VerifyStatus::Passed => "passed",
            VerifyStatus::Failed => "failed",
            VerifyStatus::Warning => "warning",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "skipped" => Some(VerifyStatus::Skipped),
            "passed" => Some(VerifyStatus::Passed),
            "failed" => Some(VerifyStatus::Failed),
            "warning" => Some(VerifyStatus::Warning),
            _ => None,
        }
    }
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a verification pass, as recorded on the step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifySummary {
    pub status: VerifyStatus,
    pub should_fail: bool,
    /// Human-readable reasons behind a failed status.
    pub failures: Vec<String>,
    pub details: Value,
}

impl VerifySummary {
    pub fn skipped() -> Self {
        VerifySummary {
            status: VerifyStatus::Skipped,
            should_fail: false,
            failures: Vec::new(),
            details: Value::Null,
        }
    }
}

/// What a migration's own `verify` hook concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyResult {
    Skipped,
    Passed { details: Option<Value> },
    Failed { details: Value },
}

impl VerifyResult {
    pub fn from_bool(ok: bool) -> Self {
        if ok {
            VerifyResult::Passed { details: None }
        } else {
            VerifyResult::Failed {
                details: Value::Null,
            }
        }
    }

    /// Fails with the listed missing items, passes when nothing is missing.
    pub fn from_missing<S: Into<String>>(missing: Vec<S>) -> Self {
        let missing: Vec<String> = missing.into_iter().map(Into::into).collect();

        if missing.is_empty() {
            VerifyResult::Passed { details: None }
        } else {
            VerifyResult::Failed {
                details: json!({ "missing": missing }),
            }
        }
    }

    /// Normalizes a loosely-shaped verification value:
    /// null skips, booleans pass or fail, arrays list missing items,
    /// objects with a boolean `ok` pass or fail with the object as details,
    /// and anything else passes with the value as details.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => VerifyResult::Skipped,
            Value::Bool(ok) => VerifyResult::from_bool(ok),
            Value::Array(items) => {
                if items.is_empty() {
                    VerifyResult::Passed { details: None }
                } else {
                    VerifyResult::Failed {
                        details: json!({ "missing": items }),
                    }
                }
            }
            Value::Object(object) => {
                let ok = object.get("ok").and_then(Value::as_bool);
                let value = Value::Object(object);

                match ok {
                    Some(false) => VerifyResult::Failed { details: value },
                    Some(true) | None => VerifyResult::Passed {
                        details: Some(value),
                    },
                }
            }
            other => VerifyResult::Passed {
                details: Some(other),
            },
        }
    }

    pub fn status(&self) -> VerifyStatus {
        match self {
            VerifyResult::Skipped => VerifyStatus::Skipped,
            VerifyResult::Passed { .. } => VerifyStatus::Passed,
            VerifyResult::Failed { .. } => VerifyStatus::Failed,
        }
    }

    pub fn details(&self) -> Value {
        match self {
            VerifyResult::Skipped => Value::Null,
            VerifyResult::Passed { details } => details.clone().unwrap_or(Value::Null),
            VerifyResult::Failed { details } => details.clone(),
        }
    }
}

impl From<bool> for VerifyResult {
    fn from(ok: bool) -> Self {
        VerifyResult::from_bool(ok)
    }
}

impl From<Option<Value>> for VerifyResult {
    fn from(value: Option<Value>) -> Self {
        value.map_or(VerifyResult::Skipped, VerifyResult::from_value)
    }
}
