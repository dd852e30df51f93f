use std::fmt;

use anyhow::Error;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::common::helpers::{format_error_chain, format_error_stack};
use crate::verify::{VerifyStatus, VerifySummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared by runs and steps: both move from running to a terminal state once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(RunStatus::Running),
            "success" => Some(RunStatus::Success),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of one invocation, threaded through every step it executes.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub direction: Direction,
    pub environment: String,
    pub database: String,
}

impl RunContext {
    pub fn new(direction: Direction, environment: &str, database: &str) -> Self {
        RunContext {
            run_id: Uuid::new_v4(),
            direction,
            environment: environment.to_string(),
            database: database.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub message: String,
    pub stack: String,
}

impl From<&Error> for ErrorInfo {
    fn from(err: &Error) -> Self {
        ErrorInfo {
            message: format_error_chain(err),
            stack: format_error_stack(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub status: RunStatus,
    pub error: Option<ErrorInfo>,
    pub verify: VerifySummary,
}

#[derive(Debug, Clone)]
pub struct MigrationRunRecord {
    pub run_id: Uuid,
    pub direction: Direction,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub environment: String,
    pub database: String,
    pub error_message: Option<String>,
    pub error_stack: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MigrationStepRecord {
    pub run_id: Uuid,
    pub direction: Direction,
    pub migration: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub error_stack: Option<String>,
    pub verify_status: Option<VerifyStatus>,
    pub verify_details: Option<Value>,
}

impl MigrationRunRecord {
    pub fn summary(&self) -> String {
        format!(
            "Run {} {} on {} ({}): {}, took {}",
            self.run_id,
            self.direction,
            self.database,
            self.environment,
            self.status,
            took(self.started_at, self.finished_at)
        )
    }
}

impl MigrationStepRecord {
    /// One row of the step table printed after a run.
    pub fn summary(&self) -> String {
        format!(
            "  {:<40} {:<4} {:<7} verify: {:<7} {}",
            self.migration,
            self.direction.as_str(),
            self.status.as_str(),
            self.verify_status.map_or("-", |status| status.as_str()),
            took(self.started_at, self.finished_at)
        )
    }
}

fn took(started_at: DateTime<Utc>, finished_at: Option<DateTime<Utc>>) -> String {
    match finished_at {
        Some(finished_at) => format!(
            "{:.3}s",
            (finished_at - started_at).num_milliseconds() as f64 / 1000.0
        ),
        None => "unfinished".to_string(),
    }
}
