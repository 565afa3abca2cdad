use chrono::{DateTime, Utc};
use thiserror::Error;

/// The four treatment-setting schedules a forecast consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleKind {
    Basal,
    Sensitivity,
    CarbRatio,
    Target,
}

impl ScheduleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleKind::Basal => "basal",
            ScheduleKind::Sensitivity => "sensitivity",
            ScheduleKind::CarbRatio => "carb_ratio",
            ScheduleKind::Target => "target",
        }
    }
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal conditions for a single forecast invocation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("no glucose sample available to anchor the forecast")]
    MissingGlucoseHistory,
    #[error("{schedule} schedule has no entry covering {at}")]
    IncompleteScheduleCoverage {
        schedule: ScheduleKind,
        at: DateTime<Utc>,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("history provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing glucose history")]
    MissingGlucose,
    #[error("missing {0} schedule")]
    MissingSchedule(ScheduleKind),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
pub use eyre::Report;
