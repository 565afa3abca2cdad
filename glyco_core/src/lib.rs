#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::too_many_arguments
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Glucose forecasting engine.
//!
//! This crate turns glucose, insulin and carb history plus treatment schedules
//! into a predicted glucose curve. Records and the provider seam come from
//! `glyco_traits`; nothing here performs I/O except fixture helpers.
//!
//! ## Pipeline
//!
//! - **Schedules**: absolute-time tables and repeating daily schedules (`schedule`)
//! - **Annotation**: doses measured against scheduled basal (`annotation`)
//! - **Insulin**: exponential action curves, IOB and effect (`insulin`)
//! - **Counteraction**: observed change not explained by insulin (`counteraction`)
//! - **Carbs**: dynamic absorption driven by counteraction (`carbs`)
//! - **Retrospective correction**: decaying correction for unexplained change (`retrospective`)
//! - **Momentum**: short-term trend (`momentum`)
//! - **Prediction**: curves summed from the latest sample (`prediction`)
//! - **Recommendation**: bounded temp basal / bolus (`recommendation`)
//!
//! ## Determinism
//!
//! `forecast` is a pure function of its input and the explicit `now`; all
//! curves share a grid anchored at the prediction start, so identical inputs
//! give bit-identical outputs.

pub mod analysis;
pub mod annotation;
pub mod builder;
pub mod carbs;
pub mod config;
pub mod conversions;
pub mod counteraction;
pub mod effects;
pub mod engine;
pub mod error;
pub mod fixture;
pub mod insulin;
pub mod memory;
pub mod momentum;
pub mod prediction;
pub mod provider;
pub mod recommendation;
pub mod retrospective;
pub mod schedule;
pub mod timeline;
pub mod types;
pub mod util;

pub use builder::ForecastInputBuilder;
pub use config::{DosingStrategy, EnabledEffects, ForecastSettings, SensitivityMode};
pub use effects::{GlucoseEffect, GlucoseEffectVelocity, PredictedGlucoseValue};
pub use engine::forecast;
pub use error::{BuildError, ForecastError, Result, ScheduleKind};
pub use insulin::InsulinModel;
pub use memory::InMemoryHistory;
pub use recommendation::{DoseRecommendation, GlucoseCorrection, TempBasal};
pub use schedule::{DailySchedule, ScheduleTable};
pub use timeline::{EffectsTimelinePoint, effects_timeline};
pub use types::{ForecastInput, ForecastOutput};
