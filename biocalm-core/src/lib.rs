//! `biocalm` Core: shared data model, wire protocol and configuration schema
//!
//! This crate provides the types shared between the session orchestrator
//! (`biocalm`) and anything else that speaks to the acquisition service or
//! reads session configuration files.

pub mod config;
pub mod error;
pub mod model;
pub mod protocol;

pub use model::{
    AnxietyLevel, BaselineSnapshot, Color, Demographics, GameKind, Metric, QuestionnaireResponses,
    QuestionnaireResult, Sample, SampleSeries, SessionPhase, Sex,
};
pub use protocol::{InboundEvent, OutboundMessage};
