//! Configuration schema types.

pub mod schema;

pub use schema::{
    ArithmeticConfig, AxisOffsets, AxisRange, BaselineConfig, BreathingPromptConfig,
    BreathingStage, ChartConfig, GamesConfig, QuestionnaireConfig, RegulationConfig,
    SequenceConfig, SessionConfig, StopConfig, ZoneConfig, ZoneLevel,
};
