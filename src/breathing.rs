//! Paced breathing guide.
//!
//! An endless, restartable cycle over the configured prompts. The guide has
//! no notion of time; whoever drives it waits out each prompt's duration
//! before asking for the next one.

use std::time::Duration;

use biocalm_core::config::{BreathingPromptConfig, BreathingStage};
use serde::Serialize;

/// One step of the breathing cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreathingPrompt {
    /// Cycle stage
    pub stage: BreathingStage,
    /// Instruction text
    pub text: String,
    /// Time until the next prompt
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    /// Target scale for the breathing circle
    pub scale: f64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

impl From<&BreathingPromptConfig> for BreathingPrompt {
    fn from(config: &BreathingPromptConfig) -> Self {
        Self {
            stage: config.stage,
            text: config.text.clone(),
            duration: config.duration,
            scale: config.scale,
        }
    }
}

/// Cycles through the prompts forever.
#[derive(Debug, Clone)]
pub struct BreathingGuide {
    prompts: Vec<BreathingPromptConfig>,
    position: usize,
}

impl BreathingGuide {
    /// Creates a guide positioned at the first prompt.
    #[must_use]
    pub const fn new(prompts: Vec<BreathingPromptConfig>) -> Self {
        Self {
            prompts,
            position: 0,
        }
    }

    /// Rewinds to the first prompt.
    pub const fn restart(&mut self) {
        self.position = 0;
    }

    /// Length of one full cycle.
    #[must_use]
    pub fn cycle_duration(&self) -> Duration {
        self.prompts.iter().map(|p| p.duration).sum()
    }
}

impl Iterator for BreathingGuide {
    type Item = BreathingPrompt;

    /// Yields the next prompt, wrapping after the last. Only an empty
    /// prompt list ends the iteration.
    fn next(&mut self) -> Option<Self::Item> {
        if self.prompts.is_empty() {
            return None;
        }
        let prompt = BreathingPrompt::from(&self.prompts[self.position]);
        self.position = (self.position + 1) % self.prompts.len();
        Some(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biocalm_core::config::RegulationConfig;

    fn default_guide() -> BreathingGuide {
        BreathingGuide::new(RegulationConfig::default().prompts)
    }

    #[test]
    fn cycles_inhale_hold_exhale_and_wraps() {
        let stages: Vec<_> = default_guide().take(7).map(|p| p.stage).collect();
        assert_eq!(
            stages,
            [
                BreathingStage::Inhale,
                BreathingStage::Hold,
                BreathingStage::Exhale,
                BreathingStage::Inhale,
                BreathingStage::Hold,
                BreathingStage::Exhale,
                BreathingStage::Inhale,
            ]
        );
    }

    #[test]
    fn default_timings_and_scales() {
        let prompts: Vec<_> = default_guide().take(3).collect();
        let timings: Vec<_> = prompts.iter().map(|p| p.duration.as_secs()).collect();
        assert_eq!(timings, [4, 7, 8]);
        assert!((prompts[1].scale - 1.5).abs() < f64::EPSILON);
        assert!((prompts[2].scale - 1.0).abs() < f64::EPSILON);
        assert_eq!(default_guide().cycle_duration(), Duration::from_secs(19));
    }

    #[test]
    fn restart_rewinds() {
        let mut guide = default_guide();
        guide.next();
        guide.next();
        guide.restart();
        assert_eq!(guide.next().map(|p| p.stage), Some(BreathingStage::Inhale));
    }

    #[test]
    fn empty_guide_ends_immediately() {
        assert!(BreathingGuide::new(Vec::new()).next().is_none());
    }

    #[test]
    fn prompt_serializes_duration_in_millis() {
        let prompt = default_guide().next().unwrap();
        let json = serde_json::to_value(&prompt).unwrap();
        assert_eq!(json["duration_ms"], 4000);
        assert_eq!(json["stage"], "inhale");
    }
}
