//! Stressor games hosted by the activation phase.
//!
//! Each game is a self-contained state machine. Games never touch timers
//! themselves: anything time-based comes back to the caller as a
//! [`GameCue::Schedule`], and the caller feeds the step back through
//! [`GameEngine::on_step`] when it falls due.

pub mod arithmetic;
pub mod sequence;
pub mod stroop;

use std::time::Duration;

use biocalm_core::config::GamesConfig;
use biocalm_core::{Color, GameKind};
use rand::Rng;
use serde::Serialize;

use crate::error::SessionError;

pub use arithmetic::{ArithmeticChallenge, ArithmeticGame, Operator};
pub use sequence::{PressResult, SequenceGame};
pub use stroop::{StroopChallenge, StroopGame};

// ============================================================================
// Game I/O
// ============================================================================

/// Participant input to a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameInput {
    /// Typed arithmetic answer
    Number(i64),
    /// Colour button (Stroop ink or sequence press)
    Color(Color),
}

/// Verdict on one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Matched; the game moved on
    Correct,
    /// Did not match
    Incorrect,
    /// Input arrived while locked
    Ignored,
}

impl AnswerOutcome {
    /// Snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
            Self::Ignored => "ignored",
        }
    }
}

/// What the participant should see for the current challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengePrompt {
    /// `"7 × 3 = ?"`
    Arithmetic {
        /// Rendered problem
        text: String,
    },
    /// A colour word painted in a different ink
    Stroop {
        /// Word shown
        word: Color,
        /// Ink it is painted in
        ink: Color,
    },
    /// A new round is about to play back
    Sequence {
        /// Current level
        level: u32,
        /// Colours to memorise
        length: usize,
    },
}

/// Deferred game-internal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStep {
    /// Light the `index`-th colour of the sequence
    Playback {
        /// Position in the sequence
        index: usize,
    },
    /// Playback finished; unlock input
    PlaybackDone,
    /// Begin the next sequence round
    NextRound,
}

/// Side effect requested by a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCue {
    /// Show a new challenge
    Present(ChallengePrompt),
    /// Call back with `step` after `after`
    Schedule {
        /// Delay from now
        after: Duration,
        /// Step to deliver
        step: GameStep,
    },
    /// Light a colour for `hold`
    Highlight {
        /// Colour to light
        color: Color,
        /// How long it stays lit
        hold: Duration,
    },
    /// Lock or unlock participant input
    InputLocked(bool),
}

/// Result of [`GameEngine::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgement {
    /// The verdict
    pub outcome: AnswerOutcome,
    /// Follow-up effects
    pub cues: Vec<GameCue>,
}

/// Snapshot of a game's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum GameState {
    /// Arithmetic
    Arithmetic {
        /// Expected answer to the live challenge
        current_answer: Option<i64>,
        /// Correct answers
        score: u32,
    },
    /// Stroop
    Stroop {
        /// Ink colour to name
        target_color: Option<Color>,
        /// Word shown
        displayed_word: Option<Color>,
        /// Correct answers
        score: u32,
    },
    /// Sequence recall
    SequenceRecall {
        /// Colours to reproduce
        sequence: Vec<Color>,
        /// Presses made this round
        user_progress: Vec<Color>,
        /// Current level
        level: u32,
        /// Whether playback is running
        is_playing_back: bool,
    },
}

// ============================================================================
// Engine
// ============================================================================

/// One running game.
#[derive(Debug, Clone)]
pub enum GameEngine {
    /// Mental arithmetic
    Arithmetic(ArithmeticGame),
    /// Colour-word interference
    Stroop(StroopGame),
    /// Colour sequence memory
    SequenceRecall(SequenceGame),
}

impl GameEngine {
    /// Builds an idle engine of `kind`.
    #[must_use]
    pub fn new(kind: GameKind, config: &GamesConfig) -> Self {
        match kind {
            GameKind::Arithmetic => Self::Arithmetic(ArithmeticGame::new(config.arithmetic.clone())),
            GameKind::Stroop => Self::Stroop(StroopGame::new()),
            GameKind::SequenceRecall => {
                Self::SequenceRecall(SequenceGame::new(config.sequence.clone()))
            }
        }
    }

    /// Which game this is.
    #[must_use]
    pub const fn kind(&self) -> GameKind {
        match self {
            Self::Arithmetic(_) => GameKind::Arithmetic,
            Self::Stroop(_) => GameKind::Stroop,
            Self::SequenceRecall(_) => GameKind::SequenceRecall,
        }
    }

    /// Resets score or level and presents the first challenge.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<GameCue> {
        match self {
            Self::Arithmetic(game) => vec![present_arithmetic(&game.start(rng))],
            Self::Stroop(game) => vec![present_stroop(&game.start(rng))],
            Self::SequenceRecall(game) => game.start(rng),
        }
    }

    /// Judges one input.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the input kind does not fit the
    /// game (a number for a colour game, or the reverse).
    pub fn submit<R: Rng + ?Sized>(
        &mut self,
        input: GameInput,
        rng: &mut R,
    ) -> Result<Judgement, SessionError> {
        let judgement = match (self, input) {
            (Self::Arithmetic(game), GameInput::Number(answer)) => {
                scored(game.submit(answer, rng).map(|c| present_arithmetic(&c)))
            }
            (Self::Stroop(game), GameInput::Color(ink)) => {
                scored(game.submit(ink, rng).map(|c| present_stroop(&c)))
            }
            (Self::SequenceRecall(game), GameInput::Color(color)) => {
                let (result, cues) = game.press(color);
                let outcome = match result {
                    PressResult::Ignored => AnswerOutcome::Ignored,
                    PressResult::Matched | PressResult::RoundComplete => AnswerOutcome::Correct,
                    PressResult::Mismatch => AnswerOutcome::Incorrect,
                };
                Judgement { outcome, cues }
            }
            (game, GameInput::Number(_)) => {
                return Err(SessionError::validation(format!(
                    "the {} game expects a colour",
                    game.kind()
                )));
            }
            (game, GameInput::Color(_)) => {
                return Err(SessionError::validation(format!(
                    "the {} game expects a number",
                    game.kind()
                )));
            }
        };
        Ok(judgement)
    }

    /// Delivers a step previously requested with [`GameCue::Schedule`].
    pub fn on_step<R: Rng + ?Sized>(&mut self, step: GameStep, rng: &mut R) -> Vec<GameCue> {
        match self {
            Self::SequenceRecall(game) => game.on_step(step, rng),
            Self::Arithmetic(_) | Self::Stroop(_) => Vec::new(),
        }
    }

    /// Score for arithmetic and Stroop, level for sequence recall.
    #[must_use]
    pub const fn score(&self) -> u32 {
        match self {
            Self::Arithmetic(game) => game.score(),
            Self::Stroop(game) => game.score(),
            Self::SequenceRecall(game) => game.level(),
        }
    }

    /// State snapshot.
    #[must_use]
    pub fn state(&self) -> GameState {
        match self {
            Self::Arithmetic(game) => GameState::Arithmetic {
                current_answer: game.challenge().map(ArithmeticChallenge::answer),
                score: game.score(),
            },
            Self::Stroop(game) => GameState::Stroop {
                target_color: game.challenge().map(StroopChallenge::ink),
                displayed_word: game.challenge().map(StroopChallenge::word),
                score: game.score(),
            },
            Self::SequenceRecall(game) => GameState::SequenceRecall {
                sequence: game.sequence().to_vec(),
                user_progress: game.progress().to_vec(),
                level: game.level(),
                is_playing_back: game.is_playing_back(),
            },
        }
    }
}

fn present_arithmetic(challenge: &ArithmeticChallenge) -> GameCue {
    GameCue::Present(ChallengePrompt::Arithmetic {
        text: challenge.to_string(),
    })
}

const fn present_stroop(challenge: &StroopChallenge) -> GameCue {
    GameCue::Present(ChallengePrompt::Stroop {
        word: challenge.word(),
        ink: challenge.ink(),
    })
}

fn scored(next: Option<GameCue>) -> Judgement {
    match next {
        Some(cue) => Judgement {
            outcome: AnswerOutcome::Correct,
            cues: vec![cue],
        },
        None => Judgement {
            outcome: AnswerOutcome::Incorrect,
            cues: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn engine(kind: GameKind) -> GameEngine {
        GameEngine::new(kind, &GamesConfig::default())
    }

    #[test]
    fn start_presents_a_challenge() {
        let mut rng = StdRng::seed_from_u64(1);
        for kind in GameKind::ALL {
            let mut game = engine(kind);
            let cues = game.start(&mut rng);
            assert!(
                cues.iter().any(|c| matches!(c, GameCue::Present(_))),
                "{kind} presented nothing"
            );
            assert_eq!(game.kind(), kind);
        }
    }

    #[test]
    fn arithmetic_correct_answer_presents_next() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = engine(GameKind::Arithmetic);
        game.start(&mut rng);
        let GameState::Arithmetic {
            current_answer: Some(answer),
            ..
        } = game.state()
        else {
            panic!("expected arithmetic state");
        };

        let judgement = game.submit(GameInput::Number(answer), &mut rng).unwrap();
        assert_eq!(judgement.outcome, AnswerOutcome::Correct);
        assert!(matches!(
            judgement.cues.as_slice(),
            [GameCue::Present(ChallengePrompt::Arithmetic { .. })]
        ));
        assert_eq!(game.score(), 1);
    }

    #[test]
    fn stroop_wrong_answer_has_no_cues() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = engine(GameKind::Stroop);
        game.start(&mut rng);
        let GameState::Stroop {
            displayed_word: Some(word),
            ..
        } = game.state()
        else {
            panic!("expected stroop state");
        };

        let judgement = game.submit(GameInput::Color(word), &mut rng).unwrap();
        assert_eq!(judgement.outcome, AnswerOutcome::Incorrect);
        assert!(judgement.cues.is_empty());
    }

    #[test]
    fn mismatched_input_kind_is_a_validation_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = engine(GameKind::Stroop);
        game.start(&mut rng);
        let err = game.submit(GameInput::Number(3), &mut rng).unwrap_err();
        assert!(matches!(err, SessionError::Validation { .. }));

        let mut game = engine(GameKind::Arithmetic);
        game.start(&mut rng);
        assert!(game.submit(GameInput::Color(Color::Red), &mut rng).is_err());
    }

    #[test]
    fn sequence_press_during_playback_is_ignored() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = engine(GameKind::SequenceRecall);
        game.start(&mut rng);
        let judgement = game.submit(GameInput::Color(Color::Blue), &mut rng).unwrap();
        assert_eq!(judgement.outcome, AnswerOutcome::Ignored);
        assert!(matches!(
            game.state(),
            GameState::SequenceRecall {
                is_playing_back: true,
                ..
            }
        ));
    }

    #[test]
    fn non_sequence_games_ignore_steps() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = engine(GameKind::Arithmetic);
        game.start(&mut rng);
        assert!(game.on_step(GameStep::NextRound, &mut rng).is_empty());
    }
}
