//! Colour sequence memory game.
//!
//! Each round appends one colour and plays the whole sequence back with
//! input locked. Presses are judged one at a time against the sequence.

use biocalm_core::Color;
use biocalm_core::config::SequenceConfig;
use rand::Rng;

use super::{ChallengePrompt, GameCue, GameStep};

/// How a single press was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressResult {
    /// Input was locked (playback, or between rounds)
    Ignored,
    /// Matches so far; more presses expected
    Matched,
    /// Last colour of the sequence matched
    RoundComplete,
    /// Wrong colour; level demoted and sequence cleared
    Mismatch,
}

/// Sequence-recall game state.
#[derive(Debug, Clone)]
pub struct SequenceGame {
    config: SequenceConfig,
    sequence: Vec<Color>,
    progress: Vec<Color>,
    level: u32,
    playing_back: bool,
    between_rounds: bool,
}

impl SequenceGame {
    /// Creates an idle game at level 1.
    #[must_use]
    pub const fn new(config: SequenceConfig) -> Self {
        Self {
            config,
            sequence: Vec::new(),
            progress: Vec::new(),
            level: 1,
            playing_back: false,
            between_rounds: false,
        }
    }

    /// Resets to level 1 with an empty sequence and begins the first round.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<GameCue> {
        self.level = 1;
        self.sequence.clear();
        self.generate_round(rng)
    }

    /// Appends a random colour and schedules playback of the full sequence.
    pub fn generate_round<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<GameCue> {
        self.sequence
            .push(Color::ALL[rng.random_range(0..Color::ALL.len())]);
        self.progress.clear();
        self.playing_back = true;
        self.between_rounds = false;

        let mut cues = vec![
            GameCue::InputLocked(true),
            GameCue::Present(ChallengePrompt::Sequence {
                level: self.level,
                length: self.sequence.len(),
            }),
        ];
        let mut at = self.config.step;
        for index in 0..self.sequence.len() {
            cues.push(GameCue::Schedule {
                after: at,
                step: GameStep::Playback { index },
            });
            at += self.config.step;
        }
        cues.push(GameCue::Schedule {
            after: at,
            step: GameStep::PlaybackDone,
        });
        cues
    }

    /// Advances playback or starts the pending round.
    pub fn on_step<R: Rng + ?Sized>(&mut self, step: GameStep, rng: &mut R) -> Vec<GameCue> {
        match step {
            GameStep::Playback { index } if self.playing_back => self
                .sequence
                .get(index)
                .map(|color| GameCue::Highlight {
                    color: *color,
                    hold: self.config.highlight,
                })
                .into_iter()
                .collect(),
            GameStep::PlaybackDone if self.playing_back => {
                self.playing_back = false;
                vec![GameCue::InputLocked(false)]
            }
            GameStep::NextRound if self.between_rounds => self.generate_round(rng),
            _ => Vec::new(),
        }
    }

    /// Judges one press against the sequence at the next position.
    pub fn press(&mut self, color: Color) -> (PressResult, Vec<GameCue>) {
        if self.playing_back || self.between_rounds {
            return (PressResult::Ignored, Vec::new());
        }

        let echo = GameCue::Highlight {
            color,
            hold: self.config.highlight,
        };
        let index = self.progress.len();
        self.progress.push(color);

        if self.sequence.get(index) != Some(&color) {
            self.sequence.clear();
            self.level = self.level.saturating_sub(1).max(1);
            self.between_rounds = true;
            return (
                PressResult::Mismatch,
                vec![
                    echo,
                    GameCue::InputLocked(true),
                    GameCue::Schedule {
                        after: self.config.failure_delay,
                        step: GameStep::NextRound,
                    },
                ],
            );
        }

        if self.progress.len() == self.sequence.len() {
            self.level += 1;
            self.between_rounds = true;
            return (
                PressResult::RoundComplete,
                vec![
                    echo,
                    GameCue::InputLocked(true),
                    GameCue::Schedule {
                        after: self.config.success_delay,
                        step: GameStep::NextRound,
                    },
                ],
            );
        }

        (PressResult::Matched, vec![echo])
    }

    /// The sequence to reproduce.
    #[must_use]
    pub fn sequence(&self) -> &[Color] {
        &self.sequence
    }

    /// Presses made this round.
    #[must_use]
    pub fn progress(&self) -> &[Color] {
        &self.progress
    }

    /// Current level (at least 1).
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Whether playback is running.
    #[must_use]
    pub const fn is_playing_back(&self) -> bool {
        self.playing_back
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;

    fn finish_playback(game: &mut SequenceGame, rng: &mut StdRng) {
        let len = game.sequence().len();
        for index in 0..len {
            game.on_step(GameStep::Playback { index }, rng);
        }
        game.on_step(GameStep::PlaybackDone, rng);
    }

    fn replay(game: &mut SequenceGame) -> PressResult {
        let seq = game.sequence().to_vec();
        let mut last = PressResult::Ignored;
        for color in seq {
            last = game.press(color).0;
        }
        last
    }

    fn wrong_color(expected: Color) -> Color {
        Color::ALL.into_iter().find(|c| *c != expected).unwrap()
    }

    #[test]
    fn round_schedules_playback_at_fixed_steps() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut game = SequenceGame::new(SequenceConfig::default());
        let cues = game.start(&mut rng);

        assert_eq!(game.sequence().len(), 1);
        assert!(game.is_playing_back());
        let schedule: Vec<_> = cues
            .iter()
            .filter_map(|c| match c {
                GameCue::Schedule { after, step } => Some((*after, *step)),
                _ => None,
            })
            .collect();
        assert_eq!(
            schedule,
            vec![
                (Duration::from_millis(800), GameStep::Playback { index: 0 }),
                (Duration::from_millis(1600), GameStep::PlaybackDone),
            ]
        );
    }

    #[test]
    fn playback_highlights_for_configured_hold() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut game = SequenceGame::new(SequenceConfig::default());
        game.start(&mut rng);
        let first = game.sequence()[0];

        let cues = game.on_step(GameStep::Playback { index: 0 }, &mut rng);
        assert_eq!(
            cues,
            vec![GameCue::Highlight {
                color: first,
                hold: Duration::from_millis(400)
            }]
        );
    }

    #[test]
    fn presses_during_playback_are_ignored() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut game = SequenceGame::new(SequenceConfig::default());
        game.start(&mut rng);
        let first = game.sequence()[0];

        let (result, cues) = game.press(first);
        assert_eq!(result, PressResult::Ignored);
        assert!(cues.is_empty());
        assert!(game.progress().is_empty());
    }

    #[test]
    fn presses_between_rounds_are_ignored() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut game = SequenceGame::new(SequenceConfig::default());
        game.start(&mut rng);
        finish_playback(&mut game, &mut rng);
        assert_eq!(replay(&mut game), PressResult::RoundComplete);

        assert_eq!(game.press(Color::Red).0, PressResult::Ignored);
    }

    #[test]
    fn mismatch_demotes_and_restarts_from_one() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut game = SequenceGame::new(SequenceConfig::default());
        game.start(&mut rng);
        for _ in 0..3 {
            finish_playback(&mut game, &mut rng);
            replay(&mut game);
            game.on_step(GameStep::NextRound, &mut rng);
        }
        assert_eq!(game.level(), 4);
        finish_playback(&mut game, &mut rng);

        let (result, cues) = game.press(wrong_color(game.sequence()[0]));
        assert_eq!(result, PressResult::Mismatch);
        assert!(cues.contains(&GameCue::Schedule {
            after: Duration::from_millis(1500),
            step: GameStep::NextRound
        }));
        assert_eq!(game.level(), 3);

        game.on_step(GameStep::NextRound, &mut rng);
        assert_eq!(game.sequence().len(), 1);
    }

    #[test]
    fn level_never_drops_below_one() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut game = SequenceGame::new(SequenceConfig::default());
        game.start(&mut rng);
        finish_playback(&mut game, &mut rng);
        game.press(wrong_color(game.sequence()[0]));
        assert_eq!(game.level(), 1);
    }

    #[test]
    fn stale_next_round_does_nothing() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut game = SequenceGame::new(SequenceConfig::default());
        game.start(&mut rng);
        assert!(game.on_step(GameStep::NextRound, &mut rng).is_empty());
        assert_eq!(game.sequence().len(), 1);
    }

    proptest! {
        #[test]
        fn k_correct_rounds_reach_level_k_plus_one(seed in any::<u64>(), k in 0u32..8) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut game = SequenceGame::new(SequenceConfig::default());
            game.start(&mut rng);
            for _ in 0..k {
                finish_playback(&mut game, &mut rng);
                prop_assert_eq!(replay(&mut game), PressResult::RoundComplete);
                game.on_step(GameStep::NextRound, &mut rng);
            }
            prop_assert_eq!(game.level(), 1 + k);
            prop_assert_eq!(game.sequence().len(), game.level() as usize);
        }

        #[test]
        fn one_mistake_resets_sequence(seed in any::<u64>(), k in 0u32..6, at in 0usize..6) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut game = SequenceGame::new(SequenceConfig::default());
            game.start(&mut rng);
            for _ in 0..k {
                finish_playback(&mut game, &mut rng);
                replay(&mut game);
                game.on_step(GameStep::NextRound, &mut rng);
            }
            finish_playback(&mut game, &mut rng);
            let seq = game.sequence().to_vec();
            let at = at % seq.len();
            for color in &seq[..at] {
                game.press(*color);
            }
            let level_before = game.level();
            prop_assert_eq!(game.press(wrong_color(seq[at])).0, PressResult::Mismatch);
            prop_assert_eq!(game.level(), level_before.saturating_sub(1).max(1));
            game.on_step(GameStep::NextRound, &mut rng);
            prop_assert_eq!(game.sequence().len(), 1);
        }
    }
}
