//! Colour-word interference game.
//!
//! The word names one colour and is painted in another. The participant
//! answers with the ink colour.

use biocalm_core::Color;
use rand::Rng;

/// One Stroop trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StroopChallenge {
    word: Color,
    ink: Color,
}

impl StroopChallenge {
    /// Picks the word uniformly, then the ink uniformly from the other three.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let word = Color::ALL[rng.random_range(0..Color::ALL.len())];
        let others: Vec<Color> = Color::ALL.into_iter().filter(|c| *c != word).collect();
        let ink = others[rng.random_range(0..others.len())];
        Self { word, ink }
    }

    /// The colour the word spells.
    #[must_use]
    pub const fn word(&self) -> Color {
        self.word
    }

    /// The colour the word is painted in.
    #[must_use]
    pub const fn ink(&self) -> Color {
        self.ink
    }
}

/// Stroop game state.
#[derive(Debug, Clone, Default)]
pub struct StroopGame {
    challenge: Option<StroopChallenge>,
    score: u32,
}

impl StroopGame {
    /// Creates an idle game.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            challenge: None,
            score: 0,
        }
    }

    /// Resets the score and draws the first trial.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> StroopChallenge {
        self.score = 0;
        self.next(rng)
    }

    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> StroopChallenge {
        let challenge = StroopChallenge::generate(rng);
        self.challenge = Some(challenge);
        challenge
    }

    /// Compares `ink` with the trial's ink colour (never the word). Returns
    /// the next trial on a match.
    pub fn submit<R: Rng + ?Sized>(&mut self, ink: Color, rng: &mut R) -> Option<StroopChallenge> {
        let expected = self.challenge.map(|c| c.ink())?;
        if ink == expected {
            self.score += 1;
            Some(self.next(rng))
        } else {
            None
        }
    }

    /// Current trial, once started.
    #[must_use]
    pub const fn challenge(&self) -> Option<&StroopChallenge> {
        self.challenge.as_ref()
    }

    /// Correct answers so far.
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.score
    }
}
