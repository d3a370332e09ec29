//! Mental arithmetic game.

use std::fmt;

use biocalm_core::config::ArithmeticConfig;
use rand::Rng;
use serde::Serialize;

/// Operation used by a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// `a + b`
    Add,
    /// `a - b` with `a >= b`
    Subtract,
    /// `a × b`
    Multiply,
}

impl Operator {
    const ALL: [Self; 3] = [Self::Add, Self::Subtract, Self::Multiply];

    /// Symbol shown in the prompt.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '×',
        }
    }

    /// Applies the operation.
    #[must_use]
    pub const fn apply(self, left: i64, right: i64) -> i64 {
        match self {
            Self::Add => left + right,
            Self::Subtract => left - right,
            Self::Multiply => left * right,
        }
    }
}

/// One arithmetic problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticChallenge {
    left: i64,
    operator: Operator,
    right: i64,
    answer: i64,
}

impl ArithmeticChallenge {
    /// Draws an operator uniformly, then operands from `1..=max_operand`
    /// (`1..=max_factor` for multiplication). Subtraction operands are
    /// ordered so the answer is never negative.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, config: &ArithmeticConfig) -> Self {
        let operator = Operator::ALL[rng.random_range(0..Operator::ALL.len())];
        let bound = match operator {
            Operator::Multiply => config.max_factor,
            Operator::Add | Operator::Subtract => config.max_operand,
        };
        let bound = i64::from(bound.max(1));
        let mut left = rng.random_range(1..=bound);
        let mut right = rng.random_range(1..=bound);
        if operator == Operator::Subtract && left < right {
            std::mem::swap(&mut left, &mut right);
        }
        Self {
            left,
            operator,
            right,
            answer: operator.apply(left, right),
        }
    }

    /// Left operand as displayed.
    #[must_use]
    pub const fn left(&self) -> i64 {
        self.left
    }

    /// Right operand as displayed.
    #[must_use]
    pub const fn right(&self) -> i64 {
        self.right
    }

    /// The operation.
    #[must_use]
    pub const fn operator(&self) -> Operator {
        self.operator
    }

    /// Expected answer.
    #[must_use]
    pub const fn answer(&self) -> i64 {
        self.answer
    }
}

impl fmt::Display for ArithmeticChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} = ?",
            self.left,
            self.operator.symbol(),
            self.right
        )
    }
}

/// Arithmetic game state.
#[derive(Debug, Clone)]
pub struct ArithmeticGame {
    config: ArithmeticConfig,
    challenge: Option<ArithmeticChallenge>,
    score: u32,
}

impl ArithmeticGame {
    /// Creates an idle game.
    #[must_use]
    pub const fn new(config: ArithmeticConfig) -> Self {
        Self {
            config,
            challenge: None,
            score: 0,
        }
    }

    /// Resets the score and draws the first challenge.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> ArithmeticChallenge {
        self.score = 0;
        self.next(rng)
    }

    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> ArithmeticChallenge {
        let challenge = ArithmeticChallenge::generate(rng, &self.config);
        self.challenge = Some(challenge);
        challenge
    }

    /// Checks `answer`. A correct answer scores and draws a new challenge,
    /// which is returned; a wrong one leaves the challenge in place.
    pub fn submit<R: Rng + ?Sized>(
        &mut self,
        answer: i64,
        rng: &mut R,
    ) -> Option<ArithmeticChallenge> {
        let expected = self.challenge.map(|c| c.answer())?;
        if answer == expected {
            self.score += 1;
            Some(self.next(rng))
        } else {
            None
        }
    }

    /// Current challenge, once started.
    #[must_use]
    pub const fn challenge(&self) -> Option<&ArithmeticChallenge> {
        self.challenge.as_ref()
    }

    /// Correct answers so far.
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.score
    }
}
