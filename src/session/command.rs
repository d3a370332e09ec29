//! Operator console commands.
//!
//! One command per line, tokenised with shell quoting rules. Blank lines and
//! lines starting with `#` are skipped.

use std::str::FromStr;

use biocalm_core::{Color, GameKind, QuestionnaireResponses, Sex};
use thiserror::Error;

/// Command names, in help order.
pub const COMMANDS: &[&str] = &[
    "init",
    "demographics",
    "questionnaire",
    "baseline",
    "proceed",
    "select",
    "answer",
    "ink",
    "press",
    "regulate",
    "stop",
    "post",
    "reset",
    "status",
    "results",
    "help",
    "quit",
];

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Arm the acquisition service
    Init,
    /// Record age and (optionally) sex
    Demographics {
        /// Age in years
        age: u16,
        /// Sex, when given
        sex: Option<Sex>,
    },
    /// Submit the pre-session questionnaire
    Questionnaire(QuestionnaireResponses),
    /// Start the baseline capture
    Baseline(Option<u32>),
    /// Leave the baseline
    Proceed,
    /// Start or switch game
    Select(GameKind),
    /// Arithmetic answer
    Answer(i64),
    /// Stroop ink colour
    Ink(Color),
    /// Sequence button press
    Press(Color),
    /// Begin the breathing block
    Regulate,
    /// End the recording
    Stop,
    /// Submit the post-session questionnaire
    Post(QuestionnaireResponses),
    /// Reset everything
    Reset,
    /// Print the status snapshot
    Status,
    /// Print the results summary
    Results,
    /// List commands
    Help,
    /// Leave the console
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Unbalanced quotes or a trailing escape
    #[error("could not split the line: unbalanced quotes")]
    Tokenize,

    /// Not a known command
    #[error("unknown command '{command}'{}", suggestion.as_ref().map_or_else(String::new, |s| format!(", did you mean '{s}'?")))]
    Unknown {
        /// What was typed
        command: String,
        /// Closest known command
        suggestion: Option<String>,
    },

    /// A required argument is missing
    #[error("{command}: missing {argument}")]
    MissingArgument {
        /// Command name
        command: &'static str,
        /// Argument name
        argument: &'static str,
    },

    /// An argument did not parse
    #[error("{command}: invalid {argument} '{value}'")]
    InvalidArgument {
        /// Command name
        command: &'static str,
        /// Argument name
        argument: &'static str,
        /// What was given
        value: String,
    },

    /// Too many arguments
    #[error("{command}: unexpected argument '{value}'")]
    UnexpectedArgument {
        /// Command name
        command: &'static str,
        /// First extra argument
        value: String,
    },
}

/// Closest command name within an edit distance of 2.
#[must_use]
pub fn suggest_command(input: &str) -> Option<String> {
    COMMANDS
        .iter()
        .map(|name| (*name, strsim::damerau_levenshtein(input, name)))
        .filter(|(_, dist)| *dist <= 2)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}

impl OperatorCommand {
    /// Parses one console line. `Ok(None)` for blank and comment lines.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] describing the first problem.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        let tokens = shlex::split(trimmed).ok_or(CommandError::Tokenize)?;
        let Some((head, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let mut args = Args {
            command: "",
            rest: args.iter(),
        };

        let command = match head.to_ascii_lowercase().as_str() {
            "init" => args.done("init", Self::Init)?,
            "demographics" => {
                args.command = "demographics";
                let age = args.required("age")?;
                let sex = args.optional("sex")?;
                args.done("demographics", Self::Demographics { age, sex })?
            }
            "questionnaire" => Self::Questionnaire(responses("questionnaire", args.rest)?),
            "baseline" => {
                args.command = "baseline";
                let secs = args.optional("seconds")?;
                args.done("baseline", Self::Baseline(secs))?
            }
            "proceed" => args.done("proceed", Self::Proceed)?,
            "select" => {
                args.command = "select";
                let game = args.required("game")?;
                args.done("select", Self::Select(game))?
            }
            "answer" => {
                args.command = "answer";
                let n = args.required("number")?;
                args.done("answer", Self::Answer(n))?
            }
            "ink" => {
                args.command = "ink";
                let color = args.required("colour")?;
                args.done("ink", Self::Ink(color))?
            }
            "press" => {
                args.command = "press";
                let color = args.required("colour")?;
                args.done("press", Self::Press(color))?
            }
            "regulate" => args.done("regulate", Self::Regulate)?,
            "stop" => args.done("stop", Self::Stop)?,
            "post" => Self::Post(responses("post", args.rest)?),
            "reset" => args.done("reset", Self::Reset)?,
            "status" => args.done("status", Self::Status)?,
            "results" => args.done("results", Self::Results)?,
            "help" | "?" => Self::Help,
            "quit" | "exit" => args.done("quit", Self::Quit)?,
            other => {
                return Err(CommandError::Unknown {
                    command: other.to_string(),
                    suggestion: suggest_command(other),
                });
            }
        };
        Ok(Some(command))
    }
}

struct Args<'a> {
    command: &'static str,
    rest: std::slice::Iter<'a, String>,
}

impl Args<'_> {
    fn optional<T: FromStr>(&mut self, argument: &'static str) -> Result<Option<T>, CommandError> {
        self.rest
            .next()
            .map(|value| {
                value.parse().map_err(|_| CommandError::InvalidArgument {
                    command: self.command,
                    argument,
                    value: value.clone(),
                })
            })
            .transpose()
    }

    fn required<T: FromStr>(&mut self, argument: &'static str) -> Result<T, CommandError> {
        self.optional(argument)?.ok_or(CommandError::MissingArgument {
            command: self.command,
            argument,
        })
    }

    fn done(
        mut self,
        command: &'static str,
        parsed: OperatorCommand,
    ) -> Result<OperatorCommand, CommandError> {
        match self.rest.next() {
            Some(extra) => Err(CommandError::UnexpectedArgument {
                command,
                value: extra.clone(),
            }),
            None => Ok(parsed),
        }
    }
}

/// Positional scores (`2 1 3`) fill items from 1; `qN=S` sets one item.
/// Unanswered items stay missing.
fn responses<'a>(
    command: &'static str,
    tokens: impl Iterator<Item = &'a String>,
) -> Result<QuestionnaireResponses, CommandError> {
    let mut out = QuestionnaireResponses::new();
    let invalid = |value: &String| CommandError::InvalidArgument {
        command,
        argument: "answer",
        value: value.clone(),
    };
    let mut position = 0u8;
    for token in tokens {
        if let Some((item, score)) = token.split_once('=') {
            let item = item.trim_start_matches(['q', 'Q']);
            let item: u8 = item.parse().map_err(|_| invalid(token))?;
            out.set(item, score.parse().map_err(|_| invalid(token))?);
        } else {
            position = position.checked_add(1).ok_or_else(|| invalid(token))?;
            out.set(position, token.parse().map_err(|_| invalid(token))?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> OperatorCommand {
        OperatorCommand::parse(line).unwrap().unwrap()
    }

    #[test]
    fn blank_and_comment_lines() {
        assert_eq!(OperatorCommand::parse("   ").unwrap(), None);
        assert_eq!(OperatorCommand::parse("# setup").unwrap(), None);
    }

    #[test]
    fn demographics_with_and_without_sex() {
        assert_eq!(
            parse("demographics 34 femenino"),
            OperatorCommand::Demographics {
                age: 34,
                sex: Some(Sex::Female)
            }
        );
        assert_eq!(
            parse("demographics 34"),
            OperatorCommand::Demographics { age: 34, sex: None }
        );
        assert!(matches!(
            OperatorCommand::parse("demographics"),
            Err(CommandError::MissingArgument {
                argument: "age",
                ..
            })
        ));
    }

    #[test]
    fn questionnaire_positional_and_keyed() {
        let OperatorCommand::Questionnaire(r) = parse("questionnaire 2 1 3 1 0 1 2") else {
            panic!("expected questionnaire");
        };
        assert_eq!(r, QuestionnaireResponses::from_scores([2, 1, 3, 1, 0, 1, 2]));

        let OperatorCommand::Post(r) = parse("post q1=2 q7=4") else {
            panic!("expected post");
        };
        assert_eq!(r.get(7), Some(4));
        assert_eq!(r.first_missing(), Some(2));
    }

    #[test]
    fn game_commands() {
        assert_eq!(parse("select stroop"), OperatorCommand::Select(GameKind::Stroop));
        assert_eq!(parse("select memory"), OperatorCommand::Select(GameKind::SequenceRecall));
        assert_eq!(parse("answer -3"), OperatorCommand::Answer(-3));
        assert_eq!(parse("ink azul"), OperatorCommand::Ink(Color::Blue));
        assert_eq!(parse("PRESS red"), OperatorCommand::Press(Color::Red));
        assert_eq!(parse("baseline"), OperatorCommand::Baseline(None));
        assert_eq!(parse("baseline 15"), OperatorCommand::Baseline(Some(15)));
    }

    #[test]
    fn quoting_is_respected() {
        assert!(matches!(
            OperatorCommand::parse("ink \"dark red\""),
            Err(CommandError::InvalidArgument { value, .. }) if value == "dark red"
        ));
        assert_eq!(
            OperatorCommand::parse("ink \"red"),
            Err(CommandError::Tokenize)
        );
    }

    #[test]
    fn extra_arguments_rejected() {
        assert!(matches!(
            OperatorCommand::parse("stop now"),
            Err(CommandError::UnexpectedArgument { command: "stop", .. })
        ));
    }

    #[test]
    fn unknown_command_suggests() {
        let err = OperatorCommand::parse("regualte").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown command 'regualte', did you mean 'regulate'?"
        );
        assert_eq!(suggest_command("xyzzy-plugh"), None);
    }
}
