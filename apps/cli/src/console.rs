//! Console checkpoint prompts.
//!
//! Shows the stage preview, then asks `(yes / no / edit)`. Anything else
//! re-prompts. An edit is read line by line until a blank line or EOF.

use std::io::{BufRead, Write};

use indicatif::ProgressBar;
use readme_review_core::{Checkpoint, CheckpointHandler, Decision};
use tracing::warn;

/// A parsed answer to the checkpoint question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Yes,
    No,
    Edit,
}

fn parse_choice(answer: &str) -> Option<Choice> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" => Some(Choice::Yes),
        "no" | "n" => Some(Choice::No),
        "edit" => Some(Choice::Edit),
        _ => None,
    }
}

/// Checkpoint handler that prompts on a terminal (or any reader/writer).
pub(crate) struct ConsoleCheckpoints<R, W> {
    input: R,
    output: W,
    spinner: Option<ProgressBar>,
}

impl<R: BufRead, W: Write> ConsoleCheckpoints<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            spinner: None,
        }
    }

    /// Hide this spinner while prompting.
    pub(crate) fn with_spinner(mut self, spinner: ProgressBar) -> Self {
        self.spinner = Some(spinner);
        self
    }

    fn interact(&mut self, checkpoint: &Checkpoint<'_>) -> std::io::Result<Decision> {
        writeln!(self.output)?;
        writeln!(self.output, "{}", checkpoint.preview)?;
        writeln!(self.output)?;

        loop {
            writeln!(self.output, "{}", checkpoint.id.question())?;
            write!(self.output, "(yes / no / edit) > ")?;
            self.output.flush()?;

            let Some(answer) = self.read_line()? else {
                // Nobody left to confirm.
                return Ok(Decision::Abort);
            };

            match parse_choice(&answer) {
                Some(Choice::Yes) => return Ok(Decision::Proceed),
                Some(Choice::No) => return Ok(Decision::Abort),
                Some(Choice::Edit) => return self.read_edit(checkpoint).map(Decision::Edit),
                None => writeln!(self.output, "Please answer yes, no, or edit.")?,
            }
        }
    }

    fn read_edit(&mut self, checkpoint: &Checkpoint<'_>) -> std::io::Result<String> {
        writeln!(self.output, "{}", checkpoint.id.edit_instruction())?;
        writeln!(self.output, "(finish with an empty line)")?;
        self.output.flush()?;

        let mut lines = Vec::new();
        while let Some(line) = self.read_line()? {
            if line.trim().is_empty() {
                break;
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }

    /// Next line without its terminator; `None` at EOF.
    fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut buf = String::new();
        if self.input.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(buf.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl<R: BufRead, W: Write> CheckpointHandler for ConsoleCheckpoints<R, W> {
    fn decide(&mut self, checkpoint: &Checkpoint<'_>) -> Decision {
        let spinner = self.spinner.clone();
        let result = match spinner {
            Some(spinner) => spinner.suspend(|| self.interact(checkpoint)),
            None => self.interact(checkpoint),
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "console prompt failed, stopping");
            Decision::Abort
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use readme_review_core::{CheckpointId, PipelineState};

    fn decide(input: &str, id: CheckpointId) -> (Decision, String) {
        let state = PipelineState::new();
        let checkpoint = Checkpoint {
            id,
            preview: "Summary: a widget tool".into(),
            state: &state,
        };
        let mut out = Vec::new();
        let decision = {
            let mut console = ConsoleCheckpoints::new(Cursor::new(input.as_bytes()), &mut out);
            console.decide(&checkpoint)
        };
        (decision, String::from_utf8(out).unwrap())
    }

    #[test]
    fn parse_choice_accepts_short_and_long_forms() {
        assert_eq!(parse_choice("y"), Some(Choice::Yes));
        assert_eq!(parse_choice(" YES "), Some(Choice::Yes));
        assert_eq!(parse_choice("n"), Some(Choice::No));
        assert_eq!(parse_choice("no"), Some(Choice::No));
        assert_eq!(parse_choice("edit"), Some(Choice::Edit));
        assert_eq!(parse_choice("e"), None);
        assert_eq!(parse_choice(""), None);
    }

    #[test]
    fn yes_proceeds_and_shows_preview() {
        let (decision, out) = decide("yes\n", CheckpointId::AfterAnalyzer);
        assert_eq!(decision, Decision::Proceed);
        assert!(out.contains("Summary: a widget tool"));
        assert!(out.contains("Proceed to Tag Recommender?"));
        assert!(out.contains("(yes / no / edit) > "));
    }

    #[test]
    fn invalid_answer_reprompts() {
        let (decision, out) = decide("maybe\nn\n", CheckpointId::AfterTags);
        assert_eq!(decision, Decision::Abort);
        assert_eq!(out.matches("(yes / no / edit) > ").count(), 2);
        assert!(out.contains("Please answer yes, no, or edit."));
    }

    #[test]
    fn edit_reads_until_blank_line() {
        let input = "edit\nFirst line\nSecond line\n\nignored\n";
        let (decision, out) = decide(input, CheckpointId::AfterImprover);
        assert_eq!(decision, Decision::Edit("First line\nSecond line".into()));
        assert!(out.contains("Edit improved intro/title to use in final report:"));
    }

    #[test]
    fn whitespace_only_line_ends_edit() {
        let input = "edit\nKept line\n   \t\nnot part of the edit\n";
        let (decision, _) = decide(input, CheckpointId::AfterTags);
        assert_eq!(decision, Decision::Edit("Kept line".into()));
    }

    #[test]
    fn edit_stops_at_eof() {
        let (decision, _) = decide("edit\nOnly line", CheckpointId::AfterAnalyzer);
        assert_eq!(decision, Decision::Edit("Only line".into()));
    }

    #[test]
    fn eof_at_question_aborts() {
        let (decision, _) = decide("", CheckpointId::AfterAnalyzer);
        assert_eq!(decision, Decision::Abort);
    }
}
