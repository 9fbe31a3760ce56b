//! Yes/no questions to the operator.

use std::io::{self, BufRead, Write};

/// Asks the operator a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Only a case-insensitive `y` counts as yes.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Reads answers from a line-oriented input, writing the prompt to `out` first.
pub struct LinePrompt<R, W> {
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self { input, out }
    }
}

impl LinePrompt<io::StdinLock<'static>, Box<dyn Write>> {
    /// Answers from stdin. Questions go to stderr when stdout is reserved for JSON.
    pub fn terminal(json: bool) -> Self {
        let out: Box<dyn Write> = if json {
            Box::new(io::stderr())
        } else {
            Box::new(io::stdout())
        };
        Self::new(io::stdin().lock(), out)
    }
}

impl<R: BufRead, W: Write> Confirm for LinePrompt<R, W> {
    fn confirm(&mut self, prompt: &str) -> bool {
        let _ = write!(self.out, "{prompt} (Y/N): ");
        let _ = self.out.flush();

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            // EOF or a read error is a "no".
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&answer),
        }
    }
}

/// Replays canned answers and remembers which prompts were shown.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct ScriptedConfirm {
    answers: std::collections::VecDeque<bool>,
    pub asked: Vec<String>,
}

#[cfg(test)]
impl ScriptedConfirm {
    pub fn answers(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            asked: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Confirm for ScriptedConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        self.asked.push(prompt.to_string());
        // Running out of answers behaves like an operator who says no.
        self.answers.pop_front().unwrap_or(false)
    }
}
