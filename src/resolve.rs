//! Operator decisions for ambiguous reconciliation states.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, Write};

use crate::error::{Error, Result};

/// A decision the reconciler cannot take on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Question {
    /// Table exists under the declared name with another reference.
    TableConflict { table: String },
    /// Column exists under the declared name with another reference.
    ColumnConflict { table: String, column: String },
    /// Live table absent from every schema.
    OrphanTable { table: String },
    /// Live column absent from its entity.
    OrphanColumn { table: String, column: String },
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Question::TableConflict { table } => write!(
                f,
                "WARNING : The table \"{}\" already exists, but references don't match.\n\
                 Do you want to replace the table, update its structure, or cancel the whole update [replace|update|cancel] ?",
                table
            ),
            Question::ColumnConflict { table, column } => write!(
                f,
                "WARNING : The column \"{}\" already exists in the table \"{}\", but references don't match.\n\
                 Do you want to replace the column, update its configuration, or cancel the whole update [replace|update|cancel] ?",
                column, table
            ),
            Question::OrphanTable { table } => write!(
                f,
                "A \"{}\" table exists in database but is missing from your schema. Do you want to remove it ? [Y/n] :",
                table
            ),
            Question::OrphanColumn { table, column } => write!(
                f,
                "A \"{}\" column exists in table \"{}\" but is missing from your schema. Do you want to remove it ? [Y/n] :",
                column, table
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAnswer {
    Replace,
    Update,
    Cancel,
}

impl ConflictAnswer {
    /// Only the exact lowercase tokens are accepted.
    pub fn parse(answer: &str) -> Option<Self> {
        match answer.trim() {
            "replace" => Some(ConflictAnswer::Replace),
            "update" => Some(ConflictAnswer::Update),
            "cancel" => Some(ConflictAnswer::Cancel),
            _ => None,
        }
    }
}

/// Drops only happen on an explicit `Y`.
pub fn is_drop_confirmed(answer: &str) -> bool {
    answer.trim() == "Y"
}

pub trait Resolver {
    /// Answer a table or column conflict.
    fn resolve_conflict(&mut self, question: &Question) -> Result<ConflictAnswer>;

    /// Whether an orphan table or column may be dropped.
    fn confirm_drop(&mut self, question: &Question) -> Result<bool>;
}

/// Line-based prompt, blocking on every question.
pub struct ConsoleResolver<R, W> {
    input: R,
    output: W,
}

impl ConsoleResolver<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        ConsoleResolver::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        ConsoleResolver { input, output }
    }

    fn ask(&mut self, question: &Question) -> Result<Option<String>> {
        write!(self.output, "{} ", question)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> Resolver for ConsoleResolver<R, W> {
    fn resolve_conflict(&mut self, question: &Question) -> Result<ConflictAnswer> {
        loop {
            // end of input cannot produce a valid answer
            let Some(answer) = self.ask(question)? else {
                return Err(Error::Cancelled);
            };
            if let Some(parsed) = ConflictAnswer::parse(&answer) {
                return Ok(parsed);
            }
        }
    }

    fn confirm_drop(&mut self, question: &Question) -> Result<bool> {
        Ok(self
            .ask(question)?
            .map(|a| is_drop_confirmed(&a))
            .unwrap_or(false))
    }
}

/// Replays canned answers and records every question asked.
#[derive(Debug, Default)]
pub struct ScriptedResolver {
    answers: VecDeque<String>,
    pub asked: Vec<Question>,
}

impl ScriptedResolver {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedResolver {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }
}

impl Resolver for ScriptedResolver {
    fn resolve_conflict(&mut self, question: &Question) -> Result<ConflictAnswer> {
        self.asked.push(question.clone());
        while let Some(answer) = self.answers.pop_front() {
            if let Some(parsed) = ConflictAnswer::parse(&answer) {
                return Ok(parsed);
            }
        }
        Err(Error::Cancelled)
    }

    fn confirm_drop(&mut self, question: &Question) -> Result<bool> {
        self.asked.push(question.clone());
        Ok(self
            .answers
            .pop_front()
            .map(|a| is_drop_confirmed(&a))
            .unwrap_or(false))
    }
}
