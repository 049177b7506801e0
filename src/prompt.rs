//! Operator prompts.
//!
//! Workflows ask questions through the [`Prompter`] trait. The terminal
//! implementation uses dialoguer; [`ScriptedPrompter`] answers from a fixed
//! list for tests. Invalid answers are handled by [`ask_until`], an explicit
//! loop: a recoverable error prints a diagnostic and asks again, anything
//! else ends the loop.

use std::collections::VecDeque;
use std::sync::Mutex;

use dialoguer::{Confirm, Input, Select};

use crate::error::{HerdpressError, Result};
use crate::registry::parse_selection;

pub trait Prompter {
    /// Free-text answer; an empty answer takes `default` when given.
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String>;

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Index of the chosen item.
    fn select(&self, prompt: &str, items: &[String]) -> Result<usize>;
}

fn prompt_err(e: dialoguer::Error) -> HerdpressError {
    HerdpressError::Io(std::io::Error::other(e))
}

/// Interactive prompts on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(prompt);
        match default {
            Some(default) => input = input.default(default.to_string()),
            None => input = input.allow_empty(true),
        }
        input.interact_text().map_err(prompt_err)
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(prompt_err)
    }

    fn select(&self, prompt: &str, items: &[String]) -> Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()
            .map_err(prompt_err)
    }
}

/// Answers prompts from a queue, recording every question asked.
///
/// Confirmations accept `y`/`yes`/`n`/`no`; selections take a 0-based index.
/// Running out of answers cancels the workflow.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt shown so far.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn next(&self, prompt: &str) -> Result<String> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(prompt.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .ok_or_else(|| HerdpressError::Cancelled(format!("no answer for '{}'", prompt)))
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        let answer = self.next(prompt)?;
        match default {
            Some(default) if answer.is_empty() => Ok(default.to_string()),
            _ => Ok(answer),
        }
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        let answer = self.next(prompt)?;
        match answer.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "y" | "yes" => Ok(true),
            "n" | "no" => Ok(false),
            other => Err(HerdpressError::validation(format!("'{}' is not yes or no", other))),
        }
    }

    fn select(&self, prompt: &str, items: &[String]) -> Result<usize> {
        let answer = self.next(prompt)?;
        answer
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|i| *i < items.len())
            .ok_or_else(|| HerdpressError::validation(format!("'{}' is not a menu entry", answer)))
    }
}

/// Ask until `parse` accepts the answer.
///
/// Recoverable errors (validation, name collision) print a diagnostic and
/// re-ask; any other error is returned. There is no recursion and no retry
/// cap: the operator decides when to stop.
pub fn ask_until<T, F>(
    prompter: &dyn Prompter,
    prompt: &str,
    default: Option<&str>,
    mut parse: F,
) -> Result<T>
where
    F: FnMut(&str) -> Result<T>,
{
    loop {
        let answer = prompter.input(prompt, default)?;
        match parse(answer.trim()) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_recoverable() => eprintln!("  ✗ {}", e),
            Err(e) => return Err(e),
        }
    }
}

/// Print a numbered list and ask for a selection string (`1-3,5`, `0` = all).
pub fn ask_selection(prompter: &dyn Prompter, title: &str, items: &[String]) -> Result<Vec<usize>> {
    println!("{}", title);
    for (i, item) in items.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, item);
    }
    ask_until(prompter, "Selection (e.g. 1-3,5; 0 for all)", None, |answer| {
        parse_selection(answer, items.len())
    })
}

/// Like [`ask_selection`], but an empty answer selects nothing.
pub fn ask_optional_selection(
    prompter: &dyn Prompter,
    title: &str,
    items: &[String],
) -> Result<Vec<usize>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    println!("{}", title);
    for (i, item) in items.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, item);
    }
    ask_until(
        prompter,
        "Selection (e.g. 1-3,5; 0 for all; empty for none)",
        Some(""),
        |answer| {
            if answer.is_empty() {
                Ok(Vec::new())
            } else {
                parse_selection(answer, items.len())
            }
        },
    )
}
