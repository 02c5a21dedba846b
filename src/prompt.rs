//! Interactive terminal prompts.

use crate::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password};

pub(crate) fn prompt(prompt: &str) -> Result<String> {
    Ok(Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact_text()?)
}

pub(crate) fn prompt_secret(prompt: &str) -> Result<String> {
    Ok(Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact()?)
}

/// Asks a yes/no question that defaults to no.
pub(crate) fn prompt_yes_no(prompt: &str) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Returns true without asking when `yes` was given on the command line.
pub(crate) fn confirm(yes: bool, question: &str) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    prompt_yes_no(question)
}
