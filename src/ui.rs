//! User interface utilities for Netviz
//!
//! Status line formatting, a spinner for the in-flight query, and prompts for query
//! fields that were not given on the command line.

use anyhow::Result;
use chrono::{DateTime, Local};
use console::style;
use dialoguer::{theme::ColorfulTheme, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use std::future::Future;
use std::io::{self, IsTerminal};
use std::time::Duration;

use crate::config::ClientConfig;

/// UI Theme to use consistently throughout the application
pub fn get_theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

/// Render metrics as `key: value` pairs, the way the status line shows them.
///
/// Pairs keep the order the service sent them in.
pub fn format_status(data: &Map<String, Value>) -> String {
    data.iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{}: {}", key, s),
            other => format!("{}: {}", key, other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Display a spinner while the query is in flight
pub async fn with_query_progress<F, T>(message: &str, operation: F) -> T
where
    F: Future<Output = T>,
{
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));

    let result = operation.await;

    pb.finish_and_clear();
    result
}

/// Print the status line of a finished query to stderr
pub fn report_success(
    metrics: &Map<String, Value>,
    elapsed: Duration,
    finished_at: DateTime<Local>,
) {
    let status = if metrics.is_empty() {
        "status: OK".to_string()
    } else {
        format_status(metrics)
    };

    eprintln!("{}", style(status).green());
    eprintln!(
        "{}",
        style(format!(
            "Finished at {} in {:.2}s",
            finished_at.format("%Y-%m-%d %H:%M:%S"),
            elapsed.as_secs_f64()
        ))
        .dim()
    );
}

/// Print a failed query to stderr
pub fn report_failure(error: &dyn std::fmt::Display) {
    eprintln!("{} {}", style("status: Query failed").red().bold(), style(error).dim());
}

/// Print the effective configuration without revealing the authorization value
pub fn display_config(config: &ClientConfig) {
    println!("{:<14} {}", style("server").bold(), config.server);
    let auth = if config.authorization.is_some() { "(set)" } else { "(none)" };
    println!("{:<14} {}", style("authorization").bold(), style(auth).dim());
    println!(
        "{:<14} {}",
        style("user agent").bold(),
        config.user_agent.as_deref().unwrap_or("(none)")
    );
    println!("{:<14} {}s", style("timeout").bold(), config.timeout_secs);
}

/// Use the given value, or prompt for it when running on a terminal
pub fn require_field(value: Option<String>, name: &str, prompt: &str) -> Result<String> {
    if let Some(v) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        return Ok(v);
    }

    if !io::stdin().is_terminal() {
        return Err(anyhow::anyhow!("--{} is required in non-interactive mode", name));
    }

    let input: String = Input::with_theme(&get_theme())
        .with_prompt(prompt)
        .interact_text()?;
    Ok(input.trim().to_string())
}

/// Prompt for an optional secret such as an Authorization header
pub fn prompt_secret(prompt: &str) -> Result<Option<String>> {
    if !io::stdin().is_terminal() {
        return Ok(None);
    }

    let secret = Password::with_theme(&get_theme())
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?;
    Ok(Some(secret.trim().to_string()).filter(|s| !s.is_empty()))
}
