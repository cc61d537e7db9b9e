use async_trait::async_trait;
use colored::Colorize;
use devtrack_agent::NotificationSink;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// Prints notifications and asks confirmations on the terminal.
pub struct TerminalNotifier;

#[async_trait]
impl NotificationSink for TerminalNotifier {
    fn info(&self, text: &str) {
        println!("{} {}", "●".green(), text);
    }

    fn error(&self, text: &str) {
        eprintln!("{} {}", "✗".red().bold(), text.red());
    }

    async fn confirm(&self, text: &str) -> bool {
        if !std::io::stdin().is_terminal() {
            return false;
        }
        let prompt = text.to_string();
        tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(prompt)
                .default(true)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}

/// Spinner shown while a commit runs; silent when stdout is not a terminal.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        if !std::io::stdout().is_terminal() {
            return Self { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar: Some(bar) }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
