//! Terminal output for the zoneqa commands
//!
//! Status lines (progress, skipped layers, errors) go to stderr. Answers,
//! citations and reports go to stdout so they can be piped.

use owo_colors::OwoColorize;
use std::fmt::Display;
use std::io::{self, Write};

pub struct Output {
    pub colored: bool,
}

impl Output {
    pub fn with_color() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// One stderr status line: a colored mark, or a bracketed tag without color.
    fn status(&self, mark: impl Display, tag: &str, message: &str) {
        if self.colored {
            eprintln!("  {} {}", mark, message);
        } else {
            eprintln!("  [{}] {}", tag, message);
        }
    }

    pub fn success(&self, message: &str) {
        self.status("✓".green().bold(), "OK", message);
    }

    pub fn warning(&self, message: &str) {
        self.status("⚠".yellow().bold(), "WARN", message);
    }

    pub fn error(&self, message: &str) {
        self.status("✗".red().bold(), "ERROR", message);
    }

    /// Progress of a multi-step command, e.g. `[2/3] Embedding units`.
    pub fn step(&self, step: u32, total: u32, message: &str) {
        let counter = format!("{}/{}", step, total);
        if self.colored {
            eprintln!("  {} {}", format!("[{}]", counter).dimmed(), message.bright_white());
        } else {
            eprintln!("  [{}] {}", counter, message);
        }
    }

    /// An artifact written to disk.
    pub fn created(&self, kind: &str, path: &str) {
        self.status("✓".green().bold(), "CREATED", &format!("{} {}", kind, path));
    }

    /// A map layer that was not queried or did not answer.
    pub fn skipped(&self, layer: &str, reason: &str) {
        self.status("○".yellow(), "SKIPPED", &format!("{} ({})", layer, reason));
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            eprintln!("\n  {}", message.dimmed().italic());
        } else {
            eprintln!("\n  [TIP] {}", message);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print an answer body
    pub fn answer(&self, text: &str) {
        println!("\n{}", text.trim_end());
    }

    /// Print one streamed fragment without a newline
    pub fn fragment(&self, text: &str) {
        print!("{}", text);
        io::stdout().flush().ok();
    }

    /// The articles an answer was grounded on; nothing when there are none.
    pub fn citations(&self, citations: &[String]) {
        if citations.is_empty() {
            return;
        }
        self.subheader("Fontes");
        for citation in citations {
            self.list_item(citation);
        }
    }

    pub fn newline(&self) {
        println!();
    }
}
