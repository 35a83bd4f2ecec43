//! Dual text/json rendering for action results.
//!
//! Results go to stdout; logs go to stderr. Text output is meant for
//! humans, json for other programs.

use clap::ValueEnum;

/// Output format selected with `-o/--output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print one action result in the selected format.
pub fn print_output(format: OutputFormat, text: &str, json: &serde_json::Value) {
    match format {
        OutputFormat::Text => {
            if !text.is_empty() {
                println!("{text}");
            }
        }
        OutputFormat::Json => match serde_json::to_string_pretty(json) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{json}"),
        },
    }
}
