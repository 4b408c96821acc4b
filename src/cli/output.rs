//! Output formatting utilities for the CLI.

use serde::Serialize;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Three-character progress icon for a component's build status.
pub fn status_icon(status: &str) -> &'static str {
    match status {
        "contracted" => "[C]",
        "implemented" => "[I]",
        "tested" => "[+]",
        "failed" => "[X]",
        _ => "[ ]",
    }
}

/// Truncate a string to a maximum length, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_multibyte_is_safe() {
        let s = "budget café overrun again";
        let cut = truncate(s, 14);
        assert!(cut.ends_with("..."));
        assert!(cut.chars().count() <= 14);
    }

    #[test]
    fn test_status_icons() {
        assert_eq!(status_icon("pending"), "[ ]");
        assert_eq!(status_icon("tested"), "[+]");
        assert_eq!(status_icon("failed"), "[X]");
        assert_eq!(status_icon("unknown"), "[ ]");
    }
}
