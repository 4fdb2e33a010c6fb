use crate::core::Session;
use serde_json::json;

/// Key raw log lines are wrapped under.
pub const RAW_LINE_KEY: &str = "log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// The file already holds one JSON record per line.
    Records,
    /// Unstructured text: every line becomes `{"log": line}`.
    RawLines,
}

/// Converts imported file text into record input text.
pub fn import_input(text: &str, mode: ImportMode) -> String {
    match mode {
        ImportMode::Records => text.to_string(),
        ImportMode::RawLines => wrap_raw_lines(text),
    }
}

pub fn wrap_raw_lines(text: &str) -> String {
    text.lines()
        .map(|line| json!({ RAW_LINE_KEY: line }).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Returns a copy of `session` with its input replaced.
pub fn with_input(session: &Session, text: &str, mode: ImportMode) -> Session {
    Session::new(import_input(text, mode), session.filter.clone())
}

/// Returns a copy of `session` with its filter replaced verbatim.
pub fn with_filter(session: &Session, text: &str) -> Session {
    Session::new(session.input.clone(), text)
}
