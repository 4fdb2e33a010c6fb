//! Fluent Bit configuration export.
//!
//! The filter is minified onto a single line so it fits the `code` property
//! of the classic configuration format.

use chrono::{DateTime, Utc};

/// Strips Lua comments and collapses whitespace outside string literals.
pub fn minify(script: &str) -> String {
    let chars: Vec<char> = script.chars().collect();
    let mut out = String::with_capacity(script.len());
    let mut pending_space = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '-' && chars.get(i + 1) == Some(&'-') {
            i = match long_bracket_level(&chars, i + 2) {
                Some(level) => skip_long_bracket(&chars, i + 2, level),
                None => skip_line(&chars, i + 2),
            };
            pending_space = true;
            continue;
        }

        if c.is_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }

        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;

        if c == '"' || c == '\'' {
            let end = skip_quoted(&chars, i, c);
            out.extend(&chars[i..end]);
            i = end;
        } else if let Some(level) = long_bracket_level(&chars, i) {
            let end = skip_long_bracket(&chars, i, level);
            out.extend(&chars[i..end]);
            i = end;
        } else {
            out.push(c);
            i += 1;
        }
    }

    out
}

/// `[[`, `[=[`, `[==[` ... opening at `start`; returns the number of `=`.
fn long_bracket_level(chars: &[char], start: usize) -> Option<usize> {
    if chars.get(start) != Some(&'[') {
        return None;
    }
    let mut level = 0;
    let mut i = start + 1;
    while chars.get(i) == Some(&'=') {
        level += 1;
        i += 1;
    }
    (chars.get(i) == Some(&'[')).then_some(level)
}

/// Index just past the closing bracket (or end of input if unterminated).
fn skip_long_bracket(chars: &[char], start: usize, level: usize) -> usize {
    let mut i = start + level + 2;
    while i < chars.len() {
        if chars[i] == ']'
            && (1..=level).all(|k| chars.get(i + k) == Some(&'='))
            && chars.get(i + level + 1) == Some(&']')
        {
            return i + level + 2;
        }
        i += 1;
    }
    chars.len()
}

fn skip_line(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    i
}

fn skip_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            '\n' => return i,
            _ => i += 1,
        }
    }
    chars.len()
}

/// Renders a Fluent Bit configuration running `script` as a Lua filter.
pub fn export_config(script: &str, entry_point: &str, generated_at: DateTime<Utc>) -> String {
    format!(
        r#"# Generated by filterlab at {generated_at}
[INPUT]
    name tail
    read_from_head true
    exit_on_eof true
    path data.log

[FILTER]
    Name    lua
    Match   *
    code    {code}
    call    {entry_point}

[OUTPUT]
    name stdout
"#,
        generated_at = generated_at.to_rfc3339(),
        code = minify(script),
        entry_point = entry_point,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LUA_FILTER: &str = r#"function cb_filter(tag, ts, record)
  -- pick the number out of the line
  local number_start, number_end = record.log:find('%d+')
  local num = tonumber(record.log:sub(number_start, number_end))

  --[[ FizzBuzz
       rules ]]
  if num % 15 == 0 then
    record.log = 'FizzBuzz'   -- both
  end
  return 1, ts, record
end"#;

    #[test]
    fn test_minify_strips_comments_and_whitespace() {
        assert_eq!(
            minify(LUA_FILTER),
            "function cb_filter(tag, ts, record) local number_start, number_end = record.log:find('%d+') \
             local num = tonumber(record.log:sub(number_start, number_end)) if num % 15 == 0 then \
             record.log = 'FizzBuzz' end return 1, ts, record end"
        );
    }

    #[test]
    fn test_minify_preserves_string_contents() {
        assert_eq!(
            minify("x = \"a  -- not a comment\"   y = 'it\\'s  here'"),
            "x = \"a  -- not a comment\" y = 'it\\'s  here'"
        );
        assert_eq!(minify("s = [[two\n  lines]]"), "s = [[two\n  lines]]");
        assert_eq!(minify("--[==[ block ]] still ]==] x = 1"), "x = 1");
    }

    #[test]
    fn test_minify_keeps_subtraction() {
        assert_eq!(minify("a = b - c\n"), "a = b - c");
    }

    #[test]
    fn test_export_config_embeds_minified_script() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let config = export_config(LUA_FILTER, "cb_filter", at);

        assert!(config.starts_with("# Generated by filterlab at 2024-05-01T12:00:00+00:00\n"));
        assert!(config.contains("[FILTER]\n    Name    lua\n    Match   *\n"));
        assert!(config.contains("    code    function cb_filter(tag, ts, record) local"));
        assert!(config.contains("    call    cb_filter\n"));
        let code_line = config.lines().find(|l| l.trim_start().starts_with("code")).unwrap();
        assert!(!code_line.contains("--"));
    }
}
