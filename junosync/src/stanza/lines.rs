//! Statement rendering and decoding helpers shared by every resource.
//!
//! Builders quote every free-form string value with [`quote`]; parsers undo it
//! with [`unquote`] and [`split_token`]. The device itself only quotes values
//! that need it (see [`render_token`]), so both forms must decode to the same
//! value.

use std::fmt;
use std::str::FromStr;

use crate::error::{ParseError, ParseErrorKind};

const SET: &str = "set ";

/// Wrap a value in double quotes, escaping `"` and `\`.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Whether the device would quote this token in its own output.
pub fn needs_quotes(token: &str) -> bool {
    token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | ';' | '{' | '}' | '#' | '|'))
}

/// Render a raw token the way the device displays it.
pub fn render_token(token: &str) -> String {
    if needs_quotes(token) {
        quote(token)
    } else {
        token.to_string()
    }
}

/// Decode a full value, removing surrounding quotes if present.
pub fn unquote(value: &str) -> Result<String, ParseError> {
    let value = value.trim();
    if !value.starts_with('"') {
        return Ok(value.to_string());
    }
    let (token, rest) = split_token(value)?;
    if !rest.is_empty() {
        // Quoted prefix followed by more text; keep it verbatim.
        return Ok(value.to_string());
    }
    Ok(token)
}

/// Split the first token off a line, honouring quotes.
///
/// Returns the decoded token and the trimmed remainder.
pub fn split_token(line: &str) -> Result<(String, &str), ParseError> {
    let line = line.trim_start();
    if let Some(quoted) = line.strip_prefix('"') {
        let mut token = String::new();
        let mut escaped = false;
        for (i, c) in quoted.char_indices() {
            if escaped {
                token.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                let rest = &quoted[i + 1..];
                return Ok((token, rest.trim_start()));
            } else {
                token.push(c);
            }
        }
        return Err(ParseError::new(ParseErrorKind::UnterminatedQuote {
            value: line.to_string(),
        }));
    }

    match line.find(char::is_whitespace) {
        Some(pos) => Ok((line[..pos].to_string(), line[pos..].trim_start())),
        None => Ok((line.to_string(), "")),
    }
}

/// Split a whole line into decoded tokens.
pub fn tokens(line: &str) -> Result<Vec<String>, ParseError> {
    let mut out = Vec::new();
    let mut rest = line.trim();
    while !rest.is_empty() {
        let (token, remainder) = split_token(rest)?;
        out.push(token);
        rest = remainder;
    }
    Ok(out)
}

/// Re-render a statement body with device quoting rules.
pub fn normalize(statement: &str) -> Result<String, ParseError> {
    Ok(tokens(statement)?
        .iter()
        .map(|t| render_token(t))
        .collect::<Vec<_>>()
        .join(" "))
}

/// Cut a literal prefix off a line on a token boundary.
///
/// `cut("disable", "disable")` and `cut("mtu 9000", "mtu")` match, but
/// `cut("disable-x", "disable")` does not.
pub fn cut<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// Decode an integer field.
pub fn decode_num<T: FromStr>(value: &str) -> Result<T, ParseError> {
    let value = value.trim();
    value.parse::<T>().map_err(|_| {
        ParseError::new(ParseErrorKind::InvalidNumber {
            value: value.to_string(),
        })
    })
}

/// Decode a field restricted to a fixed set of keywords.
pub fn decode_keyword(
    value: &str,
    allowed: &[&str],
    expected: &'static str,
) -> Result<String, ParseError> {
    let value = unquote(value)?;
    if allowed.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(ParseError::new(ParseErrorKind::InvalidValue {
            value,
            expected,
        }))
    }
}

/// Extract statement bodies from `| display set relative` output.
///
/// Drops blank lines, comments, `[edit]` banners and anything that is not a
/// `set` statement, and strips the leading `set `.
pub fn statement_lines(output: &str) -> Vec<&str> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix(SET))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Accumulates `set` statements under one stanza.
#[derive(Debug, Clone)]
pub struct SetLines {
    stanza: String,
    lines: Vec<String>,
}

impl SetLines {
    /// Start a statement list for the given stanza path.
    pub fn new(stanza: impl Into<String>) -> Self {
        Self {
            stanza: stanza.into(),
            lines: Vec::new(),
        }
    }

    pub fn stanza(&self) -> &str {
        &self.stanza
    }

    /// Add `set <stanza> <statement>`.
    pub fn push(&mut self, statement: impl fmt::Display) {
        self.lines.push(format!("{}{} {}", SET, self.stanza, statement));
    }

    /// Add a bare statement when the flag is on.
    pub fn flag(&mut self, enabled: bool, statement: &str) {
        if enabled {
            self.push(statement);
        }
    }

    /// Add `<leaf> "<value>"` when the value is set.
    pub fn text(&mut self, leaf: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.push(format_args!("{} {}", leaf, quote(value)));
        }
    }

    /// Add `<leaf> <value>` when the value is set.
    pub fn value<T: fmt::Display>(&mut self, leaf: &str, value: Option<T>) {
        if let Some(value) = value {
            self.push(format_args!("{} {}", leaf, value));
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// `delete <stanza>` statement.
pub fn delete_line(stanza: &str) -> String {
    format!("delete {}", stanza)
}

/// `show configuration <stanza> | display set relative` command.
pub fn show_relative(stanza: &str) -> String {
    format!("show configuration {} | display set relative", stanza)
}
