//! Prefix dispatch tables for line parsers.
//!
//! A parser is a list of `(prefix, attribute, handler)` rules. For every line
//! the rule with the longest matching prefix wins and its handler receives the
//! rest of the line. Handlers for sub-blocks simply call into another table.

use log::trace;

use crate::error::ParseError;
use crate::stanza::lines::cut;

/// Handler applied to the remainder of a matched line.
pub type Handler<T> = fn(&mut T, &str) -> Result<(), ParseError>;

struct Rule<T> {
    prefix: &'static str,
    attr: &'static str,
    handler: Handler<T>,
}

/// Ordered set of parse rules for one model type.
pub struct LineTable<T> {
    rules: Vec<Rule<T>>,
}

impl<T> Default for LineTable<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T> LineTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. `attr` names the model attribute the rule populates.
    pub fn rule(mut self, prefix: &'static str, attr: &'static str, handler: Handler<T>) -> Self {
        // Keep longest prefixes first; ties keep insertion order.
        let pos = self
            .rules
            .iter()
            .position(|r| r.prefix.len() < prefix.len())
            .unwrap_or(self.rules.len());
        self.rules.insert(
            pos,
            Rule {
                prefix,
                attr,
                handler,
            },
        );
        self
    }

    /// Apply one line. Lines no rule recognises are skipped.
    pub fn apply(&self, model: &mut T, line: &str) -> Result<bool, ParseError> {
        let line = line.trim();
        for rule in &self.rules {
            if let Some(rest) = cut(line, rule.prefix) {
                (rule.handler)(model, rest).map_err(|e| e.under(rule.attr))?;
                return Ok(true);
            }
        }
        trace!("skipping unrecognised line: {}", line);
        Ok(false)
    }

    /// Apply every line in order.
    pub fn apply_all<'a, I>(&self, model: &mut T, lines: I) -> Result<(), ParseError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for line in lines {
            self.apply(model, line)?;
        }
        Ok(())
    }

    /// Attribute a statement body belongs to, if any rule matches it.
    pub fn locate(&self, line: &str) -> Option<&'static str> {
        let line = line.trim();
        self.rules
            .iter()
            .find(|r| cut(line, r.prefix).is_some())
            .map(|r| r.attr)
    }
}
