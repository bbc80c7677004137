//! Frame pattern language.
//!
//! Patterns are regular expressions with a few shorthands:
//! - `%` matches any run of word characters
//! - `*` matches anything
//! - `{` `}` delimit a capture group
//! - every other character is literal (except `^`, `$` and `|`)
//!
//! A pattern that starts with a word character is anchored to a word
//! boundary, so `Foo*` matches `Foo1` but not `MyFoo1`.
//!
//! Group specs map matching frames onto a group name:
//! - `pattern->name` collapses every matching frame into `name`
//! - `pattern=>name` keeps the frame that entered the group visible as
//!   `name <<frame>>` and folds the group's internal frames into it
//!
//! Names may refer to captures with `$1`..`$9` and to the whole match with `$&`.

use crate::utils::config::PATTERN_LIST_SEPARATOR;
use crate::utils::error::FilterError;
use regex::Regex;

/// Translate a frame pattern into regex syntax
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    if pattern.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        out.push_str(r"\b");
    }
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(r"\w*"),
            '*' => out.push_str(".*"),
            '{' => out.push('('),
            '}' => out.push(')'),
            '^' | '$' | '|' => out.push(c),
            _ => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
    }
    out
}

/// Compile one frame pattern
pub fn compile_pattern(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(&wildcard_to_regex(pattern)).map_err(|source| FilterError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Split a `;`-separated pattern list, skipping empty entries.
fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(PATTERN_LIST_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

/// A compiled `;`-separated list of frame patterns
#[derive(Debug, Clone, Default)]
pub struct PatternList {
    patterns: Vec<Regex>,
}

impl PatternList {
    pub fn parse(list: &str) -> Result<Self, FilterError> {
        let patterns = split_list(list)
            .map(compile_pattern)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// True if any pattern matches somewhere in `name`
    pub fn is_match(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

/// How matched frames are presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// `->`: the group replaces every member, boundary included
    Collapse,
    /// `=>`: the entry frame stays visible and internal members fold into it
    Entry,
}

/// One compiled group spec
#[derive(Debug, Clone)]
pub struct GroupPattern {
    pattern: Regex,
    replacement: String,
    kind: GroupKind,
}

impl GroupPattern {
    /// Parse `pattern->name` or `pattern=>name`.
    ///
    /// Whichever arrow appears first splits the spec.
    pub fn parse(spec: &str) -> Result<Self, FilterError> {
        let collapse = spec.find("->");
        let entry = spec.find("=>");
        let (at, kind) = match (collapse, entry) {
            (Some(c), Some(e)) if e < c => (e, GroupKind::Entry),
            (Some(c), _) => (c, GroupKind::Collapse),
            (None, Some(e)) => (e, GroupKind::Entry),
            (None, None) => return Err(FilterError::InvalidGroupSpec(spec.to_string())),
        };

        let pattern = spec[..at].trim();
        let name = spec[at + 2..].trim();
        if pattern.is_empty() || name.is_empty() {
            return Err(FilterError::InvalidGroupSpec(spec.to_string()));
        }

        Ok(Self {
            pattern: compile_pattern(pattern)?,
            replacement: translate_replacement(name),
            kind,
        })
    }

    /// Group name for `frame_name`, or `None` if the pattern does not match
    pub fn apply(&self, frame_name: &str) -> Option<String> {
        let captures = self.pattern.captures(frame_name)?;
        let mut name = String::new();
        captures.expand(&self.replacement, &mut name);
        Some(name)
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }
}

/// Parse a `;`-separated list of group specs
pub fn parse_group_list(list: &str) -> Result<Vec<GroupPattern>, FilterError> {
    split_list(list).map(GroupPattern::parse).collect()
}

/// Rewrite `$N` and `$&` into the `${N}` form the regex crate expands.
///
/// Any other `$` is kept literal.
fn translate_replacement(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    chars.next();
                }
                out.push_str(&format!("${{{digits}}}"));
            }
            _ => out.push_str("$$"),
        }
    }
    out
}
