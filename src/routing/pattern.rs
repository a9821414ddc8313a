//! Path pattern compilation and matching.
//!
//! # Responsibilities
//! - Compile route path templates into anchored regular expressions
//! - Match a pathname from the left, reporting the unconsumed remainder
//! - Extract named, optional and splat parameters
//! - Format a pathname back from a pattern and a parameter map
//!
//! # Design Decisions
//! - Static text is case-sensitive
//! - Patterns compile once, when the route is built, never on the match path
//! - Values are percent-decoded after extraction, never before matching literals
//! - A remainder always starts at a segment boundary and keeps its leading `/`

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Errors raised while compiling or formatting a pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    /// An opening or closing parenthesis has no partner.
    #[error("unbalanced parentheses in pattern `{pattern}`")]
    UnbalancedParens { pattern: String },

    /// A `:` was not followed by a valid identifier.
    #[error("invalid parameter name at position {position} in pattern `{pattern}`")]
    InvalidParamName { pattern: String, position: usize },

    /// The generated expression was rejected by the regex engine.
    #[error("pattern `{pattern}` did not compile: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A required parameter was absent while formatting.
    #[error("missing parameter `{name}` for pattern `{pattern}`")]
    MissingParam { pattern: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Param { name: String, optional: bool },
    Splat { name: String, greedy: bool },
    GroupOpen,
    GroupClose,
}

/// Result of matching a pathname against a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Unconsumed part of the pathname (empty, or starting with `/`).
    pub remaining: String,
    /// Captured values in pattern order; `None` for an absent optional capture.
    pub params: Vec<(String, Option<String>)>,
}

impl PatternMatch {
    /// True when the whole pathname was consumed.
    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// A compiled route path template.
#[derive(Clone)]
pub struct PathPattern {
    source: String,
    tokens: Vec<Token>,
    param_names: Vec<String>,
    regex: Regex,
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPattern")
            .field("source", &self.source)
            .field("param_names", &self.param_names)
            .finish()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl PathPattern {
    /// Compile a pattern such as `/users/:id`, `files/*` or `/archive(/:year)`.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let tokens = tokenize(pattern)?;
        let normalized = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            format!("/{}", pattern)
        };

        let mut regex_source = String::from("^");
        let mut pending = String::new();
        let mut param_names = Vec::new();

        // The implied leading slash is prepended as a literal.
        let mut all_tokens = Vec::with_capacity(tokens.len() + 1);
        if !pattern.starts_with('/') {
            all_tokens.push(Token::Literal("/".to_string()));
        }
        all_tokens.extend(tokens);

        for token in &all_tokens {
            match token {
                Token::Literal(text) => pending.push_str(text),
                Token::Param { name, optional } => {
                    if *optional && pending.ends_with('/') {
                        pending.pop();
                        regex_source.push_str(&regex::escape(&pending));
                        regex_source.push_str("(?:/([^/]+))?");
                    } else {
                        regex_source.push_str(&regex::escape(&pending));
                        regex_source.push_str(if *optional { "([^/]+)?" } else { "([^/]+)" });
                    }
                    pending.clear();
                    param_names.push(name.clone());
                }
                Token::Splat { name, greedy } => {
                    regex_source.push_str(&regex::escape(&pending));
                    pending.clear();
                    regex_source.push_str(if *greedy { "(.*)" } else { "(.*?)" });
                    param_names.push(name.clone());
                }
                Token::GroupOpen => {
                    regex_source.push_str(&regex::escape(&pending));
                    pending.clear();
                    regex_source.push_str("(?:");
                }
                Token::GroupClose => {
                    regex_source.push_str(&regex::escape(&pending));
                    pending.clear();
                    regex_source.push_str(")?");
                }
            }
        }
        regex_source.push_str(&regex::escape(&pending));

        if !normalized.ends_with('/') {
            regex_source.push_str("/?");
        }
        if matches!(all_tokens.last(), Some(Token::Splat { .. })) {
            regex_source.push('$');
        }

        let regex = Regex::new(&regex_source).map_err(|source| PatternError::Regex {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            source: pattern.to_string(),
            tokens: all_tokens,
            param_names,
            regex,
        })
    }

    /// The pattern text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parameter names in order of appearance (splats included).
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// True for patterns anchored at the root (`/...`).
    pub fn is_absolute(&self) -> bool {
        self.source.starts_with('/')
    }

    /// True for bare wildcard patterns used as fallbacks (`*`, `/*`, `**`, `/**`).
    pub fn is_catch_all(&self) -> bool {
        matches!(
            self.tokens.as_slice(),
            [Token::Literal(slash), Token::Splat { .. }] if slash == "/"
        )
    }

    /// Match `pathname` from the left.
    ///
    /// Returns `None` when the pattern does not match or when the match stops
    /// in the middle of a segment.
    pub fn match_path(&self, pathname: &str, decode: bool) -> Option<PatternMatch> {
        let captures = self.regex.captures(pathname)?;
        let matched = captures.get(0)?.as_str();

        let rest = &pathname[matched.len()..];
        let remaining = if rest.is_empty() {
            String::new()
        } else {
            if !matched.ends_with('/') {
                return None;
            }
            format!("/{}", rest)
        };

        let params = self
            .param_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = captures.get(i + 1).map(|m| {
                    if decode {
                        decode_component(m.as_str())
                    } else {
                        m.as_str().to_string()
                    }
                });
                (name.clone(), value)
            })
            .collect();

        Some(PatternMatch { remaining, params })
    }

    /// Build a pathname from this pattern.
    ///
    /// Optional groups whose parameters are missing are dropped. A missing
    /// required parameter outside any group is an error.
    pub fn format(&self, params: &BTreeMap<String, String>) -> Result<String, PatternError> {
        // One frame per open group: (text, every param present).
        let mut frames: Vec<(String, bool)> = vec![(String::new(), true)];

        for token in &self.tokens {
            match token {
                Token::Literal(text) => top(&mut frames).0.push_str(text),
                Token::Param { name, optional } => match params.get(name) {
                    Some(value) => top(&mut frames).0.push_str(&urlencoding::encode(value)),
                    None if *optional => {
                        let frame = top(&mut frames);
                        if frame.0.ends_with('/') {
                            frame.0.pop();
                        }
                    }
                    None if frames.len() > 1 => top(&mut frames).1 = false,
                    None => {
                        return Err(PatternError::MissingParam {
                            pattern: self.source.clone(),
                            name: name.clone(),
                        })
                    }
                },
                Token::Splat { name, .. } => match params.get(name) {
                    Some(value) => {
                        let encoded: Vec<_> = value
                            .split('/')
                            .map(|segment| urlencoding::encode(segment).into_owned())
                            .collect();
                        top(&mut frames).0.push_str(&encoded.join("/"));
                    }
                    None if frames.len() > 1 => top(&mut frames).1 = false,
                    None => {
                        return Err(PatternError::MissingParam {
                            pattern: self.source.clone(),
                            name: name.clone(),
                        })
                    }
                },
                Token::GroupOpen => frames.push((String::new(), true)),
                Token::GroupClose => {
                    if let Some((text, complete)) = frames.pop() {
                        if complete {
                            top(&mut frames).0.push_str(&text);
                        }
                    }
                }
            }
        }

        let raw = frames.pop().map(|(text, _)| text).unwrap_or_default();
        Ok(collapse_slashes(&raw))
    }
}

fn top(frames: &mut Vec<(String, bool)>) -> &mut (String, bool) {
    if frames.is_empty() {
        frames.push((String::new(), true));
    }
    let last = frames.len() - 1;
    &mut frames[last]
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Percent-decode a captured value, keeping the raw text when it is not valid UTF-8.
pub fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn tokenize(pattern: &str) -> Result<Vec<Token>, PatternError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut depth = 0usize;
    let mut splats = 0usize;
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    let flush = |literal: &mut String, tokens: &mut Vec<Token>| {
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(literal)));
        }
    };

    while i < chars.len() {
        match chars[i] {
            ':' => {
                flush(&mut literal, &mut tokens);
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_ident_char(chars[end], end == start) {
                    end += 1;
                }
                if end == start {
                    return Err(PatternError::InvalidParamName {
                        pattern: pattern.to_string(),
                        position: i,
                    });
                }
                let name: String = chars[start..end].iter().collect();
                let optional = chars.get(end) == Some(&'?');
                tokens.push(Token::Param { name, optional });
                i = if optional { end + 1 } else { end };
            }
            '*' => {
                flush(&mut literal, &mut tokens);
                let greedy = chars.get(i + 1) == Some(&'*');
                splats += 1;
                let name = if splats == 1 {
                    "splat".to_string()
                } else {
                    format!("splat{}", splats)
                };
                tokens.push(Token::Splat { name, greedy });
                i += if greedy { 2 } else { 1 };
            }
            '(' => {
                flush(&mut literal, &mut tokens);
                depth += 1;
                tokens.push(Token::GroupOpen);
                i += 1;
            }
            ')' => {
                if depth == 0 {
                    return Err(PatternError::UnbalancedParens {
                        pattern: pattern.to_string(),
                    });
                }
                flush(&mut literal, &mut tokens);
                depth -= 1;
                tokens.push(Token::GroupClose);
                i += 1;
            }
            '\\' if matches!(chars.get(i + 1), Some('(') | Some(')')) => {
                literal.push(chars[i + 1]);
                i += 2;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if depth != 0 {
        return Err(PatternError::UnbalancedParens {
            pattern: pattern.to_string(),
        });
    }
    flush(&mut literal, &mut tokens);
    Ok(tokens)
}

fn is_ident_char(c: char, first: bool) -> bool {
    if first {
        c.is_ascii_alphabetic() || c == '_' || c == '$'
    } else {
        c.is_ascii_alphanumeric() || c == '_' || c == '$'
    }
}
