//! Grid cell grammar.
//!
//! A cell holds zero or more transitions for one (state, event) pair:
//!
//! - `` (empty) - no transition
//! - `TARGET` - unguarded transition to `TARGET`
//! - `EVAL/TARGET` - guarded by evaluator `EVAL`
//! - `TARGET/ACTION` - unguarded, runs action `ACTION`
//! - `EVAL/TARGET/ACTION` - guarded and runs an action
//! - `[..][..]` - several two- or three-token transitions, evaluated in order
//!
//! Whether a two-token transition is `EVAL/TARGET` or `TARGET/ACTION`
//! depends on the manifest, so parsing happens in two steps:
//! [`tokenize`] splits the text and [`classify`] assigns roles to tokens.

use crate::error::LoaderError;
use crate::manifest::Manifest;

/// Tokens of a single transition, one to three of them (two or three when bracketed).
pub type TokenGroup = Vec<String>;

/// A transition described by a cell, with component names still unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTransition {
    pub evaluator: Option<String>,
    pub target: String,
    pub action: Option<String>,
}

impl CellTransition {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            evaluator: None,
            target: target.into(),
            action: None,
        }
    }
}

/// Splits a cell into token groups, one per transition.
pub fn tokenize(cell: &str) -> Result<Vec<TokenGroup>, LoaderError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(Vec::new());
    }

    let opens = cell.matches('[').count();
    let closes = cell.matches(']').count();

    if opens == 0 && closes == 0 {
        return Ok(vec![split_tokens(cell, cell)?]);
    }
    if opens == 0 {
        return Err(LoaderError::TransitionMissingOpeningBrace {
            cell: cell.to_string(),
        });
    }
    if opens != closes {
        return Err(LoaderError::TransitionMissingBrace {
            cell: cell.to_string(),
        });
    }

    Scanner::new(cell).groups()
}

/// Assigns evaluator, target and action roles to a token group.
///
/// For two tokens the first is tried as an evaluator name before the
/// second is tried as an action name.
pub fn classify(tokens: &[String], manifest: &Manifest) -> Result<CellTransition, LoaderError> {
    match tokens {
        [target] => Ok(CellTransition::to(target.as_str())),
        [first, second] => {
            if manifest.has_evaluator(first) {
                Ok(CellTransition {
                    evaluator: Some(first.clone()),
                    target: second.clone(),
                    action: None,
                })
            } else if manifest.has_action(second) {
                Ok(CellTransition {
                    evaluator: None,
                    target: first.clone(),
                    action: Some(second.clone()),
                })
            } else {
                Err(LoaderError::UnresolvedTokens {
                    tokens: tokens.to_vec(),
                })
            }
        }
        [evaluator, target, action] => {
            if !manifest.has_evaluator(evaluator) {
                return Err(LoaderError::UnknownEvaluator {
                    name: evaluator.clone(),
                });
            }
            if !manifest.has_action(action) {
                return Err(LoaderError::UnknownAction {
                    name: action.clone(),
                });
            }
            Ok(CellTransition {
                evaluator: Some(evaluator.clone()),
                target: target.clone(),
                action: Some(action.clone()),
            })
        }
        _ => Err(LoaderError::MalformedTransition {
            cell: tokens.join("/"),
            reason: format!("expected 1 to 3 tokens, found {}", tokens.len()),
        }),
    }
}

/// Tokenizes and classifies a whole cell.
pub fn parse_cell(cell: &str, manifest: &Manifest) -> Result<Vec<CellTransition>, LoaderError> {
    tokenize(cell)?
        .iter()
        .map(|tokens| classify(tokens, manifest))
        .collect()
}

fn split_tokens(text: &str, cell: &str) -> Result<TokenGroup, LoaderError> {
    let tokens: Vec<String> = text.split('/').map(|t| t.trim().to_string()).collect();
    if tokens.iter().any(String::is_empty) {
        return Err(LoaderError::MalformedTransition {
            cell: cell.to_string(),
            reason: "empty token".to_string(),
        });
    }
    if tokens.len() > 3 {
        return Err(LoaderError::MalformedTransition {
            cell: cell.to_string(),
            reason: format!("expected 1 to 3 tokens, found {}", tokens.len()),
        });
    }
    Ok(tokens)
}

/// Walks a bracketed cell group by group.
struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn groups(&mut self) -> Result<Vec<TokenGroup>, LoaderError> {
        let mut groups = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek_char() {
                None => return Ok(groups),
                Some('[') => {
                    self.pos += 1;
                    groups.push(self.group()?);
                }
                Some(_) => return Err(self.malformed("text outside of brackets")),
            }
        }
    }

    fn group(&mut self) -> Result<TokenGroup, LoaderError> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            match c {
                ']' => {
                    let content = &self.input[start..self.pos];
                    self.pos += 1;
                    if content.trim().is_empty() {
                        return Err(self.malformed("empty brackets"));
                    }
                    let tokens = split_tokens(content, self.input)?;
                    if tokens.len() < 2 {
                        return Err(self.malformed("bracketed transition needs two or three tokens"));
                    }
                    return Ok(tokens);
                }
                '[' => return Err(self.malformed("nested brackets")),
                _ => self.pos += c.len_utf8(),
            }
        }
        Err(LoaderError::TransitionMissingBrace {
            cell: self.input.to_string(),
        })
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn malformed(&self, reason: &str) -> LoaderError {
        LoaderError::MalformedTransition {
            cell: self.input.to_string(),
            reason: reason.to_string(),
        }
    }
}
