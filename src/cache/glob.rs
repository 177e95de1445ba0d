//! Redis-style glob matching for pattern invalidation on in-process stores.
//!
//! Supports `*`, `?`, `[...]` classes with ranges and `^` negation, and `\`
//! escapes, which is the subset `KeyPatterns` emits.

use super::error::CacheError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyOne,
    AnyMany,
    Class { negated: bool, items: Vec<ClassItem> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassItem {
    Char(char),
    Range(char, char),
}

impl Token {
    fn matches_char(&self, ch: char) -> bool {
        match self {
            Token::Literal(expected) => *expected == ch,
            Token::AnyOne => true,
            Token::AnyMany => false,
            Token::Class { negated, items } => {
                let hit = items.iter().any(|item| match item {
                    ClassItem::Char(expected) => *expected == ch,
                    ClassItem::Range(low, high) => (*low..=*high).contains(&ch),
                });
                hit != *negated
            }
        }
    }
}

/// A compiled key pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    tokens: Vec<Token>,
}

impl GlobPattern {
    pub fn compile(pattern: &str) -> Result<Self, CacheError> {
        let mut tokens = Vec::new();
        let mut chars = pattern.chars();

        while let Some(ch) = chars.next() {
            let token = match ch {
                '*' => {
                    if tokens.last() == Some(&Token::AnyMany) {
                        continue;
                    }
                    Token::AnyMany
                }
                '?' => Token::AnyOne,
                '\\' => match chars.next() {
                    Some(escaped) => Token::Literal(escaped),
                    None => {
                        return Err(CacheError::invalid_pattern(
                            pattern,
                            "trailing escape character",
                        ));
                    }
                },
                '[' => parse_class(pattern, &mut chars)?,
                other => Token::Literal(other),
            };
            tokens.push(token);
        }

        Ok(Self { tokens })
    }

    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let mut pattern_idx = 0;
        let mut text_idx = 0;
        // (pattern index after the last `*`, text index it currently absorbs up to)
        let mut backtrack: Option<(usize, usize)> = None;

        while text_idx < text.len() {
            if let Some(token) = self.tokens.get(pattern_idx) {
                if *token == Token::AnyMany {
                    backtrack = Some((pattern_idx + 1, text_idx));
                    pattern_idx += 1;
                    continue;
                }
                if token.matches_char(text[text_idx]) {
                    pattern_idx += 1;
                    text_idx += 1;
                    continue;
                }
            }

            match backtrack {
                Some((resume_pattern, absorbed)) => {
                    pattern_idx = resume_pattern;
                    text_idx = absorbed + 1;
                    backtrack = Some((resume_pattern, absorbed + 1));
                }
                None => return false,
            }
        }

        self.tokens[pattern_idx..]
            .iter()
            .all(|token| *token == Token::AnyMany)
    }
}

fn parse_class(pattern: &str, chars: &mut std::str::Chars<'_>) -> Result<Token, CacheError> {
    let mut negated = false;
    let mut items = Vec::new();
    let mut first = true;

    loop {
        let ch = chars
            .next()
            .ok_or_else(|| CacheError::invalid_pattern(pattern, "unterminated character class"))?;

        match ch {
            '^' if first && !negated => {
                negated = true;
                continue;
            }
            ']' => break,
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    CacheError::invalid_pattern(pattern, "trailing escape in character class")
                })?;
                items.push(ClassItem::Char(escaped));
            }
            '-' if matches!(items.last(), Some(ClassItem::Char(_))) => {
                let mut lookahead = chars.clone();
                match lookahead.next() {
                    Some(']') | None => items.push(ClassItem::Char('-')),
                    Some(high) => {
                        *chars = lookahead;
                        if let Some(ClassItem::Char(low)) = items.pop() {
                            let (low, high) = if low <= high { (low, high) } else { (high, low) };
                            items.push(ClassItem::Range(low, high));
                        }
                    }
                }
            }
            other => items.push(ClassItem::Char(other)),
        }
        first = false;
    }

    if items.is_empty() {
        return Err(CacheError::invalid_pattern(pattern, "empty character class"));
    }

    Ok(Token::Class { negated, items })
}
