//! Tokenizer for QubecTalk source (spec §2, §6).
//!
//! Whitespace-insensitive, case-sensitive keywords, `#` line comments.
//! A `|` character is a URL-compactness convention for spaces and is
//! replaced before lexing starts (spec §6).

use crate::error::{ParseError, SourceLocation};
use crate::parser::token::{Keyword, Symbol, Token};

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub location: SourceLocation,
}

pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let normalized = source.replace('|', " ");
    let mut tokens = Vec::new();
    let chars: Vec<char> = normalized.chars().collect();
    let mut i = 0usize;
    let mut line = 1usize;
    let mut col = 1usize;

    let advance = |i: &mut usize, line: &mut usize, col: &mut usize, chars: &[char]| {
        if chars[*i] == '\n' {
            *line += 1;
            *col = 1;
        } else {
            *col += 1;
        }
        *i += 1;
    };

    while i < chars.len() {
        let c = chars[i];

        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                advance(&mut i, &mut line, &mut col, &chars);
            }
            continue;
        }

        if c.is_whitespace() {
            advance(&mut i, &mut line, &mut col, &chars);
            continue;
        }

        let start_loc = SourceLocation { line, column: col };

        if c == '"' {
            advance(&mut i, &mut line, &mut col, &chars);
            let mut s = String::new();
            while i < chars.len() && chars[i] != '"' {
                s.push(chars[i]);
                advance(&mut i, &mut line, &mut col, &chars);
            }
            if i >= chars.len() {
                return Err(ParseError::UnexpectedEof {
                    context: "string literal".to_string(),
                });
            }
            advance(&mut i, &mut line, &mut col, &chars); // closing quote
            tokens.push(SpannedToken {
                token: Token::String(s),
                location: start_loc,
            });
            continue;
        }

        if c.is_ascii_digit() {
            let mut raw = String::new();
            while i < chars.len()
                && (chars[i].is_ascii_digit() || chars[i] == ',' || chars[i] == '.')
            {
                raw.push(chars[i]);
                advance(&mut i, &mut line, &mut col, &chars);
            }
            let normalized_number = normalize_number(&raw).map_err(|message| ParseError::Syntax {
                location: start_loc,
                token: raw.clone(),
                message,
            })?;
            tokens.push(SpannedToken {
                token: Token::Number(normalized_number),
                location: start_loc,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut word = String::new();
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                word.push(chars[i]);
                advance(&mut i, &mut line, &mut col, &chars);
            }
            // `%` can trail an identifier-looking percent sign (handled as
            // its own symbol below); words stand as keywords or bare idents.
            let token = match Keyword::from_word(&word) {
                Some(kw) => Token::Keyword(kw),
                None => Token::Ident(word),
            };
            tokens.push(SpannedToken {
                token,
                location: start_loc,
            });
            continue;
        }

        let two = if i + 1 < chars.len() {
            Some((chars[i], chars[i + 1]))
        } else {
            None
        };

        let (symbol, width) = match (c, two) {
            ('<', Some(('=', _))) => (Symbol::Lte, 2),
            ('>', Some(('=', _))) => (Symbol::Gte, 2),
            ('=', Some(('=', _))) => (Symbol::Eq, 2),
            ('!', Some(('=', _))) => (Symbol::Neq, 2),
            ('+', _) => (Symbol::Plus, 1),
            ('-', _) => (Symbol::Minus, 1),
            ('*', _) => (Symbol::Star, 1),
            ('/', _) => (Symbol::Slash, 1),
            ('^', _) => (Symbol::Caret, 1),
            ('(', _) => (Symbol::LParen, 1),
            (')', _) => (Symbol::RParen, 1),
            ('[', _) => (Symbol::LBracket, 1),
            (']', _) => (Symbol::RBracket, 1),
            (',', _) => (Symbol::Comma, 1),
            ('<', _) => (Symbol::Lt, 1),
            ('>', _) => (Symbol::Gt, 1),
            ('=', _) => (Symbol::Eq, 1),
            ('%', _) => (Symbol::Percent, 1),
            _ => {
                return Err(ParseError::Syntax {
                    location: start_loc,
                    token: c.to_string(),
                    message: format!("unrecognised character '{c}'"),
                })
            }
        };
        for _ in 0..width {
            advance(&mut i, &mut line, &mut col, &chars);
        }
        tokens.push(SpannedToken {
            token: Token::Symbol(symbol),
            location: start_loc,
        });
    }

    tokens.push(SpannedToken {
        token: Token::Eof,
        location: SourceLocation { line, column: col },
    });

    Ok(tokens)
}

/// Disambiguates `,`/`.` thousands-separators from the decimal point.
///
/// Heuristic (documented in DESIGN.md): if a separator character occurs
/// more than once in the literal it must be a thousands separator and is
/// stripped; a separator occurring exactly once is treated as the
/// decimal point. If both characters occur, the last one to appear is
/// the decimal point and every earlier occurrence (of either character)
/// is a thousands separator.
fn normalize_number(raw: &str) -> Result<String, String> {
    let comma_positions: Vec<usize> = raw.match_indices(',').map(|(i, _)| i).collect();
    let dot_positions: Vec<usize> = raw.match_indices('.').map(|(i, _)| i).collect();

    let decimal_pos: Option<usize> = match (comma_positions.last(), dot_positions.last()) {
        (Some(&c), Some(&d)) => Some(c.max(d)),
        (Some(&c), None) if comma_positions.len() == 1 => Some(c),
        (None, Some(&d)) if dot_positions.len() == 1 => Some(d),
        _ => None,
    };

    let mut out = String::with_capacity(raw.len());
    for (idx, ch) in raw.char_indices() {
        match ch {
            ',' | '.' => {
                if Some(idx) == decimal_pos {
                    out.push('.');
                }
                // else: thousands separator, dropped
            }
            _ => out.push(ch),
        }
    }
    if out.is_empty() {
        return Err("empty numeric literal".to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_us_style() {
        assert_eq!(normalize_number("1,234.5").unwrap(), "1234.5");
    }

    #[test]
    fn thousands_eu_style() {
        assert_eq!(normalize_number("1.234,5").unwrap(), "1234.5");
    }

    #[test]
    fn single_comma_is_decimal() {
        assert_eq!(normalize_number("1,5").unwrap(), "1.5");
    }

    #[test]
    fn repeated_thousands_only() {
        assert_eq!(normalize_number("1,234,567").unwrap(), "1234567");
    }

    #[test]
    fn pipe_becomes_space() {
        let tokens = tokenize("set|domestic|to|5|units").unwrap();
        assert!(tokens.len() > 1);
    }
}
