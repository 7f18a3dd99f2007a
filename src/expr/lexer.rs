//! Tokenizer for the expression grammar.

use super::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Not,
    LParen,
    RParen,
    Comma,
}

/// A token together with its byte offset in the source, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ExprError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                i += 1;
                continue;
            }
            '(' => push(&mut tokens, Token::LParen, start, &mut i, 1),
            ')' => push(&mut tokens, Token::RParen, start, &mut i, 1),
            ',' => push(&mut tokens, Token::Comma, start, &mut i, 1),
            '+' => push(&mut tokens, Token::Plus, start, &mut i, 1),
            '-' => push(&mut tokens, Token::Minus, start, &mut i, 1),
            '*' => push(&mut tokens, Token::Star, start, &mut i, 1),
            '/' => push(&mut tokens, Token::Slash, start, &mut i, 1),
            '%' => push(&mut tokens, Token::Percent, start, &mut i, 1),
            '=' if bytes.get(i + 1) == Some(&b'=') => {
                push(&mut tokens, Token::EqEq, start, &mut i, 2)
            }
            '!' if bytes.get(i + 1) == Some(&b'=') => {
                push(&mut tokens, Token::NotEq, start, &mut i, 2)
            }
            '!' => push(&mut tokens, Token::Not, start, &mut i, 1),
            '<' if bytes.get(i + 1) == Some(&b'=') => {
                push(&mut tokens, Token::Le, start, &mut i, 2)
            }
            '<' => push(&mut tokens, Token::Lt, start, &mut i, 1),
            '>' if bytes.get(i + 1) == Some(&b'=') => {
                push(&mut tokens, Token::Ge, start, &mut i, 2)
            }
            '>' => push(&mut tokens, Token::Gt, start, &mut i, 1),
            '&' if bytes.get(i + 1) == Some(&b'&') => {
                push(&mut tokens, Token::AndAnd, start, &mut i, 2)
            }
            '|' if bytes.get(i + 1) == Some(&b'|') => {
                push(&mut tokens, Token::OrOr, start, &mut i, 2)
            }
            '"' | '\'' => {
                let (s, consumed) = lex_string(&input[i..], c, start)?;
                tokens.push(Spanned {
                    token: Token::Str(s),
                    offset: start,
                });
                i += consumed;
            }
            c if c.is_ascii_digit() => {
                let (n, consumed) = lex_number(&input[i..], start)?;
                tokens.push(Spanned {
                    token: Token::Number(n),
                    offset: start,
                });
                i += consumed;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let end = input[i..]
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                    .map(|off| i + off)
                    .unwrap_or(input.len());
                let word = &input[i..end];
                let token = match word {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word.to_string()),
                };
                tokens.push(Spanned {
                    token,
                    offset: start,
                });
                i = end;
            }
            other => {
                return Err(ExprError::Parse {
                    offset: start,
                    message: format!("unexpected character '{other}'"),
                });
            }
        }
    }

    Ok(tokens)
}

fn push(tokens: &mut Vec<Spanned>, token: Token, offset: usize, i: &mut usize, len: usize) {
    tokens.push(Spanned { token, offset });
    *i += len;
}

fn lex_string(rest: &str, quote: char, offset: usize) -> Result<(String, usize), ExprError> {
    let mut out = String::new();
    let mut chars = rest.char_indices().skip(1).peekable();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, '\'')) => out.push('\''),
                Some((_, '"')) => out.push('"'),
                Some((esc_idx, other)) => {
                    return Err(ExprError::Parse {
                        offset: offset + esc_idx,
                        message: format!("unknown escape '\\{other}'"),
                    });
                }
                None => break,
            },
            c if c == quote => return Ok((out, idx + c.len_utf8())),
            c => out.push(c),
        }
    }
    Err(ExprError::Parse {
        offset,
        message: "unterminated string literal".to_string(),
    })
}

fn lex_number(rest: &str, offset: usize) -> Result<(f64, usize), ExprError> {
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let literal = &rest[..end];
    literal
        .parse::<f64>()
        .map(|n| (n, end))
        .map_err(|_| ExprError::Parse {
            offset,
            message: format!("invalid number literal '{literal}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            toks("1 + 2 * 3"),
            vec![
                Token::Number(1.0),
                Token::Plus,
                Token::Number(2.0),
                Token::Star,
                Token::Number(3.0)
            ]
        );
        assert_eq!(
            toks("a >= 2 && !b"),
            vec![
                Token::Ident("a".into()),
                Token::Ge,
                Token::Number(2.0),
                Token::AndAnd,
                Token::Not,
                Token::Ident("b".into())
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(toks("\"a b\""), vec![Token::Str("a b".into())]);
        assert_eq!(toks("'it\\'s'"), vec![Token::Str("it's".into())]);
        assert_eq!(toks("\"line\\n\""), vec![Token::Str("line\n".into())]);
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("\"abc"),
            Err(ExprError::Parse { .. })
        ));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(toks("true false null"), vec![Token::True, Token::False, Token::Null]);
    }

    #[test]
    fn test_decimal_numbers() {
        assert_eq!(toks("3.14"), vec![Token::Number(3.14)]);
        assert!(tokenize("1.2.3").is_err());
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("a @ b").unwrap_err();
        assert!(err.to_string().contains("unexpected character"));
    }
}
