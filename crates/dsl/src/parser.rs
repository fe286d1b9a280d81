use crate::error::{DslError, Result};
use std::fmt;

/// Parsed Nucleus expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Number(f64),
    Symbol(String),
    List(Vec<Expr>),
}

impl Expr {
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Head symbol of an application, e.g. `grep` for `(grep "x")`.
    pub fn head(&self) -> Option<&str> {
        match self {
            Self::List(items) => items.first().and_then(Expr::as_symbol),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Symbol(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Str(String),
    Atom(String),
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((pos, Token::Open));
            }
            ')' => {
                chars.next();
                tokens.push((pos, Token::Close));
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, 'n')) => text.push('\n'),
                            Some((_, 't')) => text.push('\t'),
                            Some((_, c @ ('"' | '\\'))) => text.push(c),
                            // regex escapes such as \w are kept intact
                            Some((_, other)) => {
                                text.push('\\');
                                text.push(other);
                            }
                            None => break,
                        },
                        other => text.push(other),
                    }
                }
                if !closed {
                    return Err(DslError::parse(pos, "unterminated string"));
                }
                tokens.push((pos, Token::Str(text)));
            }
            _ => {
                let mut atom = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == '"' {
                        break;
                    }
                    atom.push(c);
                    chars.next();
                }
                tokens.push((pos, Token::Atom(atom)));
            }
        }
    }

    Ok(tokens)
}

/// Deepest list nesting accepted from a command.
pub const MAX_DEPTH: usize = 64;

fn atom_to_expr(atom: String) -> Expr {
    let numeric_start = atom
        .strip_prefix('-')
        .unwrap_or(&atom)
        .starts_with(|c: char| c.is_ascii_digit());
    if numeric_start {
        if let Ok(n) = atom.parse::<f64>() {
            return Expr::Number(n);
        }
    }
    Expr::Symbol(atom)
}

/// Parse exactly one expression from `source`.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut iter = tokens.into_iter().peekable();
    let expr = parse_expr(&mut iter, source.len(), 0)?;
    if let Some((pos, _)) = iter.next() {
        return Err(DslError::parse(pos, "unexpected input after expression"));
    }
    Ok(expr)
}

fn parse_expr<I>(tokens: &mut std::iter::Peekable<I>, end: usize, depth: usize) -> Result<Expr>
where
    I: Iterator<Item = (usize, Token)>,
{
    let Some((pos, token)) = tokens.next() else {
        return Err(DslError::parse(end, "empty input"));
    };
    match token {
        Token::Str(s) => Ok(Expr::Str(s)),
        Token::Atom(a) => Ok(atom_to_expr(a)),
        Token::Close => Err(DslError::parse(pos, "unexpected ')'")),
        Token::Open => {
            if depth >= MAX_DEPTH {
                return Err(DslError::parse(pos, "expression nested too deeply"));
            }
            let mut items = Vec::new();
            loop {
                match tokens.peek() {
                    None => return Err(DslError::parse(pos, "unbalanced '('")),
                    Some((_, Token::Close)) => {
                        tokens.next();
                        return Ok(Expr::List(items));
                    }
                    Some(_) => items.push(parse_expr(tokens, end, depth + 1)?),
                }
            }
        }
    }
}
