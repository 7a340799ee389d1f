//! Tokenizer and Pratt parser for user formula expressions
//!
//! The grammar covers numeric literals, named variables and constants,
//! the binary operators `+ - * / ^` (with `^` right-associative),
//! unary minus, parentheses and function calls with comma-separated
//! arguments. No loops, no assignment, no external calls — evaluation
//! of the resulting tree is bounded by the tree size.

use crate::error::ParseError;

/// Nesting cap while parsing. Deeper input is rejected instead of
/// risking a parser stack overflow on adversarial expressions.
const MAX_PARSE_DEPTH: usize = 256;

/// Untyped syntax tree. Identifier resolution (declared variables,
/// constants, the function library) happens in the compile step, which
/// is why variables and calls carry their source position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Variable {
        name: String,
        position: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        position: usize,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

/// Parse an expression into a syntax tree.
pub(crate) fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        source_len: source.len(),
    };
    let expr = parser.parse_expr(0, 0)?;
    if let Some((_, at)) = parser.peek() {
        return Err(ParseError {
            message: "unexpected trailing input".to_string(),
            position: at,
        });
    }
    Ok(expr)
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '+' => {
                tokens.push((Token::Plus, i));
                i += 1;
            }
            '-' => {
                tokens.push((Token::Minus, i));
                i += 1;
            }
            '*' => {
                tokens.push((Token::Star, i));
                i += 1;
            }
            '/' => {
                tokens.push((Token::Slash, i));
                i += 1;
            }
            '^' => {
                tokens.push((Token::Caret, i));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            ',' => {
                tokens.push((Token::Comma, i));
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len() && matches!(bytes[i] as char, '0'..='9' | '.') {
                    i += 1;
                }
                // Scientific notation: 1.5e-3, 2E8
                if i < bytes.len() && matches!(bytes[i] as char, 'e' | 'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && matches!(bytes[j] as char, '+' | '-') {
                        j += 1;
                    }
                    if j < bytes.len() && (bytes[j] as char).is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text = &source[start..i];
                let value: f64 = text.parse().map_err(|_| ParseError {
                    message: format!("malformed number '{text}'"),
                    position: start,
                })?;
                tokens.push((Token::Number(value), start));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && matches!(bytes[i] as char, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
                {
                    i += 1;
                }
                tokens.push((Token::Ident(source[start..i].to_string()), start));
            }
            other => {
                return Err(ParseError {
                    message: format!("unexpected character '{other}'"),
                    position: i,
                })
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    source_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<(&Token, usize)> {
        self.tokens.get(self.pos).map(|(t, at)| (t, *at))
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let item = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        item
    }

    fn expect_rparen(&mut self) -> Result<(), ParseError> {
        match self.advance() {
            Some((Token::RParen, _)) => Ok(()),
            Some((_, at)) => Err(ParseError {
                message: "expected ')'".to_string(),
                position: at,
            }),
            None => Err(ParseError {
                message: "expected ')' before end of input".to_string(),
                position: self.source_len,
            }),
        }
    }

    /// Precedence-climbing expression parser.
    ///
    /// Binding powers: `+ -` (1, 2), `* /` (3, 4), unary `-` (_, 5),
    /// `^` (9, 8) — the inverted pair makes `^` right-associative, and
    /// unary minus sits between `*` and `^` so `-x^2` is `-(x^2)`.
    fn parse_expr(&mut self, min_bp: u8, depth: usize) -> Result<Expr, ParseError> {
        if depth > MAX_PARSE_DEPTH {
            return Err(ParseError {
                message: format!("expression nested deeper than {MAX_PARSE_DEPTH}"),
                position: self.peek().map_or(self.source_len, |(_, at)| at),
            });
        }

        let mut lhs = match self.advance() {
            Some((Token::Number(value), _)) => Expr::Number(value),
            Some((Token::Ident(name), at)) => {
                if matches!(self.peek(), Some((Token::LParen, _))) {
                    self.pos += 1;
                    let args = self.parse_args(depth + 1)?;
                    Expr::Call {
                        name,
                        position: at,
                        args,
                    }
                } else {
                    Expr::Variable { name, position: at }
                }
            }
            Some((Token::Minus, _)) => Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(self.parse_expr(5, depth + 1)?),
            },
            Some((Token::LParen, _)) => {
                let inner = self.parse_expr(0, depth + 1)?;
                self.expect_rparen()?;
                inner
            }
            Some((_, at)) => {
                return Err(ParseError {
                    message: "expected a value, variable, function call or '('".to_string(),
                    position: at,
                })
            }
            None => {
                return Err(ParseError {
                    message: "unexpected end of expression".to_string(),
                    position: self.source_len,
                })
            }
        };

        loop {
            let (op, l_bp, r_bp) = match self.peek() {
                Some((Token::Plus, _)) => (BinaryOp::Add, 1, 2),
                Some((Token::Minus, _)) => (BinaryOp::Sub, 1, 2),
                Some((Token::Star, _)) => (BinaryOp::Mul, 3, 4),
                Some((Token::Slash, _)) => (BinaryOp::Div, 3, 4),
                Some((Token::Caret, _)) => (BinaryOp::Pow, 9, 8),
                _ => break,
            };
            if l_bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_expr(r_bp, depth + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn parse_args(&mut self, depth: usize) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some((Token::RParen, _))) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr(0, depth + 1)?);
            match self.advance() {
                Some((Token::Comma, _)) => {}
                Some((Token::RParen, _)) => break,
                Some((_, at)) => {
                    return Err(ParseError {
                        message: "expected ',' or ')' in argument list".to_string(),
                        position: at,
                    })
                }
                None => {
                    return Err(ParseError {
                        message: "unterminated argument list".to_string(),
                        position: self.source_len,
                    })
                }
            }
        }
        Ok(args)
    }
}
