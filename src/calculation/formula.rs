//! Formula expression parsing and evaluation.
//!
//! Component formulas are restricted to `+ - * / ( )`, unary minus,
//! component-id references and numeric literals. A literal followed by `%`
//! is a percentage (`7.5%` is `0.075`). Parsing is a small recursive-descent
//! pass with standard precedence:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := NUMBER ['%'] | IDENT | '(' expr ')'
//! ```
//!
//! Operator runs such as `A + B - C` are kept flat, so nesting only grows
//! through parentheses and unary signs; that depth is capped at
//! [`MAX_FORMULA_DEPTH`].
//!
//! Evaluation uses checked decimal arithmetic, so division by zero and
//! overflow are reported rather than panicking.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::ComputationError;

/// Longest accepted formula, in bytes.
pub const MAX_FORMULA_LENGTH: usize = 1000;

/// Deepest accepted nesting of parentheses and unary signs.
pub const MAX_FORMULA_DEPTH: usize = 64;

/// Why a formula failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// The expression is blank.
    #[error("expression is empty")]
    Empty,
    /// The expression exceeds [`MAX_FORMULA_LENGTH`].
    #[error("expression is {length} characters long (max {})", MAX_FORMULA_LENGTH)]
    TooLong {
        /// Actual length.
        length: usize,
    },
    /// A character outside the formula alphabet.
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter {
        /// The character.
        ch: char,
        /// Byte offset.
        position: usize,
    },
    /// A numeric literal that is not a valid decimal.
    #[error("invalid number '{literal}'")]
    InvalidNumber {
        /// The literal text.
        literal: String,
    },
    /// A token in a position the grammar does not allow.
    #[error("unexpected '{found}' at position {position}")]
    UnexpectedToken {
        /// The token text.
        found: String,
        /// Byte offset.
        position: usize,
    },
    /// The expression ended mid-production.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// Parentheses or unary signs nest deeper than [`MAX_FORMULA_DEPTH`].
    #[error("expression nests {depth} levels deep (max {})", MAX_FORMULA_DEPTH)]
    TooDeep {
        /// Nesting depth reached when parsing stopped.
        depth: usize,
    },
}

/// Why a parsed formula failed to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Division by zero.
    DivisionByZero,
    /// Decimal overflow.
    Overflow,
    /// A reference had no value.
    UnknownReference(String),
}

impl EvalError {
    /// Attaches the id of the evaluated node.
    pub fn into_computation_error(self, id: &str) -> ComputationError {
        match self {
            EvalError::DivisionByZero => ComputationError::DivisionByZero { id: id.to_string() },
            EvalError::Overflow => ComputationError::Overflow { id: id.to_string() },
            EvalError::UnknownReference(name) => ComputationError::UnknownVariable {
                id: id.to_string(),
                name,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Number(Decimal),
    Reference(String),
    Negate(Box<Expr>),
    /// `head op1 operand1 op2 operand2 ...`, applied left to right.
    Chain {
        head: Box<Expr>,
        tail: Vec<(BinaryOp, Expr)>,
    },
}

impl Expr {
    fn chain(head: Expr, tail: Vec<(BinaryOp, Expr)>) -> Expr {
        if tail.is_empty() {
            head
        } else {
            Expr::Chain {
                head: Box::new(head),
                tail,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(Decimal),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, FormulaError> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (position, ch) = chars[i];
        match ch {
            c if c.is_whitespace() => {
                i += 1;
            }
            '+' | '-' | '*' | '/' | '(' | ')' => {
                let token = match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                };
                tokens.push((token, position));
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                let mut value = Decimal::from_str(&literal)
                    .map_err(|_| FormulaError::InvalidNumber { literal })?;
                if i < chars.len() && chars[i].1 == '%' {
                    value /= Decimal::ONE_HUNDRED;
                    i += 1;
                }
                tokens.push((Token::Number(value), position));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                tokens.push((Token::Ident(name), position));
            }
            other => {
                return Err(FormulaError::UnexpectedCharacter {
                    ch: other,
                    position,
                });
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_FORMULA_DEPTH {
            return Err(FormulaError::TooDeep { depth: self.depth });
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let head = self.term()?;
        let mut tail = Vec::new();
        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some(BinaryOp::Add),
            Some(Token::Minus) => Some(BinaryOp::Sub),
            _ => None,
        } {
            self.cursor += 1;
            tail.push((op, self.term()?));
        }
        Ok(Expr::chain(head, tail))
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let head = self.unary()?;
        let mut tail = Vec::new();
        while let Some(op) = match self.peek() {
            Some(Token::Star) => Some(BinaryOp::Mul),
            Some(Token::Slash) => Some(BinaryOp::Div),
            _ => None,
        } {
            self.cursor += 1;
            tail.push((op, self.unary()?));
        }
        Ok(Expr::chain(head, tail))
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        let negate = match self.peek() {
            Some(Token::Minus) => true,
            Some(Token::Plus) => false,
            _ => return self.primary(),
        };
        self.cursor += 1;
        self.descend()?;
        let inner = self.unary()?;
        self.depth -= 1;
        Ok(if negate {
            Expr::Negate(Box::new(inner))
        } else {
            inner
        })
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            Some((Token::Number(value), _)) => Ok(Expr::Number(value)),
            Some((Token::Ident(name), _)) => Ok(Expr::Reference(name)),
            Some((Token::LParen, _)) => {
                self.descend()?;
                let inner = self.expression()?;
                self.depth -= 1;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((token, position)) => Err(FormulaError::UnexpectedToken {
                        found: token.to_string(),
                        position,
                    }),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some((token, position)) => Err(FormulaError::UnexpectedToken {
                found: token.to_string(),
                position,
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

/// A parsed formula expression.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::Formula;
/// use rust_decimal::Decimal;
///
/// let formula = Formula::parse("(BASIC + HOUSING) * 8%").unwrap();
/// assert_eq!(formula.references(), ["BASIC", "HOUSING"]);
///
/// let value = formula
///     .evaluate(|name| match name {
///         "BASIC" => Some(Decimal::new(80_000, 0)),
///         "HOUSING" => Some(Decimal::new(40_000, 0)),
///         _ => None,
///     })
///     .unwrap();
/// assert_eq!(value, Decimal::new(9_600, 0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    source: String,
    expr: Expr,
    references: Vec<String>,
}

impl Formula {
    /// Parses an expression.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        if source.len() > MAX_FORMULA_LENGTH {
            return Err(FormulaError::TooLong {
                length: source.len(),
            });
        }
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }

        let mut parser = Parser {
            tokens,
            cursor: 0,
            depth: 0,
        };
        let expr = parser.expression()?;
        if let Some((token, position)) = parser.advance() {
            return Err(FormulaError::UnexpectedToken {
                found: token.to_string(),
                position,
            });
        }

        let mut references = Vec::new();
        collect_references(&expr, &mut references);

        Ok(Self {
            source: source.to_string(),
            expr,
            references,
        })
    }

    /// Returns the original expression text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the distinct identifiers referenced, in order of first use.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Evaluates the expression, resolving identifiers through `lookup`.
    pub fn evaluate<F>(&self, lookup: F) -> Result<Decimal, EvalError>
    where
        F: Fn(&str) -> Option<Decimal>,
    {
        evaluate_expr(&self.expr, &lookup)
    }
}

fn collect_references(expr: &Expr, references: &mut Vec<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Reference(name) => {
            if !references.contains(name) {
                references.push(name.clone());
            }
        }
        Expr::Negate(inner) => collect_references(inner, references),
        Expr::Chain { head, tail } => {
            collect_references(head, references);
            for (_, operand) in tail {
                collect_references(operand, references);
            }
        }
    }
}

fn evaluate_expr<F>(expr: &Expr, lookup: &F) -> Result<Decimal, EvalError>
where
    F: Fn(&str) -> Option<Decimal>,
{
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Reference(name) => lookup(name).ok_or_else(|| EvalError::UnknownReference(name.clone())),
        Expr::Negate(inner) => Ok(-evaluate_expr(inner, lookup)?),
        Expr::Chain { head, tail } => {
            let mut acc = evaluate_expr(head, lookup)?;
            for (op, operand) in tail {
                acc = apply(*op, acc, evaluate_expr(operand, lookup)?)?;
            }
            Ok(acc)
        }
    }
}

fn apply(op: BinaryOp, lhs: Decimal, rhs: Decimal) -> Result<Decimal, EvalError> {
    match op {
        BinaryOp::Add => lhs.checked_add(rhs).ok_or(EvalError::Overflow),
        BinaryOp::Sub => lhs.checked_sub(rhs).ok_or(EvalError::Overflow),
        BinaryOp::Mul => lhs.checked_mul(rhs).ok_or(EvalError::Overflow),
        BinaryOp::Div => {
            if rhs.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            lhs.checked_div(rhs).ok_or(EvalError::Overflow)
        }
    }
}

/// Evaluates an expression against caller-supplied variables.
///
/// Used to test a formula before it is saved into a template. Parse failures
/// and unknown variables are reported as [`ComputationError`]s naming the
/// expression.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::preview_formula;
/// use rust_decimal::Decimal;
/// use std::collections::BTreeMap;
///
/// let variables = BTreeMap::from([("GROSS".to_string(), Decimal::new(120_000, 0))]);
/// let value = preview_formula("GROSS * 8% - 600", &variables).unwrap();
/// assert_eq!(value, Decimal::new(9_000, 0));
/// ```
pub fn preview_formula(
    expression: &str,
    variables: &BTreeMap<String, Decimal>,
) -> Result<Decimal, ComputationError> {
    let formula = Formula::parse(expression).map_err(|e| ComputationError::InvalidFormula {
        id: expression.to_string(),
        message: e.to_string(),
    })?;
    formula
        .evaluate(|name| variables.get(name).copied())
        .map_err(|e| e.into_computation_error(expression))
}
