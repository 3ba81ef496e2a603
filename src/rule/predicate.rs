// src/rule/predicate.rs

//! Rule predicates and their text syntax
//!
//! Predicates are written as small boolean expressions in formula files:
//!
//! ```text
//! with(libclang) && os >= snow_leopard
//! !with(check) || compiler == gcc_4_0
//! option(universal) && (arch(ppc) || arch(ppc64))
//! ```
//!
//! Terms: `true`, `false`, `multi_arch`, `prefer_64_bit`, `option(name)`, `with(feature)`,
//! `without(feature)`, `arch(name)`, `os <op> <release>` and
//! `compiler == <id>` / `compiler != <id>`. Operators bind `!` tightest,
//! then `&&`, then `||`.

use crate::error::{Error, Result};
use crate::option::OptionSet;
use crate::platform::{Arch, CompilerId, OsVersion, PlatformDescriptor};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error as ThisError;

/// Comparison operators for `os` and `compiler` terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// A pure condition over an option set and a platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Const(bool),
    /// A declared option is enabled
    Option(String),
    /// A feature is built (`with-X` enabled or `without-X` not enabled)
    With(String),
    Without(String),
    Os(CmpOp, OsVersion),
    /// The architectures being built include this one
    Arch(Arch),
    Compiler(CmpOp, CompilerId),
    /// More than one architecture is being built
    MultiArch,
    /// The primary architecture is 64-bit and the release builds 64-bit by default
    Prefer64Bit,
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

/// Everything a predicate may look at
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub options: &'a OptionSet,
    pub platform: &'a PlatformDescriptor,
    /// Architectures this build produces, primary first
    pub build_archs: &'a [Arch],
    /// Compiler after `fails_with` fallback
    pub compiler: CompilerId,
}

/// Why a predicate could not be evaluated
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("option '{0}' is not declared by the formula")]
    UndeclaredOption(String),

    #[error("feature '{0}' has neither a with- nor a without- option")]
    UndeclaredFeature(String),
}

/// A name referenced by a predicate, used for load-time validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionRef<'a> {
    Option(&'a str),
    Feature(&'a str),
}

impl Predicate {
    pub fn always() -> Self {
        Self::Const(true)
    }

    /// Parse the text form of a predicate
    pub fn parse(s: &str) -> Result<Self> {
        let tokens = tokenize(s)?;
        let mut parser = Parser { tokens, pos: 0 };
        let predicate = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(Error::ParseError(format!(
                "Unexpected '{}' in predicate '{}'",
                token, s
            )));
        }
        Ok(predicate)
    }

    /// Evaluate against a context
    ///
    /// Every operand of `&&` and `||` is evaluated so that a broken term is
    /// reported no matter where it sits in the expression.
    pub fn eval(&self, ctx: &EvalContext<'_>) -> std::result::Result<bool, EvalError> {
        match self {
            Self::Const(value) => Ok(*value),
            Self::Option(name) => ctx
                .options
                .get(name)
                .ok_or_else(|| EvalError::UndeclaredOption(name.clone())),
            Self::With(feature) => ctx
                .options
                .with(feature)
                .ok_or_else(|| EvalError::UndeclaredFeature(feature.clone())),
            Self::Without(feature) => ctx
                .options
                .with(feature)
                .map(|built| !built)
                .ok_or_else(|| EvalError::UndeclaredFeature(feature.clone())),
            Self::Os(op, version) => Ok(op.holds(ctx.platform.os_version().cmp(version))),
            Self::Arch(arch) => Ok(ctx.build_archs.contains(arch)),
            Self::Compiler(op, compiler) => Ok(op.holds(ctx.compiler.cmp(compiler))),
            Self::MultiArch => Ok(ctx.build_archs.len() > 1),
            Self::Prefer64Bit => Ok(ctx.platform.primary().is_64_bit()
                && ctx.platform.os_version() > OsVersion::Leopard),
            Self::Not(inner) => inner.eval(ctx).map(|v| !v),
            Self::All(parts) => {
                let values = parts
                    .iter()
                    .map(|p| p.eval(ctx))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(values.into_iter().all(|v| v))
            }
            Self::Any(parts) => {
                let values = parts
                    .iter()
                    .map(|p| p.eval(ctx))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(values.into_iter().any(|v| v))
            }
        }
    }

    /// Collect the option and feature names this predicate reads
    pub fn option_refs(&self) -> Vec<OptionRef<'_>> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<OptionRef<'a>>) {
        match self {
            Self::Option(name) => out.push(OptionRef::Option(name)),
            Self::With(feature) | Self::Without(feature) => out.push(OptionRef::Feature(feature)),
            Self::Not(inner) => inner.collect_refs(out),
            Self::All(parts) | Self::Any(parts) => {
                for part in parts {
                    part.collect_refs(out);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(value) => write!(f, "{}", value),
            Self::Option(name) => write!(f, "option({})", name),
            Self::With(feature) => write!(f, "with({})", feature),
            Self::Without(feature) => write!(f, "without({})", feature),
            Self::Os(op, version) => write!(f, "os {} {}", op.symbol(), version),
            Self::Arch(arch) => write!(f, "arch({})", arch),
            Self::Compiler(op, compiler) => write!(f, "compiler {} {}", op.symbol(), compiler),
            Self::MultiArch => write!(f, "multi_arch"),
            Self::Prefer64Bit => write!(f, "prefer_64_bit"),
            Self::Not(inner) => match inner.as_ref() {
                p @ (Self::All(_) | Self::Any(_) | Self::Os(..) | Self::Compiler(..)) => {
                    write!(f, "!({})", p)
                }
                p => write!(f, "!{}", p),
            },
            Self::All(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " && ")?;
                    }
                    if matches!(part, Self::All(_) | Self::Any(_)) {
                        write!(f, "({})", part)?;
                    } else {
                        write!(f, "{}", part)?;
                    }
                }
                Ok(())
            }
            Self::Any(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " || ")?;
                    }
                    if matches!(part, Self::Any(_)) {
                        write!(f, "({})", part)?;
                    } else {
                        write!(f, "{}", part)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Predicate {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Predicate {
    type Error = Error;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Predicate> for String {
    fn from(p: Predicate) -> Self {
        p.to_string()
    }
}

impl serde::Serialize for Predicate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Predicate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
    Cmp(CmpOp),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "{}", name),
            Self::Not => write!(f, "!"),
            Self::And => write!(f, "&&"),
            Self::Or => write!(f, "||"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::Cmp(op) => write!(f, "{}", op.symbol()),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn tokenize(s: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = s.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        let (token, width) = match (c, next) {
            (c, _) if c.is_whitespace() => {
                i += 1;
                continue;
            }
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('!', Some('=')) => (Token::Cmp(CmpOp::Ne), 2),
            ('!', _) => (Token::Not, 1),
            ('=', Some('=')) => (Token::Cmp(CmpOp::Eq), 2),
            ('<', Some('=')) => (Token::Cmp(CmpOp::Le), 2),
            ('<', _) => (Token::Cmp(CmpOp::Lt), 1),
            ('>', Some('=')) => (Token::Cmp(CmpOp::Ge), 2),
            ('>', _) => (Token::Cmp(CmpOp::Gt), 1),
            (c, _) if is_ident_char(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
                continue;
            }
            (c, _) => {
                return Err(Error::ParseError(format!(
                    "Unexpected character '{}' in predicate '{}'",
                    c, s
                )));
            }
        };

        tokens.push(token);
        i += width;
    }

    if tokens.is_empty() {
        return Err(Error::ParseError("Empty predicate".to_string()));
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(Error::ParseError(format!(
                "Expected '{}', found '{}'",
                expected, token
            ))),
            None => Err(Error::ParseError(format!(
                "Expected '{}', found end of predicate",
                expected
            ))),
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            Some(token) => Err(Error::ParseError(format!(
                "Expected a name, found '{}'",
                token
            ))),
            None => Err(Error::ParseError(
                "Expected a name, found end of predicate".to_string(),
            )),
        }
    }

    fn cmp(&mut self) -> Result<CmpOp> {
        match self.next() {
            Some(Token::Cmp(op)) => Ok(op),
            Some(token) => Err(Error::ParseError(format!(
                "Expected a comparison, found '{}'",
                token
            ))),
            None => Err(Error::ParseError(
                "Expected a comparison, found end of predicate".to_string(),
            )),
        }
    }

    fn parse_or(&mut self) -> Result<Predicate> {
        let mut parts = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::Any(parts)
        })
    }

    fn parse_and(&mut self) -> Result<Predicate> {
        let mut parts = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            parts.push(self.parse_unary()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::All(parts)
        })
    }

    fn parse_unary(&mut self) -> Result<Predicate> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Predicate> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Ok(Predicate::Const(true)),
                "false" => Ok(Predicate::Const(false)),
                "multi_arch" => Ok(Predicate::MultiArch),
                "prefer_64_bit" => Ok(Predicate::Prefer64Bit),
                "os" => {
                    let op = self.cmp()?;
                    let name = self.ident()?;
                    let version = OsVersion::from_str(&name)
                        .map_err(|_| Error::ParseError(format!("Unknown OS version '{}'", name)))?;
                    Ok(Predicate::Os(op, version))
                }
                "compiler" => {
                    let op = self.cmp()?;
                    if !matches!(op, CmpOp::Eq | CmpOp::Ne) {
                        return Err(Error::ParseError(format!(
                            "Compilers only support == and !=, found '{}'",
                            op.symbol()
                        )));
                    }
                    let name = self.ident()?;
                    let compiler = CompilerId::from_str(&name)
                        .map_err(|_| Error::ParseError(format!("Unknown compiler '{}'", name)))?;
                    Ok(Predicate::Compiler(op, compiler))
                }
                "option" | "with" | "without" | "arch" => {
                    self.expect(Token::LParen)?;
                    let name = self.ident()?;
                    self.expect(Token::RParen)?;
                    match word.as_str() {
                        "option" => Ok(Predicate::Option(name)),
                        "with" => Ok(Predicate::With(name)),
                        "without" => Ok(Predicate::Without(name)),
                        _ => Arch::from_str(&name).map(Predicate::Arch).map_err(|_| {
                            Error::ParseError(format!("Unknown architecture '{}'", name))
                        }),
                    }
                }
                other => Err(Error::ParseError(format!(
                    "Unknown predicate term '{}'",
                    other
                ))),
            },
            Some(token) => Err(Error::ParseError(format!(
                "Unexpected '{}' in predicate",
                token
            ))),
            None => Err(Error::ParseError(
                "Predicate ended unexpectedly".to_string(),
            )),
        }
    }
}
