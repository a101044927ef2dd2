//! Translates `pest` parse trees into [`Command`](super::Command) and
//! [`Expr`](super::Expr) values.

use std::panic::Location;

use pest::iterators::Pair;

use super::{Error as OuterError, Rule};
use crate::lang::{Command, Expr};

type Result<T, E = Error> = std::result::Result<T, E>;

/// An internal translation error: the grammar produced a shape this module
/// does not know how to handle. Seeing this in practice means the `.pest`
/// grammar and this file have drifted apart.
#[derive(Debug)]
pub struct Error {
    rule: Rule,
    loc: &'static Location<'static>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unhandled rule `{:?}` at {}", self.rule, self.loc)
    }
}

impl std::error::Error for Error {}

/// Extends [`Option`] with a conversion to [`Error`] that records both the
/// expected rule and the caller's source location.
trait Exception<T> {
    fn or_internal(self, rule: Rule) -> Result<T>;
}

impl<T> Exception<T> for Option<T> {
    #[track_caller]
    fn or_internal(self, rule: Rule) -> Result<T> {
        self.ok_or(Error { rule, loc: Location::caller() })
    }
}

pub fn command(pair: Pair<Rule>) -> std::result::Result<Command, OuterError> {
    let inner = pair
        .into_inner()
        .find(|p| {
            matches!(
                p.as_rule(),
                Rule::Step
                    | Rule::Continue
                    | Rule::Break
                    | Rule::Watch
                    | Rule::Delete
                    | Rule::Print
                    | Rule::Examine
                    | Rule::Info
                    | Rule::Quit
            )
        })
        .or_internal(Rule::Command)?;
    Ok(match inner.as_rule() {
        Rule::Step => Command::Step,
        Rule::Continue => Command::Continue,
        Rule::Break => Command::Break(expr(first(inner)?)?),
        Rule::Watch => Command::Watch(expr(first(inner)?)?),
        Rule::Delete => {
            let mut it = inner.into_inner();
            let kind = it.next().or_internal(Rule::Delete)?;
            let id: u32 = it.next().or_internal(Rule::Delete)?.as_str().parse()?;
            match kind.as_rule() {
                Rule::KWatch => Command::DeleteWatch(id),
                Rule::KBreak => Command::DeleteBreak(id),
                _ => return Err(Error { rule: Rule::Delete, loc: Location::caller() }.into()),
            }
        }
        Rule::Print => Command::Print(expr(first(inner)?)?),
        Rule::Examine => {
            let mut it = inner.into_inner();
            let count: u32 = it.next().or_internal(Rule::Examine)?.as_str().parse()?;
            let expr = expr(it.next().or_internal(Rule::Examine)?)?;
            Command::Examine(count, expr)
        }
        Rule::Info => {
            let kind = first(inner)?;
            match kind.as_rule() {
                Rule::KWp => Command::InfoWatch,
                Rule::KReg => Command::InfoReg,
                Rule::KBp => Command::InfoBreak,
                _ => return Err(Error { rule: Rule::Info, loc: Location::caller() }.into()),
            }
        }
        Rule::Quit => Command::Quit,
        rule => return Err(Error { rule, loc: Location::caller() }.into()),
    })
}

/// Returns the sole child of a single-child rule (`Break`, `Watch`,
/// `Print`, `Info`).
#[track_caller]
fn first(pair: Pair<Rule>) -> Result<Pair<Rule>> {
    let rule = pair.as_rule();
    pair.into_inner().next().or_internal(rule)
}

fn expr(pair: Pair<Rule>) -> std::result::Result<Expr, OuterError> {
    let mut it = pair.into_inner();
    let mut lhs = term(it.next().or_internal(Rule::Expr)?)?;
    while let Some(op) = it.next() {
        let rhs = term(it.next().or_internal(Rule::Expr)?)?;
        lhs = match op.as_str() {
            "+" => Expr::Add(Box::new(lhs), Box::new(rhs)),
            "-" => Expr::Sub(Box::new(lhs), Box::new(rhs)),
            _ => return Err(Error { rule: Rule::AddOp, loc: Location::caller() }.into()),
        };
    }
    Ok(lhs)
}

fn term(pair: Pair<Rule>) -> std::result::Result<Expr, OuterError> {
    let mut it = pair.into_inner();
    let mut lhs = factor(it.next().or_internal(Rule::Term)?)?;
    while let Some(op) = it.next() {
        let rhs = factor(it.next().or_internal(Rule::Term)?)?;
        lhs = match op.as_str() {
            "*" => Expr::Mul(Box::new(lhs), Box::new(rhs)),
            "/" => Expr::Div(Box::new(lhs), Box::new(rhs)),
            _ => return Err(Error { rule: Rule::MulOp, loc: Location::caller() }.into()),
        };
    }
    Ok(lhs)
}

fn factor(pair: Pair<Rule>) -> std::result::Result<Expr, OuterError> {
    let inner = first(pair)?;
    Ok(match inner.as_rule() {
        Rule::Neg => Expr::Neg(Box::new(factor(first(inner)?)?)),
        Rule::Not => Expr::Not(Box::new(factor(first(inner)?)?)),
        Rule::Deref => Expr::Deref(Box::new(factor(first(inner)?)?)),
        Rule::Paren => expr(first(inner)?)?,
        Rule::Number => Expr::Number(number(inner)?),
        Rule::Register => Expr::Register(inner.as_str().trim_start_matches('$').to_owned()),
        rule => return Err(Error { rule, loc: Location::caller() }.into()),
    })
}

fn number(pair: Pair<Rule>) -> std::result::Result<u32, OuterError> {
    let text = pair.as_str();
    Ok(if let Some(hex) = text.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)?
    } else {
        text.parse()?
    })
}
