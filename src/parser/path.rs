//! JSONPath compiler.
//!
//! Expressions are compiled once into a [`JsonPath`] (a list of segments) and
//! evaluated many times by [`crate::parser::eval`]. The grammar covers the
//! dotted and bracketed child forms, wildcards, negative indices, unions,
//! slices, recursive descent and `?` filters:
//!
//! ```text
//! $.repo.name            $['repo']["name"]      repo.name
//! $.commits[-1].id       $.items[0,2]           $.items[1:5:2]
//! $..author.email        $.items[*].tags.*
//! $.items[?(@.price > 10 && @.stock)]           $.users[?role == 'admin'].name
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, one_of, satisfy},
    combinator::{all_consuming, map, map_opt, map_res, not, opt, recognize, value},
    error::Error as NomError,
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use serde_json::Value;
use thiserror::Error;

/// Compile failure; the message always carries the offending expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path expression `{expression}`: {message}")]
pub struct PathError {
    pub expression: String,
    pub message: String,
}

impl PathError {
    fn new(expression: &str, message: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn compile(expression: &str) -> Result<Self, PathError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(PathError::new(expression, "expression is empty"));
        }

        match all_consuming(path)(trimmed) {
            Ok((_, segments)) => Ok(Self {
                source: expression.to_string(),
                segments,
            }),
            Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => {
                let position = trimmed.len() - err.input.len();
                let near: String = err.input.chars().take(16).collect();
                let message = if near.is_empty() {
                    format!("unexpected end of expression at offset {position}")
                } else {
                    format!("unexpected `{near}` at offset {position}")
                };
                Err(PathError::new(expression, message))
            }
            Err(nom::Err::Incomplete(_)) => {
                Err(PathError::new(expression, "incomplete expression"))
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// `..` segments apply their selectors to the node and every descendant.
    pub descendant: bool,
    pub selectors: Vec<Selector>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Name(String),
    Wildcard,
    Index(i64),
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    Filter(FilterExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Or(Box<FilterExpr>, Box<FilterExpr>),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
    Exists(Operand),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    /// `@`-relative (or bare) path inside a filter.
    Current(Vec<Segment>),
    /// `$`-absolute path inside a filter.
    Root(Vec<Segment>),
}

type Res<'a, O> = IResult<&'a str, O, NomError<&'a str>>;

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> Res<'a, O>
where
    F: FnMut(&'a str) -> Res<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

// =============================================================================
// PATHS AND SEGMENTS
// =============================================================================

fn path(input: &str) -> Res<'_, Vec<Segment>> {
    alt((rooted_path, bare_path))(input)
}

fn rooted_path(input: &str) -> Res<'_, Vec<Segment>> {
    preceded(char('$'), many0(segment))(input)
}

/// `repo.name` is read as `$.repo.name`.
fn bare_path(input: &str) -> Res<'_, Vec<Segment>> {
    let (input, first) = member_name(input)?;
    let (input, mut rest) = many0(segment)(input)?;
    rest.insert(0, child(Selector::Name(first)));
    Ok((input, rest))
}

fn child(selector: Selector) -> Segment {
    Segment {
        descendant: false,
        selectors: vec![selector],
    }
}

fn segment(input: &str) -> Res<'_, Segment> {
    alt((descendant_segment, dot_segment, bracket_segment))(input)
}

fn descendant_segment(input: &str) -> Res<'_, Segment> {
    let (input, _) = tag("..")(input)?;
    let (input, selectors) = alt((
        bracket_selectors,
        map(char('*'), |_| vec![Selector::Wildcard]),
        map(member_name, |name| vec![Selector::Name(name)]),
    ))(input)?;
    Ok((
        input,
        Segment {
            descendant: true,
            selectors,
        },
    ))
}

fn dot_segment(input: &str) -> Res<'_, Segment> {
    let (input, _) = char('.')(input)?;
    let (input, selector) = alt((
        value(Selector::Wildcard, char('*')),
        map(member_name, Selector::Name),
    ))(input)?;
    Ok((input, child(selector)))
}

fn bracket_segment(input: &str) -> Res<'_, Segment> {
    map(bracket_selectors, |selectors| Segment {
        descendant: false,
        selectors,
    })(input)
}

fn bracket_selectors(input: &str) -> Res<'_, Vec<Selector>> {
    delimited(
        pair(char('['), multispace0),
        alt((
            map(filter_selector, |filter| vec![filter]),
            separated_list1(ws(char(',')), selector),
        )),
        pair(multispace0, char(']')),
    )(input)
}

fn selector(input: &str) -> Res<'_, Selector> {
    alt((
        map(quoted_string, Selector::Name),
        value(Selector::Wildcard, char('*')),
        slice,
        map(integer, Selector::Index),
    ))(input)
}

fn slice(input: &str) -> Res<'_, Selector> {
    let (input, start) = opt(integer)(input)?;
    let (input, _) = ws(char(':'))(input)?;
    let (input, end) = opt(integer)(input)?;
    let (input, step) = opt(preceded(ws(char(':')), opt(integer)))(input)?;
    Ok((
        input,
        Selector::Slice {
            start,
            end,
            step: step.flatten(),
        },
    ))
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn member_name(input: &str) -> Res<'_, String> {
    map(take_while1(is_name_char), str::to_string)(input)
}

fn quoted_string(input: &str) -> Res<'_, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        )),
        str::to_string,
    )(input)
}

fn integer(input: &str) -> Res<'_, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i64>)(input)
}

// =============================================================================
// FILTERS
// =============================================================================

fn filter_selector(input: &str) -> Res<'_, Selector> {
    map(preceded(pair(char('?'), multispace0), or_expr), Selector::Filter)(input)
}

fn or_expr(input: &str) -> Res<'_, FilterExpr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(tag("||")), and_expr))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, next| FilterExpr::Or(Box::new(acc), Box::new(next)));
    Ok((input, expr))
}

fn and_expr(input: &str) -> Res<'_, FilterExpr> {
    let (input, first) = unary_expr(input)?;
    let (input, rest) = many0(preceded(ws(tag("&&")), unary_expr))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, next| FilterExpr::And(Box::new(acc), Box::new(next)));
    Ok((input, expr))
}

fn unary_expr(input: &str) -> Res<'_, FilterExpr> {
    alt((
        map(
            preceded(ws(terminated(char('!'), not(char('=')))), unary_expr),
            |inner| FilterExpr::Not(Box::new(inner)),
        ),
        delimited(ws(char('(')), or_expr, ws(char(')'))),
        comparison,
    ))(input)
}

fn comparison(input: &str) -> Res<'_, FilterExpr> {
    let (input, left) = ws(operand)(input)?;
    let (input, rest) = opt(pair(ws(compare_op), ws(operand)))(input)?;
    let expr = match rest {
        Some((op, right)) => FilterExpr::Compare { left, op, right },
        None => FilterExpr::Exists(left),
    };
    Ok((input, expr))
}

fn compare_op(input: &str) -> Res<'_, CompareOp> {
    alt((
        value(CompareOp::Eq, tag("==")),
        value(CompareOp::Ne, tag("!=")),
        value(CompareOp::Le, tag("<=")),
        value(CompareOp::Ge, tag(">=")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Gt, tag(">")),
    ))(input)
}

fn operand(input: &str) -> Res<'_, Operand> {
    alt((
        map(quoted_string, |text| Operand::Literal(Value::String(text))),
        map(keyword_literal, Operand::Literal),
        map(preceded(char('@'), many0(segment)), Operand::Current),
        map(preceded(char('$'), many0(segment)), Operand::Root),
        map(number_literal, Operand::Literal),
        map(bare_path, Operand::Current),
    ))(input)
}

fn keyword_literal(input: &str) -> Res<'_, Value> {
    terminated(
        alt((
            value(Value::Bool(true), tag("true")),
            value(Value::Bool(false), tag("false")),
            value(Value::Null, tag("null")),
        )),
        not(satisfy(is_name_char)),
    )(input)
}

fn number_literal(input: &str) -> Res<'_, Value> {
    map_opt(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |text: &str| match text.parse::<i64>() {
            Ok(int) => Some(Value::from(int)),
            Err(_) => text
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
        },
    )(input)
}
