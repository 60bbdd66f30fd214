mod elaborate;
pub mod sexpr;
pub mod term;

use std::{
    io::{self, Read},
    rc::Rc,
};

use pest::{iterators::Pair, Parser};
use pest_derive::Parser;
use thiserror::Error;

use elaborate::{Elaborator, Flow};
use sexpr::SExpr;

pub use term::{NodeId, Op, Quantifier, Sort, Symbol, Term};

/// The deepest nesting of parentheses accepted in a source.
pub const MAX_NESTING_DEPTH: usize = 2_000;

/// The deepest term accepted after `let` bindings and macros are expanded.
pub const MAX_TERM_DEPTH: usize = 10_000;

#[derive(Parser)]
#[grammar = "smtlib.pest"]
struct SmtLibParser;

#[derive(Debug, Error)]
pub enum SmtLibError {
    #[error("failed to read source")]
    Io(#[from] io::Error),

    #[error("syntax error")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("malformed command or term: {0}")]
    MalformedCommand(String),

    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),

    #[error("sort mismatch: {0}")]
    SortMismatch(String),

    #[error("'{name}' expects {expected} arguments, but got {actual}")]
    ArityMismatch {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("'{0}' is already declared")]
    DuplicateDeclaration(String),

    #[error("cannot pop {requested} scopes when {available} are open")]
    PopUnderflow { requested: usize, available: usize },

    #[error("invalid literal {0}")]
    InvalidLiteral(String),

    #[error("input is nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
}

/// The assertions of a script that are active when it ends.
#[derive(Debug, Default)]
pub struct Script {
    pub assertions: Vec<Term>,
    /// The logic named by `set-logic`, if any.
    pub logic: Option<Rc<str>>,
    /// The first command that is outside of the supported language. Elaboration stops at this
    /// command, so the assertions only cover the part of the script before it.
    pub unsupported: Option<Rc<str>>,
}

impl Script {
    pub fn is_supported(&self) -> bool {
        self.unsupported.is_none()
    }
}

/// Parse a source into its top-level s-expressions.
pub fn parse_sexprs(source: &str) -> Result<Vec<SExpr>, SmtLibError> {
    check_nesting(source)?;

    let script = SmtLibParser::parse(Rule::script, source)
        .map_err(Box::new)?
        .next()
        .expect("exactly one script rule");

    script
        .into_inner()
        .filter(|pair| pair.as_rule() != Rule::EOI)
        .map(compile_sexpr)
        .collect()
}

/// Read, parse and elaborate an SMT-LIB script.
pub fn parse_script(mut source: impl Read) -> Result<Script, SmtLibError> {
    let mut text = String::new();
    source.read_to_string(&mut text)?;

    let commands = parse_sexprs(&text)?;
    let mut elaborator = Elaborator::default();

    for command in &commands {
        if elaborator.command(command)? == Flow::Stop {
            break;
        }
    }

    Ok(elaborator.finish())
}

/// Reject sources whose lists nest deeper than [`MAX_NESTING_DEPTH`] before anything recurses
/// over them. Parentheses in comments, strings and quoted symbols do not count, and unbalanced
/// input is left to the parser to report.
fn check_nesting(source: &str) -> Result<(), SmtLibError> {
    let mut depth = 0usize;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }

            '"' => {
                while let Some(c) = chars.next() {
                    if c == '"' {
                        // A doubled quote is an escaped quote.
                        if chars.next_if_eq(&'"').is_none() {
                            break;
                        }
                    }
                }
            }

            '|' => {
                for c in chars.by_ref() {
                    if c == '|' {
                        break;
                    }
                }
            }

            '(' => {
                depth += 1;
                if depth > MAX_NESTING_DEPTH {
                    return Err(SmtLibError::NestingTooDeep {
                        limit: MAX_NESTING_DEPTH,
                    });
                }
            }

            ')' => depth = depth.saturating_sub(1),

            _ => {}
        }
    }

    Ok(())
}

fn compile_sexpr(pair: Pair<'_, Rule>) -> Result<SExpr, SmtLibError> {
    let text = pair.as_str();

    let sexpr = match pair.as_rule() {
        Rule::list => SExpr::List(
            pair.into_inner()
                .map(compile_sexpr)
                .collect::<Result<_, _>>()?,
        ),

        Rule::numeral => {
            if sexpr::has_leading_zero(text) {
                return Err(SmtLibError::InvalidLiteral(text.to_owned()));
            }

            SExpr::Numeral(sexpr::parse_numeral(text).expect("grammar only admits digits"))
        }

        Rule::decimal => {
            if sexpr::has_leading_zero(text) {
                return Err(SmtLibError::InvalidLiteral(text.to_owned()));
            }

            SExpr::Decimal(sexpr::parse_decimal(text).expect("grammar only admits decimals"))
        }

        Rule::hexadecimal => SExpr::Hexadecimal(text[2..].into()),
        Rule::binary => SExpr::Binary(text[2..].into()),
        Rule::string => SExpr::String(text[1..text.len() - 1].replace("\"\"", "\"").into()),
        Rule::keyword => SExpr::Keyword(text[1..].into()),
        Rule::simple_symbol => SExpr::Symbol(text.into()),
        Rule::quoted_symbol => SExpr::Symbol(text[1..text.len() - 1].into()),

        rule => unreachable!("unexpected rule {rule:?} in s-expression"),
    };

    Ok(sexpr)
}
