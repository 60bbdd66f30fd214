use std::{
    collections::HashMap,
    rc::Rc,
    sync::atomic::{AtomicU32, Ordering},
};

use log::debug;
use num_traits::ToPrimitive;

use crate::{
    sexpr::{self, SExpr},
    term::{Op, Quantifier, Sort, Symbol, Term, TermTable},
    Script, SmtLibError,
};

enum Entry {
    Const(Symbol),
    Function { func: Symbol, params: Vec<Sort> },
    Macro { params: Vec<Symbol>, body: Term },
}

enum SortEntry {
    Alias(Sort),
    Declared { arity: usize },
}

/// Everything introduced since the matching `push`.
struct Scope {
    names: Vec<Rc<str>>,
    sorts: Vec<Rc<str>>,
    num_assertions: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Turns commands into sorted terms, keeping track of declarations and assertion scopes.
#[derive(Default)]
pub(crate) struct Elaborator {
    entries: HashMap<Rc<str>, Entry>,
    sorts: HashMap<Rc<str>, SortEntry>,
    /// Let-bound names and quantified variables, innermost last.
    locals: Vec<(Rc<str>, Term)>,
    scopes: Vec<Scope>,
    terms: TermTable,

    assertions: Vec<Term>,
    logic: Option<Rc<str>>,
    unsupported: Option<Rc<str>>,
}

/// Symbol ids are unique across scripts, so terms of separately parsed scripts never alias.
static NEXT_SYMBOL_ID: AtomicU32 = AtomicU32::new(0);

const IGNORED_COMMANDS: &[&str] = &[
    "set-option",
    "set-info",
    "check-sat",
    "check-sat-assuming",
    "echo",
    "get-assertions",
    "get-assignment",
    "get-info",
    "get-model",
    "get-option",
    "get-proof",
    "get-unsat-assumptions",
    "get-unsat-core",
    "get-value",
];

/// Sorts of theories that are not reasoned about. Their terms are opaque.
const THEORY_SORTS: &[&str] = &[
    "String",
    "RegLan",
    "RoundingMode",
    "Float16",
    "Float32",
    "Float64",
    "Float128",
];

const PARAMETRIC_THEORY_SORTS: &[&str] = &["Array", "Seq", "Set"];

/// How much of a term error messages show.
const EXCERPT_LEN: usize = 200;

const UNSUPPORTED_COMMANDS: &[&str] = &[
    "declare-datatype",
    "declare-datatypes",
    "define-fun-rec",
    "define-funs-rec",
];

impl Elaborator {
    pub(crate) fn finish(self) -> Script {
        Script {
            assertions: self.assertions,
            logic: self.logic,
            unsupported: self.unsupported,
        }
    }

    pub(crate) fn command(&mut self, command: &SExpr) -> Result<Flow, SmtLibError> {
        let SExpr::List(items) = command else {
            return Err(malformed(command));
        };

        let Some((SExpr::Symbol(head), args)) = items.split_first() else {
            return Err(malformed(command));
        };

        match head.as_ref() {
            "assert" => {
                let [term] = args else {
                    return Err(malformed(command));
                };

                let term = self.term(term)?;
                expect_sort("assert", &Sort::Bool, &term)?;
                self.assertions.push(term);
            }

            "declare-const" => {
                let [name, sort] = args else {
                    return Err(malformed(command));
                };

                let name = symbol_name(name, command)?;
                let sort = self.sort(sort)?;
                let symbol = self.fresh_symbol(Rc::clone(&name), sort);

                self.declare(name, Entry::Const(symbol))?;
            }

            "declare-fun" => {
                let [name, SExpr::List(params), sort] = args else {
                    return Err(malformed(command));
                };

                let name = symbol_name(name, command)?;
                let params = params
                    .iter()
                    .map(|param| self.sort(param))
                    .collect::<Result<Vec<_>, _>>()?;
                let sort = self.sort(sort)?;
                let func = self.fresh_symbol(Rc::clone(&name), sort);

                let entry = if params.is_empty() {
                    Entry::Const(func)
                } else {
                    Entry::Function { func, params }
                };
                self.declare(name, entry)?;
            }

            "define-fun" => {
                let [name, SExpr::List(params), sort, body] = args else {
                    return Err(malformed(command));
                };

                let name = symbol_name(name, command)?;
                let entry = self.define(&name, params, sort, body, command)?;
                self.declare(name, entry)?;
            }

            "define-const" => {
                let [name, sort, body] = args else {
                    return Err(malformed(command));
                };

                let name = symbol_name(name, command)?;
                let entry = self.define(&name, &[], sort, body, command)?;
                self.declare(name, entry)?;
            }

            "declare-sort" => {
                let (name, arity) = match args {
                    [name] => (name, 0),
                    [name, SExpr::Numeral(arity)] => (
                        name,
                        arity.to_usize().ok_or_else(|| malformed(command))?,
                    ),
                    _ => return Err(malformed(command)),
                };

                let name = symbol_name(name, command)?;
                self.declare_sort(name, SortEntry::Declared { arity })?;
            }

            "define-sort" => {
                let [name, SExpr::List(params), sort] = args else {
                    return Err(malformed(command));
                };

                if !params.is_empty() {
                    return Ok(self.stop_unsupported(head));
                }

                let name = symbol_name(name, command)?;
                let sort = self.sort(sort)?;
                self.declare_sort(name, SortEntry::Alias(sort))?;
            }

            "push" => {
                let levels = scope_levels(args, command)?;

                for _ in 0..levels {
                    self.scopes.push(Scope {
                        names: vec![],
                        sorts: vec![],
                        num_assertions: self.assertions.len(),
                    });
                }
            }

            "pop" => {
                let levels = scope_levels(args, command)?;

                if levels > self.scopes.len() {
                    return Err(SmtLibError::PopUnderflow {
                        requested: levels,
                        available: self.scopes.len(),
                    });
                }

                for _ in 0..levels {
                    self.pop_scope();
                }
            }

            "reset-assertions" => {
                while !self.scopes.is_empty() {
                    self.pop_scope();
                }

                self.assertions.clear();
            }

            "reset" => *self = Elaborator::default(),

            "exit" => return Ok(Flow::Stop),

            "set-logic" => {
                let [logic] = args else {
                    return Err(malformed(command));
                };

                let logic = symbol_name(logic, command)?;
                debug!("logic is {logic}");
                self.logic = Some(logic);
            }

            _ if IGNORED_COMMANDS.contains(&head.as_ref()) => {
                debug!("ignoring {command}");
            }

            _ if UNSUPPORTED_COMMANDS.contains(&head.as_ref()) => {
                return Ok(self.stop_unsupported(head));
            }

            _ => return Err(SmtLibError::UnknownCommand(head.to_string())),
        }

        Ok(Flow::Continue)
    }

    fn stop_unsupported(&mut self, command: &Rc<str>) -> Flow {
        debug!("'{command}' is not supported, ignoring the rest of the script");
        self.unsupported = Some(Rc::clone(command));
        Flow::Stop
    }

    fn pop_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };

        for name in scope.names {
            self.entries.remove(&name);
        }

        for name in scope.sorts {
            self.sorts.remove(&name);
        }

        self.assertions.truncate(scope.num_assertions);
    }

    fn fresh_symbol(&mut self, name: Rc<str>, sort: Sort) -> Symbol {
        let id = NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed);
        Symbol { name, id, sort }
    }

    fn declare(&mut self, name: Rc<str>, entry: Entry) -> Result<(), SmtLibError> {
        if self.entries.contains_key(&name)
            || Op::from_name(&name).is_some()
            || matches!(name.as_ref(), "true" | "false")
        {
            return Err(SmtLibError::DuplicateDeclaration(name.to_string()));
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.names.push(Rc::clone(&name));
        }

        self.entries.insert(name, entry);
        Ok(())
    }

    fn declare_sort(&mut self, name: Rc<str>, entry: SortEntry) -> Result<(), SmtLibError> {
        if self.sorts.contains_key(&name) || matches!(name.as_ref(), "Bool" | "Int" | "Real") {
            return Err(SmtLibError::DuplicateDeclaration(name.to_string()));
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.sorts.push(Rc::clone(&name));
        }

        self.sorts.insert(name, entry);
        Ok(())
    }

    /// Elaborate the body of a `define-fun` into a macro.
    fn define(
        &mut self,
        name: &str,
        params: &[SExpr],
        sort: &SExpr,
        body: &SExpr,
        command: &SExpr,
    ) -> Result<Entry, SmtLibError> {
        let mut symbols = Vec::with_capacity(params.len());

        for param in params {
            let SExpr::List(param) = param else {
                return Err(malformed(command));
            };
            let [param_name, param_sort] = param.as_slice() else {
                return Err(malformed(command));
            };

            let param_name = symbol_name(param_name, command)?;
            let param_sort = self.sort(param_sort)?;
            symbols.push(self.fresh_symbol(param_name, param_sort));
        }

        let sort = self.sort(sort)?;

        let body = self.with_locals(
            symbols
                .iter()
                .map(|symbol| (Rc::clone(&symbol.name), Term::Const(symbol.clone()))),
            |elaborator| elaborator.term(body),
        )?;
        expect_sort(name, &sort, &body)?;

        Ok(Entry::Macro {
            params: symbols,
            body,
        })
    }

    fn with_locals<T>(
        &mut self,
        bindings: impl IntoIterator<Item = (Rc<str>, Term)>,
        scoped: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let depth = self.locals.len();
        self.locals.extend(bindings);

        let result = scoped(self);

        self.locals.truncate(depth);
        result
    }

    fn sort(&self, expr: &SExpr) -> Result<Sort, SmtLibError> {
        match expr {
            SExpr::Symbol(name) => match name.as_ref() {
                "Bool" => Ok(Sort::Bool),
                "Int" => Ok(Sort::Int),
                "Real" => Ok(Sort::Real),

                _ => match self.sorts.get(name) {
                    Some(SortEntry::Alias(sort)) => Ok(sort.clone()),
                    Some(SortEntry::Declared { arity: 0 }) => Ok(Sort::Foreign(Rc::clone(name))),
                    Some(SortEntry::Declared { arity }) => Err(SmtLibError::ArityMismatch {
                        name: name.to_string(),
                        expected: arity.to_string(),
                        actual: 0,
                    }),
                    None if THEORY_SORTS.contains(&name.as_ref()) => {
                        Ok(Sort::Foreign(Rc::clone(name)))
                    }
                    None => Err(SmtLibError::UnknownSymbol(name.to_string())),
                },
            },

            SExpr::List(items) => {
                let Some((SExpr::Symbol(head), args)) = items.split_first() else {
                    return Err(malformed(expr));
                };

                // Indexed sorts such as `(_ BitVec 8)` take numerals, not sorts.
                if head.as_ref() == "_" {
                    return Ok(Sort::Foreign(expr.to_string().into()));
                }

                match self.sorts.get(head) {
                    Some(SortEntry::Declared { arity }) if *arity != args.len() => {
                        return Err(SmtLibError::ArityMismatch {
                            name: head.to_string(),
                            expected: arity.to_string(),
                            actual: args.len(),
                        });
                    }
                    Some(SortEntry::Declared { .. }) => {}
                    Some(SortEntry::Alias(_)) => return Err(malformed(expr)),
                    None if PARAMETRIC_THEORY_SORTS.contains(&head.as_ref()) => {}
                    None => return Err(SmtLibError::UnknownSymbol(head.to_string())),
                }

                for arg in args {
                    self.sort(arg)?;
                }

                Ok(Sort::Foreign(expr.to_string().into()))
            }

            _ => Err(SmtLibError::MalformedCommand(format!(
                "expected a sort, found {expr}"
            ))),
        }
    }

    fn term(&mut self, expr: &SExpr) -> Result<Term, SmtLibError> {
        match expr {
            SExpr::Numeral(value) => Ok(Term::Numeral(value.clone())),
            SExpr::Decimal(value) => Ok(Term::Decimal(value.clone())),
            SExpr::Hexadecimal(digits) => {
                bitvector_literal(&mut self.terms, expr, digits.len() * 4)
            }
            SExpr::Binary(digits) => bitvector_literal(&mut self.terms, expr, digits.len()),
            SExpr::String(_) => {
                self.terms
                    .opaque(expr.to_string().into(), vec![], Sort::Foreign("String".into()))
            }
            SExpr::Keyword(_) => Err(SmtLibError::MalformedCommand(format!(
                "expected a term, found {expr}"
            ))),
            SExpr::Symbol(name) => self.identifier(name),
            SExpr::List(items) => self.application(expr, items),
        }
    }

    fn identifier(&self, name: &Rc<str>) -> Result<Term, SmtLibError> {
        if let Some((_, term)) = self.locals.iter().rev().find(|(local, _)| local == name) {
            return Ok(term.clone());
        }

        match name.as_ref() {
            "true" => return Ok(Term::Bool(true)),
            "false" => return Ok(Term::Bool(false)),
            _ => {}
        }

        match self.entries.get(name) {
            Some(Entry::Const(symbol)) => Ok(Term::Const(symbol.clone())),
            Some(Entry::Macro { params, body }) if params.is_empty() => Ok(body.clone()),
            Some(Entry::Macro { params, .. }) => Err(SmtLibError::ArityMismatch {
                name: name.to_string(),
                expected: params.len().to_string(),
                actual: 0,
            }),
            Some(Entry::Function { params, .. }) => Err(SmtLibError::ArityMismatch {
                name: name.to_string(),
                expected: params.len().to_string(),
                actual: 0,
            }),
            None => negative_literal(name)
                .ok_or_else(|| SmtLibError::UnknownSymbol(name.to_string())),
        }
    }

    fn application(&mut self, expr: &SExpr, items: &[SExpr]) -> Result<Term, SmtLibError> {
        let Some((head, args)) = items.split_first() else {
            return Err(SmtLibError::MalformedCommand("empty term ()".to_owned()));
        };

        match head {
            SExpr::Symbol(name) => match name.as_ref() {
                "let" => self.let_binding(expr, args),
                "forall" => self.quantified(Quantifier::Forall, expr, args),
                "exists" => self.quantified(Quantifier::Exists, expr, args),
                "!" => match args {
                    [term, ..] => self.term(term),
                    [] => Err(malformed(expr)),
                },
                "as" => match args {
                    [term, _] => self.term(term),
                    _ => Err(malformed(expr)),
                },
                "_" => indexed_constant(&mut self.terms, expr, args),

                _ => {
                    let args = args
                        .iter()
                        .map(|arg| self.term(arg))
                        .collect::<Result<Vec<_>, _>>()?;

                    self.apply(name, args)
                }
            },

            // Indexed or qualified function symbols, such as `((_ extract 7 0) x)`.
            SExpr::List(_) => {
                let args = args
                    .iter()
                    .map(|arg| self.term(arg))
                    .collect::<Result<Vec<_>, _>>()?;

                debug!("treating {head} as a foreign function");
                self.terms
                    .opaque(head.to_string().into(), args, unknown_sort())
            }

            _ => Err(malformed(expr)),
        }
    }

    fn let_binding(&mut self, expr: &SExpr, args: &[SExpr]) -> Result<Term, SmtLibError> {
        let [SExpr::List(bindings), body] = args else {
            return Err(malformed(expr));
        };

        // Bindings are parallel, so every value is elaborated in the outer scope.
        let mut bound = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let SExpr::List(binding) = binding else {
                return Err(malformed(expr));
            };
            let [SExpr::Symbol(name), value] = binding.as_slice() else {
                return Err(malformed(expr));
            };

            bound.push((Rc::clone(name), self.term(value)?));
        }

        self.with_locals(bound, |elaborator| elaborator.term(body))
    }

    fn quantified(
        &mut self,
        quantifier: Quantifier,
        expr: &SExpr,
        args: &[SExpr],
    ) -> Result<Term, SmtLibError> {
        let [SExpr::List(binders), body] = args else {
            return Err(malformed(expr));
        };

        let mut vars = Vec::with_capacity(binders.len());
        for binder in binders {
            let SExpr::List(binder) = binder else {
                return Err(malformed(expr));
            };
            let [SExpr::Symbol(name), sort] = binder.as_slice() else {
                return Err(malformed(expr));
            };

            let sort = self.sort(sort)?;
            vars.push(self.fresh_symbol(Rc::clone(name), sort));
        }

        let body = self.with_locals(
            vars.iter()
                .map(|var| (Rc::clone(&var.name), Term::Const(var.clone()))),
            |elaborator| elaborator.term(body),
        )?;
        expect_sort("quantifier body", &Sort::Bool, &body)?;

        self.terms.quantified(quantifier, vars.into(), body)
    }

    fn apply(&mut self, name: &Rc<str>, args: Vec<Term>) -> Result<Term, SmtLibError> {
        if let Some(op) = Op::from_name(name) {
            let (op, sort) = builtin(op, name, &args)?;
            return self.terms.app(op, args, sort);
        }

        match self.entries.get(name) {
            Some(Entry::Function { func, params }) => {
                expect_arity(name, &args, params.len(), Some(params.len()))?;
                for (param, arg) in params.iter().zip(&args) {
                    expect_sort(name, param, arg)?;
                }

                self.terms.apply(func.clone(), args)
            }

            Some(Entry::Macro { params, body }) => {
                expect_arity(name, &args, params.len(), Some(params.len()))?;
                for (param, arg) in params.iter().zip(&args) {
                    expect_sort(name, &param.sort, arg)?;
                }

                let substitution = params
                    .iter()
                    .map(|param| param.id)
                    .zip(args)
                    .collect::<HashMap<_, _>>();

                self.terms.substitute(body, &substitution)
            }

            Some(Entry::Const(_)) => Err(SmtLibError::ArityMismatch {
                name: name.to_string(),
                expected: "0".to_owned(),
                actual: args.len(),
            }),

            None if args.iter().any(|arg| arg.sort().is_foreign()) => {
                debug!("treating {name} as a foreign function");

                self.terms.opaque(Rc::clone(name), args, unknown_sort())
            }

            None => Err(SmtLibError::UnknownSymbol(name.to_string())),
        }
    }
}

/// Check the arguments of a built-in operator and compute its sort. The unary minus is told
/// apart from subtraction here.
fn builtin(op: Op, name: &str, args: &[Term]) -> Result<(Op, Sort), SmtLibError> {
    let result = match op {
        Op::Not => {
            expect_arity(name, args, 1, Some(1))?;
            expect_all(name, &Sort::Bool, args)?;
            (op, Sort::Bool)
        }

        Op::And | Op::Or => {
            expect_all(name, &Sort::Bool, args)?;
            (op, Sort::Bool)
        }

        Op::Xor | Op::Implies => {
            expect_arity(name, args, 2, None)?;
            expect_all(name, &Sort::Bool, args)?;
            (op, Sort::Bool)
        }

        Op::Eq | Op::Distinct => {
            expect_arity(name, args, 2, None)?;

            let known = args
                .iter()
                .map(Term::sort)
                .find(|sort| !sort.is_foreign())
                .unwrap_or_else(unknown_sort);
            expect_all(name, &known, args)?;

            (op, Sort::Bool)
        }

        Op::Ite => {
            expect_arity(name, args, 3, Some(3))?;
            expect_sort(name, &Sort::Bool, &args[0])?;

            let (then_sort, else_sort) = (args[1].sort(), args[2].sort());
            expect_sort(name, &then_sort, &args[2])?;

            let sort = if then_sort.is_foreign() {
                else_sort
            } else if then_sort.is_arithmetic() && else_sort.is_arithmetic() {
                join_numeric(args)
            } else {
                then_sort
            };

            (op, sort)
        }

        Op::Add | Op::Mul | Op::Sub => {
            expect_arity(name, args, 1, None)?;
            expect_all(name, &Sort::Real, args)?;

            let op = if op == Op::Sub && args.len() == 1 {
                Op::Neg
            } else {
                op
            };
            (op, join_numeric(args))
        }

        Op::Div => {
            expect_arity(name, args, 2, None)?;
            expect_all(name, &Sort::Real, args)?;
            (op, Sort::Real)
        }

        Op::IntDiv | Op::Mod => {
            let max = if op == Op::Mod { Some(2) } else { None };
            expect_arity(name, args, 2, max)?;
            expect_integers(name, args)?;
            (op, Sort::Int)
        }

        Op::Abs => {
            expect_arity(name, args, 1, Some(1))?;
            expect_all(name, &Sort::Real, args)?;
            (op, join_numeric(args))
        }

        Op::Le | Op::Lt | Op::Ge | Op::Gt => {
            expect_arity(name, args, 2, None)?;
            expect_all(name, &Sort::Real, args)?;
            (op, Sort::Bool)
        }

        Op::ToReal | Op::ToInt | Op::IsInt => {
            expect_arity(name, args, 1, Some(1))?;
            expect_all(name, &Sort::Real, args)?;

            let sort = match op {
                Op::ToReal => Sort::Real,
                Op::ToInt => Sort::Int,
                _ => Sort::Bool,
            };
            (op, sort)
        }

        Op::Neg => unreachable!("unary minus is not looked up by name"),
    };

    Ok(result)
}

fn join_numeric(args: &[Term]) -> Sort {
    if args.iter().any(|arg| arg.sort() == Sort::Real) {
        Sort::Real
    } else {
        Sort::Int
    }
}

fn expect_arity(
    name: &str,
    args: &[Term],
    min: usize,
    max: Option<usize>,
) -> Result<(), SmtLibError> {
    let fits = args.len() >= min && max.map_or(true, |max| args.len() <= max);
    if fits {
        return Ok(());
    }

    let expected = match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    };

    Err(SmtLibError::ArityMismatch {
        name: name.to_owned(),
        expected,
        actual: args.len(),
    })
}

fn expect_sort(context: &str, expected: &Sort, term: &Term) -> Result<(), SmtLibError> {
    let actual = term.sort();

    if actual.is_compatible_with(expected) {
        Ok(())
    } else {
        Err(SmtLibError::SortMismatch(format!(
            "{context} expects {expected}, but {} has sort {actual}",
            term.excerpt(EXCERPT_LEN)
        )))
    }
}

fn expect_all(context: &str, expected: &Sort, terms: &[Term]) -> Result<(), SmtLibError> {
    terms
        .iter()
        .try_for_each(|term| expect_sort(context, expected, term))
}

fn expect_integers(context: &str, terms: &[Term]) -> Result<(), SmtLibError> {
    for term in terms {
        let sort = term.sort();
        if sort != Sort::Int && !sort.is_foreign() {
            return Err(SmtLibError::SortMismatch(format!(
                "{context} expects Int, but {} has sort {sort}",
                term.excerpt(EXCERPT_LEN)
            )));
        }
    }

    Ok(())
}

/// The sort of opaque applications whose result sort cannot be known.
fn unknown_sort() -> Sort {
    Sort::Foreign("?".into())
}

fn bitvector_literal(
    terms: &mut TermTable,
    expr: &SExpr,
    width: usize,
) -> Result<Term, SmtLibError> {
    terms.opaque(
        expr.to_string().into(),
        vec![],
        Sort::Foreign(format!("(_ BitVec {width})").into()),
    )
}

/// Elaborate `(_ ...)` in term position. Only `(_ bvN w)` has a known sort.
fn indexed_constant(
    terms: &mut TermTable,
    expr: &SExpr,
    args: &[SExpr],
) -> Result<Term, SmtLibError> {
    match args {
        [SExpr::Symbol(name), SExpr::Numeral(width)] if name.starts_with("bv") => {
            if sexpr::parse_numeral(&name[2..]).is_none() {
                return Err(SmtLibError::InvalidLiteral(expr.to_string()));
            }

            terms.opaque(
                expr.to_string().into(),
                vec![],
                Sort::Foreign(format!("(_ BitVec {width})").into()),
            )
        }

        [SExpr::Symbol(_), ..] => terms.opaque(expr.to_string().into(), vec![], unknown_sort()),

        _ => Err(malformed(expr)),
    }
}

/// Many benchmarks write negative constants as symbols, such as `-5` or `-1.5`.
fn negative_literal(name: &str) -> Option<Term> {
    let magnitude = name.strip_prefix('-')?;

    if let Some(value) = sexpr::parse_numeral(magnitude) {
        return Some(Term::Numeral(-value));
    }

    sexpr::parse_decimal(magnitude).map(|value| Term::Decimal(-value))
}

fn scope_levels(args: &[SExpr], command: &SExpr) -> Result<usize, SmtLibError> {
    match args {
        [] => Ok(1),
        [SExpr::Numeral(levels)] => levels.to_usize().ok_or_else(|| malformed(command)),
        _ => Err(malformed(command)),
    }
}

fn symbol_name(expr: &SExpr, command: &SExpr) -> Result<Rc<str>, SmtLibError> {
    expr.as_symbol().cloned().ok_or_else(|| malformed(command))
}

fn malformed(expr: &SExpr) -> SmtLibError {
    SmtLibError::MalformedCommand(expr.to_string())
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use crate::parse_sexprs;

    use super::*;

    fn elaborate(source: &str) -> Result<Script, SmtLibError> {
        let mut elaborator = Elaborator::default();

        for command in parse_sexprs(source)? {
            if elaborator.command(&command)? == Flow::Stop {
                break;
            }
        }

        Ok(elaborator.finish())
    }

    #[test]
    fn let_bindings_are_parallel() {
        let script = elaborate(
            "(declare-const x Int)
             (assert (let ((x 1) (y x)) (= x y)))",
        )
        .unwrap();

        let Term::App { op, args, .. } = &script.assertions[0] else {
            panic!("expected an application");
        };

        assert_eq!(Op::Eq, *op);
        assert_eq!(Term::Numeral(BigInt::from(1)), args[0]);
        assert!(matches!(&args[1], Term::Const(symbol) if symbol.name.as_ref() == "x"));
    }

    #[test]
    fn macros_are_expanded() {
        let script = elaborate(
            "(define-fun double ((x Int)) Int (+ x x))
             (assert (= (double 2) 4))",
        )
        .unwrap();

        let Term::App { args, .. } = &script.assertions[0] else {
            panic!("expected an application");
        };

        assert_eq!("(+ 2 2)", args[0].to_string());
    }

    #[test]
    fn unary_minus_is_negation() {
        let script = elaborate("(declare-const x Real) (assert (< (- x) 0.5))").unwrap();

        let Term::App { args, .. } = &script.assertions[0] else {
            panic!("expected an application");
        };

        assert!(matches!(&args[0], Term::App { op: Op::Neg, sort: Sort::Real, .. }));
    }

    #[test]
    fn mixed_arithmetic_is_real() {
        let script =
            elaborate("(declare-const x Int) (declare-const y Real) (assert (> (+ x y) 0))")
                .unwrap();

        let Term::App { args, .. } = &script.assertions[0] else {
            panic!("expected an application");
        };

        assert_eq!(Sort::Real, args[0].sort());
    }

    #[test]
    fn pop_removes_scoped_assertions_and_declarations() {
        let script = elaborate(
            "(assert true)
             (push 1)
             (declare-const x Int)
             (assert (> x 0))
             (pop 1)
             (declare-const x Bool)
             (assert x)",
        )
        .unwrap();

        assert_eq!(2, script.assertions.len());
        assert_eq!(Sort::Bool, script.assertions[1].sort());
    }

    #[test]
    fn popping_too_far_is_an_error() {
        let result = elaborate("(push 1) (pop 2)");

        assert!(matches!(
            result,
            Err(SmtLibError::PopUnderflow {
                requested: 2,
                available: 1
            })
        ));
    }

    #[test]
    fn redeclaration_is_an_error() {
        let result = elaborate("(declare-const x Int) (declare-fun x () Real)");

        assert!(matches!(result, Err(SmtLibError::DuplicateDeclaration(name)) if name == "x"));
    }

    #[test]
    fn unknown_symbols_are_errors() {
        assert!(matches!(
            elaborate("(assert (> y 0))"),
            Err(SmtLibError::UnknownSymbol(name)) if name == "y"
        ));
    }

    #[test]
    fn non_boolean_assertions_are_errors() {
        assert!(matches!(
            elaborate("(declare-const x Int) (assert x)"),
            Err(SmtLibError::SortMismatch(_))
        ));
    }

    #[test]
    fn arity_is_checked() {
        assert!(matches!(
            elaborate("(declare-fun f (Int) Int) (assert (= (f 1 2) 0))"),
            Err(SmtLibError::ArityMismatch { actual: 2, .. })
        ));
        assert!(matches!(
            elaborate("(assert (not true false))"),
            Err(SmtLibError::ArityMismatch { actual: 2, .. })
        ));
    }

    #[test]
    fn foreign_theories_are_opaque() {
        let script = elaborate(
            "(declare-const a (_ BitVec 8))
             (assert (= (bvadd a #x01) (_ bv3 8)))",
        )
        .unwrap();

        let Term::App { args, .. } = &script.assertions[0] else {
            panic!("expected an application");
        };

        assert!(matches!(&args[0], Term::Opaque { head, .. } if head.as_ref() == "bvadd"));
        assert_eq!(Sort::Foreign("(_ BitVec 8)".into()), args[1].sort());
    }

    #[test]
    fn unsupported_commands_stop_elaboration() {
        let script = elaborate(
            "(assert false)
             (declare-datatypes ((List 0)) (((nil) (cons (head Int) (tail List)))))
             (assert (undeclared))",
        )
        .unwrap();

        assert_eq!(Some("declare-datatypes".into()), script.unsupported);
        assert_eq!(1, script.assertions.len());
    }

    #[test]
    fn exit_stops_elaboration() {
        let script = elaborate("(exit) (assert (undeclared 1))").unwrap();

        assert!(script.assertions.is_empty());
        assert_eq!(None, script.unsupported);
    }

    #[test]
    fn negative_number_symbols_are_literals() {
        let script = elaborate("(declare-const x Int) (assert (> x -5))").unwrap();

        let Term::App { args, .. } = &script.assertions[0] else {
            panic!("expected an application");
        };

        assert_eq!(Term::Numeral(BigInt::from(-5)), args[1]);
    }

    #[test]
    fn quantified_variables_shadow_constants() {
        let script = elaborate(
            "(declare-const x Bool)
             (assert (forall ((x Int)) (>= (* x x) 0)))",
        )
        .unwrap();

        assert!(matches!(
            &script.assertions[0],
            Term::Quantified { vars, .. } if vars[0].sort == Sort::Int
        ));
    }

    #[test]
    fn unknown_commands_are_errors() {
        assert!(matches!(
            elaborate("(frobnicate)"),
            Err(SmtLibError::UnknownCommand(name)) if name == "frobnicate"
        ));
    }

    #[test]
    fn unknown_sorts_are_errors() {
        assert!(matches!(
            elaborate("(declare-const x Innt)"),
            Err(SmtLibError::UnknownSymbol(name)) if name == "Innt"
        ));
        assert!(matches!(
            elaborate("(declare-fun f ((Lisst Int)) Int)"),
            Err(SmtLibError::UnknownSymbol(name)) if name == "Lisst"
        ));
        assert!(matches!(
            elaborate("(declare-const a (Array Int Reall))"),
            Err(SmtLibError::UnknownSymbol(name)) if name == "Reall"
        ));
    }

    #[test]
    fn theory_sorts_are_foreign() {
        let script = elaborate(
            "(declare-sort U 0)
             (declare-const s String)
             (declare-const a (Array Int U))
             (declare-const f (_ FloatingPoint 8 24))
             (assert (= (select a 0) (select a 1)))",
        )
        .unwrap();

        assert_eq!(1, script.assertions.len());
    }

    #[test]
    fn let_bound_terms_are_shared() {
        let script = elaborate(
            "(declare-const x Int)
             (assert (let ((a (+ x 1))) (let ((b (+ a a))) (> (+ b b) 0))))",
        )
        .unwrap();

        let Term::App { args, .. } = &script.assertions[0] else {
            panic!("expected an application");
        };
        let Term::App { args: sum, .. } = &args[0] else {
            panic!("expected a sum");
        };

        assert_eq!(sum[0], sum[1]);
        assert_eq!(3, args[0].depth());
    }

    #[test]
    fn macro_bodies_with_shared_subterms_expand_in_linear_time() {
        let depth = 40;
        let mut body = format!("a{depth}");
        for i in (1..=depth).rev() {
            body = format!("(let ((a{i} (+ a{} a{}))) {body})", i - 1, i - 1);
        }

        let source = format!(
            "(declare-const x Int)
             (define-fun f ((a0 Int)) Int {body})
             (assert (> (f x) 0))"
        );

        let script = elaborate(&source).unwrap();

        let Term::App { args, .. } = &script.assertions[0] else {
            panic!("expected an application");
        };
        let Term::App { args: sum, .. } = &args[0] else {
            panic!("expected a sum");
        };

        assert_eq!(depth, args[0].depth());
        assert_eq!(sum[0], sum[1]);
    }

    #[test]
    fn equal_terms_from_separate_commands_are_equal() {
        let script = elaborate(
            "(declare-const x Int)
             (assert (> (+ x 1) 0))
             (assert (< (+ x 1) 5))",
        )
        .unwrap();

        let [Term::App { args: first, .. }, Term::App { args: second, .. }] =
            script.assertions.as_slice()
        else {
            panic!("expected two applications");
        };

        assert_eq!(first[0], second[0]);
    }
}
