use std::{
    collections::HashMap,
    fmt::{self, Display},
    hash::{Hash, Hasher},
    mem,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Signed;

use crate::{SmtLibError, MAX_TERM_DEPTH};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    Int,
    Real,
    /// A sort outside of the core and arithmetic theories, named by its source text. Terms of a
    /// foreign sort are opaque and may be used wherever any sort is expected.
    Foreign(Rc<str>),
}

impl Sort {
    pub fn is_foreign(&self) -> bool {
        matches!(self, Sort::Foreign(_))
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Sort::Int | Sort::Real)
    }

    /// Whether a term of this sort may stand where a term of `other` is expected. Int and Real
    /// mix freely, and foreign sorts are compatible with everything.
    pub fn is_compatible_with(&self, other: &Sort) -> bool {
        self == other
            || self.is_foreign()
            || other.is_foreign()
            || (self.is_arithmetic() && other.is_arithmetic())
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
            Sort::Real => write!(f, "Real"),
            Sort::Foreign(name) => write!(f, "{name}"),
        }
    }
}

/// A declared constant, function, or bound variable. Symbols with the same name are told apart by
/// their id, so shadowing binders never capture each other.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub name: Rc<str>,
    pub id: u32,
    /// The sort of the symbol, or its result sort for functions.
    pub sort: Sort,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Not,
    And,
    Or,
    Xor,
    Implies,
    Eq,
    Distinct,
    Ite,
    Add,
    Sub,
    Neg,
    Mul,
    Div,
    IntDiv,
    Mod,
    Abs,
    Le,
    Lt,
    Ge,
    Gt,
    ToReal,
    ToInt,
    IsInt,
}

impl Op {
    /// Look up an operator by its SMT-LIB name. The unary minus shares its name with subtraction
    /// and is resolved during elaboration.
    pub fn from_name(name: &str) -> Option<Op> {
        let op = match name {
            "not" => Op::Not,
            "and" => Op::And,
            "or" => Op::Or,
            "xor" => Op::Xor,
            "=>" => Op::Implies,
            "=" => Op::Eq,
            "distinct" => Op::Distinct,
            "ite" => Op::Ite,
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "/" => Op::Div,
            "div" => Op::IntDiv,
            "mod" => Op::Mod,
            "abs" => Op::Abs,
            "<=" => Op::Le,
            "<" => Op::Lt,
            ">=" => Op::Ge,
            ">" => Op::Gt,
            "to_real" => Op::ToReal,
            "to_int" => Op::ToInt,
            "is_int" => Op::IsInt,
            _ => return None,
        };

        Some(op)
    }

    pub fn name(self) -> &'static str {
        match self {
            Op::Not => "not",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::Implies => "=>",
            Op::Eq => "=",
            Op::Distinct => "distinct",
            Op::Ite => "ite",
            Op::Add => "+",
            Op::Sub | Op::Neg => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::IntDiv => "div",
            Op::Mod => "mod",
            Op::Abs => "abs",
            Op::Le => "<=",
            Op::Lt => "<",
            Op::Ge => ">=",
            Op::Gt => ">",
            Op::ToReal => "to_real",
            Op::ToInt => "to_int",
            Op::IsInt => "is_int",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quantifier {
    Forall,
    Exists,
}

/// Identifies a compound term. Terms built by one [`TermTable`] are hash-consed, so equal ids
/// mean equal terms and comparing or hashing a term never walks its subterms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    id: u64,
    depth: u32,
}

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// An elaborated, well-sorted term. Subterms are shared, so cloning is cheap.
#[derive(Clone, Debug)]
pub enum Term {
    Bool(bool),
    Numeral(BigInt),
    Decimal(BigRational),
    Const(Symbol),
    /// An application of a built-in operator of the core or arithmetic theories.
    App {
        node: NodeId,
        op: Op,
        args: Rc<[Term]>,
        sort: Sort,
    },
    /// An application of a declared, uninterpreted function.
    Apply {
        node: NodeId,
        func: Symbol,
        args: Rc<[Term]>,
    },
    Quantified {
        node: NodeId,
        quantifier: Quantifier,
        vars: Rc<[Symbol]>,
        body: Rc<Term>,
    },
    /// A term from a theory that is not reasoned about, such as a bit-vector literal or an
    /// array select.
    Opaque {
        node: NodeId,
        head: Rc<str>,
        args: Rc<[Term]>,
        sort: Sort,
    },
}

impl Term {
    pub fn sort(&self) -> Sort {
        match self {
            Term::Bool(_) | Term::Quantified { .. } => Sort::Bool,
            Term::Numeral(_) => Sort::Int,
            Term::Decimal(_) => Sort::Real,
            Term::Const(symbol) => symbol.sort.clone(),
            Term::App { sort, .. } | Term::Opaque { sort, .. } => sort.clone(),
            Term::Apply { func, .. } => func.sort.clone(),
        }
    }

    /// The length of the longest path from this term to a leaf. Constants and literals have
    /// depth zero.
    pub fn depth(&self) -> usize {
        self.node().map_or(0, |node| node.depth as usize)
    }

    /// Render the term, cut off after `limit` bytes. Shared subterms are rendered at every
    /// occurrence, so the full text can be exponentially longer than the term.
    pub fn excerpt(&self, limit: usize) -> String {
        struct Bounded {
            text: String,
            limit: usize,
        }

        impl fmt::Write for Bounded {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                let room = self.limit.saturating_sub(self.text.len());
                if s.len() <= room {
                    self.text.push_str(s);
                    return Ok(());
                }

                let mut end = room;
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                self.text.push_str(&s[..end]);
                Err(fmt::Error)
            }
        }

        let mut bounded = Bounded {
            text: String::new(),
            limit,
        };
        if fmt::Write::write_fmt(&mut bounded, format_args!("{self}")).is_err() {
            bounded.text.push_str("...");
        }

        bounded.text
    }

    fn node(&self) -> Option<NodeId> {
        match self {
            Term::App { node, .. }
            | Term::Apply { node, .. }
            | Term::Quantified { node, .. }
            | Term::Opaque { node, .. } => Some(*node),
            Term::Bool(_) | Term::Numeral(_) | Term::Decimal(_) | Term::Const(_) => None,
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Term) -> bool {
        match (self, other) {
            (Term::Bool(a), Term::Bool(b)) => a == b,
            (Term::Numeral(a), Term::Numeral(b)) => a == b,
            (Term::Decimal(a), Term::Decimal(b)) => a == b,
            (Term::Const(a), Term::Const(b)) => a == b,
            _ => matches!((self.node(), other.node()), (Some(a), Some(b)) if a == b),
        }
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);

        match self {
            Term::Bool(value) => value.hash(state),
            Term::Numeral(value) => value.hash(state),
            Term::Decimal(value) => value.hash(state),
            Term::Const(symbol) => symbol.hash(state),
            _ => self.node().hash(state),
        }
    }
}

/// The shape of a compound term, with its direct subterms.
#[derive(PartialEq, Eq, Hash)]
enum NodeKey {
    App(Op, Sort, Rc<[Term]>),
    Apply(Symbol, Rc<[Term]>),
    Quantified(Quantifier, Rc<[Symbol]>, Term),
    Opaque(Rc<str>, Sort, Rc<[Term]>),
}

impl NodeKey {
    fn children(&self) -> &[Term] {
        match self {
            NodeKey::App(_, _, args) | NodeKey::Apply(_, args) | NodeKey::Opaque(_, _, args) => {
                args
            }
            NodeKey::Quantified(_, _, body) => std::slice::from_ref(body),
        }
    }
}

/// Builds compound terms, handing out the existing term when an equal one was built before.
/// Terms deeper than [`MAX_TERM_DEPTH`] are rejected.
#[derive(Default)]
pub(crate) struct TermTable {
    nodes: HashMap<NodeKey, Term>,
}

impl TermTable {
    pub(crate) fn app(&mut self, op: Op, args: Vec<Term>, sort: Sort) -> Result<Term, SmtLibError> {
        self.intern(NodeKey::App(op, sort, args.into()))
    }

    pub(crate) fn apply(&mut self, func: Symbol, args: Vec<Term>) -> Result<Term, SmtLibError> {
        self.intern(NodeKey::Apply(func, args.into()))
    }

    pub(crate) fn quantified(
        &mut self,
        quantifier: Quantifier,
        vars: Rc<[Symbol]>,
        body: Term,
    ) -> Result<Term, SmtLibError> {
        self.intern(NodeKey::Quantified(quantifier, vars, body))
    }

    pub(crate) fn opaque(
        &mut self,
        head: Rc<str>,
        args: Vec<Term>,
        sort: Sort,
    ) -> Result<Term, SmtLibError> {
        self.intern(NodeKey::Opaque(head, sort, args.into()))
    }

    /// Replace the symbols with the given ids by terms. Shared subterms are rewritten once.
    pub(crate) fn substitute(
        &mut self,
        term: &Term,
        substitution: &HashMap<u32, Term>,
    ) -> Result<Term, SmtLibError> {
        let mut rewritten = HashMap::new();
        self.substitute_shared(term, substitution, &mut rewritten)
    }

    fn substitute_shared(
        &mut self,
        term: &Term,
        substitution: &HashMap<u32, Term>,
        rewritten: &mut HashMap<Term, Term>,
    ) -> Result<Term, SmtLibError> {
        if let Some(result) = rewritten.get(term) {
            return Ok(result.clone());
        }

        let mut substitute_all = |table: &mut TermTable, args: &[Term]| {
            args.iter()
                .map(|arg| table.substitute_shared(arg, substitution, rewritten))
                .collect::<Result<Vec<_>, _>>()
        };

        let result = match term {
            Term::Const(symbol) => substitution
                .get(&symbol.id)
                .cloned()
                .unwrap_or_else(|| term.clone()),

            Term::App { op, args, sort, .. } => {
                let args = substitute_all(self, args)?;
                self.app(*op, args, sort.clone())?
            }

            Term::Apply { func, args, .. } => {
                let args = substitute_all(self, args)?;
                self.apply(func.clone(), args)?
            }

            Term::Quantified {
                quantifier,
                vars,
                body,
                ..
            } => {
                let body = self.substitute_shared(body, substitution, rewritten)?;
                self.quantified(*quantifier, Rc::clone(vars), body)?
            }

            Term::Opaque {
                head, args, sort, ..
            } => {
                let args = substitute_all(self, args)?;
                self.opaque(Rc::clone(head), args, sort.clone())?
            }

            Term::Bool(_) | Term::Numeral(_) | Term::Decimal(_) => term.clone(),
        };

        rewritten.insert(term.clone(), result.clone());
        Ok(result)
    }

    fn intern(&mut self, key: NodeKey) -> Result<Term, SmtLibError> {
        if let Some(term) = self.nodes.get(&key) {
            return Ok(term.clone());
        }

        let depth = 1 + key.children().iter().map(Term::depth).max().unwrap_or(0);
        if depth > MAX_TERM_DEPTH {
            return Err(SmtLibError::NestingTooDeep {
                limit: MAX_TERM_DEPTH,
            });
        }

        let node = NodeId {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            depth: depth as u32,
        };

        let term = match &key {
            NodeKey::App(op, sort, args) => Term::App {
                node,
                op: *op,
                args: Rc::clone(args),
                sort: sort.clone(),
            },
            NodeKey::Apply(func, args) => Term::Apply {
                node,
                func: func.clone(),
                args: Rc::clone(args),
            },
            NodeKey::Quantified(quantifier, vars, body) => Term::Quantified {
                node,
                quantifier: *quantifier,
                vars: Rc::clone(vars),
                body: Rc::new(body.clone()),
            },
            NodeKey::Opaque(head, sort, args) => Term::Opaque {
                node,
                head: Rc::clone(head),
                args: Rc::clone(args),
                sort: sort.clone(),
            },
        };

        self.nodes.insert(key, term.clone());
        Ok(term)
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn application(
            f: &mut std::fmt::Formatter<'_>,
            head: &str,
            args: &[Term],
        ) -> std::fmt::Result {
            if args.is_empty() {
                return write!(f, "{head}");
            }

            write!(f, "({head}")?;
            for arg in args {
                write!(f, " {arg}")?;
            }
            write!(f, ")")
        }

        match self {
            Term::Bool(value) => write!(f, "{value}"),
            Term::Numeral(value) if value.is_negative() => write!(f, "(- {})", -value),
            Term::Numeral(value) => write!(f, "{value}"),
            Term::Decimal(value) if value.is_integer() => write!(f, "{value}.0"),
            Term::Decimal(value) => write!(f, "(/ {} {})", value.numer(), value.denom()),
            Term::Const(symbol) => write!(f, "{}", symbol.name),
            Term::App { op, args, .. } => application(f, op.name(), args),
            Term::Apply { func, args, .. } => application(f, &func.name, args),
            Term::Quantified {
                quantifier,
                vars,
                body,
                ..
            } => {
                let keyword = match quantifier {
                    Quantifier::Forall => "forall",
                    Quantifier::Exists => "exists",
                };

                write!(f, "({keyword} (")?;
                for (idx, var) in vars.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "({} {})", var.name, var.sort)?;
                }
                write!(f, ") {body})")
            }
            Term::Opaque { head, args, .. } => application(f, head, args),
        }
    }
}
