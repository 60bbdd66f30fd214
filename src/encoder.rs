use std::{
    collections::{BTreeMap, HashMap, HashSet},
    iter,
};

use log::debug;
use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use smtcheck_core::{
    arith::{ArithVar, DeltaRational, VarKind},
    lit::Lit,
    SmtSolver,
};
use smtcheck_smtlib::{Op, Sort, Term};

/// How much of an abstracted term the log shows.
const EXCERPT_LEN: usize = 200;

/// A linear combination of arithmetic variables plus a constant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct LinearForm {
    coeffs: BTreeMap<ArithVar, BigRational>,
    constant: BigRational,
}

impl LinearForm {
    fn constant(value: BigRational) -> Self {
        LinearForm {
            coeffs: BTreeMap::new(),
            constant: value,
        }
    }

    fn var(var: ArithVar) -> Self {
        LinearForm {
            coeffs: BTreeMap::from([(var, BigRational::one())]),
            constant: BigRational::zero(),
        }
    }

    fn as_constant(&self) -> Option<&BigRational> {
        self.coeffs.is_empty().then_some(&self.constant)
    }

    fn plus(mut self, other: &LinearForm) -> Self {
        for (var, coeff) in other.coeffs.iter() {
            let entry = self.coeffs.entry(*var).or_insert_with(BigRational::zero);
            *entry += coeff;

            if entry.is_zero() {
                self.coeffs.remove(var);
            }
        }

        self.constant += &other.constant;
        self
    }

    fn minus(self, other: &LinearForm) -> Self {
        self.plus(&other.clone().negated())
    }

    fn scaled(mut self, factor: &BigRational) -> Self {
        if factor.is_zero() {
            return LinearForm::default();
        }

        for coeff in self.coeffs.values_mut() {
            *coeff *= factor;
        }

        self.constant *= factor;
        self
    }

    fn negated(self) -> Self {
        self.scaled(&-BigRational::one())
    }
}

/// Lowers terms into clauses over the solver's boolean variables and bound atoms of its
/// arithmetic theory.
///
/// Terms outside of linear arithmetic are replaced by fresh, unconstrained variables. This
/// over-approximates the assertions, so an unsatisfiable encoding still proves the assertions
/// unsatisfiable, but a model of the encoding proves nothing. [`Encoder::is_exact`] tells the two
/// situations apart.
pub(crate) struct Encoder<'solver> {
    solver: &'solver mut SmtSolver,

    bools: HashMap<Term, Lit>,
    forms: HashMap<Term, LinearForm>,
    true_lit: Option<Lit>,

    num_abstractions: usize,
}

impl<'solver> Encoder<'solver> {
    pub(crate) fn new(solver: &'solver mut SmtSolver) -> Self {
        Encoder {
            solver,
            bools: HashMap::new(),
            forms: HashMap::new(),
            true_lit: None,
            num_abstractions: 0,
        }
    }

    pub(crate) fn is_exact(&self) -> bool {
        self.num_abstractions == 0
    }

    pub(crate) fn num_abstractions(&self) -> usize {
        self.num_abstractions
    }

    /// Add `term` as a unit clause. Conjunctions are split into one clause per conjunct.
    pub(crate) fn assert(&mut self, term: &Term) {
        let mut pending = vec![term.clone()];
        let mut seen = HashSet::new();

        while let Some(term) = pending.pop() {
            if !seen.insert(term.clone()) {
                continue;
            }

            if let Term::App {
                op: Op::And, args, ..
            } = &term
            {
                pending.extend(args.iter().rev().cloned());
                continue;
            }

            let lit = self.lit(&term);
            self.solver.add_clause([lit]);
        }
    }

    fn lit(&mut self, term: &Term) -> Lit {
        if let Some(&lit) = self.bools.get(term) {
            return lit;
        }

        let lit = match term {
            Term::Bool(value) => self.constant_lit(*value),
            Term::Const(symbol) if symbol.sort == Sort::Bool => self.fresh_lit(),
            Term::App { op, args, .. } => self.encode_bool_app(term, *op, args),
            _ => self.abstract_bool(term),
        };

        self.bools.insert(term.clone(), lit);
        lit
    }

    fn lits(&mut self, terms: &[Term]) -> Vec<Lit> {
        terms.iter().map(|term| self.lit(term)).collect()
    }

    fn encode_bool_app(&mut self, term: &Term, op: Op, args: &[Term]) -> Lit {
        match op {
            Op::Not => !self.lit(&args[0]),

            Op::And => {
                let lits = self.lits(args);
                self.and(&lits)
            }

            Op::Or => {
                let lits = self.lits(args);
                self.or(&lits)
            }

            Op::Xor => {
                let lits = self.lits(args);
                lits[1..]
                    .iter()
                    .fold(lits[0], |acc, &lit| !self.iff(acc, lit))
            }

            // Right associative: a => (b => c) is (not a) or (not b) or c.
            Op::Implies => {
                let lits = self.lits(args);
                let (conclusion, premises) = lits.split_last().expect("at least two arguments");

                let clause = premises
                    .iter()
                    .map(|&premise| !premise)
                    .chain(iter::once(*conclusion))
                    .collect::<Vec<_>>();
                self.or(&clause)
            }

            Op::Ite => {
                let condition = self.lit(&args[0]);
                let then_lit = self.lit(&args[1]);
                let else_lit = self.lit(&args[2]);
                self.ite(condition, then_lit, else_lit)
            }

            Op::Eq => self.equality(term, args, false),
            Op::Distinct => self.equality(term, args, true),

            Op::Le | Op::Lt | Op::Ge | Op::Gt => {
                let forms = args.iter().map(|arg| self.linear(arg)).collect::<Vec<_>>();
                let links = forms
                    .windows(2)
                    .map(|pair| self.compare(op, &pair[0], &pair[1]))
                    .collect::<Vec<_>>();

                self.and(&links)
            }

            Op::IsInt => {
                let form = self.linear(&args[0]);
                let floor = self.to_int(&form);
                self.equal(floor.minus(&form))
            }

            _ => self.abstract_bool(term),
        }
    }

    /// Encode a chained `=`, or a pairwise `distinct` when `distinct` is set.
    fn equality(&mut self, term: &Term, args: &[Term], distinct: bool) -> Lit {
        let sorts = args.iter().map(Term::sort).collect::<Vec<_>>();

        let pairs = if distinct {
            (0..args.len())
                .flat_map(|i| (i + 1..args.len()).map(move |j| (i, j)))
                .collect::<Vec<_>>()
        } else {
            (1..args.len()).map(|i| (i - 1, i)).collect()
        };

        let links = if sorts.contains(&Sort::Bool) {
            let lits = self.lits(args);
            pairs
                .into_iter()
                .map(|(i, j)| self.iff(lits[i], lits[j]))
                .collect::<Vec<_>>()
        } else if sorts.iter().all(Sort::is_arithmetic) {
            let forms = args.iter().map(|arg| self.linear(arg)).collect::<Vec<_>>();
            pairs
                .into_iter()
                .map(|(i, j)| self.equal(forms[i].clone().minus(&forms[j])))
                .collect()
        } else {
            return self.abstract_bool(term);
        };

        if distinct {
            let negated = links.into_iter().map(|lit| !lit).collect::<Vec<_>>();
            self.and(&negated)
        } else {
            self.and(&links)
        }
    }

    fn compare(&mut self, op: Op, lhs: &LinearForm, rhs: &LinearForm) -> Lit {
        let diff = lhs.clone().minus(rhs);

        match op {
            Op::Le => self.bound(diff, false),
            Op::Lt => self.bound(diff, true),
            Op::Ge => self.bound(diff.negated(), false),
            Op::Gt => self.bound(diff.negated(), true),
            _ => unreachable!("{op:?} is not a comparison"),
        }
    }

    fn linear(&mut self, term: &Term) -> LinearForm {
        if let Some(form) = self.forms.get(term) {
            return form.clone();
        }

        let form = match term {
            Term::Numeral(value) => LinearForm::constant(BigRational::from_integer(value.clone())),
            Term::Decimal(value) => LinearForm::constant(value.clone()),
            Term::Const(symbol) if symbol.sort.is_arithmetic() => self.fresh_form(&symbol.sort),
            Term::App { op, args, sort, .. } => self.encode_arith_app(term, *op, args, sort),
            _ => self.abstract_arith(term),
        };

        self.forms.insert(term.clone(), form.clone());
        form
    }

    fn encode_arith_app(&mut self, term: &Term, op: Op, args: &[Term], sort: &Sort) -> LinearForm {
        match op {
            Op::Add => args.iter().fold(LinearForm::default(), |sum, arg| {
                let form = self.linear(arg);
                sum.plus(&form)
            }),

            Op::Sub => {
                let forms = args.iter().map(|arg| self.linear(arg)).collect::<Vec<_>>();
                forms[1..]
                    .iter()
                    .fold(forms[0].clone(), |diff, form| diff.minus(form))
            }

            Op::Neg => self.linear(&args[0]).negated(),

            Op::Mul => {
                let mut product = LinearForm::constant(BigRational::one());

                for arg in args {
                    let form = self.linear(arg);

                    product = if let Some(factor) = product.as_constant() {
                        form.scaled(factor)
                    } else if let Some(factor) = form.as_constant() {
                        product.scaled(factor)
                    } else {
                        return self.abstract_arith(term);
                    };
                }

                product
            }

            Op::Div => {
                let forms = args.iter().map(|arg| self.linear(arg)).collect::<Vec<_>>();
                let mut quotient = forms[0].clone();

                for divisor in &forms[1..] {
                    match divisor.as_constant() {
                        Some(divisor) if !divisor.is_zero() => {
                            quotient = quotient.scaled(&divisor.recip());
                        }
                        _ => return self.abstract_arith(term),
                    }
                }

                quotient
            }

            Op::IntDiv | Op::Mod => {
                let forms = args.iter().map(|arg| self.linear(arg)).collect::<Vec<_>>();
                let mut value = forms[0].clone();

                for divisor in &forms[1..] {
                    let Some(divisor) = divisor
                        .as_constant()
                        .filter(|divisor| divisor.is_integer() && !divisor.is_zero())
                        .cloned()
                    else {
                        return self.abstract_arith(term);
                    };

                    let (quotient, remainder) = self.euclidean_division(&value, &divisor);
                    value = if op == Op::Mod { remainder } else { quotient };
                }

                value
            }

            Op::Abs => {
                let form = self.linear(&args[0]);
                let is_non_negative = self.bound(form.clone().negated(), false);
                let negated = form.clone().negated();

                self.arith_ite(is_non_negative, &form, &negated, sort)
            }

            Op::Ite => {
                let condition = self.lit(&args[0]);
                let then_form = self.linear(&args[1]);
                let else_form = self.linear(&args[2]);

                self.arith_ite(condition, &then_form, &else_form, sort)
            }

            Op::ToReal => self.linear(&args[0]),

            Op::ToInt => {
                let form = self.linear(&args[0]);
                self.to_int(&form)
            }

            _ => self.abstract_arith(term),
        }
    }

    /// Introduce `q` and `r` with `value = divisor * q + r` and `0 <= r < |divisor|`.
    fn euclidean_division(
        &mut self,
        value: &LinearForm,
        divisor: &BigRational,
    ) -> (LinearForm, LinearForm) {
        let quotient = self.fresh_form(&Sort::Int);
        let remainder = self.fresh_form(&Sort::Int);

        let definition = value
            .clone()
            .minus(&quotient.clone().scaled(divisor).plus(&remainder));
        let definition = self.equal(definition);

        let lower = self.bound(remainder.clone().negated(), false);
        let upper = self.bound(
            remainder
                .clone()
                .minus(&LinearForm::constant(divisor.abs() - BigRational::one())),
            false,
        );

        for lit in [definition, lower, upper] {
            self.solver.add_clause([lit]);
        }

        (quotient, remainder)
    }

    /// Introduce an integer `i` with `i <= value < i + 1`.
    fn to_int(&mut self, value: &LinearForm) -> LinearForm {
        let floor = self.fresh_form(&Sort::Int);

        let below = self.bound(floor.clone().minus(value), false);
        let above = self.bound(
            value
                .clone()
                .minus(&floor)
                .minus(&LinearForm::constant(BigRational::one())),
            true,
        );

        self.solver.add_clause([below]);
        self.solver.add_clause([above]);

        floor
    }

    fn arith_ite(
        &mut self,
        condition: Lit,
        then_form: &LinearForm,
        else_form: &LinearForm,
        sort: &Sort,
    ) -> LinearForm {
        let result = self.fresh_form(sort);

        let is_then = self.equal(result.clone().minus(then_form));
        let is_else = self.equal(result.clone().minus(else_form));

        self.solver.add_clause([!condition, is_then]);
        self.solver.add_clause([condition, is_else]);

        result
    }

    /// The literal for `diff = 0`.
    fn equal(&mut self, diff: LinearForm) -> Lit {
        if let Some(constant) = diff.as_constant() {
            let holds = constant.is_zero();
            return self.constant_lit(holds);
        }

        if self.is_integral(&diff) {
            let (_, gcd, constant) = integral_parts(&diff);

            if !constant.is_multiple_of(&gcd) {
                debug!("{diff:?} = 0 has no integer solutions");
                return self.constant_lit(false);
            }
        }

        let upper = self.bound(diff.clone(), false);
        let lower = self.bound(diff.negated(), false);
        self.and(&[upper, lower])
    }

    /// The literal for `form <= 0`, or `form < 0` when `strict` is set.
    ///
    /// Forms are normalized so that equivalent bounds end up as the same atom. Integer forms get
    /// coprime integer coefficients and a tightened, non-strict constant. Other forms get a
    /// leading coefficient of one, and strictness moves into the infinitesimal part of the bound.
    /// Bounds with a negative leading coefficient are expressed as the negation of an atom over
    /// the flipped form.
    fn bound(&mut self, form: LinearForm, strict: bool) -> Lit {
        if let Some(constant) = form.as_constant() {
            let holds = if strict {
                constant.is_negative()
            } else {
                !constant.is_positive()
            };
            return self.constant_lit(holds);
        }

        let (terms, bound, epsilon) = if self.is_integral(&form) {
            let (coeffs, gcd, constant) = integral_parts(&form);
            let rhs = if strict { -constant - 1 } else { -constant };

            let terms = coeffs
                .into_iter()
                .map(|(var, coeff)| (var, BigRational::from_integer(coeff / &gcd)))
                .collect::<Vec<_>>();

            (
                terms,
                DeltaRational::from(rhs.div_floor(&gcd)),
                DeltaRational::from(BigInt::one()),
            )
        } else {
            let leading = form
                .coeffs
                .values()
                .next()
                .expect("form is not constant")
                .abs();
            let scale = leading.recip();

            let terms = form
                .coeffs
                .iter()
                .map(|(var, coeff)| (*var, coeff * &scale))
                .collect::<Vec<_>>();

            let value = DeltaRational::from(-(&form.constant * &scale));
            let bound = if strict {
                &value - &DeltaRational::delta()
            } else {
                value
            };

            (terms, bound, DeltaRational::delta())
        };

        if terms[0].1.is_negative() {
            // sum(t) <= b  iff  not (sum(-t) <= -b - epsilon)
            let flipped = terms
                .iter()
                .map(|(var, coeff)| (*var, -coeff))
                .collect::<Vec<_>>();

            let slack = self.solver.theory_mut().slack_for(&flipped);
            !self.atom(slack, &(-&bound) - &epsilon)
        } else {
            let slack = self.solver.theory_mut().slack_for(&terms);
            self.atom(slack, bound)
        }
    }

    fn atom(&mut self, var: ArithVar, bound: DeltaRational) -> Lit {
        if let Some(lit_var) = self.solver.theory().atom(var, &bound) {
            return Lit::positive(lit_var);
        }

        let lit_var = self.solver.new_var();
        self.solver.theory_mut().register_atom(lit_var, var, bound);

        Lit::positive(lit_var)
    }

    fn is_integral(&self, form: &LinearForm) -> bool {
        form.coeffs
            .keys()
            .all(|&var| self.solver.theory().kind(var) == VarKind::Int)
    }

    fn fresh_form(&mut self, sort: &Sort) -> LinearForm {
        let kind = match sort {
            Sort::Int => VarKind::Int,
            _ => VarKind::Real,
        };

        LinearForm::var(self.solver.theory_mut().new_var(kind))
    }

    fn fresh_lit(&mut self) -> Lit {
        Lit::positive(self.solver.new_var())
    }

    fn constant_lit(&mut self, value: bool) -> Lit {
        let true_lit = match self.true_lit {
            Some(lit) => lit,
            None => {
                let lit = self.fresh_lit();
                self.solver.add_clause([lit]);
                self.true_lit = Some(lit);
                lit
            }
        };

        if value {
            true_lit
        } else {
            !true_lit
        }
    }

    fn abstract_bool(&mut self, term: &Term) -> Lit {
        debug!("abstracting {} by a fresh proposition", term.excerpt(EXCERPT_LEN));
        self.num_abstractions += 1;
        self.fresh_lit()
    }

    fn abstract_arith(&mut self, term: &Term) -> LinearForm {
        debug!("abstracting {} by a fresh variable", term.excerpt(EXCERPT_LEN));
        self.num_abstractions += 1;
        self.fresh_form(&term.sort())
    }

    fn and(&mut self, lits: &[Lit]) -> Lit {
        match lits {
            [] => self.constant_lit(true),
            [lit] => *lit,
            _ => {
                let conjunction = self.fresh_lit();

                for &lit in lits {
                    self.solver.add_clause([!conjunction, lit]);
                }
                self.solver.add_clause(
                    iter::once(conjunction).chain(lits.iter().map(|&lit| !lit)),
                );

                conjunction
            }
        }
    }

    fn or(&mut self, lits: &[Lit]) -> Lit {
        let negated = lits.iter().map(|&lit| !lit).collect::<Vec<_>>();
        !self.and(&negated)
    }

    fn iff(&mut self, a: Lit, b: Lit) -> Lit {
        if a == b {
            return self.constant_lit(true);
        }
        if a == !b {
            return self.constant_lit(false);
        }

        let equivalence = self.fresh_lit();
        self.solver.add_clause([!equivalence, !a, b]);
        self.solver.add_clause([!equivalence, a, !b]);
        self.solver.add_clause([equivalence, a, b]);
        self.solver.add_clause([equivalence, !a, !b]);

        equivalence
    }

    fn ite(&mut self, condition: Lit, then_lit: Lit, else_lit: Lit) -> Lit {
        let result = self.fresh_lit();
        self.solver.add_clause([!condition, !result, then_lit]);
        self.solver.add_clause([!condition, result, !then_lit]);
        self.solver.add_clause([condition, !result, else_lit]);
        self.solver.add_clause([condition, result, !else_lit]);

        result
    }
}

/// Scale a form over integer variables to integer coefficients. Returns the coefficients, their
/// gcd, and the scaled constant.
fn integral_parts(form: &LinearForm) -> (Vec<(ArithVar, BigInt)>, BigInt, BigInt) {
    let lcm = form
        .coeffs
        .values()
        .chain(iter::once(&form.constant))
        .fold(BigInt::one(), |lcm, value| lcm.lcm(value.denom()));
    let lcm = BigRational::from_integer(lcm);

    let coeffs = form
        .coeffs
        .iter()
        .map(|(var, coeff)| (*var, (coeff * &lcm).to_integer()))
        .collect::<Vec<_>>();
    let gcd = coeffs
        .iter()
        .fold(BigInt::zero(), |gcd, (_, coeff)| gcd.gcd(coeff));
    let constant = (&form.constant * &lcm).to_integer();

    (coeffs, gcd, constant)
}
