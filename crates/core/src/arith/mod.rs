//! A decision procedure for linear arithmetic over the integers and the reals.
//!
//! The theory implements the general simplex method in the style of Dutertre and de Moura. Every
//! linear form the encoder needs is given a slack variable defined by a tableau row, so all atoms
//! are bounds `x <= c` on a single variable. Strict bounds are handled with delta-rationals, and
//! integer variables are made integral by branch and bound.

mod delta;
mod tableau;

use std::collections::HashMap;

use log::{debug, trace};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed};

use crate::{
    lit::{Lit, Var},
    storage::KeyedVec,
    theory::{FinalCheck, Theory, TheoryConflict},
};

pub use delta::DeltaRational;
use tableau::Tableau;

/// A variable of the arithmetic theory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArithVar(u32);

impl ArithVar {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarKind {
    Int,
    Real,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArithOptions {
    /// The number of branch and bound splits after which the theory gives up.
    pub max_splits: usize,
}

impl Default for ArithOptions {
    fn default() -> Self {
        ArithOptions { max_splits: 10_000 }
    }
}

#[derive(Clone, Debug)]
struct Bound {
    value: DeltaRational,
    reason: Lit,
}

/// The atom `var <= bound`.
#[derive(Clone, Debug)]
struct Atom {
    var: ArithVar,
    bound: DeltaRational,
}

enum Undo {
    Lower(ArithVar, Option<Bound>),
    Upper(ArithVar, Option<Bound>),
}

pub struct ArithTheory {
    options: ArithOptions,

    kinds: Vec<VarKind>,
    values: Vec<DeltaRational>,
    lower: Vec<Option<Bound>>,
    upper: Vec<Option<Bound>>,
    tableau: Tableau,

    /// Structural variables which must take integral values.
    int_vars: Vec<ArithVar>,
    slacks: HashMap<Vec<(ArithVar, BigRational)>, ArithVar>,

    atoms: KeyedVec<Var, Option<Atom>>,
    atom_lits: HashMap<(ArithVar, DeltaRational), Var>,

    undo: Vec<Undo>,
    level_delims: Vec<usize>,

    pending_split: Option<Atom>,
    num_splits: usize,
}

impl ArithTheory {
    pub fn new(options: ArithOptions) -> Self {
        ArithTheory {
            options,
            kinds: vec![],
            values: vec![],
            lower: vec![],
            upper: vec![],
            tableau: Tableau::default(),
            int_vars: vec![],
            slacks: HashMap::new(),
            atoms: KeyedVec::default(),
            atom_lits: HashMap::new(),
            undo: vec![],
            level_delims: vec![],
            pending_split: None,
            num_splits: 0,
        }
    }

    /// Create a new unbounded variable.
    pub fn new_var(&mut self, kind: VarKind) -> ArithVar {
        let var = self.alloc(kind);

        if kind == VarKind::Int {
            self.int_vars.push(var);
        }

        var
    }

    pub fn kind(&self, var: ArithVar) -> VarKind {
        self.kinds[var.index()]
    }

    /// Get the variable that equals the given linear combination, creating a slack variable if
    /// no such variable exists yet. The combination must be non-empty, free of duplicate
    /// variables, and have non-zero coefficients.
    pub fn slack_for(&mut self, terms: &[(ArithVar, BigRational)]) -> ArithVar {
        assert!(!terms.is_empty(), "a slack needs at least one term");

        if let [(var, coeff)] = terms {
            if coeff.is_one() {
                return *var;
            }
        }

        let mut key = terms.to_vec();
        key.sort_by_key(|(var, _)| *var);

        if let Some(&slack) = self.slacks.get(&key) {
            return slack;
        }

        let is_int = key
            .iter()
            .all(|(var, coeff)| self.kind(*var) == VarKind::Int && coeff.is_integer());
        let kind = if is_int { VarKind::Int } else { VarKind::Real };

        let slack = self.alloc(kind);

        let value = key.iter().fold(DeltaRational::default(), |acc, (var, coeff)| {
            &acc + &self.values[var.index()].scale(coeff)
        });
        self.values[slack.index()] = value;
        self.tableau.add_row(slack, &key);

        trace!("slack {slack:?} = {key:?}");
        self.slacks.insert(key, slack);

        slack
    }

    /// Look up the boolean variable that is registered for the atom `var <= bound`.
    pub fn atom(&self, var: ArithVar, bound: &DeltaRational) -> Option<Var> {
        self.atom_lits.get(&(var, bound.clone())).copied()
    }

    /// Register `lit_var` as the atom `var <= bound`. The negation of the atom is
    /// `var >= bound + 1` for integer variables and `var >= bound + δ` for real variables, so
    /// bounds on integer variables must be integral.
    pub fn register_atom(&mut self, lit_var: Var, var: ArithVar, bound: DeltaRational) {
        debug_assert!(self.kind(var) == VarKind::Real || bound.is_integral());

        self.atoms.grow_to(lit_var);
        self.atoms[lit_var] = Some(Atom {
            var,
            bound: bound.clone(),
        });
        self.atom_lits.entry((var, bound)).or_insert(lit_var);
    }

    /// The current value of the variable. Only meaningful after a consistent check.
    pub fn value(&self, var: ArithVar) -> &DeltaRational {
        &self.values[var.index()]
    }

    pub fn num_splits(&self) -> usize {
        self.num_splits
    }

    fn alloc(&mut self, kind: VarKind) -> ArithVar {
        let var = ArithVar(self.kinds.len() as u32);

        self.kinds.push(kind);
        self.values.push(DeltaRational::default());
        self.lower.push(None);
        self.upper.push(None);
        self.tableau.grow_to(var);

        var
    }

    /// The smallest step between two distinct values of the variable.
    fn epsilon(&self, var: ArithVar) -> DeltaRational {
        match self.kind(var) {
            VarKind::Int => DeltaRational::from(1),
            VarKind::Real => DeltaRational::delta(),
        }
    }

    fn assert_upper(
        &mut self,
        var: ArithVar,
        value: DeltaRational,
        reason: Lit,
    ) -> Result<(), TheoryConflict> {
        if let Some(upper) = &self.upper[var.index()] {
            if upper.value <= value {
                return Ok(());
            }
        }

        if let Some(lower) = &self.lower[var.index()] {
            if value < lower.value {
                return Err(TheoryConflict(vec![reason, lower.reason]));
            }
        }

        trace!("{var:?} <= {value}");

        let previous = self.upper[var.index()].take();
        self.undo.push(Undo::Upper(var, previous));
        self.upper[var.index()] = Some(Bound {
            value: value.clone(),
            reason,
        });

        if !self.tableau.is_basic(var) && self.values[var.index()] > value {
            self.update(var, value);
        }

        Ok(())
    }

    fn assert_lower(
        &mut self,
        var: ArithVar,
        value: DeltaRational,
        reason: Lit,
    ) -> Result<(), TheoryConflict> {
        if let Some(lower) = &self.lower[var.index()] {
            if lower.value >= value {
                return Ok(());
            }
        }

        if let Some(upper) = &self.upper[var.index()] {
            if value > upper.value {
                return Err(TheoryConflict(vec![reason, upper.reason]));
            }
        }

        trace!("{var:?} >= {value}");

        let previous = self.lower[var.index()].take();
        self.undo.push(Undo::Lower(var, previous));
        self.lower[var.index()] = Some(Bound {
            value: value.clone(),
            reason,
        });

        if !self.tableau.is_basic(var) && self.values[var.index()] < value {
            self.update(var, value);
        }

        Ok(())
    }

    /// Set a non-basic variable to a new value, keeping every row satisfied.
    fn update(&mut self, var: ArithVar, value: DeltaRational) {
        let change = &value - &self.values[var.index()];

        for row in self.tableau.rows() {
            if let Some(coeff) = row.coeffs.get(&var) {
                let basic = &mut self.values[row.basic.index()];
                *basic = &*basic + &change.scale(coeff);
            }
        }

        self.values[var.index()] = value;
    }

    fn can_increase(&self, var: ArithVar) -> bool {
        match &self.upper[var.index()] {
            Some(upper) => self.values[var.index()] < upper.value,
            None => true,
        }
    }

    fn can_decrease(&self, var: ArithVar) -> bool {
        match &self.lower[var.index()] {
            Some(lower) => self.values[var.index()] > lower.value,
            None => true,
        }
    }

    fn violates_lower(&self, var: ArithVar) -> bool {
        matches!(&self.lower[var.index()], Some(lower) if self.values[var.index()] < lower.value)
    }

    fn violates_upper(&self, var: ArithVar) -> bool {
        matches!(&self.upper[var.index()], Some(upper) if self.values[var.index()] > upper.value)
    }

    /// Restore feasibility of the tableau, or explain why the asserted bounds are infeasible.
    /// Pivoting follows Bland's rule, which guarantees termination.
    fn check(&mut self) -> Result<(), TheoryConflict> {
        loop {
            let violated = self
                .tableau
                .rows()
                .map(|row| row.basic)
                .filter(|&basic| self.violates_lower(basic) || self.violates_upper(basic))
                .min();

            let Some(basic) = violated else {
                return Ok(());
            };

            let row = self.tableau.row_of(basic).expect("violated variable is basic");
            let increase = self.violates_lower(basic);

            // To move the basic variable up, raise variables with a positive coefficient or
            // lower variables with a negative one. The coefficients are ordered by variable.
            let entering = row.coeffs.iter().find_map(|(&var, coeff)| {
                let usable = if increase == coeff.is_positive() {
                    self.can_increase(var)
                } else {
                    self.can_decrease(var)
                };

                usable.then_some(var)
            });

            match entering {
                Some(entering) => {
                    let target = if increase {
                        self.lower_value(basic)
                    } else {
                        self.upper_value(basic)
                    };

                    self.pivot_and_update(basic, entering, target);
                }

                None => {
                    let mut explanation = vec![];

                    let violated_bound = if increase {
                        &self.lower[basic.index()]
                    } else {
                        &self.upper[basic.index()]
                    };
                    explanation.push(violated_bound.as_ref().expect("bound is violated").reason);

                    for (&var, coeff) in row.coeffs.iter() {
                        let blocking = if increase == coeff.is_positive() {
                            &self.upper[var.index()]
                        } else {
                            &self.lower[var.index()]
                        };

                        explanation
                            .push(blocking.as_ref().expect("non-basic is at its bound").reason);
                    }

                    trace!("infeasible row for {basic:?}, explanation {explanation:?}");
                    return Err(TheoryConflict(explanation));
                }
            }
        }
    }

    fn lower_value(&self, var: ArithVar) -> DeltaRational {
        self.lower[var.index()]
            .as_ref()
            .expect("violated lower bound exists")
            .value
            .clone()
    }

    fn upper_value(&self, var: ArithVar) -> DeltaRational {
        self.upper[var.index()]
            .as_ref()
            .expect("violated upper bound exists")
            .value
            .clone()
    }

    /// Pivot `basic` out of the basis in favor of `entering`, such that `basic` gets `target` as
    /// its value.
    fn pivot_and_update(&mut self, basic: ArithVar, entering: ArithVar, target: DeltaRational) {
        let row = self.tableau.row_of(basic).expect("leaving variable is basic");
        let coeff = row.coeffs[&entering].clone();

        let theta = (&target - &self.values[basic.index()]).scale(&(BigRational::one() / coeff));

        self.values[basic.index()] = target;
        let entering_value = &self.values[entering.index()] + &theta;
        self.values[entering.index()] = entering_value;

        for row in self.tableau.rows() {
            if row.basic == basic {
                continue;
            }

            if let Some(coeff) = row.coeffs.get(&entering) {
                let value = &mut self.values[row.basic.index()];
                *value = &*value + &theta.scale(coeff);
            }
        }

        self.tableau.pivot(basic, entering);
    }
}

impl Default for ArithTheory {
    fn default() -> Self {
        ArithTheory::new(ArithOptions::default())
    }
}

impl Theory for ArithTheory {
    fn assign(&mut self, lit: Lit) -> Result<(), TheoryConflict> {
        let Some(atom) = self.atoms.get(lit.var()).and_then(Option::as_ref).cloned() else {
            return Ok(());
        };

        if lit.is_positive() {
            self.assert_upper(atom.var, atom.bound, lit)
        } else {
            let bound = &atom.bound + &self.epsilon(atom.var);
            self.assert_lower(atom.var, bound, lit)
        }
    }

    fn propagate(&mut self) -> Result<(), TheoryConflict> {
        self.check()
    }

    fn new_decision_level(&mut self) {
        self.level_delims.push(self.undo.len());
    }

    fn backtrack_to(&mut self, decision_level: usize) {
        if decision_level >= self.level_delims.len() {
            return;
        }

        let undo_len = self.level_delims[decision_level];
        self.level_delims.truncate(decision_level);

        for undo in self.undo.drain(undo_len..).rev() {
            match undo {
                Undo::Lower(var, bound) => self.lower[var.index()] = bound,
                Undo::Upper(var, bound) => self.upper[var.index()] = bound,
            }
        }
    }

    fn final_check(&mut self) -> FinalCheck {
        let fractional = self
            .int_vars
            .iter()
            .copied()
            .find(|var| !self.values[var.index()].is_integral());

        let Some(var) = fractional else {
            return FinalCheck::Consistent;
        };

        if self.num_splits >= self.options.max_splits {
            debug!("giving up after {} branch and bound splits", self.num_splits);
            return FinalCheck::GiveUp;
        }

        let floor: BigInt = self.values[var.index()].floor();
        trace!(
            "branching on {var:?} = {} with {var:?} <= {floor}",
            self.values[var.index()]
        );

        self.num_splits += 1;
        self.pending_split = Some(Atom {
            var,
            bound: DeltaRational::from(floor),
        });

        FinalCheck::Split
    }

    fn bind_split(&mut self, lit_var: Var) {
        let atom = self
            .pending_split
            .take()
            .expect("a split was requested before binding");

        self.register_atom(lit_var, atom.var, atom.bound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64) -> BigRational {
        BigRational::from_integer(value.into())
    }

    fn lit_var(code: u32) -> Var {
        Var::try_from(code).unwrap()
    }

    #[test]
    fn crossing_bounds_on_one_variable_conflict() {
        let mut theory = ArithTheory::default();
        let x = theory.new_var(VarKind::Int);

        // b0: x <= -1, b1: x <= 0 (so -b1 is x >= 1)
        theory.register_atom(lit_var(0), x, DeltaRational::from(-1));
        theory.register_atom(lit_var(1), x, DeltaRational::from(0));

        assert_eq!(Ok(()), theory.assign(Lit::positive(lit_var(0))));
        let conflict = theory.assign(Lit::negative(lit_var(1))).unwrap_err();

        assert_eq!(
            TheoryConflict(vec![Lit::negative(lit_var(1)), Lit::positive(lit_var(0))]),
            conflict
        );
    }

    #[test]
    fn infeasible_sum_is_explained_by_its_row() {
        let mut theory = ArithTheory::default();
        let x = theory.new_var(VarKind::Real);
        let y = theory.new_var(VarKind::Real);
        let sum = theory.slack_for(&[(x, int(1)), (y, int(1))]);

        // x >= 1 (as -(x <= 1 - δ)), y >= 1, x + y <= 1
        let x_bound = &DeltaRational::from(1) - &DeltaRational::delta();
        theory.register_atom(lit_var(0), x, x_bound.clone());
        theory.register_atom(lit_var(1), y, x_bound);
        theory.register_atom(lit_var(2), sum, DeltaRational::from(1));

        theory.assign(Lit::negative(lit_var(0))).unwrap();
        theory.assign(Lit::negative(lit_var(1))).unwrap();
        theory.assign(Lit::positive(lit_var(2))).unwrap();

        let TheoryConflict(mut explanation) = theory.propagate().unwrap_err();
        explanation.sort();

        assert_eq!(
            vec![
                Lit::negative(lit_var(0)),
                Lit::negative(lit_var(1)),
                Lit::positive(lit_var(2))
            ],
            explanation
        );
    }

    #[test]
    fn feasible_bounds_produce_a_satisfying_assignment() {
        let mut theory = ArithTheory::default();
        let x = theory.new_var(VarKind::Real);
        let y = theory.new_var(VarKind::Real);
        let diff = theory.slack_for(&[(x, int(1)), (y, int(-1))]);

        // x - y <= -2 and x >= 3 (as -(x <= 3 - δ))
        theory.register_atom(lit_var(0), diff, DeltaRational::from(-2));
        theory.register_atom(lit_var(1), x, &DeltaRational::from(3) - &DeltaRational::delta());

        theory.assign(Lit::positive(lit_var(0))).unwrap();
        theory.assign(Lit::negative(lit_var(1))).unwrap();
        theory.propagate().unwrap();

        let x_value = theory.value(x).clone();
        let y_value = theory.value(y).clone();
        assert!(x_value >= DeltaRational::from(3));
        assert!(&x_value - &y_value <= DeltaRational::from(-2));
    }

    #[test]
    fn backtracking_restores_bounds() {
        let mut theory = ArithTheory::default();
        let x = theory.new_var(VarKind::Int);
        theory.register_atom(lit_var(0), x, DeltaRational::from(0));
        theory.register_atom(lit_var(1), x, DeltaRational::from(5));

        theory.new_decision_level();
        theory.assign(Lit::positive(lit_var(0))).unwrap();
        theory.backtrack_to(0);

        // x >= 6 is consistent again once x <= 0 is retracted.
        assert_eq!(Ok(()), theory.assign(Lit::negative(lit_var(1))));
        assert_eq!(Ok(()), theory.propagate());
    }

    #[test]
    fn fractional_integer_values_request_a_split() {
        let mut theory = ArithTheory::default();
        let x = theory.new_var(VarKind::Int);
        let double = theory.slack_for(&[(x, int(2))]);

        // 2x <= 1 and 2x >= 1
        theory.register_atom(lit_var(0), double, DeltaRational::from(1));
        theory.register_atom(lit_var(1), double, DeltaRational::from(0));
        theory.assign(Lit::positive(lit_var(0))).unwrap();
        theory.assign(Lit::negative(lit_var(1))).unwrap();
        theory.propagate().unwrap();

        assert_eq!(FinalCheck::Split, theory.final_check());
        theory.bind_split(lit_var(2));

        assert_eq!(Some(lit_var(2)), theory.atom(x, &DeltaRational::from(0)));
        assert_eq!(1, theory.num_splits());
    }

    #[test]
    fn split_budget_is_respected() {
        let mut theory = ArithTheory::new(ArithOptions { max_splits: 0 });
        let x = theory.new_var(VarKind::Int);
        let double = theory.slack_for(&[(x, int(2))]);

        theory.register_atom(lit_var(0), double, DeltaRational::from(1));
        theory.register_atom(lit_var(1), double, DeltaRational::from(0));
        theory.assign(Lit::positive(lit_var(0))).unwrap();
        theory.assign(Lit::negative(lit_var(1))).unwrap();
        theory.propagate().unwrap();

        assert_eq!(FinalCheck::GiveUp, theory.final_check());
    }

    #[test]
    fn identical_forms_share_a_slack() {
        let mut theory = ArithTheory::default();
        let x = theory.new_var(VarKind::Int);
        let y = theory.new_var(VarKind::Int);

        let first = theory.slack_for(&[(x, int(1)), (y, int(3))]);
        let second = theory.slack_for(&[(y, int(3)), (x, int(1))]);

        assert_eq!(first, second);
        assert_eq!(VarKind::Int, theory.kind(first));
        assert_eq!(x, theory.slack_for(&[(x, int(1))]));
    }
}
