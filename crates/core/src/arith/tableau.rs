use std::collections::BTreeMap;

use log::trace;
use num_rational::BigRational;
use num_traits::{One, Zero};

use super::ArithVar;

/// A row `basic = sum(coeff * var)` over non-basic variables.
#[derive(Clone, Debug)]
pub struct Row {
    pub basic: ArithVar,
    pub coeffs: BTreeMap<ArithVar, BigRational>,
}

/// The simplex tableau. Every basic variable is defined by exactly one row, and rows only
/// mention non-basic variables.
#[derive(Default)]
pub struct Tableau {
    rows: Vec<Row>,
    row_of: Vec<Option<usize>>,
}

impl Tableau {
    pub fn grow_to(&mut self, var: ArithVar) {
        if self.row_of.len() <= var.index() {
            self.row_of.resize(var.index() + 1, None);
        }
    }

    pub fn is_basic(&self, var: ArithVar) -> bool {
        self.row_of[var.index()].is_some()
    }

    pub fn row_of(&self, var: ArithVar) -> Option<&Row> {
        self.row_of[var.index()].map(|idx| &self.rows[idx])
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> + '_ {
        self.rows.iter()
    }

    /// Define `basic` as the given linear combination. Basic variables occurring in the
    /// combination are substituted by their rows.
    pub fn add_row(&mut self, basic: ArithVar, terms: &[(ArithVar, BigRational)]) {
        self.grow_to(basic);
        assert!(!self.is_basic(basic), "{basic:?} already has a row");

        let mut coeffs = BTreeMap::new();

        for (var, coeff) in terms {
            match self.row_of(*var) {
                Some(row) => {
                    for (inner_var, inner_coeff) in row.coeffs.iter() {
                        add_to(&mut coeffs, *inner_var, coeff * inner_coeff);
                    }
                }
                None => add_to(&mut coeffs, *var, coeff.clone()),
            }
        }

        self.rows.push(Row { basic, coeffs });
        self.row_of[basic.index()] = Some(self.rows.len() - 1);
    }

    /// Make `entering` basic in the row currently defining `leaving`.
    pub fn pivot(&mut self, leaving: ArithVar, entering: ArithVar) {
        trace!("pivoting {leaving:?} out of and {entering:?} into the basis");

        let row_idx = self.row_of[leaving.index()].expect("leaving variable is basic");
        let row = &mut self.rows[row_idx];

        let pivot_coeff = row
            .coeffs
            .remove(&entering)
            .expect("entering variable occurs in the row");
        let inverse = BigRational::one() / pivot_coeff;

        // leaving = a * entering + rest  <=>  entering = leaving / a - rest / a
        let mut new_coeffs: BTreeMap<ArithVar, BigRational> = row
            .coeffs
            .iter()
            .map(|(var, coeff)| (*var, -(coeff * &inverse)))
            .collect();
        new_coeffs.insert(leaving, inverse);

        row.basic = entering;
        row.coeffs = new_coeffs.clone();

        self.row_of[leaving.index()] = None;
        self.row_of[entering.index()] = Some(row_idx);

        for (idx, other) in self.rows.iter_mut().enumerate() {
            if idx == row_idx {
                continue;
            }

            if let Some(coeff) = other.coeffs.remove(&entering) {
                for (var, new_coeff) in new_coeffs.iter() {
                    add_to(&mut other.coeffs, *var, &coeff * new_coeff);
                }
            }
        }
    }
}

fn add_to(coeffs: &mut BTreeMap<ArithVar, BigRational>, var: ArithVar, value: BigRational) {
    let entry = coeffs.entry(var).or_insert_with(BigRational::zero);
    *entry += value;

    if entry.is_zero() {
        coeffs.remove(&var);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64) -> BigRational {
        BigRational::from_integer(value.into())
    }

    #[test]
    fn rows_are_expressed_over_non_basic_variables() {
        let (x, y, s, t) = (ArithVar(0), ArithVar(1), ArithVar(2), ArithVar(3));
        let mut tableau = Tableau::default();
        tableau.grow_to(t);

        tableau.add_row(s, &[(x, int(1)), (y, int(1))]);
        tableau.add_row(t, &[(s, int(2)), (x, int(-2))]);

        // t = 2(x + y) - 2x = 2y
        let row = tableau.row_of(t).unwrap();
        assert_eq!(Some(&int(2)), row.coeffs.get(&y));
        assert!(!row.coeffs.contains_key(&x));
    }

    #[test]
    fn pivoting_swaps_basic_and_non_basic() {
        let (x, y, s) = (ArithVar(0), ArithVar(1), ArithVar(2));
        let mut tableau = Tableau::default();
        tableau.grow_to(s);
        tableau.add_row(s, &[(x, int(2)), (y, int(1))]);

        tableau.pivot(s, x);

        assert!(tableau.is_basic(x));
        assert!(!tableau.is_basic(s));

        // x = s/2 - y/2
        let row = tableau.row_of(x).unwrap();
        assert_eq!(Some(&BigRational::new(1.into(), 2.into())), row.coeffs.get(&s));
        assert_eq!(Some(&BigRational::new((-1).into(), 2.into())), row.coeffs.get(&y));
    }

    #[test]
    fn pivoting_substitutes_into_other_rows() {
        let (x, y, s, t) = (ArithVar(0), ArithVar(1), ArithVar(2), ArithVar(3));
        let mut tableau = Tableau::default();
        tableau.grow_to(t);
        tableau.add_row(s, &[(x, int(1)), (y, int(1))]);
        tableau.add_row(t, &[(x, int(1)), (y, int(-1))]);

        tableau.pivot(s, x);

        // t = (s - y) - y = s - 2y
        let row = tableau.row_of(t).unwrap();
        assert_eq!(Some(&int(1)), row.coeffs.get(&s));
        assert_eq!(Some(&int(-2)), row.coeffs.get(&y));
        assert!(!row.coeffs.contains_key(&x));
    }
}
