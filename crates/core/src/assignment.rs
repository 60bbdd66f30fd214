use bitvec::vec::BitVec;

use crate::lit::{Lit, Var};

/// The current value of every boolean variable. Each variable occupies two bits: whether it is
/// assigned, and if so, its value.
#[derive(Default)]
pub struct Assignment {
    values: BitVec,
}

impl Assignment {
    pub fn grow_to(&mut self, var: Var) {
        let new_len = (var.code() as usize + 1) * 2;
        if new_len > self.values.len() {
            self.values.resize(new_len, false);
        }
    }

    /// The number of variables the assignment has room for.
    pub fn num_vars(&self) -> usize {
        self.values.len() / 2
    }

    /// Get the truth value of the literal, or `None` if its variable is unassigned.
    pub fn value(&self, lit: Lit) -> Option<bool> {
        let idx = var_to_idx(lit.var());

        if self.values[idx] {
            Some(self.values[idx + 1] == lit.is_positive())
        } else {
            None
        }
    }

    /// Make the given literal true.
    pub fn assign(&mut self, lit: Lit) {
        let idx = var_to_idx(lit.var());
        self.values.set(idx, true);
        self.values.set(idx + 1, lit.is_positive());
    }

    pub fn unassign(&mut self, var: Var) {
        self.values.set(var_to_idx(var), false);
    }
}

#[inline]
fn var_to_idx(var: Var) -> usize {
    var.code() as usize * 2
}

#[cfg(test)]
mod tests {
    use crate::lit;

    use super::*;

    #[test]
    fn unassigned_literals_have_no_value() {
        let mut assignment = Assignment::default();
        assignment.grow_to(unsafe { lit!(2).var() });

        assert_eq!(None, assignment.value(unsafe { lit!(1) }));
        assert_eq!(None, assignment.value(unsafe { lit!(-2) }));
    }

    #[test]
    fn assigning_a_literal_falsifies_its_negation() {
        let mut assignment = Assignment::default();
        assignment.grow_to(unsafe { lit!(2).var() });
        assignment.assign(unsafe { lit!(-2) });

        assert_eq!(Some(true), assignment.value(unsafe { lit!(-2) }));
        assert_eq!(Some(false), assignment.value(unsafe { lit!(2) }));

        assignment.unassign(unsafe { lit!(2).var() });
        assert_eq!(None, assignment.value(unsafe { lit!(2) }));
    }
}
