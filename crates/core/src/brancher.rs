use bitvec::vec::BitVec;

use crate::{
    assignment::Assignment,
    heap::VarHeap,
    lit::{Lit, Var},
    storage::KeyedVec,
};

/// Decides which literal to set next when propagation reaches a fixpoint.
pub trait Brancher {
    fn on_new_var(&mut self, var: Var);

    /// Called for every literal that is removed from the trail when backtracking.
    fn on_variable_unassigned(&mut self, lit: Lit);

    /// Called for every variable that participates in conflict analysis.
    fn on_literal_activated(&mut self, _lit: Lit) {}

    /// Called once after every conflict.
    fn on_conflict(&mut self) {}

    fn next_decision(&mut self, assignment: &Assignment) -> Option<Lit>;
}

/// Decides the first unassigned variable to false, in order of creation.
#[derive(Default)]
pub struct NaiveBrancher {
    vars: Vec<Var>,
}

impl Brancher for NaiveBrancher {
    fn on_new_var(&mut self, var: Var) {
        self.vars.push(var);
    }

    fn on_variable_unassigned(&mut self, _: Lit) {}

    fn next_decision(&mut self, assignment: &Assignment) -> Option<Lit> {
        self.vars
            .iter()
            .copied()
            .map(Lit::negative)
            .find(|&lit| assignment.value(lit).is_none())
    }
}

/// The variable state independent decaying sum heuristic, with phase saving. Variables that
/// recently took part in conflicts are decided first, and they are decided to the value they had
/// when they were last unassigned.
pub struct VsidsBrancher {
    activity: KeyedVec<Var, f64>,
    heap: VarHeap,
    phases: BitVec,
    increment: f64,
    decay: f64,
}

const RESCALE_THRESHOLD: f64 = 1e100;

impl VsidsBrancher {
    /// Create a brancher where activities are multiplied by `decay` after every conflict. The
    /// decay must be in the interval (0, 1].
    pub fn new(decay: f64) -> Self {
        assert!(decay > 0.0 && decay <= 1.0, "decay must be in (0, 1]");

        VsidsBrancher {
            activity: KeyedVec::default(),
            heap: VarHeap::default(),
            phases: BitVec::new(),
            increment: 1.0,
            decay,
        }
    }

    fn rescale(&mut self) {
        self.activity
            .iter_mut()
            .for_each(|activity| *activity *= 1.0 / RESCALE_THRESHOLD);
        self.increment *= 1.0 / RESCALE_THRESHOLD;
    }
}

impl Default for VsidsBrancher {
    fn default() -> Self {
        VsidsBrancher::new(0.95)
    }
}

impl Brancher for VsidsBrancher {
    fn on_new_var(&mut self, var: Var) {
        self.activity.grow_to(var);
        self.heap.grow_to(var);

        let new_len = var.code() as usize + 1;
        if self.phases.len() < new_len {
            self.phases.resize(new_len, false);
        }

        self.heap.insert(var, &self.activity);
    }

    fn on_variable_unassigned(&mut self, lit: Lit) {
        let var = lit.var();
        self.phases.set(var.code() as usize, lit.is_positive());
        self.heap.insert(var, &self.activity);
    }

    fn on_literal_activated(&mut self, lit: Lit) {
        let var = lit.var();
        self.activity[var] += self.increment;

        if self.activity[var] > RESCALE_THRESHOLD {
            self.rescale();
        }

        self.heap.increased(var, &self.activity);
    }

    fn on_conflict(&mut self) {
        self.increment /= self.decay;
    }

    fn next_decision(&mut self, assignment: &Assignment) -> Option<Lit> {
        while let Some(var) = self.heap.pop_max(&self.activity) {
            let lit = Lit::new(var, self.phases[var.code() as usize]);

            if assignment.value(lit).is_none() {
                return Some(lit);
            }
        }

        None
    }
}
