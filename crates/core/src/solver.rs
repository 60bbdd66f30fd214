use log::trace;

use crate::{
    analysis::ConflictAnalyzer,
    assignment::Assignment,
    brancher::Brancher,
    clause::{ClauseDb, ClauseRef},
    implication_graph::{ImplicationGraph, Reason},
    lit::{Lit, Var},
    preprocessor::{ClausePreProcessor, PreProcessedClause},
    restart::LubyRestarts,
    storage::KeyedVec,
    termination::Terminator,
    theory::{FinalCheck, Theory, TheoryConflict},
    trail::Trail,
};

/// A CDCL solver, parameterized by the branching heuristic and the background theory.
pub struct Solver<SearchProc, T> {
    brancher: SearchProc,
    theory: T,

    preprocessor: ClausePreProcessor,
    analyzer: ConflictAnalyzer,
    clauses: ClauseDb,
    implication_graph: ImplicationGraph,
    state: State,
    restarts: LubyRestarts,
    statistics: SolverStatistics,

    trail: Trail,
    assignment: Assignment,

    next_propagation_idx: usize,
    watch_list: KeyedVec<Lit, Vec<ClauseRef>>,
    next_var_code: u32,
}

/// Counters describing the work done by the search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolverStatistics {
    pub decisions: u64,
    pub conflicts: u64,
    pub propagations: u64,
    pub restarts: u64,
    pub learned_clauses: u64,
}

#[derive(Default, PartialEq, Eq)]
enum State {
    #[default]
    Consistent,
    ConflictAtRoot,
}

impl<SearchProc, T> Solver<SearchProc, T> {
    pub fn new(brancher: SearchProc, theory: T) -> Self {
        Solver {
            brancher,
            theory,
            preprocessor: Default::default(),
            analyzer: Default::default(),
            clauses: Default::default(),
            implication_graph: Default::default(),
            state: Default::default(),
            restarts: Default::default(),
            statistics: Default::default(),
            trail: Default::default(),
            assignment: Default::default(),
            next_propagation_idx: 0,
            watch_list: Default::default(),
            next_var_code: 0,
        }
    }

    pub fn theory(&self) -> &T {
        &self.theory
    }

    pub fn theory_mut(&mut self) -> &mut T {
        &mut self.theory
    }

    pub fn statistics(&self) -> SolverStatistics {
        self.statistics
    }

    pub fn num_vars(&self) -> u32 {
        self.next_var_code
    }
}

impl<SearchProc, T> Solver<SearchProc, T>
where
    SearchProc: Brancher,
    T: Theory,
{
    pub fn new_lits(&mut self) -> NewLitIterator<'_, SearchProc, T> {
        NewLitIterator {
            solver: self,
            has_introduced_new_literal: false,
        }
    }

    pub fn new_var(&mut self) -> Var {
        self.new_lits()
            .next()
            .expect("the literal iterator is infinite")
            .var()
    }

    /// Add a clause to the formula. Clauses are always added at the root, so if the solver is
    /// in the middle of a search it is reset first.
    pub fn add_clause(&mut self, lits: impl IntoIterator<Item = Lit>) {
        if self.state == State::ConflictAtRoot {
            return;
        }

        self.backtrack_to(0);

        let root_assignment = {
            let lits = match self.preprocessor.preprocess(lits, &self.assignment) {
                PreProcessedClause::Satisfiable => return,
                PreProcessedClause::Lits(lits) => lits,
            };

            if lits.is_empty() {
                trace!("adding the empty clause");
                self.state = State::ConflictAtRoot;
                return;
            }

            if lits.len() > 1 {
                let clause_ref = self.clauses.add_clause(lits);
                trace!("adding clause {lits:?} with id {clause_ref:?}");

                self.watch_clause(clause_ref);
                return;
            }

            lits[0]
        };

        trace!("adding clause [{root_assignment:?}] as assignment");

        if !self.enqueue(root_assignment, Reason::Decision) {
            self.state = State::ConflictAtRoot;
        }
    }

    /// Search for an assignment that satisfies all clauses and is consistent with the theory.
    pub fn solve(&mut self, terminator: impl Terminator) -> SolveResult<'_> {
        if self.state == State::ConflictAtRoot {
            return SolveResult::Unsatisfiable;
        }

        self.backtrack_to(0);

        while !terminator.should_stop() {
            match self.propagate() {
                Err(conflict) => {
                    if !self.resolve_conflict(conflict) {
                        self.state = State::ConflictAtRoot;
                        return SolveResult::Unsatisfiable;
                    }

                    if self.restarts.on_conflict() {
                        trace!("restarting");
                        self.statistics.restarts += 1;
                        self.backtrack_to(0);
                    }
                }

                Ok(()) => {
                    if let Some(decision) = self.brancher.next_decision(&self.assignment) {
                        trace!("decided {decision:?}");
                        self.statistics.decisions += 1;
                        self.trail.push();
                        self.theory.new_decision_level();

                        assert!(
                            self.enqueue(decision, Reason::Decision),
                            "decided already assigned literal"
                        );

                        continue;
                    }

                    match self.theory.final_check() {
                        FinalCheck::Consistent => {
                            return SolveResult::Satisfiable(Solution {
                                assignment: &self.assignment,
                                next_new_var_code: self.next_var_code,
                            });
                        }

                        FinalCheck::Conflict(conflict) => {
                            let conflict = self.explanation_clause(conflict);
                            if !self.resolve_conflict(conflict) {
                                self.state = State::ConflictAtRoot;
                                return SolveResult::Unsatisfiable;
                            }
                        }

                        FinalCheck::Split => {
                            let var = self.new_var();
                            trace!("theory split on new variable {var:?}");
                            self.theory.bind_split(var);
                        }

                        FinalCheck::GiveUp => return SolveResult::Unknown,
                    }
                }
            }
        }

        SolveResult::Unknown
    }

    fn watch_clause(&mut self, clause_ref: ClauseRef) {
        trace!("setting up watchers for {clause_ref:?}");
        let clause = &self.clauses[clause_ref];
        self.watch_list[clause[0]].push(clause_ref);
        self.watch_list[clause[1]].push(clause_ref);
    }

    fn enqueue(&mut self, lit: Lit, reason: Reason) -> bool {
        if let Some(false) = self.assignment.value(lit) {
            return false;
        }

        self.trail.enqueue(lit);
        self.assignment.assign(lit);
        self.implication_graph
            .add(lit.var(), reason, self.trail.decision_level());

        true
    }

    fn backtrack_to(&mut self, decision_level: usize) {
        if decision_level >= self.trail.decision_level() {
            return;
        }

        for lit in self.trail.backtrack_to(decision_level) {
            self.assignment.unassign(lit.var());
            self.brancher.on_variable_unassigned(lit);
        }

        self.theory.backtrack_to(decision_level);
        self.next_propagation_idx = self.trail.len();
    }

    fn propagate(&mut self) -> Result<(), ClauseRef> {
        trace!("propagating...");
        self.propagate_propositional()?;

        match self.theory.propagate() {
            Ok(()) => Ok(()),
            Err(conflict) => Err(self.explanation_clause(conflict)),
        }
    }

    fn propagate_propositional(&mut self) -> Result<(), ClauseRef> {
        while self.next_propagation_idx < self.trail.len() {
            let trail_lit = self.trail[self.next_propagation_idx];
            let false_lit = !trail_lit;
            self.next_propagation_idx += 1;
            self.statistics.propagations += 1;

            trace!("processing {trail_lit:?}");

            if let Err(conflict) = self.theory.assign(trail_lit) {
                return Err(self.explanation_clause(conflict));
            }

            let watches = std::mem::take(&mut self.watch_list[false_lit]);

            for i in 0..watches.len() {
                let clause_ref = watches[i];

                if !self.propagate_clause(clause_ref, false_lit) {
                    // Copy the remaining watches back to the literal.
                    for &constraint in watches.iter().skip(i + 1) {
                        self.watch_list[false_lit].push(constraint);
                    }

                    return Err(clause_ref);
                }
            }
        }

        Ok(())
    }

    fn propagate_clause(&mut self, clause_ref: ClauseRef, false_lit: Lit) -> bool {
        let lit_to_propagate = {
            let clause = &mut self.clauses[clause_ref];

            // Make sure the false literal is at position 1 in the clause.
            if clause[0] == false_lit {
                clause.swap(0, 1);
            }

            // If the 0th watch is true, then clause is already satisfied.
            if self.assignment.value(clause[0]) == Some(true) {
                self.watch_list[false_lit].push(clause_ref);
                return true;
            }

            // Look for a new literal to watch.
            for idx in 2..clause.len() {
                let candidate = clause[idx];
                if self.assignment.value(candidate) != Some(false) {
                    clause.swap(1, idx);

                    self.watch_list[candidate].push(clause_ref);
                    return true;
                }
            }

            // The clause is unit under the current assignment.
            self.watch_list[false_lit].push(clause_ref);
            clause[0]
        };

        trace!("propagating {lit_to_propagate:?} because of {clause_ref:?}");

        self.enqueue(lit_to_propagate, clause_ref.into())
    }

    fn explanation_clause(&mut self, conflict: TheoryConflict) -> ClauseRef {
        let lits = conflict.0.into_iter().map(|lit| !lit).collect::<Vec<_>>();
        trace!("theory conflict {lits:?}");

        self.clauses.add_explanation_clause(lits)
    }

    /// Learn from the conflicting clause and backjump. Returns false if the conflict holds at the
    /// root, in which case the formula is unsatisfiable.
    fn resolve_conflict(&mut self, conflict: ClauseRef) -> bool {
        self.statistics.conflicts += 1;

        let conflict_level = self.clauses[conflict]
            .iter()
            .map(|lit| self.implication_graph.level(lit.var()))
            .max()
            .unwrap_or(0);

        trace!(
            "conflict at dl {} (conflict level {conflict_level})",
            self.trail.decision_level()
        );

        if conflict_level == 0 {
            return false;
        }

        // Theory conflicts may only involve literals from earlier decision levels.
        self.backtrack_to(conflict_level);

        let (literal_to_enqueue, reason, backjump_level) = {
            let analysis = self.analyzer.analyze(
                conflict,
                &self.clauses,
                &self.implication_graph,
                &self.trail,
                &mut self.brancher,
            );

            let reason = if analysis.learned_clause.len() > 1 {
                self.statistics.learned_clauses += 1;
                self.clauses
                    .add_learned_clause(analysis.learned_clause)
                    .into()
            } else {
                Reason::Decision
            };

            (
                analysis.learned_clause[0],
                reason,
                analysis.backjump_level,
            )
        };

        if let Reason::Clause(clause_ref) = reason {
            self.watch_clause(clause_ref);
        }

        self.backtrack_to(backjump_level);

        assert!(
            self.enqueue(literal_to_enqueue, reason),
            "conflicting asserting literal"
        );

        self.brancher.on_conflict();

        true
    }
}

pub enum SolveResult<'solver> {
    /// A solution has been found for the formula.
    Satisfiable(Solution<'solver>),
    /// No solution exists for the formula.
    Unsatisfiable,
    /// The solver was interrupted, or the theory gave up, before reaching a conclusion.
    Unknown,
}

pub struct Solution<'assignment> {
    assignment: &'assignment Assignment,
    next_new_var_code: u32,
}

impl Solution<'_> {
    pub fn value(&self, var: Var) -> bool {
        self.lit_value(Lit::positive(var))
    }

    pub fn lit_value(&self, lit: Lit) -> bool {
        self.assignment
            .value(lit)
            .expect("all variables are assigned in a solution")
    }

    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        (0..self.next_new_var_code).map(|code| Var::try_from(code).expect("valid var code"))
    }
}

pub struct NewLitIterator<'a, SearchProc, T> {
    solver: &'a mut Solver<SearchProc, T>,
    has_introduced_new_literal: bool,
}

impl<SearchProc: Brancher, T> Iterator for NewLitIterator<'_, SearchProc, T> {
    type Item = Lit;

    fn next(&mut self) -> Option<Self::Item> {
        let var = Var::try_from(self.solver.next_var_code).expect("valid var code");
        let lit = Lit::positive(var);
        self.solver.brancher.on_new_var(var);

        self.solver.next_var_code += 1;
        self.has_introduced_new_literal = true;

        Some(lit)
    }
}

impl<SearchProc, T> Drop for NewLitIterator<'_, SearchProc, T> {
    fn drop(&mut self) {
        if self.has_introduced_new_literal {
            let last_var = Var::try_from(self.solver.next_var_code - 1)
                .expect("was created successfully previously as well");

            self.solver.assignment.grow_to(last_var);
            self.solver.implication_graph.grow_to(last_var);
            self.solver.watch_list.grow_to(Lit::positive(last_var));
            self.solver.analyzer.grow_to(last_var);
        }
    }
}
