use smtcheck_core::{
    brancher::{NaiveBrancher, VsidsBrancher},
    lit::Lit,
    solver::{SolveResult, Solver},
    termination::TimeBudget,
    theory::NoTheory,
    SatSolver,
};

/// Clauses stating that `pigeons` pigeons each sit in one of `holes` holes, and no two pigeons
/// share a hole. Variable `p * holes + h` means pigeon `p` sits in hole `h`.
fn pigeonhole(pigeons: usize, holes: usize) -> (usize, Vec<Vec<(usize, bool)>>) {
    let var = |p: usize, h: usize| p * holes + h;
    let mut clauses = vec![];

    for p in 0..pigeons {
        clauses.push((0..holes).map(|h| (var(p, h), true)).collect());
    }

    for h in 0..holes {
        for p1 in 0..pigeons {
            for p2 in p1 + 1..pigeons {
                clauses.push(vec![(var(p1, h), false), (var(p2, h), false)]);
            }
        }
    }

    (pigeons * holes, clauses)
}

fn solve_with<B: smtcheck_core::brancher::Brancher>(
    mut solver: Solver<B, NoTheory>,
    num_vars: usize,
    clauses: &[Vec<(usize, bool)>],
) -> Option<Vec<bool>> {
    let lits = solver.new_lits().take(num_vars).collect::<Vec<_>>();
    let to_lit = |(idx, positive): (usize, bool)| if positive { lits[idx] } else { !lits[idx] };

    for clause in clauses {
        solver.add_clause(clause.iter().copied().map(to_lit));
    }

    match solver.solve(TimeBudget::infinite()) {
        SolveResult::Satisfiable(solution) => {
            Some(lits.iter().map(|&lit| solution.lit_value(lit)).collect())
        }
        SolveResult::Unsatisfiable => None,
        SolveResult::Unknown => panic!("solver without budget returned unknown"),
    }
}

fn assert_satisfies(assignment: &[bool], clauses: &[Vec<(usize, bool)>]) {
    for clause in clauses {
        assert!(
            clause
                .iter()
                .any(|&(idx, positive)| assignment[idx] == positive),
            "clause {clause:?} is violated"
        );
    }
}

macro_rules! pigeonhole_instance {
    ($name:ident, $pigeons:expr, $holes:expr) => {
        #[test]
        fn $name() {
            let (num_vars, clauses) = pigeonhole($pigeons, $holes);
            let solver = SatSolver::new(VsidsBrancher::default(), NoTheory);
            let result = solve_with(solver, num_vars, &clauses);

            match result {
                Some(assignment) => {
                    assert!($pigeons <= $holes, "found a solution to an unsatisfiable instance");
                    assert_satisfies(&assignment, &clauses);
                }
                None => assert!($pigeons > $holes, "missed a solution"),
            }
        }
    };
}

pigeonhole_instance!(ph2, 2, 1);
pigeonhole_instance!(ph3, 3, 2);
pigeonhole_instance!(ph4, 4, 3);
pigeonhole_instance!(ph5, 5, 4);
pigeonhole_instance!(ph_fits3, 3, 3);
pigeonhole_instance!(ph_fits5, 5, 6);

#[test]
fn naive_brancher_agrees_on_small_instances() {
    let (num_vars, clauses) = pigeonhole(3, 3);
    let solver = Solver::new(NaiveBrancher::default(), NoTheory);
    let assignment =
        solve_with(solver, num_vars, &clauses).expect("three pigeons fit in three holes");

    assert_satisfies(&assignment, &clauses);
}

#[test]
fn chain_of_implications_propagates() {
    // x0, x0 -> x1, x1 -> x2, ..., x8 -> x9, and not x9.
    let mut clauses = vec![vec![(0, true)]];
    clauses.extend((0..9).map(|i| vec![(i, false), (i + 1, true)]));

    let assignment =
        solve_with(SatSolver::new(VsidsBrancher::default(), NoTheory), 10, &clauses)
            .expect("the chain is satisfiable");
    assert!(assignment.iter().all(|&value| value));

    clauses.push(vec![(9, false)]);
    assert_eq!(
        None,
        solve_with(SatSolver::new(VsidsBrancher::default(), NoTheory), 10, &clauses)
    );
}

#[test]
fn clauses_can_be_added_between_solves() {
    let mut solver = SatSolver::new(VsidsBrancher::default(), NoTheory);
    let x = solver.new_lits().take(2).collect::<Vec<Lit>>();

    solver.add_clause([x[0], x[1]]);
    assert!(matches!(
        solver.solve(TimeBudget::infinite()),
        SolveResult::Satisfiable(_)
    ));

    solver.add_clause([!x[0]]);
    solver.add_clause([!x[1]]);
    assert!(matches!(
        solver.solve(TimeBudget::infinite()),
        SolveResult::Unsatisfiable
    ));
}
