pub mod analysis;
pub mod arith;
pub mod assignment;
pub mod brancher;
pub mod clause;
pub mod heap;
pub mod implication_graph;
pub mod lit;
pub mod preprocessor;
pub mod restart;
pub mod solver;
pub mod storage;
pub mod termination;
pub mod theory;
pub mod trail;

pub type SatSolver = solver::Solver<brancher::VsidsBrancher, theory::NoTheory>;
pub type SmtSolver = solver::Solver<brancher::VsidsBrancher, arith::ArithTheory>;
