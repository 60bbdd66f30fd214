use std::{
    fmt::{self, Display},
    fs::File,
    io::{self, Read},
    path::Path,
    rc::Rc,
};

use log::{debug, info};
use smtcheck_core::{
    arith::{ArithOptions, ArithTheory},
    brancher::VsidsBrancher,
    solver::SolveResult,
    termination::Terminator,
    SmtSolver,
};
use smtcheck_smtlib::Term;

use crate::{encoder::Encoder, error::SmtCheckError};

/// The outcome of a satisfiability check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Sat,
    Unsat,
    Unknown,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Sat => write!(f, "sat"),
            Verdict::Unsat => write!(f, "unsat"),
            Verdict::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SolverOptions {
    pub arith: ArithOptions,
}

/// Holds the assertions loaded from SMT-LIB sources and checks them jointly.
pub struct SolverContext {
    options: SolverOptions,
    assertions: Vec<Term>,
    unsupported: Option<Rc<str>>,
}

impl SolverContext {
    pub fn new(options: SolverOptions) -> SolverContext {
        SolverContext {
            options,
            assertions: vec![],
            unsupported: None,
        }
    }

    /// Load the assertions of the script at `path`.
    pub fn from_file(&mut self, path: impl AsRef<Path>) -> Result<(), SmtCheckError> {
        let path = path.as_ref();
        let not_found = || SmtCheckError::FileNotFound(path.to_path_buf());

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
            ) =>
            {
                return Err(not_found())
            }
            Err(e) => return Err(e.into()),
        };

        if file.metadata()?.is_dir() {
            return Err(not_found());
        }

        debug!("loading '{}'", path.display());
        self.load(file)
    }

    /// Load the assertions of an in-memory script.
    pub fn from_string(&mut self, source: &str) -> Result<(), SmtCheckError> {
        self.load(source.as_bytes())
    }

    fn load(&mut self, source: impl Read) -> Result<(), SmtCheckError> {
        let script = smtcheck_smtlib::parse_script(source)?;

        if let Some(logic) = &script.logic {
            debug!("script sets logic {logic}");
        }

        if !script.is_supported() {
            debug!("only the script's supported prefix is checked");
            self.unsupported = self.unsupported.take().or(script.unsupported);
        }

        self.assertions.extend(script.assertions);
        Ok(())
    }

    pub fn assertions(&self) -> &[Term] {
        &self.assertions
    }

    /// Check the loaded assertions. Only a proof of unsatisfiability or a model of an exact
    /// encoding gives a definite verdict. The terminator is consulted while encoding as well as
    /// while solving.
    pub fn check(&self, terminator: impl Terminator) -> Verdict {
        info!("checking {} assertions", self.assertions.len());

        let mut solver = SmtSolver::new(
            VsidsBrancher::default(),
            ArithTheory::new(self.options.arith),
        );

        let is_exact = {
            let mut encoder = Encoder::new(&mut solver);
            for (idx, assertion) in self.assertions.iter().enumerate() {
                if terminator.should_stop() {
                    info!("stopped after encoding {idx} assertions");
                    return Verdict::Unknown;
                }

                encoder.assert(assertion);
            }

            if !encoder.is_exact() {
                info!("{} terms were abstracted", encoder.num_abstractions());
            }

            encoder.is_exact() && self.unsupported.is_none()
        };

        info!("encoded into {} boolean variables", solver.num_vars());

        let verdict = match solver.solve(&terminator) {
            SolveResult::Satisfiable(_) if is_exact => Verdict::Sat,
            SolveResult::Satisfiable(_) => Verdict::Unknown,
            SolveResult::Unsatisfiable => Verdict::Unsat,
            SolveResult::Unknown => Verdict::Unknown,
        };

        let statistics = solver.statistics();
        info!(
            "decisions={} conflicts={} propagations={} restarts={} learned={} splits={}",
            statistics.decisions,
            statistics.conflicts,
            statistics.propagations,
            statistics.restarts,
            statistics.learned_clauses,
            solver.theory().num_splits(),
        );

        verdict
    }
}
