use std::{
    error::Error,
    panic,
    path::{Path, PathBuf},
    process::ExitCode,
    thread,
    time::Duration,
};

mod context;
mod encoder;
mod error;
pub mod termination;

use smtcheck_core::termination::TimeBudget;
use termination::{OrTerminator, SignalTerminator};

pub use context::{SolverContext, SolverOptions, Verdict};
pub use error::SmtCheckError;

/// The checker recurses over terms, which may nest up to
/// [`MAX_TERM_DEPTH`](smtcheck_smtlib::MAX_TERM_DEPTH) levels deep.
const CHECKER_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Load the SMT-LIB file at `path` into a fresh context and check it. The timeout covers loading
/// as well as checking.
pub fn check_file(
    path: impl AsRef<Path>,
    timeout: Option<Duration>,
) -> Result<Verdict, SmtCheckError> {
    let path = path.as_ref().to_path_buf();

    thread::Builder::new()
        .name("checker".to_owned())
        .stack_size(CHECKER_STACK_SIZE)
        .spawn(move || check_file_in_place(&path, timeout))?
        .join()
        .unwrap_or_else(|payload| panic::resume_unwind(payload))
}

fn check_file_in_place(path: &Path, timeout: Option<Duration>) -> Result<Verdict, SmtCheckError> {
    let timer = timeout
        .map(TimeBudget::starting_now)
        .unwrap_or(TimeBudget::infinite());
    let terminator = OrTerminator::new(timer, SignalTerminator::register());

    let mut context = SolverContext::new(SolverOptions::default());
    context.from_file(path)?;

    Ok(context.check(terminator))
}

/// Check the file named on the command line and report the verdict or the error.
pub fn run(file: Option<PathBuf>, timeout: Option<Duration>) -> ExitCode {
    let result = file
        .ok_or(SmtCheckError::MissingArgument)
        .and_then(|file| check_file(file, timeout));

    match result {
        Ok(verdict) => {
            println!("{verdict}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn report(error: &dyn Error) {
    eprintln!("Error: {error}");

    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}
