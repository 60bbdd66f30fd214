use std::{io, path::PathBuf};

use smtcheck_smtlib::SmtLibError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmtCheckError {
    #[error("missing argument: expected the path of an SMT-LIB file")]
    MissingArgument,

    #[error("file '{}' does not exist or cannot be opened", .0.display())]
    FileNotFound(PathBuf),

    #[error("error reading file")]
    Io(#[from] io::Error),

    #[error("failed to parse SMT-LIB input")]
    Parse(#[from] SmtLibError),
}
