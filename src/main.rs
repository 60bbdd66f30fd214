use std::{io::Write, path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;

#[derive(Parser)]
struct Cli {
    /// The SMT-LIB 2 file with the assertions to check.
    file: Option<PathBuf>,

    /// The timeout of the solver in seconds.
    #[arg(short, long)]
    timeout: Option<u64>,
}

fn main() -> ExitCode {
    env_logger::builder()
        .format(|buf, record| writeln!(buf, "; [{}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();
    let timeout = cli.timeout.map(Duration::from_secs);

    smtcheck::run(cli.file, timeout)
}
