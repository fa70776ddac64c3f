use basic::mach::{ConsoleHost, Dialect, Interpreter};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "tbas", version, about = "Typed BASIC interpreter")]
struct Args {
    /// Program source file.
    file: PathBuf,

    /// Print the stored program instead of running it.
    #[arg(long)]
    list: bool,

    /// Compatibility mode for loop re-entry.
    #[arg(long, value_enum, default_value_t = DialectArg::Current)]
    dialect: DialectArg,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum DialectArg {
    Current,
    Classic,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let source = match std::fs::read_to_string(&args.file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("{}: {}", args.file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let dialect = match args.dialect {
        DialectArg::Current => Dialect::Current,
        DialectArg::Classic => Dialect::Classic,
    };
    let mut basic = Interpreter::with_dialect(Box::new(ConsoleHost::new()), dialect);
    basic.load_program(&source);
    if args.list {
        print!("{}", basic.list_program());
        return ExitCode::SUCCESS;
    }
    let remote = basic.remote();
    if let Err(e) = ctrlc::set_handler(move || remote.stop()) {
        log::warn!("no interrupt handler: {}", e);
    }
    basic.run();
    ExitCode::SUCCESS
}
