mod args;
mod survey;

use clap::Parser;
use log::{debug, error, info, LevelFilter};
use snafu::ErrorCompat;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }
    info!("atsr v{}", env!("CARGO_PKG_VERSION"));
    debug!("args: {:?}", args);

    if let Err(e) = survey::run(&args) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            debug!("trace: {}", bt);
        }
        std::process::exit(e.exit_code());
    }
}
