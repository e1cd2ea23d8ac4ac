// src/main.rs

use std::process::ExitCode;

use polypack::{cli, logging, run};

// Single-threaded cooperative scheduling: every coordinator, watcher close
// and shutdown step runs on this one thread.
//
// Returning instead of `process::exit` lets the runtime drop builds still in
// flight after an early exit; their bundler processes are killed on drop.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("polypack error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await?;
    Ok(())
}
