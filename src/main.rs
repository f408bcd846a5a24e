// src/main.rs

use fleetdag::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("fleetdag error: {err:?}");
            std::process::exit(1);
        }
    }
}

/// `Ok(false)` when at least one instance failed.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let report = run(args).await?;
    Ok(report.is_success())
}
