use anyhow::Result;

use monthledger::config::Config;
use monthledger::{logging, run, Database};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        run::print_usage();
        return Ok(());
    }

    let config = Config::from_env()?;
    logging::init(&config.log_filter)?;
    tracing::debug!(db = %config.db_path.display(), "opening ledger database");

    let mut db = Database::open(&config.db_path, config.busy_timeout)?;
    run::as_cli(&args, &mut db, &config)
}
