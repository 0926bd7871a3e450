//! db-conduit - Run SQL against a MySQL server and describe the results.

mod cli;

use cli::{Cli, StatementSummary};
use db_conduit::db::MySqlTransport;
use db_conduit::error::Result;
use db_conduit::logging;
use db_conduit::query::MySqlTypeTranslator;
use db_conduit::{Connection, ConnectionOptions};
use tracing::{error, info};

fn main() {
    // Pick up DATABASE_URL from a local .env before reading configuration
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    info!("Loading config from: {}", cli.config_path().display());
    let config = cli.resolve_config()?;
    let dsn = config.connection.require_dsn()?;

    let transport = MySqlTransport::new()?;
    let options =
        ConnectionOptions::default().with_print_queries(config.connection.print_queries);
    let conn = Connection::open_with_options(&transport, dsn, options)?;

    let translator = MySqlTypeTranslator::new(config.types);
    let streaming = config.connection.streaming_preference();

    for sql in &cli.statements {
        let result = conn.query_with_types(sql, streaming, &translator)?;
        let summary = StatementSummary::from_result(sql, result);
        println!("{}", summary.render(cli.output)?);
    }

    conn.close();
    Ok(())
}
