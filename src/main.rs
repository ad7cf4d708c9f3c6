use std::sync::Arc;

use clap::Parser;

use schedule_board::backend::{CollectionService, InMemoryService, PocketBaseClient};
use schedule_board::cli::{Cli, Command};
use schedule_board::config::{AppConfig, BackendSource};
use schedule_board::display::write_matrix_csv;
use schedule_board::logging::{init_logging, LogConfig};
use schedule_board::schedule::build_columns;
use schedule_board::session::ScheduleSession;
use schedule_board::web;
use schedule_board::widget::{TerminalHost, WidgetHost};

fn connect(config: &AppConfig) -> schedule_board::Result<Arc<dyn CollectionService>> {
    match &config.backend {
        BackendSource::Fixture(path) => {
            tracing::info!(path = %path.display(), "using fixture backend");
            Ok(Arc::new(InMemoryService::from_fixture(path)?))
        }
        BackendSource::Remote(url) => {
            tracing::info!(%url, "using remote backend");
            Ok(Arc::new(PocketBaseClient::new(url)?))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose, cli.quiet).with_format(cli.log_format.into()));

    let config = cli.app_config();
    config.validate()?;
    let service = connect(&config)?;

    match cli.command {
        Command::Web { port, .. } => {
            let board = web::SharedBoard::default();
            let host: Arc<dyn WidgetHost> = Arc::new(web::WebHost::new(Arc::clone(&board)));
            let session = ScheduleSession::new(service, host, config.session_options());
            session.mount().await?;

            println!("Starting web server on port {}...", port);
            println!("Access the board at http://localhost:{}", port);
            let served = web::start_server(port, Arc::clone(&session), board).await;
            session.dispose().await;
            served?;
        }
        Command::Watch { .. } => {
            let session = ScheduleSession::new(service, Arc::new(TerminalHost::stdout()), config.session_options());
            session.mount().await?;
            println!("Watching for lesson changes, press Ctrl-C to stop.");
            tokio::signal::ctrl_c().await?;
            session.dispose().await;
        }
        Command::Show { csv, .. } => {
            let session = ScheduleSession::new(service, Arc::new(TerminalHost::stdout()), config.session_options());
            let loaded = session.load_schedule().await;
            session.dispose().await;
            let outcome = loaded?;

            if let Some(path) = csv {
                let columns = session
                    .columns()
                    .cloned()
                    .unwrap_or_else(|| build_columns(&[]));
                write_matrix_csv(&path, &columns, &outcome.matrix)?;
                println!("Board saved to {}", path.display());
            }
        }
    }

    Ok(())
}
