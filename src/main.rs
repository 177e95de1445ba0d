use std::{
    io::{self, Write},
    process,
};

use raid_cache::{
    application::{commands, error::AppError},
    cache::CacheConfig,
    config::{self, Command},
    infra::{error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let output = match cli_args.command {
        Command::Key(args) => commands::cache_key(&args)?,
        Command::Item(args) => {
            let summary = commands::describe_item(&args.name)?;
            serde_json::to_string_pretty(&summary)
                .map_err(|err| AppError::unexpected(err.to_string()))?
        }
        Command::Get(args) => {
            let context = commands::connect_shared(&CacheConfig::from(&settings.cache)).await?;
            commands::get_entry(context.store().map(|store| store.as_ref()), &args.key).await?
        }
        Command::Invalidate(args) => {
            let context = commands::connect_shared(&CacheConfig::from(&settings.cache)).await?;
            let removed =
                commands::invalidate_entries(context.store().map(|store| store.as_ref()), &args)
                    .await?;
            removed.to_string()
        }
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{output}").map_err(InfraError::from)?;
    Ok(())
}
