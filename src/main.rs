use anyhow::Context;
use zoneqa::cli::{Cli, Commands, commands, output::Output};
use zoneqa::utils::toml_config::{LoggingConfig, ZoneqaConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// `RUST_LOG` wins over `--verbose`, which wins over the configured level.
fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::with_color()
    };

    if !cli.config.exists() {
        output.error(&format!("{} not found", cli.config.display()));
        output.hint("Copy zoneqa.example.toml to zoneqa.toml and set the provider keys");
        std::process::exit(1);
    }
    let config = ZoneqaConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    init_tracing(&config.logging, cli.verbose);

    let command = cli.command;
    let result = match &command {
        Commands::Segment { input, output: path } => {
            commands::segment(&config, input, path.clone(), &output).await
        }
        Commands::Build { input } => commands::build(&config, input.clone(), &output).await,
        Commands::Ask {
            lat,
            lon,
            margin,
            stream,
            question,
        } => commands::ask(&config, *lat, *lon, *margin, *stream, question, &output).await,
        Commands::Chat { stream, question } => {
            commands::chat(&config, *stream, question, &output).await
        }
        Commands::Layers { lat, lon, margin } => {
            commands::layers(&config, *lat, *lon, *margin, &output).await
        }
        Commands::Config { validate } => {
            commands::show_config(&config, &cli.config, *validate, &output);
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        output.error(&command.failure_message(&e));
        std::process::exit(1);
    }

    Ok(())
}
