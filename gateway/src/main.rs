mod config;
mod telemetry;

use catalog::api;
use catalog::client::ClientError;
use catalog::{CharacterClient, FacadeClient, ResolveError};
use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gateway", about = "Episode catalog gateway")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the facade server.
    Serve(ConfigArgs),
    /// Resolve character references (URLs or IDs) through a running facade.
    Characters {
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(required = true)]
        references: Vec<String>,
    },
    /// Show an episode together with its characters.
    Episode {
        #[command(flatten)]
        config: ConfigArgs,
        id: u64,
    },
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short = 'c')]
    config_file: PathBuf,
}

impl CliCommand {
    fn config_args(&self) -> &ConfigArgs {
        match self {
            CliCommand::Serve(config)
            | CliCommand::Characters { config, .. }
            | CliCommand::Episode { config, .. } => config,
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("missing `{0}` section in config")]
    MissingSection(&'static str),
    #[error(transparent)]
    Telemetry(#[from] telemetry::TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("facade error: {0}")]
    Facade(#[from] api::FacadeError),
    #[error("client error: {0}")]
    Client(#[from] ClientError),
    #[error("could not resolve characters: {0}")]
    Resolve(#[from] ResolveError),
    #[error("could not encode output: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), GatewayError> {
    let config = Config::from_file(&cli.command.config_args().config_file)?;
    config.validate()?;

    let _telemetry = telemetry::init(&config.common)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async move {
        match cli.command {
            CliCommand::Serve(_) => {
                let gateway = config.gateway.ok_or(GatewayError::MissingSection("gateway"))?;
                tracing::info!("Starting gateway");
                api::serve(gateway).await?;
            }
            CliCommand::Characters { references, .. } => {
                let client_config = config.client.ok_or(GatewayError::MissingSection("client"))?;
                let client = CharacterClient::from_config(&client_config)?;

                let characters = client.resolve_by_reference(&references).await?;
                println!("{}", serde_json::to_string_pretty(&characters)?);
            }
            CliCommand::Episode { id, .. } => {
                let client_config = config.client.ok_or(GatewayError::MissingSection("client"))?;
                let facade = FacadeClient::new(&client_config.facade_url, client_config.timeout_secs)?;
                let client = CharacterClient::with_facade(facade.clone(), &client_config);

                let episode = facade.episode(id).await?;
                let characters = client.resolve_by_reference(&episode.characters).await?;

                println!("{} {} ({})", episode.episode, episode.name, episode.air_date);
                for character in characters {
                    println!(
                        "  {:>4}  {} ({}, {})",
                        character.id, character.name, character.species, character.status
                    );
                }
            }
        }
        Ok(())
    })
}
