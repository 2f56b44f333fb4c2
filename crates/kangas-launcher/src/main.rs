use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kangas_launcher::{
    DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, DEFAULT_FRONTEND_PORT, KangasLauncher,
    LauncherConfig, ReadinessConfig, ShowOptions,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "kangas-launcher",
    version,
    about = "Start the Kangas servers and show the DataGrid UI"
)]
struct Cli {
    /// Host the servers bind to
    #[arg(long, env = "KANGAS_HOST", global = true)]
    host: Option<String>,

    /// Frontend port; the backend uses the next one
    #[arg(long, env = "KANGAS_PORT", default_value_t = DEFAULT_FRONTEND_PORT, global = true)]
    port: u16,

    /// Start the servers in debug mode with their output attached
    #[arg(long, global = true)]
    debug: bool,

    /// Server entry point, e.g. "python3 -m kangas.cli.server"
    #[arg(long, env = "KANGAS_SERVER_COMMAND", global = true)]
    server_command: Option<String>,

    /// Readiness settings as JSON, e.g. '{"timeoutMs": 60000}'
    #[arg(long, env = "KANGAS_READINESS", global = true)]
    readiness: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the servers if they are not running and print the UI URL
    Launch,
    /// Start the servers if needed and show the UI
    Show {
        /// DataGrid file to open
        datagrid: Option<String>,
        #[arg(long, default_value = DEFAULT_FRAME_WIDTH)]
        width: String,
        #[arg(long, default_value = DEFAULT_FRAME_HEIGHT)]
        height: String,
    },
    /// Stop every running Kangas server process
    Terminate,
    /// Print the launch record and the running server processes as JSON
    Status,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries notebook output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn build_config(cli: &Cli) -> Result<LauncherConfig> {
    let mut builder = LauncherConfig::builder();
    builder.port(cli.port).debug(cli.debug);

    if let Some(host) = &cli.host {
        builder.host(host.clone());
    }

    if let Some(command) = &cli.server_command {
        let mut parts = command.split_whitespace();
        let program = parts.next().context("--server-command cannot be empty")?;
        builder.server_command(program).server_args(parts);
    }

    if let Some(readiness) = &cli.readiness {
        let readiness: ReadinessConfig =
            serde_json::from_str(readiness).context("invalid --readiness JSON")?;
        builder.readiness(readiness);
    }

    let config = builder.build().context("invalid launcher configuration")?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = build_config(&cli)?;
    let launcher = KangasLauncher::new(config);

    match cli.command {
        Commands::Launch => {
            let url = launcher.launch().await?;
            println!("{url}");
        }
        Commands::Show {
            datagrid,
            width,
            height,
        } => {
            let options = ShowOptions {
                datagrid,
                width,
                height,
                ..ShowOptions::default()
            };
            let request = launcher.show(&options).await?;
            info!(url = %request.full_url(), "Kangas UI shown");
        }
        Commands::Terminate => {
            launcher.terminate().await;
        }
        Commands::Status => {
            let status = launcher.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
