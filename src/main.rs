use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use smartlock_provision::{
    Nmcli, SetupExit, Settings, SupplicantConfig, config, interface,
    launcher::{self, LaunchConfig},
    probe, run_setup,
};

#[derive(Parser)]
#[command(name = "smartlock-provision")]
#[command(about = "WiFi onboarding for a headless SmartLock device")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to <config dir>/smartlock-provision/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error or a RUST_LOG directive)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the setup hotspot and portal if the device is offline
    Setup {
        /// Address the portal listens on
        #[arg(long)]
        host: Option<String>,

        /// Port the portal listens on
        #[arg(short, long)]
        port: Option<u16>,

        /// Interface to use (defaults to the first WiFi device)
        #[arg(short, long)]
        interface: Option<String>,
    },

    /// Fetch the latest runtime script (or fall back to the local one) and run it
    Bootstrap {
        /// Primary download URL
        #[arg(long, env = "GITLAB_GPIO_RAW_URL", default_value = launcher::DEFAULT_PRIMARY_URL)]
        url: String,

        /// Further download URLs, comma-separated
        #[arg(
            long,
            env = "CLOUD_GPIO_ADDITIONAL_URLS",
            value_delimiter = ',',
            default_value = launcher::DEFAULT_ADDITIONAL_URL
        )]
        additional_urls: Vec<String>,

        /// Download timeout in seconds
        #[arg(long, env = "BOOTSTRAP_HTTP_TIMEOUT", default_value_t = 15)]
        timeout: u64,

        /// Host used for the connectivity check
        #[arg(long, env = "BOOTSTRAP_INET_HOST", default_value = probe::DEFAULT_HOST)]
        inet_host: String,

        /// Port used for the connectivity check
        #[arg(long, env = "BOOTSTRAP_INET_PORT", default_value_t = probe::DEFAULT_PORT)]
        inet_port: u16,

        /// Directory holding gpio_main.py (defaults to the binary's directory)
        #[arg(long)]
        script_dir: Option<PathBuf>,

        /// Interpreter used to run the script
        #[arg(long, default_value = "python3")]
        interpreter: String,
    },

    /// List WiFi interfaces
    ListInterfaces,

    /// Show networks stored in the wpa_supplicant configuration
    Networks,

    /// Show the effective settings
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Setup {
            host,
            port,
            interface,
        } => cmd_setup(config_path, host, port, interface).await,
        Commands::Bootstrap {
            url,
            additional_urls,
            timeout,
            inet_host,
            inet_port,
            script_dir,
            interpreter,
        } => {
            let script_dir = match script_dir {
                Some(dir) => dir,
                None => binary_dir()?,
            };
            let mut launch = LaunchConfig::new(&script_dir);
            launch.primary_url = url;
            launch.additional_urls = additional_urls;
            launch.timeout = Duration::from_secs(timeout);
            launch.token = bearer_token();
            launch.probe_host = inet_host;
            launch.probe_port = inet_port;
            launch.interpreter = interpreter;
            cmd_bootstrap(launch).await
        }
        Commands::ListInterfaces => cmd_list_interfaces(),
        Commands::Networks => cmd_networks(config_path),
        Commands::ShowConfig => cmd_show_config(config_path),
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into()),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn cmd_setup(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    interface: Option<String>,
) -> Result<ExitCode> {
    let mut settings = Settings::load(config_path)?;
    if let Some(host) = host {
        settings.portal.host = host;
    }
    if let Some(port) = port {
        settings.portal.port = port;
    }
    if interface.is_some() {
        settings.interface = interface;
    }
    settings.validate()?;

    info!("=== SmartLock WiFi setup start ===");
    match run_setup(&settings, Arc::new(Nmcli::new()), CancellationToken::new()).await {
        Ok(SetupExit::AlreadyOnline) => Ok(ExitCode::SUCCESS),
        Ok(SetupExit::Provisioned) => {
            info!("=== SmartLock WiFi setup complete ===");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("WiFi setup aborted: {e:#}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn cmd_bootstrap(launch: LaunchConfig) -> Result<ExitCode> {
    let code = tokio::task::spawn_blocking(move || launcher::run(&launch)).await?;
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

fn cmd_list_interfaces() -> Result<ExitCode> {
    let interfaces = interface::list_wifi_interfaces(&Nmcli::new())?;

    if interfaces.is_empty() {
        println!("No WiFi interfaces found.");
        return Ok(ExitCode::SUCCESS);
    }

    println!("{:<16} {}", "INTERFACE", "STATE");
    println!("{}", "-".repeat(32));

    for iface in interfaces {
        println!("{:<16} {}", iface.name, iface.state);
    }

    Ok(ExitCode::SUCCESS)
}

fn cmd_networks(config_path: Option<&Path>) -> Result<ExitCode> {
    let settings = Settings::load(config_path)?;
    let store = SupplicantConfig::new(&settings.supplicant_path);
    println!("Store: {}", store.path().display());
    println!();

    let networks = store.networks()?;
    if networks.is_empty() {
        println!("No saved networks.");
    } else {
        println!("{:<32} {:<12} {}", "SSID", "KEY_MGMT", "PSK");
        println!("{}", "-".repeat(60));
        for network in &networks {
            let key_mgmt = network.key_mgmt.as_deref().unwrap_or("-");
            let masked = network
                .psk
                .as_ref()
                .map(|psk| "*".repeat(psk.chars().count().min(12)))
                .unwrap_or_else(|| "-".to_string());
            println!("{:<32} {:<12} {}", network.ssid, key_mgmt, masked);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn cmd_show_config(config_path: Option<&Path>) -> Result<ExitCode> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => config::config_path()?,
    };
    println!("Config file: {}", path.display());
    println!();

    let settings = Settings::load(Some(&path))?;
    print!("{}", settings.to_toml()?);

    Ok(ExitCode::SUCCESS)
}

fn binary_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Could not locate the running binary")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("Binary has no parent directory")
}

fn bearer_token() -> Option<String> {
    ["CLOUD_BEARER_TOKEN", "GITHUB_TOKEN"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|token| !token.is_empty())
}
