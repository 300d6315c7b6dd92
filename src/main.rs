//! rustsvc - IRC services with an XML-RPC gateway

use anyhow::Context;
use clap::{Parser, Subcommand};
use rustsvc_core::{
    AuditLogger, AuthCookieManager, Config, ConnectionHandle, Database, LoginFailureRecorder,
    ModuleManager, OperClass, PathTable,
};
use rustsvc_modules::xmlrpc::{builtin_methods, GatewaySettings, RpcCall, XmlRpcContext, XmlRpcHandler};
use rustsvc_modules::XmlRpcModule;
use rustsvc_services::{HelpCommand, ServiceBot, ServiceManager, StaffCommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How often expired authcookies are swept
const COOKIE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// rustsvc - IRC services with an XML-RPC interface
#[derive(Parser)]
#[command(name = "rustsvc")]
#[command(about = "IRC services with an XML-RPC gateway for web frontends")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "services.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Test configuration and exit
    #[arg(long)]
    test_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a default configuration file
    Config {
        /// Output file path
        #[arg(short, long, default_value = "services.toml")]
        output: PathBuf,
    },
    /// List the XML-RPC methods
    Methods,
    /// Execute one XML-RPC call locally and print the reply as JSON
    Call {
        /// Method name, e.g. atheme.login
        method: String,
        /// Positional parameters
        params: Vec<String>,
        /// Remote address the call is attributed to
        #[arg(long, default_value = "127.0.0.1")]
        remote: String,
    },
    /// Show version information
    Version,
}

/// A fully wired services instance
struct Services {
    config: Config,
    db: Arc<Database>,
    cookies: Arc<AuthCookieManager>,
    paths: Arc<PathTable<XmlRpcHandler>>,
    modules: ModuleManager,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    if let Some(command) = &cli.command {
        match command {
            Commands::Config { output } => {
                generate_config(output)?;
                return Ok(());
            }
            Commands::Methods => {
                for method in builtin_methods() {
                    println!("{}", method.name());
                }
                return Ok(());
            }
            Commands::Version => {
                println!("rustsvc {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            Commands::Call { .. } => {}
        }
    }

    let config = load_config(&cli.config)?;

    if cli.test_config {
        config.validate()?;
        info!("Configuration is valid");
        return Ok(());
    }

    config.validate()?;
    let services = Services::start(config).await?;

    match cli.command {
        Some(Commands::Call { method, params, remote }) => {
            let handler = services
                .paths
                .route(&services.config.xmlrpc.path)
                .context("the XML-RPC transport is not enabled")?;
            let conn = ConnectionHandle::new(remote).with_connection_close(true);
            let reply = handler.handle(&conn, &RpcCall::new(method, params)).await;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        _ => services.run().await?,
    }

    services.shutdown().await
}

impl Services {
    async fn start(config: Config) -> anyhow::Result<Self> {
        let db = Arc::new(match &config.database.snapshot_path {
            Some(path) if Path::new(path).exists() => Database::load_snapshot(path)?,
            _ => Database::new(),
        });

        for class in &config.operclasses {
            db.add_operclass(OperClass {
                name: class.name.clone(),
                privs: class.privs.join(" "),
            });
        }
        for soper in &config.sopers {
            if let Err(e) = db.set_oper_class(&soper.account, Some(soper.operclass.clone())) {
                warn!("Services operator {} not applied: {}", soper.account, e);
            }
        }

        let cookies = Arc::new(AuthCookieManager::new(config.authcookie.timeout_seconds));
        let audit = Arc::new(AuditLogger::new(config.audit.enabled, config.audit.min_level));
        let service_manager = Arc::new(ServiceManager::new(db.clone()));

        let mut bots: Vec<(String, String)> = config
            .services
            .iter()
            .map(|s| (s.name.clone(), s.nick.clone()))
            .collect();
        if bots.is_empty() {
            bots.push(("nickserv".to_string(), "NickServ".to_string()));
        }
        for (name, nick) in bots {
            let bot = Arc::new(ServiceBot::new(name.as_str(), nick));
            bot.bind_command(Arc::new(HelpCommand));
            if name.eq_ignore_ascii_case("nickserv") {
                bot.bind_command(Arc::new(StaffCommand::new(db.clone(), audit.clone())));
            }
            service_manager.add_service(bot)?;
        }

        let context = XmlRpcContext {
            accounts: db.clone(),
            cookies: cookies.clone(),
            services: service_manager.clone(),
            audit,
            failed_login: Arc::new(LoginFailureRecorder::new(db.clone())),
            settings: GatewaySettings::from_config(&config),
        };

        let paths = Arc::new(PathTable::new());
        let mut modules = ModuleManager::new();
        if config.xmlrpc.enabled {
            let module = XmlRpcModule::new(context, paths.clone(), &config);
            modules.load_module(Box::new(module)).await?;
        }
        modules.config_ready(&config).await?;

        info!(
            "{} ready: {} accounts, services {:?}, modules {:?}",
            config.server.name,
            db.account_count(),
            service_manager.loaded_services(),
            modules.get_loaded_modules()
        );

        Ok(Self {
            config,
            db,
            cookies,
            paths,
            modules,
        })
    }

    /// Serve until interrupted. The HTTP listener routes through `paths`.
    async fn run(&self) -> anyhow::Result<()> {
        info!("Services running, press Ctrl-C to stop");
        let mut sweep = tokio::time::interval(COOKIE_SWEEP_INTERVAL);

        loop {
            tokio::select! {
                _ = sweep.tick() => {
                    let expired = self.cookies.expire_stale();
                    if expired > 0 {
                        info!("Expired {} authcookies", expired);
                    }
                }
                result = tokio::signal::ctrl_c() => {
                    result.context("failed to listen for shutdown signal")?;
                    info!("Shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn shutdown(mut self) -> anyhow::Result<()> {
        self.modules.unload_all().await?;

        if let Some(path) = &self.config.database.snapshot_path {
            self.db.save_snapshot(path)?;
            info!("Saved database snapshot to {}", path);
        }
        Ok(())
    }
}

/// Load the configuration file, or defaults if it does not exist
fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        info!("Loading configuration from {:?}", path);
        Ok(Config::from_file(path)?)
    } else {
        info!("Configuration file not found, using defaults");
        Ok(Config::default())
    }
}

/// Initialize logging
fn init_logging(level: &str) -> anyhow::Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Generate default configuration file
fn generate_config(output: &Path) -> anyhow::Result<()> {
    let config = Config::default();
    config.to_file(output)?;
    println!("Generated default configuration file: {:?}", output);
    Ok(())
}
