use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use token_parser::adapters::{CoinGeckoClient, IngressServer, JsonFileStore, MemoryStore};
use token_parser::config::cli::{Cli, Command, LogFormat};
use token_parser::config::{ServerConfig, StoreKind};
use token_parser::utils::error::{ErrorSeverity, TokenError};
use token_parser::utils::logger;
use token_parser::{DedupRegistry, ItemStore, VerificationPipeline};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let args = match cli.command {
        Command::Version => {
            println!("token-parser {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        Command::Server(args) => args,
    };

    // 初始化日誌
    match args.log_format {
        LogFormat::Compact => logger::init_cli_logger(args.verbose),
        LogFormat::Json => logger::init_json_logger(),
    }
    tracing::info!("Starting token-parser {}", env!("CARGO_PKG_VERSION"));

    let result = match args.resolve() {
        Ok(config) => {
            tracing::debug!("Server config: {:?}", config);
            run_server(config).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ token-parser failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run_server(config: ServerConfig) -> token_parser::Result<()> {
    // 儲存層連不上就不啟動
    let store: Arc<dyn ItemStore> = match config.store {
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store, verified items are lost on exit");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Json => Arc::new(
            JsonFileStore::open(&config.data_dir)
                .await
                .map_err(TokenError::StoreUnavailable)?,
        ),
    };

    let lookup = CoinGeckoClient::new(&config.gecko_url)?;
    let registry = Arc::new(DedupRegistry::new());
    let verifier = config.pipeline.build_verifier(lookup, registry);

    let pipeline = VerificationPipeline::start(&config.pipeline, Arc::new(verifier), Some(store))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let server = IngressServer::new(pipeline.ingress(), addr, &config.api_version);
    let served = server.serve(shutdown_signal()).await;

    pipeline.shutdown().await;
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
