use clap::Parser;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use std::path::PathBuf;
use std::sync::Arc;

use kagami::cache::DerivativeCache;
use kagami::config::Config;
use kagami::coordinator::{CoordinatorOptions, RequestCoordinator};
use kagami::proxy::KagamiProxy;
use kagami::store::{ObjectStore, S3ObjectStore};
use kagami::transform::ImageTransformEngine;

/// Kagami - on-demand image resizing proxy in front of S3, built on Pingora
#[derive(Parser, Debug)]
#[command(name = "kagami")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn exit_with(message: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", message, err);
    std::process::exit(1);
}

fn main() {
    if let Err(e) = kagami::logging::init_subscriber() {
        exit_with("Failed to initialize logging subsystem", e);
    }

    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .unwrap_or_else(|e| exit_with("Failed to load configuration", e));
    if let Err(e) = config.validate() {
        exit_with("Invalid configuration", e);
    }

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.listen_address(),
        bucket = %config.store.bucket,
        cache_max_bytes = config.cache.max_bytes,
        max_concurrent_transforms = config.transform.max_concurrent,
        "Configuration loaded successfully"
    );

    if args.test {
        println!("Configuration file {} is valid", args.config.display());
        return;
    }

    // The AWS loader is async; this runtime stays alive for the life of the process
    let bootstrap_runtime = tokio::runtime::Runtime::new()
        .unwrap_or_else(|e| exit_with("Failed to start bootstrap runtime", e));
    let store: Arc<dyn ObjectStore> =
        Arc::new(bootstrap_runtime.block_on(S3ObjectStore::from_config(&config.store)));

    let coordinator = RequestCoordinator::new(
        store,
        Arc::new(ImageTransformEngine::new(config.transform.clone())),
        DerivativeCache::new(&config.cache),
        CoordinatorOptions::from_config(&config),
    );

    let opt = Opt {
        daemon: args.daemon,
        upgrade: args.upgrade,
        ..Default::default()
    };

    let mut server = Server::new(Some(opt))
        .unwrap_or_else(|e| exit_with("Failed to create Pingora server", e));
    server.bootstrap();

    let proxy = KagamiProxy::new(&config.server, coordinator);
    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);
    proxy_service.threads = Some(config.server.threads);

    let listen_addr = config.server.listen_address();
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(
        address = %listen_addr,
        threads = config.server.threads,
        "Starting Kagami image proxy"
    );

    server.add_service(proxy_service);
    server.run_forever();
}
