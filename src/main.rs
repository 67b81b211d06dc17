use hive_store::config::{ProxyConfig, ServerConfig, load_json};
use hive_store::proxy::handlers::build_router as build_proxy_router;
use hive_store::proxy::router::ProxyRouter;
use hive_store::server::{Services, build_router};
use std::net::SocketAddr;
use std::path::PathBuf;

const USAGE: &str =
    "Usage: hive-store <serve|proxy> [--config <file>] [--bind <addr:port>] [--data-dir <dir>] [--verbose]";

struct Args {
    mode: String,
    config: Option<PathBuf>,
    bind: Option<SocketAddr>,
    data_dir: Option<PathBuf>,
    verbose: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let mode = args
        .get(1)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing mode"))?;

    let mut parsed = Args {
        mode,
        config: None,
        bind: None,
        data_dir: None,
        verbose: false,
    };

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                parsed.config = Some(PathBuf::from(value_of(args, i)?));
                i += 2;
            }
            "--bind" => {
                parsed.bind = Some(value_of(args, i)?.parse()?);
                i += 2;
            }
            "--data-dir" => {
                parsed.data_dir = Some(PathBuf::from(value_of(args, i)?));
                i += 2;
            }
            "--verbose" => {
                parsed.verbose = true;
                i += 1;
            }
            other => anyhow::bail!("unknown argument '{}'", other),
        }
    }

    Ok(parsed)
}

fn value_of(args: &[String], flag: usize) -> anyhow::Result<&str> {
    args.get(flag + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{} needs a value", args[flag]))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let raw: Vec<String> = std::env::args().collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match args.mode.as_str() {
        "serve" => serve(args).await,
        "proxy" => proxy(args).await,
        other => {
            eprintln!("unknown mode '{}'", other);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    }
}

async fn serve(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => load_json::<ServerConfig>(path).await?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    let services = Services::open(&config).await?;
    let app = build_router(&services);

    tracing::info!("Storage server listening on {}", config.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn proxy(args: Args) -> anyhow::Result<()> {
    let path = args
        .config
        .ok_or_else(|| anyhow::anyhow!("proxy mode needs --config <file>"))?;
    let mut config = load_json::<ProxyConfig>(&path).await?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    let router = ProxyRouter::new(&config)?;
    tracing::info!("Proxy ID: {}", router.proxy_id().0);

    // Refuses to start without at least one healthy target.
    router.connect_all().await?;

    let app = build_proxy_router(router);

    tracing::info!("Proxy listening on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
