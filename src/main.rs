use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pctochat::server::DEFAULT_PORT;
use pctochat::{net, RelayServer, ServerConfig};

/// Run the pctochat web server
#[derive(Debug, Parser)]
#[command(name = "pctochat", version, about)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Headless mode: don't open a browser
    #[arg(short, long)]
    server: bool,

    /// Number of worker threads
    #[arg(short, long, default_value_t = 8, value_parser = clap::value_parser!(u16).range(1..))]
    threads: u16,

    /// Address displayed to users in the browser
    #[arg(short, long, default_value = "0.0.0.0")]
    address: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory with the chat client files
    #[arg(long, default_value = "public")]
    public: PathBuf,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "pctochat=debug" } else { "pctochat=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// URL other machines on the LAN use to reach the room
fn network_url(ip: &str, port: u16) -> String {
    format!("http://{}:{}", ip, port)
}

/// Open `url` in the default browser; failing to do so only costs a warning
fn open_browser(url: String) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = webbrowser::open(&url) {
            tracing::warn!(url = %url, error = %e, "Could not open a browser");
        }
    });
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.threads as usize)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> pctochat::Result<()> {
    let config = ServerConfig::with_addr(SocketAddr::from(([0, 0, 0, 0], args.port)))
        .public_dir(args.public)
        .advertised_address(args.address);

    let local_ip = net::local_ip().await;
    let server = RelayServer::new(config);
    // Bound before the browser starts so its first request is answered
    let listener = server.bind().await?;
    let url = network_url(&local_ip, args.port);

    println!("\nServer running!");
    println!(" → Local:   {}", network_url("127.0.0.1", args.port));
    println!(" → Network: {}\n", url);
    if !args.server {
        open_browser(url);
    }

    server
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
}
