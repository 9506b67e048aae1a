use clap::Parser;
use log::{error, info};
use server::network::Server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = shared::DEFAULT_HOST)]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Maximum number of concurrent clients (unlimited when omitted)
    #[arg(short, long)]
    max_clients: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let server = match Server::bind(&address).await {
        Ok(server) => server.with_max_clients(args.max_clients),
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    if let Some(max_clients) = args.max_clients {
        info!("Accepting at most {} concurrent clients", max_clients);
    }

    server
        .run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                Err(e) => {
                    error!("Failed to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await;

    Ok(())
}
