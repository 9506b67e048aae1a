use clap::Parser;
use client::display;
use client::network::ChatClient;
use log::{error, info};
use tokio::io::{stdin, stdout, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = shared::default_addr())]
    server: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");

    let client = match ChatClient::connect(&args.server).await {
        Ok(client) => client,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", display::CONNECT_FAILED);
            return Err(e.into());
        }
    };

    info!("Type a message and press Enter to send; Ctrl+D to leave");

    client.run(BufReader::new(stdin()), stdout()).await?;

    Ok(())
}
