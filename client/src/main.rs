use clap::Parser;
use client::network::Client;
use log::info;
use shared::DEFAULT_PLAYER_NAME;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:9000")]
    server: String,

    /// Display name to request
    #[arg(short = 'n', long, default_value = DEFAULT_PLAYER_NAME)]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    println!("Commands: /ready, /guess <word>, /quit. Anything else is chat.");

    let mut client = Client::connect(&args.server, &args.name).await?;
    client.run(BufReader::new(tokio::io::stdin())).await?;

    Ok(())
}
