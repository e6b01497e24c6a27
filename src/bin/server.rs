use clap::Parser;
use minikey::server::Handle;

#[derive(Debug, Parser)]
#[command(name = "minikey", version, about = "In-memory RESP2 key-value server")]
struct Args {
    #[arg(long, env = "MINIKEY_PORT", default_value_t = 6379)]
    port: u16,
}

#[tokio::main]
async fn main() -> minikey::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let handle = Handle::bind(("127.0.0.1", args.port)).await?;
    tracing::info!(addr = %handle.addr(), "server started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
