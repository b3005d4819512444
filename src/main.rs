use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use tokio_util::sync::CancellationToken;

use netwatch::capture::{list_interfaces, CaptureConfig, DatalinkSource};
use netwatch::server::config::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT};
use netwatch::{NetwatchServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(
    name = "netwatch",
    version,
    about = "Sniff packets and stream them over WebSocket"
)]
struct Cli {
    /// Network interface to capture on (e.g. eth0, wlan0)
    #[arg(
        short,
        long,
        env = "NETWATCH_INTERFACE",
        required_unless_present = "list_interfaces"
    )]
    interface: Option<String>,

    /// WebSocket listen port
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "NETWATCH_PORT")]
    port: u16,

    /// Address to bind the WebSocket server to
    #[arg(long, default_value = "0.0.0.0", env = "NETWATCH_BIND")]
    bind: IpAddr,

    /// Maximum inbound WebSocket message size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Records buffered per subscriber before new ones are dropped for it
    #[arg(long, default_value_t = 1024)]
    queue: usize,

    /// Do not put the interface into promiscuous mode
    #[arg(long)]
    no_promisc: bool,

    /// List capture interfaces and exit
    #[arg(long)]
    list_interfaces: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_interfaces {
        print_interfaces();
        return;
    }

    let Some(interface) = cli.interface.clone() else {
        eprintln!("Error: --interface is required");
        std::process::exit(2);
    };

    if let Err(e) = run(interface, &cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(interface: String, cli: &Cli) -> netwatch::Result<()> {
    // Capture must open before anything is served
    let capture = CaptureConfig::new(interface).promiscuous(!cli.no_promisc);
    let source = DatalinkSource::open(&capture)?;

    let config = ServerConfig::default()
        .bind(SocketAddr::new(cli.bind, cli.port))
        .max_message_size(cli.max_message_size)
        .subscriber_queue(cli.queue);
    let server = NetwatchServer::new(config);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => shutdown.cancel(),
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
            }
        });
    }

    tracing::info!(
        interface = %source.interface(),
        url = %format!("ws://{}", server.bind_addr()),
        "Sniffing; press Ctrl+C to stop"
    );

    server.run_until(source, shutdown).await
}

fn print_interfaces() {
    for iface in list_interfaces() {
        let ips: Vec<String> = iface.ips.iter().map(|ip| ip.to_string()).collect();
        println!(
            "{:<16} {:<5} {}",
            iface.name,
            if iface.is_up() { "up" } else { "down" },
            ips.join(", ")
        );
    }
}
