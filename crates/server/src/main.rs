mod events;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use glo::tuning::{MAIN_SOCKET_PORT_SERVER, SNAPSHOT_PACKET_INTERVAL};
use glo::{GameServer, PacketLossSimulation, ServerConfig};

#[derive(Parser)]
#[command(name = "glo-server")]
#[command(about = "Authoritative glo game server")]
struct Args {
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    #[arg(short, long, default_value_t = MAIN_SOCKET_PORT_SERVER)]
    port: u16,

    #[arg(long, default_value_t = SNAPSHOT_PACKET_INTERVAL, help = "Seconds between snapshots")]
    snapshot_interval: f32,

    #[arg(long, default_value_t = 20, help = "Datagrams read per tick at most")]
    max_receive: usize,

    #[arg(long, help = "Seed for spawn points")]
    seed: Option<u64>,

    #[arg(long, help = "Enable outgoing packet loss simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ServerConfig {
        snapshot_interval: args.snapshot_interval,
        max_receive_per_tick: args.max_receive,
        seed: args.seed,
        packet_loss: args
            .simulate_packet_loss
            .then(|| PacketLossSimulation::new(args.loss_percent)),
    };

    let server = GameServer::bind(SocketAddr::new(args.bind, args.port), config)?;
    log::info!("Server started on {}", server.local_addr());

    let running = server.running();
    tokio::spawn(async move {
        shutdown_signal().await;
        running.store(false, Ordering::SeqCst);
    });

    tokio::task::spawn_blocking(move || run(server)).await?;
    log::info!("Server shutdown complete");
    Ok(())
}

fn run(mut server: GameServer) {
    let start = Instant::now();

    while server.is_running() {
        server.tick(start.elapsed().as_secs_f32());
        server.drain_events().for_each(events::report);
        thread::sleep(Duration::from_millis(1));
    }

    log::info!("Disconnecting {} clients", server.client_count());
    server.shutdown();
    server.drain_events().for_each(events::report);

    let stats = server.stats();
    log::info!(
        "Sent {} packets ({} bytes), received {} ({} bytes), {} malformed",
        stats.packets_sent,
        stats.bytes_sent,
        stats.packets_received,
        stats.bytes_received,
        stats.packets_malformed
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            log::info!("Received terminate signal, shutting down");
        }
    }
}
