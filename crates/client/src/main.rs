mod input;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec2;

use glo::tuning::{MAIN_SOCKET_PORT_CLIENT, MAIN_SOCKET_PORT_SERVER};
use glo::{ClientConfig, ConnectionStatus, GameClient, PacketLossSimulation};
use input::ScriptedInput;

const DEFAULT_SERVER: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), MAIN_SOCKET_PORT_SERVER);

#[derive(Parser)]
#[command(name = "glo-client")]
#[command(about = "Headless glo client driven by a scripted input")]
struct Args {
    #[arg(short, long, default_value_t = DEFAULT_SERVER, help = "Server address to connect to")]
    server: SocketAddr,

    #[arg(short, long, default_value_t = MAIN_SOCKET_PORT_CLIENT)]
    port: u16,

    #[arg(short, long, default_value_t = 30.0, help = "Seconds to play before leaving")]
    duration: f32,

    #[arg(long, default_value_t = 60)]
    fps: u32,

    #[arg(long, default_value_t = 1.0, help = "Seconds between shots, 0 to hold fire")]
    fire_interval: f32,

    #[arg(long, help = "Enable outgoing packet loss simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ClientConfig {
        packet_loss: args
            .simulate_packet_loss
            .then(|| PacketLossSimulation::new(args.loss_percent)),
        ..Default::default()
    };
    let local = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port);
    let mut client = GameClient::bind(local, config).context("failed to bind client socket")?;
    log::info!("Client bound to {}", client.local_addr());

    let result = run(&mut client, &args);
    client.disconnect();
    result
}

fn run(client: &mut GameClient, args: &Args) -> Result<()> {
    let frame = Duration::from_secs_f32(1.0 / args.fps.max(1) as f32);
    let mut script = ScriptedInput::new(1.0, args.fire_interval);
    let start = Instant::now();
    let mut last_frame = start;
    let mut last_report = 0.0;

    client.connect(args.server, 0.0)?;

    loop {
        let frame_start = Instant::now();
        let now = (frame_start - start).as_secs_f32();
        let dt = (frame_start - last_frame).as_secs_f32();
        last_frame = frame_start;

        if now >= args.duration {
            log::info!("Played for {:.1}s, leaving", now);
            return Ok(());
        }

        let input = client.client_id().and_then(|id| {
            let position = client.state().player(id)?.kinematics.position;
            Some(script.next(position, dt).to_command(position, dt))
        });
        client.tick(now, dt, input)?;

        if client.status() == ConnectionStatus::Disconnected {
            log::info!("Session ended by the server");
            return Ok(());
        }

        if now - last_report >= 1.0 {
            last_report = now;
            report(client);
        }

        thread::sleep(frame.saturating_sub(frame_start.elapsed()));
    }
}

fn report(client: &GameClient) {
    let Some(id) = client.client_id() else {
        log::info!("Waiting for the server...");
        return;
    };
    let position = client
        .state()
        .player(id)
        .map_or(Vec2::ZERO, |p| p.kinematics.position);
    let stats = client.stats();
    log::info!(
        "Client {} at ({:.2}, {:.2}), {} players, {} bullets, {} corrections, {}/{} packets out/in",
        id,
        position.x,
        position.y,
        client.state().player_count(),
        client.state().bullet_count(),
        client.corrections(),
        stats.packets_sent,
        stats.packets_received
    );
}
