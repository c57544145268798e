use std::cell::Cell;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec2;
use glo::net::{CommandsPacket, MAX_PACKET_SIZE, SnapshotPacket};
use glo::simulation::advance_player;
use glo::tuning::ARENA_HALF_EXTENT;
use glo::{
    ActionFlags, ClientConfig, Command, ConnectionStatus, GameClient, GameServer, Kinematics,
    NetworkEndpoint, Packet, ServerConfig, ServerEvent, Transport,
};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const FRAME: f32 = 0.01;

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

fn server(port: u16) -> GameServer {
    let config = ServerConfig {
        seed: Some(42),
        ..Default::default()
    };
    GameServer::bind(SocketAddr::new(LOCALHOST, port), config).unwrap()
}

fn client(port: u16) -> GameClient {
    GameClient::bind(SocketAddr::new(LOCALHOST, port), ClientConfig::default()).unwrap()
}

fn send(endpoint: &mut NetworkEndpoint, packet: &Packet, client_id: u32, to: SocketAddr) {
    let mut buf = [0u8; MAX_PACKET_SIZE];
    let len = packet.encode(client_id, &mut buf).unwrap();
    endpoint.send_to(&buf[..len], to).unwrap();
}

/// Ticks the server on a simulated clock until `want` accepts a packet
/// received by `endpoint`.
fn poll_server<R>(
    server: &mut GameServer,
    endpoint: &mut NetworkEndpoint,
    now: &mut f32,
    mut want: impl FnMut(Packet) -> Option<R>,
) -> Option<R> {
    let mut buf = [0u8; MAX_PACKET_SIZE];
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(1000) {
        *now += FRAME;
        server.tick(*now);
        while let Some((size, _)) = endpoint.receive(&mut buf).unwrap() {
            let (_, packet) = Packet::decode(&buf[..size]).unwrap();
            if let Some(found) = want(packet) {
                return Some(found);
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
    None
}

/// Runs server and clients frame by frame until `done` holds.
fn run_until(
    server: &mut GameServer,
    clients: &mut [&mut GameClient],
    now: &mut f32,
    mut input: impl FnMut(usize) -> Option<Command>,
    mut done: impl FnMut(&GameServer, &[&mut GameClient]) -> bool,
) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(2000) {
        *now += FRAME;
        server.tick(*now);
        for (i, client) in clients.iter_mut().enumerate() {
            client.tick(*now, FRAME, input(i)).unwrap();
        }
        if done(&*server, &*clients) {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn discover_connect_commands_snapshot() {
    let port = next_port();
    let mut server = server(port);
    let mut raw = NetworkEndpoint::bind(LOCALHOST, port + 1).unwrap();
    let server_addr = server.local_addr();
    let mut now = 0.0;

    send(&mut raw, &Packet::Discover, 0, server_addr);
    let connect = poll_server(&mut server, &mut raw, &mut now, |packet| match packet {
        Packet::Connect(connect) => Some(connect),
        _ => None,
    })
    .expect("no connect");

    assert_eq!(connect.players.len(), 1);
    let id = connect.client_id;
    assert_eq!(connect.players[0].id, id);
    let start = connect.players[0].kinematics;

    let command = Command::idle(start.orientation, 0.1).with_actions(ActionFlags::MOVE_UP);
    let mut predicted = start;
    advance_player(&mut predicted, &command);
    let batch = Packet::Commands(CommandsPacket {
        predicted,
        commands: vec![command],
    });
    send(&mut raw, &batch, id, server_addr);

    let moved = |s: &SnapshotPacket| {
        s.players
            .iter()
            .any(|p| p.id == id && p.kinematics.position != start.position)
    };
    let snapshot = poll_server(&mut server, &mut raw, &mut now, |packet| match packet {
        Packet::Snapshot(s) if moved(&s) => Some(s),
        _ => None,
    });

    // A spawn on the top edge has nowhere to go.
    let expected_y = (start.position.y + start.speed * 0.1).min(ARENA_HALF_EXTENT);
    if expected_y == start.position.y {
        assert!(snapshot.is_none());
        return;
    }
    let snapshot = snapshot.expect("no snapshot with the move");
    assert!(!snapshot.prediction_error);
    let record = snapshot.players.iter().find(|p| p.id == id).unwrap();
    assert_eq!(record.kinematics.position, Vec2::new(start.position.x, expected_y));
}

#[test]
fn wrong_prediction_is_flagged_over_the_wire() {
    let port = next_port();
    let mut server = server(port);
    let mut raw = NetworkEndpoint::bind(LOCALHOST, port + 1).unwrap();
    let server_addr = server.local_addr();
    let mut now = 0.0;

    send(&mut raw, &Packet::Discover, 0, server_addr);
    let connect = poll_server(&mut server, &mut raw, &mut now, |packet| match packet {
        Packet::Connect(connect) => Some(connect),
        _ => None,
    })
    .expect("no connect");
    let start = connect.players[0].kinematics;

    let batch = Packet::Commands(CommandsPacket {
        predicted: Kinematics::new(start.position + Vec2::splat(3.0), start.orientation),
        commands: vec![Command::idle(start.orientation, 0.05)],
    });
    send(&mut raw, &batch, connect.client_id, server_addr);

    let flagged = poll_server(&mut server, &mut raw, &mut now, |packet| match packet {
        Packet::Snapshot(s) if s.prediction_error => Some(s),
        _ => None,
    })
    .expect("no flagged snapshot");
    assert_eq!(flagged.players[0].kinematics.position, start.position);

    let events: Vec<_> = server.drain_events().collect();
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::PredictionError { client_id } if *client_id == connect.client_id
    )));
}

#[test]
fn remote_players_converge_on_the_server_state() {
    let port = next_port();
    let mut server = server(port);
    let server_addr = server.local_addr();
    let mut a = client(port + 1);
    let mut b = client(port + 2);
    let mut now = 0.0;

    a.connect(server_addr, now).unwrap();
    b.connect(server_addr, now).unwrap();
    assert!(run_until(
        &mut server,
        &mut [&mut a, &mut b],
        &mut now,
        |_| None,
        |_, clients| clients.iter().all(|c| c.is_connected()),
    ));
    let id_a = a.client_id().unwrap();
    let id_b = b.client_id().unwrap();
    assert_ne!(id_a, id_b);

    let frames = Cell::new(0);
    assert!(run_until(
        &mut server,
        &mut [&mut a, &mut b],
        &mut now,
        |i| {
            if i == 0 && frames.get() < 20 {
                frames.set(frames.get() + 1);
                Some(Command::idle(0.5, FRAME).with_actions(ActionFlags::MOVE_LEFT))
            } else {
                Some(Command::idle(0.5, FRAME))
            }
        },
        |server, clients| {
            let Some(truth) = server.state().player(id_a) else {
                return false;
            };
            let Some(seen) = clients[1].state().player(id_a) else {
                return false;
            };
            frames.get() >= 20
                && seen.kinematics.position.distance(truth.kinematics.position) < 1e-3
                && (seen.kinematics.orientation - 0.5).abs() < 1e-3
        },
    ));

    let own = a.state().player(id_a).unwrap().kinematics.position;
    let truth = server.state().player(id_a).unwrap().kinematics.position;
    assert!(own.distance(truth) < 1e-3);
    assert_eq!(a.corrections(), 0);
}

#[test]
fn client_disconnect_is_seen_by_everyone() {
    let port = next_port();
    let mut server = server(port);
    let server_addr = server.local_addr();
    let mut a = client(port + 1);
    let mut b = client(port + 2);
    let mut now = 0.0;

    a.connect(server_addr, now).unwrap();
    b.connect(server_addr, now).unwrap();
    assert!(run_until(
        &mut server,
        &mut [&mut a, &mut b],
        &mut now,
        |_| None,
        |_, clients| clients.iter().all(|c| c.state().player_count() == 2),
    ));
    let id_a = a.client_id().unwrap();

    a.disconnect();
    assert_eq!(a.status(), ConnectionStatus::Disconnected);
    assert!(run_until(
        &mut server,
        &mut [&mut b],
        &mut now,
        |_| None,
        |server, clients| {
            server.client_count() == 1 && clients[0].state().player(id_a).is_none()
        },
    ));
}

#[test]
fn server_shutdown_disconnects_clients() {
    let port = next_port();
    let mut server = server(port);
    let server_addr = server.local_addr();
    let mut client = self::client(port + 1);
    let mut now = 0.0;

    client.connect(server_addr, now).unwrap();
    assert!(run_until(
        &mut server,
        &mut [&mut client],
        &mut now,
        |_| None,
        |_, clients| clients[0].is_connected(),
    ));

    server.shutdown();
    assert!(!server.is_running());
    assert!(run_until(
        &mut server,
        &mut [&mut client],
        &mut now,
        |_| None,
        |_, clients| clients[0].status() == ConnectionStatus::Disconnected,
    ));
}

#[test]
fn unanswered_discover_times_out() {
    let port = next_port();
    // Nothing listens on this address.
    let silent = SocketAddr::new(LOCALHOST, port);
    let config = ClientConfig {
        discover_attempts: 3,
        discover_retry_interval: 0.05,
        ..Default::default()
    };
    let mut client = GameClient::bind(SocketAddr::new(LOCALHOST, port + 1), config).unwrap();

    client.connect(silent, 0.0).unwrap();
    let mut now = 0.0;
    let mut outcome = Ok(());
    for _ in 0..100 {
        now += FRAME;
        outcome = client.tick(now, FRAME, None);
        if outcome.is_err() {
            break;
        }
    }
    assert!(matches!(
        outcome,
        Err(glo::ClientError::ConnectTimeout { attempts: 3, .. })
    ));
}
