use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};

use rand::Rng;

use super::stats::NetworkStats;

/// How many successive ports `NetworkEndpoint::bind` tries before giving up.
pub const BIND_ATTEMPTS: u16 = 16;

/// The datagram operations the sessions need from a socket.
pub trait Transport {
    fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize>;

    /// Never blocks; `Ok(None)` means nothing is queued.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;

    fn local_addr(&self) -> SocketAddr;

    fn stats(&self) -> &NetworkStats;

    fn stats_mut(&mut self) -> &mut NetworkStats;
}

/// Drops outgoing datagrams to exercise loss handling on a clean LAN.
#[derive(Debug, Clone, Default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    pub loss_percent: f32,
}

impl PacketLossSimulation {
    pub fn new(loss_percent: f32) -> Self {
        Self {
            enabled: loss_percent > 0.0,
            loss_percent: loss_percent.clamp(0.0, 100.0),
        }
    }

    pub fn should_drop(&self) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rand::thread_rng().gen_range(0.0..100.0) < self.loss_percent
    }
}

/// Non-blocking UDP socket.
pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    stats: NetworkStats,
    packet_loss_sim: PacketLossSimulation,
}

impl NetworkEndpoint {
    /// Binds `ip:port`, moving on to the next port while the address is taken.
    pub fn bind(ip: IpAddr, port: u16) -> io::Result<Self> {
        let mut last_err = None;

        for offset in 0..BIND_ATTEMPTS {
            let Some(candidate) = port.checked_add(offset) else {
                break;
            };
            match UdpSocket::bind(SocketAddr::new(ip, candidate)) {
                Ok(socket) => return Self::from_socket(socket),
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                    log::warn!("Port {} in use, trying {}", candidate, candidate.wrapping_add(1));
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrInUse, "no free port")))
    }

    fn from_socket(socket: UdpSocket) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        log::debug!("Bound UDP socket to {}", local_addr);

        Ok(Self {
            socket,
            local_addr,
            stats: NetworkStats::default(),
            packet_loss_sim: PacketLossSimulation::default(),
        })
    }

    pub fn set_packet_loss_sim(&mut self, sim: PacketLossSimulation) {
        self.packet_loss_sim = sim;
    }
}

impl Transport for NetworkEndpoint {
    fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize> {
        if self.packet_loss_sim.should_drop() {
            log::debug!("Simulated loss of {} bytes to {}", bytes.len(), addr);
            self.stats.packets_dropped += 1;
            return Ok(0);
        }

        let sent = self.socket.send_to(bytes, addr)?;
        self.stats.record_sent(sent);
        Ok(sent)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((size, addr)) => {
                self.stats.record_received(size);
                Ok(Some((size, addr)))
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            // ICMP port unreachable from a vanished peer surfaces here on some platforms.
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut NetworkStats {
        &mut self.stats
    }
}
