use glo::ServerEvent;

/// Writes a session event to the log.
pub fn report(event: ServerEvent) {
    match event {
        ServerEvent::ClientConnected { client_id, addr } => {
            log::info!("Client {} joined from {}", client_id, addr);
        }
        ServerEvent::ClientDisconnected { client_id, reason } => {
            log::info!("Client {} {}", client_id, reason.as_str());
        }
        ServerEvent::ConnectionDenied { addr, reason } => {
            log::warn!("Connection denied to {}: {}", addr, reason);
        }
        ServerEvent::PredictionError { client_id } => {
            log::debug!("Client {} mispredicted, correcting", client_id);
        }
        ServerEvent::PlayerHit(hit) => {
            if hit.respawned {
                log::info!("Player {} fragged player {}", hit.shooter, hit.victim);
            } else {
                log::debug!(
                    "Player {} hit player {} ({} health left)",
                    hit.shooter,
                    hit.victim,
                    hit.health_left
                );
            }
        }
        ServerEvent::Error { message } => {
            log::error!("{}", message);
        }
    }
}
