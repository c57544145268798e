//! Server-side replay of client command batches and client-side correction.

use rand::Rng;

use crate::simulation::{Command, CommandStack, HitEvent, apply_command, resolve_hits};
use crate::state::{GameState, Kinematics};
use crate::tuning::PREDICTION_EPSILON;

/// True when every component of `simulated` is within `PREDICTION_EPSILON` of `predicted`.
pub fn matches_prediction(simulated: &Kinematics, predicted: &Kinematics) -> bool {
    let close = |a: f32, b: f32| (a - b).abs() <= PREDICTION_EPSILON;

    close(simulated.position.x, predicted.position.x)
        && close(simulated.position.y, predicted.position.y)
        && close(simulated.orientation, predicted.orientation)
        && close(simulated.speed, predicted.speed)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub prediction_error: bool,
    /// Bullet slots fired by the batch.
    pub shots: Vec<usize>,
    pub hits: Vec<HitEvent>,
}

/// Replays `commands` for player `id` and checks the result against `predicted`.
///
/// On a match the simulated kinematics stay committed. On a mismatch the
/// player's kinematics are restored to their value before the batch, or to
/// the respawn point if the batch got them killed, and `prediction_error` is
/// set. Shots fired by the batch stand either way.
/// Returns `None` when `id` is not a live player.
pub fn reconcile_batch<R: Rng + ?Sized>(
    state: &mut GameState,
    id: u32,
    predicted: &Kinematics,
    commands: &[Command],
    now: f32,
    rng: &mut R,
) -> Option<ReconcileOutcome> {
    let mut saved = state.player(id)?.kinematics;
    let mut outcome = ReconcileOutcome::default();

    for command in commands {
        let Some(slot) = apply_command(state, id, command, now) else {
            continue;
        };
        outcome.shots.push(slot);
        let hits = resolve_hits(state, slot, rng);
        // A shooter who respawns mid-batch rolls back to the respawn point.
        if hits.iter().any(|hit| hit.victim == id && hit.respawned) {
            saved = state.player(id)?.kinematics;
        }
        outcome.hits.extend(hits);
    }

    let player = state.player_mut(id)?;
    if !matches_prediction(&player.kinematics, predicted) {
        log::warn!(
            "Prediction error for player {}: server {:?}, client {:?}",
            id,
            player.kinematics,
            predicted
        );
        player.kinematics = saved;
        outcome.prediction_error = true;
    }

    Some(outcome)
}

/// Client side: adopt the server's state for the controlled player and drop
/// every command still waiting to be sent.
pub fn apply_correction(
    state: &mut GameState,
    id: u32,
    authoritative: Kinematics,
    health: i32,
    commands: &mut CommandStack,
) -> bool {
    let Some(player) = state.player_mut(id) else {
        return false;
    };
    player.kinematics = authoritative;
    player.health = health;
    commands.clear();
    true
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::simulation::{ActionFlags, advance_player};
    use crate::tuning::{BASE_HEALTH, BULLET_DAMAGE};

    fn state_with_player_at(position: Vec2) -> GameState {
        let mut state = GameState::new();
        state.place_player(0, Kinematics::new(position, 0.0), 100);
        state
    }

    fn predict(start: Kinematics, commands: &[Command]) -> Kinematics {
        let mut k = start;
        for command in commands {
            advance_player(&mut k, command);
        }
        k
    }

    #[test]
    fn epsilon_is_inclusive_per_component() {
        let a = Kinematics::new(Vec2::new(1.0, 2.0), 0.5);
        let mut b = a;
        b.position.x += PREDICTION_EPSILON * 0.5;
        assert!(matches_prediction(&a, &b));

        b.orientation += 1e-3;
        assert!(!matches_prediction(&a, &b));

        let mut c = a;
        c.speed += 1e-3;
        assert!(!matches_prediction(&a, &c));
    }

    #[test]
    fn matching_batch_commits_server_state() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut state = state_with_player_at(Vec2::ZERO);
        let commands = [
            Command::idle(0.3, 0.1).with_actions(ActionFlags::MOVE_UP),
            Command::idle(0.6, 0.1).with_actions(ActionFlags::MOVE_RIGHT),
        ];
        let predicted = predict(state.player(0).unwrap().kinematics, &commands);

        let outcome = reconcile_batch(&mut state, 0, &predicted, &commands, 1.0, &mut rng).unwrap();
        assert!(!outcome.prediction_error);

        let committed = state.player(0).unwrap().kinematics;
        assert!((committed.position - Vec2::new(0.4, 0.4)).length() < 1e-5);
        assert_eq!(committed.orientation, 0.6);
    }

    #[test]
    fn diverging_prediction_is_flagged_and_rolled_back() {
        let mut rng = StdRng::seed_from_u64(12);
        let start = Vec2::new(3.0, -2.0);
        let mut state = state_with_player_at(start);
        let commands = [Command::idle(0.0, 0.1).with_actions(ActionFlags::MOVE_UP)];

        let mut predicted = predict(state.player(0).unwrap().kinematics, &commands);
        predicted.position.y += 0.5;

        let outcome = reconcile_batch(&mut state, 0, &predicted, &commands, 1.0, &mut rng).unwrap();
        assert!(outcome.prediction_error);
        assert_eq!(state.player(0).unwrap().kinematics.position, start);
    }

    #[test]
    fn shots_in_a_batch_hit_other_players() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut state = state_with_player_at(Vec2::ZERO);
        state.place_player(1, Kinematics::new(Vec2::new(6.0, 0.0), 0.0), 100);

        let commands = [Command::idle(0.0, 0.016).shooting_at(Vec2::new(6.2, 0.1))];
        let predicted = predict(state.player(0).unwrap().kinematics, &commands);

        let outcome = reconcile_batch(&mut state, 0, &predicted, &commands, 2.0, &mut rng).unwrap();
        assert_eq!(outcome.shots.len(), 1);
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].victim, 1);
        assert_eq!(state.player(1).unwrap().health, 75);
        assert_eq!(state.bullet(outcome.shots[0]).unwrap().time_start, 2.0);
    }

    #[test]
    fn rollback_keeps_a_respawn_from_the_same_batch() {
        let mut rng = StdRng::seed_from_u64(15);
        let mut state = state_with_player_at(Vec2::new(2.0, 2.0));
        state.player_mut(0).unwrap().health = BULLET_DAMAGE;
        let respawn_point = Kinematics::random(&mut rng.clone());

        let commands = [Command::idle(0.0, 0.016).shooting_at(Vec2::new(2.0, 2.0))];
        let predicted = Kinematics::new(Vec2::new(-9.0, -9.0), 0.0);

        let outcome = reconcile_batch(&mut state, 0, &predicted, &commands, 1.0, &mut rng).unwrap();
        assert!(outcome.prediction_error);
        assert!(outcome.hits[0].respawned);

        let player = state.player(0).unwrap();
        assert_eq!(player.kinematics, respawn_point);
        assert_eq!(player.health, BASE_HEALTH);
    }

    #[test]
    fn unknown_player_is_ignored() {
        let mut rng = StdRng::seed_from_u64(14);
        let mut state = GameState::new();
        let predicted = Kinematics::default();
        assert!(reconcile_batch(&mut state, 5, &predicted, &[], 0.0, &mut rng).is_none());
    }

    #[test]
    fn correction_overwrites_state_and_clears_commands() {
        let mut state = state_with_player_at(Vec2::ZERO);
        let mut stack = CommandStack::new();
        stack.push(Command::idle(0.0, 0.1));
        stack.push(Command::idle(0.0, 0.1));

        let truth = Kinematics::new(Vec2::new(-4.0, 7.0), 1.5);
        assert!(apply_correction(&mut state, 0, truth, 50, &mut stack));
        assert!(stack.is_empty());

        let player = state.player(0).unwrap();
        assert_eq!(player.kinematics, truth);
        assert_eq!(player.health, 50);
    }
}
