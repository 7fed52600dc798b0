use crate::game::generator::Location;
use crate::game::state::PlayerId;

/// Whether the player is still part of the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerConnectionState {
    InArena,
    Left,
}

/// Player inside an arena roster
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaPlayer {
    pub id: PlayerId,
    pub name: String,
    pub connection_state: PlayerConnectionState,
    /// Last known position, used for teammate tracking
    pub location: Location,
}

impl ArenaPlayer {
    pub fn new(id: PlayerId, name: String, location: Location) -> Self {
        Self {
            id,
            name,
            connection_state: PlayerConnectionState::InArena,
            location,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == PlayerConnectionState::InArena
    }

    pub fn leave(&mut self) {
        self.connection_state = PlayerConnectionState::Left;
    }

    pub fn move_to(&mut self, location: Location) {
        self.location = location;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn player() -> ArenaPlayer {
        ArenaPlayer::new(Uuid::new_v4(), "Steve".to_string(), Location::new("bw_1", 0.0, 64.0, 0.0))
    }

    #[test]
    fn test_new_player_is_in_arena() {
        let player = player();
        assert!(player.is_connected());
        assert_eq!(player.location.world, "bw_1");
    }

    #[test]
    fn test_leave() {
        let mut player = player();
        player.leave();
        assert!(!player.is_connected());
        assert_eq!(player.connection_state, PlayerConnectionState::Left);
    }

    #[test]
    fn test_move_changes_world() {
        let mut player = player();
        player.move_to(Location::new("bw_lobby", 10.0, 64.0, 0.0));
        assert_eq!(player.location.x, 10.0);
        assert_eq!(player.location.world, "bw_lobby");
    }
}
