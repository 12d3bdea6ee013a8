use crate::reducer::Reducer;

use super::room::RoomAction;
use super::Action;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPlayer {
    pub actor_number: i32,
    pub nickname: String,
    pub is_local: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    Entered(NetworkPlayer),
    Left { actor_number: i32 },
    Clear,
}

/// Players in the current room, ordered by actor number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerRoster {
    pub players: Vec<NetworkPlayer>,
}

impl PlayerRoster {
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, actor_number: i32) -> Option<&NetworkPlayer> {
        self.players
            .binary_search_by_key(&actor_number, |player| player.actor_number)
            .ok()
            .map(|index| &self.players[index])
    }

    pub fn local(&self) -> Option<&NetworkPlayer> {
        self.players.iter().find(|player| player.is_local)
    }
}

/// Keeps the roster within the room's player limit and empties it when the room is left.
pub struct RosterReducer {
    max_players: usize,
}

impl RosterReducer {
    pub fn new(max_players_per_room: u8) -> Self {
        Self {
            max_players: usize::from(max_players_per_room),
        }
    }
}

impl Reducer<PlayerRoster, Action> for RosterReducer {
    fn reduce(&self, mut state: PlayerRoster, action: &Action) -> PlayerRoster {
        match action {
            Action::Player(PlayerAction::Entered(player)) => {
                match state
                    .players
                    .binary_search_by_key(&player.actor_number, |p| p.actor_number)
                {
                    Ok(index) => state.players[index] = player.clone(),
                    Err(index) if state.players.len() < self.max_players => {
                        state.players.insert(index, player.clone())
                    }
                    Err(_) => {}
                }
                state
            }
            Action::Player(PlayerAction::Left { actor_number }) => {
                state.players.retain(|p| p.actor_number != *actor_number);
                state
            }
            Action::Player(PlayerAction::Clear)
            | Action::Room(RoomAction::LeaveSuccess)
            | Action::Room(RoomAction::JoinFailure)
            | Action::Room(RoomAction::CreateFailure { .. }) => PlayerRoster::default(),
            _ => state,
        }
    }
}
