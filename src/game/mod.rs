//! The multiplayer camera demo built on the store: camera look, room connection and the player
//! roster, each a slice owned by one reducer.

pub mod camera;
pub mod connector;
pub mod players;
pub mod room;

use std::sync::Arc;

use crate::config::{ConfigError, Settings};
use crate::logger::LoggerMiddleware;
use crate::Store;

use camera::{CameraAction, CameraState, LookReducer};
use connector::{RoomConnector, RoomService};
use players::{PlayerAction, PlayerRoster, RosterReducer};
use room::{RoomAction, RoomState};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub camera: CameraState,
    pub room: RoomState,
    pub players: PlayerRoster,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Camera(CameraAction),
    Room(RoomAction),
    Player(PlayerAction),
}

pub type AppStore = Store<AppState, Action>;

/// Builds the application store. Without a `service` room actions only change state and nothing
/// talks to the network.
///
/// `settings` are validated first, since they may have been assembled in code rather than loaded.
pub fn build_store(
    settings: &Settings,
    service: Option<Arc<dyn RoomService>>,
) -> Result<AppStore, ConfigError> {
    settings.validate()?;
    let mut builder = Store::builder(AppState::default())
        .config(settings.store.clone())
        .slice(
            |state: &mut AppState| &mut state.camera,
            LookReducer::new(settings.camera.clone()),
        )
        .slice(|state: &mut AppState| &mut state.room, room::reduce)
        .slice(
            |state: &mut AppState| &mut state.players,
            RosterReducer::new(settings.room.max_players_per_room),
        )
        .invariant(|state: &AppState| state.room.check())
        .middleware(LoggerMiddleware::new(&settings.logger));

    if let Some(service) = service {
        builder = builder.middleware(RoomConnector::new(service, settings.room.clone()));
    }
    Ok(builder.build())
}
