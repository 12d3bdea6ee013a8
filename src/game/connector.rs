use std::sync::Arc;

use async_trait::async_trait;

use crate::action_sender::ActionSender;
use crate::config::RoomSettings;
use crate::effect::Effect;
use crate::middleware::{Middleware, Next};
use crate::Store;

use super::room::{RoomAction, RoomState};
use super::{Action, AppState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOptions {
    pub max_players: u8,
}

/// The multiplayer transport, seen only through the calls the room flow needs.
#[async_trait]
pub trait RoomService: Send + Sync + 'static {
    async fn join(&self, room_name: &str) -> anyhow::Result<()>;

    /// Joins any open room and returns its name.
    async fn join_random(&self) -> anyhow::Result<String>;

    async fn create(&self, room_name: &str, options: &RoomOptions) -> anyhow::Result<()>;

    async fn leave(&self) -> anyhow::Result<()>;
}

/// Drives `RoomService` from the room `*Start` actions.
///
/// The start action is reduced first so observers see the in-progress state, then the service call
/// runs as an async effect and reports back with the matching success or failure action. If a later
/// middleware drops the start action, the service is not called.
pub struct RoomConnector {
    service: Arc<dyn RoomService>,
    settings: RoomSettings,
}

impl RoomConnector {
    pub fn new(service: Arc<dyn RoomService>, settings: RoomSettings) -> Self {
        Self { service, settings }
    }

    fn effect(&self, action: &RoomAction) -> Effect<RoomAction> {
        let service = self.service.clone();
        match action {
            RoomAction::JoinStart {
                room_name: Some(room_name),
            } => {
                let room_name = room_name.clone();
                Effect::run(move |sender| async move {
                    match service.join(&room_name).await {
                        Ok(()) => sender.send(RoomAction::JoinSuccess { room_name }),
                        Err(err) => {
                            log::warn!("joining room {} failed: {:#}", room_name, err);
                            sender.send(RoomAction::JoinFailure);
                        }
                    }
                })
            }
            RoomAction::JoinStart { room_name: None } if self.settings.should_join_random_room => {
                Effect::run(move |sender| async move {
                    match service.join_random().await {
                        Ok(room_name) => sender.send(RoomAction::JoinSuccess { room_name }),
                        Err(err) => {
                            log::warn!("joining a random room failed: {:#}", err);
                            sender.send(RoomAction::JoinFailure);
                        }
                    }
                })
            }
            RoomAction::JoinStart { room_name: None } => {
                log::warn!("no room name given and random join is disabled");
                Effect::send(RoomAction::JoinFailure)
            }
            RoomAction::CreateStart { room_name } => {
                let room_name = room_name.clone();
                let options = RoomOptions {
                    max_players: self.settings.max_players_per_room,
                };
                Effect::run(move |sender| async move {
                    match service.create(&room_name, &options).await {
                        Ok(()) => sender.send(RoomAction::CreateSuccess { room_name }),
                        Err(err) => {
                            log::warn!("creating room {} failed: {:#}", room_name, err);
                            sender.send(RoomAction::CreateFailure { room_name });
                        }
                    }
                })
            }
            RoomAction::LeaveStart { .. } => Effect::run(move |sender| async move {
                match service.leave().await {
                    Ok(()) => sender.send(RoomAction::LeaveSuccess),
                    Err(err) => {
                        log::warn!("leaving room failed: {:#}", err);
                        sender.send(RoomAction::LeaveFailure);
                    }
                }
            }),
            _ => Effect::none(),
        }
    }
}

impl Middleware<AppState, Action> for RoomConnector {
    fn handle(
        &self,
        store: &Store<AppState, Action>,
        action: Action,
        next: Next<'_, AppState, Action>,
    ) -> anyhow::Result<()> {
        let Action::Room(room) = &action else {
            return next.run(action);
        };
        let effect = self.effect(room);
        if effect.is_none() {
            return next.run(action);
        }

        let started = room.clone();
        let before = store.version();
        next.run(action)?;
        if store.version() == before || !in_flight(&started, &store.state().room) {
            log::debug!("{:?} never reached the reducer, no service call", started);
            return Ok(());
        }
        store.perform(effect.map(Action::Room));
        Ok(())
    }
}

/// Whether `state` shows the request started by `action` as pending.
fn in_flight(action: &RoomAction, state: &RoomState) -> bool {
    match action {
        RoomAction::JoinStart { .. } => state.is_joining,
        RoomAction::CreateStart { .. } => state.is_creating,
        RoomAction::LeaveStart { .. } => state.is_leaving,
        _ => true,
    }
}
