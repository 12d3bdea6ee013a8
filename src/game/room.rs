//! Room connection slice.
//!
//! Status flags move in fixed groups so that no two mutually exclusive states are ever visible at
//! once:
//!
//! ```text
//! Idle -> Joining  -> Joined  | JoinFailed
//! Idle -> Creating -> Created | CreateFailed
//! Joined | Created -> Leaving -> Idle
//! ```

use std::collections::BTreeMap;

use super::Action;

pub type RoomProperties = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoomAction {
    /// `None` asks for any open room.
    JoinStart { room_name: Option<String> },
    JoinSuccess { room_name: String },
    JoinFailure,
    CreateStart { room_name: String },
    CreateSuccess { room_name: String },
    CreateFailure { room_name: String },
    /// `None` leaves the current room.
    LeaveStart { room_name: Option<String> },
    LeaveSuccess,
    LeaveFailure,
    UpdateRoomProperties { room_properties: RoomProperties },
}

pub const JOINING: &str = "Joining room...";
pub const JOINED: &str = "Joined room.";
pub const JOIN_FAILED: &str = "Joining room failed.";
pub const CREATING: &str = "Creating room...";
pub const CREATED: &str = "Created room.";
pub const CREATE_FAILED: &str = "Creating room failed.";
pub const LEAVING: &str = "Leaving room...";
pub const LEFT: &str = "Left room";
pub const LEAVE_FAILED: &str = "Leaving room failed.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomState {
    pub is_joining: bool,
    pub is_joined: bool,
    pub is_join_failed: bool,
    pub is_creating: bool,
    pub is_created: bool,
    pub is_create_failed: bool,
    pub is_leaving: bool,
    pub room_name: Option<String>,
    pub feedback_text: String,
    pub room_properties: RoomProperties,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Idle,
    Joining,
    Joined,
    JoinFailed,
    Creating,
    Created,
    CreateFailed,
    Leaving,
}

impl RoomState {
    pub fn status(&self) -> RoomStatus {
        if self.is_leaving {
            RoomStatus::Leaving
        } else if self.is_creating {
            RoomStatus::Creating
        } else if self.is_joining {
            RoomStatus::Joining
        } else if self.is_created {
            RoomStatus::Created
        } else if self.is_joined {
            RoomStatus::Joined
        } else if self.is_create_failed {
            RoomStatus::CreateFailed
        } else if self.is_join_failed {
            RoomStatus::JoinFailed
        } else {
            RoomStatus::Idle
        }
    }

    pub fn is_in_room(&self) -> bool {
        self.is_joined && !self.is_leaving
    }

    /// Flag exclusivity. Registered as a store invariant.
    pub fn check(&self) -> anyhow::Result<()> {
        let joins = [self.is_joining, self.is_joined, self.is_join_failed];
        anyhow::ensure!(
            joins.iter().filter(|flag| **flag).count() <= 1,
            "conflicting join flags: {:?}",
            self
        );
        let creates = [self.is_creating, self.is_created, self.is_create_failed];
        anyhow::ensure!(
            creates.iter().filter(|flag| **flag).count() <= 1,
            "conflicting create flags: {:?}",
            self
        );
        anyhow::ensure!(
            !self.is_creating || self.is_joining,
            "creating a room without joining it: {:?}",
            self
        );
        anyhow::ensure!(
            !self.is_leaving || !(self.is_joining || self.is_joined || self.is_creating),
            "leaving while joining or joined: {:?}",
            self
        );
        anyhow::ensure!(
            !self.is_joined || self.room_name.is_some(),
            "joined without a room name"
        );
        Ok(())
    }
}

pub fn reduce(state: RoomState, action: &Action) -> RoomState {
    let Action::Room(action) = action else {
        return state;
    };

    match action {
        RoomAction::JoinStart { room_name } => RoomState {
            is_joining: true,
            is_joined: false,
            is_join_failed: false,
            is_creating: false,
            is_created: false,
            is_create_failed: false,
            is_leaving: false,
            feedback_text: JOINING.to_string(),
            room_name: room_name.clone(),
            ..state
        },
        RoomAction::JoinSuccess { room_name } => RoomState {
            is_joining: false,
            is_joined: true,
            is_join_failed: false,
            is_creating: false,
            is_leaving: false,
            feedback_text: JOINED.to_string(),
            room_name: Some(room_name.clone()),
            ..state
        },
        RoomAction::JoinFailure => RoomState {
            is_joining: false,
            is_joined: false,
            is_join_failed: true,
            is_creating: false,
            is_leaving: false,
            feedback_text: JOIN_FAILED.to_string(),
            room_name: None,
            ..state
        },
        RoomAction::CreateStart { room_name } => RoomState {
            is_joining: true,
            is_joined: false,
            is_join_failed: false,
            is_creating: true,
            is_created: false,
            is_create_failed: false,
            is_leaving: false,
            feedback_text: CREATING.to_string(),
            room_name: Some(room_name.clone()),
            ..state
        },
        RoomAction::CreateSuccess { room_name } => RoomState {
            is_joining: false,
            is_joined: true,
            is_join_failed: false,
            is_creating: false,
            is_created: true,
            is_create_failed: false,
            is_leaving: false,
            feedback_text: CREATED.to_string(),
            room_name: Some(room_name.clone()),
            ..state
        },
        RoomAction::CreateFailure { room_name } => RoomState {
            is_joining: false,
            is_joined: false,
            is_join_failed: false,
            is_creating: false,
            is_created: false,
            is_create_failed: true,
            is_leaving: false,
            feedback_text: CREATE_FAILED.to_string(),
            room_name: Some(room_name.clone()),
            ..state
        },
        RoomAction::LeaveStart { room_name } => {
            let room_name = room_name.clone().or(state.room_name);
            RoomState {
                is_joining: false,
                is_joined: false,
                is_join_failed: false,
                is_creating: false,
                is_leaving: true,
                feedback_text: LEAVING.to_string(),
                room_name,
                ..state
            }
        }
        RoomAction::LeaveSuccess => RoomState {
            feedback_text: LEFT.to_string(),
            ..RoomState::default()
        },
        RoomAction::LeaveFailure if state.is_leaving => RoomState {
            is_leaving: false,
            is_joined: state.room_name.is_some(),
            feedback_text: LEAVE_FAILED.to_string(),
            ..state
        },
        RoomAction::LeaveFailure => state,
        RoomAction::UpdateRoomProperties { room_properties } => RoomState {
            room_properties: room_properties.clone(),
            ..state
        },
    }
}
