use crate::config::LookSettings;
use crate::reducer::Reducer;
use crate::subscription::Subscription;

use super::{Action, AppStore};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraAction {
    /// Pointer movement since the last frame.
    Look { delta_x: f32, delta_y: f32 },
    Reset,
}

/// Camera orientation in degrees. Yaw stays within `[0, 360)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraState {
    pub yaw: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };
}

impl CameraState {
    /// Rotation to apply to the camera transform: pitch about X, then yaw about Y.
    pub fn local_rotation(&self) -> Quaternion {
        let (sy, cy) = (self.yaw.to_radians() / 2.0).sin_cos();
        let (sp, cp) = (self.pitch.to_radians() / 2.0).sin_cos();
        Quaternion {
            x: cy * sp,
            y: sy * cp,
            z: -sy * sp,
            w: cy * cp,
        }
    }
}

pub struct LookReducer {
    settings: LookSettings,
}

impl LookReducer {
    /// Non-finite values fall back to the defaults and an inverted pitch range is swapped, so
    /// reducing never hits `f32::clamp`'s preconditions.
    pub fn new(settings: LookSettings) -> Self {
        let defaults = LookSettings::default();
        let finite = |value: f32, fallback: f32| if value.is_finite() { value } else { fallback };
        let low = finite(settings.min_pitch, defaults.min_pitch);
        let high = finite(settings.max_pitch, defaults.max_pitch);
        Self {
            settings: LookSettings {
                sensitivity: finite(settings.sensitivity, defaults.sensitivity),
                min_pitch: low.min(high),
                max_pitch: low.max(high),
            },
        }
    }
}

impl Reducer<CameraState, Action> for LookReducer {
    fn reduce(&self, state: CameraState, action: &Action) -> CameraState {
        match action {
            Action::Camera(CameraAction::Look { delta_x, delta_y })
                if delta_x.is_finite() && delta_y.is_finite() =>
            {
                let sensitivity = self.settings.sensitivity;
                CameraState {
                    yaw: (state.yaw + delta_x * sensitivity).rem_euclid(360.0),
                    pitch: (state.pitch - delta_y * sensitivity)
                        .clamp(self.settings.min_pitch, self.settings.max_pitch),
                }
            }
            Action::Camera(CameraAction::Reset) => CameraState::default(),
            _ => state,
        }
    }
}

/// Applies every committed camera rotation through `apply`, e.g. to a render transform.
///
/// Only changed rotations are forwarded.
pub fn follow(store: &AppStore, apply: impl Fn(Quaternion) + Send + Sync + 'static) -> Subscription {
    let last = parking_lot::Mutex::new(store.state().camera);
    store.subscribe(move |state| {
        let mut last = last.lock();
        if *last != state.camera {
            *last = state.camera;
            apply(state.camera.local_rotation());
        }
    })
}
