mod action_sender;
mod combine;
pub mod config;
mod effect;
mod engine;
pub mod game;
mod logger;
mod middleware;
mod reducer;
mod state_stream;
mod store;
mod subscription;

pub use action_sender::{ActionSender, AnyActionSender};
pub use combine::{CombinedReducer, Lens, Slice};
pub use config::{ConfigError, LoggerSettings, Settings, StoreConfig};
pub use effect::{AsyncActionJob, Effect, EffectValue};
pub use logger::LoggerMiddleware;
pub use middleware::{Middleware, Next};
pub use reducer::Reducer;
pub use state_stream::StateStream;
pub use store::{DispatchOutcome, Store, StoreBuilder, Version, WeakStore};
pub use subscription::{Subscription, SubscriptionId};
