use std::fmt::Debug;

use log::LevelFilter;

use crate::config::LoggerSettings;
use crate::middleware::{Middleware, Next};
use crate::{Store, Version};

/// Logs every action and the version it produced. Never alters the action or the chain.
pub struct LoggerMiddleware {
    level: LevelFilter,
    log_state: bool,
}

impl LoggerMiddleware {
    pub fn new(settings: &LoggerSettings) -> Self {
        Self {
            level: settings.level,
            log_state: settings.log_state,
        }
    }
}

impl<State, Action> Middleware<State, Action> for LoggerMiddleware
where
    State: Debug + Clone + Send + Sync + 'static,
    Action: Debug + Send + 'static,
{
    fn handle(
        &self,
        store: &Store<State, Action>,
        action: Action,
        next: Next<'_, State, Action>,
    ) -> anyhow::Result<()> {
        let Some(level) = self.level.to_level().filter(|level| log::log_enabled!(*level)) else {
            return next.run(action);
        };

        log::log!(level, "action: {:?}", action);
        let before = store.version();
        let result = next.run(action);
        let after = store.version();

        if self.log_state && after != before {
            log::log!(level, "{}: {:?}", summary(before, after), store.state());
        } else {
            log::log!(level, "{}", summary(before, after));
        }
        result
    }
}

/// Describes what a dispatch left behind. Nested dispatches commit too, so a version change does
/// not mean this action was the one reduced.
fn summary(before: Version, after: Version) -> String {
    match after - before {
        0 => format!("no new state (still version {})", after),
        1 => format!("latest state v{} (1 new version)", after),
        new => format!("latest state v{} ({} new versions)", after, new),
    }
}
