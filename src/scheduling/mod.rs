mod announcer;
mod task;

pub use announcer::{Announcer, DEFAULT_CHECK_INTERVAL, announce_once};
pub use task::ScheduledTask;
