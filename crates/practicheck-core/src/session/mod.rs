//! Session lifecycle: the idle timer and the auth context that owns it.

pub mod clock;
pub mod context;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{AuthContext, AuthError, Session, SessionEvent};
pub use timer::{
    IdleTimer, TimeoutPolicy, TimerError, TimerEvent, TimerState, DEFAULT_ACTIVITY_DEBOUNCE_MS,
    DEFAULT_LOGOUT_AFTER_SECS, DEFAULT_WARNING_AFTER_SECS,
};
