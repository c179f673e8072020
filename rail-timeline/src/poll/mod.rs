//! Polling: clocks, the refresh scheduler and request supersession.

mod clock;
mod requests;
mod scheduler;

pub use clock::{Clock, FakeClock, SystemClock};
pub use requests::{QueryKey, RequestRegistry, Superseded, Ticket};
pub use scheduler::{PollTask, Scheduler};
