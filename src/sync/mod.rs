pub mod clock;
pub mod gate;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use gate::TimestampGate;
