pub mod color;
pub mod depth;
pub mod processor;

pub use color::{ColorProcessor, ColorSync};
pub use depth::{DepthProcessor, DepthSync};
pub use processor::{CycleOutcome, StreamProcessor, SyncPolicy};
