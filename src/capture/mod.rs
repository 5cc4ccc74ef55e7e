pub mod decoder;
pub mod frame;
pub mod image_buffer;
pub mod sensor;
pub mod synthetic;

pub use decoder::DepthTreatment;
pub use frame::{ImageType, LockedRect, PixelFormat, RawFrame, Resolution, StreamRequest};
pub use image_buffer::{ImageBuffer, PixelData};
pub use sensor::{FrameGuard, SensorStream};
pub use synthetic::{ScriptedFrame, SyntheticSensor};
