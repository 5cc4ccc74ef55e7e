//! Color path: leader of the timestamp gate

use std::path::PathBuf;

use tracing::warn;

use super::processor::{StreamProcessor, SyncPolicy};
use crate::capture::{
    ImageBuffer, ImageType, LockedRect, PixelFormat, RawFrame, Resolution, SensorStream,
    StreamRequest,
};
use crate::error::{CaptureError, Result, StorageError};
use crate::storage::DatasetWriter;
use crate::sync::{Timestamp, TimestampGate};
use crate::ColorStreamConfig;

pub type ColorProcessor<S> = StreamProcessor<S, ColorSync>;

#[derive(Debug, Clone)]
pub struct ColorSync {
    image_type: ImageType,
    resolution: Resolution,
}

impl ColorSync {
    pub fn new(config: &ColorStreamConfig) -> Self {
        Self {
            image_type: config.image_type,
            resolution: config.resolution,
        }
    }

    pub const fn supports_resolution(resolution: Resolution) -> bool {
        matches!(resolution, Resolution::Res640x480 | Resolution::Res1280x960)
    }

    pub const fn supports_image_type(image_type: ImageType) -> bool {
        image_type.is_color()
    }

    pub fn image_type(&self) -> ImageType {
        self.image_type
    }
}

impl SyncPolicy for ColorSync {
    const STREAM: &'static str = "color";

    fn stream_request(&self) -> StreamRequest {
        StreamRequest {
            image_type: self.image_type,
            resolution: self.resolution,
            near_mode: false,
        }
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Bgra32
    }

    fn decode(&self, _frame: &RawFrame, rect: &LockedRect, buffer: &mut ImageBuffer) -> Result<()> {
        let (width, rows) = (buffer.width() as usize, buffer.height() as usize);
        match self.image_type {
            ImageType::RawBayer => buffer.copy_bayer(&rect.packed_rows(width, rows)),
            ImageType::Infrared => buffer.copy_infrared(&rect.packed_rows(width * 2, rows)),
            ImageType::Color | ImageType::ColorYuv => {
                buffer.copy_rgb(&rect.packed_rows(width * 4, rows))
            }
            ImageType::Depth => Err(CaptureError::InvalidFrame(
                "depth payload on the color stream".into(),
            )),
        }
    }

    fn claim_timestamp(&mut self, gate: &TimestampGate) -> Option<Timestamp> {
        let granted = gate.request_timestamp();
        if granted.is_none() {
            metrics::counter!("timestamps_denied", "stream" => Self::STREAM).increment(1);
        }
        granted
    }

    fn persist(
        &self,
        writer: &DatasetWriter,
        timestamp: Timestamp,
        buffer: &ImageBuffer,
    ) -> std::result::Result<PathBuf, StorageError> {
        writer.save_color_frame(timestamp, buffer)
    }
}

impl<S: SensorStream> StreamProcessor<S, ColorSync> {
    /// Switch between color, YUV, infrared and raw Bayer. Non-color types
    /// are rejected. A started stream is re-opened with the new type.
    pub fn set_image_type(&mut self, image_type: ImageType) -> Result<()> {
        if !ColorSync::supports_image_type(image_type) {
            warn!("Ignoring non-color image type {:?}", image_type);
            return Err(CaptureError::InvalidConfig(format!(
                "{image_type:?} is not a color image type"
            )));
        }
        self.policy.image_type = image_type;
        if let Some(viewer) = self.viewer.as_mut() {
            viewer.set_image_type(image_type);
        }
        self.reopen()
    }

    /// Only 640x480 and 1280x960 are accepted
    pub fn set_image_resolution(&mut self, resolution: Resolution) -> Result<()> {
        if !ColorSync::supports_resolution(resolution) {
            return Err(CaptureError::InvalidConfig(format!(
                "color stream does not support {resolution:?}"
            )));
        }
        self.policy.resolution = resolution;
        self.reopen()
    }
}
