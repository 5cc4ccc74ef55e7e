//! Depth path: follower of the timestamp gate

use std::path::PathBuf;

use super::processor::{StreamProcessor, SyncPolicy};
use crate::capture::{
    DepthTreatment, ImageBuffer, ImageType, LockedRect, PixelFormat, RawFrame, Resolution,
    SensorStream, StreamRequest,
};
use crate::error::{CaptureError, Result, StorageError};
use crate::storage::DatasetWriter;
use crate::sync::{Timestamp, TimestampGate};
use crate::DepthStreamConfig;

pub type DepthProcessor<S> = StreamProcessor<S, DepthSync>;

#[derive(Debug, Clone)]
pub struct DepthSync {
    resolution: Resolution,
    near_mode: bool,
    treatment: DepthTreatment,
    /// Timestamp of the last depth save attempt
    last_saved: Option<Timestamp>,
}

impl DepthSync {
    pub fn new(config: &DepthStreamConfig) -> Self {
        Self {
            resolution: config.resolution,
            near_mode: config.near_mode,
            treatment: config.treatment,
            last_saved: None,
        }
    }

    pub const fn supports_resolution(resolution: Resolution) -> bool {
        matches!(
            resolution,
            Resolution::Res80x60 | Resolution::Res320x240 | Resolution::Res640x480
        )
    }

    pub fn near_mode(&self) -> bool {
        self.near_mode
    }

    pub fn treatment(&self) -> DepthTreatment {
        self.treatment
    }

    pub fn last_saved(&self) -> Option<Timestamp> {
        self.last_saved
    }
}

impl SyncPolicy for DepthSync {
    const STREAM: &'static str = "depth";

    fn stream_request(&self) -> StreamRequest {
        StreamRequest {
            image_type: ImageType::Depth,
            resolution: self.resolution,
            near_mode: self.near_mode,
        }
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Depth16
    }

    fn decode(&self, frame: &RawFrame, rect: &LockedRect, buffer: &mut ImageBuffer) -> Result<()> {
        let (width, rows) = (buffer.width() as usize, buffer.height() as usize);
        let bits = rect.packed_rows(width * 2, rows);
        buffer.copy_depth(&bits, frame.near_mode, self.treatment)
    }

    /// Never requests; follows whatever the color path was last granted,
    /// once per distinct timestamp.
    fn claim_timestamp(&mut self, gate: &TimestampGate) -> Option<Timestamp> {
        let timestamp = gate.peek_last_timestamp()?;
        if self.last_saved == Some(timestamp) {
            return None;
        }
        self.last_saved = Some(timestamp);
        Some(timestamp)
    }

    fn persist(
        &self,
        writer: &DatasetWriter,
        timestamp: Timestamp,
        buffer: &ImageBuffer,
    ) -> std::result::Result<PathBuf, StorageError> {
        writer.save_depth_frame(timestamp, buffer)
    }
}

impl<S: SensorStream> StreamProcessor<S, DepthSync> {
    pub fn set_near_mode(&mut self, near_mode: bool) -> Result<()> {
        self.policy.near_mode = near_mode;
        if self.started {
            self.stream.set_near_mode(near_mode)?;
        }
        Ok(())
    }

    pub fn set_depth_treatment(&mut self, treatment: DepthTreatment) {
        self.policy.treatment = treatment;
    }

    pub fn set_image_resolution(&mut self, resolution: Resolution) -> Result<()> {
        if !DepthSync::supports_resolution(resolution) {
            return Err(CaptureError::InvalidConfig(format!(
                "depth stream does not support {resolution:?}"
            )));
        }
        self.policy.resolution = resolution;
        self.reopen()
    }
}
