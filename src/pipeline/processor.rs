//! Synchronized stream processor shared by the color and depth paths.
//!
//! One cycle: `WaitFrame -> Decode -> {Skip | Persist} -> ReleaseFrame`.
//! The frame is released on every path, and per-frame failures degrade to
//! a dropped frame instead of escaping the cycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, trace, warn};

use crate::capture::{
    FrameGuard, ImageBuffer, LockedRect, PixelFormat, RawFrame, SensorStream, StreamRequest,
};
use crate::display::StreamViewer;
use crate::error::{Result, StorageError};
use crate::storage::DatasetWriter;
use crate::sync::{Timestamp, TimestampGate};

/// What distinguishes the color stream from the depth stream
pub trait SyncPolicy: Send {
    /// Stream label for logs and metrics
    const STREAM: &'static str;

    fn stream_request(&self) -> StreamRequest;

    fn pixel_format(&self) -> PixelFormat;

    fn decode(&self, frame: &RawFrame, rect: &LockedRect, buffer: &mut ImageBuffer) -> Result<()>;

    /// Decide whether this cycle persists, and under which timestamp
    fn claim_timestamp(&mut self, gate: &TimestampGate) -> Option<Timestamp>;

    fn persist(
        &self,
        writer: &DatasetWriter,
        timestamp: Timestamp,
        buffer: &ImageBuffer,
    ) -> std::result::Result<PathBuf, StorageError>;
}

/// Result of one `process_stream_frame` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing ready (or stream not started)
    NoFrame,
    /// Frame released without decoding
    Paused,
    /// Driver reported a zero row pitch
    InvalidData,
    /// Buffer updated, nothing persisted this cycle
    Decoded,
    Persisted(Timestamp),
    /// Decode or save failed; the frame is lost
    Dropped,
}

pub struct StreamProcessor<S, P> {
    pub(super) stream: S,
    pub(super) policy: P,
    gate: Arc<TimestampGate>,
    writer: Arc<DatasetWriter>,
    buffer: ImageBuffer,
    pub(super) viewer: Option<Box<dyn StreamViewer>>,
    paused: bool,
    pub(super) started: bool,
}

impl<S: SensorStream, P: SyncPolicy> StreamProcessor<S, P> {
    pub fn new(stream: S, policy: P, gate: Arc<TimestampGate>, writer: Arc<DatasetWriter>) -> Self {
        let buffer = ImageBuffer::new(policy.pixel_format(), policy.stream_request().resolution);
        Self {
            stream,
            policy,
            gate,
            writer,
            buffer,
            viewer: None,
            paused: false,
            started: false,
        }
    }

    /// Open the sensor stream and size the image buffer for it
    #[instrument(skip(self), fields(stream = P::STREAM))]
    pub fn start_stream(&mut self) -> Result<()> {
        let request = self.policy.stream_request();
        self.stream.open(&request)?;
        if self.buffer.width() != request.resolution.dimensions().0
            || self.buffer.height() != request.resolution.dimensions().1
        {
            self.buffer.set_image_size(request.resolution);
        }
        self.started = true;
        info!(
            "{} stream started: {:?} at {:?}",
            P::STREAM,
            request.image_type,
            request.resolution
        );
        Ok(())
    }

    /// Re-open with the current request if already started
    pub(super) fn reopen(&mut self) -> Result<()> {
        if self.started {
            self.start_stream()?;
        }
        Ok(())
    }

    /// Attach a viewer (or detach with `None`), returning the previous one.
    /// The new viewer immediately receives the current image and type.
    pub fn set_viewer(
        &mut self,
        mut viewer: Option<Box<dyn StreamViewer>>,
    ) -> Option<Box<dyn StreamViewer>> {
        if let Some(v) = viewer.as_mut() {
            v.set_image(&self.buffer);
            v.set_image_type(self.policy.stream_request().image_type);
        }
        std::mem::replace(&mut self.viewer, viewer)
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn image(&self) -> &ImageBuffer {
        &self.buffer
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Run one polling cycle. Never blocks on the sensor.
    pub fn process_stream_frame(&mut self) -> CycleOutcome {
        if !self.started {
            trace!("{} stream not started", P::STREAM);
            return CycleOutcome::NoFrame;
        }
        if !self.stream.frame_ready() {
            return CycleOutcome::NoFrame;
        }

        let Self {
            stream,
            policy,
            gate,
            writer,
            buffer,
            viewer,
            paused,
            ..
        } = self;

        let mut guard = match FrameGuard::acquire(stream) {
            Ok(guard) => guard,
            Err(e) => {
                debug!("{} frame not acquired: {}", P::STREAM, e);
                return CycleOutcome::NoFrame;
            }
        };

        if *paused {
            return CycleOutcome::Paused;
        }

        let rect = match guard.lock() {
            Ok(rect) => rect,
            Err(e) => {
                warn!("{} frame {} dropped: {}", P::STREAM, guard.frame().sequence, e);
                metrics::counter!("frames_dropped", "stream" => P::STREAM).increment(1);
                return CycleOutcome::Dropped;
            }
        };

        if !rect.is_valid() {
            debug!("{} frame {} has zero pitch", P::STREAM, guard.frame().sequence);
            return CycleOutcome::InvalidData;
        }

        if let Err(e) = policy.decode(guard.frame(), &rect, buffer) {
            warn!("{} frame {} dropped: {}", P::STREAM, guard.frame().sequence, e);
            metrics::counter!("frames_dropped", "stream" => P::STREAM).increment(1);
            return CycleOutcome::Dropped;
        }

        if let Some(viewer) = viewer.as_mut() {
            viewer.set_image(buffer);
        }

        let Some(timestamp) = policy.claim_timestamp(gate.as_ref()) else {
            return CycleOutcome::Decoded;
        };

        let persist_start = Instant::now();
        match policy.persist(writer.as_ref(), timestamp, buffer) {
            Ok(path) => {
                metrics::histogram!("persist_time_us", "stream" => P::STREAM)
                    .record(persist_start.elapsed().as_micros() as f64);
                metrics::counter!("frames_persisted", "stream" => P::STREAM).increment(1);
                debug!("{} frame {} -> {}", P::STREAM, timestamp, path.display());
                CycleOutcome::Persisted(timestamp)
            }
            Err(e) => {
                warn!("{} frame {} not saved: {}", P::STREAM, timestamp, e);
                metrics::counter!("frames_dropped", "stream" => P::STREAM).increment(1);
                CycleOutcome::Dropped
            }
        }
    }
}
