//! Deterministic test-pattern sensor.
//!
//! Stands in for the hardware driver in the binary's dry-run mode and in
//! tests. Frames can be scripted one by one (zero pitch, texture failure)
//! or generated continuously.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::utils::CachePadded;
use tracing::debug;

use crate::capture::frame::{ImageType, LockedRect, RawFrame, StreamRequest};
use crate::capture::sensor::SensorStream;
use crate::error::{CaptureError, Result};

/// Frame resource counters, shared with whoever holds a clone
#[derive(Debug, Default)]
pub struct SensorStats {
    acquired: AtomicU64,
    released: AtomicU64,
    locked: AtomicU64,
    unlocked: AtomicU64,
}

impl SensorStats {
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    pub fn locked(&self) -> u64 {
        self.locked.load(Ordering::Relaxed)
    }

    pub fn unlocked(&self) -> u64 {
        self.unlocked.load(Ordering::Relaxed)
    }
}

/// How the next delivered frame behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedFrame {
    pub valid_pitch: bool,
    pub texture_ok: bool,
    pub near_mode: bool,
}

impl ScriptedFrame {
    pub const fn valid() -> Self {
        Self {
            valid_pitch: true,
            texture_ok: true,
            near_mode: false,
        }
    }

    pub const fn zero_pitch() -> Self {
        Self {
            valid_pitch: false,
            ..Self::valid()
        }
    }

    pub const fn texture_failure() -> Self {
        Self {
            texture_ok: false,
            ..Self::valid()
        }
    }
}

pub struct SyntheticSensor {
    label: &'static str,
    request: Option<StreamRequest>,
    script: VecDeque<ScriptedFrame>,
    continuous: bool,
    fail_open: bool,
    near_mode: bool,
    sequence: u64,
    outstanding: Option<(u64, ScriptedFrame)>,
    stats: Arc<CachePadded<SensorStats>>,
}

impl SyntheticSensor {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            request: None,
            script: VecDeque::new(),
            continuous: false,
            fail_open: false,
            near_mode: false,
            sequence: 0,
            outstanding: None,
            stats: Arc::new(CachePadded::new(SensorStats::default())),
        }
    }

    pub fn color() -> Self {
        Self::new("color")
    }

    pub fn depth() -> Self {
        Self::new("depth")
    }

    /// Deliver a valid frame whenever the script is empty
    pub fn continuous(mut self) -> Self {
        self.continuous = true;
        self
    }

    /// Make `open` fail, as a disconnected sensor would
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn push(&mut self, frame: ScriptedFrame) {
        self.script.push_back(frame);
    }

    pub fn stats(&self) -> Arc<CachePadded<SensorStats>> {
        Arc::clone(&self.stats)
    }

    pub fn request(&self) -> Option<&StreamRequest> {
        self.request.as_ref()
    }

    pub fn near_mode(&self) -> bool {
        self.near_mode
    }

    fn payload(request: &StreamRequest, sequence: u64) -> (u32, Bytes) {
        let (width, height) = request.resolution.dimensions();
        let (w, h) = (width as usize, height as usize);
        let seq = sequence as usize;
        let mut data = Vec::new();

        let pitch = match request.image_type {
            ImageType::Color | ImageType::ColorYuv => {
                data.reserve(w * h * 4);
                for y in 0..h {
                    for x in 0..w {
                        data.extend_from_slice(&[
                            (x + seq) as u8,
                            y as u8,
                            (x + y) as u8,
                            0,
                        ]);
                    }
                }
                width * 4
            }
            ImageType::RawBayer => {
                data.reserve(w * h);
                for y in 0..h {
                    for x in 0..w {
                        data.push(((x ^ y) + seq) as u8);
                    }
                }
                width
            }
            ImageType::Infrared => {
                data.reserve(w * h * 2);
                for _ in 0..h {
                    for x in 0..w {
                        let level = (x * usize::from(u16::MAX) / w.max(1)) as u16;
                        data.extend_from_slice(&level.to_le_bytes());
                    }
                }
                width * 2
            }
            ImageType::Depth => {
                data.reserve(w * h * 2);
                for y in 0..h {
                    for x in 0..w {
                        let mm = 500 + ((x + y + seq) % 4000) as u16;
                        data.extend_from_slice(&mm.to_le_bytes());
                    }
                }
                width * 2
            }
        };

        (pitch, Bytes::from(data))
    }
}

impl SensorStream for SyntheticSensor {
    fn open(&mut self, request: &StreamRequest) -> Result<()> {
        if self.fail_open {
            return Err(CaptureError::StreamOpen {
                stream: self.label,
                reason: "sensor not connected".into(),
            });
        }
        debug!("Synthetic {} stream opened: {:?}", self.label, request);
        self.near_mode = request.near_mode;
        self.request = Some(*request);
        Ok(())
    }

    fn set_near_mode(&mut self, enabled: bool) -> Result<()> {
        self.near_mode = enabled;
        Ok(())
    }

    fn frame_ready(&mut self) -> bool {
        self.request.is_some() && (self.continuous || !self.script.is_empty())
    }

    fn next_frame(&mut self) -> Result<RawFrame> {
        if self.request.is_none() {
            return Err(CaptureError::NotStarted);
        }
        let scripted = match self.script.pop_front() {
            Some(frame) => frame,
            None if self.continuous => ScriptedFrame::valid(),
            None => return Err(CaptureError::NoFrame),
        };

        let sequence = self.sequence;
        self.sequence += 1;
        self.outstanding = Some((sequence, scripted));
        self.stats.acquired.fetch_add(1, Ordering::Relaxed);

        Ok(RawFrame {
            sequence,
            near_mode: self.near_mode || scripted.near_mode,
        })
    }

    fn lock_rect(&mut self, frame: &RawFrame) -> Result<LockedRect> {
        let request = self.request.ok_or(CaptureError::NotStarted)?;
        let scripted = match self.outstanding {
            Some((sequence, scripted)) if sequence == frame.sequence => scripted,
            _ => {
                return Err(CaptureError::Texture(format!(
                    "frame {} is not outstanding",
                    frame.sequence
                )))
            }
        };
        if !scripted.texture_ok {
            return Err(CaptureError::Texture(format!(
                "no texture for frame {}",
                frame.sequence
            )));
        }

        self.stats.locked.fetch_add(1, Ordering::Relaxed);
        let (pitch, bits) = Self::payload(&request, frame.sequence);
        Ok(LockedRect {
            pitch: if scripted.valid_pitch { pitch } else { 0 },
            bits,
        })
    }

    fn unlock_rect(&mut self, _frame: &RawFrame) {
        self.stats.unlocked.fetch_add(1, Ordering::Relaxed);
    }

    fn release_frame(&mut self, frame: &RawFrame) {
        if matches!(self.outstanding, Some((sequence, _)) if sequence == frame.sequence) {
            self.outstanding = None;
        }
        self.stats.released.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::Resolution;

    fn request(image_type: ImageType) -> StreamRequest {
        StreamRequest {
            image_type,
            resolution: Resolution::Res80x60,
            near_mode: false,
        }
    }

    #[test]
    fn test_not_ready_before_open() {
        let mut sensor = SyntheticSensor::color().continuous();
        assert!(!sensor.frame_ready());
        assert!(matches!(sensor.next_frame(), Err(CaptureError::NotStarted)));
    }

    #[test]
    fn test_open_failure() {
        let mut sensor = SyntheticSensor::depth().failing_open();
        let result = sensor.open(&request(ImageType::Depth));
        assert!(matches!(result, Err(CaptureError::StreamOpen { .. })));
        assert!(sensor.request().is_none());
    }

    #[test]
    fn test_payload_sizes() {
        for (image_type, bpp) in [
            (ImageType::Color, 4),
            (ImageType::RawBayer, 1),
            (ImageType::Infrared, 2),
            (ImageType::Depth, 2),
        ] {
            let (pitch, bits) = SyntheticSensor::payload(&request(image_type), 0);
            assert_eq!(pitch, 80 * bpp);
            assert_eq!(bits.len(), (80 * 60 * bpp) as usize);
        }
    }

    #[test]
    fn test_scripted_frames_drain_in_order() {
        let mut sensor = SyntheticSensor::color();
        sensor.open(&request(ImageType::Color)).expect("open should succeed");
        sensor.push(ScriptedFrame::zero_pitch());
        sensor.push(ScriptedFrame::valid());

        let first = sensor.next_frame().expect("first frame");
        let rect = sensor.lock_rect(&first).expect("lock first");
        assert!(!rect.is_valid());
        sensor.unlock_rect(&first);
        sensor.release_frame(&first);

        let second = sensor.next_frame().expect("second frame");
        assert_eq!(second.sequence, 1);
        assert!(sensor.lock_rect(&second).expect("lock second").is_valid());
        sensor.release_frame(&second);

        assert!(!sensor.frame_ready());
        assert!(matches!(sensor.next_frame(), Err(CaptureError::NoFrame)));
    }
}
