//! Sensor driver boundary and scoped frame ownership

use crate::capture::frame::{LockedRect, RawFrame, StreamRequest};
use crate::error::Result;

/// One hardware stream (color or depth) of a structured-light sensor.
///
/// Every frame returned by `next_frame` must be handed back through
/// `release_frame` exactly once; [`FrameGuard`] enforces this.
pub trait SensorStream: Send {
    /// Open the stream. The stream is not started if this fails.
    fn open(&mut self, request: &StreamRequest) -> Result<()>;

    /// Toggle near mode on an open stream
    fn set_near_mode(&mut self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    /// Non-blocking readiness check
    fn frame_ready(&mut self) -> bool;

    fn next_frame(&mut self) -> Result<RawFrame>;

    fn lock_rect(&mut self, frame: &RawFrame) -> Result<LockedRect>;

    fn unlock_rect(&mut self, frame: &RawFrame);

    fn release_frame(&mut self, frame: &RawFrame);
}

/// Frame acquisition, pixel lock and release as one resource scope.
///
/// Dropping the guard unlocks the pixel rect (if locked) and releases the
/// frame, on every exit path.
pub struct FrameGuard<'s, S: SensorStream + ?Sized> {
    stream: &'s mut S,
    frame: RawFrame,
    locked: bool,
}

impl<'s, S: SensorStream + ?Sized> FrameGuard<'s, S> {
    pub fn acquire(stream: &'s mut S) -> Result<Self> {
        let frame = stream.next_frame()?;
        Ok(Self {
            stream,
            frame,
            locked: false,
        })
    }

    pub fn frame(&self) -> &RawFrame {
        &self.frame
    }

    /// Lock the pixel rect for reading. A failed lock leaves nothing to unlock.
    pub fn lock(&mut self) -> Result<LockedRect> {
        let rect = self.stream.lock_rect(&self.frame)?;
        self.locked = true;
        Ok(rect)
    }
}

impl<S: SensorStream + ?Sized> Drop for FrameGuard<'_, S> {
    fn drop(&mut self) {
        if self.locked {
            self.stream.unlock_rect(&self.frame);
        }
        self.stream.release_frame(&self.frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::{ScriptedFrame, SyntheticSensor};
    use crate::capture::frame::{ImageType, Resolution};

    fn open_color() -> SyntheticSensor {
        let mut sensor = SyntheticSensor::color();
        sensor
            .open(&StreamRequest {
                image_type: ImageType::Color,
                resolution: Resolution::Res80x60,
                near_mode: false,
            })
            .expect("open should succeed");
        sensor
    }

    #[test]
    fn test_guard_releases_unlocked_frame() {
        let mut sensor = open_color();
        sensor.push(ScriptedFrame::valid());
        let stats = sensor.stats();
        {
            let guard = FrameGuard::acquire(&mut sensor).expect("acquire should succeed");
            assert_eq!(guard.frame().sequence, 0);
        }
        assert_eq!(stats.released(), 1);
        assert_eq!(stats.unlocked(), 0);
    }

    #[test]
    fn test_guard_unlocks_then_releases() {
        let mut sensor = open_color();
        sensor.push(ScriptedFrame::valid());
        let stats = sensor.stats();
        {
            let mut guard = FrameGuard::acquire(&mut sensor).expect("acquire should succeed");
            let rect = guard.lock().expect("lock should succeed");
            assert!(rect.is_valid());
        }
        assert_eq!(stats.locked(), 1);
        assert_eq!(stats.unlocked(), 1);
        assert_eq!(stats.released(), 1);
    }

    #[test]
    fn test_failed_lock_still_releases() {
        let mut sensor = open_color();
        sensor.push(ScriptedFrame::texture_failure());
        let stats = sensor.stats();
        {
            let mut guard = FrameGuard::acquire(&mut sensor).expect("acquire should succeed");
            assert!(guard.lock().is_err());
        }
        assert_eq!(stats.unlocked(), 0);
        assert_eq!(stats.released(), 1);
    }
}
