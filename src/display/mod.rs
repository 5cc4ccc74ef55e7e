pub mod viewer;

pub use viewer::{ImageSnapshot, SnapshotHandle, SnapshotViewer, StreamViewer};
