pub mod bitmap;
pub mod dataset;
pub mod depth_png;
pub mod log;
pub mod writer;

pub use bitmap::{load_color_image, save_color_image};
pub use dataset::{AssociationRecord, Dataset, DepthRecord};
pub use depth_png::{load_depth_image, save_depth_image};
pub use log::append_log_record;
pub use writer::{DatasetLayout, DatasetWriter};
