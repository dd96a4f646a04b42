//! Response data models shared across resource clients.

pub mod feature;
pub mod image;

pub use feature::{Feature, FeatureCollection, FeaturePage, Geometry, RecordCollection, RecordPage};
pub use image::ImageRecord;
