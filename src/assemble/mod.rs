pub mod concat;
pub mod segment;

pub use concat::FinalVideo;
pub use segment::VideoSegment;
