#![forbid(unsafe_code)]

//! Narrated slide-video synthesis: structured content in, an H.264 MP4
//! with per-slide narration out.

pub mod assemble;
pub mod config;
pub mod content;
pub mod encode;
pub mod foundation;
pub mod pipeline;
pub mod speech;
pub mod timing;
pub mod visual;

pub use assemble::{FinalVideo, VideoSegment};
pub use config::PipelineConfig;
pub use content::model::{Level, Slide, StructuredContent};
pub use foundation::error::{SlidecastError, SlidecastResult};
pub use pipeline::{CancelToken, VideoRequest, generate, generate_with_cancel};
pub use speech::{AudioClip, VoiceConfig, VoiceGender};
pub use timing::{SlideTiming, TimingMode};
