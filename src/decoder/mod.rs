pub mod frame_data;
pub mod video;

pub use frame_data::Frame;
pub use video::{bgr_to_gray, VideoDecoder};
