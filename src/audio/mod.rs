//! Audio capture, ring buffer, and fixed-size block reading.

pub mod blocks;
pub mod capture;
pub mod ring_buffer;

pub use blocks::BlockReader;
pub use capture::{list_devices, resolve_device, start_capture, CaptureError};
pub use ring_buffer::audio_ring_buffer;
