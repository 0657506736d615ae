// Module audio - Sample formats, buffers and shared parameters

pub mod buffer;
pub mod format;
pub mod format_conversion;
pub mod parameters;
pub mod port;

pub use buffer::SampleBuffer;
pub use format::{Presets, SoundcardFormat};
pub use port::{Port, PortError, PortKind, PortValue};
