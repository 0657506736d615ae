// Module thread - audio loop and tick scheduling

pub mod audio_loop;
pub mod scheduling;

pub use audio_loop::{AudioLoop, LoopSettings};
pub use scheduling::SchedulingPolicy;
