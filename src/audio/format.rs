// Soundcard formats - sample word layouts understood by the graph

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sample format of an AudioSignal stream or the soundcard output
///
/// Integer formats are full-scale signed values; `Signed24` is stored in
/// an `i32` word and limited to the 24 bit range. `Float` and `Double` use
/// the conventional -1.0..1.0 range. `Complex` carries amplitude as a
/// magnitude/phase pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundcardFormat {
    Signed8,
    Signed16,
    Signed24,
    Signed32,
    Signed64,
    Float,
    Double,
    Complex,
}

impl SoundcardFormat {
    pub const ALL: [SoundcardFormat; 8] = [
        SoundcardFormat::Signed8,
        SoundcardFormat::Signed16,
        SoundcardFormat::Signed24,
        SoundcardFormat::Signed32,
        SoundcardFormat::Signed64,
        SoundcardFormat::Float,
        SoundcardFormat::Double,
        SoundcardFormat::Complex,
    ];

    /// Full-scale amplitude a normalized 1.0 maps to
    pub fn scale(self) -> f64 {
        match self {
            SoundcardFormat::Signed8 => 127.0,
            SoundcardFormat::Signed16 => 32767.0,
            SoundcardFormat::Signed24 => 8388607.0,
            SoundcardFormat::Signed32 => 2147483647.0,
            SoundcardFormat::Signed64 => 9223372036854775807.0,
            SoundcardFormat::Float | SoundcardFormat::Double | SoundcardFormat::Complex => 1.0,
        }
    }

    /// Bits per sample word
    pub fn bits(self) -> u32 {
        match self {
            SoundcardFormat::Signed8 => 8,
            SoundcardFormat::Signed16 => 16,
            SoundcardFormat::Signed24 => 24,
            SoundcardFormat::Signed32 => 32,
            SoundcardFormat::Signed64 => 64,
            SoundcardFormat::Float => 32,
            SoundcardFormat::Double => 64,
            SoundcardFormat::Complex => 128,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            SoundcardFormat::Float | SoundcardFormat::Double | SoundcardFormat::Complex
        )
    }

    /// Short config name, e.g. `s16`
    pub fn as_str(self) -> &'static str {
        match self {
            SoundcardFormat::Signed8 => "s8",
            SoundcardFormat::Signed16 => "s16",
            SoundcardFormat::Signed24 => "s24",
            SoundcardFormat::Signed32 => "s32",
            SoundcardFormat::Signed64 => "s64",
            SoundcardFormat::Float => "float",
            SoundcardFormat::Double => "double",
            SoundcardFormat::Complex => "complex",
        }
    }
}

impl Default for SoundcardFormat {
    fn default() -> Self {
        SoundcardFormat::Signed16
    }
}

impl fmt::Display for SoundcardFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown format name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown soundcard format: {0}")]
pub struct ParseFormatError(pub String);

impl FromStr for SoundcardFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoundcardFormat::ALL
            .iter()
            .copied()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseFormatError(s.to_string()))
    }
}

/// Soundcard presets copied onto every new AudioSignal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Presets {
    pub samplerate: u32,
    pub buffer_size: usize,
    pub format: SoundcardFormat,
    pub pcm_channels: usize,
}

impl Presets {
    pub const DEFAULT_SAMPLERATE: u32 = 44100;
    pub const DEFAULT_BUFFER_SIZE: usize = 512;
    pub const DEFAULT_PCM_CHANNELS: usize = 2;

    /// Check the samplerate/buffer size/format combination
    pub fn is_valid(&self) -> bool {
        self.samplerate > 0 && self.buffer_size > 0 && self.pcm_channels > 0
    }
}

impl Default for Presets {
    fn default() -> Self {
        Self {
            samplerate: Self::DEFAULT_SAMPLERATE,
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
            format: SoundcardFormat::default(),
            pcm_channels: Self::DEFAULT_PCM_CHANNELS,
        }
    }
}
