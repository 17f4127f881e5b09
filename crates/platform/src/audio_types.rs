//! Sound unit domain newtypes for compile-time safety.
//!
//! These zero-cost abstractions prevent common voice programming errors:
//! - `SampleRateHz`: validates 1000–48000 Hz, the range the SPU plays cleanly
//! - `Pitch`: SPU voice pitch register, derived from `SampleRateHz` only
//! - `VoiceVolume`: 14-bit voice volume register, clamps to `0x3FFF`
//! - `Pan` / `StereoVolume`: hard left/right placement of a voice

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

// ── SampleRateHz ─────────────────────────────────────────────────────────────

/// Sample rate in Hz, validated to the range a stream voice can be pitched to.
///
/// Valid range: 1000–48000 Hz. Rates above 44.1 kHz are resampled upward by
/// the SPU interpolator, so 48 kHz material still plays at the right speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct SampleRateHz(u32);

impl SampleRateHz {
    /// Minimum supported sample rate.
    pub const MIN_HZ: u32 = 1_000;

    /// Maximum supported sample rate.
    pub const MAX_HZ: u32 = 48_000;

    /// The SPU's native output rate; a voice at this rate has pitch `0x1000`.
    pub const NATIVE: Self = Self(44_100);

    /// Create a `SampleRateHz`, returning an error if out of 1000–48000 Hz.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `hz < 1000` or `hz > 48000`.
    pub fn new(hz: u32) -> Result<Self, OutOfRangeError> {
        if hz < Self::MIN_HZ || hz > Self::MAX_HZ {
            Err(OutOfRangeError {
                value: hz,
                min: Self::MIN_HZ,
                max: Self::MAX_HZ,
            })
        } else {
            Ok(Self(hz))
        }
    }

    /// Return the sample rate in Hz.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

// ── Pitch ────────────────────────────────────────────────────────────────────

/// SPU voice pitch register (4.12 fixed point, `0x1000` = 44.1 kHz).
///
/// Formula: `pitch = sample_rate * 4096 / 44100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Pitch(u16);

impl Pitch {
    /// Pitch that plays a sample at the SPU's native 44.1 kHz.
    pub const NATIVE: Self = Self(0x1000);

    /// Convert a validated sample rate into a pitch register value.
    #[must_use]
    pub fn from_sample_rate(rate: SampleRateHz) -> Self {
        // Max: 48_000 * 4096 = 196_608_000 < u32::MAX; quotient <= 0x1166.
        let pitch = rate
            .get()
            .saturating_mul(4096)
            .checked_div(SampleRateHz::NATIVE.get())
            .unwrap_or(0);
        Self(u16::try_from(pitch).unwrap_or(u16::MAX))
    }

    /// Return the raw register value.
    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }
}

// ── VoiceVolume ──────────────────────────────────────────────────────────────

/// Voice volume register in fixed-volume mode (`0x0000` silent, `0x3FFF` full).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct VoiceVolume(u16);

impl VoiceVolume {
    /// Silent.
    pub const MUTE: Self = Self(0x0000);

    /// Full scale.
    pub const FULL: Self = Self(0x3FFF);

    /// Create a `VoiceVolume`, clamping values above `0x3FFF`.
    #[must_use]
    pub fn new(value: u16) -> Self {
        Self(value.min(Self::FULL.0))
    }

    /// Return the raw register value.
    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }
}

// ── Pan / StereoVolume ───────────────────────────────────────────────────────

/// Hard stereo placement of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pan {
    /// Full volume on the left output, silent on the right.
    Left,
    /// Full volume on the right output, silent on the left.
    Right,
}

/// Left/right volume register pair for one voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StereoVolume {
    /// Left output volume.
    pub left: VoiceVolume,
    /// Right output volume.
    pub right: VoiceVolume,
}

impl StereoVolume {
    /// Both sides silent.
    pub const SILENT: Self = Self {
        left: VoiceVolume::MUTE,
        right: VoiceVolume::MUTE,
    };

    /// Full volume on the side selected by `pan`, silence on the other.
    #[must_use]
    pub fn panned(pan: Pan) -> Self {
        match pan {
            Pan::Left => Self {
                left: VoiceVolume::FULL,
                right: VoiceVolume::MUTE,
            },
            Pan::Right => Self {
                left: VoiceVolume::MUTE,
                right: VoiceVolume::FULL,
            },
        }
    }
}
