//! Sound processing unit voice abstraction
//!
//! Only the register writes the streamer needs are modelled here: keying
//! voices on and off and programming a voice's start address, pitch and
//! volume. Reverb, ADSR and noise registers are left to the hosting code.

use crate::audio_types::{Pitch, StereoVolume};

/// Number of hardware voices on the SPU.
pub const VOICE_COUNT: usize = 24;

/// Bit mask of voices, bit `n` selects voice `n`.
pub type VoiceMask = u32;

/// Mask selecting every hardware voice.
pub const ALL_VOICES: VoiceMask = 0x00FF_FFFF;

/// Sound unit voice control trait
pub trait SoundUnit {
    /// Key off (stop) every voice in `mask`.
    fn key_off(&mut self, mask: VoiceMask);

    /// Key on (start) every voice in `mask`.
    fn key_on(&mut self, mask: VoiceMask);

    /// Point `voice` at a sample in sound RAM (byte address).
    fn set_voice_address(&mut self, voice: usize, spu_address: u32);

    /// Set the playback pitch of `voice`.
    fn set_voice_pitch(&mut self, voice: usize, pitch: Pitch);

    /// Set the left/right volume of `voice`.
    fn set_voice_volume(&mut self, voice: usize, volume: StereoVolume);
}
