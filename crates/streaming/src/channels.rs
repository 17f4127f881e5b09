//! Voice reset and channel-to-voice assignment.
//!
//! Channel `i` always plays on hardware voice `i`. Even channels are panned
//! hard left and odd channels hard right, which is the layout the authoring
//! tools emit for stereo pairs.

use platform::config::DUMMY_BLOCK_ADDR;
use platform::sound_unit::{ALL_VOICES, VOICE_COUNT};
use platform::{Pan, Pitch, SoundUnit, StereoVolume, VoiceMask};

use crate::error::FormatError;

/// Static pan of logical channel `channel`.
#[must_use]
pub fn pan_for_channel(channel: usize) -> Pan {
    if channel & 1 == 0 {
        Pan::Left
    } else {
        Pan::Right
    }
}

/// Mask of the voices that play a stream with `channels` channels.
///
/// # Errors
///
/// [`FormatError::TooManyChannels`] when there are more channels than voices.
pub fn channel_mask(channels: u16) -> Result<VoiceMask, FormatError> {
    let count = usize::from(channels);
    if count > VOICE_COUNT {
        return Err(FormatError::TooManyChannels(channels));
    }
    // count <= 24, so the shift is in range
    Ok(1u32
        .checked_shl(u32::from(channels))
        .map_or(ALL_VOICES, |bit| bit.wrapping_sub(1)))
}

/// Return every voice to a silent known state.
///
/// All voices are keyed off, parked on the silent dummy block at native
/// pitch with zero volume, then keyed back on so they loop silence instead
/// of holding stale addresses.
pub fn reset_voices<U: SoundUnit>(spu: &mut U) {
    spu.key_off(ALL_VOICES);
    for voice in 0..VOICE_COUNT {
        spu.set_voice_address(voice, DUMMY_BLOCK_ADDR);
        spu.set_voice_pitch(voice, Pitch::NATIVE);
        spu.set_voice_volume(voice, StereoVolume::SILENT);
    }
    spu.key_on(ALL_VOICES);
}

/// Program pan and pitch for every stream voice.
///
/// # Errors
///
/// [`FormatError::TooManyChannels`] when there are more channels than voices;
/// no register is touched in that case.
pub fn assign_channels<U: SoundUnit>(
    spu: &mut U,
    channels: u16,
    pitch: Pitch,
) -> Result<VoiceMask, FormatError> {
    let mask = channel_mask(channels)?;
    for channel in 0..usize::from(channels) {
        spu.set_voice_volume(channel, StereoVolume::panned(pan_for_channel(channel)));
        spu.set_voice_pitch(channel, pitch);
    }
    Ok(mask)
}
