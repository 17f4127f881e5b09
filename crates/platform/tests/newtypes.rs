//! Type system enforcement tests for sound unit newtypes.
//! These newtypes prevent common voice programming bugs at compile time.

// ── SampleRateHz ─────────────────────────────────────────────────────────────

#[test]
fn sample_rate_hz_rejects_zero() {
    use platform::audio_types::SampleRateHz;
    assert!(SampleRateHz::new(0).is_err());
}

#[test]
fn sample_rate_hz_rejects_below_minimum() {
    use platform::audio_types::SampleRateHz;
    assert!(SampleRateHz::new(999).is_err());
}

#[test]
fn sample_rate_hz_accepts_console_rates() {
    use platform::audio_types::SampleRateHz;
    assert!(SampleRateHz::new(11_025).is_ok());
    assert!(SampleRateHz::new(22_050).is_ok());
    assert!(SampleRateHz::new(37_800).is_ok());
    assert!(SampleRateHz::new(44_100).is_ok());
    assert!(SampleRateHz::new(48_000).is_ok());
}

#[test]
fn sample_rate_hz_rejects_above_maximum() {
    use platform::audio_types::SampleRateHz;
    let err = SampleRateHz::new(96_000).unwrap_err();
    assert_eq!(err.value, 96_000);
    assert_eq!(err.max, SampleRateHz::MAX_HZ);
}

#[test]
fn sample_rate_hz_is_four_bytes() {
    use platform::audio_types::SampleRateHz;
    assert_eq!(core::mem::size_of::<SampleRateHz>(), 4);
}

// ── Pitch ────────────────────────────────────────────────────────────────────

#[test]
fn pitch_native_rate_is_0x1000() {
    use platform::audio_types::{Pitch, SampleRateHz};
    let pitch = Pitch::from_sample_rate(SampleRateHz::new(44_100).unwrap());
    assert_eq!(pitch, Pitch::NATIVE);
    assert_eq!(pitch.get(), 0x1000);
}

#[test]
fn pitch_half_rate_is_0x800() {
    use platform::audio_types::{Pitch, SampleRateHz};
    let pitch = Pitch::from_sample_rate(SampleRateHz::new(22_050).unwrap());
    assert_eq!(pitch.get(), 0x0800);
}

#[test]
fn pitch_48khz_rounds_down() {
    use platform::audio_types::{Pitch, SampleRateHz};
    // 48000 * 4096 / 44100 = 4458.23
    let pitch = Pitch::from_sample_rate(SampleRateHz::new(48_000).unwrap());
    assert_eq!(pitch.get(), 4458);
}

// ── VoiceVolume / Pan ────────────────────────────────────────────────────────

#[test]
fn voice_volume_clamps_to_14_bits() {
    use platform::audio_types::VoiceVolume;
    assert_eq!(VoiceVolume::new(0xFFFF), VoiceVolume::FULL);
    assert_eq!(VoiceVolume::new(0x1234).get(), 0x1234);
}

#[test]
fn pan_left_silences_right_output() {
    use platform::audio_types::{Pan, StereoVolume, VoiceVolume};
    let v = StereoVolume::panned(Pan::Left);
    assert_eq!(v.left, VoiceVolume::FULL);
    assert_eq!(v.right, VoiceVolume::MUTE);
}

#[test]
fn pan_right_silences_left_output() {
    use platform::audio_types::{Pan, StereoVolume, VoiceVolume};
    let v = StereoVolume::panned(Pan::Right);
    assert_eq!(v.left, VoiceVolume::MUTE);
    assert_eq!(v.right, VoiceVolume::FULL);
}

// ── Block device types ───────────────────────────────────────────────────────

#[test]
fn feed_window_counts_whole_sectors_only() {
    use platform::block_device::{FeedWindow, SECTOR_SIZE};
    let window = FeedWindow {
        offset: 0,
        len: 3 * SECTOR_SIZE + 100,
    };
    assert_eq!(window.sectors(), 3);
}

#[test]
fn ticket_next_wraps_instead_of_overflowing() {
    use platform::block_device::Ticket;
    assert_eq!(Ticket::new(u32::MAX).next(), Ticket::new(0));
    assert_eq!(Ticket::FIRST.next().get(), 2);
}
