/// Size of the canonical PCM RIFF header written by [`encode_pcm_wav`].
pub const WAV_HEADER_LEN: usize = 44;

/// Wrap raw little-endian PCM bytes into a RIFF/WAVE container.
///
/// The payload is copied verbatim: no resampling, no alignment check. An odd
/// trailing byte is kept so the data chunk size always equals `pcm.len()`.
///
/// Header fields that do not fit their on-disk width (payloads over 4 GiB,
/// absurd channel counts) saturate at the field's maximum instead of wrapping.
pub fn encode_pcm_wav(pcm: &[u8], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    // WAV header fields
    let byte_rate = saturate_u32(sample_rate as u64 * channels as u64 * bits_per_sample as u64 / 8);
    let block_align = u16::try_from(channels as u32 * bits_per_sample as u32 / 8).unwrap_or(u16::MAX);
    let data_size = saturate_u32(pcm.len() as u64);
    let riff_size = data_size.saturating_add(36);

    let mut out = Vec::<u8>::with_capacity(WAV_HEADER_LEN + pcm.len());

    // RIFF header
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt chunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());

    out.extend_from_slice(pcm);
    out
}

fn saturate_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Header fields of a canonical 44-byte PCM WAV, as read back from bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Parse the fixed-layout header produced by [`encode_pcm_wav`].
    ///
    /// Returns `None` when the buffer is too short or the chunk tags do not match.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < WAV_HEADER_LEN
            || &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
        {
            return None;
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        Some(Self {
            riff_size: u32_at(4),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }
}
