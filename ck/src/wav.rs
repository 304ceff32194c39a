//! Wraps raw linear PCM in a RIFF/WAVE container so generic audio players
//! accept it. The speech endpoint returns bare s16le samples, so this is
//! the only transcoding the pipeline needs.

/// Build a complete WAV file from raw little-endian PCM samples.
///
/// The 44-byte header is byte-exact against the canonical layout: a
/// 16-byte `fmt ` chunk with format tag 1 (PCM) and derived byte rate and
/// block align, followed by the `data` chunk holding the payload verbatim.
/// The payload length is not validated against the block align; a
/// truncated final sample is passed through as-is.
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * block_align as u32;
    let data_len = pcm.len() as u32;
    let riff_len = 36u32 + data_len;

    let mut out = Vec::with_capacity(44 + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_are_byte_exact_for_narration_audio() {
        let pcm = vec![0u8; 8000];
        let wav = pcm_to_wav(&pcm, 24000, 1, 16);
        assert_eq!(wav.len(), 44 + 8000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 8000);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes(wav[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(wav[20..22].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(wav[22..24].try_into().unwrap()), 1);
        assert_eq!(
            u32::from_le_bytes(wav[24..28].try_into().unwrap()),
            24000
        );
        // byte_rate = 24000 * 1 * 16 / 8
        assert_eq!(
            u32::from_le_bytes(wav[28..32].try_into().unwrap()),
            48000
        );
        assert_eq!(u16::from_le_bytes(wav[32..34].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(wav[34..36].try_into().unwrap()), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(
            u32::from_le_bytes(wav[40..44].try_into().unwrap()),
            8000
        );
    }

    #[test]
    fn payload_is_copied_verbatim_even_when_oddly_sized() {
        // 3 bytes is not a multiple of the 2-byte block align; accepted as-is
        let wav = pcm_to_wav(&[1, 2, 3], 24000, 1, 16);
        assert_eq!(wav.len(), 47);
        assert_eq!(&wav[44..], &[1, 2, 3]);
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 3);
    }

    #[test]
    fn empty_payload_is_just_a_header() {
        let wav = pcm_to_wav(&[], 16000, 2, 16);
        assert_eq!(wav.len(), 44);
        // block_align = 2 channels * 2 bytes
        assert_eq!(u16::from_le_bytes(wav[32..34].try_into().unwrap()), 4);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 64000);
    }
}
