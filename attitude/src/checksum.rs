//! Checksum computation for serial IMU frames
//!
//! The checksum is the additive sum, modulo 256, of every byte from the
//! address field through the last payload byte. The start marker, the
//! checksum byte itself and the end marker are excluded.

/// Compute the additive mod-256 checksum of a byte slice.
pub fn compute_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte))
}

/// Verify the checksum of a complete frame.
///
/// The frame must include the start marker through the end marker:
/// `[START][addr][len][payload..][checksum][END]`. Only the checksum is
/// checked here; marker and length validation belong to the decoder.
pub fn verify_frame_checksum(frame: &[u8]) -> bool {
    if frame.len() < 5 {
        return false;
    }

    let checksum_pos = frame.len() - 2;
    compute_checksum(&frame[1..checksum_pos]) == frame[checksum_pos]
}
