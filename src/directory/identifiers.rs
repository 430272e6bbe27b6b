//! Binary identifier decoding for `objectGUID` and `objectSid`.

use uuid::Uuid;

/// Length of the fixed SID header: revision, sub-authority count and the
/// 48-bit identifier authority.
const SID_HEADER_LEN: usize = 8;

/// Decode a 16-byte `objectGUID` into its canonical upper-case form.
///
/// Active Directory stores the first three GUID fields little-endian, so the
/// bytes are read with [`Uuid::from_slice_le`]. Returns `None` when the value
/// is not exactly 16 bytes.
pub fn guid_from_bytes(bytes: &[u8]) -> Option<String> {
    let guid = Uuid::from_slice_le(bytes).ok()?;
    Some(guid.hyphenated().to_string().to_uppercase())
}

/// Decode a binary `objectSid` into its `S-R-I-S-S...` string form.
///
/// Returns `None` for truncated or oversized values.
pub fn sid_from_bytes(bytes: &[u8]) -> Option<String> {
    let (header, rest) = bytes.split_at_checked(SID_HEADER_LEN)?;
    let revision = header[0];
    let count = usize::from(header[1]);

    let expected = count.checked_mul(4)?;
    if rest.len() != expected {
        return None;
    }

    let authority = u64::from_be_bytes([
        0, 0, header[2], header[3], header[4], header[5], header[6], header[7],
    ]);

    let mut sid = format!("S-{revision}-{authority}");
    for chunk in rest.chunks_exact(4) {
        let sub = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        sid.push('-');
        sid.push_str(&sub.to_string());
    }
    Some(sid)
}
