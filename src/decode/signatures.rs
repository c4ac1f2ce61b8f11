//! Magic signatures for the Hikvision on-disk structures.
//!
//! Both the master sector and each HIKBTREE copy are located by searching a
//! small buffer for a fixed byte pattern; every field offset in those
//! structures is relative to where the pattern starts.

/// "HIKVISION@HANGZHOU", the master-sector magic
pub const HIKVISION_MAGIC: &[u8] = &[
    0x48, 0x49, 0x4B, 0x56, 0x49, 0x53, 0x49, 0x4F, 0x4E, 0x40, 0x48, 0x41, 0x4E, 0x47, 0x5A, 0x48,
    0x4F, 0x55,
];

/// "HIKBTREE", the index header magic
pub const HIKBTREE_MAGIC: &[u8] = &[0x48, 0x49, 0x4B, 0x42, 0x54, 0x52, 0x45, 0x45];

/// Return the offset of the first occurrence of `pattern` in `data`.
///
/// Buffers are one sector or one index-copy region, so a naive scan with a
/// first-byte check is plenty.
pub fn find_signature(data: &[u8], pattern: &[u8]) -> Option<usize> {
    let plen = pattern.len();
    if plen == 0 || data.len() < plen {
        return None;
    }

    (0..=data.len() - plen).find(|&i| data[i] == pattern[0] && data[i..i + plen] == *pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_values_spell_ascii() {
        assert_eq!(HIKVISION_MAGIC, b"HIKVISION@HANGZHOU");
        assert_eq!(HIKBTREE_MAGIC, b"HIKBTREE");
    }

    #[test]
    fn test_find_at_start_middle_and_end() {
        let mut data = vec![0u8; 64];
        data[..8].copy_from_slice(HIKBTREE_MAGIC);
        assert_eq!(find_signature(&data, HIKBTREE_MAGIC), Some(0));

        let mut data = vec![0u8; 64];
        data[20..28].copy_from_slice(HIKBTREE_MAGIC);
        assert_eq!(find_signature(&data, HIKBTREE_MAGIC), Some(20));

        let mut data = vec![0u8; 64];
        data[56..].copy_from_slice(HIKBTREE_MAGIC);
        assert_eq!(find_signature(&data, HIKBTREE_MAGIC), Some(56));
    }

    #[test]
    fn test_first_match_wins() {
        let mut data = vec![0u8; 128];
        data[10..28].copy_from_slice(HIKVISION_MAGIC);
        data[90..108].copy_from_slice(HIKVISION_MAGIC);
        assert_eq!(find_signature(&data, HIKVISION_MAGIC), Some(10));
    }

    #[test]
    fn test_partial_match_is_not_found() {
        let mut data = vec![0u8; 32];
        data[4..11].copy_from_slice(&HIKBTREE_MAGIC[..7]);
        assert_eq!(find_signature(&data, HIKBTREE_MAGIC), None);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(find_signature(&[], HIKBTREE_MAGIC), None);
        assert_eq!(find_signature(b"HIKB", HIKBTREE_MAGIC), None);
        assert_eq!(find_signature(b"anything", &[]), None);
    }
}
