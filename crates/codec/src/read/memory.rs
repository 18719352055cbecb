use tracing::trace;

/// Reads `length` bytes of a linear region (memory, calldata or returndata) starting at `start`.
/// Bytes past the end of the region read as zero.
pub(crate) fn read_bytes(region: &[u8], start: usize, length: usize) -> Vec<u8> {
    trace!("reading {} bytes at offset {} of a {} byte region", length, start, region.len());

    let mut bytes = vec![0u8; length];
    if start < region.len() {
        let end = start.saturating_add(length).min(region.len());
        bytes[..end - start].copy_from_slice(&region[start..end]);
    }
    bytes
}
