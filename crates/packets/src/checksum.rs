//! Internet checksum (RFC 1071).

/// Computes the one's-complement 16-bit Internet checksum of `data`.
///
/// Words are read in network byte order. An odd trailing byte is padded with a
/// zero byte. The caller zeroes the checksum field before calling and, for TCP,
/// prepends the pseudo-header.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u32::from(u16::from_be_bytes([chunk[0], chunk[1]]));
    }
    if let Some(&tail) = chunks.remainder().first() {
        sum += u32::from(tail) << 8;
    }
    while (sum >> 16) != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Computes the checksum of `data` and stores it big-endian at `offset`.
///
/// The two bytes at `offset` are zeroed first. Panics if `offset + 2 > data.len()`.
pub fn write_checksum(data: &mut [u8], offset: usize) -> u16 {
    data[offset] = 0;
    data[offset + 1] = 0;
    let sum = checksum(data);
    data[offset..offset + 2].copy_from_slice(&sum.to_be_bytes());
    sum
}
