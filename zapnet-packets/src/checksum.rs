use crate::Ipv4Addr;

/// RFC 1071 Internet checksum over `data`, continuing from a previous partial sum `seed`.
///
/// Words are big-endian; an odd trailing byte is summed as if followed by a zero byte.
/// Without `finalize` the folded partial sum is returned so it can seed the next call.
/// With `finalize` the sum is complemented and a zero result is sent as `0xffff`.
pub fn checksum16(data: &[u8], seed: u32, finalize: bool) -> u16 {
    let mut sum = u64::from(seed);
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u64::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        sum += u64::from(*last) << 8;
    }

    let folded = fold(sum);
    if !finalize {
        return folded;
    }

    match !folded {
        0 => 0xffff,
        checksum => checksum,
    }
}

/// True when `data` (with its checksum field in place) sums to all ones.
pub fn verify_checksum(data: &[u8], seed: u32) -> bool {
    !checksum16(data, seed, false) == 0
}

/// Partial sum of the IPv4 pseudo-header used by UDP checksums.
pub fn pseudo_header_sum(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, length: u16) -> u32 {
    let mut header = [0u8; 12];
    header[0..4].copy_from_slice(&src.octets());
    header[4..8].copy_from_slice(&dst.octets());
    header[9] = protocol;
    header[10..12].copy_from_slice(&length.to_be_bytes());
    u32::from(checksum16(&header, 0, false))
}

fn fold(mut sum: u64) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}
