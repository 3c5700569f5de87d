use log::{debug, warn};
use zapnet_packets::etherbone::{peek_packet_length, HEADER_LEN, MAGIC};

/// Bytes of stream data held between datagrams.
pub const REASSEMBLY_CAPACITY: usize = 1512;

const MAGIC_BYTES: [u8; 2] = MAGIC.to_be_bytes();

/// Rebuilds Etherbone packets from a byte stream that datagrams may split or join
/// arbitrarily. Bytes before a magic are skipped.
pub struct Reassembler {
    buffer: [u8; REASSEMBLY_CAPACITY],
    len: usize,
    overflows: u32,
}

impl Default for Reassembler {
    fn default() -> Self {
        Reassembler::new()
    }
}

impl Reassembler {
    pub const fn new() -> Self {
        Reassembler {
            buffer: [0; REASSEMBLY_CAPACITY],
            len: 0,
            overflows: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Times buffered data was thrown away to make room.
    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Appends `data` and hands every packet it completes to `on_packet`, in stream order.
    /// Returns how many packets were handed out.
    pub fn push<F>(&mut self, data: &[u8], mut on_packet: F) -> usize
    where
        F: FnMut(&[u8]),
    {
        if self.len + data.len() > REASSEMBLY_CAPACITY {
            warn!(
                "etherbone reassembly overflow, dropping {} buffered bytes",
                self.len
            );
            self.overflows += 1;
            self.len = 0;
        }
        if data.len() > REASSEMBLY_CAPACITY {
            warn!("dropping {} byte etherbone datagram", data.len());
            return 0;
        }
        self.buffer[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();

        let mut start = 0;
        let mut packets = 0;
        loop {
            let rest = &self.buffer[start..self.len];
            if rest.len() < MAGIC_BYTES.len() {
                if rest.first().map_or(false, |byte| *byte != MAGIC_BYTES[0]) {
                    start += 1;
                }
                break;
            }
            if rest[..2] != MAGIC_BYTES {
                start += 1;
                continue;
            }
            if rest.len() <= HEADER_LEN {
                break;
            }
            let length = match peek_packet_length(rest) {
                Some(length) => length,
                None => break,
            };
            if length > REASSEMBLY_CAPACITY {
                debug!("etherbone packet of {} bytes can never fit, skipping", length);
                start += 1;
                continue;
            }
            if rest.len() < length {
                break;
            }
            on_packet(&rest[..length]);
            packets += 1;
            start += length;
        }

        self.compact(start);
        packets
    }

    fn compact(&mut self, consumed: usize) {
        if consumed == 0 {
            return;
        }
        self.buffer.copy_within(consumed..self.len, 0);
        self.len -= consumed;
    }
}
