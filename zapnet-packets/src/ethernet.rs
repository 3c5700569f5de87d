use crate::types::{read_u16, write_u16};
use crate::MacAddr;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const IPV4_ETHER_TYPE: u16 = 0x0800;
pub const ARP_ETHER_TYPE: u16 = 0x0806;

/// Seven `0x55` bytes and the start-of-frame delimiter, present in slot memory when the MAC
/// leaves preamble handling to software.
pub const PREAMBLE: [u8; 8] = [0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0xd5];
pub const PREAMBLE_LEN: usize = 8;
pub const FCS_LEN: usize = 4;

/// Largest frame a slot carries, software preamble and FCS included.
pub const MTU: usize = 1532;

/// An ARP frame padded to the Ethernet minimum, without preamble or FCS.
pub const ARP_PACKET_LENGTH: usize = 60;

const DEST_MAC_RANGE: (usize, usize) = (0, 6);
const SRC_MAC_RANGE: (usize, usize) = (6, 12);
const ETHER_TYPE_OFFSET: usize = 12;

pub fn build_eth_header(dest: MacAddr, src: MacAddr, ether_type: u16) -> [u8; ETHERNET_HEADER_LEN] {
    let mut header = [0u8; ETHERNET_HEADER_LEN];
    header[0..6].copy_from_slice(&dest.bytes);
    header[6..12].copy_from_slice(&src.bytes);
    header[12..14].copy_from_slice(&ether_type.to_be_bytes());
    header
}

/// Ethernet II frame view. The buffer starts at the destination MAC; any software preamble
/// has already been skipped by the caller.
#[derive(Clone, Debug)]
pub struct EthernetFrame<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> EthernetFrame<T> {
    pub fn new_unchecked(buffer: T) -> Self {
        EthernetFrame { buffer }
    }

    pub fn new_checked(buffer: T) -> Result<Self, &'static str> {
        // 0                    6                    12                      14
        // |---6 byte Dest_MAC--|---6 byte Src_MAC---|--2 Byte EtherType---|
        if buffer.as_ref().len() < ETHERNET_HEADER_LEN {
            return Err("Frame is less than the minimum of 14 bytes");
        }
        Ok(EthernetFrame { buffer })
    }

    pub fn into_inner(self) -> T {
        self.buffer
    }

    pub fn dest_mac(&self) -> MacAddr {
        self.mac(DEST_MAC_RANGE)
    }

    pub fn src_mac(&self) -> MacAddr {
        self.mac(SRC_MAC_RANGE)
    }

    pub fn ether_type(&self) -> u16 {
        read_u16(self.buffer.as_ref(), ETHER_TYPE_OFFSET)
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[ETHERNET_HEADER_LEN..]
    }

    fn mac(&self, (start, end): (usize, usize)) -> MacAddr {
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&self.buffer.as_ref()[start..end]);
        MacAddr::new(bytes)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> EthernetFrame<T> {
    pub fn set_dest_mac(&mut self, mac: MacAddr) {
        let (start, end) = DEST_MAC_RANGE;
        self.buffer.as_mut()[start..end].copy_from_slice(&mac.bytes);
    }

    pub fn set_src_mac(&mut self, mac: MacAddr) {
        let (start, end) = SRC_MAC_RANGE;
        self.buffer.as_mut()[start..end].copy_from_slice(&mac.bytes);
    }

    pub fn set_ether_type(&mut self, ether_type: u16) {
        write_u16(self.buffer.as_mut(), ETHER_TYPE_OFFSET, ether_type);
    }

    pub fn fill_header(&mut self, dest: MacAddr, src: MacAddr, ether_type: u16) {
        self.buffer.as_mut()[..ETHERNET_HEADER_LEN]
            .copy_from_slice(&build_eth_header(dest, src, ether_type));
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut()[ETHERNET_HEADER_LEN..]
    }
}

/// IEEE 802.3 CRC-32 of `data`.
pub fn fcs(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Appends the FCS of `buffer[PREAMBLE_LEN..length]` after `length`, least significant byte
/// first, and returns the new frame length.
pub fn append_fcs(buffer: &mut [u8], length: usize) -> Result<usize, &'static str> {
    if length < PREAMBLE_LEN {
        return Err("Frame is shorter than its preamble");
    }
    if buffer.len() < length + FCS_LEN {
        return Err("No room for the frame check sequence");
    }
    let crc = fcs(&buffer[PREAMBLE_LEN..length]);
    buffer[length..length + FCS_LEN].copy_from_slice(&crc.to_le_bytes());
    Ok(length + FCS_LEN)
}

/// Validates the preamble and trailing FCS of a software-framed frame. Returns the frame
/// length with the FCS removed (the preamble is still counted).
pub fn check_preamble_and_fcs(frame: &[u8]) -> Result<usize, &'static str> {
    if frame.len() < PREAMBLE_LEN + ETHERNET_HEADER_LEN + FCS_LEN {
        return Err("Frame too short to carry preamble, header and FCS");
    }
    if frame[..PREAMBLE_LEN] != PREAMBLE {
        return Err("Bad preamble");
    }
    let body_end = frame.len() - FCS_LEN;
    let mut received = [0u8; FCS_LEN];
    received.copy_from_slice(&frame[body_end..]);
    if fcs(&frame[PREAMBLE_LEN..body_end]) != u32::from_le_bytes(received) {
        return Err("Frame check sequence mismatch");
    }
    Ok(body_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ethernet_frame() {
        let data: Vec<u8> = vec![
            0xde, 0xad, 0xbe, 0xef, 0xff, 0xff, 1, 2, 3, 4, 5, 6, 0x08, 0x00, 0xaa, 0xbb,
        ];
        let frame = EthernetFrame::new_checked(&data[..]).unwrap();
        assert_eq!(
            frame.dest_mac(),
            MacAddr::new([0xde, 0xad, 0xbe, 0xef, 0xff, 0xff])
        );
        assert_eq!(frame.src_mac(), MacAddr::new([1, 2, 3, 4, 5, 6]));
        assert_eq!(frame.ether_type(), IPV4_ETHER_TYPE);
        assert_eq!(frame.payload(), [0xaa, 0xbb]);
    }

    #[test]
    fn short_frame_is_rejected() {
        let data = [0u8; 13];
        assert!(EthernetFrame::new_checked(&data[..]).is_err());
    }

    #[test]
    fn build_header_matches_setters() {
        let dest = MacAddr::BROADCAST;
        let src = MacAddr::new([0x13, 0x37, 0x32, 0x0d, 0xba, 0xbe]);
        let header = build_eth_header(dest, src, ARP_ETHER_TYPE);

        let mut frame = EthernetFrame::new_unchecked([0u8; ETHERNET_HEADER_LEN]);
        frame.set_dest_mac(dest);
        frame.set_src_mac(src);
        frame.set_ether_type(ARP_ETHER_TYPE);
        assert_eq!(frame.into_inner(), header);
        assert_eq!(&header[12..], &[0x08, 0x06]);
    }

    #[test]
    fn fcs_check_value() {
        assert_eq!(fcs(b"123456789"), 0xcbf4_3926);
    }

    #[test]
    fn software_framing() {
        let mut slot = [0u8; 128];
        slot[..PREAMBLE_LEN].copy_from_slice(&PREAMBLE);
        slot[PREAMBLE_LEN..PREAMBLE_LEN + ETHERNET_HEADER_LEN].copy_from_slice(
            &build_eth_header(MacAddr::BROADCAST, MacAddr::new([2; 6]), IPV4_ETHER_TYPE),
        );
        let length = PREAMBLE_LEN + 60;
        let with_fcs = append_fcs(&mut slot, length).unwrap();
        assert_eq!(with_fcs, length + FCS_LEN);
        assert_eq!(check_preamble_and_fcs(&slot[..with_fcs]), Ok(length));

        slot[20] ^= 0x01;
        assert!(check_preamble_and_fcs(&slot[..with_fcs]).is_err());
    }

    #[test]
    fn bad_preamble_is_rejected() {
        let mut slot = [0u8; 80];
        let with_fcs = append_fcs(&mut slot, 70).unwrap();
        assert_eq!(
            check_preamble_and_fcs(&slot[..with_fcs]),
            Err("Bad preamble")
        );
    }

    #[test]
    fn append_fcs_needs_room() {
        let mut slot = [0u8; 64];
        assert!(append_fcs(&mut slot, 62).is_err());
        assert!(append_fcs(&mut slot, 4).is_err());
    }
}
