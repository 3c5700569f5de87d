use crate::config::Interface;
use crate::ring::FrameSink;
use log::{debug, trace};
use zapnet_packets::{
    ArpOp, ArpPacket, EthernetFrame, Ipv4Addr, MacAddr, ARP_ETHER_TYPE, ARP_LEN,
    ARP_PACKET_LENGTH, ETHERNET_HEADER_LEN, PREAMBLE,
};

/// The single ARP entry: the one peer we talk to. An all-zero MAC means unresolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpCache {
    ip: Ipv4Addr,
    mac: MacAddr,
}

impl Default for ArpCache {
    fn default() -> Self {
        ArpCache {
            ip: Ipv4Addr::UNSPECIFIED,
            mac: MacAddr::ZERO,
        }
    }
}

impl ArpCache {
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    pub fn is_resolved(&self) -> bool {
        !self.mac.is_zero()
    }

    /// True when `ip` is the cached peer and its MAC is known.
    pub fn resolves(&self, ip: Ipv4Addr) -> bool {
        self.ip == ip && self.is_resolved()
    }

    /// Points the entry at a new peer. The old MAC is dropped in the same step.
    pub fn retarget(&mut self, ip: Ipv4Addr) {
        self.ip = ip;
        self.mac = MacAddr::ZERO;
    }

    pub fn clear(&mut self) {
        *self = ArpCache::default();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArpOutcome {
    /// Not a usable Ethernet/IPv4 ARP frame.
    Malformed,
    /// Valid, but neither a reply from our peer nor a request for us.
    Ignored,
    /// Our peer answered; its MAC is now cached.
    Learned(MacAddr),
    /// Someone asked for our address and got a reply.
    Answered(Ipv4Addr),
}

pub struct ArpResolver {
    iface: Interface,
    cache: ArpCache,
}

impl ArpResolver {
    pub fn new(iface: Interface) -> Self {
        ArpResolver {
            iface,
            cache: ArpCache::default(),
        }
    }

    pub fn cache(&self) -> &ArpCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ArpCache {
        &mut self.cache
    }

    /// Handles an ARP frame. `frame` starts at the Ethernet header with any preamble and FCS
    /// already stripped.
    pub fn handle_arp_frame(&mut self, frame: &[u8], tx: &mut dyn FrameSink) -> ArpOutcome {
        if frame.len() < ARP_PACKET_LENGTH {
            trace!("runt ARP frame of {} bytes", frame.len());
            return ArpOutcome::Malformed;
        }
        let arp = match ArpPacket::new_checked(&frame[ETHERNET_HEADER_LEN..]) {
            Ok(arp) => arp,
            Err(e) => {
                trace!("dropping ARP frame: {}", e);
                return ArpOutcome::Malformed;
            }
        };

        if arp.opcode() == ArpOp::Reply as u16 {
            if arp.sender_ip() == self.cache.ip {
                self.cache.mac = arp.sender_mac();
                debug!("{} is at {}", arp.sender_ip(), arp.sender_mac());
                return ArpOutcome::Learned(arp.sender_mac());
            }
            return ArpOutcome::Ignored;
        }

        if arp.opcode() == ArpOp::Request as u16 && arp.target_ip() == self.iface.ip {
            self.emit(
                tx,
                ArpOp::Reply,
                arp.sender_mac(),
                (arp.sender_mac(), arp.sender_ip()),
            );
            return ArpOutcome::Answered(arp.sender_ip());
        }
        ArpOutcome::Ignored
    }

    /// Broadcasts a who-has for `target`.
    pub fn send_request(&self, target: Ipv4Addr, tx: &mut dyn FrameSink) -> bool {
        self.emit(
            tx,
            ArpOp::Request,
            MacAddr::BROADCAST,
            (MacAddr::ZERO, target),
        )
    }

    fn emit(
        &self,
        tx: &mut dyn FrameSink,
        op: ArpOp,
        dest: MacAddr,
        target: (MacAddr, Ipv4Addr),
    ) -> bool {
        let offset = self.iface.frame_offset;
        let buffer = tx.buffer();
        let frame_len = offset + ARP_PACKET_LENGTH;
        buffer[..frame_len].iter_mut().for_each(|byte| *byte = 0);
        if offset != 0 {
            buffer[..offset].copy_from_slice(&PREAMBLE);
        }

        let mut eth = EthernetFrame::new_unchecked(&mut buffer[offset..frame_len]);
        eth.fill_header(dest, self.iface.mac, ARP_ETHER_TYPE);
        ArpPacket::new_unchecked(&mut eth.payload_mut()[..ARP_LEN]).fill(
            op,
            (self.iface.mac, self.iface.ip),
            target,
        );
        tx.transmit(frame_len)
    }
}
