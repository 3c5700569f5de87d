use zapnet_packets::{Ipv4Addr, MacAddr, ARP_PACKET_LENGTH, PREAMBLE_LEN};

pub const DEFAULT_MAC: MacAddr = MacAddr::new([0x13, 0x37, 0x32, 0x0d, 0xba, 0xbe]);
pub const DEFAULT_LOCAL_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 11, 2);
/// Boot/TFTP host on the isolated instrument link.
pub const DEFAULT_HOST_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 11, 3);

pub const TFTP_PORT_IN: u16 = 7642;
pub const TFTP_SERVER_PORT: u16 = 69;
pub const ETHERBONE_PORT: u16 = 1234;

/// How long `Link::resolve` keeps trying: `attempts` requests, each followed by up to
/// `polls_per_attempt` service steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolveBudget {
    pub attempts: u32,
    pub polls_per_attempt: u32,
}

impl ResolveBudget {
    pub const fn new(attempts: u32, polls_per_attempt: u32) -> Self {
        ResolveBudget {
            attempts,
            polls_per_attempt,
        }
    }
}

impl Default for ResolveBudget {
    fn default() -> Self {
        ResolveBudget::new(100, 100_000)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    /// The MAC inserts and checks preamble and FCS itself. When false both are handled in
    /// software and every slot starts with the 8-byte preamble.
    pub hw_preamble_crc: bool,
    pub resolve_budget: ResolveBudget,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            mac: DEFAULT_MAC,
            ip: DEFAULT_LOCAL_IP,
            hw_preamble_crc: true,
            resolve_budget: ResolveBudget::default(),
        }
    }
}

impl LinkConfig {
    pub fn with_mac(mut self, mac: MacAddr) -> Self {
        self.mac = mac;
        self
    }

    pub fn with_ip(mut self, ip: Ipv4Addr) -> Self {
        self.ip = ip;
        self
    }

    pub fn with_hw_preamble_crc(mut self, hw_preamble_crc: bool) -> Self {
        self.hw_preamble_crc = hw_preamble_crc;
        self
    }

    pub fn with_resolve_budget(mut self, budget: ResolveBudget) -> Self {
        self.resolve_budget = budget;
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.mac.is_zero() {
            return Err("Local MAC must not be all zeroes");
        }
        if self.ip.is_unspecified() || self.ip.is_broadcast() || self.ip.is_multicast() {
            return Err("Local IP must be a unicast address");
        }
        if self.resolve_budget.attempts == 0 || self.resolve_budget.polls_per_attempt == 0 {
            return Err("Resolve budget must allow at least one poll");
        }
        Ok(())
    }

    pub(crate) fn interface(&self) -> Interface {
        let frame_offset = if self.hw_preamble_crc { 0 } else { PREAMBLE_LEN };
        Interface {
            mac: self.mac,
            ip: self.ip,
            frame_offset,
        }
    }
}

/// Local addressing plus where the Ethernet header starts inside a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interface {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub frame_offset: usize,
}

impl Interface {
    /// Shortest frame put on the wire, counted from the start of the slot.
    pub fn min_frame_len(&self) -> usize {
        self.frame_offset + ARP_PACKET_LENGTH
    }

    pub fn software_framing(&self) -> bool {
        self.frame_offset != 0
    }
}
