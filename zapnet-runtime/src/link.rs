//! The link engine: one MAC, one peer, one UDP consumer, driven by cooperative polling.

use crate::arp::{ArpCache, ArpOutcome, ArpResolver};
use crate::classifier::{Classifier, EtherTypeClassifier, FrameClass};
use crate::config::{Interface, LinkConfig};
use crate::hal::{EthmacRegisters, SlotMemory};
use crate::ring::{Received, SlotRing};
use crate::udp::{handle_ip_frame, payload_range, Discard, Dispatch, Registration, UdpHandler, UdpSocket};
use log::{debug, info, trace, warn};
use zapnet_packets::{check_preamble_and_fcs, Ipv4Addr, PREAMBLE_LEN};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub rx_frames: u32,
    pub tx_frames: u32,
    /// Corrupt, malformed or unclaimed frames.
    pub dropped: u32,
    pub arp_answered: u32,
    pub arp_learned: u32,
    pub icmp_echoes: u32,
    pub udp_delivered: u32,
}

/// A network link on top of the ethmac slot ring.
///
/// Nothing runs in the background: every received frame is handled inside `service`, which
/// the firmware main loop (or `resolve`) calls repeatedly. UDP traffic for the registered port
/// goes to `H`; ARP and ICMP echo are answered by the link itself.
pub struct Link<R: EthmacRegisters, H: UdpHandler = Discard> {
    ring: SlotRing<R>,
    arp: ArpResolver,
    config: LinkConfig,
    iface: Interface,
    classifier: EtherTypeClassifier,
    udp: Option<Registration<H>>,
    stats: LinkStats,
}

impl<R: EthmacRegisters, H: UdpHandler> Link<R, H> {
    pub fn new(regs: R, memory: SlotMemory, config: LinkConfig) -> Result<Self, &'static str> {
        config.validate()?;
        let iface = config.interface();
        Ok(Link {
            ring: SlotRing::new(regs, memory, config.hw_preamble_crc),
            arp: ArpResolver::new(iface),
            config,
            iface,
            classifier: EtherTypeClassifier::new(),
            udp: None,
            stats: LinkStats::default(),
        })
    }

    /// Brings the link up: clears MAC events, forgets the peer and any half-received
    /// UDP stream state.
    pub fn start(&mut self) {
        self.ring.start();
        self.arp.cache_mut().clear();
        if let Some(registration) = self.udp.as_mut() {
            registration.handler.reset();
        }
        info!("link up: ip {} mac {}", self.config.ip, self.config.mac);
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn arp_cache(&self) -> &ArpCache {
        self.arp.cache()
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            tx_frames: self.ring.transmitted(),
            ..self.stats
        }
    }

    /// Registers the single UDP consumer, replacing any previous one.
    pub fn set_udp_callback(&mut self, port: u16, handler: H) {
        debug!("udp port {} registered", port);
        self.udp = Some(Registration { port, handler });
    }

    pub fn clear_udp_callback(&mut self) -> Option<H> {
        self.udp.take().map(|registration| registration.handler)
    }

    pub fn handler(&self) -> Option<&H> {
        self.udp.as_ref().map(|registration| &registration.handler)
    }

    pub fn handler_mut(&mut self) -> Option<&mut H> {
        self.udp.as_mut().map(|registration| &mut registration.handler)
    }

    /// Handles at most one received frame. Returns its class, or None if nothing was pending.
    pub fn service(&mut self) -> Option<FrameClass> {
        let received = self.ring.poll_receive()?;
        self.stats.rx_frames += 1;
        let class = self.dispatch(&received);
        self.ring.release(received);
        Some(class)
    }

    fn dispatch(&mut self, received: &Received) -> FrameClass {
        let Link {
            ring,
            arp,
            iface,
            classifier,
            udp,
            stats,
            ..
        } = self;
        let (slot, mut tx) = ring.split(received);

        let frame = if iface.software_framing() {
            match check_preamble_and_fcs(slot) {
                Ok(end) => &slot[PREAMBLE_LEN..end],
                Err(e) => {
                    debug!("dropping {} byte frame: {}", slot.len(), e);
                    stats.dropped += 1;
                    return FrameClass::Corrupt;
                }
            }
        } else {
            slot
        };

        let class = classifier.classify(frame);
        match class {
            FrameClass::Arp => match arp.handle_arp_frame(frame, &mut tx) {
                ArpOutcome::Answered(ip) => {
                    trace!("answered who-has from {}", ip);
                    stats.arp_answered += 1;
                }
                ArpOutcome::Learned(_) => stats.arp_learned += 1,
                ArpOutcome::Ignored | ArpOutcome::Malformed => stats.dropped += 1,
            },
            FrameClass::Ipv4 => {
                match handle_ip_frame(*iface, arp.cache(), frame, &mut tx, udp.as_mut()) {
                    Dispatch::Delivered => stats.udp_delivered += 1,
                    Dispatch::EchoReplied => stats.icmp_echoes += 1,
                    Dispatch::IcmpIgnored => {}
                    Dispatch::NotMine => stats.dropped += 1,
                }
            }
            FrameClass::Other | FrameClass::Corrupt => stats.dropped += 1,
        }
        class
    }

    /// Makes `ip` the peer and learns its MAC, servicing the link while waiting for the
    /// reply. Gives up once the configured budget is spent.
    pub fn resolve(&mut self, ip: Ipv4Addr) -> bool {
        if self.arp.cache().resolves(ip) {
            return true;
        }
        self.arp.cache_mut().retarget(ip);

        let budget = self.config.resolve_budget;
        for attempt in 0..budget.attempts {
            trace!("who-has {}, attempt {}", ip, attempt + 1);
            let mut tx = self.ring.tx_port();
            if !self.arp.send_request(ip, &mut tx) {
                warn!("could not send ARP request for {}", ip);
            }
            for _ in 0..budget.polls_per_attempt {
                self.service();
                if self.arp.cache().is_resolved() {
                    info!("resolved {} to {}", ip, self.arp.cache().mac());
                    return true;
                }
            }
        }
        warn!("{} did not answer {} ARP requests", ip, budget.attempts);
        false
    }

    /// Payload area of the next outgoing datagram.
    pub fn get_tx_buffer(&mut self) -> &mut [u8] {
        let range = payload_range(&self.iface);
        &mut self.ring.acquire_tx_slot()[range]
    }

    /// Sends `length` bytes from `get_tx_buffer` to the resolved peer.
    pub fn send(&mut self, src_port: u16, dst_port: u16, length: usize) -> bool {
        let mut tx = self.ring.tx_port();
        UdpSocket::new(&mut tx, self.arp.cache(), self.iface).send(src_port, dst_port, length)
    }

    /// Like `send`, but only when the resolved peer is `dst_ip`.
    pub fn send_to(&mut self, dst_ip: Ipv4Addr, src_port: u16, dst_port: u16, length: usize) -> bool {
        let mut tx = self.ring.tx_port();
        UdpSocket::new(&mut tx, self.arp.cache(), self.iface).send_to(dst_ip, src_port, dst_port, length)
    }
}
