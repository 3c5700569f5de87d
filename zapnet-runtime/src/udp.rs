use crate::arp::ArpCache;
use crate::config::Interface;
use crate::ring::FrameSink;
use core::ops::Range;
use log::{debug, trace};
use zapnet_packets::{
    EthernetFrame, IcmpPacket, IpProtocol, Ipv4Addr, Ipv4Packet, MacAddr, UdpPacket,
    ETHERNET_HEADER_LEN, FCS_LEN, ICMP_ECHO_REQUEST, ICMP_HEADER_LEN, ICMP_TIMESTAMP_REQUEST,
    IPV4_ETHER_TYPE, IPV4_HEADER_LEN, MTU, PREAMBLE, UDP_HEADER_LEN,
};

const UDP_FRAME_HEADERS: usize = ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + UDP_HEADER_LEN;

/// Slot bytes available to a datagram payload.
pub(crate) fn payload_range(iface: &Interface) -> Range<usize> {
    let fcs = if iface.software_framing() { FCS_LEN } else { 0 };
    iface.frame_offset + UDP_FRAME_HEADERS..MTU - fcs
}

/// A datagram delivered to the registered handler. `payload.len()` is the UDP length minus
/// the header, clipped to what the frame actually carried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Datagram<'a> {
    pub src_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

/// The single UDP consumer of a link.
pub trait UdpHandler {
    fn on_datagram(&mut self, datagram: &Datagram<'_>, socket: &mut UdpSocket<'_>);

    /// Drops any state carried between datagrams. Called when the link restarts.
    fn reset(&mut self) {}
}

impl<F> UdpHandler for F
where
    F: FnMut(&Datagram<'_>, &mut UdpSocket<'_>),
{
    fn on_datagram(&mut self, datagram: &Datagram<'_>, socket: &mut UdpSocket<'_>) {
        self(datagram, socket)
    }
}

/// Handler for links that have no UDP consumer.
pub struct Discard;

impl UdpHandler for Discard {
    fn on_datagram(&mut self, _datagram: &Datagram<'_>, _socket: &mut UdpSocket<'_>) {}
}

pub struct Registration<H> {
    pub port: u16,
    pub handler: H,
}

/// Sending side of the UDP layer: builds datagrams in the current TX slot and sends them to
/// the peer held in the ARP cache.
pub struct UdpSocket<'a> {
    tx: &'a mut dyn FrameSink,
    cache: &'a ArpCache,
    iface: Interface,
}

impl<'a> UdpSocket<'a> {
    pub fn new(tx: &'a mut dyn FrameSink, cache: &'a ArpCache, iface: Interface) -> Self {
        UdpSocket { tx, cache, iface }
    }

    /// Where the next datagram's payload goes.
    pub fn tx_buffer(&mut self) -> &mut [u8] {
        let range = payload_range(&self.iface);
        &mut self.tx.buffer()[range]
    }

    /// Sends `length` bytes from `tx_buffer` to the cached peer. False when the peer is not
    /// resolved or the payload does not fit.
    pub fn send(&mut self, src_port: u16, dst_port: u16, length: usize) -> bool {
        if !self.cache.is_resolved() {
            debug!("no resolved peer, dropping {} byte datagram", length);
            return false;
        }
        let (mac, ip) = (self.cache.mac(), self.cache.ip());
        self.emit(mac, ip, src_port, dst_port, length)
    }

    /// Like `send`, but only if the cached peer is `dst_ip`.
    pub fn send_to(&mut self, dst_ip: Ipv4Addr, src_port: u16, dst_port: u16, length: usize) -> bool {
        if !self.cache.resolves(dst_ip) {
            debug!("{} is not the resolved peer, dropping datagram", dst_ip);
            return false;
        }
        self.send(src_port, dst_port, length)
    }

    fn payload_end(&self) -> usize {
        payload_range(&self.iface).end
    }

    fn emit(
        &mut self,
        dest_mac: MacAddr,
        dest_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        length: usize,
    ) -> bool {
        let offset = self.iface.frame_offset;
        let mut frame_len = offset + UDP_FRAME_HEADERS + length;
        if frame_len > self.payload_end() {
            debug!("{} byte datagram does not fit a frame", length);
            return false;
        }

        let buffer = self.tx.buffer();
        if offset != 0 {
            buffer[..offset].copy_from_slice(&PREAMBLE);
        }
        let mut eth = EthernetFrame::new_unchecked(&mut buffer[offset..frame_len]);
        eth.fill_header(dest_mac, self.iface.mac, IPV4_ETHER_TYPE);
        let mut ip = Ipv4Packet::new_unchecked(eth.payload_mut());
        UdpPacket::new_unchecked(ip.payload_mut()).fill_header(
            (self.iface.ip, src_port),
            (dest_ip, dst_port),
            length,
        );
        ip.fill_header(
            self.iface.ip,
            dest_ip,
            IpProtocol::UDP,
            (IPV4_HEADER_LEN + UDP_HEADER_LEN + length) as u16,
        );

        let min_len = self.iface.min_frame_len();
        if frame_len < min_len {
            buffer[frame_len..min_len].iter_mut().for_each(|byte| *byte = 0);
            frame_len = min_len;
        }
        self.tx.transmit(frame_len)
    }
}

/// What the dispatcher did with an IPv4 frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the registered handler.
    Delivered,
    /// ICMP echo or timestamp request answered.
    EchoReplied,
    /// ICMP we do not answer; consumed anyway.
    IcmpIgnored,
    NotMine,
}

impl Dispatch {
    pub fn is_processed(&self) -> bool {
        *self != Dispatch::NotMine
    }
}

/// Routes an IPv4 frame (starting at the Ethernet header, preamble and FCS stripped).
/// ICMP requests are answered straight back to the requester; UDP for the registered port
/// goes to its handler with a socket for replies.
pub fn handle_ip_frame<H: UdpHandler>(
    iface: Interface,
    cache: &ArpCache,
    frame: &[u8],
    tx: &mut dyn FrameSink,
    registration: Option<&mut Registration<H>>,
) -> Dispatch {
    if frame.len() < UDP_FRAME_HEADERS {
        trace!("runt IPv4 frame of {} bytes", frame.len());
        return Dispatch::NotMine;
    }
    let eth = EthernetFrame::new_unchecked(frame);
    let ip = match Ipv4Packet::new_checked(eth.payload()) {
        Ok(ip) => ip,
        Err(e) => {
            trace!("dropping IPv4 frame: {}", e);
            return Dispatch::NotMine;
        }
    };

    match ip.protocol() {
        IpProtocol::ICMP => answer_icmp(iface, &eth, &ip, tx),
        IpProtocol::UDP => deliver_udp(iface, cache, &ip, tx, registration),
        IpProtocol::TCP | IpProtocol::Unknown(_) => Dispatch::NotMine,
    }
}

fn deliver_udp<H: UdpHandler>(
    iface: Interface,
    cache: &ArpCache,
    ip: &Ipv4Packet<&[u8]>,
    tx: &mut dyn FrameSink,
    registration: Option<&mut Registration<H>>,
) -> Dispatch {
    if usize::from(ip.total_len()) < IPV4_HEADER_LEN + UDP_HEADER_LEN {
        return Dispatch::NotMine;
    }
    if ip.dest_addr() != iface.ip {
        return Dispatch::NotMine;
    }
    let udp = match UdpPacket::new_checked(ip.payload()) {
        Ok(udp) => udp,
        Err(_) => return Dispatch::NotMine,
    };
    let registration = match registration {
        Some(registration) if registration.port == udp.dest_port() => registration,
        _ => return Dispatch::NotMine,
    };

    let datagram = Datagram {
        src_ip: ip.src_addr(),
        src_port: udp.src_port(),
        dst_port: udp.dest_port(),
        payload: udp.payload(),
    };
    let mut socket = UdpSocket::new(tx, cache, iface);
    registration.handler.on_datagram(&datagram, &mut socket);
    Dispatch::Delivered
}

fn answer_icmp(
    iface: Interface,
    eth: &EthernetFrame<&[u8]>,
    ip: &Ipv4Packet<&[u8]>,
    tx: &mut dyn FrameSink,
) -> Dispatch {
    let request = match IcmpPacket::new_checked(ip.payload()) {
        Ok(request) => request,
        Err(_) => return Dispatch::IcmpIgnored,
    };
    if request.msg_type() != ICMP_ECHO_REQUEST && request.msg_type() != ICMP_TIMESTAMP_REQUEST {
        return Dispatch::IcmpIgnored;
    }
    let payload_len = usize::from(ip.total_len()).saturating_sub(IPV4_HEADER_LEN + ICMP_HEADER_LEN);
    let payload = match request.payload().get(..payload_len) {
        Some(payload) => payload,
        None => {
            trace!("ICMP total length beyond frame");
            return Dispatch::IcmpIgnored;
        }
    };

    let offset = iface.frame_offset;
    let icmp_start = offset + ETHERNET_HEADER_LEN + IPV4_HEADER_LEN;
    let mut frame_len = icmp_start + ICMP_HEADER_LEN + payload_len;
    let fcs = if iface.software_framing() { FCS_LEN } else { 0 };
    if frame_len > MTU - fcs {
        return Dispatch::IcmpIgnored;
    }

    let buffer = tx.buffer();
    if offset != 0 {
        buffer[..offset].copy_from_slice(&PREAMBLE);
    }
    let mut reply_eth = EthernetFrame::new_unchecked(&mut buffer[offset..frame_len]);
    reply_eth.fill_header(eth.src_mac(), iface.mac, IPV4_ETHER_TYPE);
    let mut reply_ip = Ipv4Packet::new_unchecked(reply_eth.payload_mut());
    reply_ip.fill_header(
        iface.ip,
        ip.src_addr(),
        IpProtocol::ICMP,
        (IPV4_HEADER_LEN + ICMP_HEADER_LEN + payload_len) as u16,
    );
    let mut reply = IcmpPacket::new_unchecked(reply_ip.payload_mut());
    reply.payload_mut()[..payload_len].copy_from_slice(payload);
    reply.fill_echo_reply(request.echo_identifier(), request.echo_sequence(), payload_len);

    let min_len = iface.min_frame_len();
    if frame_len < min_len {
        buffer[frame_len..min_len].iter_mut().for_each(|byte| *byte = 0);
        frame_len = min_len;
    }
    tx.transmit(frame_len);
    Dispatch::EchoReplied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LinkConfig, TFTP_PORT_IN};
    use crate::utils::test::packet_generators::*;
    use crate::utils::test::VecSink;
    use zapnet_packets::{validate_udp_checksum, ICMP_ECHO_REPLY};

    fn iface() -> Interface {
        LinkConfig::default().interface()
    }

    fn resolved_cache() -> ArpCache {
        let mut arp = crate::arp::ArpResolver::new(iface());
        arp.cache_mut().retarget(host_ip());
        arp.handle_arp_frame(
            &arp_reply_frame(host_mac(), host_ip(), device_mac(), device_ip()),
            &mut VecSink::new(),
        );
        *arp.cache()
    }

    #[test]
    fn delivers_to_registered_port() {
        let cache = ArpCache::default();
        let mut sink = VecSink::new();
        let mut seen = vec![];
        let mut registration = Registration {
            port: TFTP_PORT_IN,
            handler: |datagram: &Datagram<'_>, _socket: &mut UdpSocket<'_>| {
                seen.push((
                    datagram.src_ip,
                    datagram.src_port,
                    datagram.dst_port,
                    datagram.payload.to_vec(),
                ));
            },
        };

        let frame = udp_frame(host_ip(), 69, device_ip(), TFTP_PORT_IN, b"\x00\x03\x00\x01data");
        let dispatch = handle_ip_frame(iface(), &cache, &frame, &mut sink, Some(&mut registration));
        assert_eq!(dispatch, Dispatch::Delivered);
        drop(registration);
        assert_eq!(
            seen,
            vec![(host_ip(), 69, TFTP_PORT_IN, b"\x00\x03\x00\x01data".to_vec())]
        );
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn other_ports_and_hosts_are_not_mine() {
        let cache = ArpCache::default();
        let mut sink = VecSink::new();
        let mut calls = 0;
        let mut registration = Registration {
            port: TFTP_PORT_IN,
            handler: |_: &Datagram<'_>, _: &mut UdpSocket<'_>| calls += 1,
        };

        let wrong_port = udp_frame(host_ip(), 69, device_ip(), 7643, b"x");
        let wrong_host = udp_frame(host_ip(), 69, Ipv4Addr::new(10, 0, 11, 9), TFTP_PORT_IN, b"x");
        for frame in [wrong_port, wrong_host].iter() {
            assert_eq!(
                handle_ip_frame(iface(), &cache, frame, &mut sink, Some(&mut registration)),
                Dispatch::NotMine
            );
        }
        assert_eq!(
            handle_ip_frame::<Discard>(
                iface(),
                &cache,
                &udp_frame(host_ip(), 69, device_ip(), TFTP_PORT_IN, b"x"),
                &mut sink,
                None
            ),
            Dispatch::NotMine
        );
        drop(registration);
        assert_eq!(calls, 0);
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn malformed_ip_is_not_mine() {
        let cache = ArpCache::default();
        let mut sink = VecSink::new();
        let good = udp_frame(host_ip(), 69, device_ip(), TFTP_PORT_IN, b"abcd");

        let mut options = good.clone();
        options[ETHERNET_HEADER_LEN] = 0x46;
        let mut short_udp_len = good.clone();
        short_udp_len[ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + 5] = 7;
        let mut short_total_len = good.clone();
        short_total_len[ETHERNET_HEADER_LEN + 2..ETHERNET_HEADER_LEN + 4]
            .copy_from_slice(&27u16.to_be_bytes());
        let mut tcp = good.clone();
        tcp[ETHERNET_HEADER_LEN + 9] = 6;
        let runt = good[..UDP_FRAME_HEADERS - 1].to_vec();

        for frame in [options, short_udp_len, short_total_len, tcp, runt].iter() {
            assert_eq!(
                handle_ip_frame::<Discard>(
                    iface(),
                    &cache,
                    frame,
                    &mut sink,
                    Some(&mut Registration {
                        port: TFTP_PORT_IN,
                        handler: Discard
                    })
                ),
                Dispatch::NotMine
            );
        }
    }

    #[test]
    fn echo_request_is_answered() {
        let cache = ArpCache::default();
        let mut sink = VecSink::new();
        let frame = icmp_echo_request_frame(host_mac(), host_ip(), device_ip(), 0x1234, 1, b"PING");

        assert_eq!(
            handle_ip_frame::<Discard>(iface(), &cache, &frame, &mut sink, None),
            Dispatch::EchoReplied
        );
        assert_eq!(sink.sent.len(), 1);
        let reply = &sink.sent[0];
        assert_eq!(reply.len(), 60);

        let eth = EthernetFrame::new_checked(&reply[..]).unwrap();
        assert_eq!(eth.dest_mac(), host_mac());
        let ip = Ipv4Packet::new_checked(eth.payload()).unwrap();
        assert!(ip.validate_checksum());
        assert_eq!(ip.dest_addr(), host_ip());
        assert_eq!(ip.protocol(), IpProtocol::ICMP);
        assert_eq!(ip.total_len(), 32);
        let icmp = IcmpPacket::new_checked(ip.payload()).unwrap();
        assert_eq!(icmp.msg_type(), ICMP_ECHO_REPLY);
        assert_eq!(icmp.echo_identifier(), 0x1234);
        assert_eq!(icmp.echo_sequence(), 1);
        assert_eq!(&icmp.payload()[..4], b"PING");
        assert!(icmp.validate_checksum(4));
    }

    #[test]
    fn timestamp_request_gets_echo_reply() {
        let cache = ArpCache::default();
        let mut sink = VecSink::new();
        let mut frame =
            icmp_echo_request_frame(host_mac(), host_ip(), device_ip(), 0xbeef, 7, b"TIME");
        frame[ETHERNET_HEADER_LEN + IPV4_HEADER_LEN] = ICMP_TIMESTAMP_REQUEST;

        assert_eq!(
            handle_ip_frame::<Discard>(iface(), &cache, &frame, &mut sink, None),
            Dispatch::EchoReplied
        );
        assert_eq!(sink.sent.len(), 1);
        let eth = EthernetFrame::new_checked(&sink.sent[0][..]).unwrap();
        let ip = Ipv4Packet::new_checked(eth.payload()).unwrap();
        assert!(ip.validate_checksum());
        assert_eq!(ip.dest_addr(), host_ip());
        let icmp = IcmpPacket::new_checked(ip.payload()).unwrap();
        assert_eq!(icmp.msg_type(), ICMP_ECHO_REPLY);
        assert_eq!(icmp.echo_identifier(), 0xbeef);
        assert_eq!(icmp.echo_sequence(), 7);
        assert_eq!(&icmp.payload()[..4], b"TIME");
        assert!(icmp.validate_checksum(4));
    }

    #[test]
    fn other_icmp_is_consumed_silently() {
        let cache = ArpCache::default();
        let mut sink = VecSink::new();
        let mut frame =
            icmp_echo_request_frame(host_mac(), host_ip(), device_ip(), 1, 1, b"PING");
        frame[ETHERNET_HEADER_LEN + IPV4_HEADER_LEN] = ICMP_ECHO_REPLY;
        assert_eq!(
            handle_ip_frame::<Discard>(iface(), &cache, &frame, &mut sink, None),
            Dispatch::IcmpIgnored
        );
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn send_requires_resolved_peer() {
        let unresolved = ArpCache::default();
        let mut sink = VecSink::new();
        let mut socket = UdpSocket::new(&mut sink, &unresolved, iface());
        socket.tx_buffer()[..3].copy_from_slice(b"abc");
        assert!(!socket.send(TFTP_PORT_IN, 69, 3));
        drop(socket);
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn send_builds_padded_checksummed_frame() {
        let cache = resolved_cache();
        let mut sink = VecSink::new();
        let mut socket = UdpSocket::new(&mut sink, &cache, iface());
        socket.tx_buffer()[..5].copy_from_slice(b"hello");
        assert!(socket.send(TFTP_PORT_IN, 69, 5));
        assert!(!socket.send_to(Ipv4Addr::new(10, 0, 11, 9), TFTP_PORT_IN, 69, 5));
        drop(socket);

        assert_eq!(sink.sent.len(), 1);
        let frame = &sink.sent[0];
        assert_eq!(frame.len(), 60);
        let eth = EthernetFrame::new_checked(&frame[..]).unwrap();
        assert_eq!(eth.dest_mac(), host_mac());
        assert_eq!(eth.src_mac(), device_mac());
        let ip = Ipv4Packet::new_checked(eth.payload()).unwrap();
        assert!(ip.validate_checksum());
        assert_eq!(ip.total_len(), 33);
        let udp = UdpPacket::new_checked(ip.payload()).unwrap();
        assert_eq!((udp.src_port(), udp.dest_port()), (TFTP_PORT_IN, 69));
        assert_eq!(udp.payload(), b"hello");
        assert!(validate_udp_checksum(
            &ip.payload()[..13],
            device_ip(),
            host_ip()
        ));
    }

    #[test]
    fn oversized_payload_is_refused() {
        let cache = resolved_cache();
        let mut sink = VecSink::new();
        let mut socket = UdpSocket::new(&mut sink, &cache, iface());
        let capacity = socket.tx_buffer().len();
        assert_eq!(capacity, MTU - UDP_FRAME_HEADERS);
        assert!(!socket.send(TFTP_PORT_IN, 69, capacity + 1));
        assert!(socket.send(TFTP_PORT_IN, 69, capacity));
    }
}
