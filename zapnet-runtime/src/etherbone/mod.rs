//! Etherbone endpoint: executes Wishbone reads and writes that a host streams over UDP.

mod bus;
mod reassembler;

pub use self::bus::*;
pub use self::reassembler::*;

use crate::config::ETHERBONE_PORT;
use crate::udp::{Datagram, UdpHandler, UdpSocket};
use log::{debug, trace, warn};
use zapnet_packets::etherbone::{packet_length, EtherbonePacket, PacketFlags, RecordFlags};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EtherboneStats {
    pub executed: u32,
    /// Well-formed packets with a foreign magic or bus width.
    pub unsupported: u32,
    pub replies: u32,
    pub reply_failures: u32,
}

/// The Etherbone UDP consumer. Register it on a link with `Link::set_udp_callback`.
pub struct EtherboneEndpoint<B: Bus> {
    bus: B,
    reassembler: Reassembler,
    port: u16,
    stats: EtherboneStats,
}

impl<B: Bus> EtherboneEndpoint<B> {
    pub fn new(bus: B) -> Self {
        EtherboneEndpoint::with_port(bus, ETHERBONE_PORT)
    }

    /// `port` is the source port of read replies.
    pub fn with_port(bus: B, port: u16) -> Self {
        EtherboneEndpoint {
            bus,
            reassembler: Reassembler::new(),
            port,
            stats: EtherboneStats::default(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn stats(&self) -> EtherboneStats {
        self.stats
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    pub fn reset(&mut self) {
        self.reassembler.reset();
    }
}

impl<B: Bus> UdpHandler for EtherboneEndpoint<B> {
    fn on_datagram(&mut self, datagram: &Datagram<'_>, socket: &mut UdpSocket<'_>) {
        let EtherboneEndpoint {
            bus,
            reassembler,
            port,
            stats,
        } = self;
        reassembler.push(datagram.payload, |packet| {
            execute(bus, packet, datagram, socket, *port, stats)
        });
    }

    fn reset(&mut self) {
        self.reassembler.reset();
    }
}

fn execute<B: Bus>(
    bus: &mut B,
    packet: &[u8],
    datagram: &Datagram<'_>,
    socket: &mut UdpSocket<'_>,
    port: u16,
    stats: &mut EtherboneStats,
) {
    let request = EtherbonePacket::new_unchecked(packet);
    if !request.is_supported() {
        debug!(
            "dropping etherbone packet: sizes {}/{}",
            request.addr_size(),
            request.port_size()
        );
        stats.unsupported += 1;
        return;
    }
    stats.executed += 1;

    let base = request.base_write_addr();
    for index in 0..usize::from(request.wcount()) {
        let addr = base.wrapping_add(4 * index as u32);
        let value = request.write_value(index);
        trace!("eb write {:#010x} <- {:#010x}", addr, value);
        bus.write(addr, value);
    }

    let rcount = request.rcount();
    if rcount == 0 {
        return;
    }
    let length = packet_length(rcount, 0);
    {
        let buffer = socket.tx_buffer();
        let mut reply = EtherbonePacket::new_unchecked(&mut buffer[..length]);
        reply.fill_header(
            PacketFlags::REPLY,
            RecordFlags::default(),
            request.byte_enable(),
            rcount,
            0,
        );
        reply.set_base_write_addr(request.base_ret_addr());
        for index in 0..usize::from(rcount) {
            let value = bus.read(request.read_addr(index));
            trace!("eb read {:#010x} -> {:#010x}", request.read_addr(index), value);
            reply.set_write_value(index, value);
        }
    }

    if socket.send_to(datagram.src_ip, port, datagram.src_port, length) {
        stats.replies += 1;
    } else {
        warn!(
            "no route to {}, dropping etherbone reply of {} words",
            datagram.src_ip, rcount
        );
        stats.reply_failures += 1;
    }
}
