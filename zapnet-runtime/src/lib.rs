#![cfg_attr(not(any(test, feature = "std")), no_std)]

/// The HAL is the only place that touches hardware. It names the ethmac CSRs, maps them onto
/// memory for real targets, and describes the SRAM that holds the RX and TX slots. Everything
/// above it is written against the `EthmacRegisters` trait, so host tests can drive the whole
/// engine against a simulated MAC.
pub mod hal;

/// The slot ring moves frames between software and the MAC. Received frames are read in place
/// and stay owned by software until released; outbound frames are built straight into the
/// current TX slot and handed to the MAC, with a software FCS appended when the MAC does not
/// insert one.
pub mod ring;

/// Link configuration: addresses, framing mode and the ARP retry budget, plus the well-known
/// ports of the instrument link.
pub mod config;

/// Classifiers look at a received frame and decide which part of the engine handles it.
pub mod classifier;

/// The single-entry ARP resolver. The link talks to exactly one peer at a time.
pub mod arp;

/// UDP and ICMP: the dispatcher for received IPv4 frames and the socket used to send datagrams.
pub mod udp;

/// Etherbone, remote register access over UDP. The endpoint reassembles packets from the
/// datagram stream and executes their reads and writes on a `Bus`.
pub mod etherbone;

/// The link engine ties the pieces together behind a cooperative `service` step.
pub mod link;

/// Utility module
pub mod utils;

pub use self::config::LinkConfig;
pub use self::link::{Link, LinkStats};
