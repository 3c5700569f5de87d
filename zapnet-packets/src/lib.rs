//! Wire codecs for the instrument's network engine.
//!
//! Every type here is a view over a borrowed or owned byte buffer (`T: AsRef<[u8]>`), so the
//! same code parses frames in place inside a DMA slot and builds replies straight into a TX slot.
#![cfg_attr(not(test), no_std)]

mod types;
pub use self::types::*;

mod checksum;
pub use self::checksum::*;

mod ethernet;
pub use self::ethernet::*;

mod arp;
pub use self::arp::*;

mod ipv4;
pub use self::ipv4::*;

mod udp;
pub use self::udp::*;

mod icmp;
pub use self::icmp::*;

pub mod etherbone;
