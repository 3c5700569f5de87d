//! # What are they for?
//!
//! Classifiers look at a frame by reference and decide which part of the engine handles it.
//! They cannot modify the frame. `Link::service` runs every received frame through an
//! `EtherTypeClassifier` and dispatches on the returned `FrameClass`.
mod ether_type;
pub use self::ether_type::*;

/// Determines the kind of packet we have. Classifier::Class is then consumed by the caller to
/// send the packet down the appropriate path.
pub trait Classifier {
    type Packet: ?Sized;
    type Class: Sized;

    fn classify(&self, packet: &Self::Packet) -> Self::Class;
}
