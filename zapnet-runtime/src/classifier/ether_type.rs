use crate::classifier::Classifier;
use zapnet_packets::{EthernetFrame, ARP_ETHER_TYPE, IPV4_ETHER_TYPE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameClass {
    Arp,
    Ipv4,
    Other,
    /// Bad preamble or FCS. Set by the link before classification, never by the classifier.
    Corrupt,
}

/// Sorts Ethernet frames (starting at the destination MAC) by EtherType.
#[derive(Default)]
pub struct EtherTypeClassifier {}

impl EtherTypeClassifier {
    pub fn new() -> Self {
        EtherTypeClassifier {}
    }
}

impl Classifier for EtherTypeClassifier {
    type Packet = [u8];
    type Class = FrameClass;

    fn classify(&self, packet: &Self::Packet) -> Self::Class {
        match EthernetFrame::new_checked(packet).map(|frame| frame.ether_type()) {
            Ok(ARP_ETHER_TYPE) => FrameClass::Arp,
            Ok(IPV4_ETHER_TYPE) => FrameClass::Ipv4,
            _ => FrameClass::Other,
        }
    }
}
