//! Packet normalization
//!
//! Turns a raw captured frame into a [`PacketRecord`](crate::record::PacketRecord):
//! [`ParsedFrame::parse`] locates the layers, [`normalize`] reduces them.

pub mod frame;
pub mod normalizer;

pub use frame::{IcmpLayer, IpLayer, LinkType, ParsedFrame, PortLayer};
pub use normalizer::{normalize, normalize_at};
