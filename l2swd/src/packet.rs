// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! The exception packet: a frame the switch silicon could not forward on its
//! own, handed to this process along with its ingress metadata.

use std::fmt;

use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;

use common::network::MacAddr;

/// Origin tag marking a frame as re-injected by this process.
pub const PKT_SRC_SOFTWARE: u8 = 1;
/// Destination tag directing a frame to the hardware egress pipeline.
pub const PKT_DST_HARDWARE: u8 = 0;

/// Metadata bytes carried ahead of the frame on the exception-path socket:
/// ingress port, egress port, origin tag, destination tag.
pub const HEADER_LEN: usize = 4;

// Payload bytes covered by the two ethernet address fields.
const ETHER_ADDRS_LEN: usize = 12;

#[derive(Clone, Debug)]
pub struct Packet {
    /// Port on which the frame arrived.
    pub ingress: u8,
    /// Port on which the frame should be re-emitted, once chosen.
    pub egress: Option<u8>,
    /// Origin tag consumed by the hardware on re-injection.
    pub pktsrc: u8,
    /// Destination tag consumed by the hardware on re-injection.
    pub pktdst: u8,
    /// The raw frame, starting with the ethernet header.
    pub data: Bytes,
}

impl Packet {
    pub fn new(ingress: u8, data: Bytes) -> Self {
        Packet {
            ingress,
            egress: None,
            pktsrc: 0,
            pktdst: 0,
            data,
        }
    }

    /// Rebuild a packet from a datagram read off the exception-path socket.
    /// Returns `None` if the datagram is too short to carry the metadata
    /// header.
    pub fn parse(datagram: &[u8]) -> Option<Packet> {
        if datagram.len() < HEADER_LEN {
            return None;
        }
        let mut pkt = Packet::new(
            datagram[0],
            Bytes::copy_from_slice(&datagram[HEADER_LEN..]),
        );
        pkt.pktsrc = datagram[2];
        pkt.pktdst = datagram[3];
        Some(pkt)
    }

    /// Serialize the packet for the exception-path socket, metadata header
    /// first.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.data.len());
        buf.put_u8(self.ingress);
        buf.put_u8(self.egress.unwrap_or(0));
        buf.put_u8(self.pktsrc);
        buf.put_u8(self.pktdst);
        buf.extend_from_slice(&self.data);
        buf
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame is long enough to carry both ethernet addresses.
    pub fn has_ether_addrs(&self) -> bool {
        self.data.len() >= ETHER_ADDRS_LEN
    }

    /// The frame's destination address.
    ///
    /// # Panics
    ///
    /// Panics on a runt frame; callers check `has_ether_addrs` first.
    pub fn dmac(&self) -> MacAddr {
        MacAddr::from_slice(&self.data[0..6])
    }

    /// The frame's source address.
    ///
    /// # Panics
    ///
    /// Panics on a runt frame; callers check `has_ether_addrs` first.
    pub fn smac(&self) -> MacAddr {
        MacAddr::from_slice(&self.data[6..12])
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_ether_addrs() {
            write!(
                f,
                "port {}: {} -> {} ({} bytes)",
                self.ingress,
                self.smac(),
                self.dmac(),
                self.len()
            )
        } else {
            write!(f, "port {}: runt frame ({} bytes)", self.ingress, self.len())
        }
    }
}
