use std::net::IpAddr;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap_parser::Linktype;

use crate::record::{Endpoints, ForwardingClass, Transport};

use super::error::HeaderError;
use super::layout;
use super::reader::HeaderReader;

/// The two signalling bits carried in the IPv4 header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderFlags {
    pub tos_bit: bool,
    pub marker_bit: bool,
}

impl HeaderFlags {
    /// Marker and tos set means tagged, marker alone means in-flight,
    /// anything else is direct delivery.
    ///
    /// # Examples
    /// ```
    /// use relaytrace_core::{ForwardingClass, HeaderFlags};
    ///
    /// let flags = HeaderFlags { tos_bit: true, marker_bit: true };
    /// assert_eq!(flags.classify(), ForwardingClass::TaggedRedirect);
    /// ```
    pub fn classify(self) -> ForwardingClass {
        match (self.marker_bit, self.tos_bit) {
            (true, true) => ForwardingClass::TaggedRedirect,
            (true, false) => ForwardingClass::InFlightRedirect,
            (false, _) => ForwardingClass::Direct,
        }
    }
}

/// A UDP or TCP frame reduced to what the correlator needs.
#[derive(Debug)]
pub struct DecodedFrame<'a> {
    pub endpoints: Endpoints,
    pub flags: HeaderFlags,
    /// UDP payload; `None` for TCP.
    pub udp_payload: Option<&'a [u8]>,
}

/// Parse a link-layer frame down to its transport header.
///
/// Returns `Ok(None)` for unsupported link types and for anything that is
/// neither UDP nor TCP.
pub fn parse_frame(
    linktype: Linktype,
    data: &[u8],
) -> Result<Option<DecodedFrame<'_>>, HeaderError> {
    let sliced = match linktype {
        Linktype::ETHERNET => {
            SlicedPacket::from_ethernet(data).map_err(|e| HeaderError::Slice(e.to_string()))?
        }
        Linktype::RAW => {
            SlicedPacket::from_ip(data).map_err(|e| HeaderError::Slice(e.to_string()))?
        }
        _ => return Ok(None),
    };

    let net = sliced.net.ok_or(HeaderError::MissingNetworkLayer)?;
    let transport = match sliced.transport {
        Some(transport) => transport,
        None => return Ok(None),
    };

    let (source_ip, dest_ip, flags) = match net {
        NetSlice::Ipv4(ref ipv4) => {
            let header = HeaderReader::new(ipv4.header().slice());
            (
                IpAddr::V4(ipv4.header().source_addr()),
                IpAddr::V4(ipv4.header().destination_addr()),
                HeaderFlags {
                    tos_bit: header.bit_set(layout::IPV4_TOS_OFFSET, layout::TOS_TAG_MASK)?,
                    marker_bit: header
                        .bit_set(layout::IPV4_FLAGS_OFFSET, layout::REDIRECT_MARKER_MASK)?,
                },
            )
        }
        // IPv6 has no reserved fragment bit; such frames are always direct.
        NetSlice::Ipv6(ref ipv6) => (
            IpAddr::V6(ipv6.header().source_addr()),
            IpAddr::V6(ipv6.header().destination_addr()),
            HeaderFlags::default(),
        ),
    };

    let (transport, source_port, dest_port, udp_payload) = match transport {
        TransportSlice::Udp(udp) => {
            let ip_payload = net.ip_payload_ref().ok_or(HeaderError::MissingIpPayload)?;
            let payload = HeaderReader::new(ip_payload.payload).udp_payload()?;
            (
                Transport::Udp,
                udp.source_port(),
                udp.destination_port(),
                Some(payload),
            )
        }
        TransportSlice::Tcp(tcp) => (
            Transport::Tcp,
            tcp.source_port(),
            tcp.destination_port(),
            None,
        ),
        _ => return Ok(None),
    };

    Ok(Some(DecodedFrame {
        endpoints: Endpoints {
            transport,
            source_ip,
            source_port,
            dest_ip,
            dest_port,
        },
        flags,
        udp_payload,
    }))
}
