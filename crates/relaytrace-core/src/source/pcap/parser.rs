use std::fs::File;
use std::path::Path;

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapError, PcapNGReader,
    traits::PcapReaderIterator,
};

use crate::source::{PacketEvent, PacketSource, SourceError};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{
    CaptureKind, InterfaceClock, clock_for_interface, legacy_ts_to_seconds, sniff_kind,
};

/// Capture file opened for a single sequential pass.
pub struct PcapFileSource {
    inner: CaptureReader,
}

enum CaptureReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Linktype,
        nanosecond: bool,
    },
    Ng {
        reader: PcapNGReader<File>,
        clocks: Vec<InterfaceClock>,
    },
}

/// Reader stage names used in parse errors.
struct Stage {
    init: &'static str,
    next: &'static str,
    refill: &'static str,
}

const LEGACY: Stage = Stage {
    init: "pcap reader init",
    next: "pcap reader next",
    refill: "pcap reader refill",
};

const NG: Stage = Stage {
    init: "pcapng reader init",
    next: "pcapng reader next",
    refill: "pcapng reader refill",
};

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let mut file = File::open(path)?;
        let inner = match sniff_kind(&mut file)? {
            CaptureKind::Legacy => CaptureReader::Legacy {
                reader: LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
                    .map_err(|e| parse_error(LEGACY.init, e))?,
                linktype: Linktype::ETHERNET,
                nanosecond: false,
            },
            CaptureKind::Ng => CaptureReader::Ng {
                reader: PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
                    .map_err(|e| parse_error(NG.init, e))?,
                clocks: Vec::new(),
            },
        };
        Ok(Self { inner })
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        let event = match &mut self.inner {
            CaptureReader::Legacy {
                reader,
                linktype,
                nanosecond,
            } => next_event(reader, &LEGACY, |block| match block {
                PcapBlockOwned::LegacyHeader(header) => {
                    *linktype = header.network;
                    *nanosecond = header.is_nanosecond_precision();
                    None
                }
                PcapBlockOwned::Legacy(packet) => Some(PacketEvent {
                    ts: Some(legacy_ts_to_seconds(
                        packet.ts_sec,
                        packet.ts_usec,
                        *nanosecond,
                    )),
                    linktype: *linktype,
                    data: packet.data.to_vec(),
                }),
                _ => None,
            }),
            CaptureReader::Ng { reader, clocks } => next_event(reader, &NG, |block| match block {
                PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                    // Interface ids restart with every section.
                    clocks.clear();
                    None
                }
                PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                    clocks.push(InterfaceClock::new(
                        intf.linktype,
                        intf.if_tsresol,
                        intf.if_tsoffset,
                    ));
                    None
                }
                PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                    let clock = clock_for_interface(clocks, packet.if_id);
                    Some(PacketEvent {
                        ts: Some(clock.seconds(packet.ts_high, packet.ts_low)),
                        linktype: clock.linktype,
                        data: packet.data.to_vec(),
                    })
                }
                PcapBlockOwned::NG(Block::SimplePacket(packet)) => Some(PacketEvent {
                    ts: None,
                    linktype: clock_for_interface(clocks, 0).linktype,
                    data: packet.data.to_vec(),
                }),
                _ => None,
            }),
        }?;
        Ok(event)
    }
}

/// Pull blocks until `on_block` turns one into a frame or the file ends.
fn next_event<R, F>(
    reader: &mut R,
    stage: &Stage,
    mut on_block: F,
) -> Result<Option<PacketEvent>, PcapSourceError>
where
    R: PcapReaderIterator,
    F: FnMut(PcapBlockOwned<'_>) -> Option<PacketEvent>,
{
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let event = on_block(block);
                reader.consume(offset);
                if event.is_some() {
                    return Ok(event);
                }
            }
            Err(PcapError::Eof) => return Ok(None),
            Err(PcapError::Incomplete(_)) => {
                reader.refill().map_err(|e| parse_error(stage.refill, e))?;
            }
            Err(e) => return Err(parse_error(stage.next, e)),
        }
    }
}

fn parse_error(context: &'static str, err: impl std::fmt::Display) -> PcapSourceError {
    PcapSourceError::Pcap {
        context,
        message: err.to_string(),
    }
}
