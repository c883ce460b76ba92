pub const IPV4_TOS_OFFSET: usize = 1;
pub const IPV4_FLAGS_OFFSET: usize = 6;

/// Low bit of the type-of-service byte.
pub const TOS_TAG_MASK: u8 = 0x01;
/// High bit of the flags/fragment-offset word (the reserved flag).
pub const REDIRECT_MARKER_MASK: u8 = 0x80;

pub const UDP_HEADER_LEN: usize = 8;
