//! Helpers for the byte order of the frame length prefix.
//!
//! qws peers agree on a little-endian `u32` header-length prefix. Keeping the
//! conversions here scopes the Clippy expectations to the conversion points
//! so codec code can stay explicit about wire endianness.

/// Width of the header-length prefix in bytes.
pub const PREFIX_LEN: usize = 4;

/// Serialise a header length as it appears on the wire.
///
/// # Examples
///
/// ```
/// use qws::byte_order::write_prefix;
///
/// assert_eq!(write_prefix(0x1234_5678), [0x78, 0x56, 0x34, 0x12]);
/// ```
#[must_use]
pub fn write_prefix(value: u32) -> [u8; PREFIX_LEN] {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The qws frame prefix is little-endian on the wire."
    )]
    value.to_le_bytes()
}

/// Parse a header length from its on-wire representation.
///
/// # Examples
///
/// ```
/// use qws::byte_order::read_prefix;
///
/// assert_eq!(read_prefix([0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
/// ```
#[must_use]
pub fn read_prefix(bytes: [u8; PREFIX_LEN]) -> u32 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The qws frame prefix is little-endian on the wire."
    )]
    u32::from_le_bytes(bytes)
}

/// Read the prefix from the start of `buf`, if it is long enough.
#[must_use]
pub fn peek_prefix(buf: &[u8]) -> Option<u32> {
    buf.get(..PREFIX_LEN)
        .and_then(|slice| <[u8; PREFIX_LEN]>::try_from(slice).ok())
        .map(read_prefix)
}
