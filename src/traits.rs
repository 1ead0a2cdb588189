use crate::pcapng::Options;

/// Common methods for packet blocks
pub trait PacketBlock {
    /// Index of the interface this packet was captured on, in its section
    fn interface_id(&self) -> u32;
    /// Network packet data, clamped to the interface snap length
    fn packet_data(&self) -> &[u8];
    /// Original packet length, as seen on the wire
    fn orig_len(&self) -> u32;
    /// Packet timestamp, in interface time units. 0 if the block has no timestamp.
    fn timestamp(&self) -> u64;
    /// Decoded packet options
    fn options(&self) -> Options;
    /// Returns true if packet data is shorter than the original length
    #[inline]
    fn truncated(&self) -> bool {
        (self.packet_data().len() as u64) < u64::from(self.orig_len())
    }
}
