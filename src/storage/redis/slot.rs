//! Cluster hash-slot computation
//!
//! Slot assignment for a key is a pure function: CRC16 (XMODEM) of the key
//! reduced modulo the cluster slot count. When the key contains a hash tag
//! (`{...}`), only the content of the first balanced tag is hashed, so
//! callers can force co-location of related keys.

/// Number of slots in a Redis cluster.
pub const CLUSTER_SLOT_COUNT: u16 = 16384;

/// Slot owning `key` in a sharded cluster.
pub fn cluster_slot(key: &str) -> u16 {
    crc16(hash_tag(key).as_bytes()) % CLUSTER_SLOT_COUNT
}

/// The portion of `key` the slot hash covers.
///
/// If the key contains `{` followed by a later `}` with at least one byte
/// between them, only that substring participates; otherwise the whole key
/// does. An empty tag (`{}`) does not count.
fn hash_tag(key: &str) -> &str {
    if let Some(open) = key.find('{') {
        let rest = &key[open + 1..];
        if let Some(close) = rest.find('}') {
            if close > 0 {
                return &rest[..close];
            }
        }
    }
    key
}

/// CRC16-CCITT (XMODEM), the checksum Redis cluster uses for key slots.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
