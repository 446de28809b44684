//! Channel mask codec.
//!
//! A [`ChannelMask`] is the 8-bit selection the device is configured with; bit `i`
//! set means physical channel `i` is part of every scan. Decoding yields the
//! [`EnabledChannelSet`], the ascending list of selected channels, which is also the
//! order channels appear inside each interleaved time step.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of channel slots the mask can address.
pub const MAX_CHANNELS: usize = 8;

/// Bit set over the 8 channel slots of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMask(u8);

impl ChannelMask {
    /// Wrap a raw mask value.
    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    /// Build a mask from channel indices. Indices above 7 are ignored.
    pub fn from_channels<I: IntoIterator<Item = u8>>(channels: I) -> Self {
        let bits = channels
            .into_iter()
            .filter(|&ch| (ch as usize) < MAX_CHANNELS)
            .fold(0u8, |acc, ch| acc | (1 << ch));
        Self(bits)
    }

    /// Raw bit pattern.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when no channel is selected.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether `channel` is selected.
    pub const fn contains(self, channel: u8) -> bool {
        channel < MAX_CHANNELS as u8 && self.0 & (1 << channel) != 0
    }

    /// Number of selected channels.
    pub const fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Decode into the ordered set of enabled channels.
    pub fn decode(self) -> EnabledChannelSet {
        decode(self.0)
    }
}

impl From<u8> for ChannelMask {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl fmt::Display for ChannelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010b}", self.0)
    }
}

/// Ascending list of the channels selected by a mask.
///
/// Only constructed through [`decode`], so it can never drift from the mask it
/// came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledChannelSet {
    indices: Vec<u8>,
}

impl EnabledChannelSet {
    /// Channel indices in ascending bit order.
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Number of enabled channels (`popcount` of the mask).
    pub fn count(&self) -> usize {
        self.indices.len()
    }

    /// True for the set decoded from mask `0`.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Position of `channel` inside each time step, if enabled.
    pub fn position_of(&self, channel: u8) -> Option<usize> {
        self.indices.iter().position(|&ch| ch == channel)
    }

    /// Re-encode the indices as a mask.
    pub fn to_mask(&self) -> ChannelMask {
        ChannelMask::from_channels(self.indices.iter().copied())
    }
}

/// Decode a raw mask into its enabled channels. Total over `0..=255`.
///
/// `decode(0)` returns an empty set; callers must refuse to start a session with it.
pub fn decode(mask: u8) -> EnabledChannelSet {
    let indices = (0..MAX_CHANNELS as u8)
        .filter(|&bit| mask & (1 << bit) != 0)
        .collect();
    EnabledChannelSet { indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_low_nibble() {
        let set = decode(0b0000_1111);
        assert_eq!(set.indices(), &[0, 1, 2, 3]);
        assert_eq!(set.count(), 4);
    }

    #[test]
    fn decode_sparse_mask_is_ascending() {
        let set = decode(0b1010_0010);
        assert_eq!(set.indices(), &[1, 5, 7]);
        assert_eq!(set.position_of(5), Some(1));
        assert_eq!(set.position_of(2), None);
    }

    #[test]
    fn decode_zero_is_empty() {
        let set = decode(0);
        assert!(set.is_empty());
        assert_eq!(set.count(), 0);
        assert!(ChannelMask::new(0).is_empty());
    }

    #[test]
    fn every_mask_round_trips_and_counts_match_popcount() {
        for m in 1..=255u8 {
            let set = decode(m);
            assert_eq!(set.count(), m.count_ones() as usize, "mask {m:#010b}");
            assert_eq!(set.to_mask().bits(), m, "mask {m:#010b}");
        }
    }

    #[test]
    fn from_channels_ignores_out_of_range_indices() {
        let mask = ChannelMask::from_channels([0, 3, 9]);
        assert_eq!(mask.bits(), 0b0000_1001);
        assert!(mask.contains(3));
        assert!(!mask.contains(9));
    }

    #[test]
    fn display_shows_all_eight_bits() {
        assert_eq!(ChannelMask::new(0b11).to_string(), "0b00000011");
    }
}
