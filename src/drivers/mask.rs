use std::fmt;
use crate::drivers::FaError;
/// Number of channel ids addressable by one subscription.
pub const MASK_SIZE: usize = 256;
const MASK_BYTES: usize = MASK_SIZE / 8;
/// Bitmap of subscribed channel ids, bit `i % 8` of byte `i / 8` for id `i`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionMask {
    bits: [u8; MASK_BYTES],
}
impl SubscriptionMask {
    pub fn empty() -> Self {
        Self::default()
    }
    pub fn single(id: usize) -> Result<Self, FaError> {
        Self::from_ids([id])
    }
    /// Builds a mask from ids; duplicates collapse into one bit.
    pub fn from_ids(ids: impl IntoIterator<Item = usize>) -> Result<Self, FaError> {
        let mut mask = Self::empty();
        for id in ids {
            mask.insert(id)?;
        }
        Ok(mask)
    }
    pub fn insert(&mut self, id: usize) -> Result<(), FaError> {
        if id >= MASK_SIZE {
            return Err(FaError::InvalidChannel(id));
        }
        self.bits[id / 8] |= 1 << (id % 8);
        Ok(())
    }
    pub fn contains(&self, id: usize) -> bool {
        id < MASK_SIZE && self.bits[id / 8] & (1 << (id % 8)) != 0
    }
    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
    /// Subscribed ids in ascending order, which is also the order the server
    /// interleaves channels within each sample.
    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MASK_SIZE).filter(move |&id| self.contains(id))
    }
    /// 64 hex characters, most significant byte first.
    pub fn to_hex(&self) -> String {
        self.bits.iter().rev().map(|b| format!("{b:02X}")).collect()
    }
    pub fn subscribe_command(&self) -> String {
        format!("SR{}Z\n", self.to_hex())
    }
}
impl fmt::Display for SubscriptionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.ids().map(|id| id.to_string()).collect();
        write!(f, "{{{}}}", ids.join(","))
    }
}
