/// A signed cell offset for branch instructions, relative to the
/// position of the branch handler's own cell within the image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "persist", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchOffset(i32);

impl From<i32> for BranchOffset {
    fn from(offset: i32) -> Self {
        Self(offset)
    }
}

impl BranchOffset {
    /// Creates an uninitialized offset, patched in later once the
    /// branch target's image position is known.
    pub fn uninit() -> Self {
        Self(0)
    }

    /// Computes the offset from a branch cell at `src` to a target
    /// cell at `dst`, both expressed in image cell indices.
    pub fn from_src_to_dst(src: u32, dst: u32) -> Option<Self> {
        let src = i64::from(src);
        let dst = i64::from(dst);
        let offset = dst.checked_sub(src)?;
        let offset = i32::try_from(offset).ok()?;
        Some(Self(offset))
    }

    pub fn is_init(self) -> bool {
        self.0 != 0
    }

    /// # Panics
    ///
    /// If this offset or `valid_offset` is not yet initialized.
    pub fn init(&mut self, valid_offset: BranchOffset) {
        assert!(valid_offset.is_init());
        assert!(!self.is_init());
        *self = valid_offset;
    }

    pub fn to_i32(self) -> i32 {
        self.0
    }
}
