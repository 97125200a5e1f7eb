/// A 64-bit bit-pattern union big enough to hold any Wasm 1.0 value.
/// `i32`/`f32` are stored zero-extended into the low 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct UntypedValue(u64);

impl From<i32> for UntypedValue {
    fn from(v: i32) -> Self {
        Self(v as u32 as u64)
    }
}

impl From<i64> for UntypedValue {
    fn from(v: i64) -> Self {
        Self(v as u64)
    }
}

impl From<u32> for UntypedValue {
    fn from(v: u32) -> Self {
        Self(v as u64)
    }
}

impl From<u64> for UntypedValue {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl UntypedValue {
    pub fn from_f32_bits(bits: u32) -> Self {
        Self(bits as u64)
    }

    pub fn from_f64_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn to_i32(self) -> i32 {
        self.0 as u32 as i32
    }

    pub fn to_u32(self) -> u32 {
        self.0 as u32
    }

    pub fn to_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }

    pub fn to_f32(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    pub fn to_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    pub fn from_f32(v: f32) -> Self {
        Self(v.to_bits() as u64)
    }

    pub fn from_f64(v: f64) -> Self {
        Self(v.to_bits())
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}
