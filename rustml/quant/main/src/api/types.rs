/// Bit widths a code can take. Each divides 32, so codes never straddle words.
pub const SUPPORTED_BITS: [u32; 3] = [2, 4, 8];

/// Bits in one packed storage word.
pub const WORD_BITS: u32 = 32;

/// Default number of values sharing one scale/bias pair.
pub const DEFAULT_GROUP_SIZE: usize = 64;

/// Default code width.
pub const DEFAULT_BITS: u32 = 4;
