const CHECKSUM_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const CHECKSUM_PRIME: u64 = 0x00000100000001B3;

/// FNV-1a over the little-endian bytes of the fed values. Stable across
/// platforms and runs, unlike `std::hash::DefaultHasher`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentHasher {
    state: u64,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher {
    pub const fn new() -> Self {
        Self {
            state: CHECKSUM_OFFSET_BASIS,
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.state = bytes.iter().fold(self.state, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(CHECKSUM_PRIME)
        });
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Hashes the bit pattern, so `0.0` and `-0.0` differ.
    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }

    pub fn write_option_f64(&mut self, value: Option<f64>) {
        match value {
            Some(value) => {
                self.write_bytes(&[1]);
                self.write_f64(value);
            }
            None => self.write_bytes(&[0]),
        }
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_u64(value.len() as u64);
        self.write_bytes(value.as_bytes());
    }

    pub const fn finish(&self) -> u64 {
        self.state
    }
}
