//! CRC-32 (IEEE 802.3) as used by PNG chunk checksums
//!
//! Table-driven, reflected polynomial `0xEDB88320`, seeded with all ones and
//! inverted on output. The table is built at compile time.

const POLYNOMIAL: u32 = 0xEDB8_8320;

static CRC_TABLE: [u32; 256] = make_crc_table();

const fn make_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { POLYNOMIAL ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// Calculate CRC32 checksum for given data
pub fn checksum(data: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(data);
    crc.finalize()
}

/// Incremental CRC state, for checksumming a type tag and payload without
/// concatenating them first
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    pub fn update(&mut self, data: &[u8]) {
        let mut r = self.state;
        for &byte in data {
            r = CRC_TABLE[((r ^ u32::from(byte)) & 0xFF) as usize] ^ (r >> 8);
        }
        self.state = r;
    }

    pub fn finalize(self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}
