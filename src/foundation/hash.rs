/// FNV-1a 64-bit hasher used for response validators.
pub(crate) struct Fnv1a64(u64);

impl Fnv1a64 {
    pub(crate) const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01B3;

    pub(crate) fn new_default() -> Self {
        Self(Self::OFFSET_BASIS)
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= u64::from(b);
            h = h.wrapping_mul(Self::PRIME);
        }
        self.0 = h;
    }

    pub(crate) fn finish(self) -> u64 {
        self.0
    }
}

/// Strong `ETag` value (quoted) for a response body.
pub fn etag_for(body: &[u8]) -> String {
    let mut hasher = Fnv1a64::new_default();
    hasher.write_bytes(body);
    format!("\"{:016x}\"", hasher.finish())
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/hash.rs"]
mod tests;
