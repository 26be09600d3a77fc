//! Append-only byte accumulator used for preprocessed markdown and final
//! page output.

const INITIAL_CAPACITY: usize = 4096;

/// Growable byte buffer that keeps a NUL byte after its contents once
/// anything has been written.
#[derive(Debug, Default, Clone)]
pub struct Buffer {
    bytes: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_bytes(&mut self, data: &[u8]) {
        self.grow(data.len());
        self.bytes.pop();
        self.bytes.extend_from_slice(data);
        self.bytes.push(0);
    }

    pub fn push_str(&mut self, s: &str) {
        self.push_bytes(s.as_bytes());
    }

    pub fn push_byte(&mut self, b: u8) {
        self.push_bytes(&[b]);
    }

    /// Capacity doubles from 4 KiB until the contents, the new bytes and
    /// the terminator fit.
    fn grow(&mut self, additional: usize) {
        let need = self.len() + additional + 1;
        if need <= self.bytes.capacity() {
            return;
        }
        let mut cap = self.bytes.capacity().max(INITIAL_CAPACITY);
        while cap < need {
            cap *= 2;
        }
        self.bytes.reserve_exact(cap - self.bytes.len());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    pub fn to_string_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.bytes.pop();
        self.bytes
    }
}

impl From<&str> for Buffer {
    fn from(s: &str) -> Self {
        let mut buf = Buffer::new();
        buf.push_str(s);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminated_after_every_write() {
        let mut buf = Buffer::new();
        assert!(buf.is_empty());

        buf.push_str("abc");
        assert_eq!(buf.as_bytes(), b"abc");
        assert_eq!(buf.bytes, b"abc\0");

        buf.push_byte(b'\n');
        buf.push_bytes(b"");
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.bytes, b"abc\n\0");
    }

    #[test]
    fn test_growth_is_amortized() {
        let mut buf = Buffer::new();
        buf.push_str("x");
        assert_eq!(buf.bytes.capacity(), INITIAL_CAPACITY);

        buf.push_bytes(&[b'y'; INITIAL_CAPACITY]);
        assert_eq!(buf.bytes.capacity(), INITIAL_CAPACITY * 2);
        assert_eq!(buf.len(), INITIAL_CAPACITY + 1);
    }

    #[test]
    fn test_into_vec_drops_terminator() {
        let buf = Buffer::from("page");
        assert_eq!(buf.into_vec(), b"page".to_vec());
        assert!(Buffer::new().into_vec().is_empty());
    }
}
