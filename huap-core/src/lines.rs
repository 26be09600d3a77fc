//! Byte-oriented line scanning shared by the directive preprocessor and the
//! snippet extractor.

/// Position of one logical line inside a byte slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    /// Offset of the first byte of the line.
    pub start: usize,
    /// Offset one past the last content byte (the `\n` is excluded).
    pub end: usize,
    /// Offset where the following line begins.
    pub next: usize,
}

impl Line {
    pub fn has_newline(&self) -> bool {
        self.next > self.end
    }

    /// Line content without its terminating newline.
    pub fn content<'a>(&self, text: &'a [u8]) -> &'a [u8] {
        &text[self.start..self.end]
    }

    /// Line content including its terminating newline, if any.
    pub fn raw<'a>(&self, text: &'a [u8]) -> &'a [u8] {
        &text[self.start..self.next]
    }
}

/// Returns the line starting at `offset`, or `None` once the text is consumed.
pub fn line_at(text: &[u8], offset: usize) -> Option<Line> {
    if offset >= text.len() {
        return None;
    }
    let line = match memchr::memchr(b'\n', &text[offset..]) {
        Some(i) => Line {
            start: offset,
            end: offset + i,
            next: offset + i + 1,
        },
        None => Line {
            start: offset,
            end: text.len(),
            next: text.len(),
        },
    };
    Some(line)
}

pub fn lines(text: &[u8]) -> impl Iterator<Item = Line> + '_ {
    let mut offset = 0;
    std::iter::from_fn(move || {
        let line = line_at(text, offset)?;
        offset = line.next;
        Some(line)
    })
}

fn is_blank(b: &u8) -> bool {
    matches!(b, b' ' | b'\t')
}

pub fn trim_start(s: &[u8]) -> &[u8] {
    let skip = s.iter().take_while(|b| is_blank(b)).count();
    &s[skip..]
}

/// Trims spaces and tabs on both sides plus a trailing carriage return.
pub fn trim(s: &[u8]) -> &[u8] {
    let s = trim_start(s);
    let keep = s.len()
        - s.iter()
            .rev()
            .take_while(|b| is_blank(b) || **b == b'\r')
            .count();
    &s[..keep]
}

pub fn strip_cr(s: &[u8]) -> &[u8] {
    s.strip_suffix(b"\r").unwrap_or(s)
}

/// Splits off the first whitespace-delimited token.
pub fn split_token(s: &[u8]) -> (&[u8], &[u8]) {
    let end = s.iter().position(is_blank).unwrap_or(s.len());
    s.split_at(end)
}
