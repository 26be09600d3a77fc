use memchr::memmem;

use crate::buffer::Buffer;

/// Token in a layout document that is replaced with the rendered page.
pub const BODY_PLACEHOLDER: &str = "{{Body}}";

/// Splices `body` into `layout` at the first `{{Body}}`.
///
/// Without a layout the body is returned as is. A layout lacking the
/// placeholder is emitted in full, followed by the body.
pub fn wrap(body: &[u8], layout: Option<&[u8]>) -> Buffer {
    let mut out = Buffer::new();

    match layout {
        None => out.push_bytes(body),
        Some(layout) => match memmem::find(layout, BODY_PLACEHOLDER.as_bytes()) {
            Some(at) => {
                out.push_bytes(&layout[..at]);
                out.push_bytes(body);
                out.push_bytes(&layout[at + BODY_PLACEHOLDER.len()..]);
            }
            None => {
                out.push_bytes(layout);
                out.push_bytes(body);
            }
        },
    }

    out
}
