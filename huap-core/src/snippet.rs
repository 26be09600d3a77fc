//! Named regions inside arbitrary source files.
//!
//! A region starts at a line reading `//snippet <name>` and ends at the next
//! line reading `//endsnippet`. Both markers must start their own line.

use crate::buffer::Buffer;
use crate::lines::{lines, strip_cr};

pub const SNIPPET_START: &[u8] = b"//snippet ";
pub const SNIPPET_END: &[u8] = b"//endsnippet";

/// Text emitted in place of a snippet that could not be located.
pub const SNIPPET_NOT_FOUND: &str = "SNIPPET NOT FOUND";

/// Returns the body of the snippet called `name`, excluding both marker
/// lines. `None` when the start marker or its closing marker is missing.
pub fn extract<'a>(file: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    if name.is_empty() {
        return None;
    }
    let start_marker = [SNIPPET_START, name].concat();

    let mut scan = lines(file);
    let start = scan
        .by_ref()
        .find(|line| strip_cr(line.content(file)) == start_marker.as_slice())?;
    if !start.has_newline() {
        return None;
    }
    let end = scan.find(|line| strip_cr(line.content(file)) == SNIPPET_END)?;

    Some(&file[start.next..end.start])
}

fn is_marker(line: &[u8]) -> bool {
    line.starts_with(SNIPPET_START) || line.starts_with(SNIPPET_END)
}

/// Appends `file` to `out`, blanking every snippet marker line while keeping
/// its newline so the surrounding line structure is unchanged.
pub fn append_without_markers(out: &mut Buffer, file: &[u8]) {
    for line in lines(file) {
        if !is_marker(line.content(file)) {
            out.push_bytes(line.content(file));
        }
        if line.has_newline() {
            out.push_byte(b'\n');
        }
    }
}
