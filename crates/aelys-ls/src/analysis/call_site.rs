//
// analysis/call_site.rs
//
// Backward scan for the call enclosing the cursor
//

use super::scrub::scrub_text;

/// The innermost unclosed call before the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallSite {
    pub found: bool,
    /// Callee as written (`m.clamp`, `print`); empty when not found
    pub function_name: String,
    /// Number of top-level commas between the `(` and the cursor
    pub parameter_index: u32,
}

impl CallSite {
    /// Active parameter for a signature with `declared` parameters.
    ///
    /// Never points past the last parameter; 0 when there are none.
    pub fn active_parameter(&self, declared: usize) -> u32 {
        let last = declared.saturating_sub(1) as u32;
        self.parameter_index.min(last)
    }
}

fn is_callee_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'@')
}

/// Find the call whose argument list contains byte `offset` of `text`.
///
/// Scans backward from the cursor: `)` enters a nested group, `(` leaves one
/// or (at depth 0) is the open paren of the call, `,` at depth 0 advances the
/// parameter index. Parentheses and commas inside comments and string
/// literals are not counted. An offset past the end of `text` is clamped.
pub fn locate_call_site(text: &str, offset: usize) -> CallSite {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }

    let scrubbed = scrub_text(&text[..offset]);
    let bytes = scrubbed.as_bytes();

    let mut depth = 0u32;
    let mut parameter_index = 0u32;
    let mut i = bytes.len();

    while i > 0 {
        i -= 1;
        match bytes[i] {
            b')' => depth += 1,
            b'(' if depth > 0 => depth -= 1,
            b'(' => {
                let function_name = callee_before(&scrubbed, i);
                log::trace!(
                    "Call site: '{}' at parameter {}",
                    function_name,
                    parameter_index
                );
                return CallSite {
                    found: true,
                    function_name,
                    parameter_index,
                };
            }
            b',' if depth == 0 => parameter_index += 1,
            _ => {}
        }
    }

    CallSite::default()
}

/// The run of callee characters ending just before `paren`, after skipping
/// whitespace.
fn callee_before(text: &str, paren: usize) -> String {
    let bytes = text.as_bytes();
    let mut end = paren;
    while end > 0 && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    let mut start = end;
    while start > 0 && is_callee_byte(bytes[start - 1]) {
        start -= 1;
    }
    text[start..end].to_string()
}
