//
// utf16.rs
//
// LSP positions count UTF-16 code units; the analysis layer works in bytes.
//

use tower_lsp::lsp_types::Position;

/// Convert a UTF-16 column offset (from LSP Position.character) to a byte
/// offset within the given line. Columns past the end clamp to the line
/// length.
pub fn utf16_column_to_byte_offset(line: &str, utf16_col: u32) -> usize {
    let mut utf16_count = 0;
    for (byte_idx, ch) in line.char_indices() {
        if utf16_count >= utf16_col as usize {
            return byte_idx;
        }
        utf16_count += ch.len_utf16();
    }
    line.len()
}

/// Convert a UTF-16 offset within a line to a char offset (for ropey).
pub fn utf16_offset_to_char_offset(line_text: &str, utf16_offset: usize) -> usize {
    let mut utf16_count = 0;
    let mut char_count = 0;

    for ch in line_text.chars() {
        if utf16_count >= utf16_offset {
            return char_count;
        }
        utf16_count += ch.len_utf16();
        char_count += 1;
    }
    char_count
}

/// Byte offset of `position` in `text`. A line past the end maps to the end
/// of the text.
pub fn position_to_byte_offset(text: &str, position: Position) -> usize {
    let mut offset = 0;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        if idx == position.line as usize {
            let body = line.trim_end_matches(['\n', '\r']);
            return offset + utf16_column_to_byte_offset(body, position.character);
        }
        offset += line.len();
    }
    text.len()
}

/// UTF-16 length of `text`, for LSP ranges that end at a line's end.
pub fn utf16_len(text: &str) -> u32 {
    text.chars().map(|c| c.len_utf16() as u32).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_ascii_and_clamp() {
        assert_eq!(utf16_column_to_byte_offset("hello", 3), 3);
        assert_eq!(utf16_column_to_byte_offset("hello", 99), 5);
    }

    #[test]
    fn test_column_after_emoji() {
        // 🎉 is 4 bytes, 2 UTF-16 units
        assert_eq!(utf16_column_to_byte_offset("a🎉b", 3), 5);
    }

    #[test]
    fn test_char_offset_emoji_and_cjk() {
        assert_eq!(utf16_offset_to_char_offset("a🎉b", 3), 2);
        assert_eq!(utf16_offset_to_char_offset("a🎉b", 4), 3);
        assert_eq!(utf16_offset_to_char_offset("a中b", 2), 2);
    }

    #[test]
    fn test_position_to_byte_offset() {
        let text = "needs std.io\r\nio.print(";
        assert_eq!(position_to_byte_offset(text, Position::new(0, 5)), 5);
        assert_eq!(position_to_byte_offset(text, Position::new(1, 9)), text.len());
        assert_eq!(position_to_byte_offset(text, Position::new(1, 50)), text.len());
        assert_eq!(position_to_byte_offset(text, Position::new(7, 0)), text.len());
    }

    #[test]
    fn test_utf16_len() {
        assert_eq!(utf16_len("a🎉b"), 4);
        assert_eq!(utf16_len(""), 0);
    }
}
