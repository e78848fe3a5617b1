//
// analysis/scrub.rs
//
// Comment and string-literal scrubbing for the regex scanners
//

/// Replace `//` line comments and the contents of double-quoted string
/// literals with spaces.
///
/// The result has exactly the same byte length as `line`, so byte offsets
/// found in the scrubbed text can be used to slice the original. Quote
/// characters themselves are kept, which keeps `""` visible as an empty
/// literal. An unterminated string literal is left untouched from its opening
/// quote to the end of the line (there is no cross-line string tracking).
pub fn scrub_line(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                blank(&line[i..], &mut out);
                return out;
            }
            b'"' => match closing_quote(bytes, i + 1) {
                Some(end) => {
                    out.push('"');
                    blank(&line[i + 1..end], &mut out);
                    out.push('"');
                    i = end + 1;
                }
                None => {
                    out.push_str(&line[i..]);
                    return out;
                }
            },
            _ => {
                // Copy one whole UTF-8 character.
                let ch_len = line[i..].chars().next().map_or(1, char::len_utf8);
                out.push_str(&line[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    out
}

/// Scrub every line of `text`, keeping the original line terminators.
pub fn scrub_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (body, terminator) = split_terminator(line);
        out.push_str(&scrub_line(body));
        out.push_str(terminator);
    }
    out
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Index of the quote closing a literal whose contents start at `start`.
fn closing_quote(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn blank(segment: &str, out: &mut String) {
    out.extend(std::iter::repeat(' ').take(segment.len()));
}
