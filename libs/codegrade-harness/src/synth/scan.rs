//! Lexical helpers shared by the language strategies.
//!
//! Nothing here understands a grammar; these routines only know enough about
//! string literals and comments to keep braces, commas and identifiers inside
//! them from being mistaken for code.

use codegrade_common::types::Language;

/// Replace the contents of string/char literals and comments with spaces.
/// Byte offsets (and line structure) of the result match the input.
pub fn mask_literals(code: &str, language: Language) -> String {
    let bytes = code.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match language {
            Language::Python if c == b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
                continue;
            }
            Language::Java if c == b'/' && bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
                continue;
            }
            Language::Java if c == b'/' && bytes.get(i + 1) == Some(&b'*') => {
                let end = find_block_comment_end(bytes, i + 2);
                blank(&mut out, i, end);
                i = end;
                continue;
            }
            _ => {}
        }

        if c == b'"' || c == b'\'' {
            let end = skip_quoted(bytes, i, language);
            // keep the delimiting quotes, blank what is between them
            let inner_end = if end > i + 1 && bytes[end - 1] == c { end - 1 } else { end };
            blank(&mut out, i + 1, inner_end);
            i = end;
            continue;
        }

        i += 1;
    }

    // only bytes inside literals and comments were swapped for ASCII spaces
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Index of the brace matching the `{` at `open`, ignoring braces inside
/// literals and comments.
pub fn matching_brace(code: &str, open: usize, language: Language) -> Option<usize> {
    matching_pair(code, open, language, (b'{', b'}'))
}

/// Same as [`matching_brace`] for a `(` at `open`
pub fn matching_paren(code: &str, open: usize, language: Language) -> Option<usize> {
    matching_pair(code, open, language, (b'(', b')'))
}

fn matching_pair(
    code: &str,
    open: usize,
    language: Language,
    (opener, closer): (u8, u8),
) -> Option<usize> {
    let bytes = code.as_bytes();
    if bytes.get(open) != Some(&opener) {
        return None;
    }

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if language == Language::Java && bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if language == Language::Java && bytes.get(i + 1) == Some(&b'*') => {
                i = find_block_comment_end(bytes, i + 2);
                continue;
            }
            b'#' if language == Language::Python => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'"' | b'\'' => {
                i = skip_quoted(bytes, i, language);
                continue;
            }
            b if b == opener => depth += 1,
            b if b == closer => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split on commas that are not nested in brackets, braces, parens or generics
pub fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in text.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' | '{' | '<' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' | '>' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth <= 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Width in bytes of the leading spaces and tabs of a line
pub fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// Strip the common leading spaces and tabs of all non-blank lines
pub fn dedent(code: &str) -> String {
    let margin = code
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(indent_width)
        .min()
        .unwrap_or(0);

    code.lines()
        .map(|l| if l.trim().is_empty() { "" } else { &l[margin..] })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prefix every non-blank line with `width` spaces
pub fn indent(code: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    code.lines()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, l)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop blank lines at both ends, keeping interior structure
pub fn trim_blank_lines(code: &str) -> &str {
    let start = code
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| code[..i].rfind('\n').map(|n| n + 1).unwrap_or(0))
        .unwrap_or(code.len());
    code[start..].trim_end()
}

/// Substitute `placeholder` with `code`. When the placeholder sits alone after
/// indentation, every line of `code` gets that indentation.
pub fn replace_placeholder(template: &str, placeholder: &str, code: &str) -> String {
    let Some(pos) = template.find(placeholder) else {
        return template.to_string();
    };

    let line_start = template[..pos].rfind('\n').map(|n| n + 1).unwrap_or(0);
    let lead = &template[line_start..pos];
    let replacement = if lead.trim().is_empty() && !lead.is_empty() {
        dedent(trim_blank_lines(code))
            .lines()
            .map(|l| {
                if l.trim().is_empty() {
                    String::new()
                } else {
                    format!("{}{}", lead, l)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim_start()
            .to_string()
    } else {
        code.to_string()
    };

    let mut out = String::with_capacity(template.len() + code.len());
    out.push_str(&template[..pos]);
    out.push_str(&replacement);
    out.push_str(&template[pos + placeholder.len()..]);
    out
}

fn blank(out: &mut [u8], from: usize, to: usize) {
    for b in out.iter_mut().take(to).skip(from) {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

fn find_block_comment_end(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// Index just past the literal opening at `start`
fn skip_quoted(bytes: &[u8], start: usize, language: Language) -> usize {
    let quote = bytes[start];

    // Python triple-quoted strings and Java text blocks
    let triple = bytes.get(start + 1) == Some(&quote) && bytes.get(start + 2) == Some(&quote);
    if triple && (language == Language::Python || quote == b'"') {
        let mut i = start + 3;
        while i + 2 < bytes.len() {
            if bytes[i] == b'\\' {
                i += 2;
                continue;
            }
            if bytes[i] == quote && bytes[i + 1] == quote && bytes[i + 2] == quote {
                return i + 3;
            }
            i += 1;
        }
        return bytes.len();
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}
