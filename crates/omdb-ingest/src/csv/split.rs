// Field splitter for the OMDb dump dialect
//
// Not RFC 4180. Double quotes toggle a quoted section and are never part of
// the value; a backslash always starts a two-character escape.

use crate::error::ParseError;

/// Split one logical line into its comma-separated fields.
///
/// - `,` ends a field, unless inside quotes where it is kept as-is
/// - `"` toggles quote mode and is dropped; `\"` yields a literal quote
/// - `\n` and `\t` decode to newline and tab; `\,` `\"` `\\` to the
///   escaped character; any other escape is kept verbatim (`\N` stays `\N`)
/// - the text after the last separator is always a field, so `""` splits
///   into one empty field
pub fn split_line(line: &str) -> Result<Vec<String>, ParseError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            '\\' => match chars.next().ok_or(ParseError::UnexpectedEof)? {
                'n' => field.push('\n'),
                't' => field.push('\t'),
                escaped @ (',' | '"' | '\\') => field.push(escaped),
                other => {
                    field.push('\\');
                    field.push(other);
                },
            },
            c => field.push(c),
        }
    }

    if in_quotes {
        return Err(ParseError::UnterminatedQuote);
    }

    fields.push(field);
    Ok(fields)
}
