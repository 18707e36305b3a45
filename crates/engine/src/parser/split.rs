//! Delimiter-aware splitting shared by every parser.
//!
//! Separators only count at the top level: outside `"..."` / `'...'` quotes and
//! outside parentheses. Inside one quote style the other is an ordinary char.

use super::ParseError;

/// Marks, per byte offset, whether the char starting there sits at top level.
///
/// Quote characters and parentheses themselves are never top level.
fn top_level_mask(input: &str) -> Result<Vec<bool>, ParseError> {
    let mut mask = vec![false; input.len()];
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in input.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| ParseError::UnbalancedDelimiter(input.to_string()))?;
                }
                _ => mask[i] = depth == 0,
            },
        }
    }

    if quote.is_some() || depth != 0 {
        return Err(ParseError::UnbalancedDelimiter(input.to_string()));
    }
    Ok(mask)
}

/// Split on a top-level separator string. Pieces are trimmed; empty pieces dropped.
pub fn split_on<'a>(input: &'a str, sep: &str) -> Result<Vec<&'a str>, ParseError> {
    let mask = top_level_mask(input)?;
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < input.len() {
        if mask[i] && input[i..].starts_with(sep) {
            pieces.push(&input[start..i]);
            i += sep.len();
            start = i;
        } else {
            i += input[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        }
    }
    pieces.push(&input[start..]);

    Ok(pieces
        .into_iter()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect())
}

/// Split on top-level whitespace runs.
pub fn split_whitespace(input: &str) -> Result<Vec<&str>, ParseError> {
    let mask = top_level_mask(input)?;
    let mut pieces = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in input.char_indices() {
        let boundary = mask[i] && c.is_whitespace();
        match (boundary, start) {
            (true, Some(s)) => {
                pieces.push(&input[s..i]);
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        pieces.push(&input[s..]);
    }
    Ok(pieces)
}

/// Byte offset of the first top-level occurrence of `needle`.
pub fn find_top_level(input: &str, needle: &str) -> Result<Option<usize>, ParseError> {
    let mask = top_level_mask(input)?;
    Ok(input
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| mask[i] && input[i..].starts_with(needle)))
}

/// Strip one pair of matching surrounding quotes.
pub fn unquote(input: &str) -> &str {
    let trimmed = input.trim();
    for q in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(q) && trimmed.ends_with(q) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

/// Strip one pair of parentheses if they enclose the whole input.
pub fn strip_parens(input: &str) -> &str {
    let trimmed = input.trim();
    if !(trimmed.starts_with('(') && trimmed.ends_with(')')) {
        return trimmed;
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    // "(a)+(b)" starts and ends with parens but the first one closes early.
    match top_level_mask(inner) {
        Ok(_) => inner.trim(),
        Err(_) => trimmed,
    }
}

/// Unwrap a list item: surrounding quotes, or a fully enclosing paren group.
pub fn unwrap_item(input: &str) -> &str {
    let unquoted = unquote(input);
    if unquoted.len() != input.trim().len() {
        return unquoted;
    }
    strip_parens(unquoted)
}
