use super::types::{CommentSpan, Position, Span};

/// Map offsets into comment-stripped text back onto the original text.
///
/// Each stripped comment left one space behind, so every comment that
/// starts at or before an offset moves it right by `length - 1`. Comment
/// offsets are in original coordinates, so the comparison is made against
/// the offset as adjusted so far; `comments` must be in increasing order.
pub fn adjust_offsets(start: usize, end: usize, comments: &[CommentSpan]) -> (usize, usize) {
    let shift = |offset: usize| {
        comments.iter().fold(offset, |acc, c| {
            if c.offset <= acc {
                acc + c.length.saturating_sub(1)
            } else {
                acc
            }
        })
    };
    (shift(start), shift(end))
}

/// Position of character `offset` in `text`, relative to the text's start.
///
/// The line is a delta from the first line of `text`. `base_column` is the
/// column `text` starts at, and only applies while still on that line.
pub fn position_from_offset(base_column: usize, text: &str, offset: usize) -> Position {
    let prefix: String = text.chars().take(offset).collect();
    let mut lines = prefix.split('\n');
    let line = lines.clone().count() - 1;
    let last = lines.next_back().unwrap_or_default().chars().count();

    let column = if line == 0 { last + base_column } else { last };
    Position::new(line, column)
}

/// Document span of an error the prover reported as `[start, end)` offsets
/// into the stripped text of a sentence beginning at `anchor`.
pub fn error_span(
    anchor: Position,
    text: &str,
    range: (usize, usize),
    comments: &[CommentSpan],
) -> Span {
    let (start, end) = adjust_offsets(range.0, range.1, comments);
    let last = end.max(start + 1) - 1;

    let rel_start = position_from_offset(anchor.column, text, start);
    let rel_stop = position_from_offset(anchor.column, text, last);

    let start = Position::new(anchor.line + rel_start.line, rel_start.column);
    let stop = Position::new(anchor.line + rel_stop.line, rel_stop.column);
    Span::new(start, stop.max(start))
}
