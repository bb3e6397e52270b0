use super::types::Position;

pub const COMMENT_OPEN: &str = "(*";
pub const COMMENT_CLOSE: &str = "*)";
pub const QUOTE: &str = "\"";

/// Text of `line` from character column `col` onwards.
pub fn tail(line: &str, col: usize) -> &str {
    match line.char_indices().nth(col) {
        Some((byte, _)) => &line[byte..],
        None => "",
    }
}

/// Character offset of the first occurrence of `pat` in `hay`.
pub fn find_chars(hay: &str, pat: &str) -> Option<usize> {
    hay.find(pat).map(|byte| hay[..byte].chars().count())
}

/// Skip a block closed by `end`, starting just inside it at `from`.
///
/// When `start` is given the block nests: every further `start` must be
/// matched by its own `end`. Returns the position just past the closing
/// delimiter, or `None` when the text runs out first.
pub fn skip_block<L: AsRef<str>>(
    lines: &[L],
    from: Position,
    end: &str,
    start: Option<&str>,
) -> Option<Position> {
    let mut nesting = 1usize;
    let mut pos = from;

    while nesting > 0 {
        let line = lines.get(pos.line)?.as_ref();
        let rest = tail(line, pos.column);

        let close = find_chars(rest, end);
        let open = start.and_then(|s| find_chars(rest, s).map(|at| (at, s)));

        match (close, open) {
            (Some(at), None) => {
                pos.column += at + end.chars().count();
                nesting -= 1;
            }
            (Some(at), Some((open_at, _))) if at < open_at => {
                pos.column += at + end.chars().count();
                nesting -= 1;
            }
            (_, Some((open_at, s))) => {
                pos.column += open_at + s.chars().count();
                nesting += 1;
            }
            (None, None) => {
                pos = Position::new(pos.line + 1, 0);
            }
        }
    }

    Some(pos)
}

/// Skip a (possibly nested) comment whose `(*` ends just before `from`.
pub fn skip_comment<L: AsRef<str>>(lines: &[L], from: Position) -> Option<Position> {
    skip_block(lines, from, COMMENT_CLOSE, Some(COMMENT_OPEN))
}

/// Skip a string literal whose opening quote ends just before `from`.
pub fn skip_string<L: AsRef<str>>(lines: &[L], from: Position) -> Option<Position> {
    skip_block(lines, from, QUOTE, None)
}
