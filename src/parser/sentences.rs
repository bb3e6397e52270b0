use super::blocks::{
    find_chars, skip_comment, skip_string, tail, COMMENT_CLOSE, COMMENT_OPEN, QUOTE,
};
use super::types::{Position, Sentence, Span};
use crate::error::{ScanError, ScanResult};

/// Characters that form a sentence on their own. Only the last three may
/// repeat as a single token.
const BULLETS: [char; 5] = ['{', '}', '-', '+', '*'];

#[derive(Debug, Clone, Copy)]
enum Opaque {
    Comment,
    String,
}

impl Opaque {
    fn open_len(self) -> usize {
        match self {
            Opaque::Comment => COMMENT_OPEN.len(),
            Opaque::String => QUOTE.len(),
        }
    }
}

/// Find the next sentence after `after`.
///
/// Leading whitespace and comments are not part of the sentence, so the
/// returned span starts at its first significant character and stops at
/// its terminator (or the last character of a bullet). `Ok(None)` means
/// nothing but whitespace, comments or an unterminated sentence remains.
pub fn scan_sentence<L: AsRef<str>>(lines: &[L], after: Position) -> ScanResult<Option<Span>> {
    let mut pos = after;

    let start = loop {
        let Some(found) = skip_whitespace(lines, pos) else {
            return Ok(None);
        };
        let rest = tail(lines[found.line].as_ref(), found.column);

        if rest.starts_with(COMMENT_OPEN) {
            let inner = Position::new(found.line, found.column + COMMENT_OPEN.len());
            pos = skip_comment(lines, inner).ok_or(ScanError::UnmatchedComment { at: found })?;
        } else if rest.starts_with(COMMENT_CLOSE) {
            return Err(ScanError::UnmatchedCommentClose { at: found });
        } else {
            break found;
        }
    };

    let rest = tail(lines[start.line].as_ref(), start.column);
    let mut chars = rest.chars();
    if let Some(first) = chars.next().filter(|c| BULLETS.contains(c)) {
        let mut stop = start;
        if matches!(first, '-' | '+' | '*') {
            stop.column += chars.take_while(|&c| c == first).count();
        }
        return Ok(Some(Span::new(start, stop)));
    }

    Ok(find_terminator(lines, start)?.map(|stop| Span::new(start, stop)))
}

/// `scan_sentence` with scan failures folded into `None`.
pub fn next_sentence<L: AsRef<str>>(lines: &[L], after: Position) -> Option<Span> {
    scan_sentence(lines, after).ok().flatten()
}

/// Scan the next sentence and capture its text.
pub fn read_sentence<L: AsRef<str>>(lines: &[L], after: Position) -> ScanResult<Option<Sentence>> {
    Ok(scan_sentence(lines, after)?.map(|span| {
        let text = between(lines, span);
        let bullet = text.starts_with(&BULLETS[..]);
        Sentence { span, text, bullet }
    }))
}

/// Text covered by `span`, including its stop character.
pub fn between<L: AsRef<str>>(lines: &[L], span: Span) -> String {
    let last = span.stop.line.min(lines.len().saturating_sub(1));
    let mut out: Vec<String> = Vec::new();

    for (idx, line) in lines.iter().enumerate().take(last + 1).skip(span.start.line) {
        let line = line.as_ref();
        let from = if idx == span.start.line { span.start.column } else { 0 };
        let piece: String = if idx == span.stop.line {
            line.chars()
                .skip(from)
                .take((span.stop.column + 1).saturating_sub(from))
                .collect()
        } else {
            line.chars().skip(from).collect()
        };
        out.push(piece);
    }

    out.join("\n")
}

fn skip_whitespace<L: AsRef<str>>(lines: &[L], from: Position) -> Option<Position> {
    let mut pos = from;
    while let Some(line) = lines.get(pos.line) {
        let rest = tail(line.as_ref(), pos.column);
        if let Some(offset) = rest.chars().position(|c| !c.is_whitespace()) {
            return Some(Position::new(pos.line, pos.column + offset));
        }
        pos = Position::new(pos.line + 1, 0);
    }
    None
}

/// Find the `.` ending the sentence that starts at `from`. Comments and
/// strings are skipped whole; a `.` inside a qualified name or a `..` does
/// not end a sentence, but `...` does (at its third dot).
fn find_terminator<L: AsRef<str>>(lines: &[L], from: Position) -> ScanResult<Option<Position>> {
    let mut pos = from;

    while let Some(line) = lines.get(pos.line) {
        let rest = tail(line.as_ref(), pos.column);
        let dot = find_chars(rest, ".");
        let comment = find_chars(rest, COMMENT_OPEN);
        let quote = find_chars(rest, QUOTE);

        if let Some(close) = find_chars(rest, COMMENT_CLOSE) {
            let stray = [comment, quote, dot].iter().flatten().all(|&other| close < other);
            if stray {
                return Err(ScanError::UnmatchedCommentClose {
                    at: Position::new(pos.line, pos.column + close),
                });
            }
        }

        let opaque = [
            comment.map(|at| (at, Opaque::Comment)),
            quote.map(|at| (at, Opaque::String)),
        ]
        .into_iter()
        .flatten()
        .min_by_key(|(at, _)| *at)
        .filter(|(at, _)| dot.map_or(true, |d| *at < d));

        if let Some((at, kind)) = opaque {
            let open = Position::new(pos.line, pos.column + at);
            let inner = Position::new(open.line, open.column + kind.open_len());
            pos = match kind {
                Opaque::Comment => {
                    skip_comment(lines, inner).ok_or(ScanError::UnmatchedComment { at: open })?
                }
                Opaque::String => {
                    skip_string(lines, inner).ok_or(ScanError::UnterminatedString { at: open })?
                }
            };
            continue;
        }

        let Some(d) = dot else {
            pos = Position::new(pos.line + 1, 0);
            continue;
        };

        let ahead: Vec<char> = rest.chars().skip(d).take(3).collect();
        match ahead.as_slice() {
            ['.'] => return Ok(Some(Position::new(pos.line, pos.column + d))),
            ['.', c, ..] if c.is_whitespace() => {
                return Ok(Some(Position::new(pos.line, pos.column + d)))
            }
            ['.', '.', '.'] => return Ok(Some(Position::new(pos.line, pos.column + d + 2))),
            ['.', '.', ..] => pos.column += d + 2,
            _ => pos.column += d + 1,
        }
    }

    Ok(None)
}
