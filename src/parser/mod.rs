mod blocks;
mod comments;
mod offsets;
mod sentences;
mod types;

pub use blocks::{skip_block, skip_comment, skip_string};
pub use comments::strip_comments;
pub use offsets::{adjust_offsets, error_span, position_from_offset};
pub use sentences::{between, next_sentence, read_sentence, scan_sentence};
pub use types::{CommentSpan, Position, Sentence, Span, Stripped};
