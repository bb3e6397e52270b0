use super::types::{CommentSpan, Stripped};

/// Replace every outermost comment in `text` with a single space.
///
/// Nested comments collapse into the span of their outermost comment.
/// String literals are copied through untouched, so `(*` inside quotes is
/// not a comment. Input is assumed to have been accepted by the sentence
/// scanner; a comment left open swallows the rest of the text.
pub fn strip_comments(text: &str) -> Stripped {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut comments = Vec::new();

    let mut nesting = 0usize;
    let mut in_string = false;
    let mut opened_at = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let ch = chars[i];

        if in_string {
            out.push(ch);
            in_string = ch != '"';
            i += 1;
            continue;
        }

        match (ch, chars.get(i + 1).copied()) {
            ('(', Some('*')) => {
                if nesting == 0 {
                    opened_at = i;
                }
                nesting += 1;
                i += 2;
            }
            ('*', Some(')')) if nesting > 0 => {
                nesting -= 1;
                i += 2;
                if nesting == 0 {
                    comments.push(CommentSpan {
                        offset: opened_at,
                        length: i - opened_at,
                    });
                    out.push(' ');
                }
            }
            ('"', _) if nesting == 0 => {
                in_string = true;
                out.push(ch);
                i += 1;
            }
            _ => {
                if nesting == 0 {
                    out.push(ch);
                }
                i += 1;
            }
        }
    }

    if nesting > 0 {
        comments.push(CommentSpan {
            offset: opened_at,
            length: chars.len() - opened_at,
        });
        out.push(' ');
    }

    Stripped {
        text: out,
        comments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_comments() {
        let stripped = strip_comments("intros x y.");
        assert_eq!(stripped.text, "intros x y.");
        assert!(stripped.comments.is_empty());
    }

    #[test]
    fn test_comment_becomes_one_space() {
        let stripped = strip_comments("apply (* the lemma *)foo.");
        assert_eq!(stripped.text, "apply  foo.");
        assert_eq!(
            stripped.comments,
            vec![CommentSpan {
                offset: 6,
                length: 15
            }]
        );
    }

    #[test]
    fn test_nested_comment_records_outermost_only() {
        let stripped = strip_comments("a(* x (* y *) z *)b(*c*)d.");
        assert_eq!(stripped.text, "a b d.");
        assert_eq!(
            stripped.comments,
            vec![
                CommentSpan {
                    offset: 1,
                    length: 17
                },
                CommentSpan {
                    offset: 19,
                    length: 5
                },
            ]
        );
    }

    #[test]
    fn test_trailing_comment_still_leaves_a_space() {
        let stripped = strip_comments("auto. (* done *)");
        assert_eq!(stripped.text, "auto.  ");
        assert_eq!(stripped.comments.len(), 1);
    }

    #[test]
    fn test_comment_markers_in_strings_are_kept() {
        let stripped = strip_comments("Notation \"(*\" := tt (* gone *).");
        assert_eq!(stripped.text, "Notation \"(*\" := tt  .");
        assert_eq!(
            stripped.comments,
            vec![CommentSpan {
                offset: 20,
                length: 10
            }]
        );
    }

    #[test]
    fn test_multiline_comment() {
        let stripped = strip_comments("Lemma x :(* one\ntwo *)\n  True.");
        assert_eq!(stripped.text, "Lemma x : \n  True.");
        assert_eq!(stripped.comments[0].offset, 9);
        assert_eq!(stripped.comments[0].length, 13);
    }

    #[test]
    fn test_length_is_recoverable() {
        let text = "(* a *) b (* (* c *) *) d (* e *).";
        let stripped = strip_comments(text);
        let restored: usize = stripped.text.chars().count()
            + stripped
                .comments
                .iter()
                .map(|c| c.length - 1)
                .sum::<usize>();
        assert_eq!(restored, text.chars().count());
    }
}
