/// Concatenates `texts` in order, `separator` between consecutive texts, and
/// cuts the result at `char_budget` characters. Separators count toward the
/// budget; a character is never split.
pub fn assemble_context<I, S>(texts: I, separator: &str, char_budget: usize) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    let mut remaining = char_budget;
    for (i, text) in texts.into_iter().enumerate() {
        if remaining == 0 {
            break;
        }
        if i > 0 {
            remaining -= push_chars(&mut out, separator, remaining);
        }
        remaining -= push_chars(&mut out, text.as_ref(), remaining);
    }
    out
}

/// Appends at most `limit` chars of `s`, returns how many were appended.
fn push_chars(out: &mut String, s: &str, limit: usize) -> usize {
    let mut n = 0;
    for c in s.chars().take(limit) {
        out.push(c);
        n += 1;
    }
    n
}
