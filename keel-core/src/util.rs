use std::fmt::{self, Display};

/// Writes every value with `f`, putting `separator` between the ones that
/// produced some output.
pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

const TRUNCATE_AT: usize = 497;

/// Shortened rendering of a long SQL text, used in log lines and error context.
pub struct TruncateLong<'a>(&'a str);

pub fn truncate_long(query: &str) -> TruncateLong<'_> {
    TruncateLong(query)
}

impl Display for TruncateLong<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let query = self.0;
        if query.len() <= TRUNCATE_AT {
            return f.write_str(query.trim_end());
        }
        let end = query
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= TRUNCATE_AT)
            .last()
            .unwrap_or(0);
        write!(f, "{}...", query[..end].trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separated_by_skips_empty_items() {
        let mut out = String::from("ORDER BY ");
        separated_by(
            &mut out,
            ["a", "", "b DESC"],
            |out, v| out.push_str(v),
            ", ",
        );
        assert_eq!(out, "ORDER BY a, b DESC");
    }

    #[test]
    fn truncate_long_respects_char_boundaries() {
        let short = "SELECT 1";
        assert_eq!(truncate_long(short).to_string(), "SELECT 1");
        let long = "é".repeat(400);
        let rendered = truncate_long(&long).to_string();
        assert!(rendered.ends_with("..."));
        assert!(rendered.len() <= TRUNCATE_AT + 3);
    }
}
