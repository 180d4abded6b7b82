//! Domain helpers referenced by [`Config`](crate::Config) — a tokenizer and
//! a number-stripper. These are thin utilities for collaborator
//! transformers to use; they are not part of the core algorithm's tested
//! surface.

/// Splits `input` on any of the `special` separator strings, dropping empty
/// tokens.
///
/// # Examples
///
/// ```rust
/// use namestream::helpers::split_on_special;
///
/// let tokens = split_on_special("foo-bar_baz", &[".".into(), "-".into(), "_".into()]);
/// assert_eq!(tokens, vec!["foo", "bar", "baz"]);
/// ```
pub fn split_on_special(input: &str, special: &[String]) -> Vec<String> {
    if special.is_empty() {
        return vec![input.to_string()];
    }

    let mut tokens = vec![input.to_string()];
    for sep in special {
        if sep.is_empty() {
            continue;
        }
        tokens = tokens
            .into_iter()
            .flat_map(|t| t.split(sep.as_str()).map(str::to_string).collect::<Vec<_>>())
            .collect();
    }
    tokens.into_iter().filter(|t| !t.is_empty()).collect()
}

/// Partitions `input` into its non-digit characters and its ASCII-digit
/// characters, each in their original relative order, e.g.
/// `"go4pher2"` -> `("gopher", "42")`. Digits are not required to be
/// trailing or contiguous; every character lands in one builder or the
/// other based solely on `is_ascii_digit`.
///
/// # Examples
///
/// ```rust
/// use namestream::helpers::strip_numbers;
///
/// assert_eq!(strip_numbers("gopher42"), ("gopher".to_string(), "42".to_string()));
/// assert_eq!(strip_numbers("gopher"), ("gopher".to_string(), String::new()));
/// assert_eq!(strip_numbers("go4pher2"), ("gopher".to_string(), "42".to_string()));
/// ```
pub fn strip_numbers(input: &str) -> (String, String) {
    let mut letters = String::new();
    let mut digits = String::new();

    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            letters.push(c);
        }
    }

    (letters, digits)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn split_on_special_drops_empty_tokens() {
        let tokens = split_on_special("a..b", &[".".to_string()]);
        assert_eq!(tokens, vec!["a", "b"]);
    }

    #[test]
    fn split_on_special_with_no_separators_returns_whole_input() {
        let tokens = split_on_special("abc", &[]);
        assert_eq!(tokens, vec!["abc"]);
    }

    #[test]
    fn strip_numbers_separates_trailing_digits() {
        assert_eq!(strip_numbers("gopher42"), ("gopher".to_string(), "42".to_string()));
    }

    #[test]
    fn strip_numbers_with_no_digits_returns_empty_suffix() {
        assert_eq!(strip_numbers("gopher"), ("gopher".to_string(), String::new()));
    }

    #[test]
    fn strip_numbers_all_digits() {
        assert_eq!(strip_numbers("123"), (String::new(), "123".to_string()));
    }

    #[test]
    fn strip_numbers_partitions_interior_digits() {
        assert_eq!(strip_numbers("go4pher2"), ("gopher".to_string(), "42".to_string()));
        assert_eq!(strip_numbers("a1b"), ("ab".to_string(), "1".to_string()));
    }
}
