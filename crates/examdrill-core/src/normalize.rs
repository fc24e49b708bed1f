//! Answer normalization.
//!
//! Canonicalizes answers so that equivalent inputs compare equal: option
//! letters are upper-cased, digit codes `1..4` map to `A..D`, and option
//! sets are sorted.

use crate::model::Answer;

/// Normalize a scalar answer value.
pub fn normalize_scalar(value: &str) -> String {
    let upper = value.trim().to_uppercase();
    match upper.as_str() {
        "1" => "A".to_string(),
        "2" => "B".to_string(),
        "3" => "C".to_string(),
        "4" => "D".to_string(),
        _ => upper,
    }
}

/// Normalize an option set: each element normalized, blanks dropped, sorted
/// and de-duplicated.
pub fn normalize_options<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|v| normalize_scalar(v.as_ref()))
        .filter(|v| !v.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Normalize a possibly absent answer. Absent answers become an empty scalar.
pub fn normalize(answer: Option<&Answer>) -> Answer {
    match answer {
        None => Answer::Single(String::new()),
        Some(Answer::Single(s)) => Answer::Single(normalize_scalar(s)),
        Some(Answer::Multi(v)) => Answer::Multi(normalize_options(v)),
    }
}

/// View any answer as a normalized option set. A scalar becomes a one-element
/// set, or an empty set when blank.
pub fn as_option_set(answer: &Answer) -> Vec<String> {
    match answer {
        Answer::Single(s) => normalize_options(&[s.as_str()]),
        Answer::Multi(v) => normalize_options(v),
    }
}

/// View any answer as a normalized scalar. Sets are joined with commas.
pub fn as_scalar(answer: &Answer) -> String {
    match answer {
        Answer::Single(s) => normalize_scalar(s),
        Answer::Multi(v) => normalize_options(v).join(","),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_letters() {
        assert_eq!(normalize_scalar("b"), "B");
        assert_eq!(normalize_scalar("B"), "B");
        assert_eq!(normalize_scalar("  c "), "C");
    }

    #[test]
    fn digit_codes_map_to_letters() {
        assert_eq!(normalize_scalar("1"), "A");
        assert_eq!(normalize_scalar("2"), "B");
        assert_eq!(normalize_scalar("4"), "D");
        assert_eq!(normalize_scalar("5"), "5");
        assert_eq!(normalize_scalar("12"), "12");
        assert_eq!(normalize_scalar("-2.5"), "-2.5");
    }

    #[test]
    fn absent_answer_is_empty_string() {
        assert_eq!(normalize(None), Answer::Single(String::new()));
    }

    #[test]
    fn option_sets_are_order_independent() {
        let a = normalize(Some(&Answer::multi(["C", "a"])));
        let b = normalize(Some(&Answer::multi(["A", "c"])));
        assert_eq!(a, b);
        assert_eq!(a, Answer::multi(["A", "C"]));
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            Answer::single(" b"),
            Answer::single("3"),
            Answer::single("42"),
            Answer::multi(["d", "1", "", "D"]),
        ];
        for input in &inputs {
            let once = normalize(Some(input));
            let twice = normalize(Some(&once));
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn scalar_and_set_views() {
        assert_eq!(as_option_set(&Answer::single("a")), vec!["A"]);
        assert!(as_option_set(&Answer::single(" ")).is_empty());
        assert_eq!(as_scalar(&Answer::multi(["c", "a"])), "A,C");
    }
}
