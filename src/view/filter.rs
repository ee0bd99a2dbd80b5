//! Free-text filtering over a row snapshot.
//!
//! Filtering works on row indices so the snapshot itself is never copied or
//! mutated; the result is the list of matching positions in arrival order.

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use rayon::prelude::*;
use tracing::trace;

use super::Record;

/// How the filter text is compared against a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Case-insensitive substring containment.
    #[default]
    Substring,
    /// Case-insensitive subsequence match (skim scoring, score ignored).
    Fuzzy,
}

/// Returns the indices of all rows where at least one of `fields` matches `text`.
///
/// An empty `text` selects every row in its original order. Fields that are
/// missing on a row never match.
pub fn filter<T: Record>(rows: &[T], text: &str, fields: &[&str], mode: MatchMode) -> Vec<usize> {
    if text.is_empty() {
        return (0..rows.len()).collect();
    }

    let needle = fold_case(text);
    let matches: Vec<usize> = match mode {
        MatchMode::Substring => rows
            .par_iter()
            .enumerate()
            .filter(|(_, row)| {
                fields.iter().any(|field| {
                    row.field(field)
                        .search_text()
                        .is_some_and(|hay| fold_case(&hay).contains(&needle))
                })
            })
            .map(|(idx, _)| idx)
            .collect(),
        MatchMode::Fuzzy => {
            let matcher = SkimMatcherV2::default().ignore_case();
            rows.iter()
                .enumerate()
                .filter(|(_, row)| {
                    fields.iter().any(|field| {
                        row.field(field)
                            .search_text()
                            .is_some_and(|hay| matcher.fuzzy_match(&hay, &needle).is_some())
                    })
                })
                .map(|(idx, _)| idx)
                .collect()
        }
    };

    trace!("Filter '{}' matched {}/{} rows", text, matches.len(), rows.len());
    matches
}

/// Lowercases char by char, without the word-final sigma rule of
/// `str::to_lowercase`, so a prefix folds the same as the full text.
fn fold_case(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Value;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    struct Contact {
        id: i64,
        name: String,
        email: Option<String>,
    }

    impl Record for Contact {
        fn id(&self) -> i64 {
            self.id
        }

        fn field(&self, key: &str) -> Value<'_> {
            match key {
                "name" => Value::Text(&self.name),
                "email" => self.email.as_deref().map_or(Value::Null, Value::Text),
                _ => Value::Null,
            }
        }
    }

    fn contacts() -> Vec<Contact> {
        vec![
            Contact { id: 1, name: "Jane Doe".into(), email: Some("jane@example.com".into()) },
            Contact { id: 2, name: "John Smith".into(), email: None },
            Contact { id: 3, name: "Ann Janssen".into(), email: Some("ann@clinic.org".into()) },
        ]
    }

    #[test]
    fn empty_text_selects_everything_in_order() {
        let rows = contacts();
        assert_eq!(filter(&rows, "", &["name"], MatchMode::Substring), vec![0, 1, 2]);
    }

    #[test]
    fn substring_is_case_insensitive_across_fields() {
        let rows = contacts();
        assert_eq!(filter(&rows, "JAN", &["name"], MatchMode::Substring), vec![0, 2]);
        assert_eq!(filter(&rows, "clinic", &["name", "email"], MatchMode::Substring), vec![2]);
    }

    #[test]
    fn missing_fields_do_not_match() {
        let rows = contacts();
        assert_eq!(filter(&rows, "smith", &["email"], MatchMode::Substring), Vec::<usize>::new());
        assert_eq!(filter(&rows, "x", &["unknown"], MatchMode::Substring), Vec::<usize>::new());
    }

    #[test]
    fn sigma_folds_the_same_at_word_end() {
        let rows = vec![Contact { id: 1, name: "ΑΣΑ".into(), email: None }];
        assert_eq!(filter(&rows, "ΑΣ", &["name"], MatchMode::Substring), vec![0]);
        assert_eq!(filter(&rows, "ΑΣΑ", &["name"], MatchMode::Substring), vec![0]);
    }

    #[test]
    fn fuzzy_matches_subsequences() {
        let rows = contacts();
        assert_eq!(filter(&rows, "jdoe", &["name"], MatchMode::Fuzzy), vec![0]);
        assert!(filter(&rows, "zzz", &["name"], MatchMode::Fuzzy).is_empty());
    }

    proptest! {
        #[test]
        fn appending_text_never_grows_the_result(
            names in proptest::collection::vec("[a-dA-D ]{0,8}", 0..30),
            prefix in "[a-d]{0,3}",
            suffix in "[a-d]{1,3}",
        ) {
            let rows: Vec<Contact> = names
                .into_iter()
                .enumerate()
                .map(|(i, name)| Contact { id: i as i64, name, email: None })
                .collect();
            let wide = filter(&rows, &prefix, &["name"], MatchMode::Substring);
            let narrow = filter(&rows, &format!("{prefix}{suffix}"), &["name"], MatchMode::Substring);
            prop_assert!(narrow.iter().all(|idx| wide.contains(idx)));
        }

        #[test]
        fn appending_text_never_grows_the_fuzzy_result(
            names in proptest::collection::vec("[a-dA-D _-]{0,10}", 0..30),
            prefix in "[a-d]{0,3}",
            suffix in "[a-d]{1,3}",
        ) {
            let rows: Vec<Contact> = names
                .into_iter()
                .enumerate()
                .map(|(i, name)| Contact { id: i as i64, name, email: None })
                .collect();
            let wide = filter(&rows, &prefix, &["name"], MatchMode::Fuzzy);
            let narrow = filter(&rows, &format!("{prefix}{suffix}"), &["name"], MatchMode::Fuzzy);
            prop_assert!(narrow.iter().all(|idx| wide.contains(idx)));
        }
    }
}
