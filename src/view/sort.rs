use std::cmp::Ordering;

use chrono::NaiveDateTime;

use super::{Record, Value};

/// Direction of a column sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

// Pre-computed comparison key, so every row's field is extracted once per sort.
#[derive(Debug, PartialEq)]
enum SortKey {
    Number(f64),
    Chrono(NaiveDateTime),
    Text(String),
    Missing,
}

impl SortKey {
    fn from_value(value: Value<'_>) -> Self {
        match value {
            Value::Number(n) if n.is_nan() => SortKey::Missing,
            Value::Number(n) => SortKey::Number(n),
            Value::Date(d) => SortKey::Chrono(d.and_time(chrono::NaiveTime::MIN)),
            Value::Timestamp(ts) => SortKey::Chrono(ts.naive_utc()),
            Value::Text(s) => SortKey::Text(s.to_lowercase()),
            Value::Null => SortKey::Missing,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Number(_) => 0,
            SortKey::Chrono(_) => 1,
            SortKey::Text(_) => 2,
            SortKey::Missing => 3,
        }
    }

    fn cmp_present(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (SortKey::Chrono(a), SortKey::Chrono(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

fn compare(a: &SortKey, b: &SortKey, direction: SortDirection) -> Ordering {
    match (a, b) {
        (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
        // Missing values stay at the end in both directions
        (SortKey::Missing, _) => Ordering::Greater,
        (_, SortKey::Missing) => Ordering::Less,
        _ => match direction {
            SortDirection::Ascending => a.cmp_present(b),
            SortDirection::Descending => a.cmp_present(b).reverse(),
        },
    }
}

/// Orders `order` (indices into `rows`) by the field `key`.
///
/// Without a key the incoming order is kept. The sort is stable, so rows
/// with equal keys keep their relative arrival order in either direction.
pub fn sort<T: Record>(
    rows: &[T],
    order: &[usize],
    key: Option<&str>,
    direction: SortDirection,
) -> Vec<usize> {
    let Some(key) = key else {
        return order.to_vec();
    };

    let mut keyed: Vec<(usize, SortKey)> = order
        .iter()
        .map(|&idx| (idx, SortKey::from_value(rows[idx].field(key))))
        .collect();
    keyed.sort_by(|(_, a), (_, b)| compare(a, b, direction));
    keyed.into_iter().map(|(idx, _)| idx).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    struct Entry {
        id: i64,
        label: Option<String>,
        score: f64,
        born: Option<NaiveDate>,
    }

    impl Record for Entry {
        fn id(&self) -> i64 {
            self.id
        }

        fn field(&self, key: &str) -> Value<'_> {
            match key {
                "label" => self.label.as_deref().map_or(Value::Null, Value::Text),
                "score" => Value::Number(self.score),
                "born" => self.born.map_or(Value::Null, Value::Date),
                _ => Value::Null,
            }
        }
    }

    fn entry(id: i64, label: Option<&str>, score: f64, born: Option<(i32, u32, u32)>) -> Entry {
        Entry {
            id,
            label: label.map(str::to_string),
            score,
            born: born.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        }
    }

    fn ids(rows: &[Entry], order: &[usize]) -> Vec<i64> {
        order.iter().map(|&idx| rows[idx].id).collect()
    }

    #[test]
    fn no_key_keeps_arrival_order() {
        let rows = vec![entry(3, None, 1.0, None), entry(1, None, 2.0, None)];
        assert_eq!(sort(&rows, &[0, 1], None, SortDirection::Descending), vec![0, 1]);
    }

    #[test]
    fn text_sorts_case_insensitively_with_missing_last() {
        let rows = vec![
            entry(1, Some("bravo"), 0.0, None),
            entry(2, None, 0.0, None),
            entry(3, Some("Alpha"), 0.0, None),
            entry(4, Some("charlie"), 0.0, None),
        ];
        let order = [0, 1, 2, 3];
        assert_eq!(ids(&rows, &sort(&rows, &order, Some("label"), SortDirection::Ascending)), vec![3, 1, 4, 2]);
        assert_eq!(ids(&rows, &sort(&rows, &order, Some("label"), SortDirection::Descending)), vec![4, 1, 3, 2]);
    }

    #[test]
    fn numbers_sort_numerically() {
        let rows = vec![entry(1, None, 10.0, None), entry(2, None, 9.5, None), entry(3, None, 100.0, None)];
        assert_eq!(ids(&rows, &sort(&rows, &[0, 1, 2], Some("score"), SortDirection::Ascending)), vec![2, 1, 3]);
    }

    #[test]
    fn dates_sort_chronologically() {
        let rows = vec![
            entry(1, None, 0.0, Some((1990, 2, 1))),
            entry(2, None, 0.0, Some((1985, 12, 31))),
            entry(3, None, 0.0, None),
            entry(4, None, 0.0, Some((2001, 1, 1))),
        ];
        let order = [0, 1, 2, 3];
        assert_eq!(ids(&rows, &sort(&rows, &order, Some("born"), SortDirection::Ascending)), vec![2, 1, 4, 3]);
        assert_eq!(ids(&rows, &sort(&rows, &order, Some("born"), SortDirection::Descending)), vec![4, 1, 2, 3]);
    }

    #[test]
    fn sorts_only_the_given_subset() {
        let rows = vec![entry(1, None, 3.0, None), entry(2, None, 2.0, None), entry(3, None, 1.0, None)];
        assert_eq!(sort(&rows, &[0, 2], Some("score"), SortDirection::Ascending), vec![2, 0]);
    }

    proptest! {
        #[test]
        fn equal_keys_keep_arrival_order(
            scores in proptest::collection::vec(0u8..4, 0..40),
            descending in any::<bool>(),
        ) {
            let rows: Vec<Entry> = scores
                .iter()
                .enumerate()
                .map(|(i, s)| entry(i as i64, None, f64::from(*s), None))
                .collect();
            let direction = if descending { SortDirection::Descending } else { SortDirection::Ascending };
            let order: Vec<usize> = (0..rows.len()).collect();
            let sorted = sort(&rows, &order, Some("score"), direction);
            for pair in sorted.windows(2) {
                if rows[pair[0]].score == rows[pair[1]].score {
                    prop_assert!(pair[0] < pair[1]);
                }
            }
        }
    }
}
