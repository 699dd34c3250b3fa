// src/pipeline/aggregator.rs - Generic group-by over typed records
//
// Callers decide which records take part (filter before calling) and how
// rows are ordered afterwards. The aggregator itself never drops a record:
// every record lands in exactly one group, and a key equal to the unknown
// marker is just another group.
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Reducer {
    Count,
    Sum,
    Mean,
}

impl Reducer {
    pub fn suffix(&self) -> &'static str {
        match self {
            Reducer::Count => "count",
            Reducer::Sum => "sum",
            Reducer::Mean => "mean",
        }
    }
}

/// Reads one numeric field from a record.
pub type FieldFn<T> = fn(&T) -> f64;

/// A (field, reducer) pair requested from the aggregator.
pub struct Measure<T> {
    pub field: &'static str,
    pub reducer: Reducer,
    pub value: FieldFn<T>,
}

impl<T> Measure<T> {
    pub fn count(field: &'static str) -> Self {
        Self {
            field,
            reducer: Reducer::Count,
            value: |_| 0.0,
        }
    }

    pub fn sum(field: &'static str, value: FieldFn<T>) -> Self {
        Self {
            field,
            reducer: Reducer::Sum,
            value,
        }
    }

    pub fn mean(field: &'static str, value: FieldFn<T>) -> Self {
        Self {
            field,
            reducer: Reducer::Mean,
            value,
        }
    }

    fn column(&self) -> String {
        column_name(self.field, self.reducer)
    }
}

fn column_name(field: &str, reducer: Reducer) -> String {
    format!("{}_{}", field, reducer.suffix())
}

/// One output row: the group key, its record count, and the requested
/// aggregates keyed by `<field>_<reducer>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAggregate<K> {
    pub key: K,
    pub count: usize,
    pub values: BTreeMap<String, f64>,
}

impl<K> GroupAggregate<K> {
    pub fn value(&self, field: &str, reducer: Reducer) -> Option<f64> {
        self.values.get(&column_name(field, reducer)).copied()
    }

    /// Sum of `field`; 0 when the sum was not requested.
    pub fn sum(&self, field: &str) -> f64 {
        self.value(field, Reducer::Sum).unwrap_or(0.0)
    }

    /// Mean of `field`; 0 when the mean was not requested.
    pub fn mean(&self, field: &str) -> f64 {
        self.value(field, Reducer::Mean).unwrap_or(0.0)
    }
}

/// Groups `records` by `key_fn` and reduces every measure per group.
/// Rows come back in the key's natural order. Keys may borrow from the
/// records for as long as the records are borrowed.
pub fn aggregate<'r, T, K, F, I>(
    records: I,
    key_fn: F,
    measures: &[Measure<T>],
) -> Vec<GroupAggregate<K>>
where
    T: 'r,
    K: Ord,
    F: Fn(&'r T) -> K,
    I: IntoIterator<Item = &'r T>,
{
    let mut groups: BTreeMap<K, (usize, Vec<f64>)> = BTreeMap::new();
    for record in records {
        let (count, sums) = groups
            .entry(key_fn(record))
            .or_insert_with(|| (0, vec![0.0; measures.len()]));
        *count += 1;
        for (slot, measure) in sums.iter_mut().zip(measures) {
            if measure.reducer != Reducer::Count {
                *slot += (measure.value)(record);
            }
        }
    }

    groups
        .into_iter()
        .map(|(key, (count, sums))| {
            // count >= 1 for every observed key, so the mean is defined
            let values = measures
                .iter()
                .zip(sums)
                .map(|(measure, sum)| {
                    let value = match measure.reducer {
                        Reducer::Count => count as f64,
                        Reducer::Sum => sum,
                        Reducer::Mean => sum / count as f64,
                    };
                    (measure.column(), value)
                })
                .collect();
            GroupAggregate { key, count, values }
        })
        .collect()
}

/// Total records across all groups.
pub fn total_count<K>(groups: &[GroupAggregate<K>]) -> usize {
    groups.iter().map(|g| g.count).sum()
}

/// Sum of one aggregate column across groups.
pub fn column_total<K>(groups: &[GroupAggregate<K>], field: &str) -> f64 {
    groups.iter().map(|g| g.sum(field)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        city: &'static str,
        gender: &'static str,
        holdings: f64,
    }

    fn holdings(r: &Row) -> f64 {
        r.holdings
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                city: "Pune",
                gender: "M",
                holdings: 10.0,
            },
            Row {
                city: "Delhi",
                gender: "F",
                holdings: 3.0,
            },
            Row {
                city: "Pune",
                gender: "F",
                holdings: 5.0,
            },
            Row {
                city: "unknown",
                gender: "M",
                holdings: 1.0,
            },
            Row {
                city: "Pune",
                gender: "M",
                holdings: 0.5,
            },
        ]
    }

    fn measures() -> Vec<Measure<Row>> {
        vec![
            Measure::count("holdings"),
            Measure::sum("holdings", holdings),
            Measure::mean("holdings", holdings),
        ]
    }

    #[test]
    fn test_groups_partition_the_input() {
        let data = rows();
        let groups = aggregate(&data, |r| r.city, &measures());
        assert_eq!(total_count(&groups), data.len());
        let keys: Vec<&str> = groups.iter().map(|g| g.key).collect();
        // natural key order, unknown marker kept as its own group
        assert_eq!(keys, vec!["Delhi", "Pune", "unknown"]);
    }

    #[test]
    fn test_mean_times_count_equals_sum() {
        let data = rows();
        for g in aggregate(&data, |r| r.city, &measures()) {
            let reconstructed = g.mean("holdings") * g.count as f64;
            assert!((reconstructed - g.sum("holdings")).abs() < 1e-9);
            assert_eq!(g.value("holdings", Reducer::Count), Some(g.count as f64));
        }
    }

    #[test]
    fn test_composite_keys() {
        let data = rows();
        let groups = aggregate(&data, |r| (r.gender, r.city), &measures());
        let pune_m = groups.iter().find(|g| g.key == ("M", "Pune")).unwrap();
        assert_eq!(pune_m.count, 2);
        assert!((pune_m.sum("holdings") - 10.5).abs() < 1e-9);
        assert_eq!(total_count(&groups), 5);
    }

    #[test]
    fn test_prefiltered_input_and_missing_reducers() {
        let data = rows();
        let only_sum = vec![Measure::sum("holdings", holdings)];
        let groups = aggregate(data.iter().filter(|r| r.city != "unknown"), |r| r.city, &only_sum);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].value("holdings", Reducer::Mean), None);
        assert_eq!(groups[0].mean("holdings"), 0.0);
        assert!((column_total(&groups, "holdings") - 18.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        let data: Vec<Row> = Vec::new();
        assert!(aggregate(&data, |r| r.city, &measures()).is_empty());
    }
}
