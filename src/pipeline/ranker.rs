// src/pipeline/ranker.rs - Secondary metrics and top-N ordering over groups
use anyhow::{bail, Result};
use serde::Serialize;
use std::cmp::Ordering;

use super::aggregator::GroupAggregate;

const WEIGHT_TOTAL: f64 = 100.0;
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// `numerator / denominator * 100`; 0 when undefined.
pub fn rate(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite_or_zero(numerator / denominator * 100.0)
}

/// `sum / count`; 0 for an empty count.
pub fn per_unit(sum: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    finite_or_zero(sum / count as f64)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Groups with at least `min_count` members.
pub fn min_support<K>(groups: &[GroupAggregate<K>], min_count: usize) -> Vec<&GroupAggregate<K>> {
    groups.iter().filter(|g| g.count >= min_count).collect()
}

/// A group paired with the metric it was ranked on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<'g, K> {
    pub group: &'g GroupAggregate<K>,
    pub metric: f64,
}

/// Stable sort descending by metric, ties by key order, truncated to `n`.
pub fn rank<K: Ord>(
    mut ranked: Vec<Ranked<'_, K>>,
    n: usize,
) -> Vec<Ranked<'_, K>> {
    ranked.sort_by(|a, b| {
        by_metric_desc(a.metric, b.metric).then_with(|| a.group.key.cmp(&b.group.key))
    });
    ranked.truncate(n);
    ranked
}

/// Ranks `groups` by `metric` and keeps the first `n`.
pub fn top_n_by<'g, K, F, I>(groups: I, metric: F, n: usize) -> Vec<Ranked<'g, K>>
where
    K: Ord + 'g,
    F: Fn(&GroupAggregate<K>) -> f64,
    I: IntoIterator<Item = &'g GroupAggregate<K>>,
{
    let ranked = groups
        .into_iter()
        .map(|group| Ranked {
            metric: finite_or_zero(metric(group)),
            group,
        })
        .collect();
    rank(ranked, n)
}

/// How a score term is brought onto a 0..=1 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TermScale {
    /// Divided by the largest value of the term among the scored groups.
    RelativeToMax,
    /// Already a percentage; divided by 100.
    Percent,
}

/// One weighted component of a composite score.
pub struct ScoreTerm<K> {
    pub weight: f64,
    pub scale: TermScale,
    pub value: fn(&GroupAggregate<K>) -> f64,
}

/// Weights must add up to 100 so that scores stay on a 0..=100 scale.
pub fn validate_weights(weights: &[f64]) -> Result<()> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        bail!("score weights must be non-negative numbers: {:?}", weights);
    }
    let total: f64 = weights.iter().sum();
    if (total - WEIGHT_TOTAL).abs() > WEIGHT_TOLERANCE {
        bail!("score weights must sum to {}, got {}", WEIGHT_TOTAL, total);
    }
    Ok(())
}

/// Weighted sum of normalized terms per group. A term whose maximum is not
/// positive contributes 0 for every group.
pub fn composite_scores<'g, K>(
    groups: &[&'g GroupAggregate<K>],
    terms: &[ScoreTerm<K>],
) -> Vec<Ranked<'g, K>> {
    let maxima: Vec<f64> = terms
        .iter()
        .map(|term| {
            groups
                .iter()
                .map(|g| finite_or_zero((term.value)(g)))
                .fold(0.0, f64::max)
        })
        .collect();

    groups
        .iter()
        .map(|group| {
            let metric = terms
                .iter()
                .zip(&maxima)
                .map(|(term, max)| {
                    let raw = finite_or_zero((term.value)(group));
                    let normalized = match term.scale {
                        TermScale::RelativeToMax if *max > 0.0 => raw / max,
                        TermScale::RelativeToMax => 0.0,
                        TermScale::Percent => raw / 100.0,
                    };
                    term.weight * normalized.clamp(0.0, 1.0)
                })
                .sum();
            Ranked { group, metric }
        })
        .collect()
}

/// Top-N over arbitrary records rather than groups: descending by `metric`,
/// ties by `key`, equal keys keep input order.
pub fn top_n_records<'t, T, K, KF, MF, I>(
    items: I,
    key: KF,
    metric: MF,
    n: usize,
) -> Vec<(&'t T, f64)>
where
    T: 't,
    K: Ord,
    KF: Fn(&T) -> K,
    MF: Fn(&T) -> f64,
    I: IntoIterator<Item = &'t T>,
{
    let mut scored: Vec<(&'t T, f64)> = items
        .into_iter()
        .map(|item| (item, finite_or_zero(metric(item))))
        .collect();
    scored.sort_by(|a, b| by_metric_desc(a.1, b.1).then_with(|| key(a.0).cmp(&key(b.0))));
    scored.truncate(n);
    scored
}

fn by_metric_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
