//! Single-Pass Clusterer
//!
//! Greedy, order-dependent grouping of raw patterns around running
//! representatives. Every pattern is assigned exactly once.

use tracing::debug;

use crate::pattern::{Pattern, RawPattern, ScoredPattern};

/// A group of raw patterns and the average of its current members
#[derive(Debug, Clone)]
pub struct Cluster {
    members: Vec<RawPattern>,
    representative: Pattern,
}

impl Cluster {
    fn singleton(member: RawPattern) -> Self {
        let representative = member.pattern.clone();
        Self {
            members: vec![member],
            representative,
        }
    }

    fn push(&mut self, member: RawPattern) {
        self.members.push(member);
        if let Some(avg) = Pattern::average(self.members.iter().map(|m| &m.pattern)) {
            self.representative = avg;
        }
    }

    pub fn members(&self) -> &[RawPattern] {
        &self.members
    }

    pub fn representative(&self) -> &Pattern {
        &self.representative
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn into_members(self) -> Vec<RawPattern> {
        self.members
    }
}

/// Single forward pass clustering with a fixed similarity threshold
#[derive(Debug, Clone, Copy)]
pub struct SinglePassClusterer {
    threshold: f64,
}

impl SinglePassClusterer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Assign each pattern, in input order, to the cluster whose current
    /// representative matches it best, or open a new cluster when the best
    /// match is below the threshold. Ties go to the earliest cluster.
    /// Only clusters with the same anchor tags are candidates.
    pub fn cluster(&self, patterns: Vec<RawPattern>) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();

        for pattern in patterns {
            let mut best: Option<(usize, f64)> = None;
            for (idx, cluster) in clusters.iter().enumerate() {
                if !cluster.representative.matching_tags(&pattern.pattern) {
                    continue;
                }
                let score = cluster.representative.similarity(&pattern.pattern);
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((idx, score));
                }
            }

            match best {
                Some((idx, score)) if score >= self.threshold => clusters[idx].push(pattern),
                _ => clusters.push(Cluster::singleton(pattern)),
            }
        }

        debug!(
            "Clustered into {} clusters (threshold {})",
            clusters.len(),
            self.threshold
        );
        clusters
    }
}

/// Convert every cluster with at least `min_support` members into a scored
/// pattern with `pos = members`, `neg = 0`, `old_conf = 1.0`
pub fn scored_patterns(
    clusters: Vec<Cluster>,
    min_support: usize,
    update_factor: f64,
) -> Vec<ScoredPattern> {
    clusters
        .into_iter()
        .filter(|c| c.len() >= min_support)
        .filter_map(|c| ScoredPattern::new(c.into_members(), update_factor))
        .collect()
}
