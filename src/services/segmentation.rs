use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use super::statistics::{mean, population_std};
use super::table::Table;
use crate::error::AnalyticsError;

/// Labels handed out by cluster size rank, largest first. They are cosmetic:
/// nothing ties a label to what the cluster centroid looks like.
pub const SEGMENT_LABELS: [&str; 4] = ["High Value", "Medium Value", "Growing", "At Risk"];
pub const ALGORITHM: &str = "K-Means++";
const MAX_FEATURES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationResult {
    pub success: bool,
    /// Cluster sizes, largest first.
    pub segments: Vec<usize>,
    pub labels: Vec<String>,
    pub percentages: Vec<f64>,
    pub algorithm: String,
    pub features_used: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeans {
    pub n_clusters: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        Self {
            n_clusters,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub inertia: f64,
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(point, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

impl KMeans {
    /// Runs `n_init` seeded k-means++ initialisations and keeps the fit with
    /// the lowest inertia. Requires at least `n_clusters` points; every
    /// cluster of the result is non-empty.
    pub fn fit(&self, points: &[Vec<f64>]) -> Result<KMeansFit, AnalyticsError> {
        if self.n_clusters == 0 {
            return Err(AnalyticsError::validation("n_clusters must be at least 1"));
        }
        if points.len() < self.n_clusters {
            return Err(AnalyticsError::insufficient(format!(
                "Insufficient data points for {} clusters",
                self.n_clusters
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;

        for run in 0..self.n_init.max(1) {
            let fit = self.fit_once(points, &mut rng);
            debug!("k-means run {} inertia {:.4}", run, fit.inertia);
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        best.ok_or_else(|| AnalyticsError::insufficient("k-means produced no fit"))
    }

    fn init_centroids(&self, points: &[Vec<f64>], rng: &mut StdRng) -> Vec<Vec<f64>> {
        let mut centroids = Vec::with_capacity(self.n_clusters);
        centroids.push(points[rng.gen_range(0..points.len())].clone());

        while centroids.len() < self.n_clusters {
            let weights: Vec<f64> = points.iter().map(|p| nearest(p, &centroids).1).collect();
            let total: f64 = weights.iter().sum();

            let next = if total > 0.0 {
                let target = rng.gen::<f64>() * total;
                let mut cumulative = 0.0;
                weights
                    .iter()
                    .position(|w| {
                        cumulative += w;
                        cumulative >= target
                    })
                    .unwrap_or(points.len() - 1)
            } else {
                // every point already coincides with a centroid
                rng.gen_range(0..points.len())
            };
            centroids.push(points[next].clone());
        }
        centroids
    }

    fn fit_once(&self, points: &[Vec<f64>], rng: &mut StdRng) -> KMeansFit {
        let dims = points[0].len();
        let mut centroids = self.init_centroids(points, rng);
        let mut labels = vec![0usize; points.len()];

        for _ in 0..self.max_iter {
            for (label, point) in labels.iter_mut().zip(points) {
                *label = nearest(point, &centroids).0;
            }
            self.fill_empty_clusters(points, &centroids, &mut labels);

            let mut sums = vec![vec![0.0; dims]; self.n_clusters];
            let mut counts = vec![0usize; self.n_clusters];
            for (point, &label) in points.iter().zip(&labels) {
                counts[label] += 1;
                for (s, x) in sums[label].iter_mut().zip(point) {
                    *s += x;
                }
            }

            let mut shift = 0.0;
            for (k, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
                let updated: Vec<f64> = sum.into_iter().map(|s| s / count.max(1) as f64).collect();
                shift += squared_distance(&centroids[k], &updated);
                centroids[k] = updated;
            }

            if shift <= self.tolerance {
                break;
            }
        }

        let inertia: f64 = points
            .iter()
            .zip(&labels)
            .map(|(p, &l)| squared_distance(p, &centroids[l]))
            .sum();

        KMeansFit { labels, inertia }
    }

    /// Moves the point farthest from its centroid into each empty cluster,
    /// taking only from clusters that keep at least one member.
    fn fill_empty_clusters(&self, points: &[Vec<f64>], centroids: &[Vec<f64>], labels: &mut [usize]) {
        let mut counts = vec![0usize; self.n_clusters];
        for &l in labels.iter() {
            counts[l] += 1;
        }

        for empty in 0..self.n_clusters {
            if counts[empty] > 0 {
                continue;
            }
            let donor = points
                .iter()
                .enumerate()
                .filter(|(i, _)| counts[labels[*i]] > 1)
                .map(|(i, p)| (i, squared_distance(p, &centroids[labels[i]])))
                .fold(None, |best: Option<(usize, f64)>, cur| match best {
                    Some(b) if b.1 >= cur.1 => Some(b),
                    _ => Some(cur),
                });
            if let Some((i, _)) = donor {
                counts[labels[i]] -= 1;
                labels[i] = empty;
                counts[empty] = 1;
            }
        }
    }
}

/// Clusters rows on up to the first three numeric columns (standardised)
/// and ranks the clusters by size.
pub fn segment(table: &Table, n_clusters: usize, seed: u64) -> Result<SegmentationResult, AnalyticsError> {
    if n_clusters == 0 {
        return Err(AnalyticsError::validation("n_clusters must be at least 1"));
    }

    let features: Vec<(&str, &[Option<f64>])> = table.numeric_columns().take(MAX_FEATURES).collect();
    if features.is_empty() {
        return Err(AnalyticsError::validation("No numeric columns found for segmentation"));
    }

    let rows: Vec<Vec<f64>> = (0..table.row_count())
        .filter_map(|row| features.iter().map(|(_, values)| values[row]).collect::<Option<Vec<f64>>>())
        .collect();

    if rows.len() < n_clusters {
        return Err(AnalyticsError::insufficient(format!(
            "Insufficient data points for {} clusters",
            n_clusters
        )));
    }

    let scaled = standardize(&rows, features.len());
    let fit = KMeans::new(n_clusters, seed).fit(&scaled)?;

    let mut sizes = vec![0usize; n_clusters];
    for &label in &fit.labels {
        sizes[label] += 1;
    }
    sizes.sort_unstable_by(|a, b| b.cmp(a));

    info!(
        "Segmented {} rows into {} clusters (inertia {:.3})",
        rows.len(),
        n_clusters,
        fit.inertia
    );

    let total = rows.len() as f64;
    Ok(SegmentationResult {
        success: true,
        labels: (0..n_clusters).map(segment_label).collect(),
        percentages: sizes
            .iter()
            .map(|&s| (s as f64 / total * 100.0 * 10.0).round() / 10.0)
            .collect(),
        segments: sizes,
        algorithm: ALGORITHM.to_string(),
        features_used: features.iter().map(|(name, _)| name.to_string()).collect(),
    })
}

fn segment_label(rank: usize) -> String {
    SEGMENT_LABELS
        .get(rank)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Segment {}", rank + 1))
}

/// Zero mean, unit (population) variance per feature; constant features are
/// only centred.
fn standardize(rows: &[Vec<f64>], dims: usize) -> Vec<Vec<f64>> {
    let params: Vec<(f64, f64)> = (0..dims)
        .map(|d| {
            let column: Vec<f64> = rows.iter().map(|r| r[d]).collect();
            let m = mean(&column).unwrap_or(0.0);
            let s = population_std(&column).filter(|s| *s > 0.0).unwrap_or(1.0);
            (m, s)
        })
        .collect();

    rows.iter()
        .map(|r| r.iter().zip(&params).map(|(x, (m, s))| (x - m) / s).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sample_data::{generate, SampleKind};
    use crate::services::table::Column;

    fn blobs() -> Table {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for (cx, cy, n) in [(0.0, 0.0, 12), (10.0, 10.0, 8), (-10.0, 10.0, 5)] {
            for i in 0..n {
                x.push(Some(cx + (i % 3) as f64 * 0.1));
                y.push(Some(cy + (i % 2) as f64 * 0.1));
            }
        }
        x.push(None);
        y.push(Some(3.0));
        Table::new(vec![
            Column::numeric("spend", x),
            Column::numeric("visits", y),
            Column::text("name", vec![Some("c".into()); 26]),
        ])
        .unwrap()
    }

    #[test]
    fn test_recovers_separated_clusters() {
        let result = segment(&blobs(), 3, 42).unwrap();
        assert_eq!(result.segments, vec![12, 8, 5]);
        assert_eq!(result.labels, vec!["High Value", "Medium Value", "Growing"]);
        assert_eq!(result.percentages, vec![48.0, 32.0, 20.0]);
        assert_eq!(result.features_used, vec!["spend", "visits"]);
        assert_eq!(result.algorithm, "K-Means++");
    }

    #[test]
    fn test_deterministic_for_seed() {
        let table = generate(SampleKind::Customers, 200, 42).unwrap();
        let a = segment(&table, 4, 42).unwrap();
        let b = segment(&table, 4, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bucket_count_matches_k() {
        let table = generate(SampleKind::Sales, 300, 42).unwrap();
        for k in [2, 4, 7, 10] {
            let result = segment(&table, k, 42).unwrap();
            assert_eq!(result.segments.len(), k);
            assert_eq!(result.labels.len(), k);
            assert_eq!(result.percentages.len(), k);
            assert_eq!(result.segments.iter().sum::<usize>(), 300);
            assert!(result.segments.windows(2).all(|w| w[0] >= w[1]));
            assert!(result.segments.iter().all(|&s| s > 0));
        }
    }

    #[test]
    fn test_duplicate_points_still_fill_every_cluster() {
        let table = Table::new(vec![Column::numeric("v", vec![Some(1.0); 6])]).unwrap();
        let result = segment(&table, 3, 1).unwrap();
        assert_eq!(result.segments.iter().sum::<usize>(), 6);
        assert!(result.segments.iter().all(|&s| s > 0));
    }

    #[test]
    fn test_insufficient_rows() {
        let table = Table::new(vec![Column::numeric("v", vec![Some(1.0), None, Some(2.0)])]).unwrap();
        assert!(matches!(
            segment(&table, 3, 42),
            Err(AnalyticsError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_requires_numeric_columns() {
        let table = Table::new(vec![Column::text("v", vec![Some("a".into())])]).unwrap();
        assert!(matches!(segment(&table, 2, 42), Err(AnalyticsError::Validation(_))));
    }
}
