//! Set and vector similarity between item-feature collections.
//!
//! `jaccard` uses the standard set index |A ∩ B| / |A ∪ B| over distinct
//! elements. The legacy scorer divided the intersection by the length of
//! A concatenated with B, which undercounts similarity and double-counts
//! shared elements; rankings built on it are not comparable with these.

use std::collections::HashSet;
use std::hash::Hash;

use crate::catalog::MenuItem;
use crate::error::{CafeError, Result};

pub fn jaccard<T: Eq + Hash>(a: &[T], b: &[T]) -> Result<f64> {
    let a: HashSet<&T> = a.iter().collect();
    let b: HashSet<&T> = b.iter().collect();

    let union = a.union(&b).count();
    if union == 0 {
        return Err(CafeError::invalid_input("jaccard of two empty collections"));
    }
    let intersection = a.intersection(&b).count();
    Ok(intersection as f64 / union as f64)
}

fn check_vectors(x: &[f64], y: &[f64]) -> Result<()> {
    if x.is_empty() || y.is_empty() {
        return Err(CafeError::invalid_input("empty vector"));
    }
    if x.len() != y.len() {
        return Err(CafeError::invalid_input(format!(
            "vector length mismatch: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    Ok(())
}

/// dot(x, y) / (‖x‖·‖y‖), in [-1, 1].
pub fn cosine_similarity(x: &[f64], y: &[f64]) -> Result<f64> {
    check_vectors(x, y)?;

    let dot: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let norm_x = x.iter().map(|v| v * v).sum::<f64>().sqrt();
    let norm_y = y.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm_x == 0.0 || norm_y == 0.0 {
        return Err(CafeError::invalid_input("cosine similarity of a zero vector"));
    }

    // Rounding can push |x·x| / ‖x‖² a hair past 1.
    Ok((dot / (norm_x * norm_y)).clamp(-1.0, 1.0))
}

/// cov(x, y) / (σx·σy), in [-1, 1].
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Result<f64> {
    check_vectors(x, y)?;

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return Err(CafeError::invalid_input("pearson correlation of a constant vector"));
    }

    Ok((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Projects an item's nutrients onto `keys`; absent nutrients are 0.
pub fn nutrient_vector(item: &MenuItem, keys: &[&str]) -> Vec<f64> {
    keys.iter().map(|k| item.nutrient(k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn jaccard_is_intersection_over_union() {
        let a = ["latte", "mocha", "tea"];
        let b = ["mocha", "tea", "scone", "bagel"];
        // {mocha, tea} / {latte, mocha, tea, scone, bagel}
        assert!((jaccard(&a, &b).unwrap() - 2.0 / 5.0).abs() < EPS);
    }

    #[test]
    fn jaccard_ignores_duplicates_and_leaves_inputs_alone() {
        let a = vec![1, 1, 2];
        let b = vec![2, 2, 3];
        assert!((jaccard(&a, &b).unwrap() - 1.0 / 3.0).abs() < EPS);
        assert_eq!(a, vec![1, 1, 2]);
        assert_eq!(b, vec![2, 2, 3]);
    }

    #[test]
    fn jaccard_edges() {
        let empty: [u8; 0] = [];
        assert!(matches!(
            jaccard(&empty, &empty),
            Err(CafeError::InvalidInput(_))
        ));
        assert_eq!(jaccard(&[1u8], &empty).unwrap(), 0.0);
        assert_eq!(jaccard(&[1u8, 2], &[2u8, 1]).unwrap(), 1.0);
    }

    #[test]
    fn cosine_of_vector_with_itself_is_one() {
        for x in [
            vec![1.0, 2.0, 3.0],
            vec![0.1, 0.0, 7.3, 1e-3],
            vec![-4.0, 2.5],
            vec![1e9, 3e-9, 5.0],
        ] {
            assert!((cosine_similarity(&x, &x).unwrap() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn cosine_stays_in_range() {
        let vectors = [
            vec![1.0, 0.0, 0.0],
            vec![-1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![3.0, -2.0, 8.0],
            vec![0.5, 0.5, -0.5],
        ];
        for x in &vectors {
            for y in &vectors {
                let s = cosine_similarity(x, y).unwrap();
                assert!((-1.0..=1.0).contains(&s), "{s} out of range");
            }
        }
        let opposite = cosine_similarity(&vectors[0], &vectors[1]).unwrap();
        assert!((opposite + 1.0).abs() < EPS);
        assert!(cosine_similarity(&vectors[0], &vectors[2]).unwrap().abs() < EPS);
    }

    #[test]
    fn cosine_rejects_bad_input() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).is_err());
        assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).is_err());
        assert!(cosine_similarity(&[], &[]).is_err());
    }

    #[test]
    fn pearson_detects_linear_relationships() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let up = [2.0, 4.0, 6.0, 8.0];
        let down = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson_correlation(&x, &up).unwrap() - 1.0).abs() < EPS);
        assert!((pearson_correlation(&x, &down).unwrap() + 1.0).abs() < EPS);
    }

    #[test]
    fn pearson_rejects_constant_vectors() {
        assert!(matches!(
            pearson_correlation(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]),
            Err(CafeError::InvalidInput(_))
        ));
    }

    #[test]
    fn nutrient_vector_fills_missing_with_zero() {
        let item = MenuItem::new("muffin", "Muffin")
            .with_nutrient("sugars", 21.0)
            .with_nutrient("lipids", 9.5);
        assert_eq!(
            nutrient_vector(&item, &["lipids", "proteins", "sugars"]),
            vec![9.5, 0.0, 21.0]
        );
    }
}
