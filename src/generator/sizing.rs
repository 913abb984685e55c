//! Phase A: roster sizing.
//!
//! Splits each level's students into class shells.
//!
//! # Algorithm (`MidpointSizing`)
//!
//! 1. Take the recommended class count `k` for the level.
//! 2. Sizes: `n / k` each, the first `n % k` shells one larger.
//! 3. Shuffle NEW and EXISTING students separately with the run's seeded RNG.
//! 4. Deal NEW students to shells proportionally to shell size (largest
//!    remainder), then fill the rest with EXISTING students.
//!
//! A level below minimum size yields a single shell; whether it is placed
//! is the generator's decision.

use std::fmt::Debug;

use rand::seq::SliceRandom;
use rand::RngCore;

use crate::demand::recommended_class_count;
use crate::models::{ClassShell, Level, SizeBounds, Student};

/// Splits a level's students into shells.
pub trait SizingStrategy: Send + Sync + Debug {
    /// Strategy name.
    fn name(&self) -> &'static str;

    /// Produces shells for one level. Every student ends up in exactly one
    /// shell.
    fn size_level(
        &self,
        level: &Level,
        bounds: SizeBounds,
        students: &[&Student],
        rng: &mut dyn RngCore,
    ) -> Vec<ClassShell>;
}

/// Near-midpoint sizing with proportional category mixing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidpointSizing;

impl SizingStrategy for MidpointSizing {
    fn name(&self) -> &'static str {
        "MidpointSizing"
    }

    fn size_level(
        &self,
        level: &Level,
        bounds: SizeBounds,
        students: &[&Student],
        rng: &mut dyn RngCore,
    ) -> Vec<ClassShell> {
        let n = students.len();
        if n == 0 {
            return Vec::new();
        }
        let k = recommended_class_count(n, bounds).max(1);

        let mut fresh: Vec<&Student> = students.iter().copied().filter(|s| s.is_new()).collect();
        let mut returning: Vec<&Student> =
            students.iter().copied().filter(|s| !s.is_new()).collect();
        fresh.sort_by(|a, b| a.id.cmp(&b.id));
        returning.sort_by(|a, b| a.id.cmp(&b.id));
        fresh.shuffle(&mut *rng);
        returning.shuffle(&mut *rng);

        let sizes = split_sizes(n, k);
        let quotas = proportional_quotas(fresh.len(), &sizes);

        let mut fresh = fresh.into_iter();
        let mut returning = returning.into_iter();
        let mut shells = Vec::with_capacity(k);
        for (i, (&size, &quota)) in sizes.iter().zip(&quotas).enumerate() {
            let roster = fresh
                .by_ref()
                .take(quota)
                .chain(returning.by_ref().take(size - quota))
                .map(|s| s.id.clone());
            shells.push(ClassShell::new(shell_id(&level.id, i), &level.id).with_students(roster));
        }
        shells
    }
}

/// Shell id for the `index`-th shell of a level.
pub fn shell_id(level_id: &str, index: usize) -> String {
    format!("{level_id}-{:02}", index + 1)
}

/// Splits `n` into `k` sizes differing by at most one, larger first.
pub fn split_sizes(n: usize, k: usize) -> Vec<usize> {
    if k == 0 {
        return Vec::new();
    }
    let base = n / k;
    let extra = n % k;
    (0..k).map(|i| base + usize::from(i < extra)).collect()
}

/// Distributes `total` items over `sizes` proportionally (largest remainder).
///
/// Ties on remainder go to the earlier shell. Each quota stays within its
/// size as long as `total <= sizes.sum()`.
pub fn proportional_quotas(total: usize, sizes: &[usize]) -> Vec<usize> {
    let n: usize = sizes.iter().sum();
    if n == 0 {
        return vec![0; sizes.len()];
    }
    let mut quotas: Vec<usize> = sizes.iter().map(|&s| total * s / n).collect();
    let assigned: usize = quotas.iter().sum();
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = total * sizes[a] % n;
        let rb = total * sizes[b] % n;
        rb.cmp(&ra).then(a.cmp(&b))
    });
    for &i in order.iter().take(total.saturating_sub(assigned)) {
        quotas[i] += 1;
    }
    quotas
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_split_sizes() {
        assert_eq!(split_sizes(46, 5), vec![10, 9, 9, 9, 9]);
        assert_eq!(split_sizes(40, 5), vec![8; 5]);
        assert_eq!(split_sizes(5, 1), vec![5]);
        assert!(split_sizes(5, 0).is_empty());
    }

    #[test]
    fn test_proportional_quotas() {
        assert_eq!(proportional_quotas(12, &[8, 8, 8, 8, 8]), vec![3, 3, 2, 2, 2]);
        assert_eq!(proportional_quotas(0, &[8, 8]), vec![0, 0]);
        assert_eq!(proportional_quotas(16, &[8, 8]), vec![8, 8]);
        assert_eq!(proportional_quotas(5, &[10, 9, 9]).iter().sum::<usize>(), 5);
    }

    fn pool(new: usize, existing: usize) -> Vec<Student> {
        (0..new)
            .map(|i| Student::fresh(format!("n{i:02}"), "L1"))
            .chain((0..existing).map(|i| Student::returning(format!("e{i:02}"), "L1")))
            .collect()
    }

    #[test]
    fn test_midpoint_sizing_mixes_categories() {
        let students = pool(12, 28);
        let refs: Vec<&Student> = students.iter().collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let shells = MidpointSizing.size_level(
            &Level::new("L1", 1),
            SizeBounds::new(7, 10),
            &refs,
            &mut rng,
        );

        assert_eq!(shells.len(), 5);
        assert_eq!(shells[0].id, "L1-01");
        assert!(shells.iter().all(|s| s.size() == 8));
        for shell in &shells {
            let new = shell.roster.iter().filter(|id| id.starts_with('n')).count();
            assert!((2..=3).contains(&new));
        }
        let total: usize = shells.iter().map(|s| s.size()).sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn test_sizing_is_seeded() {
        let students = pool(9, 21);
        let refs: Vec<&Student> = students.iter().collect();
        let level = Level::new("L1", 1);
        let bounds = SizeBounds::new(7, 10);

        let a = MidpointSizing.size_level(&level, bounds, &refs, &mut ChaCha8Rng::seed_from_u64(1));
        let b = MidpointSizing.size_level(&level, bounds, &refs, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(a, b);

        let mut reversed = refs.clone();
        reversed.reverse();
        let c = MidpointSizing.size_level(&level, bounds, &reversed, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(a, c);
    }

    #[test]
    fn test_undersized_level_single_shell() {
        let students = pool(2, 3);
        let refs: Vec<&Student> = students.iter().collect();
        let shells = MidpointSizing.size_level(
            &Level::new("L1", 1),
            SizeBounds::new(7, 10),
            &refs,
            &mut ChaCha8Rng::seed_from_u64(0),
        );
        assert_eq!(shells.len(), 1);
        assert_eq!(shells[0].size(), 5);
    }
}
