/*!
Counting primitives shared by the matcher and the aggregator. Counts are summed first and turned
into ratios last, which gives micro-averaged metrics.
*/
use num::{Float, NumCast};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Divides two counts. A zero denominator means there was nothing to get wrong, so the ratio is
/// `1`.
pub(crate) fn prf_divide<F: Float>(numerator: usize, denominator: usize) -> F {
    if denominator == 0 {
        return F::one();
    }
    let num: F = NumCast::from(numerator).unwrap_or_else(F::zero);
    let den: F = NumCast::from(denominator).unwrap_or_else(F::one);
    num / den
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
/// True positives, false positives and false negatives of one or many comparisons.
pub struct MatchCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl MatchCounts {
    pub fn new(true_positives: usize, false_positives: usize, false_negatives: usize) -> Self {
        MatchCounts {
            true_positives,
            false_positives,
            false_negatives,
        }
    }

    /// `tp / (tp + fp)`, or 1 when nothing was predicted.
    pub fn precision(&self) -> f64 {
        prf_divide(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    /// `tp / (tp + fn)`, or 1 when nothing was expected.
    pub fn recall(&self) -> f64 {
        prf_divide(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    /// `2tp / (2tp + fp + fn)`, or 1 when both sides are empty.
    pub fn f1(&self) -> f64 {
        prf_divide(
            2 * self.true_positives,
            2 * self.true_positives + self.false_positives + self.false_negatives,
        )
    }

    /// Counts seen from the other side of the comparison.
    pub fn swapped(&self) -> Self {
        MatchCounts {
            true_positives: self.true_positives,
            false_positives: self.false_negatives,
            false_negatives: self.false_positives,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for MatchCounts {
    type Output = MatchCounts;
    fn add(self, rhs: Self) -> Self::Output {
        MatchCounts {
            true_positives: self.true_positives + rhs.true_positives,
            false_positives: self.false_positives + rhs.false_positives,
            false_negatives: self.false_negatives + rhs.false_negatives,
        }
    }
}

impl AddAssign for MatchCounts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for MatchCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(MatchCounts::default(), Add::add)
    }
}

impl<'a> Sum<&'a MatchCounts> for MatchCounts {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck as quickcheck_test;
    use rstest::rstest;

    #[rstest]
    #[case(MatchCounts::new(2, 1, 1), 2.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0)]
    #[case(MatchCounts::new(3, 1, 0), 0.75, 1.0, 6.0 / 7.0)]
    #[case(MatchCounts::new(0, 2, 2), 0.0, 0.0, 0.0)]
    #[case(MatchCounts::new(0, 0, 0), 1.0, 1.0, 1.0)]
    #[case(MatchCounts::new(0, 0, 3), 1.0, 0.0, 0.0)]
    fn test_ratios(
        #[case] counts: MatchCounts,
        #[case] precision: f64,
        #[case] recall: f64,
        #[case] f1: f64,
    ) {
        assert!((counts.precision() - precision).abs() < 1e-12);
        assert!((counts.recall() - recall).abs() < 1e-12);
        assert!((counts.f1() - f1).abs() < 1e-12);
    }

    #[test]
    fn test_prf_divide_generic() {
        assert_eq!(prf_divide::<f32>(1, 4), 0.25f32);
        assert_eq!(prf_divide::<f64>(7, 0), 1.0);
    }

    #[test]
    fn test_sum_of_counts() {
        let counts = [MatchCounts::new(1, 0, 2), MatchCounts::new(3, 1, 0)];
        assert_eq!(counts.iter().sum::<MatchCounts>(), MatchCounts::new(4, 1, 2));
        let mut acc = MatchCounts::default();
        acc += counts[1];
        assert_eq!(acc.swapped(), MatchCounts::new(3, 0, 1));
    }

    #[quickcheck_test]
    fn propertie_test_ratios_are_bounded(tp: u16, fp: u16, fn_: u16) -> bool {
        let counts = MatchCounts::new(tp.into(), fp.into(), fn_.into());
        [counts.precision(), counts.recall(), counts.f1()]
            .iter()
            .all(|r| (0.0..=1.0).contains(r))
    }
}
