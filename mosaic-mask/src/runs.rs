use std::iter;

use crate::Mask;

impl Mask {
    /// Hands `f` an iterator over the presence of every slot, without boxing.
    pub fn iter_bools<F, T>(&self, mut f: F) -> T
    where
        F: FnMut(&mut dyn Iterator<Item = bool>) -> T,
    {
        match self {
            Mask::AllTrue(len) => f(&mut iter::repeat_n(true, *len)),
            Mask::AllFalse(len) => f(&mut iter::repeat_n(false, *len)),
            Mask::Values(values) => f(&mut values.boolean_buffer().iter()),
        }
    }

    /// Calls `f(start, len, present)` for each maximal run of slots sharing the same presence,
    /// in ascending order. Empty masks produce no calls.
    pub fn for_each_run<F>(&self, mut f: F)
    where
        F: FnMut(usize, usize, bool),
    {
        let mut next = 0;
        for (start, end) in self.slices() {
            if start > next {
                f(next, start - next, false);
            }
            f(start, end - start, true);
            next = end;
        }
        if next < self.len() {
            f(next, self.len() - next, false);
        }
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;

    use crate::Mask;

    fn runs(mask: &Mask) -> Vec<(usize, usize, bool)> {
        let mut runs = vec![];
        mask.for_each_run(|start, len, present| runs.push((start, len, present)));
        runs
    }

    #[test]
    fn iter_bools_matches_representation() {
        assert_eq!(
            Mask::new_true(3).iter_bools(|iter| iter.collect_vec()),
            vec![true; 3]
        );
        assert_eq!(
            Mask::new_false(2).iter_bools(|iter| iter.collect_vec()),
            vec![false; 2]
        );
        assert_eq!(
            Mask::from_iter([true, false, false, false, true]).iter_bools(|iter| iter.collect_vec()),
            vec![true, false, false, false, true],
        );
    }

    #[test]
    fn runs_cover_every_slot() {
        assert_eq!(runs(&Mask::new_true(4)), vec![(0, 4, true)]);
        assert_eq!(runs(&Mask::new_false(4)), vec![(0, 4, false)]);
        assert_eq!(runs(&Mask::new_true(0)), vec![]);
        assert_eq!(
            runs(&Mask::from_iter([false, true, true, false, false, true])),
            vec![(0, 1, false), (1, 2, true), (3, 2, false), (5, 1, true)]
        );
        assert_eq!(
            runs(&Mask::from_iter([true, true, false, false, false])),
            vec![(0, 2, true), (2, 3, false)]
        );
    }
}
