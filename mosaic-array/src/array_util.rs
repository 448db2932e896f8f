//! Constructors and helpers built on top of [`Array`].

use itertools::Itertools;
use mosaic_buffer::Buffer;

use crate::Array;
use crate::builder::SparseArrayBuilder;
use crate::dense::DenseArray;
use crate::id_filter::IdFilter;

/// A dense array from optional values.
pub fn create_array<T: Default>(values: impl IntoIterator<Item = Option<T>>) -> Array<T> {
    Array::from_dense(DenseArray::from_options(values))
}

/// A sparse array with `values` at `ids` and every other row absent.
///
/// # Panics
///
/// Panics if `ids` and `values` differ in length.
pub fn create_sparse_array<T: Default>(
    size: usize,
    ids: impl IntoIterator<Item = usize>,
    values: impl IntoIterator<Item = T>,
) -> Array<T> {
    let mut builder = SparseArrayBuilder::new(size, None);
    for (id, value) in ids.into_iter().zip_eq(values) {
        builder.add(id, value);
    }
    builder.build()
}

/// An array where every row holds `value`.
pub fn create_const_array<T>(size: usize, value: T) -> Array<T> {
    Array::new_const(size, Some(value))
}

/// An array where every row is absent.
pub fn create_empty_array<T>(size: usize) -> Array<T> {
    Array::new_const(size, None)
}

/// The presence of every row of `array`, in the same form.
pub fn to_array_mask<T>(array: &Array<T>) -> Array<()> {
    let dense_data = array.dense_data();
    Array::new(
        array.size(),
        array.id_filter().clone(),
        DenseArray::new(
            Buffer::full((), dense_data.len()),
            dense_data.validity().clone(),
        ),
        array.missing_id_value().map(|_| ()),
    )
}

/// The smallest `max_count` ids holding a value, ascending.
pub fn first_present_ids<T>(array: &Array<T>, max_count: usize) -> Vec<usize> {
    let size = array.size();
    match (array.id_filter(), array.missing_id_value()) {
        (IdFilter::Empty, None) => vec![],
        (IdFilter::Empty, Some(_)) => (0..size.min(max_count)).collect(),
        (IdFilter::Full, _) => array
            .dense_data()
            .validity()
            .indices()
            .take(max_count)
            .collect(),
        (filter @ IdFilter::Partial(_), None) => array
            .dense_data()
            .validity()
            .indices()
            .map(|offset| filter.offset_to_id(offset))
            .take(max_count)
            .collect(),
        (IdFilter::Partial(_), Some(_)) => array
            .iter()
            .positions(|value| value.is_some())
            .take(max_count)
            .collect(),
    }
}

/// The largest `max_count` ids holding a value, ascending.
pub fn last_present_ids<T>(array: &Array<T>, max_count: usize) -> Vec<usize> {
    let size = array.size();
    let mut ids: Vec<usize> = match (array.id_filter(), array.missing_id_value()) {
        (IdFilter::Empty, None) => vec![],
        (IdFilter::Empty, Some(_)) => (size.saturating_sub(max_count)..size).rev().collect(),
        (IdFilter::Full, _) => (0..size)
            .rev()
            .filter(|&id| array.dense_data().present(id))
            .take(max_count)
            .collect(),
        (filter @ IdFilter::Partial(_), None) => filter
            .row_ids()
            .enumerate()
            .rev()
            .filter(|&(offset, _)| array.dense_data().present(offset))
            .map(|(_, id)| id)
            .take(max_count)
            .collect(),
        (IdFilter::Partial(_), Some(_)) => (0..size)
            .rev()
            .filter(|&id| array.get(id).is_some())
            .take(max_count)
            .collect(),
    };
    ids.reverse();
    ids
}

/// Calls `f(id, value)` for each id of a sorted subset, given biased by `ids_offset`.
///
/// The subset and the array's own id list are walked together once.
pub fn for_each_in_subset<T, F>(array: &Array<T>, ids: &[usize], ids_offset: usize, mut f: F)
where
    F: FnMut(usize, Option<&T>),
{
    debug_assert!(ids.is_sorted(), "subset ids must be sorted");
    let missing = array.missing_id_value();
    match array.id_filter() {
        IdFilter::Empty => ids.iter().for_each(|id| f(id - ids_offset, missing)),
        IdFilter::Full => ids
            .iter()
            .for_each(|id| f(id - ids_offset, array.dense_data().get(id - ids_offset))),
        filter @ IdFilter::Partial(_) => {
            let mut own = filter.row_ids().enumerate().peekable();
            for id in ids.iter().map(|id| id - ids_offset) {
                while own.next_if(|&(_, own_id)| own_id < id).is_some() {}
                match own.peek() {
                    Some(&(offset, own_id)) if own_id == id => {
                        f(id, array.dense_data().get(offset))
                    }
                    _ => f(id, missing),
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;
    use rstest::rstest;

    use super::*;

    fn sparse_with_default() -> Array<i32> {
        let mut builder = SparseArrayBuilder::new(8, Some(0));
        builder.add_option(0, None);
        builder.add_option(1, None);
        builder.add(5, 5);
        builder.add_option(7, None);
        builder.build()
    }

    #[test]
    fn create_sparse() {
        let array = create_sparse_array(10, [1, 4], [3, 7]);
        assert!(array.is_sparse_form());
        assert_eq!(array.get(1), Some(&3));
        assert_eq!(array.get(4), Some(&7));
        assert_eq!(array.get(0), None);
    }

    #[test]
    #[should_panic]
    fn create_sparse_length_mismatch() {
        create_sparse_array(10, [1, 4], [3]);
    }

    #[test]
    fn constants() {
        assert!(create_const_array(3, 'x').is_const_form());
        assert_eq!(create_const_array(3, 'x').present_count(), 3);
        assert!(create_empty_array::<char>(3).is_all_missing_form());
    }

    #[test]
    fn mask_keeps_form() {
        let array = create_sparse_array(6, [2, 3], ["a", "b"]);
        let mask = to_array_mask(&array);
        assert!(mask.id_filter().is_same(array.id_filter()));
        assert_eq!(mask.present_count(), 2);
        assert_eq!(
            to_array_mask(&create_array([Some(1), None])).iter().collect_vec(),
            vec![Some(&()), None]
        );
    }

    #[rstest]
    #[case(create_array([None, Some(1), Some(2), None, Some(4)]), vec![1, 2], vec![2, 4])]
    #[case(create_const_array(5, 1), vec![0, 1], vec![3, 4])]
    #[case(create_empty_array(5), vec![], vec![])]
    #[case(create_sparse_array(9, [1, 3, 8], [1, 1, 1]), vec![1, 3], vec![3, 8])]
    #[case(sparse_with_default(), vec![2, 3], vec![5, 6])]
    fn present_ids(
        #[case] array: Array<i32>,
        #[case] first: Vec<usize>,
        #[case] last: Vec<usize>,
    ) {
        assert_eq!(first_present_ids(&array, 2), first);
        assert_eq!(last_present_ids(&array, 2), last);
    }

    #[rstest]
    #[case(create_array([Some(0), None, Some(2), Some(3)]))]
    #[case(create_sparse_array(4, [0, 2, 3], [0, 2, 3]))]
    #[case(create_const_array(4, 9))]
    fn subset_matches_get(#[case] array: Array<i32>) {
        let mut seen = vec![];
        for_each_in_subset(&array, &[10, 11, 13], 10, |id, value| {
            seen.push((id, value.copied()))
        });
        let expected = [0, 1, 3]
            .into_iter()
            .map(|id| (id, array.get(id).copied()))
            .collect_vec();
        assert_eq!(seen, expected);
    }
}
