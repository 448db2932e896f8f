#![cfg(test)]
#![allow(clippy::unwrap_used)]

use std::cell::RefCell;

use itertools::Itertools;
use mosaic_array::array_util::{create_array, create_const_array, create_sparse_array};
use mosaic_array::{
    Array, DenseArray, IdFilter, IdFilterKind, Required, SparseArrayBuilder, create_pointwise_op,
};
use mosaic_buffer::{Arena, Buffer, BufferFactory};
use rstest::{fixture, rstest};

/// The same logical column in every form it can take.
#[fixture]
fn forms() -> Vec<Array<i32>> {
    let dense = create_array([Some(1), Some(2), Some(1), Some(3), None, Some(2), None]);
    vec![
        dense.to_sparse_form(None),
        dense.to_sparse_form(Some(1)),
        dense.to_sparse_form(Some(2)),
        dense.with_ids(&IdFilter::new(7, Buffer::copy_from([1, 2, 3, 4, 5, 6]), 0), Some(1)),
        dense.slice(0, 7),
        dense,
    ]
}

fn check_form_invariants<T>(array: &Array<T>) {
    let filter = array.id_filter();
    match filter.kind() {
        IdFilterKind::Empty => assert_eq!(array.dense_data().len(), 0),
        IdFilterKind::Full => {
            assert_eq!(array.dense_data().len(), array.size());
            assert!(array.missing_id_value().is_none());
        }
        IdFilterKind::Partial => {
            assert_eq!(array.dense_data().len(), filter.ids().len());
            assert!(filter.ids().len() < array.size());
        }
    }
}

fn rows(array: &Array<i32>) -> Vec<Option<i32>> {
    array.iter().map(|v| v.copied()).collect_vec()
}

#[rstest]
fn present_count_is_form_independent(forms: Vec<Array<i32>>) {
    for array in &forms {
        check_form_invariants(array);
        assert_eq!(array.present_count(), 5, "{array:?}");
        assert_eq!(array.to_dense_form().present_count(), 5);
    }
}

#[rstest]
fn equivalence_is_form_independent(forms: Vec<Array<i32>>) {
    for (lhs, rhs) in forms.iter().tuple_combinations() {
        assert!(Array::arrays_are_equivalent(lhs, rhs), "{lhs:?} vs {rhs:?}");
        assert_eq!(rows(lhs), rows(rhs));
    }
    let different = create_array([Some(1), Some(2), Some(1), Some(3), None, Some(2), Some(0)]);
    assert!(
        forms
            .iter()
            .all(|array| !Array::arrays_are_equivalent(array, &different))
    );
}

#[rstest]
fn with_ids_round_trip(forms: Vec<Array<i32>>) {
    let superset = IdFilter::new(7, Buffer::copy_from([0, 1, 3, 4, 5, 6]), 0);
    for array in forms.iter().filter(|array| !array.is_dense_form()) {
        let missing = array.missing_id_value().copied();
        let covered = IdFilter::upper_bound_merge(7, [array.id_filter(), &superset]);
        let round_trip = array
            .with_ids(&covered, missing)
            .with_ids(array.id_filter(), missing);
        check_form_invariants(&round_trip);
        assert!(Array::arrays_are_equivalent(array, &round_trip));
    }
}

#[rstest]
fn to_dense_form_is_idempotent(forms: Vec<Array<i32>>) {
    let empty = forms.iter().map(|array| array.slice(3, 0)).collect_vec();
    for array in forms.iter().chain(&empty) {
        let dense = array.to_dense_form();
        assert_eq!(dense.id_filter().kind(), IdFilterKind::Full);
        assert!(Array::arrays_are_equivalent(&dense, &dense.to_dense_form()));
    }
}

#[rstest]
#[case(None)]
#[case(Some(1))]
#[case(Some(2))]
#[case(Some(9))]
fn to_sparse_form_is_minimal(forms: Vec<Array<i32>>, #[case] default: Option<i32>) {
    for array in &forms {
        let sparse = array.to_sparse_form(default);
        check_form_invariants(&sparse);
        assert!(Array::arrays_are_equivalent(array, &sparse));
        for (id, value) in sparse.iter().enumerate() {
            let listed = sparse.id_filter().id_to_offset(id).is_some();
            assert_eq!(listed, value.copied() != default, "row {id} of {sparse:?}");
        }
    }
}

#[rstest]
#[case(0, 7, 2, 3)]
#[case(1, 5, 0, 5)]
#[case(2, 4, 1, 2)]
#[case(3, 4, 4, 0)]
fn slices_compose(
    forms: Vec<Array<i32>>,
    #[case] s1: usize,
    #[case] n1: usize,
    #[case] s2: usize,
    #[case] n2: usize,
) {
    for array in &forms {
        let twice = array.slice(s1, n1).slice(s2, n2);
        let once = array.slice(s1 + s2, n2);
        check_form_invariants(&twice);
        assert!(Array::arrays_are_equivalent(&twice, &once));
        assert_eq!(rows(&once), rows(array)[s1 + s2..s1 + s2 + n2]);
    }
}

#[test]
fn merge_falls_back_to_full_when_dense() {
    let lhs = IdFilter::new(8, Buffer::copy_from([1, 4, 5, 6]), 0);
    let rhs = IdFilter::new(8, Buffer::copy_from([0, 2, 3]), 0);

    let merged = IdFilter::upper_bound_merge(25, [&lhs, &rhs]);
    assert_eq!(merged.kind(), IdFilterKind::Partial);
    assert_eq!(merged.row_ids().collect_vec(), (0..7).collect_vec());

    assert_eq!(
        IdFilter::upper_bound_merge(5, [&lhs, &rhs]).kind(),
        IdFilterKind::Full
    );
}

#[test]
fn sparse_construction() {
    let array = create_sparse_array(10, [1, 4], [3, 7]);
    assert!(array.is_sparse_form());
    assert_eq!(array.get(1), Some(&3));
    assert_eq!(array.get(0), None);
}

#[test]
fn pointwise_matches_row_by_row() {
    let lhs = create_array([Some(1), Some(2), Some(3), None]);
    let mut builder = SparseArrayBuilder::new(4, Some(5));
    builder.add(0, 1);
    builder.add(1, 2);
    builder.add(2, 3);
    let rhs = builder.build();
    let add = create_pointwise_op(|(a, b): (i32, i32)| a + b);

    let result = add
        .apply((Required(lhs.clone()), Required(rhs.clone())))
        .unwrap();
    assert!(result.is_dense_form());
    let expected = (0..4)
        .map(|id| Some(lhs.get(id)? + rhs.get(id)?))
        .collect_vec();
    assert_eq!(rows(&result), expected);

    let shifted = add
        .apply((Required(rhs.clone()), Required(create_const_array(4, 5))))
        .unwrap();
    assert_eq!(rows(&shifted), vec![Some(6), Some(7), Some(8), Some(10)]);
}

#[test]
fn const_for_each_is_one_run() {
    let calls = RefCell::new(vec![]);
    create_const_array(10, 5).for_each(
        |_, _| panic!("no per-row calls expected"),
        |first, count, value| calls.borrow_mut().push((first, count, value.copied())),
    );
    assert_eq!(calls.into_inner(), vec![(0, 10, Some(5))]);
}

#[test]
fn arena_arrays_escape_through_make_owned() {
    let owned = {
        let arena = Arena::with_capacity(1024);
        let factory = BufferFactory::Arena(&arena);
        let array = create_array([Some(1), None, Some(3)])
            .to_sparse_form_in(Some(3), factory)
            .unwrap();
        assert!(!array.is_owned());
        array.make_owned()
    };
    assert!(owned.is_owned());
    assert_eq!(rows(&owned), vec![Some(1), None, Some(3)]);
}

#[test]
fn dense_columns_are_shared_not_copied() {
    let column = DenseArray::from_options([Some(1), None, Some(3)]);
    let array = Array::from_dense(column.clone());
    assert!(
        array
            .slice(1, 2)
            .dense_data()
            .values()
            .ptr_eq(&column.values().slice(1..3))
    );
}
