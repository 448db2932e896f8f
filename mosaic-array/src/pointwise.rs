use std::marker::PhantomData;

use mosaic_buffer::BufferFactory;
use mosaic_error::MosaicResult;

use crate::Array;
use crate::dense::DenseBuilder;
use crate::id_filter::{IdFilter, exceeds_sparsity_limit};
use crate::ops_util::{Arguments, candidate_filter};

/// An array operator applying a scalar function row by row.
///
/// The scalar function receives the tuple of argument items and returns the row's value, `None`
/// for an absent row, or an error that aborts the whole operation. It may be called any number of
/// times per distinct run of rows and in any order.
pub struct ArrayPointwiseOp<I, R, F> {
    f: F,
    _phantom: PhantomData<fn(I) -> R>,
}

/// An operator over a scalar function that always yields a value.
pub fn create_pointwise_op<I, R>(
    f: impl Fn(I) -> R,
) -> ArrayPointwiseOp<I, R, impl Fn(I) -> MosaicResult<Option<R>>> {
    ArrayPointwiseOp::new(move |items: I| -> MosaicResult<Option<R>> { Ok(Some(f(items))) })
}

/// An operator over a scalar function that may yield an absent value.
pub fn create_optional_pointwise_op<I, R>(
    f: impl Fn(I) -> Option<R>,
) -> ArrayPointwiseOp<I, R, impl Fn(I) -> MosaicResult<Option<R>>> {
    ArrayPointwiseOp::new(move |items: I| -> MosaicResult<Option<R>> { Ok(f(items)) })
}

impl<I, R, F> ArrayPointwiseOp<I, R, F>
where
    F: Fn(I) -> MosaicResult<Option<R>>,
{
    /// An operator over a fallible scalar function.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }

    pub fn apply<A>(&self, args: A) -> MosaicResult<Array<R>>
    where
        A: Arguments<Items = I>,
        R: Clone + Default,
    {
        self.apply_in(args, BufferFactory::Heap)
    }

    /// Apply the operator, allocating the result through `factory`.
    ///
    /// Fails with `SizeMismatch` unless every argument has the same size, or with the first error
    /// returned by the scalar function.
    pub fn apply_in<A>(&self, args: A, factory: BufferFactory<'_>) -> MosaicResult<Array<R>>
    where
        A: Arguments<Items = I>,
        R: Clone + Default,
    {
        let size = args.size()?;
        if args.any_required_all_missing() {
            log::debug!("A required argument of {size} rows is all missing, result is all missing");
            return Ok(Array::new_const(size, None));
        }

        let (id_filter, args) = if args.all_same_filter() {
            let id_filter = args.filters()[0].0.clone();
            (id_filter, args)
        } else {
            let id_filter = candidate_filter(size, &args, factory)?;
            let args = args.with_ids_in(&id_filter, factory)?;
            (id_filter, args)
        };

        let len = id_filter.dense_len(size);
        let mut values = DenseBuilder::with_capacity(len);
        for offset in 0..len {
            let value = match args.items_at(offset) {
                Some(items) => (self.f)(items)?,
                None => None,
            };
            values.push(value);
        }
        let missing_id_value = match (id_filter.is_full(), args.default_items()) {
            (false, Some(items)) => (self.f)(items)?,
            _ => None,
        };

        let result = Array::new(size, id_filter, values.build_in(factory)?, missing_id_value);
        if result.is_sparse_form() && exceeds_sparsity_limit(result.id_filter().ids().len(), size)
        {
            return result.to_dense_form_in(factory);
        }
        Ok(result)
    }

    /// The filter a result would be computed over, without computing it.
    pub fn result_filter<A>(&self, args: &A) -> MosaicResult<IdFilter>
    where
        A: Arguments<Items = I>,
    {
        let size = args.size()?;
        if args.any_required_all_missing() {
            return Ok(IdFilter::Empty);
        }
        if args.all_same_filter() {
            return Ok(args.filters()[0].0.clone());
        }
        candidate_filter(size, args, BufferFactory::Heap)
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;
    use mosaic_buffer::{Arena, buffer};
    use mosaic_error::{MosaicError, mosaic_err};
    use rstest::rstest;

    use super::*;
    use crate::id_filter::IdFilterKind;
    use crate::{DenseArray, Optional, Required, SparseArrayBuilder};

    fn dense(values: &[Option<i64>]) -> Array<i64> {
        Array::from_dense(DenseArray::from_options(values.iter().copied()))
    }

    fn sparse(size: usize, rows: &[(usize, i64)], default: Option<i64>) -> Array<i64> {
        let mut builder = SparseArrayBuilder::new(size, default);
        rows.iter().for_each(|&(id, value)| builder.add(id, value));
        builder.build()
    }

    fn rows<T: Clone>(array: &Array<T>) -> Vec<Option<T>> {
        array.iter().map(|v| v.cloned()).collect_vec()
    }

    #[test]
    fn add_across_forms() {
        let lhs = dense(&[Some(1), Some(2), Some(3), None]);
        let rhs = sparse(4, &[(0, 1), (1, 2), (2, 3)], Some(5));
        let add = create_pointwise_op(|(a, b): (i64, i64)| a + b);

        let result = add.apply((Required(lhs.clone()), Required(rhs.clone()))).unwrap();
        assert!(result.is_dense_form());
        assert_eq!(rows(&result), vec![Some(2), Some(4), Some(6), None]);

        let expected = (0..4)
            .map(|id| Some(lhs.get(id)? + rhs.get(id)?))
            .collect_vec();
        assert_eq!(rows(&result), expected);
    }

    #[test]
    fn size_mismatch() {
        let add = create_pointwise_op(|(a, b): (i64, i64)| a + b);
        let err = add
            .apply((Required(dense(&[Some(1)])), Required(dense(&[]))))
            .unwrap_err();
        assert!(matches!(err, MosaicError::SizeMismatch(ref sizes, _) if sizes == &[1, 0]));
    }

    #[test]
    fn all_missing_required_short_circuits() {
        let op = create_pointwise_op(|(_, _): (i64, i64)| -> i64 { unreachable!() });
        let result = op
            .apply((
                Required(Array::new_const(3, None)),
                Required(dense(&[Some(1), Some(2), Some(3)])),
            ))
            .unwrap();
        assert!(result.is_all_missing_form());
        assert_eq!(result.size(), 3);
    }

    #[test]
    fn shared_filter_stays_sparse() {
        let lhs = sparse(100, &[(10, 1), (50, 2)], Some(0));
        let rhs = lhs.with_ids(lhs.id_filter(), Some(1));
        let op = create_pointwise_op(|(a, b): (i64, i64)| a * 10 + b);
        let result = op.apply((Required(lhs.clone()), Required(rhs))).unwrap();
        assert!(result.id_filter().is_same(lhs.id_filter()));
        assert_eq!(result.get(10), Some(&11));
        assert_eq!(result.get(11), Some(&1));
    }

    #[test]
    fn dense_enough_results_are_densified() {
        let lhs = sparse(8, &[(0, 1), (3, 2)], Some(0));
        let op = create_pointwise_op(|(a,): (i64,)| a + 1);
        let result = op.apply((Required(lhs.clone()),)).unwrap();
        assert!(result.is_dense_form());
        let expected = rows(&lhs).into_iter().map(|v| v.map(|v| v + 1)).collect_vec();
        assert_eq!(rows(&result), expected);
    }

    #[rstest]
    #[case(None, vec![None, Some(1), None, None])]
    #[case(Some(7), vec![Some(7), Some(1), Some(7), Some(7)])]
    fn optional_arguments(#[case] fallback: Option<i64>, #[case] expected: Vec<Option<i64>>) {
        let op = create_optional_pointwise_op(|(a, b): (Option<i64>, Option<i64>)| {
            a.or(b).or(fallback)
        });
        let lhs = sparse(4, &[(1, 1)], None);
        let rhs = Array::new_const(4, None);
        assert_eq!(rows(&op.apply((Optional(lhs), Optional(rhs))).unwrap()), expected);
    }

    #[test]
    fn fallible_function_errors_propagate() {
        let op = ArrayPointwiseOp::new(|(a,): (i64,)| {
            if a < 0 {
                Err(mosaic_err!("negative input {}", a))
            } else {
                Ok(Some(a))
            }
        });
        assert!(op.apply((Required(dense(&[Some(1), Some(2)])),)).is_ok());
        let err = op.apply((Required(dense(&[Some(1), Some(-2)])),)).unwrap_err();
        assert!(matches!(err, MosaicError::InvalidArgument(..)));
    }

    #[test]
    fn result_filter_and_arena() {
        let lhs = sparse(100, &[(1, 1)], None);
        let rhs = sparse(100, &[(1, 2), (2, 3)], Some(0));
        let op = create_pointwise_op(|(a, b): (i64, i64)| a - b);
        let args = (Required(lhs), Required(rhs));
        assert_eq!(op.result_filter(&args).unwrap().kind(), IdFilterKind::Partial);

        let arena = Arena::new();
        let result = op.apply_in(args, BufferFactory::Arena(&arena)).unwrap();
        assert!(!result.is_owned());
        assert_eq!(result.present_count(), 1);
        assert_eq!(result.get(1), Some(&-1));
        assert_eq!(result.get(2), None);
    }

    #[test]
    fn strings() {
        let names = Array::from_buffer(buffer!["a".to_string(), "b".to_string()]);
        let suffix = Array::new_const(2, Some("!".to_string()));
        let op = create_pointwise_op(|(name, suffix): (String, String)| name + &suffix);
        let result = op.apply((Required(names), Required(suffix))).unwrap();
        assert_eq!(
            rows(&result),
            vec![Some("a!".to_string()), Some("b!".to_string())]
        );
    }
}
