#![allow(clippy::unwrap_used)]

use std::cell::Cell;

use divan::Bencher;
use mosaic_array::array_util::create_array;
use mosaic_array::{
    Array, ArrayOpsUtil, IterationMode, Required, SparseArrayBuilder, create_pointwise_op,
};
use rand::prelude::StdRng;
use rand::{Rng, SeedableRng};

fn main() {
    divan::main();
}

const ARRAY_SIZE: usize = 1_000_000;

fn sparse(density: f64, default: Option<i64>, rng: &mut StdRng) -> Array<i64> {
    let mut builder = SparseArrayBuilder::new(ARRAY_SIZE, default);
    for id in 0..ARRAY_SIZE {
        if rng.random_bool(density) {
            builder.add(id, rng.random_range(0..1_000));
        }
    }
    builder.build()
}

fn dense(rng: &mut StdRng) -> Array<i64> {
    create_array((0..ARRAY_SIZE).map(|_| rng.random_bool(0.9).then(|| rng.random_range(0..1_000))))
}

#[divan::bench(args = [0.001, 0.01, 0.1])]
fn add_sparse_to_dense(bencher: Bencher, density: f64) {
    let mut rng = StdRng::seed_from_u64(0);
    let lhs = dense(&mut rng);
    let rhs = sparse(density, Some(1), &mut rng);
    let add = create_pointwise_op(|(a, b): (i64, i64)| a + b);

    bencher
        .with_inputs(|| (Required(lhs.clone()), Required(rhs.clone())))
        .bench_values(|args| add.apply(args).unwrap());
}

#[divan::bench(args = [0.001, 0.01, 0.1])]
fn add_sparse_to_sparse(bencher: Bencher, density: f64) {
    let mut rng = StdRng::seed_from_u64(0);
    let lhs = sparse(density, None, &mut rng);
    let rhs = sparse(density, None, &mut rng);
    let add = create_pointwise_op(|(a, b): (i64, i64)| a + b);

    bencher
        .with_inputs(|| (Required(lhs.clone()), Required(rhs.clone())))
        .bench_values(|args| add.apply(args).unwrap());
}

fn iterate_sparse(bencher: Bencher, mode: IterationMode) {
    let mut rng = StdRng::seed_from_u64(0);
    let lhs = sparse(0.01, Some(0), &mut rng);
    let rhs = sparse(0.01, Some(0), &mut rng);
    let util = ArrayOpsUtil::new((Required(lhs), Required(rhs)), mode).unwrap();

    bencher.bench(|| {
        let sum = Cell::new(0i64);
        util.iterate(
            0,
            util.size(),
            |_, (a, b)| sum.set(sum.get() + a * b),
            |_, _| {},
            |_, count, (a, b)| sum.set(sum.get() + a * b * count as i64),
        );
        sum.get()
    });
}

#[divan::bench]
fn iterate_sparse_native(bencher: Bencher) {
    iterate_sparse(bencher, IterationMode::Native)
}

#[divan::bench]
fn iterate_sparse_densified(bencher: Bencher) {
    iterate_sparse(bencher, IterationMode::Densify)
}

#[divan::bench(args = [0.001, 0.1])]
fn to_sparse_form(bencher: Bencher, density: f64) {
    let mut rng = StdRng::seed_from_u64(0);
    let array = sparse(density, Some(0), &mut rng).to_dense_form();

    bencher
        .with_inputs(|| &array)
        .bench_refs(|array| array.to_sparse_form(Some(0)));
}
