//! Benchmarks for the NNLS solver, the projection engine, and the full ALS driver.

use fastnmf::als::{NmfOptions, nmf};
use fastnmf::nnls::{NnlsOptions, nnls};
use fastnmf::project::{InputMatrix, ProjectOptions, project};

fn dense_random(m: usize, n: usize, seed: u64) -> faer::Mat<fastnmf::E> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z >> 11) as fastnmf::E * (1.0 / (1u64 << 53) as fastnmf::E)
    };
    faer::Mat::from_fn(m, n, |_, _| next())
}

fn spd(k: usize, seed: u64) -> faer::Mat<fastnmf::E> {
    let x = dense_random(k, k, seed);
    let gram = x.as_ref() * x.transpose();
    faer::Mat::from_fn(k, k, |i, j| gram[(i, j)] + if i == j { 1.0 } else { 0.0 })
}

#[divan::bench(args = [10, 50, 200])]
fn nnls_solve(k: usize) {
    let a = spd(k, 1);
    let b = dense_random(k, 8, 2);
    let options = NnlsOptions::new().with_fast_nnls(true).build().unwrap();
    divan::black_box(nnls(a.as_ref(), b.as_ref(), &options).unwrap());
}

#[divan::bench(args = [1, 2, 10, 50])]
fn project_update_h(k: usize) {
    let a = dense_random(200, 100, 3);
    let w = dense_random(200, k, 4);
    let options = ProjectOptions::new().build().unwrap();
    divan::black_box(project(InputMatrix::Dense(a.as_ref()), Some(w.as_ref()), None, &options).unwrap());
}

#[divan::bench(args = [5, 20])]
fn nmf_full_factorization(k: usize) {
    let a = dense_random(200, 150, 5);
    let options = NmfOptions::new().with_maxit(10).with_verbose(false).with_seed(11).build().unwrap();
    divan::black_box(nmf(InputMatrix::Dense(a.as_ref()), k, &options).unwrap());
}

fn main() {
    divan::main();
}
