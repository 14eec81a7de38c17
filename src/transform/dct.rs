use std::f64::consts::{FRAC_1_SQRT_2, PI};

use super::fft::check_len;
use crate::error::{Error, Result};

/// Orthonormal DCT-II basis value, including the `sqrt(2/n)` scale and the DC `1/√2` factor
#[inline]
pub(crate) fn basis(k: usize, i: usize, n: usize) -> f32 {
    let scale = (2.0 / n as f64).sqrt() * if k == 0 { FRAC_1_SQRT_2 } else { 1.0 };
    let angle = PI * k as f64 * (2 * i + 1) as f64 / (2 * n) as f64;
    (scale * angle.cos()) as f32
}

/// DCT-II of `input` into the first `output.len()` coefficients
pub fn dct2(input: &[f32], output: &mut [f32]) -> Result<()> {
    let n = input.len();
    if n == 0 {
        return Err(Error::Config("dct2 needs at least one input value".into()));
    }
    check_len("dct input", n, output.len())?;

    for (k, out) in output.iter_mut().enumerate() {
        let mut sum = 0.0f32;
        for (i, &x) in input.iter().enumerate() {
            sum += x * basis(k, i, n);
        }
        *out = sum;
    }
    Ok(())
}

/// Precomputed `m × n` basis for a fixed DCT shape
#[derive(Debug, Clone)]
pub struct DctTable {
    n: usize,
    m: usize,
    table: Vec<f32>,
}

impl DctTable {
    pub fn new(n: usize, m: usize) -> Result<Self> {
        if n == 0 || m == 0 || m > n {
            return Err(Error::Config(format!("dct table shape {m}x{n} is invalid")));
        }
        let table = (0..m)
            .flat_map(|k| (0..n).map(move |i| basis(k, i, n)))
            .collect();
        Ok(Self { n, m, table })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n, self.m)
    }

    pub fn row(&self, k: usize) -> &[f32] {
        &self.table[k * self.n..(k + 1) * self.n]
    }
}
