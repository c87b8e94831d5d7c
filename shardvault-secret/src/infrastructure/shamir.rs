//! GF(256) 上の Shamir 秘密分散。
//!
//! 各シェアは `y_0 || y_1 || ... || y_{n-1} || x` のバイト列で、末尾 1 バイトが x 座標。
//! 秘密値の各バイトごとに独立な多項式を使う。

use gf256::gf256;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::domain::secret::{Shard, ThresholdError, ThresholdScheme};

/// x 座標は 1..=255 で、0 は秘密値そのものになるので使わない。
const MAX_PARTS: usize = 255;

#[derive(Debug, Default, Clone, Copy)]
pub struct ShamirThresholdScheme;

impl ShamirThresholdScheme {
    /// Horner 法で f(x) を評価する。`coefficients[0]` が定数項。
    fn evaluate(coefficients: &[gf256], x: gf256) -> gf256 {
        coefficients
            .iter()
            .rev()
            .fold(gf256::new(0), |acc, &c| acc * x + c)
    }

    /// Lagrange 補間で f(0) を求める。
    fn interpolate_at_zero(points: &[(gf256, gf256)]) -> gf256 {
        let mut acc = gf256::new(0);
        for (j, &(x_j, y_j)) in points.iter().enumerate() {
            let mut basis = gf256::new(1);
            for (m, &(x_m, _)) in points.iter().enumerate() {
                if m != j {
                    // 標数 2 なので (0 - x_m) / (x_j - x_m) = x_m / (x_m - x_j)
                    basis = basis * x_m / (x_m - x_j);
                }
            }
            acc = acc + y_j * basis;
        }
        acc
    }
}

impl ThresholdScheme for ShamirThresholdScheme {
    fn split(
        &self,
        secret: &[u8],
        parts: usize,
        threshold: usize,
    ) -> Result<Vec<Shard>, ThresholdError> {
        if threshold < 2 {
            return Err(ThresholdError::InvalidParameters(format!(
                "threshold must be at least 2, got {threshold}"
            )));
        }
        if parts < threshold {
            return Err(ThresholdError::InvalidParameters(format!(
                "parts ({parts}) must not be less than threshold ({threshold})"
            )));
        }
        if parts > MAX_PARTS {
            return Err(ThresholdError::InvalidParameters(format!(
                "parts must be at most {MAX_PARTS}, got {parts}"
            )));
        }
        if secret.is_empty() {
            return Err(ThresholdError::InvalidParameters(
                "secret must not be empty".into(),
            ));
        }

        let mut ys: Vec<Zeroizing<Vec<u8>>> = (0..parts)
            .map(|_| Zeroizing::new(Vec::with_capacity(secret.len() + 1)))
            .collect();

        let mut random = Zeroizing::new(vec![0u8; threshold - 1]);
        let mut coefficients = vec![gf256::new(0); threshold];

        for &byte in secret {
            OsRng.fill_bytes(&mut random);
            coefficients[0] = gf256::new(byte);
            for (c, &r) in coefficients[1..].iter_mut().zip(random.iter()) {
                *c = gf256::new(r);
            }

            for (i, y) in ys.iter_mut().enumerate() {
                let x = gf256::new((i + 1) as u8);
                y.push(u8::from(Self::evaluate(&coefficients, x)));
            }
        }
        coefficients.fill(gf256::new(0));

        Ok(ys
            .into_iter()
            .enumerate()
            .map(|(i, mut y)| {
                y.push((i + 1) as u8);
                Shard::new(std::mem::take(&mut *y))
            })
            .collect())
    }

    fn combine(&self, shards: &[Shard]) -> Result<Zeroizing<Vec<u8>>, ThresholdError> {
        if shards.len() < 2 {
            return Err(ThresholdError::InsufficientShares(shards.len()));
        }

        let len = shards[0].len();
        if len < 2 {
            return Err(ThresholdError::Malformed(format!(
                "share too short: {len} bytes"
            )));
        }
        if shards.iter().any(|s| s.len() != len) {
            return Err(ThresholdError::Malformed("share lengths differ".into()));
        }

        let xs: Vec<u8> = shards.iter().map(|s| s.as_bytes()[len - 1]).collect();
        for (i, &x) in xs.iter().enumerate() {
            if x == 0 {
                return Err(ThresholdError::Malformed("share has x coordinate 0".into()));
            }
            if xs[..i].contains(&x) {
                return Err(ThresholdError::Malformed(format!(
                    "duplicate x coordinate {x}"
                )));
            }
        }

        let mut secret = Zeroizing::new(Vec::with_capacity(len - 1));
        let mut points = Vec::with_capacity(shards.len());
        for idx in 0..len - 1 {
            points.clear();
            points.extend(
                shards
                    .iter()
                    .zip(&xs)
                    .map(|(s, &x)| (gf256::new(x), gf256::new(s.as_bytes()[idx]))),
            );
            secret.push(u8::from(Self::interpolate_at_zero(&points)));
        }
        Ok(secret)
    }
}
