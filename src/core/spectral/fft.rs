//! 직교 정규화(ortho) 실수 2D FFT
//!
//! 순방향은 resume 경로에서만 쓰이므로 rustfft로 CPU에서 계산한다.
//! 역방향은 학습 중 미분이 흘러야 하므로 DFT 기저 행렬을 candle 텐서로 들고 matmul로 계산한다.

use anyhow::{bail, Result};
use candle_core::{Device, Tensor};
use ndarray::{s, Array2, Array4, Array5, Axis};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

use super::freqs::half_width;
use crate::core::tensor_ops::matmul_last;

/// `[b, c, h, w]` 실수 이미지의 비중복 반스펙트럼 `[b, c, h, w2, 2]`
pub fn rfft2_ortho(image: &Array4<f32>) -> Array5<f32> {
    let (b, c, h, w) = image.dim();
    let w2 = half_width(w);
    let mut planner = FftPlanner::<f64>::new();
    let row_fft = planner.plan_fft_forward(w);
    let col_fft = planner.plan_fft_forward(h);
    let norm = 1.0 / ((h * w) as f64).sqrt();

    let planes: Vec<Array2<Complex<f64>>> = image
        .outer_iter()
        .flat_map(|batch| batch.outer_iter().map(|p| p.to_owned()).collect::<Vec<_>>())
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|plane| {
            // 행 방향 FFT 후 앞쪽 w2개만 유지
            let mut half = Array2::<Complex<f64>>::zeros((h, w2));
            let mut row = vec![Complex::new(0.0, 0.0); w];
            for y in 0..h {
                for x in 0..w {
                    row[x] = Complex::new(plane[[y, x]] as f64, 0.0);
                }
                row_fft.process(&mut row);
                for k in 0..w2 {
                    half[[y, k]] = row[k];
                }
            }
            // 열 방향 FFT (복소)
            let mut col = vec![Complex::new(0.0, 0.0); h];
            for k in 0..w2 {
                for y in 0..h {
                    col[y] = half[[y, k]];
                }
                col_fft.process(&mut col);
                for y in 0..h {
                    half[[y, k]] = col[y] * norm;
                }
            }
            half
        })
        .collect();

    let mut out = Array5::<f32>::zeros((b, c, h, w2, 2));
    for (i, spectrum) in planes.iter().enumerate() {
        let mut dst = out.slice_mut(s![i / c, i % c, .., .., ..]);
        for ((y, k), v) in spectrum.indexed_iter() {
            dst[[y, k, 0]] = v.re as f32;
            dst[[y, k, 1]] = v.im as f32;
        }
    }
    out
}

/// ortho 역 실수 2D FFT를 수행하는 조밀한 DFT 연산자
#[derive(Debug, Clone)]
pub struct InverseRfft2 {
    h: usize,
    w: usize,
    cos_h: Tensor,
    sin_h: Tensor,
    cos_w: Tensor,
    sin_w: Tensor,
}

impl InverseRfft2 {
    pub fn new(h: usize, w: usize, device: &Device) -> Result<Self> {
        let w2 = half_width(w);
        // 각도 오차를 줄이기 위해 k*m을 주기로 나눈 나머지로 계산
        let angle = |k: usize, m: usize, n: usize| 2.0 * PI * ((k * m) % n) as f64 / n as f64;

        let mut cos_h = Vec::with_capacity(h * h);
        let mut sin_h = Vec::with_capacity(h * h);
        for m in 0..h {
            for k in 0..h {
                let a = angle(k, m, h);
                cos_h.push(a.cos() as f32);
                sin_h.push(a.sin() as f32);
            }
        }

        // 반스펙트럼 가중치: DC와 (짝수 폭의) 나이퀴스트는 1, 나머지는 켤레 대칭분까지 2
        let norm = 1.0 / ((h * w) as f64).sqrt();
        let mut cos_w = Vec::with_capacity(w2 * w);
        let mut sin_w = Vec::with_capacity(w2 * w);
        for l in 0..w2 {
            let weight = if l == 0 || (w % 2 == 0 && l == w / 2) { 1.0 } else { 2.0 };
            for n in 0..w {
                let a = angle(l, n, w);
                cos_w.push((weight * norm * a.cos()) as f32);
                sin_w.push((weight * norm * a.sin()) as f32);
            }
        }

        Ok(Self {
            h,
            w,
            cos_h: Tensor::from_vec(cos_h, (h, h), device)?,
            sin_h: Tensor::from_vec(sin_h, (h, h), device)?,
            cos_w: Tensor::from_vec(cos_w, (w2, w), device)?,
            sin_w: Tensor::from_vec(sin_w, (w2, w), device)?,
        })
    }

    pub fn output_size(&self) -> (usize, usize) {
        (self.h, self.w)
    }

    /// `[b, c, h, w2, 2]` 스펙트럼 → `[b, c, h, w]` 이미지
    pub fn apply(&self, spectrum: &Tensor) -> Result<Tensor> {
        let (_, _, h, w2, parts) = spectrum.dims5()?;
        if h != self.h || w2 != half_width(self.w) || parts != 2 {
            bail!(
                "스펙트럼 shape {:?}이(가) 출력 크기 {}x{}와 맞지 않음",
                spectrum.dims(),
                self.h,
                self.w
            );
        }
        let re = spectrum.narrow(4, 0, 1)?.squeeze(4)?.contiguous()?;
        let im = spectrum.narrow(4, 1, 1)?.squeeze(4)?.contiguous()?;

        // 세로축: 복소 역 DFT
        let yr = (self.cos_h.broadcast_matmul(&re)? - self.sin_h.broadcast_matmul(&im)?)?;
        let yi = (self.sin_h.broadcast_matmul(&re)? + self.cos_h.broadcast_matmul(&im)?)?;

        // 가로축: 켤레 대칭을 이용한 실수 복원. DC/나이퀴스트의 허수부는 sin=0이라 자연히 무시된다.
        Ok((matmul_last(&yr, &self.cos_w)? - matmul_last(&yi, &self.sin_w)?)?)
    }
}

/// 배치/채널 축을 따라 평균을 낸 스펙트럼 에너지 (로그용)
pub fn spectrum_energy(spectrum: &Array5<f32>) -> f64 {
    spectrum
        .mapv(|v| (v as f64) * (v as f64))
        .sum_axis(Axis(4))
        .mean()
        .unwrap_or(0.0)
}
