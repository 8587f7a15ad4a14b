//! 렌더링 이미지에서 인코더 입력 크기의 표본을 뽑는다

use anyhow::{bail, Result};
use candle_core::Tensor;
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::core::tensor_ops::{array_to_tensor, matmul_last};

/// 표본 추출기
pub trait Sampler {
    /// `[1, 3, h, w]` → `[count, 3, size, size]` (미분 가능)
    fn sample(&mut self, image: &Tensor, count: usize, size: usize) -> Result<Tensor>;
}

/// 크롭 위치 분포
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Align {
    /// 균등 분포
    Uniform,
    /// 중앙 근처 정규 분포
    Central,
}

impl FromStr for Align {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "uniform" => Ok(Align::Uniform),
            "central" => Ok(Align::Central),
            other => bail!("지원하지 않는 정렬: {} (uniform, central)", other),
        }
    }
}

/// 크롭 창 `(y, x, side)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub y: usize,
    pub x: usize,
    pub side: usize,
}

/// 정사각 랜덤 크롭 + 면적 가중 리샘플링
pub struct CropSampler {
    rng: StdRng,
    align: Align,
    /// 큰 크롭만 고를 확률
    macro_prob: f64,
    /// 짧은 변 대비 최소 크롭 비율
    min_fraction: f64,
    resize_cache: HashMap<(usize, usize), (Tensor, Tensor)>,
}

impl CropSampler {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
            align: Align::Uniform,
            macro_prob: 0.4,
            min_fraction: 0.25,
            resize_cache: HashMap::new(),
        }
    }

    pub fn with_align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn with_macro(mut self, macro_prob: f64) -> Self {
        self.macro_prob = macro_prob.clamp(0.0, 1.0);
        self
    }

    fn offset_fraction(&mut self) -> f64 {
        match self.align {
            Align::Uniform => self.rng.gen::<f64>(),
            Align::Central => {
                let z: f64 = self.rng.sample(StandardNormal);
                (0.5 + 0.2 * z).clamp(0.0, 1.0)
            }
        }
    }

    /// `h x w` 이미지 안의 크롭 창 `count`개
    pub fn windows(&mut self, h: usize, w: usize, count: usize) -> Vec<Window> {
        let max_side = h.min(w);
        let min_side = ((max_side as f64 * self.min_fraction) as usize).clamp(1, max_side);
        (0..count)
            .map(|_| {
                let lower = if self.rng.gen::<f64>() < self.macro_prob {
                    ((max_side as f64 * 0.9) as usize).max(min_side)
                } else {
                    min_side
                };
                let side = lower + (self.rng.gen::<f64>() * (max_side - lower) as f64).round() as usize;
                let side = side.min(max_side);
                let y = (self.offset_fraction() * (h - side) as f64).round() as usize;
                let x = (self.offset_fraction() * (w - side) as f64).round() as usize;
                Window { y, x, side }
            })
            .collect()
    }

    fn resize_ops(&mut self, side: usize, size: usize, image: &Tensor) -> Result<(Tensor, Tensor)> {
        if let Some(ops) = self.resize_cache.get(&(side, size)) {
            return Ok(ops.clone());
        }
        let m = area_matrix(side, size);
        let rows = array_to_tensor(&m, image.device())?;
        let cols = rows.t()?.contiguous()?;
        self.resize_cache.insert((side, size), (rows.clone(), cols.clone()));
        Ok((rows, cols))
    }
}

impl Sampler for CropSampler {
    fn sample(&mut self, image: &Tensor, count: usize, size: usize) -> Result<Tensor> {
        let (_, _, h, w) = image.dims4()?;
        if count == 0 {
            bail!("표본 개수는 1 이상이어야 함");
        }
        let mut crops = Vec::with_capacity(count);
        for window in self.windows(h, w, count) {
            let (rows, cols) = self.resize_ops(window.side, size, image)?;
            let crop = image
                .narrow(2, window.y, window.side)?
                .narrow(3, window.x, window.side)?
                .contiguous()?;
            crops.push(matmul_last(&rows.broadcast_matmul(&crop)?, &cols)?);
        }
        Ok(Tensor::cat(&crops, 0)?)
    }
}

/// 길이 `src` → `dst` 면적 가중 리샘플링 행렬 `[dst, src]`. 각 행의 합은 1이다.
pub fn area_matrix(src: usize, dst: usize) -> Array2<f32> {
    let scale = src as f64 / dst as f64;
    let mut m = Array2::<f32>::zeros((dst, src));
    for i in 0..dst {
        let start = i as f64 * scale;
        let end = (i + 1) as f64 * scale;
        let first = start.floor() as usize;
        let last = (end.ceil() as usize).min(src);
        for j in first..last {
            let overlap = end.min((j + 1) as f64) - start.max(j as f64);
            if overlap > 0.0 {
                m[[i, j]] = (overlap / scale) as f32;
            }
        }
    }
    m
}
