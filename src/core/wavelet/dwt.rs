//! 다단계 2D 이산 웨이블릿 변환
//!
//! 분해는 resume 경로에서만 쓰이므로 ndarray(f64)로 직접 계산한다.
//! 재구성은 학습 그래프 안에 있으므로 레벨별 합성 행렬을 candle 텐서로 들고 matmul로 계산한다.
//! 계수 길이는 `floor((n + L - 1) / 2)`이고, 대칭 확장과 0 패딩 모두 같은 합성 연산자로 완전 복원된다.

use anyhow::{bail, Result};
use candle_core::{Device, Tensor};
use ndarray::{s, Array2, Array4, Array5};
use serde::Serialize;

use super::filters::{FilterBank, Wavelet};
use crate::core::tensor_ops::matmul_last;

/// 경계 확장 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoundaryMode {
    /// 반 샘플 대칭 확장 `[b a | a b c | c b]`
    Symmetric,
    /// 0 패딩
    Zero,
}

/// 한 축의 계수 길이
pub fn coeff_len(n: usize, filter_len: usize) -> usize {
    (n + filter_len - 1) / 2
}

/// Haar 기준 최대 분해 깊이 `floor(log2(min(h, w)))`
pub fn max_level(h: usize, w: usize) -> usize {
    let m = h.min(w);
    if m == 0 {
        return 0;
    }
    (usize::BITS - 1 - m.leading_zeros()) as usize
}

/// 레벨별 상세 대역의 공간 크기 (가장 세밀한 레벨부터)
pub fn band_sizes(h: usize, w: usize, filter_len: usize, levels: usize) -> Vec<(usize, usize)> {
    let mut sizes = Vec::with_capacity(levels);
    let (mut ch, mut cw) = (h, w);
    for _ in 0..levels {
        ch = coeff_len(ch, filter_len);
        cw = coeff_len(cw, filter_len);
        sizes.push((ch, cw));
    }
    sizes
}

fn symmetric_index(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let i = i.rem_euclid(period);
    if i < n as isize {
        i as usize
    } else {
        (period - 1 - i) as usize
    }
}

/// 1D 분석 필터링 + 2배 다운샘플
pub fn analyze_1d(x: &[f64], filter: &[f64], mode: BoundaryMode) -> Vec<f64> {
    let n = x.len();
    let l = filter.len();
    let out = coeff_len(n, l);
    if out == 0 {
        return Vec::new();
    }
    let pad = 2 * (out - 1) + l - n;
    let left = (pad / 2) as isize;
    (0..out)
        .map(|k| {
            (0..l)
                .map(|j| {
                    let i = (2 * k + j) as isize - left;
                    let v = match mode {
                        BoundaryMode::Zero => {
                            if i >= 0 && (i as usize) < n {
                                x[i as usize]
                            } else {
                                0.0
                            }
                        }
                        BoundaryMode::Symmetric => x[symmetric_index(i, n)],
                    };
                    v * filter[l - 1 - j]
                })
                .sum()
        })
        .collect()
}

fn analyze_rows(plane: &Array2<f64>, filter: &[f64], mode: BoundaryMode) -> Array2<f64> {
    let (rows, cols) = plane.dim();
    let out = coeff_len(cols, filter.len());
    let mut result = Array2::<f64>::zeros((rows, out));
    for (r, row) in plane.outer_iter().enumerate() {
        let filtered = analyze_1d(&row.to_vec(), filter, mode);
        result.row_mut(r).assign(&ndarray::Array1::from(filtered));
    }
    result
}

fn analyze_cols(plane: &Array2<f64>, filter: &[f64], mode: BoundaryMode) -> Array2<f64> {
    analyze_rows(&plane.t().to_owned(), filter, mode).reversed_axes()
}

/// 한 레벨 분해: `(ll, [lh, hl, hh])`.
/// 가로(폭) 방향을 먼저 거른 뒤 세로 방향을 거른다.
fn analyze_level(plane: &Array2<f64>, bank: &FilterBank, mode: BoundaryMode) -> (Array2<f64>, [Array2<f64>; 3]) {
    let lo_w = analyze_rows(plane, &bank.dec_lo, mode);
    let hi_w = analyze_rows(plane, &bank.dec_hi, mode);
    let ll = analyze_cols(&lo_w, &bank.dec_lo, mode);
    let lh = analyze_cols(&lo_w, &bank.dec_hi, mode);
    let hl = analyze_cols(&hi_w, &bank.dec_lo, mode);
    let hh = analyze_cols(&hi_w, &bank.dec_hi, mode);
    (ll, [lh, hl, hh])
}

/// 다단계 분해 결과
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// `[b, c, h_J, w_J]`
    pub approx: Array4<f32>,
    /// `[b, c, 3, h_j, w_j]`, 가장 세밀한 레벨부터
    pub details: Vec<Array5<f32>>,
}

impl Decomposition {
    pub fn levels(&self) -> usize {
        self.details.len()
    }

    pub fn detail_sizes(&self) -> Vec<(usize, usize)> {
        self.details.iter().map(|d| (d.shape()[3], d.shape()[4])).collect()
    }
}

/// `[b, c, h, w]` 이미지를 `levels`단계 분해한다
pub fn dwt2(image: &Array4<f32>, wavelet: Wavelet, levels: usize, mode: BoundaryMode) -> Decomposition {
    let (b, c, h, w) = image.dim();
    let bank = wavelet.filter_bank();
    let sizes = band_sizes(h, w, bank.len(), levels);
    let (ah, aw) = sizes.last().copied().unwrap_or((h, w));

    let mut approx = Array4::<f32>::zeros((b, c, ah, aw));
    let mut details: Vec<Array5<f32>> = sizes
        .iter()
        .map(|&(dh, dw)| Array5::<f32>::zeros((b, c, 3, dh, dw)))
        .collect();

    for bi in 0..b {
        for ci in 0..c {
            let mut plane = image.slice(s![bi, ci, .., ..]).mapv(|v| v as f64);
            for (j, detail) in details.iter_mut().enumerate() {
                let (ll, bands) = analyze_level(&plane, &bank, mode);
                for (k, band) in bands.iter().enumerate() {
                    detail
                        .slice_mut(s![bi, ci, k, .., ..])
                        .assign(&band.mapv(|v| v as f32));
                }
                debug_assert_eq!(ll.dim(), sizes[j]);
                plane = ll;
            }
            approx.slice_mut(s![bi, ci, .., ..]).assign(&plane.mapv(|v| v as f32));
        }
    }
    Decomposition { approx, details }
}

/// 전치 합성 필터링 행렬 `[target, n]`: `y[t] = Σ_k x[k] g[t + L - 2 - 2k]`
fn synthesis_matrix(filter: &[f64], n: usize, target: usize) -> Array2<f32> {
    let l = filter.len() as isize;
    let pad = l - 2;
    Array2::from_shape_fn((target, n), |(t, k)| {
        let j = t as isize + pad - 2 * k as isize;
        if j >= 0 && j < l {
            filter[j as usize] as f32
        } else {
            0.0
        }
    })
}

fn to_tensor(m: &Array2<f32>, device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_vec(m.iter().copied().collect::<Vec<_>>(), m.dim(), device)?)
}

#[derive(Debug, Clone)]
struct LevelSynthesis {
    /// `[target_h, n_h]`
    g0_h: Tensor,
    g1_h: Tensor,
    /// `[n_w, target_w]`
    g0_w_t: Tensor,
    g1_w_t: Tensor,
}

/// 다단계 역변환 연산자 (미분 가능)
#[derive(Debug, Clone)]
pub struct Synthesis {
    levels: Vec<LevelSynthesis>,
    size: (usize, usize),
}

impl Synthesis {
    pub fn new(h: usize, w: usize, wavelet: Wavelet, levels: usize, device: &Device) -> Result<Self> {
        let bank = wavelet.filter_bank();
        let sizes = band_sizes(h, w, bank.len(), levels);
        let mut out = Vec::with_capacity(levels);
        for j in 0..levels {
            let (nh, nw) = sizes[j];
            // 레벨 j의 합성 결과는 레벨 j 분해 입력 크기와 같다
            let (th, tw) = if j == 0 { (h, w) } else { sizes[j - 1] };
            out.push(LevelSynthesis {
                g0_h: to_tensor(&synthesis_matrix(&bank.rec_lo, nh, th), device)?,
                g1_h: to_tensor(&synthesis_matrix(&bank.rec_hi, nh, th), device)?,
                g0_w_t: to_tensor(&synthesis_matrix(&bank.rec_lo, nw, tw).reversed_axes(), device)?,
                g1_w_t: to_tensor(&synthesis_matrix(&bank.rec_hi, nw, tw).reversed_axes(), device)?,
            });
        }
        Ok(Self { levels: out, size: (h, w) })
    }

    pub fn levels(&self) -> usize {
        self.levels.len()
    }

    pub fn output_size(&self) -> (usize, usize) {
        self.size
    }

    /// 근사 대역과 (이미 스케일된) 상세 대역으로 이미지를 복원한다
    pub fn apply(&self, approx: &Tensor, details: &[Tensor]) -> Result<Tensor> {
        if details.len() != self.levels.len() {
            bail!("상세 대역 {}개가 필요함: {}개", self.levels.len(), details.len());
        }
        let mut ll = approx.contiguous()?;
        for (level, detail) in self.levels.iter().zip(details.iter()).rev() {
            let band = |k: usize| -> Result<Tensor> {
                Ok(detail.narrow(2, k, 1)?.squeeze(2)?.contiguous()?)
            };
            let (lh, hl, hh) = (band(0)?, band(1)?, band(2)?);
            // 세로축 합성
            let lo = (level.g0_h.broadcast_matmul(&ll)? + level.g1_h.broadcast_matmul(&lh)?)?;
            let hi = (level.g0_h.broadcast_matmul(&hl)? + level.g1_h.broadcast_matmul(&hh)?)?;
            // 가로축 합성
            ll = (matmul_last(&lo, &level.g0_w_t)? + matmul_last(&hi, &level.g1_w_t)?)?;
        }
        Ok(ll)
    }
}
