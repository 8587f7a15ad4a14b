//! # 색상 비상관화 코덱
//!
//! 경험적 RGB 상관 통계에서 얻은 3x3 기저로 비상관 색공간과 RGB를 오간다.
//! 순방향은 선형 변환 뒤 시그모이드로 (0,1)에 가두고, 역방향은 로짓 뒤 역행렬을 곱한다.

use anyhow::{anyhow, Result};
use candle_core::Tensor;
use nalgebra::Matrix3;
use ndarray::{Array4, Axis};

use crate::core::tensor_ops::array_to_tensor;


/// 색상 상관 행렬의 SVD 제곱근 (경험값)
pub const COLOR_CORRELATION_SVD_SQRT: [[f64; 3]; 3] = [
    [0.26, 0.09, 0.02],
    [0.27, 0.00, -0.05],
    [0.27, -0.09, 0.03],
];

/// 로짓 정의역 클램프
pub const LOGIT_EPS: f64 = 1e-12;

/// 정규화된 색상 기저와 그 역행렬
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBasis {
    pub matrix: Matrix3<f64>,
    pub inverse: Matrix3<f64>,
}

impl ColorBasis {
    /// `colors`로 첫 번째 기저 축을 나눈 뒤 최대 열 노름으로 정규화한다.
    /// 값이 클수록 채도가 낮아진다.
    pub fn new(colors: f64) -> Result<Self> {
        let mut matrix = Matrix3::from_fn(|r, c| COLOR_CORRELATION_SVD_SQRT[r][c]);
        matrix.column_mut(0).unscale_mut(colors);
        let max_norm = matrix
            .column_iter()
            .map(|col| col.norm())
            .fold(0.0f64, f64::max);
        let matrix = matrix.unscale(max_norm);
        let inverse = matrix
            .try_inverse()
            .ok_or_else(|| anyhow!("색상 기저가 특이 행렬임 (colors={})", colors))?;
        Ok(Self { matrix, inverse })
    }

    /// 픽셀 행벡터에 오른쪽에서 곱할 전치 행렬 (row-major)
    fn transposed_rows(m: &Matrix3<f64>) -> Vec<f32> {
        let t = m.transpose();
        (0..3)
            .flat_map(|r| (0..3).map(move |c| (r, c)))
            .map(|(r, c)| t[(r, c)] as f32)
            .collect()
    }
}

pub fn sigmoid(x: &Tensor) -> Result<Tensor> {
    Ok(x.neg()?.exp()?.affine(1.0, 1.0)?.recip()?)
}

/// 클램프된 로짓. 정밀도를 위해 f64로 계산한다.
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    (p / (1.0 - p)).ln()
}

/// 비상관 공간의 `[b, 3, h, w]` 이미지를 RGB로 보내고 시그모이드를 적용한다 (미분 가능).
pub fn decorrelate_forward(image: &Tensor, colors: f64) -> Result<Tensor> {
    let basis = ColorBasis::new(colors)?;
    let (b, c, h, w) = image.dims4()?;
    if c != 3 {
        return Err(anyhow!("RGB 채널 3개가 필요함: {}", c));
    }
    let mt = Tensor::from_vec(ColorBasis::transposed_rows(&basis.matrix), (3, 3), image.device())?
        .to_dtype(image.dtype())?;
    let pixels = image
        .permute((0, 2, 3, 1))?
        .contiguous()?
        .reshape((b * h * w, c))?
        .matmul(&mt)?;
    let rgb = pixels.reshape((b, h, w, c))?.permute((0, 3, 1, 2))?.contiguous()?;
    sigmoid(&rgb)
}

/// `decorrelate_forward`의 정확한 역변환. 입력 이미지에서 계수를 다시 얻을 때만 쓴다.
pub fn decorrelate_inverse(image: &Array4<f32>, colors: f64) -> Result<Array4<f32>> {
    let basis = ColorBasis::new(colors)?;
    if image.len_of(Axis(1)) != 3 {
        return Err(anyhow!("RGB 채널 3개가 필요함: {:?}", image.shape()));
    }
    let mut out = Array4::<f32>::zeros(image.raw_dim());
    for (src, mut dst) in image.outer_iter().zip(out.outer_iter_mut()) {
        let (_, h, w) = src.dim();
        for y in 0..h {
            for x in 0..w {
                let v = nalgebra::Vector3::new(
                    logit(src[[0, y, x]] as f64),
                    logit(src[[1, y, x]] as f64),
                    logit(src[[2, y, x]] as f64),
                );
                let u = basis.inverse * v;
                for ch in 0..3 {
                    dst[[ch, y, x]] = u[ch] as f32;
                }
            }
        }
    }
    Ok(out)
}

/// ndarray 입력을 받는 순방향 (장치는 CPU)
pub fn decorrelate_forward_array(image: &Array4<f32>, colors: f64) -> Result<Tensor> {
    let t = array_to_tensor(image, &candle_core::Device::Cpu)?;
    decorrelate_forward(&t, colors)
}
