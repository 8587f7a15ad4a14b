//! candle 텐서와 ndarray 배열 사이의 변환, 그리고 공용 정규화 연산

use anyhow::{bail, Result};
use candle_core::{Device, Tensor};
use ndarray::{Array, Array4, Array5, Dimension, IxDyn};

/// ndarray 배열을 같은 shape의 f32 텐서로 옮긴다
pub fn array_to_tensor<D: Dimension>(array: &Array<f32, D>, device: &Device) -> Result<Tensor> {
    let shape = array.shape().to_vec();
    let data = array.as_standard_layout().iter().copied().collect::<Vec<f32>>();
    Ok(Tensor::from_vec(data, shape, device)?)
}

fn tensor_to_dyn(tensor: &Tensor) -> Result<Array<f32, IxDyn>> {
    let dims = tensor.dims().to_vec();
    let data = tensor.flatten_all()?.to_vec1::<f32>()?;
    Ok(Array::from_shape_vec(IxDyn(&dims), data)?)
}

pub fn tensor_to_array4(tensor: &Tensor) -> Result<Array4<f32>> {
    if tensor.rank() != 4 {
        bail!("4차원 텐서가 필요함: {:?}", tensor.dims());
    }
    Ok(tensor_to_dyn(tensor)?.into_dimensionality()?)
}

pub fn tensor_to_array5(tensor: &Tensor) -> Result<Array5<f32>> {
    if tensor.rank() != 5 {
        bail!("5차원 텐서가 필요함: {:?}", tensor.dims());
    }
    Ok(tensor_to_dyn(tensor)?.into_dimensionality()?)
}

/// 표본 표준편차(n-1)가 `contrast`가 되도록 전체 텐서를 다시 스케일한다.
///
/// 렌더링마다 호출되므로 계수의 현재 크기와 무관하게 그래디언트 크기가 유지된다.
pub fn normalize_contrast(image: &Tensor, contrast: f64) -> Result<Tensor> {
    let n = image.elem_count();
    if n < 2 {
        bail!("표준편차를 계산하려면 원소가 2개 이상 필요함");
    }
    let mean = image.mean_all()?;
    let centered = image.broadcast_sub(&mean)?;
    let std = centered
        .sqr()?
        .sum_all()?
        .affine(1.0 / (n - 1) as f64, 0.0)?
        .sqrt()?;
    Ok(image.broadcast_div(&std)?.affine(contrast, 0.0)?)
}

/// 표본 표준편차 (테스트와 로그용)
pub fn sample_std(image: &Tensor) -> Result<f32> {
    let values = image.flatten_all()?.to_dtype(candle_core::DType::F64)?.to_vec1::<f64>()?;
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Ok(var.sqrt() as f32)
}

/// `x [.., m, n]`에 오른쪽에서 `rhs [n, k]`를 곱한다.
///
/// 선행 차원을 한 축으로 접어서 2차원 matmul 한 번으로 처리한다.
pub fn matmul_last(x: &Tensor, rhs: &Tensor) -> Result<Tensor> {
    let dims = x.dims().to_vec();
    let n = *dims.last().unwrap_or(&0);
    let (rn, k) = rhs.dims2()?;
    if n != rn {
        bail!("matmul 차원 불일치: {:?} x {:?}", dims, rhs.dims());
    }
    let rows = x.elem_count() / n.max(1);
    let mut out_dims = dims.clone();
    if let Some(last) = out_dims.last_mut() {
        *last = k;
    }
    let flat = x.contiguous()?.reshape((rows, n))?;
    Ok(flat.matmul(rhs)?.reshape(out_dims)?)
}
