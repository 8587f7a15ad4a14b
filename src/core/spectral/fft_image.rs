use anyhow::{bail, Result};
use candle_core::{Device, Tensor, Var};
use ndarray::{Array4, Array5};

use super::fft::{rfft2_ortho, spectrum_energy, InverseRfft2};
use super::freqs::{decay_scale, half_width};
use crate::core::color::decorrelate_inverse;
use crate::core::param::{random_normal, ImageParam, ParamConfig, ParamKind};
use crate::core::resume::{first_tensor, Resume, Source};
use crate::core::tensor_ops::{array_to_tensor, normalize_contrast};

/// 이미지에서 얻은 스펙트럼과 무작위 초기화 스케일의 차이를 메우는 경험적 보정 상수.
/// 기존 스냅샷과의 호환을 위해 값을 바꾸지 않는다.
pub const SPECTRUM_CALIBRATION: f64 = 500_000.0;

/// 푸리에 계수 파라미터화
pub struct FftImage {
    /// `[b, c, h, w2, 2]`
    coeffs: Var,
    /// `[1, 1, h, w2, 1]`
    scale: Tensor,
    inverse: InverseRfft2,
    size: (usize, usize),
    size_override: Option<(usize, usize)>,
}

impl FftImage {
    /// 무작위 초기화는 `seed_scale`을 이미 포함한다.
    /// 이미지/스냅샷에서 재개한 계수는 추가로 `seed_scale`을 곱하고, 메모리 계수는 그대로 쓴다.
    pub fn new(config: &ParamConfig, resume: Resume, device: &Device) -> Result<Self> {
        let [b, c, h, w] = config.shape;
        let (coeffs, size_override) = match resume.resolve(device)? {
            Source::Random => {
                let mut rng = config.rng();
                let shape = [b, c, h, half_width(w), 2];
                (random_normal(&shape, config.seed_scale, &mut rng, device)?, None)
            }
            Source::Image(image) => {
                let spectrum = image_to_coefficients(&image.pixels, config.decay_power, config.colors)?;
                let coeffs = array_to_tensor(&spectrum, device)?.affine(config.seed_scale, 0.0)?;
                (coeffs, Some(image.size))
            }
            Source::Snapshot(tensors) => {
                let coeffs = first_tensor(tensors)?.to_device(device)?;
                (coeffs.affine(config.seed_scale, 0.0)?, None)
            }
            Source::Coeffs(tensors) => (first_tensor(tensors)?.detach().to_device(device)?, None),
        };

        let (h, w) = size_override.unwrap_or((h, w));
        let (_, _, ch, cw2, parts) = coeffs.dims5()?;
        if ch != h || cw2 != half_width(w) || parts != 2 {
            bail!(
                "스펙트럼 계수 shape {:?}이(가) 목표 크기 {}x{}와 맞지 않음",
                coeffs.dims(),
                h,
                w
            );
        }

        let profile = decay_scale(h, w, config.decay_power);
        let scale = array_to_tensor(&profile.mapv(|v| v as f32), device)?
            .reshape((1, 1, h, half_width(w), 1))?;

        Ok(Self {
            coeffs: Var::from_tensor(&coeffs)?,
            scale,
            inverse: InverseRfft2::new(h, w, device)?,
            size: (h, w),
            size_override,
        })
    }

    fn render_from(&self, coeffs: &Tensor, shift: Option<&Tensor>, contrast: f64) -> Result<Tensor> {
        let mut scaled = coeffs.broadcast_mul(&self.scale)?;
        if let Some(shift) = shift {
            scaled = scaled.broadcast_add(&shift.broadcast_mul(&self.scale)?)?;
        }
        let image = self.inverse.apply(&scaled)?;
        normalize_contrast(&image, contrast)
    }
}

impl ImageParam for FftImage {
    fn kind(&self) -> ParamKind {
        ParamKind::Fft
    }

    fn vars(&self) -> Vec<Var> {
        vec![self.coeffs.clone()]
    }

    fn size(&self) -> (usize, usize) {
        self.size
    }

    fn size_override(&self) -> Option<(usize, usize)> {
        self.size_override
    }

    fn render(&self, shift: Option<&Tensor>, contrast: f64) -> Result<Tensor> {
        self.render_from(self.coeffs.as_tensor(), shift, contrast)
    }

    fn render_detached(&self, contrast: f64) -> Result<Tensor> {
        self.render_from(&self.coeffs.as_tensor().detach(), None, contrast)
    }

    fn shift_shape(&self) -> Option<Vec<usize>> {
        let (h, w) = self.size;
        Some(vec![1, 1, h, half_width(w), 1])
    }
}

/// RGB 이미지 `[b, 3, h, w]`(값 범위 [0,1])에서 원시 스펙트럼 계수를 얻는다.
///
/// 색 역변환 → 순방향 FFT → 감쇠 프로파일로 나눔 → 보정 상수 곱.
pub fn image_to_coefficients(image: &Array4<f32>, decay_power: f64, colors: f64) -> Result<Array5<f32>> {
    let (_, _, h, w) = image.dim();
    let decorrelated = decorrelate_inverse(image, colors)?;
    let mut spectrum = rfft2_ortho(&decorrelated);
    let profile = decay_scale(h, w, decay_power);
    for ((_, _, y, k, _), v) in spectrum.indexed_iter_mut() {
        *v = (*v as f64 / profile[[y, k]] * SPECTRUM_CALIBRATION) as f32;
    }
    log::debug!(
        "이미지 → 스펙트럼 {}x{}, 평균 에너지 {:.3e}",
        h,
        w,
        spectrum_energy(&spectrum)
    );
    Ok(spectrum)
}
