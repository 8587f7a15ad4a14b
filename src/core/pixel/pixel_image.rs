use anyhow::{bail, Result};
use candle_core::{Device, Tensor, Var};

use crate::core::color::decorrelate_inverse;
use crate::core::param::{random_normal, ImageParam, ParamConfig, ParamKind};
use crate::core::resume::{first_tensor, Resume, Source};
use crate::core::tensor_ops::{array_to_tensor, normalize_contrast};

/// 이미지에서 재개할 때 쓰는 고정 색 포화도
pub const PIXEL_RESUME_COLORS: f64 = 2.0;

/// 픽셀 파라미터화
pub struct PixelImage {
    /// `[b, c, h, w]`
    pixels: Var,
    size: (usize, usize),
    size_override: Option<(usize, usize)>,
}

impl PixelImage {
    pub fn new(config: &ParamConfig, resume: Resume, device: &Device) -> Result<Self> {
        let [b, c, h, w] = config.shape;
        let (pixels, size_override) = match resume.resolve(device)? {
            Source::Random => {
                let mut rng = config.rng();
                (random_normal(&[b, c, h, w], config.pixel_sd, &mut rng, device)?, None)
            }
            Source::Image(image) => {
                // 중간 회색을 0 근처로 옮긴 뒤 색 역변환
                let centered = image.pixels.mapv(|v| v - 0.5);
                let decorrelated = decorrelate_inverse(&centered, PIXEL_RESUME_COLORS)?;
                (array_to_tensor(&decorrelated, device)?, Some(image.size))
            }
            Source::Snapshot(tensors) => (first_tensor(tensors)?.to_device(device)?, None),
            Source::Coeffs(tensors) => (first_tensor(tensors)?.detach().to_device(device)?, None),
        };

        let (h, w) = size_override.unwrap_or((h, w));
        let (_, pc, ph, pw) = pixels.dims4()?;
        if pc != c || ph != h || pw != w {
            bail!("픽셀 텐서 shape {:?}이(가) 목표 크기 {}x{}와 맞지 않음", pixels.dims(), h, w);
        }

        Ok(Self {
            pixels: Var::from_tensor(&pixels)?,
            size: (h, w),
            size_override,
        })
    }
}

impl ImageParam for PixelImage {
    fn kind(&self) -> ParamKind {
        ParamKind::Pixel
    }

    fn vars(&self) -> Vec<Var> {
        vec![self.pixels.clone()]
    }

    fn size(&self) -> (usize, usize) {
        self.size
    }

    fn size_override(&self) -> Option<(usize, usize)> {
        self.size_override
    }

    fn render(&self, _shift: Option<&Tensor>, contrast: f64) -> Result<Tensor> {
        normalize_contrast(self.pixels.as_tensor(), contrast)
    }

    fn render_detached(&self, contrast: f64) -> Result<Tensor> {
        normalize_contrast(&self.pixels.as_tensor().detach(), contrast)
    }
}
