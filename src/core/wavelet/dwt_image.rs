use anyhow::{bail, Result};
use candle_core::{Device, Tensor, Var};
use ndarray::Array4;

use super::dwt::{band_sizes, dwt2, max_level, BoundaryMode, Decomposition, Synthesis};
use super::filters::Wavelet;
use crate::core::color::decorrelate_inverse;
use crate::core::param::{random_normal, ImageParam, ParamConfig, ParamKind};
use crate::core::resume::{Resume, Source};
use crate::core::tensor_ops::{array_to_tensor, normalize_contrast};

/// 레벨별 상세 대역 스케일 `((h0*w0)/(h_j*w_j))^(1 - sharpness)`.
/// `(h0, w0)`는 가장 세밀한 상세 대역의 크기다.
pub fn dwt_scale(detail_sizes: &[(usize, usize)], sharpness: f64) -> Vec<f64> {
    let Some(&(h0, w0)) = detail_sizes.first() else {
        return Vec::new();
    };
    let finest = (h0 * w0) as f64;
    detail_sizes
        .iter()
        .map(|&(h, w)| (finest / (h * w) as f64).powf(1.0 - sharpness))
        .collect()
}

/// RGB 이미지 `[b, 3, h, w]`에서 렌더링 스케일을 되돌린 웨이블릿 대역을 얻는다.
///
/// 색 역변환 → 이미지 크기로 정한 깊이까지 0 패딩 분해 → 상세 대역을 레벨 스케일로 나눔.
pub fn image_to_bands(
    image: &Array4<f32>,
    wavelet: Wavelet,
    sharpness: f64,
    colors: f64,
) -> Result<Decomposition> {
    let (_, _, h, w) = image.dim();
    let decorrelated = decorrelate_inverse(image, colors)?;
    let mut bands = dwt2(&decorrelated, wavelet, max_level(h, w), BoundaryMode::Zero);
    let scale = dwt_scale(&bands.detail_sizes(), sharpness);
    for (detail, s) in bands.details.iter_mut().zip(scale.iter()) {
        detail.mapv_inplace(|v| (v as f64 / s) as f32);
    }
    log::debug!(
        "이미지 → 웨이블릿 {}x{}, {} 레벨 ({})",
        h,
        w,
        bands.levels(),
        wavelet
    );
    Ok(bands)
}

/// 웨이블릿 계수 파라미터화
pub struct DwtImage {
    /// `[approx, detail_0, .., detail_{J-1}]`
    bands: Vec<Var>,
    /// 상세 대역별 스케일
    scale: Vec<f64>,
    synthesis: Synthesis,
    wavelet: Wavelet,
    size: (usize, usize),
    size_override: Option<(usize, usize)>,
}

impl DwtImage {
    pub fn new(config: &ParamConfig, resume: Resume, device: &Device) -> Result<Self> {
        let [b, c, h, w] = config.shape;
        let wavelet = config.wavelet;
        let filter_len = wavelet.rec_lo().len();

        let (bands, size_override): (Vec<Tensor>, _) = match resume.resolve(device)? {
            Source::Random => {
                let mut rng = config.rng();
                let sizes = band_sizes(h, w, filter_len, max_level(h, w));
                let (ah, aw) = sizes.last().copied().unwrap_or((h, w));
                let mut bands = vec![random_normal(&[b, c, ah, aw], 1.0, &mut rng, device)?];
                for &(dh, dw) in &sizes {
                    bands.push(random_normal(&[b, c, 3, dh, dw], 1.0, &mut rng, device)?);
                }
                (bands, None)
            }
            Source::Image(image) => {
                let decomposition = image_to_bands(&image.pixels, wavelet, config.sharpness, config.colors)?;
                let mut bands = vec![array_to_tensor(&decomposition.approx, device)?];
                for detail in &decomposition.details {
                    bands.push(array_to_tensor(detail, device)?);
                }
                (bands, Some(image.size))
            }
            Source::Snapshot(tensors) => (
                tensors
                    .into_iter()
                    .map(|t| Ok(t.to_device(device)?))
                    .collect::<Result<Vec<_>>>()?,
                None,
            ),
            Source::Coeffs(tensors) => (
                tensors
                    .into_iter()
                    .map(|t| Ok(t.detach().to_device(device)?))
                    .collect::<Result<Vec<_>>>()?,
                None,
            ),
        };

        let (h, w) = size_override.unwrap_or((h, w));
        let levels = max_level(h, w);
        let sizes = band_sizes(h, w, filter_len, levels);
        validate_bands(&bands, &sizes, (h, w))?;

        Ok(Self {
            bands: bands.iter().map(Var::from_tensor).collect::<candle_core::Result<Vec<_>>>()?,
            scale: dwt_scale(&sizes, config.sharpness),
            synthesis: Synthesis::new(h, w, wavelet, levels, device)?,
            wavelet,
            size: (h, w),
            size_override,
        })
    }

    pub fn wavelet(&self) -> Wavelet {
        self.wavelet
    }

    pub fn levels(&self) -> usize {
        self.synthesis.levels()
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    fn render_from(&self, bands: &[Tensor], contrast: f64) -> Result<Tensor> {
        let details = bands[1..]
            .iter()
            .zip(self.scale.iter())
            .map(|(d, s)| Ok(d.affine(*s, 0.0)?))
            .collect::<Result<Vec<_>>>()?;
        let image = self.synthesis.apply(&bands[0], &details)?;
        normalize_contrast(&image, contrast)
    }
}

fn validate_bands(bands: &[Tensor], sizes: &[(usize, usize)], size: (usize, usize)) -> Result<()> {
    if bands.len() != sizes.len() + 1 {
        bail!(
            "웨이블릿 대역 {}개가 필요함 ({}x{}): {}개",
            sizes.len() + 1,
            size.0,
            size.1,
            bands.len()
        );
    }
    let (ah, aw) = sizes.last().copied().unwrap_or(size);
    let approx = bands[0].dims();
    if approx.len() != 4 || approx[2] != ah || approx[3] != aw {
        bail!("근사 대역 shape {:?}이(가) {}x{}와 맞지 않음", approx, ah, aw);
    }
    for (j, (band, &(dh, dw))) in bands[1..].iter().zip(sizes.iter()).enumerate() {
        let dims = band.dims();
        if dims.len() != 5 || dims[2] != 3 || dims[3] != dh || dims[4] != dw {
            bail!("상세 대역 {} shape {:?}이(가) [_, _, 3, {}, {}]와 맞지 않음", j, dims, dh, dw);
        }
    }
    Ok(())
}

impl ImageParam for DwtImage {
    fn kind(&self) -> ParamKind {
        ParamKind::Dwt
    }

    fn vars(&self) -> Vec<Var> {
        self.bands.clone()
    }

    fn size(&self) -> (usize, usize) {
        self.size
    }

    fn size_override(&self) -> Option<(usize, usize)> {
        self.size_override
    }

    /// 웨이블릿 파라미터화는 노이즈 shift를 쓰지 않는다
    fn render(&self, _shift: Option<&Tensor>, contrast: f64) -> Result<Tensor> {
        let bands: Vec<Tensor> = self.bands.iter().map(|v| v.as_tensor().clone()).collect();
        self.render_from(&bands, contrast)
    }

    fn render_detached(&self, contrast: f64) -> Result<Tensor> {
        let bands: Vec<Tensor> = self.bands.iter().map(|v| v.as_tensor().detach()).collect();
        self.render_from(&bands, contrast)
    }
}
