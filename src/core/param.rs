//! # 이미지 파라미터화 공통 인터페이스
//!
//! 세 가지 파라미터화(스펙트럼, 웨이블릿, 픽셀)가 같은 계약으로 생성되고 렌더링된다.

use anyhow::Result;
use candle_core::{Device, Tensor, Var};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use serde::Serialize;

use crate::core::pixel::PixelImage;
use crate::core::resume::Resume;
use crate::core::spectral::FftImage;
use crate::core::wavelet::{DwtImage, Wavelet};

/// 파라미터화 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamKind {
    /// 푸리에 계수
    Fft,
    /// 웨이블릿 계수
    Dwt,
    /// 픽셀 직접
    Pixel,
}

/// 파라미터화 생성 설정
#[derive(Debug, Clone, Serialize)]
pub struct ParamConfig {
    /// 목표 텐서 shape `[batch, channels, height, width]`
    pub shape: [usize; 4],
    /// 스펙트럼 감쇠 지수 (클수록 흐려짐)
    pub decay_power: f64,
    /// 스펙트럼 계수 초기 스케일
    pub seed_scale: f64,
    /// 웨이블릿 레벨 스케일의 선명도
    pub sharpness: f64,
    /// 색 포화도 계수
    pub colors: f64,
    pub wavelet: Wavelet,
    /// 픽셀 파라미터화의 초기 표준편차
    pub pixel_sd: f64,
    /// 난수 시드 (없으면 엔트로피에서)
    pub seed: Option<u64>,
}

impl Default for ParamConfig {
    fn default() -> Self {
        Self {
            shape: [1, 3, 512, 512],
            decay_power: 1.0,
            seed_scale: 0.01,
            sharpness: 0.3,
            colors: 1.0,
            wavelet: Wavelet::Coif2,
            pixel_sd: 1.0,
            seed: None,
        }
    }
}

impl ParamConfig {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            shape: [1, 3, height, width],
            ..Default::default()
        }
    }

    pub fn with_decay_power(mut self, decay_power: f64) -> Self {
        self.decay_power = decay_power;
        self
    }

    pub fn with_sharpness(mut self, sharpness: f64) -> Self {
        self.sharpness = sharpness;
        self
    }

    pub fn with_colors(mut self, colors: f64) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_wavelet(mut self, wavelet: Wavelet) -> Self {
        self.wavelet = wavelet;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn height(&self) -> usize {
        self.shape[2]
    }

    pub fn width(&self) -> usize {
        self.shape[3]
    }

    pub(crate) fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// 학습 가능한 계수에서 미분 가능한 이미지를 만드는 파라미터화
pub trait ImageParam {
    fn kind(&self) -> ParamKind;

    /// 옵티마이저가 갱신할 변수들
    fn vars(&self) -> Vec<Var>;

    /// 렌더링 결과의 공간 크기 `(height, width)`
    fn size(&self) -> (usize, usize);

    /// 이미지에서 재개했을 때 원본 이미지 크기
    fn size_override(&self) -> Option<(usize, usize)>;

    /// 비상관 색공간의 `[b, 3, h, w]` 이미지. 표본 표준편차가 `contrast`가 되도록 정규화된다.
    fn render(&self, shift: Option<&Tensor>, contrast: f64) -> Result<Tensor>;

    /// 그래프를 만들지 않는 렌더링 (체크포인트 저장용)
    fn render_detached(&self, contrast: f64) -> Result<Tensor>;

    /// 노이즈 주입용 shift 텐서의 shape. 지원하지 않으면 `None`.
    fn shift_shape(&self) -> Option<Vec<usize>> {
        None
    }

    /// 스냅샷으로 저장할 계수들 (그래프에서 분리됨)
    fn coefficients(&self) -> Vec<Tensor> {
        self.vars().iter().map(|v| v.as_tensor().detach()).collect()
    }
}

/// 종류에 맞는 파라미터화를 만든다
pub fn build_param(
    kind: ParamKind,
    config: &ParamConfig,
    resume: Resume,
    device: &Device,
) -> Result<Box<dyn ImageParam>> {
    let param: Box<dyn ImageParam> = match kind {
        ParamKind::Fft => Box::new(FftImage::new(config, resume, device)?),
        ParamKind::Dwt => Box::new(DwtImage::new(config, resume, device)?),
        ParamKind::Pixel => Box::new(PixelImage::new(config, resume, device)?),
    };
    log::info!(
        "{:?} 파라미터화 생성: 크기 {:?}, 변수 {}개",
        kind,
        param.size(),
        param.vars().len()
    );
    Ok(param)
}

/// 표준정규분포 × `std` 텐서
pub fn random_normal(shape: &[usize], std: f64, rng: &mut StdRng, device: &Device) -> Result<Tensor> {
    let count: usize = shape.iter().product();
    let data: Vec<f32> = (0..count)
        .map(|_| {
            let z: f64 = StandardNormal.sample(rng);
            (z * std) as f32
        })
        .collect();
    Ok(Tensor::from_vec(data, shape.to_vec(), device)?)
}
