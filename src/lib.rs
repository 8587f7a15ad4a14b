//! spectral_dream: 임베딩 유사도 기반 이미지 합성 라이브러리
//!
//! 이미지를 스펙트럼(FFT), 웨이블릿(DWT), 픽셀 계수로 파라미터화하고
//! 비상관 색공간에서 렌더링해 CLIP 같은 임베딩 모델의 목표를 향해 최적화한다.

pub mod core;
pub mod train;

// 핵심 모듈들 재수출
pub use self::core::{
    build_param, decorrelate_forward, decorrelate_inverse, DwtImage, FftImage, ImageParam,
    ParamConfig, ParamKind, PixelImage, Resume, Wavelet,
};
pub use train::{ClipEncoder, CropSampler, ImageEncoder, Objective, Sampler, TrainConfig, Trainer};
