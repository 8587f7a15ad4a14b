//! # 이미지 파라미터화 핵심 모듈
//!
//! 색 비상관화 코덱, 세 가지 파라미터화, 그리고 이들이 공유하는 재개 수명주기

pub mod color;
pub mod param;
pub mod pixel;
pub mod resume;
pub mod spectral;
pub mod tensor_ops;
pub mod wavelet;

// 주요 타입들 재수출
pub use color::{decorrelate_forward, decorrelate_inverse, ColorBasis};
pub use param::{build_param, ImageParam, ParamConfig, ParamKind};
pub use pixel::PixelImage;
pub use resume::{load_snapshot, save_snapshot, Resume};
pub use spectral::{image_to_coefficients, FftImage};
pub use wavelet::{image_to_bands, DwtImage, Wavelet};
