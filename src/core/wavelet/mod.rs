//! # 웨이블릿 이미지 파라미터화
//!
//! 다단계 2D 웨이블릿 분해의 근사 대역과 상세 대역들을 학습한다.
//! 상세 대역은 레벨별 스케일을 곱한 뒤 역변환되어, `sharpness`로 고주파 비중을 조절한다.

pub mod dwt;
pub mod dwt_image;
pub mod filters;

#[cfg(test)]
mod __tests__;

pub use dwt::{band_sizes, coeff_len, dwt2, max_level, BoundaryMode, Decomposition, Synthesis};
pub use dwt_image::{dwt_scale, image_to_bands, DwtImage};
pub use filters::{FilterBank, Wavelet};
