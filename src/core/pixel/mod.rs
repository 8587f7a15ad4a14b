//! # 픽셀 직접 파라미터화
//!
//! 비상관 색공간의 픽셀 값을 그대로 학습한다. 감쇠 프로파일이 없는 기준선이다.

pub mod pixel_image;

#[cfg(test)]
mod __tests__;

pub use pixel_image::{PixelImage, PIXEL_RESUME_COLORS};
