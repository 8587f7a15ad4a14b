//! # 스펙트럼 이미지 파라미터화
//!
//! 복소 반스펙트럼 계수를 학습하고, 주파수 감쇠 프로파일을 곱한 뒤 역 실수 FFT로 이미지를 만든다.

pub mod fft;
pub mod fft_image;
pub mod freqs;


pub use fft::{rfft2_ortho, InverseRfft2};
pub use fft_image::{image_to_coefficients, FftImage, SPECTRUM_CALIBRATION};
pub use freqs::{decay_scale, fftfreq, half_width, rfft2d_freqs};
