//! 임베딩 모델 인터페이스

use anyhow::Result;
use candle_core::Tensor;

/// 이미지와 텍스트를 같은 임베딩 공간으로 보내는 모델
pub trait ImageEncoder {
    /// 정사각 입력 이미지의 한 변 길이
    fn input_size(&self) -> usize;

    /// `[n, 3, s, s]`, 값 범위 [0, 1] → `[n, d]`. 입력으로 그래디언트가 흘러야 한다.
    fn encode_image(&self, images: &Tensor) -> Result<Tensor>;

    /// 텍스트 한 줄 → `[1, d]`
    fn encode_text(&self, text: &str) -> Result<Tensor>;
}

impl<T: ImageEncoder + ?Sized> ImageEncoder for Box<T> {
    fn input_size(&self) -> usize {
        (**self).input_size()
    }

    fn encode_image(&self, images: &Tensor) -> Result<Tensor> {
        (**self).encode_image(images)
    }

    fn encode_text(&self, text: &str) -> Result<Tensor> {
        (**self).encode_text(text)
    }
}
