use crate::train::ImageEncoder;
use anyhow::Result;
use candle_core::{Device, Tensor, D};

/// 채널 평균을 임베딩으로 쓰는 테스트용 인코더
pub struct FakeEncoder {
    pub size: usize,
    pub device: Device,
}

impl FakeEncoder {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            device: Device::Cpu,
        }
    }
}

impl ImageEncoder for FakeEncoder {
    fn input_size(&self) -> usize {
        self.size
    }

    fn encode_image(&self, images: &Tensor) -> Result<Tensor> {
        let (n, c, _, _) = images.dims4()?;
        let means = images.flatten_from(2)?.mean(D::Minus1)?;
        let bias = Tensor::full(0.1f32, (n, 1), images.device())?;
        assert_eq!(c, 3);
        Ok(Tensor::cat(&[&means, &bias], 1)?)
    }

    fn encode_text(&self, text: &str) -> Result<Tensor> {
        let v: [f32; 4] = match text {
            "red" => [1.0, 0.0, 0.0, 0.1],
            "green" => [0.0, 1.0, 0.0, 0.1],
            "blue" => [0.0, 0.0, 1.0, 0.1],
            _ => [0.3, 0.3, 0.3, 0.1],
        };
        Ok(Tensor::new(&v, &self.device)?.unsqueeze(0)?)
    }
}
