//! 이미지 디코딩과 프레임 저장

use anyhow::{bail, Context, Result};
use candle_core::Tensor;
use image::RgbImage;
use ndarray::Array4;
use std::path::Path;

/// `[1, 3, h, w]`, 값 범위 [0, 1]
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixels: Array4<f32>,
    pub size: (usize, usize),
}

/// 래스터 이미지를 읽는다. 알파 채널은 버린다.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<LoadedImage> {
    let rgb = image::open(path.as_ref())
        .with_context(|| format!("이미지를 열 수 없음: {}", path.as_ref().display()))?
        .to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let pixels = Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
        rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    });
    Ok(LoadedImage { pixels, size: (h, w) })
}

/// `[1, 3, h, w]` 또는 `[3, h, w]`, 값 범위 [0, 1] 텐서를 이미지 파일로 저장한다 (확장자로 포맷 결정).
pub fn save_frame<P: AsRef<Path>>(image: &Tensor, path: P) -> Result<()> {
    let image = match image.rank() {
        4 => image.squeeze(0)?,
        3 => image.clone(),
        r => bail!("프레임은 3/4차원이어야 함: rank {}", r),
    };
    let (c, h, w) = image.dims3()?;
    if c != 3 {
        bail!("RGB 채널 3개가 필요함: {}", c);
    }
    let data = image.to_vec3::<f32>()?;
    let mut out = RgbImage::new(w as u32, h as u32);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        for ch in 0..3 {
            let v = data[ch][y as usize][x as usize].clamp(0.0, 1.0);
            pixel[ch] = (v * 255.0).round() as u8;
        }
    }
    out.save(path.as_ref())
        .with_context(|| format!("프레임 저장 실패: {}", path.as_ref().display()))?;
    Ok(())
}
