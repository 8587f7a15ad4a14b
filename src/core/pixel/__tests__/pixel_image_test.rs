use crate::core::color::decorrelate_inverse;
use crate::core::param::{build_param, ImageParam, ParamConfig, ParamKind};
use crate::core::pixel::{PixelImage, PIXEL_RESUME_COLORS};
use crate::core::resume::{load_image, save_snapshot, Resume};
use crate::core::tensor_ops::{sample_std, tensor_to_array4};
use candle_core::{Device, Tensor};

#[test]
fn 무작위_초기화는_목표_shape() {
    let device = Device::Cpu;
    let config = ParamConfig::new(20, 30).with_seed(1);
    let param = PixelImage::new(&config, Resume::Random, &device).unwrap();
    assert_eq!(param.vars()[0].dims(), &[1, 3, 20, 30]);
    assert!((sample_std(param.vars()[0].as_tensor()).unwrap() - 1.0).abs() < 0.05);

    let image = param.render(None, 0.9).unwrap();
    assert!((sample_std(&image).unwrap() - 0.9).abs() < 1e-3);
}

#[test]
fn 표준편차_설정이_반영된다() {
    let device = Device::Cpu;
    let mut config = ParamConfig::new(32, 32).with_seed(2);
    config.pixel_sd = 0.1;
    let param = PixelImage::new(&config, Resume::Random, &device).unwrap();
    assert!((sample_std(param.vars()[0].as_tensor()).unwrap() - 0.1).abs() < 0.01);
}

#[test]
fn 이미지에서_재개() {
    let device = Device::Cpu;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in.png");
    let img = image::RgbImage::from_fn(9, 7, |x, y| image::Rgb([140 + x as u8, 150 + y as u8, 200]));
    img.save(&path).unwrap();

    let config = ParamConfig::new(64, 64);
    let param = PixelImage::new(&config, Resume::Path(path.clone()), &device).unwrap();
    assert_eq!(param.size_override(), Some((7, 9)));

    let loaded = load_image(&path).unwrap();
    let expected = decorrelate_inverse(&loaded.pixels.mapv(|v| v - 0.5), PIXEL_RESUME_COLORS).unwrap();
    let actual = tensor_to_array4(param.vars()[0].as_tensor()).unwrap();
    let diff = (&actual - &expected).mapv(f32::abs).fold(0.0f32, |a, &b| a.max(b));
    assert!(diff < 1e-6);
}

#[test]
fn 스냅샷_왕복() {
    let device = Device::Cpu;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pixels.safetensors");
    let config = ParamConfig::new(12, 12).with_seed(4);
    let original = build_param(ParamKind::Pixel, &config, Resume::Random, &device).unwrap();
    save_snapshot(&original.coefficients(), &path).unwrap();

    let resumed = build_param(ParamKind::Pixel, &config, Resume::Path(path), &device).unwrap();
    assert_eq!(resumed.kind(), ParamKind::Pixel);
    let a = original.coefficients()[0].flatten_all().unwrap().to_vec1::<f32>().unwrap();
    let b = resumed.coefficients()[0].flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert_eq!(a, b);
}

#[test]
fn shape이_다르면_에러() {
    let device = Device::Cpu;
    let config = ParamConfig::new(8, 8);
    let wrong = Tensor::zeros((1, 3, 8, 9), candle_core::DType::F32, &device).unwrap();
    assert!(PixelImage::new(&config, Resume::Coeffs(vec![wrong]), &device).is_err());
}
