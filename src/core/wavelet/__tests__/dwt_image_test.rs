use crate::core::color::decorrelate_inverse;
use crate::core::param::{ImageParam, ParamConfig, ParamKind};
use crate::core::resume::{save_snapshot, Resume};
use crate::core::tensor_ops::{array_to_tensor, normalize_contrast, sample_std};
use crate::core::wavelet::{dwt_scale, image_to_bands, max_level, DwtImage, Wavelet};
use approx::assert_abs_diff_eq;
use candle_core::{Device, Tensor};
use ndarray::Array4;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn 무작위_이미지(h: usize, w: usize, seed: u64) -> Array4<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array4::from_shape_fn((1, 3, h, w), |_| rng.gen_range(0.05f32..0.95f32))
}

fn 최대_차이(a: &Tensor, b: &Tensor) -> f32 {
    let a = a.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    let b = b.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max)
}

#[test]
fn 선명도_0이면_면적비_그대로() {
    let sizes = [(32, 32), (16, 16), (8, 8)];
    let scale = dwt_scale(&sizes, 0.0);
    assert_abs_diff_eq!(scale[0], 1.0);
    assert_abs_diff_eq!(scale[1], 4.0);
    assert_abs_diff_eq!(scale[2], 16.0);
}

#[test]
fn 선명도_1이면_모든_레벨이_1() {
    let sizes = [(37, 37), (24, 24), (17, 17), (14, 14)];
    for s in dwt_scale(&sizes, 1.0) {
        assert_abs_diff_eq!(s, 1.0);
    }
    assert!(dwt_scale(&[], 0.3).is_empty());
}

#[test]
fn 무작위_초기화_대역_shape() {
    let device = Device::Cpu;
    let config = ParamConfig::new(64, 64).with_wavelet(Wavelet::Haar).with_seed(11);
    let param = DwtImage::new(&config, Resume::Random, &device).unwrap();
    assert_eq!(param.kind(), ParamKind::Dwt);
    assert_eq!(param.levels(), 6);

    let vars = param.vars();
    assert_eq!(vars.len(), 7);
    assert_eq!(vars[0].dims(), &[1, 3, 1, 1]);
    assert_eq!(vars[1].dims(), &[1, 3, 3, 32, 32]);
    assert_eq!(vars[6].dims(), &[1, 3, 3, 1, 1]);
    assert!((sample_std(vars[1].as_tensor()).unwrap() - 1.0).abs() < 0.05);

    let image = param.render(None, 1.0).unwrap();
    assert_eq!(image.dims(), &[1, 3, 64, 64]);
    assert!((sample_std(&image).unwrap() - 1.0).abs() < 1e-3);
    assert!(param.shift_shape().is_none());
}

#[test]
fn 긴_필터의_무작위_렌더링은_목표_크기() {
    let device = Device::Cpu;
    for (h, w) in [(48, 40), (33, 17)] {
        let config = ParamConfig::new(h, w).with_wavelet(Wavelet::Coif2).with_seed(3);
        let param = DwtImage::new(&config, Resume::Random, &device).unwrap();
        assert_eq!(param.levels(), max_level(h, w));
        assert_eq!(param.render(None, 0.9).unwrap().dims(), &[1, 3, h, w]);
    }
}

#[test]
fn shift는_무시된다() {
    let device = Device::Cpu;
    let config = ParamConfig::new(16, 16).with_wavelet(Wavelet::Db2).with_seed(5);
    let param = DwtImage::new(&config, Resume::Random, &device).unwrap();
    let noise = Tensor::ones((1, 1, 16, 9, 1), candle_core::DType::F32, &device).unwrap();
    let plain = param.render(None, 1.0).unwrap();
    let shifted = param.render(Some(&noise), 1.0).unwrap();
    assert!(최대_차이(&plain, &shifted) < 1e-7);
}

#[test]
fn 이미지_대역으로_렌더링하면_정규화된_입력이_나온다() {
    let device = Device::Cpu;
    for (h, w, wavelet, sharpness) in [
        (32, 32, Wavelet::Haar, 0.3),
        (21, 26, Wavelet::Coif2, 0.0),
        (17, 15, Wavelet::Db4, 1.0),
    ] {
        let colors = 1.5;
        let image = 무작위_이미지(h, w, 13);
        let bands = image_to_bands(&image, wavelet, sharpness, colors).unwrap();
        assert_eq!(bands.levels(), max_level(h, w));

        let mut tensors = vec![array_to_tensor(&bands.approx, &device).unwrap()];
        for d in &bands.details {
            tensors.push(array_to_tensor(d, &device).unwrap());
        }
        let config = ParamConfig::new(h, w)
            .with_wavelet(wavelet)
            .with_sharpness(sharpness)
            .with_colors(colors);
        let param = DwtImage::new(&config, Resume::Coeffs(tensors), &device).unwrap();

        let rendered = param.render(None, 1.0).unwrap();
        let target = array_to_tensor(&decorrelate_inverse(&image, colors).unwrap(), &device).unwrap();
        let target = normalize_contrast(&target, 1.0).unwrap();
        let diff = 최대_차이(&rendered, &target);
        assert!(diff < 1e-3, "{} {}x{}: 차이 {}", wavelet, h, w, diff);
    }
}

#[test]
fn 이미지_경로에서_재개하면_크기를_덮어쓴다() {
    let device = Device::Cpu;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seed.bmp");
    let img = image::RgbImage::from_fn(18, 10, |x, y| image::Rgb([(x * 12) as u8 + 10, (y * 20) as u8 + 10, 128]));
    img.save(&path).unwrap();

    let config = ParamConfig::new(64, 64).with_wavelet(Wavelet::Db2);
    let param = DwtImage::new(&config, Resume::Path(path), &device).unwrap();
    assert_eq!(param.size_override(), Some((10, 18)));
    assert_eq!(param.render(None, 1.0).unwrap().dims(), &[1, 3, 10, 18]);
}

#[test]
fn 스냅샷에서_재개하면_같은_렌더링() {
    let device = Device::Cpu;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bands.safetensors");

    let config = ParamConfig::new(24, 40).with_wavelet(Wavelet::Db3).with_seed(17);
    let original = DwtImage::new(&config, Resume::Random, &device).unwrap();
    save_snapshot(&original.coefficients(), &path).unwrap();

    let resumed = DwtImage::new(&config, Resume::Path(path), &device).unwrap();
    let first = resumed.render(None, 1.0).unwrap();
    let second = resumed.render(None, 1.0).unwrap();
    assert_eq!(
        first.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
        second.flatten_all().unwrap().to_vec1::<f32>().unwrap()
    );
    assert!(최대_차이(&original.render(None, 1.0).unwrap(), &first) < 1e-6);
}

#[test]
fn 다른_크기의_스냅샷은_거부된다() {
    let device = Device::Cpu;
    let small = ParamConfig::new(16, 16).with_wavelet(Wavelet::Haar).with_seed(1);
    let original = DwtImage::new(&small, Resume::Random, &device).unwrap();

    let large = ParamConfig::new(32, 32).with_wavelet(Wavelet::Haar);
    assert!(DwtImage::new(&large, Resume::Coeffs(original.coefficients()), &device).is_err());
}
