use super::fake_encoder::FakeEncoder;
use crate::core::param::{build_param, ParamConfig, ParamKind};
use crate::core::resume::{load_image, Resume};
use crate::core::wavelet::Wavelet;
use crate::train::objective::TEXT_WEIGHT;
use crate::train::{encode_reference_image, CropSampler, ImageEncoder, Objective, OutputLayout, TrainConfig, Trainer};
use candle_core::Device;

fn 설정(out: &std::path::Path, steps: usize) -> TrainConfig {
    let mut config = TrainConfig::default()
        .with_steps(steps)
        .with_samples(4)
        .with_lrate(0.05)
        .with_out_dir(out)
        .with_seed(9);
    config.make_video = false;
    config
}

fn 빨강_목표(encoder: &FakeEncoder) -> Objective {
    let mut objective = Objective::new(false);
    objective.push("red", encoder.encode_text("red").unwrap(), TEXT_WEIGHT);
    objective
}

#[test]
fn 목표가_없으면_시작하지_않는다() {
    let device = Device::Cpu;
    let encoder = FakeEncoder::new(8);
    let param = build_param(ParamKind::Fft, &ParamConfig::new(16, 16).with_seed(1), Resume::Random, &device).unwrap();
    let result = Trainer::new(
        param,
        &encoder,
        Box::new(CropSampler::new(Some(1))),
        Objective::new(false),
        TrainConfig::default(),
        4,
    );
    assert!(result.is_err());
}

#[test]
fn 스텝마다_계수가_갱신된다() {
    let device = Device::Cpu;
    let dir = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder::new(8);
    let param = build_param(ParamKind::Fft, &ParamConfig::new(16, 16).with_seed(2), Resume::Random, &device).unwrap();
    let mut config = 설정(dir.path(), 3);
    config.noise = 0.05;
    let mut trainer = Trainer::new(
        param,
        &encoder,
        Box::new(CropSampler::new(Some(2))),
        빨강_목표(&encoder),
        config,
        4,
    )
    .unwrap();

    let before = trainer.param().coefficients()[0].flatten_all().unwrap().to_vec1::<f32>().unwrap();
    let loss = trainer.step(0).unwrap();
    assert!(loss.is_finite() && loss <= 0.0 && loss >= -1.0);
    let after = trainer.param().coefficients()[0].flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert!(before.iter().zip(after.iter()).any(|(a, b)| a != b));
}

#[test]
fn 반복하면_목표에_가까워진다() {
    let device = Device::Cpu;
    let dir = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder::new(8);
    let param = build_param(ParamKind::Pixel, &ParamConfig::new(12, 12).with_seed(3), Resume::Random, &device).unwrap();
    let config = 설정(dir.path(), 40).with_lrate(0.1);
    let mut trainer = Trainer::new(
        param,
        &encoder,
        Box::new(CropSampler::new(Some(3))),
        빨강_목표(&encoder),
        config,
        4,
    )
    .unwrap();
    let first = trainer.step(0).unwrap();
    let mut last = first;
    for i in 1..40 {
        last = trainer.step(i).unwrap();
    }
    assert!(last < first, "손실 {} → {}", first, last);
}

#[test]
fn 실행은_프레임과_스냅샷을_남긴다() {
    let device = Device::Cpu;
    let dir = tempfile::tempdir().unwrap();
    let encoder = FakeEncoder::new(8);
    let param_config = ParamConfig::new(16, 24).with_wavelet(Wavelet::Db2).with_seed(4);
    let param = build_param(ParamKind::Dwt, &param_config, Resume::Random, &device).unwrap();
    let mut config = 설정(dir.path(), 5).with_fstep(2).with_enhance(0.5);
    config.save_snapshot = true;
    let mut trainer = Trainer::new(
        param,
        &encoder,
        Box::new(CropSampler::new(Some(4))),
        빨강_목표(&encoder),
        config,
        4,
    )
    .unwrap();

    let layout = OutputLayout::new(dir.path(), "red");
    let report = trainer.run(&layout).unwrap();
    assert_eq!(report.frames, 3);
    assert!(report.final_loss.is_finite());
    assert!(trainer.state().prev_embedding.is_some());
    for i in 0..3 {
        let frame = load_image(layout.frame(i)).unwrap();
        assert_eq!(frame.size, (16, 24));
    }
    assert_eq!(report.final_frame, Some(dir.path().join("red-5.jpg")));
    assert!(layout.final_frame(5).is_file());
    assert!(report.video.is_none());

    // 저장한 스냅샷으로 재개
    let snapshot = report.snapshot.unwrap();
    let resumed = build_param(ParamKind::Dwt, &param_config, Resume::Path(snapshot), &device).unwrap();
    let a = trainer.param().render_detached(0.9).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
    let b = resumed.render_detached(0.9).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert_eq!(a, b);
}

#[test]
fn 참조_이미지_인코딩() {
    let device = Device::Cpu;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ref.png");
    image::RgbImage::from_pixel(20, 16, image::Rgb([255, 0, 0])).save(&path).unwrap();

    let encoder = FakeEncoder::new(8);
    let mut sampler = CropSampler::new(Some(5));
    let embedding = encode_reference_image(&path, &encoder, &mut sampler, 3, &device).unwrap();
    assert_eq!(embedding.dims(), &[3, 4]);
    let rows = embedding.to_vec2::<f32>().unwrap();
    for row in rows {
        assert!((row[0] - 1.0).abs() < 1e-5 && row[1].abs() < 1e-5);
    }
}
