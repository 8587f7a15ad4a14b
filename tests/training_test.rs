use anyhow::Result;
use candle_core::{Device, Tensor, D};
use spectral_dream::train::objective::{STYLE_WEIGHT, SUBTRACT_WEIGHT, TEXT_WEIGHT};
use spectral_dream::train::{CropSampler, ImageEncoder, Objective, OutputLayout, TrainConfig, Trainer};
use spectral_dream::{build_param, ParamConfig, ParamKind, Resume};

/// 채널 평균 + 채널 표준편차 임베딩
struct StatsEncoder;

impl ImageEncoder for StatsEncoder {
    fn input_size(&self) -> usize {
        6
    }

    fn encode_image(&self, images: &Tensor) -> Result<Tensor> {
        let flat = images.flatten_from(2)?;
        let mean = flat.mean_keepdim(D::Minus1)?;
        let std = flat.broadcast_sub(&mean)?.sqr()?.mean(D::Minus1)?.sqrt()?;
        Ok(Tensor::cat(&[&mean.squeeze(D::Minus1)?, &std], 1)?)
    }

    fn encode_text(&self, text: &str) -> Result<Tensor> {
        let v: [f32; 6] = match text {
            "warm" => [0.9, 0.4, 0.1, 0.1, 0.1, 0.1],
            "cold" => [0.1, 0.4, 0.9, 0.1, 0.1, 0.1],
            _ => [0.5, 0.5, 0.5, 0.2, 0.2, 0.2],
        };
        Ok(Tensor::new(&v, &Device::Cpu)?.unsqueeze(0)?)
    }
}

#[test]
fn test_fft_실행_후_스냅샷으로_이어서_학습() {
    let device = Device::Cpu;
    let dir = tempfile::tempdir().unwrap();
    let encoder = StatsEncoder;

    let mut objective = Objective::new(false);
    objective.push("warm", encoder.encode_text("warm").unwrap(), TEXT_WEIGHT);
    objective.push("style", encoder.encode_text("plain").unwrap(), STYLE_WEIGHT);
    objective.push("cold", encoder.encode_text("cold").unwrap(), SUBTRACT_WEIGHT);

    let param_config = ParamConfig::new(20, 28).with_decay_power(1.5).with_colors(1.5).with_seed(3);
    let mut config = TrainConfig::default()
        .with_steps(4)
        .with_samples(8)
        .with_out_dir(dir.path())
        .with_seed(3);
    config.progressive = true;
    config.noise = 0.02;
    config.save_snapshot = true;
    config.make_video = false;
    let samples = config.effective_samples(true, true);
    assert_eq!(samples, 4);

    let param = build_param(ParamKind::Fft, &param_config, Resume::Random, &device).unwrap();
    let mut trainer = Trainer::new(
        param,
        &encoder,
        Box::new(CropSampler::new(Some(3))),
        objective.clone(),
        config.clone(),
        samples,
    )
    .unwrap();
    let layout = OutputLayout::new(dir.path(), "warm");
    let report = trainer.run(&layout).unwrap();
    assert_eq!(report.frames, 4);
    assert!(layout.frame(3).is_file());
    assert!(layout.final_frame(4).is_file());

    let snapshot = report.snapshot.unwrap();
    assert!(snapshot.is_file());
    let resumed = build_param(ParamKind::Fft, &param_config, Resume::Path(snapshot), &device).unwrap();
    let mut second = Trainer::new(
        resumed,
        &encoder,
        Box::new(CropSampler::new(Some(4))),
        objective,
        config,
        samples,
    )
    .unwrap();
    assert!(second.step(0).unwrap().is_finite());
}

#[test]
fn test_반전하면_손실_부호가_바뀐다() {
    let device = Device::Cpu;
    let encoder = StatsEncoder;
    let param_config = ParamConfig::new(12, 12).with_seed(8);
    let config = TrainConfig::default().with_seed(8);

    let mut losses = Vec::new();
    for invert in [false, true] {
        let mut objective = Objective::new(invert);
        objective.push("warm", encoder.encode_text("warm").unwrap(), TEXT_WEIGHT);
        let param = build_param(ParamKind::Pixel, &param_config, Resume::Random, &device).unwrap();
        let mut trainer = Trainer::new(
            param,
            &encoder,
            Box::new(CropSampler::new(Some(8))),
            objective,
            config.clone(),
            2,
        )
        .unwrap();
        losses.push(trainer.step(0).unwrap());
    }
    assert!((losses[0] + losses[1]).abs() < 1e-5);
    assert!(losses[0] < 0.0);
}
