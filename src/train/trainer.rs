//! 최적화 루프

use anyhow::{bail, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::{Path, PathBuf};

use super::config::TrainConfig;
use super::encoder::ImageEncoder;
use super::objective::{Objective, TrainState};
use super::output::OutputLayout;
use super::sampler::Sampler;
use crate::core::color::decorrelate_forward;
use crate::core::param::ImageParam;
use crate::core::resume::{load_image, save_frame, save_snapshot};
use crate::core::tensor_ops::array_to_tensor;

/// 실행 결과
#[derive(Debug, Clone)]
pub struct RunReport {
    pub frames: usize,
    pub final_loss: f32,
    pub final_frame: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub video: Option<PathBuf>,
}

pub struct Trainer<'a> {
    param: Box<dyn ImageParam>,
    encoder: &'a dyn ImageEncoder,
    sampler: Box<dyn Sampler + 'a>,
    objective: Objective,
    optimizer: AdamW,
    config: TrainConfig,
    state: TrainState,
    samples: usize,
    rng: StdRng,
    device: Device,
}

impl<'a> Trainer<'a> {
    /// 목표가 비어 있으면 여기서 실패한다
    pub fn new(
        param: Box<dyn ImageParam>,
        encoder: &'a dyn ImageEncoder,
        sampler: Box<dyn Sampler + 'a>,
        objective: Objective,
        config: TrainConfig,
        samples: usize,
    ) -> Result<Self> {
        objective.validate()?;
        let vars = param.vars();
        let device = match vars.first() {
            Some(v) => v.device().clone(),
            None => bail!("학습할 변수가 없음"),
        };
        let optimizer = AdamW::new(
            vars,
            ParamsAdamW {
                lr: config.learning_rate(0),
                weight_decay: config.weight_decay,
                ..Default::default()
            },
        )?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            param,
            encoder,
            sampler,
            objective,
            optimizer,
            config,
            state: TrainState::default(),
            samples: samples.max(1),
            rng,
            device,
        })
    }

    pub fn param(&self) -> &dyn ImageParam {
        self.param.as_ref()
    }

    pub fn state(&self) -> &TrainState {
        &self.state
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// `noise × U(0,1)` 스펙트럼 shift. 파라미터화가 지원하지 않으면 `None`.
    fn noise_shift(&mut self) -> Result<Option<Tensor>> {
        if self.config.noise <= 0.0 {
            return Ok(None);
        }
        let Some(shape) = self.param.shift_shape() else {
            return Ok(None);
        };
        let count: usize = shape.iter().product();
        let noise = self.config.noise;
        let data: Vec<f32> = (0..count).map(|_| (noise * self.rng.gen::<f64>()) as f32).collect();
        Ok(Some(Tensor::from_vec(data, shape, &self.device)?))
    }

    /// 렌더링 → RGB → 표본 → 임베딩
    fn embed(&mut self, shift: Option<&Tensor>) -> Result<Tensor> {
        let image = decorrelate_forward(&self.param.render(shift, 1.0)?, self.config.colors)?;
        let crops = self.sampler.sample(&image, self.samples, self.encoder.input_size())?;
        self.encoder.encode_image(&crops)
    }

    /// 한 스텝 갱신 후 손실 값을 돌려준다
    pub fn step(&mut self, step: usize) -> Result<f32> {
        let shift = self.noise_shift()?;
        let out = self.embed(shift.as_ref())?;
        let second = if self.objective.needs_second_render() {
            Some(self.embed(shift.as_ref())?)
        } else {
            None
        };
        let loss = self.objective.loss(&out, second.as_ref(), &mut self.state)?;
        let value = loss.to_dtype(DType::F32)?.to_scalar::<f32>()?;
        if !value.is_finite() {
            bail!("손실이 유한하지 않음 (step {}): {}", step, value);
        }
        if self.config.progressive {
            self.optimizer.set_learning_rate(self.config.learning_rate(step));
        }
        self.optimizer.backward_step(&loss)?;
        Ok(value)
    }

    /// 그래프 없이 렌더링해 RGB 프레임을 저장한다
    pub fn checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let image = self.param.render_detached(self.config.contrast)?;
        let mut rgb = decorrelate_forward(&image, self.config.colors)?;
        if self.config.sharpness != 0.0 {
            rgb = rgb.powf(1.0 + self.config.sharpness / 2.0)?;
        }
        save_frame(&rgb, path)
    }

    pub fn run(&mut self, layout: &OutputLayout) -> Result<RunReport> {
        layout.prepare()?;
        let fstep = self.config.fstep.max(1);
        let pb = ProgressBar::new(self.config.frame_count() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );

        let mut final_loss = f32::NAN;
        let mut frames = 0;
        for i in 0..self.config.steps {
            final_loss = self.step(i)?;
            if i % fstep == 0 {
                self.checkpoint(layout.frame(i / fstep))?;
                frames += 1;
                pb.set_message(format!("loss {:.4}", final_loss));
                pb.inc(1);
            }
            log::debug!("step {} loss {:.5}", i, final_loss);
        }
        pb.finish_with_message(format!("loss {:.4}", final_loss));

        let final_frame = layout.copy_final(self.config.steps)?;
        let snapshot = if self.config.save_snapshot {
            let path = layout.snapshot();
            save_snapshot(&self.param.coefficients(), &path)?;
            log::info!("스냅샷 저장: {}", path.display());
            Some(path)
        } else {
            None
        };
        let video = if self.config.make_video && frames > 0 && layout.encode_video() {
            Some(layout.video())
        } else {
            None
        };
        Ok(RunReport {
            frames,
            final_loss,
            final_frame,
            snapshot,
            video,
        })
    }
}

/// 참조 이미지를 표본 단위로 인코딩한다 (그래디언트 없음)
pub fn encode_reference_image<P: AsRef<Path>>(
    path: P,
    encoder: &dyn ImageEncoder,
    sampler: &mut dyn Sampler,
    samples: usize,
    device: &Device,
) -> Result<Tensor> {
    let image = load_image(path.as_ref())?;
    let pixels = array_to_tensor(&image.pixels, device)?;
    let crops = sampler.sample(&pixels, samples.max(1), encoder.input_size())?;
    Ok(encoder.encode_image(&crops)?.detach())
}
