//! 학습 실행 설정

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::core::param::{ParamConfig, ParamKind};

/// 최적화 루프 설정
#[derive(Debug, Clone, Serialize)]
pub struct TrainConfig {
    /// 전체 반복 횟수
    pub steps: usize,
    /// 스텝당 인코더에 넣을 표본 수 (축소 전)
    pub samples: usize,
    pub lrate: f64,
    /// 학습률을 0.02×lrate에서 2×lrate까지 선형으로 올린다
    pub progressive: bool,
    /// 프레임 저장 간격
    pub fstep: usize,
    /// 체크포인트 렌더링 대비
    pub contrast: f64,
    pub colors: f64,
    /// 체크포인트 톤 매핑 지수 `1 + sharpness/2`
    pub sharpness: f64,
    /// 스펙트럼 노이즈 세기 (0이면 끔)
    pub noise: f64,
    /// 일관성 강화: diverse = -enhance, expand = |enhance|
    pub enhance: f64,
    /// 유사도 최대화 대신 최소화
    pub invert: bool,
    pub weight_decay: f64,
    pub save_snapshot: bool,
    pub make_video: bool,
    pub out_dir: PathBuf,
    /// 표본 추출/노이즈 시드
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            steps: 200,
            samples: 200,
            lrate: 0.05,
            progressive: false,
            fstep: 1,
            contrast: 0.9,
            colors: 1.5,
            sharpness: 0.3,
            noise: 0.0,
            enhance: 0.0,
            invert: false,
            weight_decay: 0.01,
            save_snapshot: false,
            make_video: true,
            out_dir: PathBuf::from("_out"),
            seed: None,
        }
    }
}

impl TrainConfig {
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_lrate(mut self, lrate: f64) -> Self {
        self.lrate = lrate;
        self
    }

    pub fn with_fstep(mut self, fstep: usize) -> Self {
        self.fstep = fstep.max(1);
        self
    }

    pub fn with_enhance(mut self, enhance: f64) -> Self {
        self.enhance = enhance;
        self
    }

    pub fn with_out_dir<P: Into<PathBuf>>(mut self, out_dir: P) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// 목표 항 구성에 따라 줄어든 표본 수 (최소 1)
    pub fn effective_samples(&self, has_style: bool, has_subtract: bool) -> usize {
        let mut samples = self.samples as f64;
        if self.enhance != 0.0 {
            samples = (samples * 0.5).floor();
        }
        if has_style {
            samples = (samples * 0.75).floor();
        }
        if has_subtract {
            samples = (samples * 0.75).floor();
        }
        (samples as usize).max(1)
    }

    /// `(시작 학습률, 끝 학습률)`
    pub fn lr_range(&self) -> (f64, f64) {
        if self.progressive {
            let lr1 = self.lrate * 2.0;
            (lr1 * 0.01, lr1)
        } else {
            (self.lrate, self.lrate)
        }
    }

    /// `i`번째 스텝의 학습률
    pub fn learning_rate(&self, step: usize) -> f64 {
        let (lr0, lr1) = self.lr_range();
        if !self.progressive || self.steps == 0 {
            return lr0;
        }
        lr0 + (step as f64 / self.steps as f64) * (lr1 - lr0)
    }

    /// 저장될 프레임 수
    pub fn frame_count(&self) -> usize {
        (self.steps + self.fstep.max(1) - 1) / self.fstep.max(1)
    }
}

/// `settings.json`으로 남기는 실행 기록
#[derive(Debug, Clone, Serialize)]
pub struct RunSettings {
    pub name: String,
    pub kind: ParamKind,
    /// `(height, width)`
    pub size: (usize, usize),
    pub text: Option<String>,
    pub style_text: Option<String>,
    pub subtract_text: Option<String>,
    pub image: Option<PathBuf>,
    pub resume: Option<PathBuf>,
    pub samples: usize,
    pub param: ParamConfig,
    pub train: TrainConfig,
}

/// `"W-H"` 또는 `"N"` → `(height, width)`
pub fn parse_size(arg: &str) -> Result<(usize, usize)> {
    let dims = arg
        .split('-')
        .map(|s| s.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match dims.as_slice() {
        [n] if *n > 0 => Ok((*n, *n)),
        [w, h] if *w > 0 && *h > 0 => Ok((*h, *w)),
        _ => bail!("크기 형식은 W-H 또는 N: {}", arg),
    }
}
