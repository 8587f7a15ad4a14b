//! 임베딩 유사도 목표

use anyhow::{bail, Result};
use candle_core::{DType, Tensor, D};

/// 가중치가 붙은 목표 임베딩 하나
#[derive(Debug, Clone)]
pub struct Term {
    pub label: String,
    /// `[1, d]` 또는 표본 수와 같은 `[n, d]`
    pub target: Tensor,
    pub weight: f64,
}

/// 스텝 사이에 이어지는 상태
#[derive(Debug, Clone, Default)]
pub struct TrainState {
    /// 직전 스텝의 출력 임베딩 (그래프에서 분리됨)
    pub prev_embedding: Option<Tensor>,
}

/// 항들의 가중합으로 손실을 만든다
#[derive(Debug, Clone)]
pub struct Objective {
    terms: Vec<Term>,
    /// 유사도 최대화면 -1
    sign: f64,
    diverse: f64,
    expand: f64,
}

pub const TEXT_WEIGHT: f64 = 1.0;
pub const STYLE_WEIGHT: f64 = 0.5;
pub const SUBTRACT_WEIGHT: f64 = -1.0;
pub const IMAGE_WEIGHT: f64 = 0.5;

impl Objective {
    pub fn new(invert: bool) -> Self {
        Self {
            terms: Vec::new(),
            sign: if invert { 1.0 } else { -1.0 },
            diverse: 0.0,
            expand: 0.0,
        }
    }

    pub fn with_enhance(mut self, enhance: f64) -> Self {
        self.diverse = -enhance;
        self.expand = enhance.abs();
        self
    }

    pub fn push(&mut self, label: &str, target: Tensor, weight: f64) {
        self.terms.push(Term {
            label: label.to_string(),
            target: target.detach(),
            weight,
        });
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// 첫 스텝 전에 호출한다
    pub fn validate(&self) -> Result<()> {
        if self.terms.is_empty() {
            bail!("목표가 없음: 텍스트나 참조 이미지를 하나 이상 지정해야 함");
        }
        Ok(())
    }

    /// 두 번째 독립 렌더링이 필요한지
    pub fn needs_second_render(&self) -> bool {
        self.diverse != 0.0
    }

    /// 스칼라 손실. `second`는 `needs_second_render`일 때의 두 번째 렌더링 임베딩이다.
    pub fn loss(&self, out: &Tensor, second: Option<&Tensor>, state: &mut TrainState) -> Result<Tensor> {
        self.validate()?;
        let mut loss = Tensor::zeros((), DType::F32, out.device())?;
        for term in &self.terms {
            let sim = cosine_similarity(&term.target, out)?.mean_all()?;
            loss = (loss + sim.affine(self.sign * term.weight, 0.0)?)?;
        }
        if let (true, Some(second)) = (self.needs_second_render(), second) {
            let sim = cosine_similarity(out, second)?.mean_all()?;
            loss = (loss + sim.affine(self.diverse, 0.0)?)?;
        }
        if self.expand > 0.0 {
            if let Some(prev) = &state.prev_embedding {
                if prev.dims() == out.dims() {
                    let sim = cosine_similarity(out, prev)?.mean_all()?;
                    loss = (loss + sim.affine(self.expand, 0.0)?)?;
                }
            }
            state.prev_embedding = Some(out.detach());
        }
        Ok(loss)
    }
}

/// 행 단위 코사인 유사도. 한쪽이 한 행이면 브로드캐스트한다.
pub fn cosine_similarity(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    let (na, da) = a.dims2()?;
    let (nb, db) = b.dims2()?;
    if da != db || (na != nb && na != 1 && nb != 1) {
        bail!("임베딩 shape 불일치: {:?} vs {:?}", a.dims(), b.dims());
    }
    let unit = |x: &Tensor| -> Result<Tensor> {
        let norm = x.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?.affine(1.0, 1e-8)?;
        Ok(x.broadcast_div(&norm)?)
    };
    Ok(unit(a)?.broadcast_mul(&unit(b)?)?.sum(D::Minus1)?)
}
