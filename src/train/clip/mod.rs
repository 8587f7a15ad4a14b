//! # CLIP 임베딩 모델
//!
//! Hugging Face 허브의 ViT-B/32 가중치와 토크나이저를 쓴다.
//! 텍스트 타워는 candle-transformers 구현을, 비전 타워는 미분 가능한 자체 구현을 쓴다.

pub mod vision;

use anyhow::{bail, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{linear_no_bias, Linear, VarBuilder};
use candle_transformers::models::clip::text_model::{ClipTextConfig, ClipTextTransformer};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::path::Path;
use tokenizers::Tokenizer;

pub use vision::{Norm, VisionConfig, VisionTower};

use super::encoder::ImageEncoder;

pub const CLIP_REPO: &str = "openai/clip-vit-base-patch32";
pub const CLIP_REVISION: &str = "refs/pr/15";

/// CLIP 입력 정규화 통계
pub const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
pub const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

const TEXT_EMBED_DIM: usize = 512;
const MAX_TOKENS: usize = 77;

pub struct ClipEncoder {
    text: ClipTextTransformer,
    text_projection: Linear,
    vision: VisionTower,
    visual_projection: Linear,
    tokenizer: Tokenizer,
    mean: Tensor,
    std: Tensor,
    input_size: usize,
    device: Device,
}

impl ClipEncoder {
    /// 허브에서 가중치와 토크나이저를 받는다 (캐시 재사용)
    pub fn from_hub(device: &Device) -> Result<Self> {
        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            CLIP_REPO.to_string(),
            RepoType::Model,
            CLIP_REVISION.to_string(),
        ));
        log::info!("CLIP 가중치 확인: {}@{}", CLIP_REPO, CLIP_REVISION);
        let weights = repo.get("model.safetensors")?;
        let tokenizer = repo.get("tokenizer.json")?;
        Self::from_files(&weights, &tokenizer, device)
    }

    pub fn from_files(weights: &Path, tokenizer: &Path, device: &Device) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer).map_err(anyhow::Error::msg)?;
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, device)? };

        let text_config = ClipTextConfig::vit_base_patch32();
        let vision_config = VisionConfig::vit_base_patch32();
        let text = ClipTextTransformer::new(vb.pp("text_model"), &text_config)?;
        let text_projection = linear_no_bias(
            TEXT_EMBED_DIM,
            vision_config.projection_dim,
            vb.pp("text_projection"),
        )?;
        let vision = VisionTower::new(&vision_config, vb.pp("vision_model"))?;
        let visual_projection = linear_no_bias(
            vision_config.embed_dim,
            vision_config.projection_dim,
            vb.pp("visual_projection"),
        )?;

        log::info!("CLIP 로드 완료: {}", weights.display());
        Ok(Self {
            text,
            text_projection,
            vision,
            visual_projection,
            tokenizer,
            mean: Tensor::new(&CLIP_MEAN, device)?.reshape((1, 3, 1, 1))?,
            std: Tensor::new(&CLIP_STD, device)?.reshape((1, 3, 1, 1))?,
            input_size: vision_config.image_size,
            device: device.clone(),
        })
    }

    /// BOS/EOS를 포함한 토큰 ID. 길면 EOS를 보존하며 자른다.
    pub fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self.tokenizer.encode(text, true).map_err(anyhow::Error::msg)?;
        let mut ids = encoding.get_ids().to_vec();
        if ids.is_empty() {
            bail!("빈 토큰열: {:?}", text);
        }
        if ids.len() > MAX_TOKENS {
            let eos = ids[ids.len() - 1];
            ids.truncate(MAX_TOKENS - 1);
            ids.push(eos);
        }
        Ok(ids)
    }
}

impl ImageEncoder for ClipEncoder {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn encode_image(&self, images: &Tensor) -> Result<Tensor> {
        let normalized = images.broadcast_sub(&self.mean)?.broadcast_div(&self.std)?;
        let pooled = self.vision.forward(&normalized)?;
        Ok(self.visual_projection.forward(&pooled)?)
    }

    fn encode_text(&self, text: &str) -> Result<Tensor> {
        let ids = self.tokenize(text)?;
        let input = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let pooled = self.text.forward(&input)?;
        Ok(self.text_projection.forward(&pooled)?.detach())
    }
}
