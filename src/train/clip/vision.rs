//! ViT 비전 타워
//!
//! 입력 이미지까지 그래디언트가 흘러야 하므로 역전파가 없는 fused 연산
//! (layer norm, softmax_last_dim, conv 패치 임베딩)을 쓰지 않고 기본 텐서 연산으로 조립한다.

use anyhow::Result;
use candle_core::{Module, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

use crate::core::color::sigmoid;
use crate::core::tensor_ops::matmul_last;

/// ViT 하이퍼파라미터
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub embed_dim: usize,
    pub intermediate_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub image_size: usize,
    pub patch_size: usize,
    pub projection_dim: usize,
    pub layer_norm_eps: f64,
}

impl VisionConfig {
    /// ViT-B/32
    pub fn vit_base_patch32() -> Self {
        Self {
            embed_dim: 768,
            intermediate_size: 3072,
            num_hidden_layers: 12,
            num_attention_heads: 12,
            image_size: 224,
            patch_size: 32,
            projection_dim: 512,
            layer_norm_eps: 1e-5,
        }
    }

    pub fn grid(&self) -> usize {
        self.image_size / self.patch_size
    }

    pub fn num_positions(&self) -> usize {
        self.grid() * self.grid() + 1
    }
}

/// 마지막 축 layer norm
#[derive(Debug, Clone)]
pub struct Norm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl Norm {
    pub fn new(dim: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            weight: vb.get(dim, "weight")?,
            bias: vb.get(dim, "bias")?,
            eps,
        })
    }

    pub fn from_tensors(weight: Tensor, bias: Tensor, eps: f64) -> Self {
        Self { weight, bias, eps }
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mean = x.mean_keepdim(D::Minus1)?;
        let centered = x.broadcast_sub(&mean)?;
        let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let normed = centered.broadcast_div(&(var + self.eps)?.sqrt()?)?;
        Ok(normed.broadcast_mul(&self.weight)?.broadcast_add(&self.bias)?)
    }
}

fn quick_gelu(x: &Tensor) -> Result<Tensor> {
    Ok((x * sigmoid(&x.affine(1.702, 0.0)?)?)?)
}

struct Attention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    heads: usize,
    head_dim: usize,
}

impl Attention {
    fn new(config: &VisionConfig, vb: VarBuilder) -> Result<Self> {
        let d = config.embed_dim;
        Ok(Self {
            q_proj: linear(d, d, vb.pp("q_proj"))?,
            k_proj: linear(d, d, vb.pp("k_proj"))?,
            v_proj: linear(d, d, vb.pp("v_proj"))?,
            out_proj: linear(d, d, vb.pp("out_proj"))?,
            heads: config.num_attention_heads,
            head_dim: d / config.num_attention_heads,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (n, t, d) = x.dims3()?;
        let split = |y: Tensor| -> Result<Tensor> {
            Ok(y.reshape((n, t, self.heads, self.head_dim))?.transpose(1, 2)?.contiguous()?)
        };
        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let q = split(self.q_proj.forward(x)?.affine(scale, 0.0)?)?;
        let k = split(self.k_proj.forward(x)?)?;
        let v = split(self.v_proj.forward(x)?)?;

        let weights = q.matmul(&k.t()?.contiguous()?)?;
        let weights = candle_nn::ops::softmax(&weights, D::Minus1)?;
        let out = weights.matmul(&v)?.transpose(1, 2)?.reshape((n, t, d))?;
        Ok(self.out_proj.forward(&out)?)
    }
}

struct EncoderLayer {
    norm1: Norm,
    attn: Attention,
    norm2: Norm,
    fc1: Linear,
    fc2: Linear,
}

impl EncoderLayer {
    fn new(config: &VisionConfig, vb: VarBuilder) -> Result<Self> {
        let d = config.embed_dim;
        Ok(Self {
            norm1: Norm::new(d, config.layer_norm_eps, vb.pp("layer_norm1"))?,
            attn: Attention::new(config, vb.pp("self_attn"))?,
            norm2: Norm::new(d, config.layer_norm_eps, vb.pp("layer_norm2"))?,
            fc1: linear(d, config.intermediate_size, vb.pp("mlp").pp("fc1"))?,
            fc2: linear(config.intermediate_size, d, vb.pp("mlp").pp("fc2"))?,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = (x + self.attn.forward(&self.norm1.forward(x)?)?)?;
        let h = quick_gelu(&self.fc1.forward(&self.norm2.forward(&x)?)?)?;
        Ok((&x + self.fc2.forward(&h)?)?)
    }
}

/// CLIP 비전 인코더 (`vision_model.*` 가중치)
pub struct VisionTower {
    class_embedding: Tensor,
    /// `[3 * p * p, d]`
    patch_weight: Tensor,
    position_embedding: Tensor,
    pre_norm: Norm,
    layers: Vec<EncoderLayer>,
    post_norm: Norm,
    config: VisionConfig,
}

impl VisionTower {
    pub fn new(config: &VisionConfig, vb: VarBuilder) -> Result<Self> {
        let d = config.embed_dim;
        let p = config.patch_size;
        let emb = vb.pp("embeddings");
        let patch_weight = emb
            .get((d, 3, p, p), "patch_embedding.weight")?
            .reshape((d, 3 * p * p))?
            .t()?
            .contiguous()?;
        let layers = (0..config.num_hidden_layers)
            .map(|i| EncoderLayer::new(config, vb.pp("encoder").pp("layers").pp(i.to_string())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            class_embedding: emb.get(d, "class_embedding")?,
            patch_weight,
            position_embedding: emb.get((config.num_positions(), d), "position_embedding.weight")?,
            // 체크포인트의 키 이름이 원래 "pre_layrnorm"이다
            pre_norm: Norm::new(d, config.layer_norm_eps, vb.pp("pre_layrnorm"))?,
            layers,
            post_norm: Norm::new(d, config.layer_norm_eps, vb.pp("post_layernorm"))?,
            config: config.clone(),
        })
    }

    /// 정규화된 `[n, 3, s, s]` → 풀링된 `[n, d]`
    pub fn forward(&self, pixels: &Tensor) -> Result<Tensor> {
        let (n, _, _, _) = pixels.dims4()?;
        let g = self.config.grid();
        let p = self.config.patch_size;
        let d = self.config.embed_dim;

        // 겹치지 않는 패치를 펼친 뒤 선형 사영 (stride = kernel 인 conv와 같다)
        let patches = pixels
            .reshape(vec![n, 3, g, p, g, p])?
            .permute(vec![0, 2, 4, 1, 3, 5])?
            .contiguous()?
            .reshape((n, g * g, 3 * p * p))?;
        let patches = matmul_last(&patches, &self.patch_weight)?;

        let class = self.class_embedding.reshape((1, 1, d))?.broadcast_as((n, 1, d))?;
        let tokens = Tensor::cat(&[&class.contiguous()?, &patches], 1)?;
        let tokens = tokens.broadcast_add(&self.position_embedding.unsqueeze(0)?)?;

        let mut x = self.pre_norm.forward(&tokens)?;
        for layer in &self.layers {
            x = layer.forward(&x)?;
        }
        let pooled = x.narrow(1, 0, 1)?.squeeze(1)?;
        self.post_norm.forward(&pooled)
    }
}
