//! # 학습 드라이버
//!
//! 파라미터화된 이미지를 렌더링하고, 표본을 뽑아 임베딩 모델로 인코딩한 뒤
//! 목표 임베딩과의 코사인 유사도로 계수를 갱신한다.

pub mod clip;
pub mod config;
pub mod encoder;
pub mod objective;
pub mod output;
pub mod sampler;
pub mod trainer;

#[cfg(test)]
mod __tests__;

pub use clip::ClipEncoder;
pub use config::{parse_size, RunSettings, TrainConfig};
pub use encoder::ImageEncoder;
pub use objective::{cosine_similarity, Objective, TrainState};
pub use output::{clean_text, run_name, OutputLayout};
pub use sampler::{area_matrix, Align, CropSampler, Sampler, Window};
pub use trainer::{encode_reference_image, RunReport, Trainer};
