//! # 파라미터 상태 수명주기
//!
//! 세 파라미터화가 공유하는 재개(resume) 계약.
//! 없음(무작위 초기화), 이미지 경로, 스냅샷 경로, 메모리 상의 계수 중 하나를 받아
//! 각 파라미터화가 쓸 수 있는 형태로 정리한다.

pub mod image_io;
pub mod snapshot;


use anyhow::{bail, Result};
use candle_core::{Device, Tensor};
use std::path::{Path, PathBuf};

pub use image_io::{load_image, save_frame, LoadedImage};
pub use snapshot::{load_snapshot, save_snapshot};

/// 이미지로 취급하는 확장자
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

/// 초기화 출처
#[derive(Debug, Clone, Default)]
pub enum Resume {
    /// 무작위 초기화
    #[default]
    Random,
    /// 이미지 또는 스냅샷 파일 경로 (확장자로 구분)
    Path(PathBuf),
    /// 이미 메모리에 있는 계수
    Coeffs(Vec<Tensor>),
}

/// 해석된 초기화 출처
#[derive(Debug)]
pub enum Source {
    Random,
    Image(LoadedImage),
    Snapshot(Vec<Tensor>),
    Coeffs(Vec<Tensor>),
}

impl Resume {
    /// CLI 인자에서 생성
    pub fn from_arg<P: AsRef<Path>>(arg: Option<P>) -> Self {
        match arg {
            Some(path) => Resume::Path(path.as_ref().to_path_buf()),
            None => Resume::Random,
        }
    }

    /// 파일을 읽어 출처를 확정한다. 존재하지 않는 경로는 치명적 오류다.
    pub fn resolve(self, device: &Device) -> Result<Source> {
        match self {
            Resume::Random => Ok(Source::Random),
            Resume::Coeffs(tensors) => {
                if tensors.is_empty() {
                    bail!("재개할 계수가 비어 있음");
                }
                Ok(Source::Coeffs(tensors))
            }
            Resume::Path(path) => {
                if !path.is_file() {
                    bail!("Snapshot not found: {}", path.display());
                }
                if is_image_path(&path) {
                    let image = load_image(&path)?;
                    log::info!("이미지 로드: {} {:?}", path.display(), image.size);
                    Ok(Source::Image(image))
                } else {
                    let tensors = load_snapshot(&path, device)?;
                    log::info!("스냅샷 로드: {} (텐서 {}개)", path.display(), tensors.len());
                    Ok(Source::Snapshot(tensors))
                }
            }
        }
    }
}

/// 확장자로 이미지 파일 여부를 판단한다
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// 맨 텐서를 기대하는 파라미터화를 위해 첫 원소만 꺼낸다
pub(crate) fn first_tensor(tensors: Vec<Tensor>) -> Result<Tensor> {
    match tensors.into_iter().next() {
        Some(t) => Ok(t),
        None => bail!("계수 텐서가 없음"),
    }
}
