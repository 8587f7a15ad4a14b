//! 계수 스냅샷 저장/로드 (safetensors)

use anyhow::{bail, Result};
use candle_core::{DType, Device, Tensor};
use std::collections::HashMap;
use std::path::Path;

const KEY_PREFIX: &str = "coeffs.";

fn key(index: usize) -> String {
    format!("{}{:03}", KEY_PREFIX, index)
}

/// 순서가 있는 계수 목록을 저장한다
pub fn save_snapshot<P: AsRef<Path>>(tensors: &[Tensor], path: P) -> Result<()> {
    if tensors.is_empty() {
        bail!("저장할 계수가 없음");
    }
    let map: HashMap<String, Tensor> = tensors
        .iter()
        .enumerate()
        .map(|(i, t)| -> Result<(String, Tensor)> {
            Ok((key(i), t.detach().to_device(&Device::Cpu)?.to_dtype(DType::F32)?))
        })
        .collect::<Result<_>>()?;
    candle_core::safetensors::save(&map, path.as_ref())?;
    log::debug!("스냅샷 저장: {} (텐서 {}개)", path.as_ref().display(), tensors.len());
    Ok(())
}

/// 저장 순서대로 계수를 읽어 `device`로 옮긴다. 그래디언트 이력은 없다.
pub fn load_snapshot<P: AsRef<Path>>(path: P, device: &Device) -> Result<Vec<Tensor>> {
    let map = candle_core::safetensors::load(path.as_ref(), device)?;
    let mut entries: Vec<(usize, Tensor)> = Vec::with_capacity(map.len());
    for (name, tensor) in map {
        let index = match name.strip_prefix(KEY_PREFIX).and_then(|i| i.parse::<usize>().ok()) {
            Some(i) => i,
            None => bail!("알 수 없는 스냅샷 키: {}", name),
        };
        entries.push((index, tensor.detach()));
    }
    entries.sort_by_key(|(i, _)| *i);
    for (expected, (index, _)) in entries.iter().enumerate() {
        if *index != expected {
            bail!("스냅샷 계수 {}번이 빠져 있음", expected);
        }
    }
    if entries.is_empty() {
        bail!("빈 스냅샷: {}", path.as_ref().display());
    }
    Ok(entries.into_iter().map(|(_, t)| t).collect())
}
