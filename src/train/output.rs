//! 출력 디렉토리 구성과 후처리 (최종 프레임 복사, 비디오 인코딩, 설정 기록)

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// 이름 조각 하나의 최대 길이
pub const NAME_PART_LEN: usize = 40;
pub const DEFAULT_NAME: &str = "dream";

/// 영숫자만 남기고 공백 묶음은 `_`로 바꾼다
pub fn clean_text(text: &str) -> String {
    let mut out = String::new();
    let mut pending_space = false;
    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            pending_space = true;
        } else if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push('_');
            }
            pending_space = false;
            out.push(ch);
        }
    }
    out.chars().take(NAME_PART_LEN).collect()
}

/// 실행 이름: 주제-스타일-off-제외-이미지
pub fn run_name(
    text: Option<&str>,
    style: Option<&str>,
    subtract: Option<&str>,
    image: Option<&Path>,
) -> String {
    let mut parts = Vec::new();
    if let Some(t) = text {
        parts.push(clean_text(t));
    }
    if let Some(t) = style {
        parts.push(clean_text(t));
    }
    if let Some(t) = subtract {
        parts.push(format!("off-{}", clean_text(t)));
    }
    if let Some(stem) = image.and_then(|p| p.file_stem()).and_then(|s| s.to_str()) {
        parts.push(stem.replace(' ', "_"));
    }
    parts.retain(|p| !p.is_empty());
    if parts.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        parts.join("-")
    }
}

/// `<out_dir>/<name>` 아래의 산출물 경로
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub out_dir: PathBuf,
    pub name: String,
}

impl OutputLayout {
    pub fn new<P: Into<PathBuf>>(out_dir: P, name: &str) -> Self {
        Self {
            out_dir: out_dir.into(),
            name: name.to_string(),
        }
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.out_dir.join(&self.name)
    }

    pub fn frame(&self, index: usize) -> PathBuf {
        self.frames_dir().join(format!("{:04}.jpg", index))
    }

    pub fn final_frame(&self, steps: usize) -> PathBuf {
        self.out_dir.join(format!("{}-{}.jpg", self.name, steps))
    }

    pub fn video(&self) -> PathBuf {
        self.out_dir.join(format!("{}.mp4", self.name))
    }

    pub fn snapshot(&self) -> PathBuf {
        self.out_dir.join(format!("{}.safetensors", self.name))
    }

    pub fn settings(&self) -> PathBuf {
        self.frames_dir().join("settings.json")
    }

    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(self.frames_dir())
            .with_context(|| format!("출력 디렉토리 생성 실패: {}", self.frames_dir().display()))
    }

    pub fn write_settings<T: Serialize>(&self, settings: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(self.settings(), json)
            .with_context(|| format!("설정 저장 실패: {}", self.settings().display()))
    }

    /// 이름순으로 마지막 프레임
    pub fn last_frame(&self) -> Result<Option<PathBuf>> {
        let mut frames: Vec<PathBuf> = fs::read_dir(self.frames_dir())?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jpg"))
            .collect();
        frames.sort();
        Ok(frames.pop())
    }

    /// 마지막 프레임을 `<name>-<steps>.jpg`로 복사한다
    pub fn copy_final(&self, steps: usize) -> Result<Option<PathBuf>> {
        match self.last_frame()? {
            Some(last) => {
                let dst = self.final_frame(steps);
                fs::copy(&last, &dst)
                    .with_context(|| format!("최종 프레임 복사 실패: {}", last.display()))?;
                Ok(Some(dst))
            }
            None => Ok(None),
        }
    }

    /// ffmpeg로 프레임을 mp4로 묶는다. ffmpeg가 없거나 실패하면 경고만 남긴다.
    pub fn encode_video(&self) -> bool {
        let pattern = self.frames_dir().join("%04d.jpg");
        let status = Command::new("ffmpeg")
            .args(["-v", "warning", "-y", "-i"])
            .arg(&pattern)
            .arg(self.video())
            .status();
        match status {
            Ok(s) if s.success() => {
                log::info!("비디오 저장: {}", self.video().display());
                true
            }
            Ok(s) => {
                log::warn!("ffmpeg 실패 ({}): 비디오 생략", s);
                false
            }
            Err(e) => {
                log::warn!("ffmpeg 실행 불가 ({}): 비디오 생략", e);
                false
            }
        }
    }
}
