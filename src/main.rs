use anyhow::Result;
use candle_core::Device;
use clap::{Arg, ArgAction, ArgMatches, Command};
use spectral_dream::core::{build_param, ParamConfig, ParamKind, Resume, Wavelet};
use spectral_dream::train::objective::{IMAGE_WEIGHT, STYLE_WEIGHT, SUBTRACT_WEIGHT, TEXT_WEIGHT};
use spectral_dream::train::{
    encode_reference_image, parse_size, run_name, Align, ClipEncoder, CropSampler, ImageEncoder,
    Objective, OutputLayout, RunSettings, TrainConfig, Trainer,
};
use std::path::PathBuf;
use std::process;

fn cli() -> Command {
    let value = |name: &'static str, long: &'static str, help: &'static str| {
        Arg::new(name).long(long).value_name(name).help(help)
    };
    let flag = |name: &'static str, help: &'static str| {
        Arg::new(name).long(name).help(help).action(ArgAction::SetTrue)
    };

    Command::new("dream")
        .version("0.1.0")
        .about("텍스트/이미지 임베딩을 목표로 FFT·DWT·픽셀 파라미터화 이미지를 합성")
        .arg(value("in_txt", "in_txt", "주제 텍스트").short('t'))
        .arg(value("in_txt2", "in_txt2", "스타일 텍스트"))
        .arg(value("in_txt0", "in_txt0", "빼고 싶은 텍스트"))
        .arg(value("in_img", "in_img", "참조 이미지").short('i'))
        .arg(value("out_dir", "out_dir", "출력 디렉토리").default_value("_out"))
        .arg(value("size", "size", "출력 해상도 W-H").short('s').default_value("1280-720"))
        .arg(value("resume", "resume", "재개할 이미지 또는 스냅샷 경로").short('r'))
        .arg(value("fstep", "fstep", "프레임 저장 간격").default_value("1"))
        .arg(flag("save_pt", "계수 스냅샷 저장"))
        .arg(value("steps", "steps", "전체 반복 횟수").default_value("200"))
        .arg(value("samples", "samples", "스텝당 표본 수").default_value("200"))
        .arg(value("lrate", "lrate", "학습률").default_value("0.05"))
        .arg(flag("prog", "학습률을 점진적으로 키움 (최대 2배)").short('p'))
        .arg(flag("dwt", "FFT 대신 웨이블릿 파라미터화"))
        .arg(flag("pixel", "FFT 대신 픽셀 파라미터화"))
        .arg(value("wave", "wave", "웨이블릿: haar, db1-4, coif1-2").short('w').default_value("coif2"))
        .arg(value("align", "align", "크롭 분포: uniform, central").short('a').default_value("uniform"))
        .arg(value("macro", "macro", "큰 크롭 비중 0..1").default_value("0.4"))
        .arg(value("contrast", "contrast", "저장 프레임 대비").default_value("0.9"))
        .arg(value("colors", "colors", "색 포화도 계수").default_value("1.5"))
        .arg(value("decay", "decay", "스펙트럼 감쇠 지수 (클수록 흐림)").default_value("1.5"))
        .arg(value("sharp", "sharp", "선명도").default_value("0.3"))
        .arg(value("enhance", "enhance", "일관성 강화").short('e').default_value("0"))
        .arg(value("noise", "noise", "누적 억제용 노이즈").short('n').default_value("0"))
        .arg(flag("invert", "기준 반전"))
        .arg(value("seed", "seed", "난수 시드"))
        .arg(flag("cpu", "GPU가 있어도 CPU 사용"))
        .arg(flag("no_video", "ffmpeg 비디오 생략"))
}

fn parsed<T>(matches: &ArgMatches, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = matches
        .get_one::<String>(name)
        .ok_or_else(|| anyhow::anyhow!("--{} 값이 없음", name))?;
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("--{} 값이 잘못됨 ({}): {}", name, raw, e))
}

fn run(matches: &ArgMatches) -> Result<()> {
    let text = matches.get_one::<String>("in_txt").cloned();
    let style = matches.get_one::<String>("in_txt2").cloned();
    let subtract = matches.get_one::<String>("in_txt0").cloned();
    let image = matches.get_one::<String>("in_img").map(PathBuf::from).filter(|p| p.is_file());
    let resume_arg = matches.get_one::<String>("resume").map(PathBuf::from);
    let seed: Option<u64> = match matches.get_one::<String>("seed") {
        Some(_) => Some(parsed(matches, "seed")?),
        None => None,
    };

    let device = if matches.get_flag("cpu") {
        Device::Cpu
    } else {
        Device::cuda_if_available(0)?
    };
    log::info!("장치: {:?}", device);

    let kind = if matches.get_flag("dwt") {
        ParamKind::Dwt
    } else if matches.get_flag("pixel") {
        ParamKind::Pixel
    } else {
        ParamKind::Fft
    };

    let (h, w) = parse_size(&parsed::<String>(matches, "size")?)?;
    let sharpness: f64 = parsed(matches, "sharp")?;
    let colors: f64 = parsed(matches, "colors")?;
    let mut param_config = ParamConfig::new(h, w)
        .with_decay_power(parsed(matches, "decay")?)
        .with_sharpness(sharpness)
        .with_colors(colors)
        .with_wavelet(parsed::<Wavelet>(matches, "wave")?);
    param_config.seed = seed;

    let mut train_config = TrainConfig::default()
        .with_steps(parsed(matches, "steps")?)
        .with_samples(parsed(matches, "samples")?)
        .with_lrate(parsed(matches, "lrate")?)
        .with_fstep(parsed(matches, "fstep")?)
        .with_enhance(parsed(matches, "enhance")?)
        .with_out_dir(parsed::<String>(matches, "out_dir")?);
    train_config.progressive = matches.get_flag("prog");
    train_config.contrast = parsed(matches, "contrast")?;
    train_config.colors = colors;
    train_config.sharpness = sharpness;
    train_config.noise = parsed(matches, "noise")?;
    train_config.invert = matches.get_flag("invert");
    train_config.save_snapshot = matches.get_flag("save_pt");
    train_config.make_video = !matches.get_flag("no_video");
    train_config.seed = seed;

    // 없는 재개 경로는 모델을 받기 전에 실패시킨다
    let param = build_param(kind, &param_config, Resume::from_arg(resume_arg.as_ref()), &device)?;
    let size = param.size();

    let encoder = ClipEncoder::from_hub(&device)?;
    let samples = train_config.effective_samples(style.is_some(), subtract.is_some());
    let mut sampler = CropSampler::new(seed)
        .with_align(parsed::<Align>(matches, "align")?)
        .with_macro(parsed(matches, "macro")?);

    let mut objective = Objective::new(train_config.invert).with_enhance(train_config.enhance);
    if let Some(t) = &text {
        println!(" 주제 텍스트: {}", t);
        objective.push("text", encoder.encode_text(t)?, TEXT_WEIGHT);
    }
    if let Some(t) = &style {
        println!(" 스타일 텍스트: {}", t);
        objective.push("style", encoder.encode_text(t)?, STYLE_WEIGHT);
    }
    if let Some(t) = &subtract {
        println!(" 제외 텍스트: {}", t);
        objective.push("subtract", encoder.encode_text(t)?, SUBTRACT_WEIGHT);
    }
    if let Some(path) = &image {
        println!(" 참조 이미지: {}", path.display());
        let embedding = encode_reference_image(path, &encoder, &mut sampler, samples, &device)?;
        objective.push("image", embedding, IMAGE_WEIGHT);
    }
    objective.validate()?;

    let name = run_name(text.as_deref(), style.as_deref(), subtract.as_deref(), image.as_deref());
    let layout = OutputLayout::new(&train_config.out_dir, &name);
    layout.prepare()?;
    layout.write_settings(&RunSettings {
        name: name.clone(),
        kind,
        size,
        text: text.clone(),
        style_text: style.clone(),
        subtract_text: subtract.clone(),
        image: image.clone(),
        resume: resume_arg.clone(),
        samples,
        param: param_config.clone(),
        train: train_config.clone(),
    })?;
    println!(" 크기 {}x{}, 표본 {}, 출력 {}", size.1, size.0, samples, layout.frames_dir().display());

    let steps = train_config.steps;
    let mut trainer = Trainer::new(param, &encoder, Box::new(sampler), objective, train_config, samples)?;
    let report = trainer.run(&layout)?;

    println!("✅ 완료: 프레임 {}개, 마지막 손실 {:.4}", report.frames, report.final_loss);
    if let Some(path) = &report.final_frame {
        println!("   최종 이미지 ({} 스텝): {}", steps, path.display());
    }
    if let Some(path) = &report.snapshot {
        println!("   스냅샷: {}", path.display());
    }
    if let Some(path) = &report.video {
        println!("   비디오: {}", path.display());
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let matches = cli().get_matches();
    if let Err(e) = run(&matches) {
        eprintln!("❌ 오류: {:#}", e);
        process::exit(1);
    }
}
