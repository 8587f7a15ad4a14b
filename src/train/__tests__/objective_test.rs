use crate::train::objective::{IMAGE_WEIGHT, STYLE_WEIGHT, SUBTRACT_WEIGHT, TEXT_WEIGHT};
use crate::train::{cosine_similarity, Objective, TrainState};
use approx::assert_abs_diff_eq;
use candle_core::{Device, Tensor};

fn 행렬(rows: &[[f32; 3]]) -> Tensor {
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Tensor::from_vec(flat, (rows.len(), 3), &Device::Cpu).unwrap()
}

fn 값(t: &Tensor) -> f32 {
    t.to_scalar::<f32>().unwrap()
}

#[test]
fn 코사인_유사도() {
    let a = 행렬(&[[1.0, 0.0, 0.0]]);
    let b = 행렬(&[[2.0, 0.0, 0.0], [0.0, 3.0, 0.0], [-1.0, 0.0, 0.0]]);
    let sim = cosine_similarity(&a, &b).unwrap().to_vec1::<f32>().unwrap();
    assert_abs_diff_eq!(sim[0], 1.0, epsilon = 1e-5);
    assert_abs_diff_eq!(sim[1], 0.0, epsilon = 1e-5);
    assert_abs_diff_eq!(sim[2], -1.0, epsilon = 1e-5);

    let c = 행렬(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    assert!(cosine_similarity(&c, &b).is_err());
}

#[test]
fn 목표가_없으면_오류() {
    let objective = Objective::new(false);
    assert!(objective.validate().is_err());
    let out = 행렬(&[[1.0, 0.0, 0.0]]);
    assert!(objective.loss(&out, None, &mut TrainState::default()).is_err());
}

#[test]
fn 유사도를_최대화하는_부호() {
    let out = 행렬(&[[1.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
    let mut objective = Objective::new(false);
    objective.push("text", 행렬(&[[1.0, 0.0, 0.0]]), TEXT_WEIGHT);
    let loss = objective.loss(&out, None, &mut TrainState::default()).unwrap();
    assert_abs_diff_eq!(값(&loss), -1.0, epsilon = 1e-5);

    let mut inverted = Objective::new(true);
    inverted.push("text", 행렬(&[[1.0, 0.0, 0.0]]), TEXT_WEIGHT);
    let loss = inverted.loss(&out, None, &mut TrainState::default()).unwrap();
    assert_abs_diff_eq!(값(&loss), 1.0, epsilon = 1e-5);
}

#[test]
fn 항별_가중치() {
    let out = 행렬(&[[1.0, 0.0, 0.0]]);
    let target = 행렬(&[[1.0, 0.0, 0.0]]);
    let mut objective = Objective::new(false);
    objective.push("style", target.clone(), STYLE_WEIGHT);
    objective.push("subtract", target.clone(), SUBTRACT_WEIGHT);
    objective.push("image", target, IMAGE_WEIGHT);
    // -0.5 + 1.0 - 0.5
    let loss = objective.loss(&out, None, &mut TrainState::default()).unwrap();
    assert_abs_diff_eq!(값(&loss), 0.0, epsilon = 1e-5);
    assert_eq!(objective.terms().len(), 3);
}

#[test]
fn 강화는_직전_임베딩을_기억한다() {
    let mut objective = Objective::new(false).with_enhance(0.5);
    objective.push("text", 행렬(&[[0.0, 1.0, 0.0]]), TEXT_WEIGHT);
    assert!(objective.needs_second_render());

    let mut state = TrainState::default();
    let first = 행렬(&[[1.0, 0.0, 0.0]]);
    let second = 행렬(&[[1.0, 0.0, 0.0]]);

    // 첫 스텝: 텍스트 0, diverse -0.5 × 1, 직전 임베딩 없음
    let loss = objective.loss(&first, Some(&second), &mut state).unwrap();
    assert_abs_diff_eq!(값(&loss), -0.5, epsilon = 1e-5);
    assert!(state.prev_embedding.is_some());

    // 둘째 스텝: expand 0.5 × cos(out, prev) = 0.5
    let loss = objective.loss(&first, Some(&second), &mut state).unwrap();
    assert_abs_diff_eq!(값(&loss), 0.0, epsilon = 1e-5);
}

#[test]
fn 음수_강화도_expand는_양수() {
    let mut objective = Objective::new(false).with_enhance(-0.3);
    objective.push("text", 행렬(&[[1.0, 0.0, 0.0]]), TEXT_WEIGHT);
    let mut state = TrainState::default();
    let out = 행렬(&[[1.0, 0.0, 0.0]]);
    objective.loss(&out, Some(&out), &mut state).unwrap();
    assert!(state.prev_embedding.is_some());
}
