//! 실수 2D FFT 주파수 격자와 감쇠 스케일 프로파일

use ndarray::Array2;

/// 실수 FFT의 비중복 주파수 개수.
/// 홀수 폭에서는 원래 폭을 정확히 복원하기 위해 한 칸을 더 남긴다.
pub fn half_width(w: usize) -> usize {
    if w % 2 == 1 {
        (w + 1) / 2
    } else {
        w / 2 + 1
    }
}

/// `numpy.fft.fftfreq(n)`과 같은 순환 부호 주파수
pub fn fftfreq(n: usize) -> Vec<f64> {
    let positive = (n - 1) / 2 + 1;
    (0..n)
        .map(|i| {
            let k = if i < positive { i as isize } else { i as isize - n as isize };
            k as f64 / n as f64
        })
        .collect()
}

/// `[h, half_width(w)]` 격자의 주파수 크기
pub fn rfft2d_freqs(h: usize, w: usize) -> Array2<f64> {
    let fy = fftfreq(h);
    let fx = fftfreq(w);
    let w2 = half_width(w);
    Array2::from_shape_fn((h, w2), |(r, c)| (fx[c] * fx[c] + fy[r] * fy[r]).sqrt())
}

/// 저주파를 키우는 감쇠 프로파일.
///
/// `scale = sqrt(h*w) / max(freq, 4/max(h,w))^decay_power`
pub fn decay_scale(h: usize, w: usize, decay_power: f64) -> Array2<f64> {
    let floor = 4.0 / h.max(w) as f64;
    let norm = ((h * w) as f64).sqrt();
    rfft2d_freqs(h, w).mapv(|f| norm / f.max(floor).powf(decay_power))
}
