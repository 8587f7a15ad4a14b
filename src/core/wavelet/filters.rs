//! 직교 웨이블릿 필터 뱅크

use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// 지원하는 직교 웨이블릿 계열
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Wavelet {
    /// Haar (= db1)
    Haar,
    Db2,
    Db3,
    Db4,
    Coif1,
    Coif2,
}

// 재구성 저역 필터 계수
const HAAR: [f64; 2] = [0.7071067811865476, 0.7071067811865476];
const DB2: [f64; 4] = [
    0.48296291314469025,
    0.836516303737469,
    0.22414386804185735,
    -0.12940952255092145,
];
const DB3: [f64; 6] = [
    0.3326705529509569,
    0.8068915093133388,
    0.4598775021193313,
    -0.13501102001039084,
    -0.08544127388224149,
    0.035226291882100656,
];
const DB4: [f64; 8] = [
    0.23037781330885523,
    0.7148465705525415,
    0.6308807679295904,
    -0.02798376941698385,
    -0.18703481171888114,
    0.030841381835986965,
    0.032883011666982945,
    -0.010597401784997278,
];
const COIF1: [f64; 6] = [
    -0.0727326195128539,
    0.3378976624578092,
    0.8525720202122554,
    0.38486484686420286,
    -0.0727326195128539,
    -0.01565572813546454,
];
const COIF2: [f64; 12] = [
    0.016387336463522112,
    -0.04146493678175915,
    -0.06737255472196302,
    0.3861100668211622,
    0.8127236354455423,
    0.41700518442169254,
    -0.0764885990783064,
    -0.0594344186464569,
    0.023680171946334084,
    0.0056114348193944995,
    -0.0018232088707029932,
    -0.0007205494453645122,
];

/// 분해/재구성 필터 네 개
#[derive(Debug, Clone)]
pub struct FilterBank {
    pub dec_lo: Vec<f64>,
    pub dec_hi: Vec<f64>,
    pub rec_lo: Vec<f64>,
    pub rec_hi: Vec<f64>,
}

impl FilterBank {
    pub fn len(&self) -> usize {
        self.rec_lo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rec_lo.is_empty()
    }
}

impl Wavelet {
    pub fn rec_lo(&self) -> &'static [f64] {
        match self {
            Wavelet::Haar => &HAAR,
            Wavelet::Db2 => &DB2,
            Wavelet::Db3 => &DB3,
            Wavelet::Db4 => &DB4,
            Wavelet::Coif1 => &COIF1,
            Wavelet::Coif2 => &COIF2,
        }
    }

    /// 직교 QMF 관계: `rec_hi[k] = (-1)^k rec_lo[L-1-k]`, 분해 필터는 재구성 필터를 뒤집은 것
    pub fn filter_bank(&self) -> FilterBank {
        let rec_lo = self.rec_lo().to_vec();
        let n = rec_lo.len();
        let rec_hi: Vec<f64> = (0..n)
            .map(|k| if k % 2 == 0 { rec_lo[n - 1 - k] } else { -rec_lo[n - 1 - k] })
            .collect();
        let dec_lo = rec_lo.iter().rev().copied().collect();
        let dec_hi = rec_hi.iter().rev().copied().collect();
        FilterBank { dec_lo, dec_hi, rec_lo, rec_hi }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Wavelet::Haar => "haar",
            Wavelet::Db2 => "db2",
            Wavelet::Db3 => "db3",
            Wavelet::Db4 => "db4",
            Wavelet::Coif1 => "coif1",
            Wavelet::Coif2 => "coif2",
        }
    }
}

impl FromStr for Wavelet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_lowercase().as_str() {
            "haar" | "db1" => Wavelet::Haar,
            "db2" => Wavelet::Db2,
            "db3" => Wavelet::Db3,
            "db4" => Wavelet::Db4,
            "coif1" => Wavelet::Coif1,
            "coif2" => Wavelet::Coif2,
            other => bail!("지원하지 않는 웨이블릿: {} (haar, db1-4, coif1-2)", other),
        })
    }
}

impl fmt::Display for Wavelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
