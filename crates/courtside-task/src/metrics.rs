//! 派生指标的公共算子：舍入、比值、赛季换算、聚合与排序。

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Add;

/// 四舍五入到 `places` 位小数（远离零）
pub fn round_to(
    value: f64,
    places: i32,
) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn round_opt(
    value: Option<f64>,
    places: i32,
) -> Option<f64> {
    value.map(|v| round_to(v, places))
}

pub fn round_whole(value: Option<f64>) -> Option<i64> {
    value.map(|v| v.round() as i64)
}

/// 分子分母都为正时返回比值，否则为 None
/// 薪资换算为百万，保留 4 位小数，与 MySQL 整数相除的默认精度一致
pub fn millions(salary: Option<f64>) -> Option<f64> {
    round_opt(salary.map(|s| s / 1_000_000.0), 4)
}

pub fn positive_ratio(
    numerator: Option<f64>,
    denominator: Option<f64>,
) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if n > 0.0 && d > 0.0 => Some(n / d),
        _ => None,
    }
}

/// 分母为正时返回比值，否则为 None
pub fn ratio(
    numerator: Option<f64>,
    denominator: Option<f64>,
) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

/// 当前值与上一赛季值之差，上一赛季缺失按 0 计
pub fn delta(
    current: Option<f64>,
    previous: Option<f64>,
    places: i32,
) -> Option<f64> {
    current.map(|c| round_to(c - previous.unwrap_or(0.0), places))
}

pub fn as_float(value: Option<i64>) -> Option<f64> {
    value.map(|v| v as f64)
}

/// "2023-24" -> 2023
pub fn season_year(season: &str) -> Option<u32> {
    let digits: String = season.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// "2023-24" -> "2022-23"；不是 "YYYY-YY" 形式时返回 None
pub fn previous_season(season: &str) -> Option<String> {
    let (start, end) = season.split_once('-')?;
    if start.len() != 4 || end.len() != 2 {
        return None;
    }
    let start: u32 = start.parse().ok()?;
    let end: u32 = end.parse().ok()?;
    if start == 0 || end != (start + 1) % 100 {
        return None;
    }
    Some(format!("{}-{:02}", start - 1, start % 100))
}

/// 降序比较，None 排在最后
pub fn desc_nulls_last<T: PartialOrd>(
    a: Option<T>,
    b: Option<T>,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// 忽略 NULL 的平均值
#[derive(Debug, Default, Clone)]
pub struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    pub fn push(
        &mut self,
        value: Option<f64>,
    ) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    pub fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn rounded(
        &self,
        places: i32,
    ) -> Option<f64> {
        round_opt(self.value(), places)
    }
}

/// 忽略 NULL 的求和；全部为 NULL 时结果为 None
#[derive(Debug, Clone)]
pub struct Total<T> {
    sum: Option<T>,
}

impl<T> Default for Total<T> {
    fn default() -> Self {
        Self { sum: None }
    }
}

impl<T: Add<Output = T> + Copy> Total<T> {
    pub fn push(
        &mut self,
        value: Option<T>,
    ) {
        if let Some(v) = value {
            self.sum = Some(match self.sum {
                Some(sum) => sum + v,
                None => v,
            });
        }
    }

    pub fn value(&self) -> Option<T> {
        self.sum
    }
}

/// 忽略 NULL 的最大/最小值
#[derive(Debug, Default, Clone)]
pub struct Extent {
    min: Option<i64>,
    max: Option<i64>,
}

impl Extent {
    pub fn push(
        &mut self,
        value: Option<i64>,
    ) {
        if let Some(v) = value {
            self.min = Some(self.min.map_or(v, |m| m.min(v)));
            self.max = Some(self.max.map_or(v, |m| m.max(v)));
        }
    }

    pub fn min(&self) -> Option<i64> {
        self.min
    }

    pub fn max(&self) -> Option<i64> {
        self.max
    }
}

/// COUNT(DISTINCT player_name)
#[derive(Debug, Default, Clone)]
pub struct Distinct {
    names: BTreeSet<String>,
}

impl Distinct {
    pub fn push(
        &mut self,
        name: &str,
    ) {
        if !self.names.contains(name) {
            self.names.insert(name.to_string());
        }
    }

    pub fn count(&self) -> usize {
        self.names.len()
    }
}
