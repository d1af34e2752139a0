//! 单元测试共用的构造函数

use serde::Serialize;

use crate::source::{PlayerSalaryRecord, PlayerSeasonStat};

pub fn stat(
    name: &str,
    season: &str,
    games: i64,
) -> PlayerSeasonStat {
    PlayerSeasonStat {
        player_name: name.into(),
        season: season.into(),
        games_played: Some(games),
        ..Default::default()
    }
}

pub fn salary(
    name: &str,
    season: &str,
    amount: i64,
    rank: i64,
) -> PlayerSalaryRecord {
    PlayerSalaryRecord {
        player_name: name.into(),
        season: season.into(),
        salary: Some(amount),
        salary_formatted: Some(dollars(amount)),
        salary_rank: Some(rank),
    }
}

/// 10000000 -> "$10,000,000"
pub fn dollars(amount: i64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("${out}")
}

/// 记录按 serde 字段顺序序列化后的表头
pub fn serialized_header<T: Serialize>(row: &T) -> Vec<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.serialize(row).unwrap();
    let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
    text.lines().next().unwrap().split(',').map(str::to_string).collect()
}
