//! 分档规则。每个规则自上而下匹配，命中第一档即返回；
//! 任一输入为 NULL 时条件不成立，落入最后一档。

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalaryTier {
    Supermax,
    Max,
    Top50,
    Top100,
    Top200,
    Other,
}

impl SalaryTier {
    pub fn from_rank(rank: Option<i64>) -> Self {
        match rank {
            Some(r) if r <= 10 => SalaryTier::Supermax,
            Some(r) if r <= 30 => SalaryTier::Max,
            Some(r) if r <= 50 => SalaryTier::Top50,
            Some(r) if r <= 100 => SalaryTier::Top100,
            Some(r) if r <= 200 => SalaryTier::Top200,
            _ => SalaryTier::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SalaryTier::Supermax => "Top 10 (Supermax)",
            SalaryTier::Max => "Top 30 (Max)",
            SalaryTier::Top50 => "Top 50",
            SalaryTier::Top100 => "Top 100",
            SalaryTier::Top200 => "Top 200",
            SalaryTier::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringTier {
    Elite,
    AllStar,
    Starter,
    RolePlayer,
    Bench,
}

impl ScoringTier {
    pub fn from_ppg(ppg: Option<f64>) -> Self {
        match ppg {
            Some(p) if p >= 25.0 => ScoringTier::Elite,
            Some(p) if p >= 20.0 => ScoringTier::AllStar,
            Some(p) if p >= 15.0 => ScoringTier::Starter,
            Some(p) if p >= 10.0 => ScoringTier::RolePlayer,
            _ => ScoringTier::Bench,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoringTier::Elite => "Elite Scorer (25+ PPG)",
            ScoringTier::AllStar => "All-Star (20-25 PPG)",
            ScoringTier::Starter => "Starter (15-20 PPG)",
            ScoringTier::RolePlayer => "Role Player (10-15 PPG)",
            ScoringTier::Bench => "Bench Player (<10 PPG)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactTier {
    Superstar,
    Star,
    AboveAverage,
    Average,
    BelowAverage,
}

impl ImpactTier {
    pub fn from_vorp(vorp: Option<f64>) -> Self {
        match vorp {
            Some(v) if v >= 6.0 => ImpactTier::Superstar,
            Some(v) if v >= 4.0 => ImpactTier::Star,
            Some(v) if v >= 2.0 => ImpactTier::AboveAverage,
            Some(v) if v >= 0.0 => ImpactTier::Average,
            _ => ImpactTier::BelowAverage,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImpactTier::Superstar => "Superstar (6+ VORP)",
            ImpactTier::Star => "Star (4-6 VORP)",
            ImpactTier::AboveAverage => "Above Average (2-4 VORP)",
            ImpactTier::Average => "Average (0-2 VORP)",
            ImpactTier::BelowAverage => "Below Average (<0 VORP)",
        }
    }
}

/// 薪资排名 × VORP 的价值分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCategory {
    StarExcellentValue,
    StarFairValue,
    StarOverpaid,
    HiddenGem,
    GoodValue,
    FairValue,
    BelowAverage,
}

impl ValueCategory {
    pub fn classify(
        salary_rank: Option<i64>,
        vorp: Option<f64>,
    ) -> Self {
        let (Some(rank), Some(vorp)) = (salary_rank, vorp) else {
            return ValueCategory::BelowAverage;
        };

        if rank <= 50 {
            if vorp >= 4.0 {
                ValueCategory::StarExcellentValue
            } else if vorp >= 2.0 {
                ValueCategory::StarFairValue
            } else {
                ValueCategory::StarOverpaid
            }
        } else if vorp >= 4.0 {
            ValueCategory::HiddenGem
        } else if vorp >= 2.0 {
            ValueCategory::GoodValue
        } else if vorp >= 0.0 {
            ValueCategory::FairValue
        } else {
            ValueCategory::BelowAverage
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValueCategory::StarExcellentValue => "Star - Excellent Value",
            ValueCategory::StarFairValue => "Star - Fair Value",
            ValueCategory::StarOverpaid => "Star - Overpaid",
            ValueCategory::HiddenGem => "Hidden Gem",
            ValueCategory::GoodValue => "Good Value",
            ValueCategory::FairValue => "Fair Value",
            ValueCategory::BelowAverage => "Below Average",
        }
    }
}

/// 场均得分的同比趋势
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceTrend {
    SignificantlyImproved,
    Improved,
    SignificantlyDeclined,
    Declined,
    Stable,
}

impl PerformanceTrend {
    pub fn classify(
        current_ppg: Option<f64>,
        previous_ppg: Option<f64>,
    ) -> Self {
        let Some(current) = current_ppg else {
            return PerformanceTrend::Stable;
        };
        let previous = previous_ppg.unwrap_or(0.0);

        if current > previous + 2.0 {
            PerformanceTrend::SignificantlyImproved
        } else if current > previous {
            PerformanceTrend::Improved
        } else if current < previous - 2.0 {
            PerformanceTrend::SignificantlyDeclined
        } else if current < previous {
            PerformanceTrend::Declined
        } else {
            PerformanceTrend::Stable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceTrend::SignificantlyImproved => "Significantly Improved",
            PerformanceTrend::Improved => "Improved",
            PerformanceTrend::SignificantlyDeclined => "Significantly Declined",
            PerformanceTrend::Declined => "Declined",
            PerformanceTrend::Stable => "Stable",
        }
    }
}

/// VORP 的同比趋势
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactTrend {
    Breakout,
    Improving,
    Regression,
    Declining,
    Consistent,
}

impl ImpactTrend {
    pub fn classify(
        current_vorp: Option<f64>,
        previous_vorp: Option<f64>,
    ) -> Self {
        let Some(current) = current_vorp else {
            return ImpactTrend::Consistent;
        };
        let previous = previous_vorp.unwrap_or(0.0);

        if current > previous + 1.0 {
            ImpactTrend::Breakout
        } else if current > previous {
            ImpactTrend::Improving
        } else if current < previous - 1.0 {
            ImpactTrend::Regression
        } else if current < previous {
            ImpactTrend::Declining
        } else {
            ImpactTrend::Consistent
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImpactTrend::Breakout => "Breakout",
            ImpactTrend::Improving => "Improving",
            ImpactTrend::Regression => "Regression",
            ImpactTrend::Declining => "Declining",
            ImpactTrend::Consistent => "Consistent",
        }
    }
}

/// 奖项标记：不区分大小写的子串匹配，NULL 视为 0
pub fn award_flag(
    awards: Option<&str>,
    code: &str,
) -> u8 {
    match awards {
        Some(text) => text.to_ascii_uppercase().contains(&code.to_ascii_uppercase()) as u8,
        None => 0,
    }
}
