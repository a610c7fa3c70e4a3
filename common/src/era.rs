//! 和暦変換

use chrono::{Datelike, NaiveDate};

/// 元号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JapaneseEra {
    Meiji,
    Taisho,
    Showa,
    Heisei,
    Reiwa,
}

impl JapaneseEra {
    /// 新しい元号から順に
    const ALL: [JapaneseEra; 5] = [
        JapaneseEra::Reiwa,
        JapaneseEra::Heisei,
        JapaneseEra::Showa,
        JapaneseEra::Taisho,
        JapaneseEra::Meiji,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JapaneseEra::Meiji => "明治",
            JapaneseEra::Taisho => "大正",
            JapaneseEra::Showa => "昭和",
            JapaneseEra::Heisei => "平成",
            JapaneseEra::Reiwa => "令和",
        }
    }

    /// 改元日
    pub fn start(&self) -> NaiveDate {
        let (y, m, d) = match self {
            JapaneseEra::Meiji => (1868, 10, 23),
            JapaneseEra::Taisho => (1912, 7, 30),
            JapaneseEra::Showa => (1926, 12, 25),
            JapaneseEra::Heisei => (1989, 1, 8),
            JapaneseEra::Reiwa => (2019, 5, 1),
        };
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
    }

    /// 元年の西暦年
    fn first_year(&self) -> i32 {
        self.start().year()
    }
}

/// 日付が属する元号
pub fn era_of(date: NaiveDate) -> Option<JapaneseEra> {
    JapaneseEra::ALL.into_iter().find(|era| date >= era.start())
}

/// 和暦の年（元年 = 1）
pub fn era_year(date: NaiveDate) -> Option<(JapaneseEra, i32)> {
    era_of(date).map(|era| (era, date.year() - era.first_year() + 1))
}

/// "令和8年5月20日" 形式
pub fn format_era_date(date: NaiveDate) -> Option<String> {
    era_year(date).map(|(era, year)| {
        format!("{}{}年{}月{}日", era.name(), year, date.month(), date.day())
    })
}
