use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use super::{DashboardError, DashboardResult};

/// 一次请求的参考时刻与参考时区
///
/// 所有按天截断、"今天"判断和时间窗口都从这里取值，不读取全局时钟。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceClock {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl ReferenceClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    /// 当前时刻，时区取自配置
    pub fn system(offset: FixedOffset) -> Self {
        Self::new(Utc::now(), offset)
    }

    /// 参考时区下的当天日期
    pub fn today(&self) -> NaiveDate {
        self.now.with_timezone(&self.offset).date_naive()
    }

    /// 窗口起点 `now - days`，超出可表示范围时返回校验错误
    pub fn window_start(&self, days: u32) -> DashboardResult<DateTime<Utc>> {
        Duration::try_days(i64::from(days))
            .and_then(|span| self.now.checked_sub_signed(span))
            .ok_or_else(|| DashboardError::validation("days", format!("时间窗口 {days} 天超出范围")))
    }

    /// SQLite 日期修饰符，把存储的 UTC 时间平移到参考时区，如 `+60 minutes`
    pub fn sqlite_modifier(&self) -> String {
        format!("{:+} minutes", self.offset.local_minus_utc() / 60)
    }
}

/// 解析 `±HH:MM` 形式的时区偏移
pub fn parse_offset(raw: &str) -> DashboardResult<FixedOffset> {
    let raw = raw.trim();
    let invalid = || DashboardError::ConfigError(format!("无效的时区偏移: {raw}"));

    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
