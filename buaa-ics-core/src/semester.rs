use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Utc};

use crate::types::AcademicTerm;

/// UTC+8
pub fn china_standard_time() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap()
}

/// 学期判断器
pub struct SemesterDetector;

impl SemesterDetector {
    /// 按课表所在时区的当前时间判断学年学期
    pub fn detect_current(tz: &FixedOffset) -> AcademicTerm {
        Self::detect_from_date(Utc::now().with_timezone(tz))
    }

    /// 根据指定日期判断学年学期
    ///
    /// 1-6月属于上一学年第 2 学期，7-12月属于本学年第 1 学期。
    pub fn detect_from_date<Tz: TimeZone>(date: DateTime<Tz>) -> AcademicTerm {
        let year = date.year();
        if date.month() < 7 {
            AcademicTerm {
                year: format!("{}-{}", year - 1, year),
                term: 2,
            }
        } else {
            AcademicTerm {
                year: format!("{}-{}", year, year + 1),
                term: 1,
            }
        }
    }
}
