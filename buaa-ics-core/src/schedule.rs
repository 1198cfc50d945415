//! 周课表的校验与规范化：排序、相邻同名课程合并、日期与时间还原、节次格式化。

use serde::Deserialize;

use crate::{ClassRecord, Error, NormalizedEvent, Result};

/// 缺少上课时间时使用的占位时间
pub const PLACEHOLDER_TIME: &str = "000000";

const TIME_SEPARATORS: [char; 3] = ['～', '~', '-'];

#[derive(Debug, Deserialize)]
struct TimetableEnvelope {
    d: TimetableData,
}

#[derive(Debug, Deserialize)]
struct TimetableData {
    weekdays: Vec<String>,
    classes: Vec<ClassRecord>,
}

/// 一周的原始课表
#[derive(Debug, Clone, PartialEq)]
pub struct WeekTimetable {
    /// 周一到周日的日期，`YYYY-MM-DD`
    pub weekdays: Vec<String>,
    pub classes: Vec<ClassRecord>,
}

impl WeekTimetable {
    /// 解析课表接口的响应体
    ///
    /// 不是 JSON 或缺少字段时返回 [`Error::Json`]，日期数量不是 7 时返回 [`Error::Timetable`]。
    pub fn parse(body: &str) -> Result<Self> {
        let envelope: TimetableEnvelope = serde_json::from_str(body)?;
        let TimetableData { weekdays, classes } = envelope.d;
        if weekdays.len() != 7 {
            return Err(Error::Timetable(format!(
                "expected 7 weekdays, got {}",
                weekdays.len()
            )));
        }
        Ok(Self { weekdays, classes })
    }

    /// 排序、合并并规范化为事件列表
    pub fn normalize(self) -> Vec<NormalizedEvent> {
        let mut classes: Vec<ClassRecord> = self
            .classes
            .into_iter()
            .filter(|class| {
                let ok = (1..=7).contains(&class.weekday);
                if !ok {
                    tracing::warn!(
                        "忽略星期无效的课程: {} (weekday={})",
                        class.course_name,
                        class.weekday
                    );
                }
                ok
            })
            .collect();
        sort_classes(&mut classes);
        merge_adjacent_classes(&mut classes);
        classes
            .into_iter()
            .map(|class| normalize_class(class, &self.weekdays))
            .collect()
    }
}

fn sort_key(class: &ClassRecord) -> u32 {
    let first_digit = class
        .lessons
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .unwrap_or(0);
    u32::from(class.weekday) * 100 + first_digit
}

/// 按 `weekday * 100 + 节次首位数字` 稳定排序
pub fn sort_classes(classes: &mut [ClassRecord]) {
    classes.sort_by_key(sort_key);
}

/// 将上课时间拆成开始和结束两段
pub fn split_course_time(course_time: &str) -> (Option<&str>, Option<&str>) {
    let course_time = course_time.trim();
    match course_time.split_once(TIME_SEPARATORS) {
        Some((start, end)) => (non_empty(start), non_empty(end)),
        None => (non_empty(course_time), None),
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

fn separator_of(course_time: &str) -> char {
    course_time
        .chars()
        .find(|c| TIME_SEPARATORS.contains(c))
        .unwrap_or('～')
}

/// 合并相邻的同名课程
///
/// 后一条并入前一条：节次拼接，上课时间取前者开始、后者结束。
/// 输入需已按 [`sort_classes`] 排序。
pub fn merge_adjacent_classes(classes: &mut Vec<ClassRecord>) {
    let mut merged: Vec<ClassRecord> = Vec::with_capacity(classes.len());
    for class in classes.drain(..) {
        match merged.last_mut() {
            Some(prev) if prev.course_name == class.course_name => {
                prev.lessons.push_str(&class.lessons);
                prev.course_time = join_course_time(&prev.course_time, &class.course_time);
            }
            _ => merged.push(class),
        }
    }
    *classes = merged;
}

fn join_course_time(earlier: &str, later: &str) -> String {
    let (earlier_start, earlier_end) = split_course_time(earlier);
    let (later_start, later_end) = split_course_time(later);
    let start = earlier_start.or(later_start);
    let end = later_end.or(later_start).or(earlier_end);
    match (start, end) {
        (Some(start), Some(end)) => format!("{start}{}{end}", separator_of(earlier)),
        (Some(only), None) | (None, Some(only)) => only.to_string(),
        (None, None) => String::new(),
    }
}

/// `"08:00"` -> `"0800"`，小时补足两位
pub fn compact_time(time: &str) -> String {
    let mut parts = time.trim().split(':');
    let hour = parts.next().unwrap_or_default();
    let rest: String = parts.collect();
    if rest.is_empty() {
        return hour.to_string();
    }
    format!("{hour:0>2}{rest}")
}

/// `"0102"` -> `"01, 02"`
pub fn format_lessons(lessons: &str) -> String {
    lessons
        .chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 由 1 起始的星期得到 `YYYYMMDD`
pub fn resolve_date(weekdays: &[String], weekday: u8) -> Option<String> {
    let index = usize::from(weekday).checked_sub(1)?;
    weekdays
        .get(index)
        .map(|d| d.chars().filter(char::is_ascii_digit).collect())
}

fn normalize_class(class: ClassRecord, weekdays: &[String]) -> NormalizedEvent {
    let date = resolve_date(weekdays, class.weekday).unwrap_or_default();
    let (start, end) = match split_course_time(&class.course_time) {
        (Some(start), end) => {
            let start = compact_time(start);
            let end = end.map_or_else(|| start.clone(), compact_time);
            (start, end)
        }
        (None, _) => {
            tracing::warn!("课程 {} 缺少上课时间，使用占位时间", class.course_name);
            (PLACEHOLDER_TIME.to_string(), PLACEHOLDER_TIME.to_string())
        }
    };

    NormalizedEvent {
        lessons: format_lessons(&class.lessons),
        course_id: class.course_id,
        course_name: class.course_name,
        teacher: class.teacher,
        credit: class.credit,
        course_type: class.course_type,
        course_hour: class.course_hour,
        date,
        start,
        end,
        location: class.location,
        course_time: class.course_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, weekday: u8, lessons: &str, course_time: &str) -> ClassRecord {
        ClassRecord {
            course_name: name.to_string(),
            weekday,
            lessons: lessons.to_string(),
            course_time: course_time.to_string(),
            ..Default::default()
        }
    }

    fn weekdays() -> Vec<String> {
        (9..=15).map(|d| format!("2024-09-{d:02}")).collect()
    }

    #[test]
    fn test_date_resolves_for_every_weekday() {
        let days = weekdays();
        for w in 1..=7u8 {
            let expected = days[usize::from(w) - 1].replace('-', "");
            assert_eq!(resolve_date(&days, w), Some(expected));
        }
        assert_eq!(resolve_date(&days, 0), None);
        assert_eq!(resolve_date(&days, 8), None);
    }

    #[test]
    fn test_merges_consecutive_sessions() {
        let mut classes = vec![
            class("A", 1, "01", "08:00～08:45"),
            class("A", 1, "02", "08:55～09:40"),
        ];
        merge_adjacent_classes(&mut classes);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].lessons, "0102");
        assert_eq!(classes[0].course_time, "08:00～09:40");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut classes = vec![
            class("A", 1, "01", "08:00～08:45"),
            class("A", 1, "02", "08:55～09:40"),
            class("B", 1, "03", "10:00～10:45"),
            class("A", 2, "01", "08:00-08:45"),
        ];
        sort_classes(&mut classes);
        merge_adjacent_classes(&mut classes);
        let once = classes.clone();
        merge_adjacent_classes(&mut classes);
        assert_eq!(classes, once);
        assert_eq!(once.len(), 3);
        for pair in once.windows(2) {
            assert_ne!(pair[0].course_name, pair[1].course_name);
        }
    }

    #[test]
    fn test_merge_keeps_dash_separator() {
        let mut classes = vec![
            class("数学", 3, "03", "10:00-10:45"),
            class("数学", 3, "04", "10:55-11:40"),
            class("数学", 3, "05", "11:50-12:35"),
        ];
        merge_adjacent_classes(&mut classes);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].lessons, "030405");
        assert_eq!(classes[0].course_time, "10:00-12:35");
    }

    #[test]
    fn test_merge_tolerates_missing_time() {
        let mut classes = vec![class("A", 1, "01", ""), class("A", 1, "02", "08:55～09:40")];
        merge_adjacent_classes(&mut classes);
        assert_eq!(classes[0].course_time, "08:55～09:40");
    }

    #[test]
    fn test_sort_uses_weekday_then_first_digit_and_is_stable() {
        let mut classes = vec![
            class("C", 2, "01", ""),
            class("B", 1, "10", ""),
            class("A", 1, "03", ""),
            class("D", 1, "05", ""),
        ];
        sort_classes(&mut classes);
        let names: Vec<_> = classes.iter().map(|c| c.course_name.as_str()).collect();
        // "03" 与 "05" 首位都是 0，保持原有顺序
        assert_eq!(names, ["A", "D", "B", "C"]);
    }

    #[test]
    fn test_lessons_are_reformatted() {
        assert_eq!(format_lessons("0102"), "01, 02");
        assert_eq!(format_lessons("010203"), "01, 02, 03");
        assert_eq!(format_lessons("11"), "11");
        assert_eq!(format_lessons(""), "");
    }

    #[test]
    fn test_compact_time_pads_hour() {
        assert_eq!(compact_time("08:00"), "0800");
        assert_eq!(compact_time("8:00"), "0800");
        assert_eq!(compact_time("14:00:30"), "140030");
        assert_eq!(compact_time("0800"), "0800");
    }

    #[test]
    fn test_split_handles_all_separators() {
        assert_eq!(
            split_course_time("08:00～09:35"),
            (Some("08:00"), Some("09:35"))
        );
        assert_eq!(
            split_course_time("08:00~09:35"),
            (Some("08:00"), Some("09:35"))
        );
        assert_eq!(
            split_course_time("08:00-09:35"),
            (Some("08:00"), Some("09:35"))
        );
        assert_eq!(split_course_time("08:00"), (Some("08:00"), None));
        assert_eq!(split_course_time(""), (None, None));
    }

    #[test]
    fn test_missing_course_time_uses_placeholder() {
        let week = WeekTimetable {
            weekdays: weekdays(),
            classes: vec![class("体育", 5, "07", "")],
        };
        let events = week.normalize();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start, PLACEHOLDER_TIME);
        assert_eq!(events[0].end, PLACEHOLDER_TIME);
        assert_eq!(events[0].date, "20240913");
    }

    #[test]
    fn test_start_only_time_reuses_start_as_end() {
        let week = WeekTimetable {
            weekdays: weekdays(),
            classes: vec![class("讲座", 2, "09", "19:00")],
        };
        let events = week.normalize();
        assert_eq!(events[0].start, "1900");
        assert_eq!(events[0].end, "1900");
    }

    #[test]
    fn test_normalize_full_week() {
        let week = WeekTimetable {
            weekdays: weekdays(),
            classes: vec![
                class("B", 2, "03", "10:00～10:45"),
                class("A", 1, "01", "08:00～08:45"),
                class("A", 1, "02", "08:55～09:40"),
                class("X", 9, "01", "08:00～08:45"),
            ],
        };
        let events = week.normalize();
        assert_eq!(events.len(), 2);
        let a = &events[0];
        assert_eq!(a.course_name, "A");
        assert_eq!(a.date, "20240909");
        assert_eq!(a.lessons, "01, 02");
        assert_eq!(a.start, "0800");
        assert_eq!(a.end, "0940");
        assert_eq!(a.course_time, "08:00～09:40");
        assert_eq!(events[1].date, "20240910");
    }

    #[test]
    fn test_parse_rejects_malformed_payloads() {
        assert!(matches!(
            WeekTimetable::parse("<html>系统维护</html>"),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            WeekTimetable::parse(r#"{"e": 1}"#),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            WeekTimetable::parse(r#"{"d": {"weekdays": [], "classes": null}}"#),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            WeekTimetable::parse(r#"{"d": {"weekdays": ["2024-09-09"], "classes": []}}"#),
            Err(Error::Timetable(_))
        ));
    }

    #[test]
    fn test_parse_accepts_well_formed_payload() {
        let body = serde_json::json!({
            "e": 0,
            "d": {
                "weekdays": weekdays(),
                "classes": [{
                    "course_id": "B1", "course_name": "A", "teacher": "T",
                    "credit": "2", "course_type": "必修", "course_hour": "32",
                    "weekday": "1", "lessons": "01", "course_time": "08:00～08:45",
                    "location": "J1"
                }]
            }
        })
        .to_string();
        let week = WeekTimetable::parse(&body).unwrap();
        assert_eq!(week.classes.len(), 1);
        assert_eq!(week.normalize()[0].date, "20240909");
    }
}
