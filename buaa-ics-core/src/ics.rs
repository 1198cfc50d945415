use chrono::Utc;
use uuid::Uuid;

use crate::{IcsOptions, NormalizedEvent};


/// 固定的上海时区定义（无夏令时）
const VTIMEZONE: &[&str] = &[
    "BEGIN:VTIMEZONE",
    "TZID:Asia/Shanghai",
    "TZURL:http://tzurl.org/zoneinfo-outlook/Asia/Shanghai",
    "X-LIC-LOCATION:Asia/Shanghai",
    "BEGIN:STANDARD",
    "TZOFFSETFROM:+0800",
    "TZOFFSETTO:+0800",
    "TZNAME:CST",
    "DTSTART:19700101T000000",
    "END:STANDARD",
    "END:VTIMEZONE",
];

/// `DTSTART`/`DTEND` 中时间部分的位数
const TIME_WIDTH: usize = 6;

/// ICS日历生成器
pub struct IcsGenerator {
    options: IcsOptions,
}

impl IcsGenerator {
    pub fn new(options: IcsOptions) -> Self {
        Self { options }
    }

    /// 以标题和提醒分钟数直接构造
    pub fn with_title(title: impl Into<String>, reminder_minutes: u32) -> Self {
        Self::new(IcsOptions {
            calendar_name: title.into(),
            reminder_minutes,
        })
    }

    /// 生成ICS日历内容
    pub fn generate(&self, events: &[NormalizedEvent]) -> String {
        let mut ics_content = String::new();

        push_line(&mut ics_content, "BEGIN:VCALENDAR");
        push_line(&mut ics_content, "VERSION:2.0");
        push_line(&mut ics_content, "PRODID:-//BUAA ICS//BUAA Course Calendar//CN");
        push_line(
            &mut ics_content,
            &format!("X-WR-CALNAME:{}", escape_text(&self.options.calendar_name)),
        );
        push_line(&mut ics_content, "CALSCALE:GREGORIAN");
        push_line(&mut ics_content, "METHOD:PUBLISH");
        for line in VTIMEZONE {
            push_line(&mut ics_content, line);
        }

        let dtstamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        for event in events {
            self.add_event(&mut ics_content, event, &dtstamp);
        }

        push_line(&mut ics_content, "END:VCALENDAR");
        ics_content
    }

    /// 添加单个课程事件
    fn add_event(&self, ics_content: &mut String, event: &NormalizedEvent, dtstamp: &str) {
        let description = build_description(event);

        push_line(ics_content, "BEGIN:VEVENT");
        push_line(ics_content, &format!("UID:{}@buaa-ics", Uuid::new_v4()));
        push_line(ics_content, &format!("DTSTAMP:{dtstamp}"));
        push_line(
            ics_content,
            &format!(
                "DTSTART;TZID=Asia/Shanghai:{}",
                event_datetime(&event.date, &event.start)
            ),
        );
        push_line(
            ics_content,
            &format!(
                "DTEND;TZID=Asia/Shanghai:{}",
                event_datetime(&event.date, &event.end)
            ),
        );
        push_line(
            ics_content,
            &format!("DESCRIPTION:{}", escape_text(&description)),
        );
        push_line(
            ics_content,
            &format!("LOCATION:{}", escape_text(&event.location)),
        );
        push_line(
            ics_content,
            &format!("SUMMARY:{}", escape_text(&event.course_name)),
        );

        push_line(ics_content, "BEGIN:VALARM");
        push_line(ics_content, "ACTION:DISPLAY");
        push_line(
            ics_content,
            &format!("DESCRIPTION:{}", escape_text(&event.course_name)),
        );
        push_line(
            ics_content,
            &format!("TRIGGER:-PT{}M", self.options.reminder_minutes),
        );
        push_line(ics_content, "REPEAT:1");
        push_line(ics_content, "DURATION:PT1M");
        push_line(ics_content, "END:VALARM");

        push_line(ics_content, "END:VEVENT");
    }
}

impl Default for IcsGenerator {
    fn default() -> Self {
        Self::new(IcsOptions::default())
    }
}

fn push_line(ics_content: &mut String, line: &str) {
    ics_content.push_str(line);
    ics_content.push_str("\r\n");
}

/// 时间右侧补零到六位：`"0800"` -> `"080000"`
pub fn pad_time(time: &str) -> String {
    format!("{time:0<width$}", width = TIME_WIDTH)
}

/// `"20240913"` + `"0800"` -> `"20240913T080000"`
pub fn event_datetime(date: &str, time: &str) -> String {
    format!("{date}T{}", pad_time(time))
}

/// 转义ICS文本内容
pub fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

/// 构建课程描述信息
pub fn build_description(event: &NormalizedEvent) -> String {
    format!(
        "编号：{}\n名称：{}\n教师：{}\n学分：{}\n类型：{}\n课时：{}\n上课时间：{}；第 {} 节",
        event.course_id,
        event.course_name,
        event.teacher,
        event.credit,
        event.course_type,
        event.course_hour,
        event.course_time,
        event.lessons
    )
}
