use anyhow::Result;
use buaa_ics_core::{
    AcademicTerm, Credentials, ProviderConfig, WeekQuery, ics::IcsGenerator,
    providers::{Provider, TERM_WEEKS, buaa::BuaaProvider},
    semester::SemesterDetector,
};

/// 生成课程表命令参数
pub struct GenerateParams {
    pub username: String,
    pub password: String,
    pub year: Option<String>,
    pub term: Option<u8>,
    pub output: Option<String>,
    pub calendar_name: Option<String>,
    pub reminder_minutes: u32,
}

/// 用户给出的学年学期优先，缺省部分按课表时区的当前日期推算
fn resolve_term(
    provider: &BuaaProvider,
    year: Option<String>,
    term: Option<u8>,
) -> Result<AcademicTerm> {
    let detected = SemesterDetector::detect_current(&provider.timezone());
    let resolved = AcademicTerm::new(
        year.unwrap_or_else(|| detected.year.clone()),
        term.unwrap_or(detected.term),
    )?;
    if resolved != detected {
        tracing::info!(
            "自动检测学期: {}-{}, 最终使用: {}-{}",
            detected.year,
            detected.term,
            resolved.year,
            resolved.term
        );
    }
    Ok(resolved)
}

fn provider() -> Result<BuaaProvider> {
    Ok(BuaaProvider::with_config(&ProviderConfig::from_env()?)?)
}

/// 生成课程表命令
pub async fn generate_command(params: GenerateParams) -> Result<()> {
    let provider = provider()?;
    let term = resolve_term(&provider, params.year, params.term)?;
    tracing::info!(
        "开始生成课程表: 用户={}, 学年={}, 学期={}",
        params.username,
        term.year,
        term.term
    );

    let credentials = Credentials::new(params.username.clone(), params.password);

    println!("验证用户凭据...");
    let token = provider.authenticate(&credentials).await?;
    println!("✓ 凭据验证成功");

    println!("获取第 {}-{} 周课表...", TERM_WEEKS.start(), TERM_WEEKS.end());
    let events = provider.get_term(&term, &token).await?;
    println!("✓ 成功获取 {} 节课", events.len());

    println!("生成ICS日历文件...");
    let generator = IcsGenerator::with_title(
        params
            .calendar_name
            .unwrap_or_else(|| term.calendar_title()),
        params.reminder_minutes,
    );
    let ics_content = generator.generate(&events);

    // 确定输出文件名
    let output_file = params
        .output
        .unwrap_or_else(|| format!("{}-{}-{}.ics", params.username, term.year, term.term));

    tokio::fs::write(&output_file, ics_content).await?;
    println!("✓ ICS文件已保存到: {output_file}");

    Ok(())
}

/// 验证凭据命令
pub async fn validate_command(username: String, password: String) -> Result<()> {
    tracing::info!("验证凭据: 用户={}", username);

    let provider = provider()?;
    println!("验证用户凭据...");
    provider
        .authenticate(&Credentials::new(username, password))
        .await?;
    println!("凭据验证成功");

    Ok(())
}

/// 以 JSON 输出某一周的课程
pub async fn week_command(
    username: String,
    password: String,
    week: u32,
    year: Option<String>,
    term: Option<u8>,
) -> Result<()> {
    if !TERM_WEEKS.contains(&week) {
        anyhow::bail!(
            "周次必须在 {}-{} 之间",
            TERM_WEEKS.start(),
            TERM_WEEKS.end()
        );
    }
    let provider = provider()?;
    let term = resolve_term(&provider, year, term)?;
    let token = provider
        .authenticate(&Credentials::new(username, password))
        .await?;

    let events = provider
        .get_week(WeekQuery { term: &term, week }, &token)
        .await?;
    println!("{}", serde_json::to_string_pretty(&events)?);

    Ok(())
}
