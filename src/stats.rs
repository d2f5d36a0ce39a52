use crate::config::Config;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// 任何失败都只对用户说这一句
pub const APOLOGY: &str = "Sorry, I could not find the data you are looking for.";

const SENTENCE: &str = "{name} has {total_cases} total cases, {new_cases} new cases, \
{total_deaths} total deaths, {new_deaths} new deaths, {total_recovered} total recovered, \
{active_cases} active cases and {serious_cases} serious cases of Coronavirus till now.";

const FIELD_COUNT: usize = 8;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status: {0}")]
    Status(u16),

    #[error("format error: {0}")]
    Format(String),

    #[error("location not found: {0:?}")]
    NotFound(String),
}

/// 统计页面的来源
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch_page(&self) -> Result<String, StatsError>;
}

pub struct HttpStatsSource {
    url: String,
    timeout: Option<Duration>,
}

impl HttpStatsSource {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Self {
        HttpStatsSource {
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.stats_url.clone(),
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }
}

#[async_trait]
impl StatsSource for HttpStatsSource {
    async fn fetch_page(&self) -> Result<String, StatsError> {
        // 每次请求使用新的客户端, 用完即释放
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let response = client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

/// 表格中一个地区的一行, 字段顺序与表格列顺序一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRow {
    pub name: String,
    pub total_cases: String,
    pub new_cases: String,
    pub total_deaths: String,
    pub new_deaths: String,
    pub total_recovered: String,
    pub active_cases: String,
    pub serious_cases: String,
}

impl StatsRow {
    fn from_cells(cells: &[String]) -> Result<Self, StatsError> {
        if cells.len() < FIELD_COUNT {
            return Err(StatsError::Format(format!(
                "expected {FIELD_COUNT} cells, found {}",
                cells.len()
            )));
        }
        let name = or_zero(collapse_ws(&cells[0]));
        let mut numbers = cells[1..FIELD_COUNT]
            .iter()
            .map(|cell| or_zero(strip_ws(cell)));
        let mut next = || numbers.next().unwrap_or_else(|| "0".to_string());
        Ok(StatsRow {
            name,
            total_cases: next(),
            new_cases: next(),
            total_deaths: next(),
            new_deaths: next(),
            total_recovered: next(),
            active_cases: next(),
            serious_cases: next(),
        })
    }

    pub fn sentence(&self) -> Result<String, StatsError> {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), self.name.as_str());
        vars.insert("total_cases".to_string(), self.total_cases.as_str());
        vars.insert("new_cases".to_string(), self.new_cases.as_str());
        vars.insert("total_deaths".to_string(), self.total_deaths.as_str());
        vars.insert("new_deaths".to_string(), self.new_deaths.as_str());
        vars.insert("total_recovered".to_string(), self.total_recovered.as_str());
        vars.insert("active_cases".to_string(), self.active_cases.as_str());
        vars.insert("serious_cases".to_string(), self.serious_cases.as_str());
        strfmt::strfmt(SENTENCE, &vars).map_err(|e| StatsError::Format(e.to_string()))
    }
}

fn or_zero(value: String) -> String {
    if value.is_empty() {
        "0".to_string()
    } else {
        value
    }
}

fn strip_ws(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn selector(css: &str) -> Result<Selector, StatsError> {
    Selector::parse(css).map_err(|e| StatsError::Format(format!("bad selector {css}: {e}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().to_uppercase()
}

/// 按表头找到统计表格, 再按地区名取出一行.
/// 地区名先完全匹配第一列, 找不到时取第一列包含该名称的第一行.
pub fn extract_row(html: &str, header_marker: &str, location: &str) -> Result<StatsRow, StatsError> {
    let location = collapse_ws(location).to_uppercase();
    if location.is_empty() {
        return Err(StatsError::NotFound(location));
    }
    let marker = strip_ws(header_marker).to_uppercase();

    let tables = selector("table")?;
    let headers = selector("th")?;
    let body_rows = selector("tbody > tr")?;
    let cells = selector("td")?;

    let document = Html::parse_document(html);
    let table = document
        .select(&tables)
        .find(|table| {
            table
                .select(&headers)
                .any(|th| strip_ws(&cell_text(th)) == marker)
        })
        .ok_or_else(|| StatsError::Format(format!("no table headed {header_marker:?}")))?;

    let rows: Vec<Vec<String>> = table
        .select(&body_rows)
        .map(|tr| tr.select(&cells).map(cell_text).collect::<Vec<String>>())
        .filter(|row| !row.is_empty())
        .collect();
    if rows.is_empty() {
        return Err(StatsError::Format("stats table has no body rows".to_string()));
    }

    fn row_name(row: &[String]) -> String {
        collapse_ws(&row[0])
    }
    let row = rows
        .iter()
        .find(|row| row_name(row) == location)
        .or_else(|| rows.iter().find(|row| row_name(row).contains(&location)))
        .ok_or_else(|| StatsError::NotFound(location.clone()))?;

    StatsRow::from_cells(row)
}

async fn fetch_sentence(
    source: &dyn StatsSource,
    header_marker: &str,
    location: &str,
) -> Result<String, StatsError> {
    let page = source.fetch_page().await?;
    debug!("统计页面长度: {}", page.len());
    let row = extract_row(&page, header_marker, location)?;
    row.sentence()
}

/// 查询地区的统计数据, 失败时返回道歉语句
pub async fn report(source: &dyn StatsSource, header_marker: &str, location: &str) -> String {
    match fetch_sentence(source, header_marker, location).await {
        Ok(sentence) => sentence,
        Err(err) => {
            match &err {
                StatsError::NotFound(_) => info!(location, "未找到地区: {err}"),
                StatsError::Format(_) => warn!(location, "统计页面格式不符: {err}"),
                StatsError::Transport(_) | StatsError::Status(_) => {
                    error!(location, "获取统计页面失败: {err}")
                }
            }
            APOLOGY.to_string()
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{StatsError, StatsSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub const MARKER: &str = "Country,Other";

    pub const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Coronavirus Cases</title></head>
<body>
	<table id="news">
		<thead><tr><th>Latest updates</th></tr></thead>
		<tbody><tr><td>France</td><td>999</td></tr></tbody>
	</table>
	<table id="main_table_countries_today">
		<thead>
			<tr>
				<th>Country,<br>Other</th><th>Total<br>Cases</th><th>New<br>Cases</th>
				<th>Total<br>Deaths</th><th>New<br>Deaths</th><th>Total<br>Recovered</th>
				<th>Active<br>Cases</th><th>Serious,<br>Critical</th>
			</tr>
		</thead>
		<tbody>
			<tr style="">
				<td style="font-weight: bold; font-size:15px; text-align:left;"><a class="mt_a" href="country/france/">France</a></td>
				<td style="font-weight: bold; text-align:right">100</td>
				<td style="font-weight: bold; text-align:right;background-color:#FFEEAA;">10</td>
				<td style="font-weight: bold; text-align:right;">5</td>
				<td style="font-weight: bold; text-align:right;background-color:red; color:white">1</td>
				<td style="font-weight: bold; text-align:right">50</td>
				<td style="text-align:right;font-weight:bold;">45</td>
				<td style="font-weight: bold; text-align:right">2</td>
			</tr>
			<tr>
				<td>Italy</td><td>1 234</td><td></td><td>300</td><td> </td><td>900</td><td>34</td><td></td>
			</tr>
			<tr>
				<td>South
					Korea</td><td>8,086</td><td>+1</td><td>72</td><td></td><td>1,540</td><td>6,474</td><td>59</td>
			</tr>
			<tr>
				<td>Korea, North</td><td>1</td><td>1</td><td>1</td><td>1</td><td>1</td><td>1</td><td>1</td>
			</tr>
		</tbody>
	</table>
</body>
</html>"#;

    /// 固定返回一段页面, 并记录调用次数
    pub struct FixturePage {
        page: Option<String>,
        calls: AtomicUsize,
    }

    impl FixturePage {
        pub fn new(page: &str) -> Self {
            FixturePage {
                page: Some(page.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        /// 模拟服务端返回错误状态
        pub fn failing() -> Self {
            FixturePage {
                page: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatsSource for FixturePage {
        async fn fetch_page(&self) -> Result<String, StatsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.page.clone().ok_or(StatsError::Status(503))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{FixturePage, MARKER, PAGE};
    use super::*;
    use warp::Filter;

    #[test]
    fn extracts_row_in_column_order() {
        let row = extract_row(PAGE, MARKER, "france").unwrap();
        assert_eq!(
            row,
            StatsRow {
                name: "FRANCE".to_string(),
                total_cases: "100".to_string(),
                new_cases: "10".to_string(),
                total_deaths: "5".to_string(),
                new_deaths: "1".to_string(),
                total_recovered: "50".to_string(),
                active_cases: "45".to_string(),
                serious_cases: "2".to_string(),
            }
        );
        assert_eq!(
            row.sentence().unwrap(),
            "FRANCE has 100 total cases, 10 new cases, 5 total deaths, 1 new deaths, \
             50 total recovered, 45 active cases and 2 serious cases of Coronavirus till now."
        );
    }

    #[test]
    fn empty_cells_become_zero() {
        let sentence = extract_row(PAGE, MARKER, "ITALY").unwrap().sentence().unwrap();
        assert_eq!(
            sentence,
            "ITALY has 1234 total cases, 0 new cases, 300 total deaths, 0 new deaths, \
             900 total recovered, 34 active cases and 0 serious cases of Coronavirus till now."
        );
    }

    #[test]
    fn partial_name_matches_first_containing_row() {
        let row = extract_row(PAGE, MARKER, "Korea").unwrap();
        assert_eq!(row.name, "SOUTH KOREA");
        assert_eq!(row.new_cases, "+1");
        assert_eq!(row.new_deaths, "0");

        let exact = extract_row(PAGE, MARKER, "korea, north").unwrap();
        assert_eq!(exact.name, "KOREA, NORTH");
    }

    #[test]
    fn header_marker_ignores_case_and_whitespace() {
        assert!(extract_row(PAGE, "country, other", "FRANCE").is_ok());
    }

    #[test]
    fn missing_header_marker_is_format_error() {
        let err = extract_row(PAGE, "Places reporting cases", "FRANCE").unwrap_err();
        assert!(matches!(err, StatsError::Format(_)), "got {err:?}");
    }

    #[test]
    fn unknown_or_empty_location_is_not_found() {
        let err = extract_row(PAGE, MARKER, "ATLANTIS").unwrap_err();
        assert!(matches!(err, StatsError::NotFound(_)), "got {err:?}");

        let err = extract_row(PAGE, MARKER, "  ").unwrap_err();
        assert!(matches!(err, StatsError::NotFound(_)), "got {err:?}");
    }

    #[test]
    fn short_row_is_format_error() {
        let page = "<table><tr><th>Country,Other</th></tr>\
                    <tbody><tr><td>Spain</td><td>10</td></tr></tbody></table>";
        let err = extract_row(page, MARKER, "SPAIN").unwrap_err();
        assert!(matches!(err, StatsError::Format(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn report_is_idempotent() {
        let source = FixturePage::new(PAGE);
        let first = report(&source, MARKER, "FRANCE").await;
        let second = report(&source, MARKER, "FRANCE").await;
        assert_eq!(first, second);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn report_apologizes_on_every_failure() {
        let no_marker = FixturePage::new("<html><body><p>Page moved</p></body></html>");
        assert_eq!(report(&no_marker, MARKER, "FRANCE").await, APOLOGY);

        let source = FixturePage::new(PAGE);
        assert_eq!(report(&source, MARKER, "ATLANTIS").await, APOLOGY);
        assert_eq!(report(&source, MARKER, "").await, APOLOGY);

        let down = FixturePage::failing();
        assert_eq!(report(&down, MARKER, "FRANCE").await, APOLOGY);
    }

    #[tokio::test]
    async fn http_source_fetches_page_body() {
        let routes = warp::path("stats").map(|| warp::reply::html(PAGE));
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let source = HttpStatsSource::new(format!("http://{addr}/stats"), Some(Duration::from_secs(5)));
        let page = source.fetch_page().await.unwrap();
        assert_eq!(page, PAGE);

        let missing = HttpStatsSource::new(format!("http://{addr}/missing"), None);
        let err = missing.fetch_page().await.unwrap_err();
        assert!(matches!(err, StatsError::Status(404)), "got {err:?}");
    }

    #[tokio::test]
    async fn http_source_reports_transport_errors() {
        let source = HttpStatsSource::new("http://127.0.0.1:1/stats", Some(Duration::from_secs(2)));
        let err = source.fetch_page().await.unwrap_err();
        assert!(matches!(err, StatsError::Transport(_)), "got {err:?}");
    }
}
