use crate::request::RequestEnvelope;
use crate::skill::Skill;
use crate::stats::{HttpStatsSource, StatsSource};
use crate::validation::{AcceptAll, AlexaRequestValidator, RequestValidator};
use anyhow::Context;
use serde::Serialize;
use std::convert::Infallible;
use std::env;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use warp::http::HeaderMap;
use warp::hyper::body::Bytes;
use warp::{hyper::StatusCode, Filter, Reply};

mod config;
mod locale;
mod request;
mod response;
mod skill;
mod stats;
mod validation;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 获取可执行文件所在的目录路径
    let exe_path = env::current_exe().context("Failed to get current executable path")?;
    let exe_dir = exe_path
        .parent()
        .context("Failed to get parent directory of executable")?;

    // 加载 config.yaml, 不存在时使用默认配置
    let config_path = exe_dir.join("config.yaml");
    let config = if config_path.exists() {
        config::load(&config_path)
            .with_context(|| format!("Failed to load config file at {:?}", &config_path))?
    } else {
        warn!("未找到配置文件 {:?}, 使用默认配置", &config_path);
        config::Config::default()
    };

    let validator: Arc<dyn RequestValidator> = if config.verification.enabled {
        Arc::new(AlexaRequestValidator::from_config(&config.verification))
    } else {
        warn!("请求校验已关闭");
        Arc::new(AcceptAll)
    };
    let state = AppState {
        stats: Arc::new(HttpStatsSource::from_config(&config)),
        validator,
        header_marker: Arc::from(config.header_marker.as_str()),
    };

    info!("开始监听{}端口, 路径 /{}", config.port, config.route);
    warp::serve(routes(state, config.route.clone()))
        .run(([0, 0, 0, 0], config.port))
        .await;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    stats: Arc<dyn StatsSource>,
    validator: Arc<dyn RequestValidator>,
    header_marker: Arc<str>,
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn routes(
    state: AppState,
    route: String,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    // POST /{route}, 校验签名需要原始 body 和请求头
    let skill_route = warp::path(route)
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::headers_cloned())
        .and(warp::body::bytes())
        .and(with_state(state))
        .and_then(handle_skill);

    // GET /health
    let health_route = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&HealthStatus { status: "ok" }));

    skill_route.or(health_route)
}

async fn handle_skill(
    headers: HeaderMap,
    body: Bytes,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    let envelope: RequestEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("无法解析请求: {e}");
            return Ok(bad_request());
        }
    };

    if !state.validator.validate(&headers, &body, &envelope).await {
        return Ok(bad_request());
    }

    let skill = Skill::new(state.stats.as_ref(), &state.header_marker);
    let response = skill.handle(&envelope).await;
    debug!("回复: {:?}", response.speech());
    Ok(warp::reply::with_status(warp::reply::json(&response), StatusCode::OK).into_response())
}

fn bad_request() -> warp::reply::Response {
    warp::reply::with_status(warp::reply(), StatusCode::BAD_REQUEST).into_response()
}

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
}
