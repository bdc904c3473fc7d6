#![deny(clippy::all, clippy::pedantic)]

use reqwest::Method;
use tutorium_api_types::{
    CacheHealth, CacheStats, FlushResponse, InvalidateRequest, InvalidateResponse,
    ReconnectResponse, WarmReport,
};

use crate::args::CacheCmd;
use crate::client::{CliError, Ctx, Listener};
use crate::print::print_json;

pub async fn handle(ctx: &Ctx, cmd: CacheCmd) -> Result<(), CliError> {
    match cmd {
        CacheCmd::Health => {
            let res: CacheHealth = admin(ctx, Method::GET, "cache/health", None).await?;
            print_json(&res)
        }
        CacheCmd::Stats => {
            let res: CacheStats = admin(ctx, Method::GET, "cache/stats", None).await?;
            print_json(&res)
        }
        CacheCmd::Flush => {
            let res: FlushResponse = admin(ctx, Method::POST, "cache/flush", None).await?;
            print_json(&res)
        }
        CacheCmd::Invalidate { language, heading } => {
            let body = serde_json::to_value(InvalidateRequest { language, heading })
                .map_err(|e| CliError::Server(format!("failed to encode request: {e}")))?;
            let res: InvalidateResponse =
                admin(ctx, Method::POST, "cache/invalidate", Some(body)).await?;
            print_json(&res)
        }
        CacheCmd::Warm => {
            let res: WarmReport = admin(ctx, Method::POST, "cache/warm", None).await?;
            print_json(&res)
        }
        CacheCmd::Reconnect => {
            let res: ReconnectResponse = admin(ctx, Method::POST, "cache/reconnect", None).await?;
            print_json(&res)
        }
    }
}

async fn admin<T: for<'de> serde::Deserialize<'de>>(
    ctx: &Ctx,
    method: Method,
    path: &str,
    body: Option<serde_json::Value>,
) -> Result<T, CliError> {
    ctx.request(Listener::Admin, method, path, None, body).await
}
