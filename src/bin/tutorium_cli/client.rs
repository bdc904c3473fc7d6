#![deny(clippy::all, clippy::pedantic)]

use reqwest::{Client, Method, Response, Url};
use serde::Deserialize;
use thiserror::Error;
use tutorium_api_types::ErrorBody;

use crate::args::Cli;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Which listener a request goes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Listener {
    Public,
    Admin,
}

#[derive(Clone, Debug)]
pub struct Ctx {
    pub client: Client,
    pub site: Url,
    pub admin: Url,
}

impl Ctx {
    pub fn new(site: &str, admin: &str) -> Result<Self, CliError> {
        let site = Url::parse(site)?.join("/")?;
        let admin = Url::parse(admin)?.join("/")?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self {
            client,
            site,
            admin,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("tutorium-cli/", env!("CARGO_PKG_VERSION"))
    }

    pub fn url(&self, listener: Listener, path: &str) -> Result<Url, CliError> {
        let base = match listener {
            Listener::Public => &self.site,
            Listener::Admin => &self.admin,
        };
        base.join(path).map_err(CliError::Url)
    }

    pub async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        listener: Listener,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<serde_json::Value>,
    ) -> Result<T, CliError> {
        let mut url = self.url(listener, path)?;
        if let Some(q) = query {
            url.set_query(None);
            let mut qp = url.query_pairs_mut();
            for (k, v) in q {
                qp.append_pair(k, v);
            }
        }

        let mut req = self.client.request(method, url);
        if let Some(b) = body {
            req = req.json(&b);
        }

        let resp = req.send().await?;
        Self::handle(resp).await
    }

    async fn handle<T: for<'de> Deserialize<'de>>(resp: Response) -> Result<T, CliError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(CliError::Server(describe_failure(status.as_u16(), &bytes)));
        }
        let val = serde_json::from_slice(&bytes)
            .map_err(|e| CliError::Server(format!("failed to parse body: {e}")))?;
        Ok(val)
    }
}

/// Prefer the server's error message over the raw body.
fn describe_failure(status: u16, body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(error) => format!("status {status}: {}", error.message),
        Err(_) => format!("status {status} body {}", String::from_utf8_lossy(body)),
    }
}

pub fn build_ctx_from_cli(cli: &Cli) -> Result<Ctx, CliError> {
    Ctx::new(&cli.site, &cli.admin)
}
