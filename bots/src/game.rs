//! Where a new bot should connect.
//!
//! A plain deployment has one fixed address. A serverless deployment asks a
//! naming service for a game node and has to wait until that node runs.

use crate::error::ResolveError;
use async_trait::async_trait;
use log::{debug, info};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use tokio::time::{sleep, Duration, Instant};

#[async_trait]
pub trait GameArchitecture: Send + Sync {
    async fn address_for_player(&self) -> Result<SocketAddr, ResolveError>;
}

/// Every player connects to the same server.
#[derive(Debug, Clone)]
pub struct StaticGame {
    address: SocketAddr,
}

impl StaticGame {
    pub fn new(address: SocketAddr) -> Self {
        Self { address }
    }
}

#[async_trait]
impl GameArchitecture for StaticGame {
    async fn address_for_player(&self) -> Result<SocketAddr, ResolveError> {
        Ok(self.address)
    }
}

/// Bounds on how long a resolution may keep retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub window: Duration,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            delay: Duration::from_secs(3),
        }
    }
}

/// Runs `attempt` until it succeeds or the next try would start after the window.
pub async fn retry_within<T, F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<T, ResolveError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ResolveError>>,
{
    let started = Instant::now();
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let elapsed = started.elapsed();
                if elapsed + policy.delay > policy.window {
                    return Err(ResolveError::Exhausted {
                        elapsed,
                        last: Box::new(e),
                    });
                }
                debug!("Retrying in {:?}: {}", policy.delay, e);
                sleep(policy.delay).await;
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct NamingRequest {
    name: String,
    action: &'static str,
    source: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum NodeStatus {
    Start,
    Run,
    Stop,
}

#[derive(Debug, Deserialize)]
struct NamingResponse {
    status: NodeStatus,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    port: u16,
}

impl NamingResponse {
    /// Host and port of a running node, or the reason to try again.
    fn endpoint(self) -> Result<(String, u16), ResolveError> {
        if self.status != NodeStatus::Run {
            return Err(ResolveError::NotReady(format!("status {:?}", self.status)));
        }
        if self.hostname.trim().is_empty() {
            return Err(ResolveError::NotReady("blank hostname".to_string()));
        }
        Ok((self.hostname, self.port))
    }
}

/// Asks a naming service for a game node per player.
#[derive(Debug, Clone)]
pub struct ServerlessGame {
    client: Client,
    naming_url: String,
    policy: RetryPolicy,
}

impl ServerlessGame {
    pub fn new(naming_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            naming_url: naming_url.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn request_node(&self, request: &NamingRequest) -> Result<SocketAddr, ResolveError> {
        let response: NamingResponse = self
            .client
            .post(&self.naming_url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let (host, port) = response.endpoint()?;
        resolve_host(&host, port).await
    }
}

#[async_trait]
impl GameArchitecture for ServerlessGame {
    async fn address_for_player(&self) -> Result<SocketAddr, ResolveError> {
        let id: i32 = rand::thread_rng().gen();
        let request = NamingRequest {
            name: format!("servo/player:NAME={}", id),
            action: "GET",
            source: "EXTERNAL",
        };

        let pending = &request;
        let addr = retry_within(&self.policy, move || self.request_node(pending)).await?;
        info!("Naming service placed {} on {}", request.name, addr);
        Ok(addr)
    }
}

async fn resolve_host(host: &str, port: u16) -> Result<SocketAddr, ResolveError> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| ResolveError::UnknownHost {
            host: host.to_string(),
            port,
        })
}
