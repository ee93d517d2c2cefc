//! Recording fakes for the collaborator traits

use crate::azure::AzureCredential;
use crate::credentials::ConnectionTarget;
use crate::executor::ScriptExecutor;
use crate::firewall::{Authorizer, FirewallRuleClient, ResourceManager, RuleIdentity};
use crate::probe::{ProbeOutcome, ReachabilityProbe};
use crate::script::ScriptReference;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Probe(String),
    GetCredential,
    GetResourceManager(String),
    AddRule(String),
    Execute(PathBuf),
    RemoveRule(String),
}

/// One fake implementing every collaborator, logging calls in order.
#[derive(Clone, Default)]
pub struct Recorder {
    pub(crate) calls: Arc<Mutex<Vec<Call>>>,
    /// `None` means the runner is already allowed.
    pub blocked_address: Option<String>,
    /// Probe fails without naming an address.
    pub inconclusive: bool,
    pub fail_authorizer: bool,
    pub fail_resource_manager: bool,
    pub fail_add: bool,
    pub fail_execute: bool,
    pub fail_remove: bool,
}

impl Recorder {
    pub fn blocked(address: &str) -> Self {
        Self {
            blocked_address: Some(address.to_string()),
            ..Default::default()
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl ReachabilityProbe for Recorder {
    async fn detect_caller_address(&self, target: &ConnectionTarget) -> ProbeOutcome {
        self.record(Call::Probe(target.server().to_string()));
        if self.inconclusive {
            return ProbeOutcome::Inconclusive {
                reason: "Access denied for user".to_string(),
            };
        }
        match &self.blocked_address {
            Some(address) => ProbeOutcome::Blocked {
                caller_address: address.clone(),
            },
            None => ProbeOutcome::AlreadyAllowed,
        }
    }
}

#[async_trait]
impl Authorizer for Recorder {
    async fn get_credential(&self) -> Result<AzureCredential> {
        self.record(Call::GetCredential);
        if self.fail_authorizer {
            bail!("not logged in");
        }
        Ok(AzureCredential {
            access_token: "token".to_string(),
            subscription_id: "subscription".to_string(),
        })
    }
}

#[async_trait]
impl ResourceManager for Recorder {
    async fn get_resource_manager(
        &self,
        _credential: &AzureCredential,
        server: &str,
    ) -> Result<Box<dyn FirewallRuleClient>> {
        self.record(Call::GetResourceManager(server.to_string()));
        if self.fail_resource_manager {
            bail!("server not found");
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl FirewallRuleClient for Recorder {
    async fn add_rule(&self, address: &str) -> Result<RuleIdentity> {
        self.record(Call::AddRule(address.to_string()));
        if self.fail_add {
            bail!("quota exceeded");
        }
        Ok(RuleIdentity {
            name: format!("rule-{}", address),
            id: None,
        })
    }

    async fn remove_rule(&self, rule: &RuleIdentity) -> Result<()> {
        self.record(Call::RemoveRule(rule.name.clone()));
        if self.fail_remove {
            bail!("service unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl ScriptExecutor for Recorder {
    async fn execute(&self, _target: &ConnectionTarget, script: &ScriptReference) -> Result<()> {
        self.record(Call::Execute(script.path().to_path_buf()));
        if self.fail_execute {
            bail!("ERROR 1064 (42000): You have an error in your SQL syntax");
        }
        Ok(())
    }
}

/// Write an executable shell script standing in for a client binary.
pub fn write_stub_exe(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).expect("write stub");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path).expect("meta").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
    }
    path
}

/// Canned HTTP response for [`StubServer`].
pub struct StubResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl StubResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn render(&self) -> String {
        let mut out = format!(
            "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            self.body.len()
        );
        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out.push_str("\r\n");
        out.push_str(&self.body);
        out
    }
}

/// Local HTTP server answering one connection per canned response.
pub struct StubServer {
    listener: TcpListener,
    url: String,
}

impl StubServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("http://{}", listener.local_addr().expect("addr"));
        Self { listener, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Serve `responses` in order. The handle yields the request lines seen.
    pub fn serve(self, responses: Vec<StubResponse>) -> JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            for response in responses {
                let (mut stream, _) = self.listener.accept().await.expect("accept");
                seen.push(read_request_line(&mut stream).await);
                stream
                    .write_all(response.render().as_bytes())
                    .await
                    .expect("write response");
                let _ = stream.shutdown().await;
            }
            seen
        })
    }
}

/// Read one request, headers and body, returning its first line.
async fn read_request_line(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut wanted = None;

    loop {
        if let Some(total) = wanted {
            if buf.len() >= total {
                break;
            }
        } else if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            wanted = Some(end + 4 + length);
            continue;
        }

        let n = stream.read(&mut chunk).await.expect("read request");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}
