//! MySQL server firewall management through Azure Resource Manager

use super::{describe_error, http_client, AzureCredential};
use crate::config::Settings;
use crate::firewall::{rule_name, FirewallRuleClient, ResourceManager, RuleIdentity};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Server flavours and the API version used for each.
const SERVER_KINDS: &[(&str, &str)] = &[
    ("servers", "2017-12-01"),
    ("flexibleServers", "2021-05-01"),
];

#[derive(Deserialize)]
struct ServerList {
    #[serde(default)]
    value: Vec<ServerResource>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ServerResource {
    id: String,
    name: String,
    #[serde(default)]
    properties: ServerProperties,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ServerProperties {
    fully_qualified_domain_name: Option<String>,
}

/// First DNS label of a host name.
fn short_name(server: &str) -> &str {
    server.split('.').next().unwrap_or(server)
}

impl ServerResource {
    fn matches(&self, server: &str) -> bool {
        let fqdn_matches = self
            .properties
            .fully_qualified_domain_name
            .as_deref()
            .is_some_and(|fqdn| fqdn.eq_ignore_ascii_case(server));
        fqdn_matches || self.name.eq_ignore_ascii_case(short_name(server))
    }
}

/// State of an Azure long-running operation.
#[derive(Debug, PartialEq, Eq)]
enum OperationState {
    Running,
    Succeeded,
    Failed(String),
}

fn operation_state(status: StatusCode, body: &Value) -> OperationState {
    if status == StatusCode::ACCEPTED {
        return OperationState::Running;
    }
    match body.get("status").and_then(Value::as_str) {
        // Location-style polling returns the final resource without a status
        None => OperationState::Succeeded,
        Some(s) if s.eq_ignore_ascii_case("succeeded") => OperationState::Succeeded,
        Some(s) if s.eq_ignore_ascii_case("failed") || s.eq_ignore_ascii_case("canceled") => {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or(s)
                .to_string();
            OperationState::Failed(message)
        }
        Some(_) => OperationState::Running,
    }
}

/// Locates MySQL servers in a subscription.
pub struct ArmResourceManager {
    http: reqwest::Client,
    endpoint: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl ArmResourceManager {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            http: http_client(settings.http_timeout)?,
            endpoint: settings.resource_manager_endpoint.clone(),
            poll_interval: settings.poll_interval,
            poll_timeout: settings.poll_timeout,
        })
    }

    async fn list_servers(
        &self,
        credential: &AzureCredential,
        kind: &str,
        api_version: &str,
    ) -> Result<Vec<ServerResource>> {
        let mut servers = Vec::new();
        let mut next = Some(format!(
            "{}/subscriptions/{}/providers/Microsoft.DBforMySQL/{}?api-version={}",
            self.endpoint, credential.subscription_id, kind, api_version
        ));

        while let Some(url) = next.take() {
            debug!(url = %url, "Listing MySQL servers");
            let response = self
                .http
                .get(&url)
                .bearer_auth(&credential.access_token)
                .send()
                .await
                .context("Failed to list MySQL servers")?;

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if !status.is_success() {
                bail!("Listing {} failed: {}", kind, describe_error(status, &body));
            }

            let page: ServerList =
                serde_json::from_str(&body).context("Failed to parse server list")?;
            servers.extend(page.value);
            next = page.next_link;
        }

        Ok(servers)
    }
}

#[async_trait]
impl ResourceManager for ArmResourceManager {
    async fn get_resource_manager(
        &self,
        credential: &AzureCredential,
        server: &str,
    ) -> Result<Box<dyn FirewallRuleClient>> {
        for &(kind, api_version) in SERVER_KINDS {
            let servers = self.list_servers(credential, kind, api_version).await?;
            if let Some(found) = servers.into_iter().find(|s| s.matches(server)) {
                info!(server = %found.name, kind = %kind, "Found MySQL server");
                return Ok(Box::new(ArmFirewall {
                    http: self.http.clone(),
                    endpoint: self.endpoint.clone(),
                    access_token: credential.access_token.clone(),
                    server_id: found.id,
                    api_version,
                    poll_interval: self.poll_interval,
                    poll_timeout: self.poll_timeout,
                }));
            }
        }

        Err(anyhow!(
            "Unable to get details of MySQL server {}. MySql server '{}' was not found in the subscription.",
            server,
            short_name(server)
        ))
    }
}

/// Firewall rules of one MySQL server.
struct ArmFirewall {
    http: reqwest::Client,
    endpoint: String,
    access_token: String,
    server_id: String,
    api_version: &'static str,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl ArmFirewall {
    fn rule_id(&self, name: &str) -> String {
        format!("{}/firewallRules/{}", self.server_id, name)
    }

    fn rule_url(&self, rule_id: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, rule_id, self.api_version)
    }

    /// Finish a mutating request, waiting out a 202 if the service returns one.
    async fn complete(&self, response: Response, operation: &str) -> Result<()> {
        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::ACCEPTED => {
                let headers = response.headers();
                let poll_url = headers
                    .get("azure-asyncoperation")
                    .or_else(|| headers.get("location"))
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("{} accepted without a polling URL", operation))?;
                self.wait_for(&poll_url, operation).await
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                bail!("{} failed: {}", operation, describe_error(status, &body))
            }
        }
    }

    async fn wait_for(&self, poll_url: &str, operation: &str) -> Result<()> {
        // A timeout too large to represent means no deadline
        let deadline = Instant::now().checked_add(self.poll_timeout);

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                bail!(
                    "{} did not complete within {}s",
                    operation,
                    self.poll_timeout.as_secs()
                );
            }
            sleep(self.poll_interval).await;

            let response = self
                .http
                .get(poll_url)
                .bearer_auth(&self.access_token)
                .send()
                .await
                .with_context(|| format!("Failed to poll {}", operation))?;

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if !status.is_success() {
                bail!("{} failed: {}", operation, describe_error(status, &body));
            }

            let value: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            match operation_state(status, &value) {
                OperationState::Running => debug!(operation, "Still in progress"),
                OperationState::Succeeded => return Ok(()),
                OperationState::Failed(message) => bail!("{} failed: {}", operation, message),
            }
        }
    }
}

#[async_trait]
impl FirewallRuleClient for ArmFirewall {
    async fn add_rule(&self, address: &str) -> Result<RuleIdentity> {
        let name = rule_name();
        let id = self.rule_id(&name);
        info!(rule = %name, address, "Adding firewall rule");

        let response = self
            .http
            .put(self.rule_url(&id))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "properties": {
                    "startIpAddress": address,
                    "endIpAddress": address,
                }
            }))
            .send()
            .await
            .context("Failed to send add firewall rule request")?;

        self.complete(response, "Add firewall rule").await?;

        Ok(RuleIdentity { name, id: Some(id) })
    }

    async fn remove_rule(&self, rule: &RuleIdentity) -> Result<()> {
        let id = rule.id.clone().unwrap_or_else(|| self.rule_id(&rule.name));
        info!(rule = %rule, id = %id, "Removing firewall rule");

        let response = self
            .http
            .delete(self.rule_url(&id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send remove firewall rule request")?;

        if response.status() == StatusCode::NOT_FOUND {
            warn!(rule = %rule, "Firewall rule was already gone");
            return Ok(());
        }
        self.complete(response, "Remove firewall rule").await
    }
}
