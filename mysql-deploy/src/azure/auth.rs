//! Azure authorization
//!
//! Two sources of a management token: a service principal from the
//! `AZURE_CREDENTIALS` secret, or the Azure CLI session left behind by an
//! earlier login step.

use super::{http_client, token_resource, AzureCredential};
use crate::config::Settings;
use crate::firewall::Authorizer;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

/// Service principal in the `--sdk-auth` JSON shape.
#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub active_directory_endpoint_url: Option<String>,
}

impl fmt::Debug for ServicePrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePrincipal")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

impl ServicePrincipal {
    pub fn from_json(json: &str) -> Result<Self> {
        let principal: Self =
            serde_json::from_str(json).context("Failed to parse AZURE_CREDENTIALS")?;
        if principal.client_id.is_empty()
            || principal.client_secret.is_empty()
            || principal.tenant_id.is_empty()
        {
            bail!("AZURE_CREDENTIALS must contain clientId, clientSecret and tenantId");
        }
        Ok(principal)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client-credentials flow against the AAD token endpoint.
pub struct ServicePrincipalAuthorizer {
    http: reqwest::Client,
    principal: ServicePrincipal,
    authority: String,
    resource: String,
    subscription_id: Option<String>,
}

impl ServicePrincipalAuthorizer {
    pub fn new(principal: ServicePrincipal, settings: &Settings) -> Result<Self> {
        let authority = principal
            .active_directory_endpoint_url
            .clone()
            .unwrap_or_else(|| settings.authority_host.clone())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http: http_client(settings.http_timeout)?,
            subscription_id: settings
                .subscription_id
                .clone()
                .or_else(|| principal.subscription_id.clone()),
            principal,
            authority,
            resource: token_resource(&settings.resource_manager_endpoint),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/token", self.authority, self.principal.tenant_id)
    }
}

#[async_trait]
impl Authorizer for ServicePrincipalAuthorizer {
    async fn get_credential(&self) -> Result<AzureCredential> {
        let subscription_id = self
            .subscription_id
            .clone()
            .ok_or_else(|| anyhow!("No subscription id in AZURE_CREDENTIALS or AZURE_SUBSCRIPTION_ID"))?;

        debug!(client_id = %self.principal.client_id, "Requesting token for service principal");
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.principal.client_id.as_str()),
                ("client_secret", self.principal.client_secret.as_str()),
                ("resource", self.resource.as_str()),
            ])
            .send()
            .await
            .context("Token request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Token request returned {}: {}", status, body.trim());
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        info!(subscription = %subscription_id, "Authorized with service principal");
        Ok(AzureCredential {
            access_token: token.access_token,
            subscription_id,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default)]
    subscription: Option<String>,
}

/// Token from the Azure CLI login session.
pub struct CliAuthorizer {
    az: String,
    resource: String,
    subscription_id: Option<String>,
}

impl CliAuthorizer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            az: settings.az_cli.clone(),
            resource: token_resource(&settings.resource_manager_endpoint),
            subscription_id: settings.subscription_id.clone(),
        }
    }
}

#[async_trait]
impl Authorizer for CliAuthorizer {
    async fn get_credential(&self) -> Result<AzureCredential> {
        let mut args = vec![
            "account",
            "get-access-token",
            "--resource",
            self.resource.as_str(),
            "-o",
            "json",
        ];
        if let Some(subscription) = &self.subscription_id {
            args.push("--subscription");
            args.push(subscription);
        }

        let stdout = common::run_checked(&self.az, &args)
            .await
            .context("Azure CLI is not logged in. Run a login step before this one")?;
        let token: CliToken =
            serde_json::from_str(&stdout).context("Failed to parse az account get-access-token output")?;

        let subscription_id = match self.subscription_id.clone().or(token.subscription) {
            Some(s) => s,
            None => common::run_checked(&self.az, &["account", "show", "--query", "id", "-o", "tsv"])
                .await
                .context("Failed to read current subscription from Azure CLI")?,
        };

        info!(subscription = %subscription_id, "Authorized with Azure CLI session");
        Ok(AzureCredential {
            access_token: token.access_token,
            subscription_id,
        })
    }
}

/// Picks the authorization source when a credential is first needed.
pub struct EnvAuthorizer {
    settings: Settings,
}

impl EnvAuthorizer {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Authorizer for EnvAuthorizer {
    async fn get_credential(&self) -> Result<AzureCredential> {
        match &self.settings.azure_credentials {
            Some(json) => {
                let principal = ServicePrincipal::from_json(json)?;
                ServicePrincipalAuthorizer::new(principal, &self.settings)?
                    .get_credential()
                    .await
            }
            None => CliAuthorizer::new(&self.settings).get_credential().await,
        }
    }
}
