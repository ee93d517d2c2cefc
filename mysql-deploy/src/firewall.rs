//! Temporary firewall access for the runner
//!
//! [`FirewallLease`] owns at most one firewall rule for the duration of a run.
//! Cloud authorization is only requested from inside [`FirewallLease::acquire`],
//! so runs that can already reach the server never need cloud credentials.

use crate::azure::AzureCredential;
use crate::error::{DeployError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use tracing::{info, warn};

/// Handle of a firewall rule created by this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleIdentity {
    pub name: String,
    /// Full resource id, when the provider reports one.
    pub id: Option<String>,
}

impl fmt::Display for RuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Name for a new rule, unique per millisecond.
pub fn rule_name() -> String {
    format!("ClientIPAddress_{}", Utc::now().timestamp_millis())
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn get_credential(&self) -> anyhow::Result<AzureCredential>;
}

#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Resolve the firewall of `server` in the credential's subscription.
    async fn get_resource_manager(
        &self,
        credential: &AzureCredential,
        server: &str,
    ) -> anyhow::Result<Box<dyn FirewallRuleClient>>;
}

#[async_trait]
pub trait FirewallRuleClient: Send + Sync {
    async fn add_rule(&self, address: &str) -> anyhow::Result<RuleIdentity>;
    async fn remove_rule(&self, rule: &RuleIdentity) -> anyhow::Result<()>;
}

struct Grant {
    rule: RuleIdentity,
    rules: Box<dyn FirewallRuleClient>,
}

/// A possibly-granted firewall rule.
#[derive(Default)]
pub struct FirewallLease {
    grant: Option<Grant>,
}

impl FirewallLease {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_granted(&self) -> bool {
        self.grant.is_some()
    }

    pub fn rule(&self) -> Option<&RuleIdentity> {
        self.grant.as_ref().map(|g| &g.rule)
    }

    /// Open the server firewall for `caller_address`.
    ///
    /// An empty address is a no-op. On failure the lease stays ungranted.
    pub async fn acquire(
        &mut self,
        caller_address: &str,
        server: &str,
        authorizer: &dyn Authorizer,
        resources: &dyn ResourceManager,
    ) -> Result<()> {
        if caller_address.is_empty() {
            return Ok(());
        }
        if let Some(grant) = &self.grant {
            warn!(rule = %grant.rule, "Firewall lease already granted, not adding another rule");
            return Ok(());
        }

        let acquire_failed = |source: anyhow::Error| DeployError::FirewallAcquire {
            address: caller_address.to_string(),
            source,
        };

        let credential = authorizer.get_credential().await.map_err(acquire_failed)?;
        let rules = resources
            .get_resource_manager(&credential, server)
            .await
            .map_err(acquire_failed)?;
        let rule = rules.add_rule(caller_address).await.map_err(acquire_failed)?;

        info!(rule = %rule, address = %caller_address, "Added firewall rule");
        self.grant = Some(Grant { rule, rules });
        Ok(())
    }

    /// Delete the rule if this lease created one.
    ///
    /// The grant is consumed before the delete is attempted, so a second call
    /// never issues another delete, even when the first one failed.
    pub async fn release(&mut self) -> Result<()> {
        let Some(grant) = self.grant.take() else {
            return Ok(());
        };

        grant
            .rules
            .remove_rule(&grant.rule)
            .await
            .map_err(|source| DeployError::FirewallRelease {
                rule: grant.rule.name.clone(),
                source,
            })?;

        info!(rule = %grant.rule, "Removed firewall rule");
        Ok(())
    }
}
