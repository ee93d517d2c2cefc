//! Run lifecycle
//!
//! One run walks these stages in order, stopping at the first failure:
//!
//! 1. resolve credentials into a [`ConnectionTarget`]
//! 2. resolve the script path
//! 3. probe the server
//! 4. open the firewall, only when the probe named a blocked address
//! 5. execute the script
//! 6. remove the firewall rule, whenever step 4 granted one
//!
//! Steps 1-2 touch neither the network nor the cloud. Step 6 runs even when
//! step 5 failed.

use crate::credentials::{self, ConnectionTarget};
use crate::error::{DeployError, Result};
use crate::executor::ScriptExecutor;
use crate::firewall::{Authorizer, FirewallLease, ResourceManager, RuleIdentity};
use crate::inputs::DeployInputs;
use crate::probe::{ProbeOutcome, ReachabilityProbe};
use crate::script::ScriptReference;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// External collaborators used by a run.
pub struct Collaborators<'a> {
    pub probe: &'a dyn ReachabilityProbe,
    pub authorizer: &'a dyn Authorizer,
    pub resources: &'a dyn ResourceManager,
    pub executor: &'a dyn ScriptExecutor,
}

/// What a successful run did.
#[derive(Debug)]
pub struct RunSummary {
    pub target: ConnectionTarget,
    pub script: ScriptReference,
    /// Rule opened for the run and removed again, if any.
    pub firewall_rule: Option<RuleIdentity>,
}

pub struct Orchestrator<'a> {
    collaborators: Collaborators<'a>,
    workspace: Option<PathBuf>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(collaborators: Collaborators<'a>, workspace: Option<PathBuf>) -> Self {
        Self {
            collaborators,
            workspace,
        }
    }

    pub async fn run(&self, inputs: DeployInputs) -> Result<RunSummary> {
        let target = credentials::resolve(inputs.credentials)?;
        info!(server = %target.server(), "Resolved connection target");

        let sql_file = inputs.sql_file.ok_or(DeployError::MissingInput("sql-file"))?;
        let script =
            ScriptReference::resolve(&sql_file, inputs.arguments, self.workspace.as_deref())?;
        info!(script = %script.path().display(), "Resolved sql file");

        let mut lease = FirewallLease::new();
        match self.collaborators.probe.detect_caller_address(&target).await {
            ProbeOutcome::AlreadyAllowed => {
                info!("Firewall already allows the runner, no rule needed");
            }
            ProbeOutcome::Blocked { caller_address } => {
                // Authorization is only requested on this branch
                lease
                    .acquire(
                        &caller_address,
                        target.server(),
                        self.collaborators.authorizer,
                        self.collaborators.resources,
                    )
                    .await?;
            }
            ProbeOutcome::Inconclusive { reason } => {
                // Could also be a transient network error; execution will tell.
                warn!(reason = %reason, "Probe failed without a caller address, skipping firewall setup");
            }
        }
        let firewall_rule = lease.rule().cloned();

        let executed = self
            .collaborators
            .executor
            .execute(&target, &script)
            .await
            .map_err(DeployError::Execute);
        let released = lease.release().await;

        match (executed, released) {
            (Ok(()), Ok(())) => Ok(RunSummary {
                target,
                script,
                firewall_rule,
            }),
            (Ok(()), Err(release_error)) => Err(release_error),
            (Err(execute_error), Ok(())) => Err(execute_error),
            (Err(execute_error), Err(release_error)) => {
                error!(error = %release_error, "Firewall rule cleanup also failed");
                Err(execute_error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::RawCredentials;
    use crate::testing::{Call, Recorder};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const SERVER: &str = "testmysqlserver.mysql.database.azure.com";
    const CONNECTION_STRING: &str = "testmysqlserver.mysql.database.azure.com; Port=3306; Database=testdb; Uid=testuser@testmysqlserver; Pwd=testpassword; SslMode=Preferred";

    fn workspace() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("testsqlfile.sql"), "SELECT 1;").unwrap();
        dir
    }

    fn user_inputs(sql_file: &str) -> DeployInputs {
        DeployInputs {
            credentials: RawCredentials {
                server_name: Some(SERVER.into()),
                username: Some("testuser@testmysqlserver".into()),
                password: Some("testpassword".into()),
                database: Some("testdb".into()),
                connection_string: None,
            },
            sql_file: Some(sql_file.into()),
            arguments: Some("-t 10".into()),
        }
    }

    fn connection_string_inputs() -> DeployInputs {
        DeployInputs {
            credentials: RawCredentials {
                server_name: Some(SERVER.into()),
                connection_string: Some(CONNECTION_STRING.into()),
                ..Default::default()
            },
            sql_file: Some("./testsqlfile.sql".into()),
            arguments: Some("-t 10".into()),
        }
    }

    async fn run(recorder: &Recorder, dir: Option<&Path>, inputs: DeployInputs) -> Result<RunSummary> {
        let orchestrator = Orchestrator::new(
            Collaborators {
                probe: recorder,
                authorizer: recorder,
                resources: recorder,
                executor: recorder,
            },
            dir.map(Path::to_path_buf),
        );
        orchestrator.run(inputs).await
    }

    fn script_path(dir: &TempDir) -> PathBuf {
        dir.path().join("testsqlfile.sql").canonicalize().unwrap()
    }

    #[tokio::test]
    async fn test_already_allowed_runs_script_without_firewall() {
        let dir = workspace();
        let recorder = Recorder::default();

        let summary = run(&recorder, Some(dir.path()), user_inputs("./testsqlfile.sql"))
            .await
            .unwrap();

        assert!(summary.firewall_rule.is_none());
        assert_eq!(summary.script.arguments(), Some("-t 10"));
        assert_eq!(
            recorder.calls(),
            vec![Call::Probe(SERVER.into()), Call::Execute(script_path(&dir))]
        );
    }

    #[tokio::test]
    async fn test_invalid_script_path_has_no_side_effects() {
        let recorder = Recorder::blocked("1.2.3.4");

        let err = run(&recorder, None, user_inputs("./testsqlfile.random"))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Invalid sql file path provided as input ./testsqlfile.random"
        );
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_address_opens_and_closes_firewall() {
        let dir = workspace();
        let recorder = Recorder::blocked("1.2.3.4");

        let summary = run(&recorder, Some(dir.path()), connection_string_inputs())
            .await
            .unwrap();

        assert_eq!(
            summary.firewall_rule.map(|r| r.name),
            Some("rule-1.2.3.4".to_string())
        );
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Probe(SERVER.into()),
                Call::GetCredential,
                Call::GetResourceManager(SERVER.into()),
                Call::AddRule("1.2.3.4".into()),
                Call::Execute(script_path(&dir)),
                Call::RemoveRule("rule-1.2.3.4".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_conflicting_auth_fails_before_anything_else() {
        let dir = workspace();
        let recorder = Recorder::blocked("1.2.3.4");
        let mut inputs = user_inputs("./testsqlfile.sql");
        inputs.credentials.connection_string = Some(CONNECTION_STRING.into());

        let err = run(&recorder, Some(dir.path()), inputs).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Cannot specify both username and connection string"
        );
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_auth_fails_before_anything_else() {
        let dir = workspace();
        let recorder = Recorder::blocked("1.2.3.4");
        let inputs = DeployInputs {
            credentials: RawCredentials {
                server_name: Some(SERVER.into()),
                ..Default::default()
            },
            sql_file: Some("./testsqlfile.sql".into()),
            arguments: None,
        };

        let err = run(&recorder, Some(dir.path()), inputs).await.unwrap_err();

        assert!(matches!(err, DeployError::MissingAuth));
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_password_is_reported() {
        let recorder = Recorder::default();
        let mut inputs = user_inputs("./testsqlfile.sql");
        inputs.credentials.password = None;
        inputs.sql_file = None;

        let err = run(&recorder, None, inputs).await.unwrap_err();

        assert_eq!(err.to_string(), "Input required and not supplied: password");
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_sql_file_is_reported() {
        let recorder = Recorder::default();
        let mut inputs = user_inputs("unused");
        inputs.sql_file = None;

        let err = run(&recorder, None, inputs).await.unwrap_err();

        assert_eq!(err.to_string(), "Input required and not supplied: sql-file");
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_execution_still_removes_rule() {
        let dir = workspace();
        let recorder = Recorder {
            fail_execute: true,
            ..Recorder::blocked("1.2.3.4")
        };

        let err = run(&recorder, Some(dir.path()), connection_string_inputs())
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Execute(_)));
        let calls = recorder.calls();
        let execute = calls
            .iter()
            .position(|c| matches!(c, Call::Execute(_)))
            .unwrap();
        let remove = calls
            .iter()
            .position(|c| matches!(c, Call::RemoveRule(_)))
            .unwrap();
        assert!(execute < remove);
        assert_eq!(recorder.count(|c| matches!(c, Call::AddRule(_))), 1);
        assert_eq!(recorder.count(|c| matches!(c, Call::RemoveRule(_))), 1);
    }

    #[tokio::test]
    async fn test_failed_acquire_skips_execution_and_cleanup() {
        let dir = workspace();
        let recorder = Recorder {
            fail_add: true,
            ..Recorder::blocked("1.2.3.4")
        };

        let err = run(&recorder, Some(dir.path()), connection_string_inputs())
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::FirewallAcquire { .. }));
        assert_eq!(recorder.count(|c| matches!(c, Call::Execute(_))), 0);
        assert_eq!(recorder.count(|c| matches!(c, Call::RemoveRule(_))), 0);
    }

    #[tokio::test]
    async fn test_missing_server_in_subscription_is_fatal() {
        let dir = workspace();
        let recorder = Recorder {
            fail_resource_manager: true,
            ..Recorder::blocked("1.2.3.4")
        };

        let err = run(&recorder, Some(dir.path()), connection_string_inputs())
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::FirewallAcquire { .. }));
        assert_eq!(recorder.count(|c| matches!(c, Call::AddRule(_))), 0);
        assert_eq!(recorder.count(|c| matches!(c, Call::Execute(_))), 0);
    }

    #[tokio::test]
    async fn test_release_failure_after_success_fails_run() {
        let dir = workspace();
        let recorder = Recorder {
            fail_remove: true,
            ..Recorder::blocked("1.2.3.4")
        };

        let err = run(&recorder, Some(dir.path()), connection_string_inputs())
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::FirewallRelease { .. }));
        assert_eq!(recorder.count(|c| matches!(c, Call::Execute(_))), 1);
    }

    #[tokio::test]
    async fn test_release_failure_does_not_mask_execute_failure() {
        let dir = workspace();
        let recorder = Recorder {
            fail_execute: true,
            fail_remove: true,
            ..Recorder::blocked("1.2.3.4")
        };

        let err = run(&recorder, Some(dir.path()), connection_string_inputs())
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Execute(_)));
        assert_eq!(recorder.count(|c| matches!(c, Call::RemoveRule(_))), 1);
    }

    #[tokio::test]
    async fn test_inconclusive_probe_skips_firewall_and_executes() {
        let dir = workspace();
        let recorder = Recorder {
            inconclusive: true,
            fail_execute: true,
            ..Default::default()
        };

        let err = run(&recorder, Some(dir.path()), user_inputs("./testsqlfile.sql"))
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Execute(_)));
        assert_eq!(
            recorder.calls(),
            vec![Call::Probe(SERVER.into()), Call::Execute(script_path(&dir))]
        );
    }
}
