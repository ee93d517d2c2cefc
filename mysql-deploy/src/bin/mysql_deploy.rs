//! Pipeline step entrypoint
//!
//! Reads step inputs, runs the deploy and reports a failure to the runner.
//! Exit code 1 marks the step failed.

use anyhow::Result;
use common::{add_mask, init_logging, set_failed};
use mysql_deploy::azure::{ArmResourceManager, EnvAuthorizer};
use mysql_deploy::executor::MysqlExecutor;
use mysql_deploy::probe::MysqlProbe;
use mysql_deploy::{Collaborators, DeployError, DeployInputs, Orchestrator, Settings};
use std::time::Instant;
use tracing::info;

async fn deploy(settings: Settings, inputs: DeployInputs) -> Result<()> {
    let start = Instant::now();

    let probe = MysqlProbe::new(settings.mysql_client.clone());
    let executor = MysqlExecutor::new(settings.mysql_client.clone());
    let resources = ArmResourceManager::new(&settings)?;
    let workspace = settings.workspace.clone();
    let authorizer = EnvAuthorizer::new(settings);

    let orchestrator = Orchestrator::new(
        Collaborators {
            probe: &probe,
            authorizer: &authorizer,
            resources: &resources,
            executor: &executor,
        },
        workspace,
    );

    let summary = orchestrator.run(inputs).await?;

    info!(
        server = %summary.target.server(),
        script = %summary.script.path().display(),
        firewall_rule = summary.firewall_rule.as_ref().map(|r| r.name.as_str()).unwrap_or("none"),
        duration_ms = start.elapsed().as_millis() as u64,
        "Deploy completed"
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _guard = init_logging("mysql-deploy");

    let settings = Settings::from_env();
    let inputs = DeployInputs::from_env();
    for secret in inputs.secrets() {
        add_mask(&secret);
    }

    if let Err(e) = deploy(settings, inputs).await {
        let message = match e.downcast_ref::<DeployError>() {
            Some(deploy_error) => deploy_error.to_string(),
            None => format!("{:#}", e),
        };
        set_failed(&message);
        std::process::exit(1);
    }
}
