//! Policy dispatcher
//!
//! Resolves the control endpoint of a gateway and issues exactly one mbgctl
//! policy command against it.

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::routing::{build_command, PolicyCommand, RoutingTable};
use super::types::{controller_name, GatewayIdentity, PolicyAction, ServicePair};
use crate::config::{Config, ExecMode};
use crate::error::{AppError, AppResult};
use crate::k8s::KubectlClient;
use crate::retry::RetryConfig;
use crate::runner::{CommandOutput, CommandSpec};

/// Outcome of one successful dispatch
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub gateway: GatewayIdentity,
    pub cluster: String,
    pub pod: String,
    pub command: PolicyCommand,
    pub invocation: CommandSpec,
    pub output: CommandOutput,
}

impl DispatchReport {
    /// Pretty-printed JSON, as printed by `--json`
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct PolicyDispatcher {
    kubectl: KubectlClient,
    routes: RoutingTable,
    mbgctl_bin: String,
    pod_prefix: String,
    exec_mode: ExecMode,
    wait: Option<RetryConfig>,
}

impl PolicyDispatcher {
    pub fn new(kubectl: KubectlClient, config: &Config) -> Self {
        Self {
            kubectl,
            routes: RoutingTable::default(),
            mbgctl_bin: config.mbgctl_bin.clone(),
            pod_prefix: config.mbgctl_pod_prefix.clone(),
            exec_mode: config.exec_mode,
            wait: None,
        }
    }

    pub fn with_routes(mut self, routes: RoutingTable) -> Self {
        self.routes = routes;
        self
    }

    /// Wait for the mbgctl pod to be Running before dispatching
    pub fn with_wait(mut self, retry: RetryConfig) -> Self {
        self.wait = Some(retry);
        self
    }

    /// Apply a policy given raw CLI strings.
    ///
    /// Unknown gateways and actions are rejected before any command runs.
    pub async fn apply_raw(
        &self,
        gateway: &str,
        action: &str,
        services: &ServicePair,
    ) -> AppResult<DispatchReport> {
        let gateway = GatewayIdentity::parse(gateway)?;
        let action = match PolicyAction::parse(action) {
            Ok(action) => action,
            Err(e) => {
                warn!("Unknown command: {}", action);
                return Err(e);
            }
        };
        let controller = controller_name(gateway.as_ref())?;
        self.apply_policy(gateway, &controller, action, services).await
    }

    /// Issue the ACL command for `action` on `gateway`'s control endpoint
    #[instrument(skip_all, fields(gateway = %gateway, action = %action))]
    pub async fn apply_policy(
        &self,
        gateway: GatewayIdentity,
        controller_name: &str,
        action: PolicyAction,
        services: &ServicePair,
    ) -> AppResult<DispatchReport> {
        let route = self.routes.route(gateway)?;
        let command = build_command(gateway, route, controller_name, action, services)?;

        let kubectl = self.kubectl.for_cluster(&route.cluster).await?;

        if let Some(retry) = &self.wait {
            kubectl.wait_pod_running(&self.pod_prefix, retry).await?;
        }
        let pod = kubectl.pod_name(&self.pod_prefix).await?;

        info!("{}", action.header(gateway));

        let invocation = self.invocation(&kubectl, &pod, &command);
        let output = kubectl
            .runner()
            .run(&invocation)
            .await?
            .into_result(&invocation)?;

        if !output.stdout.trim().is_empty() {
            info!("{}", output.stdout.trim_end());
        }

        Ok(DispatchReport {
            gateway,
            cluster: route.cluster.clone(),
            pod,
            command,
            invocation,
            output,
        })
    }

    fn invocation(
        &self,
        kubectl: &KubectlClient,
        pod: &str,
        command: &PolicyCommand,
    ) -> CommandSpec {
        match self.exec_mode {
            ExecMode::Pod => kubectl
                .command()
                .args(["exec", "-i", pod, "--", self.mbgctl_bin.as_str()])
                .args(command.args.iter().cloned()),
            ExecMode::Local => CommandSpec::new(&self.mbgctl_bin)
                .args(command.args.iter().cloned())
                .current_dir(kubectl.working_dir()),
        }
    }
}

impl std::fmt::Debug for PolicyDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyDispatcher")
            .field("routes", &self.routes)
            .field("mbgctl_bin", &self.mbgctl_bin)
            .field("pod_prefix", &self.pod_prefix)
            .field("exec_mode", &self.exec_mode)
            .finish()
    }
}

/// Whether `err` was raised before any external command could run
pub fn is_rejected_input(err: &AppError) -> bool {
    matches!(
        err,
        AppError::InvalidGateway(_)
            | AppError::InvalidAction(_)
            | AppError::UnsupportedOperation { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::MockCommandRunner;
    use std::sync::Arc;

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            status: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn dispatcher(runner: MockCommandRunner, config: &Config) -> PolicyDispatcher {
        let kubectl = KubectlClient::new(Arc::new(runner), config);
        PolicyDispatcher::new(kubectl, config)
    }

    /// Mock answering context lookups and pod listings, plus one mbgctl call
    fn cluster_mock(
        mbgctl: impl Fn(&CommandSpec) -> AppResult<CommandOutput> + Send + 'static,
    ) -> MockCommandRunner {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec| spec.args.iter().any(|a| a == "get-contexts"))
            .returning(|_| Ok(ok("kind-mbg1\nkind-mbg2\nkind-mbg3\n")));
        runner
            .expect_run()
            .withf(|spec| spec.args.iter().any(|a| a == "pods"))
            .returning(|_| Ok(ok("pod/mbg-abc\npod/mbgctl-xyz\n")));
        runner
            .expect_run()
            .withf(|spec| spec.args.iter().any(|a| a == "policy"))
            .times(1)
            .returning(move |spec| mbgctl(spec));
        runner
    }

    #[tokio::test]
    async fn test_pod_mode_runs_inside_mbgctl_pod() {
        let config = Config {
            exec_mode: ExecMode::Pod,
            ..Config::default()
        };
        let runner = cluster_mock(|spec| {
            assert_eq!(spec.program, "kubectl");
            assert_eq!(
                &spec.args[..7],
                ["--context", "kind-mbg1", "exec", "-i", "mbgctl-xyz", "--", "mbgctl"]
            );
            Ok(ok("Policy added"))
        });
        let report = dispatcher(runner, &config)
            .apply_policy(
                GatewayIdentity::Mbg1,
                "mbgctl1",
                PolicyAction::Deny,
                &ServicePair::default(),
            )
            .await
            .unwrap();

        assert_eq!(report.pod, "mbgctl-xyz");
        assert_eq!(report.cluster, "mbg1");
        assert!(report.command.is_mutation());
    }

    #[tokio::test]
    async fn test_default_mode_runs_mbgctl_on_host() {
        let config = Config::default();
        let runner = cluster_mock(|spec| {
            assert_eq!(spec.program, "mbgctl");
            assert_eq!(spec.args[0], "remove");
            Ok(ok(""))
        });

        dispatcher(runner, &config)
            .apply_policy(
                GatewayIdentity::Mbg2,
                "mbgctl2",
                PolicyAction::Allow,
                &ServicePair::default(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_mbgctl_is_reported() {
        let runner = cluster_mock(|_| {
            Ok(CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: "rpc error: connection refused".to_string(),
            })
        });

        let err = dispatcher(runner, &Config::default())
            .apply_policy(
                GatewayIdentity::Mbg3,
                "mbgctl3",
                PolicyAction::Deny,
                &ServicePair::default(),
            )
            .await
            .unwrap_err();

        match err {
            AppError::CommandDispatchFailed { message, .. } => {
                assert!(message.contains("connection refused"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_action_runs_nothing() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();

        let err = dispatcher(runner, &Config::default())
            .apply_raw("mbg1", "block", &ServicePair::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidAction(_)));
        assert!(is_rejected_input(&err));
    }

    #[tokio::test]
    async fn test_show_on_mbg2_runs_nothing() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();

        let err = dispatcher(runner, &Config::default())
            .apply_raw("mbg2", "show", &ServicePair::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UnsupportedOperation { .. }));
    }
}
