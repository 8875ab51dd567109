//! kubectl wrapper for the kind clusters hosting the gateways

use std::path::{Path, PathBuf};
use std::sync::Arc;

use k8s_openapi::api::core::v1::{Node, Pod};
use kube::config::Kubeconfig;
use serde::de::DeserializeOwned;
use tracing::{info, instrument, warn};

use super::types::{ObjectList, PodPhase};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

/// Client for cluster selection and pod discovery through the kubectl CLI
#[derive(Clone)]
pub struct KubectlClient {
    runner: Arc<dyn CommandRunner>,
    kubectl_bin: String,
    working_dir: PathBuf,
    kubeconfig: Option<PathBuf>,
    context_prefix: String,
    context: Option<String>,
}

impl std::fmt::Debug for KubectlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubectlClient")
            .field("kubectl_bin", &self.kubectl_bin)
            .field("working_dir", &self.working_dir)
            .field("kubeconfig", &self.kubeconfig)
            .field("context_prefix", &self.context_prefix)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl KubectlClient {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &Config) -> Self {
        Self {
            runner,
            kubectl_bin: config.kubectl_bin.clone(),
            working_dir: config.project_dir.clone(),
            kubeconfig: config.kubeconfig.clone(),
            context_prefix: config.context_prefix.clone(),
            context: None,
        }
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Base kubectl invocation, pinned to the project dir, kubeconfig and
    /// selected context
    pub fn command(&self) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.kubectl_bin).current_dir(&self.working_dir);
        if let Some(path) = &self.kubeconfig {
            spec = spec.arg("--kubeconfig").arg(path.to_string_lossy());
        }
        if let Some(context) = &self.context {
            spec = spec.arg("--context").arg(context);
        }
        spec
    }

    /// kubectl context name for a kind cluster
    pub fn context_name(&self, cluster: &str) -> String {
        format!("{}{}", self.context_prefix, cluster)
    }

    async fn run(&self, spec: CommandSpec) -> AppResult<CommandOutput> {
        self.runner.run(&spec).await?.into_result(&spec)
    }

    async fn get_json<T: DeserializeOwned>(&self, args: &[&str]) -> AppResult<T> {
        let output = self
            .run(self.command().args(args.iter().copied()).args(["-o", "json"]))
            .await?;
        Ok(serde_json::from_str(&output.stdout)?)
    }

    /// Context names from an explicitly configured kubeconfig file.
    ///
    /// Returns `None` when no kubeconfig path is configured; kubectl then
    /// resolves its own default and is the only judge of what exists.
    pub fn known_contexts(&self) -> AppResult<Option<Vec<String>>> {
        let Some(path) = &self.kubeconfig else {
            return Ok(None);
        };
        let kubeconfig = Kubeconfig::read_from(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Some(
            kubeconfig.contexts.into_iter().map(|c| c.name).collect(),
        ))
    }

    /// Context names kubectl knows about, from the configured kubeconfig or
    /// from `kubectl config get-contexts` when none is configured
    async fn available_contexts(&self) -> AppResult<Vec<String>> {
        if let Some(contexts) = self.known_contexts()? {
            return Ok(contexts);
        }
        let output = self
            .run(self.command().args(["config", "get-contexts", "-o", "name"]))
            .await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Client whose kubectl calls all target the given kind cluster.
    ///
    /// The context is passed as `--context` on every invocation; the
    /// kubeconfig's current-context is left untouched.
    #[instrument(skip(self))]
    pub async fn for_cluster(&self, cluster: &str) -> AppResult<KubectlClient> {
        let context = self.context_name(cluster);

        if !self.available_contexts().await?.contains(&context) {
            return Err(AppError::endpoint_not_found(format!(
                "cluster context {}",
                context
            )));
        }

        info!(context = %context, "Selected cluster context");
        Ok(Self {
            context: Some(context),
            ..self.clone()
        })
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Name of the first pod whose name contains `prefix`
    #[instrument(skip(self))]
    pub async fn pod_name(&self, prefix: &str) -> AppResult<String> {
        let output = self.run(self.command().args(["get", "pods", "-o", "name"])).await?;

        output
            .stdout
            .lines()
            .map(|line| line.trim())
            .map(|line| line.strip_prefix("pod/").unwrap_or(line))
            .find(|name| !name.is_empty() && name.contains(prefix))
            .map(str::to_string)
            .ok_or_else(|| AppError::endpoint_not_found(format!("pod matching '{}'", prefix)))
    }

    /// Pods labelled `app=<app>`
    pub async fn pods_by_app(&self, app: &str) -> AppResult<Vec<Pod>> {
        let selector = format!("app={}", app);
        let list: ObjectList<Pod> = self.get_json(&["get", "pods", "-l", &selector]).await?;
        Ok(list.items)
    }

    /// Phase of the first pod labelled `app=<app>`
    pub async fn pod_phase(&self, app: &str) -> AppResult<PodPhase> {
        let pods = self.pods_by_app(app).await?;
        let pod = pods
            .first()
            .ok_or_else(|| AppError::endpoint_not_found(format!("pod with app={}", app)))?;

        Ok(pod
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .map(PodPhase::from)
            .unwrap_or(PodPhase::Unknown))
    }

    /// IP of the first pod whose name contains `prefix`
    #[instrument(skip(self))]
    pub async fn pod_ip(&self, prefix: &str) -> AppResult<String> {
        let name = self.pod_name(prefix).await?;
        let pod: Pod = self.get_json(&["get", "pod", &name]).await?;

        pod.status
            .and_then(|s| s.pod_ip)
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| AppError::endpoint_not_found(format!("IP of pod {}", name)))
    }

    /// First address of the first node of the current cluster
    #[instrument(skip(self))]
    pub async fn node_address(&self) -> AppResult<String> {
        let nodes: ObjectList<Node> = self.get_json(&["get", "nodes"]).await?;

        let address = nodes
            .items
            .into_iter()
            .next()
            .and_then(|node| node.status)
            .and_then(|status| status.addresses)
            .and_then(|addresses| addresses.into_iter().next())
            .map(|a| a.address)
            .ok_or_else(|| AppError::endpoint_not_found("node address"))?;

        info!(address = %address, "Cluster node address");
        Ok(address)
    }

    /// Wait until the pod labelled `app=<app>` is Running, within `retry`'s budget
    #[instrument(skip(self, retry))]
    pub async fn wait_pod_running(&self, app: &str, retry: &RetryConfig) -> AppResult<()> {
        let operation = format!("pod {} to be Running", app);
        retry_with_backoff(retry, &operation, move || async move {
            match self.pod_phase(app).await? {
                PodPhase::Running => Ok(()),
                phase => {
                    warn!("Waiting for pod {} to start, current status: {}", app, phase);
                    Err(AppError::endpoint_not_found(format!(
                        "pod {} is {}",
                        app, phase
                    )))
                }
            }
        })
        .await?;

        info!("Pod {} is Running", app);
        Ok(())
    }
}
