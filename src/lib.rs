//! mbg-policy library
//!
//! Applies ACL policies to the gateways of a multi-cluster test mesh running
//! on kind, by selecting the gateway's cluster and driving its mbgctl client.

pub mod config;
pub mod error;
pub mod k8s;
pub mod policy;
pub mod retry;
pub mod runner;

pub use error::{AppError, AppResult};

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crate::config::{Config, ExecMode};
use crate::k8s::KubectlClient;
use crate::policy::{DispatchReport, PolicyDispatcher, ServicePair};
use crate::runner::{CommandRunner, ProcessRunner};

/// Block, allow or list traffic policies on a gateway of the test mesh
#[derive(Parser, Debug)]
#[command(name = "mbg-policy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Gateway to apply the policy on: mbg1, mbg2 or mbg3
    #[arg(short, long)]
    pub mbg: String,

    /// Policy action: allow, deny or show
    #[arg(short = 't', long = "type", default_value = "allow")]
    pub action: String,

    /// Source service of the ACL rule
    #[arg(long, default_value = "firefox")]
    pub src_svc: String,

    /// Destination service of the ACL rule
    #[arg(long, default_value = "openspeedtest")]
    pub dst_svc: String,

    /// Wait for the mbgctl pod to be Running before dispatching
    #[arg(long)]
    pub wait: bool,

    /// Run mbgctl inside its pod through `kubectl exec` instead of on this host
    #[arg(long)]
    pub in_pod: bool,

    /// Print the dispatch report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Dispatch the requested policy with real kubectl/mbgctl processes
    pub async fn run(self, config: Config) -> AppResult<DispatchReport> {
        self.run_with(config, Arc::new(ProcessRunner)).await
    }

    pub async fn run_with(
        self,
        mut config: Config,
        runner: Arc<dyn CommandRunner>,
    ) -> AppResult<DispatchReport> {
        if self.in_pod {
            config.exec_mode = ExecMode::Pod;
        }
        info!("Working directory {}", config.project_dir.display());

        let kubectl = KubectlClient::new(runner, &config);
        let mut dispatcher = PolicyDispatcher::new(kubectl, &config);
        if self.wait {
            dispatcher = dispatcher.with_wait(config.wait_retry());
        }

        let services = ServicePair::new(self.src_svc, self.dst_svc);
        let report = dispatcher
            .apply_raw(&self.mbg, &self.action, &services)
            .await?;

        if self.json {
            println!("{}", report.to_json()?);
        }
        Ok(report)
    }
}
