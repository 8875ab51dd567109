//! Gateway routing table and mbgctl command construction

use std::collections::BTreeMap;

use serde::Serialize;

use super::types::{AclVerdict, GatewayIdentity, PolicyAction, PolicyRule, ServicePair};
use crate::error::{AppError, AppResult};

/// How ACL rules on a gateway are addressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "scheme")]
pub enum AddressingScheme {
    /// Rules name a source/destination service pair towards a remote peer
    ServicePair { remote_peer: GatewayIdentity },
    /// Rules name only the remote peer; no policy listing is available
    PeerOnly { remote_peer: GatewayIdentity },
}

impl AddressingScheme {
    pub fn remote_peer(&self) -> GatewayIdentity {
        match self {
            AddressingScheme::ServicePair { remote_peer }
            | AddressingScheme::PeerOnly { remote_peer } => *remote_peer,
        }
    }
}

/// Control endpoint of one gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    /// kind cluster hosting the gateway
    pub cluster: String,
    pub scheme: AddressingScheme,
}

#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: BTreeMap<GatewayIdentity, Route>,
}

impl RoutingTable {
    pub fn empty() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }

    pub fn with_route(mut self, gateway: GatewayIdentity, route: Route) -> Self {
        self.routes.insert(gateway, route);
        self
    }

    pub fn route(&self, gateway: GatewayIdentity) -> AppResult<&Route> {
        self.routes
            .get(&gateway)
            .ok_or_else(|| AppError::endpoint_not_found(format!("route for gateway {}", gateway)))
    }

    pub fn gateways(&self) -> impl Iterator<Item = GatewayIdentity> + '_ {
        self.routes.keys().copied()
    }
}

impl Default for RoutingTable {
    /// mbg1 and mbg3 block service traffic towards mbg2; mbg2 blocks its peer mbg3
    fn default() -> Self {
        use GatewayIdentity::*;

        Self::empty()
            .with_route(
                Mbg1,
                Route {
                    cluster: Mbg1.to_string(),
                    scheme: AddressingScheme::ServicePair { remote_peer: Mbg2 },
                },
            )
            .with_route(
                Mbg2,
                Route {
                    cluster: Mbg2.to_string(),
                    scheme: AddressingScheme::PeerOnly { remote_peer: Mbg3 },
                },
            )
            .with_route(
                Mbg3,
                Route {
                    cluster: Mbg3.to_string(),
                    scheme: AddressingScheme::ServicePair { remote_peer: Mbg2 },
                },
            )
    }
}

/// mbgctl subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyVerb {
    Add,
    Remove,
    Get,
}

impl PolicyVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyVerb::Add => "add",
            PolicyVerb::Remove => "remove",
            PolicyVerb::Get => "get",
        }
    }
}

/// A fully resolved mbgctl policy invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyCommand {
    pub verb: PolicyVerb,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<PolicyRule>,
    /// Arguments after the mbgctl binary name
    pub args: Vec<String>,
}

impl PolicyCommand {
    pub fn is_mutation(&self) -> bool {
        self.verb != PolicyVerb::Get
    }
}

/// Build the mbgctl arguments for `action` on `gateway`.
///
/// Deny adds a priority-0 deny rule, allow removes the rule keyed by the same
/// match criteria, and show lists policies (service-pair gateways only).
pub fn build_command(
    gateway: GatewayIdentity,
    route: &Route,
    controller_name: &str,
    action: PolicyAction,
    services: &ServicePair,
) -> AppResult<PolicyCommand> {
    let verb = match action {
        PolicyAction::Deny => PolicyVerb::Add,
        PolicyAction::Allow => PolicyVerb::Remove,
        PolicyAction::Show => match route.scheme {
            AddressingScheme::ServicePair { .. } => PolicyVerb::Get,
            AddressingScheme::PeerOnly { .. } => {
                return Err(AppError::unsupported(gateway, action));
            }
        },
    };

    let mut args: Vec<String> = vec![
        verb.as_str().into(),
        "policy".into(),
        "--myid".into(),
        controller_name.into(),
    ];

    if verb == PolicyVerb::Get {
        return Ok(PolicyCommand {
            verb,
            rule: None,
            args,
        });
    }

    let remote_peer = route.scheme.remote_peer();
    let rule_services = match route.scheme {
        AddressingScheme::ServicePair { .. } => Some(services.clone()),
        AddressingScheme::PeerOnly { .. } => None,
    };

    args.extend(["--type".to_string(), "acl".to_string()]);
    if let Some(pair) = &rule_services {
        args.extend([
            "--serviceSrc".to_string(),
            pair.source.clone(),
            "--serviceDst".to_string(),
            pair.destination.clone(),
        ]);
    }
    args.extend(["--mbgDest".to_string(), remote_peer.to_string()]);

    let verdict = if verb == PolicyVerb::Add {
        AclVerdict::Deny
    } else {
        AclVerdict::Allow
    };
    // Removal is keyed by match criteria only
    if verb == PolicyVerb::Add {
        args.extend([
            "--priority".to_string(),
            "0".to_string(),
            "--action".to_string(),
            verdict.code().to_string(),
        ]);
    }

    Ok(PolicyCommand {
        verb,
        rule: Some(PolicyRule {
            services: rule_services,
            remote_gateway: remote_peer,
            priority: 0,
            verdict,
        }),
        args,
    })
}
