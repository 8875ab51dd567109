//! Gateway, action and ACL rule types

use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{AppError, AppResult};

/// Gateways of the three-cluster test mesh
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GatewayIdentity {
    Mbg1,
    Mbg2,
    Mbg3,
}

impl GatewayIdentity {
    pub fn parse(id: &str) -> AppResult<Self> {
        id.parse()
            .map_err(|_| AppError::InvalidGateway(id.to_string()))
    }

    /// Name of the mbgctl instance that controls this gateway
    pub fn controller_name(&self) -> String {
        // The variants always end in a digit
        controller_name(self.as_ref()).unwrap_or_default()
    }
}

/// What to do with traffic between the configured services
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    /// Lift a previous block (removes the deny rule)
    Allow,
    /// Block traffic (adds a deny rule)
    Deny,
    /// List the gateway's policies
    Show,
}

impl PolicyAction {
    pub fn parse(action: &str) -> AppResult<Self> {
        action
            .parse()
            .map_err(|_| AppError::InvalidAction(action.to_string()))
    }

    /// Status line logged before the command runs
    pub fn header(&self, gateway: GatewayIdentity) -> String {
        match self {
            PolicyAction::Deny => format!("Block Traffic in {}", gateway),
            PolicyAction::Allow => format!("Allow Traffic in {}", gateway),
            PolicyAction::Show => format!("Show Policies in {}", gateway),
        }
    }
}

/// Rule verdict as encoded on the mbgctl command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AclVerdict {
    Allow,
    Deny,
}

impl AclVerdict {
    pub fn code(&self) -> u8 {
        match self {
            AclVerdict::Allow => 0,
            AclVerdict::Deny => 1,
        }
    }
}

/// Source/destination service names used by the service-pair gateways
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServicePair {
    pub source: String,
    pub destination: String,
}

impl ServicePair {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

impl Default for ServicePair {
    fn default() -> Self {
        Self::new("firefox", "openspeedtest")
    }
}

/// One ACL rule as carried by an add/remove command. Never stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<ServicePair>,
    pub remote_gateway: GatewayIdentity,
    pub priority: u32,
    pub verdict: AclVerdict,
}

/// Derive the controller name from a gateway id: `mbg1` -> `mbgctl1`.
///
/// The trailing digits are split off, `ctl` is inserted, and the digits are
/// appended again.
pub fn controller_name(gateway_id: &str) -> AppResult<String> {
    let stem = gateway_id.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &gateway_id[stem.len()..];
    if stem.is_empty() || digits.is_empty() {
        return Err(AppError::InvalidGateway(gateway_id.to_string()));
    }
    Ok(format!("{}ctl{}", stem, digits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_controller_name() {
        assert_eq!(controller_name("mbg1").unwrap(), "mbgctl1");
        assert_eq!(controller_name("node-1").unwrap(), "node-ctl1");
        assert_eq!(controller_name("mbg12").unwrap(), "mbgctl12");
    }

    #[test]
    fn test_controller_name_rejects_ids_without_digit() {
        assert!(matches!(controller_name("mbg"), Err(AppError::InvalidGateway(_))));
        assert!(matches!(controller_name("42"), Err(AppError::InvalidGateway(_))));
        assert!(matches!(controller_name(""), Err(AppError::InvalidGateway(_))));
    }

    #[test]
    fn test_controller_name_is_stable() {
        for gateway in GatewayIdentity::iter() {
            assert_eq!(gateway.controller_name(), gateway.controller_name());
            assert!(gateway.controller_name().starts_with("mbgctl"));
        }
    }

    #[test]
    fn test_gateway_parse() {
        assert_eq!(GatewayIdentity::parse("mbg2").unwrap(), GatewayIdentity::Mbg2);
        assert_eq!(GatewayIdentity::Mbg3.to_string(), "mbg3");
        assert!(matches!(
            GatewayIdentity::parse("mbg4"),
            Err(AppError::InvalidGateway(_))
        ));
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(PolicyAction::parse("deny").unwrap(), PolicyAction::Deny);
        assert_eq!(PolicyAction::parse("show").unwrap(), PolicyAction::Show);
        assert!(matches!(
            PolicyAction::parse("block"),
            Err(AppError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_headers() {
        assert_eq!(
            PolicyAction::Deny.header(GatewayIdentity::Mbg1),
            "Block Traffic in mbg1"
        );
        assert_eq!(
            PolicyAction::Allow.header(GatewayIdentity::Mbg2),
            "Allow Traffic in mbg2"
        );
    }

    #[test]
    fn test_verdict_codes() {
        assert_eq!(AclVerdict::Allow.code(), 0);
        assert_eq!(AclVerdict::Deny.code(), 1);
    }
}
