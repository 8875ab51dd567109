//! ACL policy dispatch for the gateway mesh
//!
//! Maps a gateway to its control endpoint through an explicit routing table
//! and turns an allow/deny/show request into one mbgctl invocation.

mod dispatcher;
mod routing;
mod types;

pub use dispatcher::{is_rejected_input, DispatchReport, PolicyDispatcher};
pub use routing::{
    build_command, AddressingScheme, PolicyCommand, PolicyVerb, Route, RoutingTable,
};
pub use types::{
    controller_name, AclVerdict, GatewayIdentity, PolicyAction, PolicyRule, ServicePair,
};
