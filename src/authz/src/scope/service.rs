//! Services that publish scopes

use std::fmt;
use std::str::FromStr;

use super::types::ScopeError;

/// A registered service, the first part of a structured scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
    Amp,
    CodyGateway,
    Dotcom,
    Sams,
    TelemetryGateway,
    EnterprisePortal,
    MailGatekeeper,
    Workspaces,
    Ssc,
    Analytics,
    CloudApi,
    ReleaseOperations,
}

impl Service {
    pub const ALL: [Service; 12] = [
        Service::Amp,
        Service::CodyGateway,
        Service::Dotcom,
        Service::Sams,
        Service::TelemetryGateway,
        Service::EnterprisePortal,
        Service::MailGatekeeper,
        Service::Workspaces,
        Service::Ssc,
        Service::Analytics,
        Service::CloudApi,
        Service::ReleaseOperations,
    ];

    /// Identifier used in scope strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Amp => "amp",
            Service::CodyGateway => "cody_gateway",
            Service::Dotcom => "dotcom",
            Service::Sams => "sams",
            Service::TelemetryGateway => "telemetry_gateway",
            Service::EnterprisePortal => "enterprise_portal",
            Service::MailGatekeeper => "mail_gatekeeper",
            Service::Workspaces => "workspaces",
            Service::Ssc => "ssc",
            Service::Analytics => "analytics",
            Service::CloudApi => "cloud_api",
            Service::ReleaseOperations => "releaseoperations",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Service::Amp => "Amp",
            Service::CodyGateway => "Cody Gateway",
            Service::Dotcom => "Sourcegraph Dotcom",
            Service::Sams => "Sourcegraph Accounts Management System",
            Service::TelemetryGateway => "Telemetry Gateway",
            Service::EnterprisePortal => "Enterprise Portal",
            Service::MailGatekeeper => "Mail Gatekeeper",
            Service::Workspaces => "Workspaces",
            Service::Ssc => "Self Serve Cody",
            Service::Analytics => "Sourcegraph Analytics",
            Service::CloudApi => "Cloud API",
            Service::ReleaseOperations => "Release Operations",
        }
    }
}

impl FromStr for Service {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| ScopeError::InvalidService(s.to_string()))
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
