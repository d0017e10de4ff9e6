//! # Artifact Address
//!
//! Where a finished export can be fetched from:
//! `https://<route-host>/<namespace>-<creation-timestamp>.zip`.

use crate::crd::{Export, Route};
use chrono::{DateTime, SecondsFormat, Utc};
use kube::ResourceExt;

/// Creation timestamp of the export as RFC3339, second precision, UTC with `Z`
#[must_use]
pub fn creation_timestamp(export: &Export) -> Option<String> {
    let raw = serde_json::to_value(export.metadata.creation_timestamp.as_ref()?).ok()?;
    let parsed = DateTime::parse_from_rfc3339(raw.as_str()?).ok()?;
    Some(
        parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

#[must_use]
pub fn artifact_address(host: &str, namespace: &str, timestamp: &str) -> String {
    format!("https://{host}/{namespace}-{timestamp}.zip")
}

/// Address of the export's archive once the route has a host
#[must_use]
pub fn address_for(export: &Export, route: &Route) -> Option<String> {
    let host = route.assigned_host()?;
    let timestamp = creation_timestamp(export)?;
    Some(artifact_address(
        host,
        &export.namespace().unwrap_or_default(),
        &timestamp,
    ))
}
