//! Service account and proxy session secret.

use super::{object_meta, ResourceError};
use crate::constants::{SESSION_SECRET_KEY, SESSION_SECRET_LENGTH};
use crate::controller::reconciler::catalog::{namespaced_name, ManagedKind};
use crate::crd::Export;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::ByteString;
use kube::ResourceExt;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

const OAUTH_REDIRECT_PREFIX: &str = "serviceaccounts.openshift.io/oauth-redirectreference.";

const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest multiple of the alphabet size that fits in a byte; bytes above it are redrawn
const ACCEPT_BELOW: u8 = 248;

#[derive(Debug, Error)]
#[error("random source unavailable: {0}")]
pub struct SessionTokenError(#[from] rand::Error);

/// Service account the job and proxy run as; redirects OAuth logins to the route
pub fn service_account(export: &Export) -> Result<ServiceAccount, ResourceError> {
    let route_name = namespaced_name(&export.name_any());
    let reference = json!({
        "kind": "OAuthRedirectReference",
        "apiVersion": "v1",
        "reference": {
            "kind": "Route",
            "name": route_name,
        }
    });

    let mut metadata = object_meta(export, ManagedKind::ServiceAccount);
    metadata.annotations = Some(BTreeMap::from([(
        format!("{OAUTH_REDIRECT_PREFIX}{route_name}"),
        reference.to_string(),
    )]));

    Ok(ServiceAccount {
        metadata,
        ..Default::default()
    })
}

/// Secret holding a freshly drawn proxy cookie secret
pub fn session_secret(export: &Export) -> Result<Secret, ResourceError> {
    let token = generate_session_token()?;
    Ok(Secret {
        metadata: object_meta(export, ManagedKind::SessionSecret),
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([(
            SESSION_SECRET_KEY.to_string(),
            ByteString(token.into_bytes()),
        )])),
        ..Default::default()
    })
}

pub fn generate_session_token() -> Result<String, SessionTokenError> {
    generate_session_token_with(&mut OsRng, SESSION_SECRET_LENGTH)
}

/// Alphanumeric token of `length` characters, uniformly distributed
pub fn generate_session_token_with<R: RngCore + ?Sized>(
    rng: &mut R,
    length: usize,
) -> Result<String, SessionTokenError> {
    let mut token = String::with_capacity(length);
    let mut buf = [0u8; 64];
    while token.len() < length {
        rng.try_fill_bytes(&mut buf)?;
        for byte in buf.iter().copied().filter(|b| *b < ACCEPT_BELOW) {
            if token.len() == length {
                break;
            }
            token.push(char::from(ALPHABET[usize::from(byte % 62)]));
        }
    }
    Ok(token)
}
