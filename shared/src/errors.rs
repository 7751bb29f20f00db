use aws_sdk_cognitoidentityprovider::error::ProvideErrorMetadata;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CfnError {
    #[error("Invalid value for identity provider")]
    InvalidIdentityProvider,

    #[error("Client ID for name '{0}' not found!")]
    ClientNotFound(String),
}

/// Whether an API error means the target no longer exists. Deletes treat
/// these as satisfied rather than failed, so tearing down a stack whose
/// resources were removed out-of-band still succeeds.
///
/// Cognito signals a missing resource as `ResourceNotFoundException`; the
/// IAM-style `NoSuchEntity` code is treated the same way.
pub fn is_missing_entity<E>(err: &E) -> bool
where
    E: ProvideErrorMetadata,
{
    matches!(
        err.code(),
        Some("NoSuchEntity") | Some("ResourceNotFoundException")
    )
}
