use std::collections::HashMap;

use anyhow::Context;
use aws_config::BehaviorVersion;
use aws_sdk_cognitoidentityprovider::error::DisplayErrorContext;
use aws_sdk_cognitoidentityprovider::types::{IdentityProviderType, IdentityProviderTypeType};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::error;

use cfn_shared::{
    finalize_data, is_missing_entity, run_bounded, send_response, CfnEvent, CfnStatus, OpOutcome,
};

#[derive(Debug, Clone, Deserialize)]
struct ProviderProperties {
    #[serde(rename = "UserPoolId")]
    user_pool_id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "IdpIdentifier")]
    idp_identifier: String,
    /// SAML metadata document URL.
    #[serde(rename = "Metadata")]
    metadata: String,
}

/// Fixed claim mapping for SAML federation against an AD FS / WS-Fed style
/// identity provider.
fn saml_attribute_mapping() -> HashMap<String, String> {
    HashMap::from([
        (
            "Username".to_string(),
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/upn".to_string(),
        ),
        (
            "name".to_string(),
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name".to_string(),
        ),
        (
            "email".to_string(),
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress".to_string(),
        ),
        (
            "family_name".to_string(),
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/surname".to_string(),
        ),
        (
            "given_name".to_string(),
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/givenname".to_string(),
        ),
        (
            "nickname".to_string(),
            "http://schemas.xmlsoap.org/claims/CommonName".to_string(),
        ),
    ])
}

fn provider_data(provider: Option<&IdentityProviderType>) -> Map<String, Value> {
    let mut data = Map::new();
    let Some(provider) = provider else {
        return data;
    };
    if let Some(pool) = provider.user_pool_id() {
        data.insert("UserPoolId".to_string(), json!(pool));
    }
    if let Some(name) = provider.provider_name() {
        data.insert("ProviderName".to_string(), json!(name));
    }
    if let Some(provider_type) = provider.provider_type() {
        data.insert("ProviderType".to_string(), json!(provider_type.as_str()));
    }
    if let Some(details) = provider.provider_details() {
        data.insert("ProviderDetails".to_string(), json!(details));
    }
    if let Some(mapping) = provider.attribute_mapping() {
        data.insert("AttributeMapping".to_string(), json!(mapping));
    }
    data.insert(
        "IdpIdentifiers".to_string(),
        json!(provider.idp_identifiers()),
    );
    data
}

async fn create_provider(cognito: &CognitoClient, props: &ProviderProperties) -> OpOutcome {
    let result = cognito
        .create_identity_provider()
        .user_pool_id(&props.user_pool_id)
        .provider_name(&props.name)
        .provider_type(IdentityProviderTypeType::Saml)
        .provider_details("MetadataURL", &props.metadata)
        .set_attribute_mapping(Some(saml_attribute_mapping()))
        .idp_identifiers(&props.idp_identifier)
        .send()
        .await;

    match result {
        Ok(resp) => {
            let provider = resp.identity_provider();
            let identifier = provider
                .and_then(|p| p.idp_identifiers().first())
                .map(String::as_str)
                .unwrap_or(&props.idp_identifier);
            OpOutcome::ok_with(
                format!("Created SAML Idp: {}", identifier),
                provider_data(provider),
            )
        }
        Err(e) => OpOutcome::failed(format!("Cannot create SAML Idp: {}", DisplayErrorContext(&e))),
    }
}

async fn update_provider(cognito: &CognitoClient, props: &ProviderProperties) -> OpOutcome {
    let result = cognito
        .update_identity_provider()
        .user_pool_id(&props.user_pool_id)
        .provider_name(&props.name)
        .provider_details("MetadataURL", &props.metadata)
        .set_attribute_mapping(Some(saml_attribute_mapping()))
        .idp_identifiers(&props.idp_identifier)
        .send()
        .await;

    match result {
        Ok(resp) => {
            let provider = resp.identity_provider();
            let identifiers = provider
                .map(|p| p.idp_identifiers().join(","))
                .unwrap_or_else(|| props.idp_identifier.clone());
            OpOutcome::ok_with(
                format!("Updated SAML Idp: {}", identifiers),
                provider_data(provider),
            )
        }
        Err(e) => OpOutcome::failed(format!("Cannot update SAML Idp: {}", DisplayErrorContext(&e))),
    }
}

async fn delete_provider(cognito: &CognitoClient, props: &ProviderProperties) -> OpOutcome {
    let result = cognito
        .delete_identity_provider()
        .user_pool_id(&props.user_pool_id)
        .provider_name(&props.name)
        .send()
        .await;

    match result {
        Ok(_) => OpOutcome::ok("SAML identity provider deleted"),
        Err(e) if is_missing_entity(&e) => {
            OpOutcome::ok("SAML Idp does not exist. Skipping deletion.")
        }
        Err(e) => OpOutcome::failed(format!("Cannot delete SAML Idp: {}", DisplayErrorContext(&e))),
    }
}

async fn dispatch(cognito: &CognitoClient, event: &CfnEvent) -> anyhow::Result<OpOutcome> {
    let props: ProviderProperties = serde_json::from_value(event.resource_properties.clone())
        .context("invalid resource properties")?;

    Ok(match event.request_type.as_str() {
        "Create" => run_bounded(create_provider(cognito, &props)).await,
        "Update" => run_bounded(update_provider(cognito, &props)).await,
        "Delete" => run_bounded(delete_provider(cognito, &props)).await,
        other => OpOutcome::failed(format!("Unknown operation: {}", other)),
    })
}

async fn function_handler(
    cognito: &CognitoClient,
    http: &reqwest::Client,
    event: LambdaEvent<CfnEvent>,
) -> Result<(), Error> {
    let (event, context) = (event.payload, event.context);
    let log_stream = context.env_config.log_stream;

    let outcome = match dispatch(cognito, &event).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("dispatch failed: {:#}", e);
            OpOutcome::failed(format!("Failed to complete CloudFormation action: {:#}", e))
        }
    };

    let status = CfnStatus::from(outcome.success);
    let data = finalize_data(outcome.data, &outcome.message);
    send_response(http, &event, &log_stream, status, data, None, false).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let cognito = CognitoClient::new(&config);
    let http = reqwest::Client::new();

    let cognito_ref = &cognito;
    let http_ref = &http;
    run(service_fn(move |event: LambdaEvent<CfnEvent>| {
        function_handler(cognito_ref, http_ref, event)
    }))
    .await
}
