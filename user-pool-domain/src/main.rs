use anyhow::Context;
use aws_config::BehaviorVersion;
use aws_sdk_cognitoidentityprovider::error::DisplayErrorContext;
use aws_sdk_cognitoidentityprovider::types::CustomDomainConfigType;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;
use serde_json::{json, Map};
use tracing::error;

use cfn_shared::{
    finalize_data, is_missing_entity, run_bounded, send_response, CfnEvent, CfnStatus, OpOutcome,
};

/// The update path is a deliberate no-op: it reports success without touching
/// the API.
const UPDATE_NOT_SUPPORTED: &str = "Update Not Supported in Lambda runtime version of Boto!";

#[derive(Debug, Clone, Deserialize)]
struct DomainProperties {
    #[serde(rename = "UserPoolId")]
    user_pool_id: String,
    #[serde(rename = "DomainName")]
    domain_name: String,
    /// ACM certificate for a custom domain; optional to help with DNS setups.
    #[serde(rename = "CertArn", default)]
    cert_arn: Option<String>,
}

async fn create_domain(cognito: &CognitoClient, props: &DomainProperties) -> OpOutcome {
    let mut request = cognito
        .create_user_pool_domain()
        .user_pool_id(&props.user_pool_id)
        .domain(&props.domain_name);

    if let Some(cert_arn) = &props.cert_arn {
        let domain_config = match CustomDomainConfigType::builder()
            .certificate_arn(cert_arn)
            .build()
        {
            Ok(config) => config,
            Err(e) => {
                return OpOutcome::failed(format!("Cannot create User Pool Domain: {}", e));
            }
        };
        request = request.custom_domain_config(domain_config);
    }

    match request.send().await {
        Ok(resp) => {
            let mut data = Map::new();
            if let Some(cloudfront) = resp.cloud_front_domain() {
                data.insert("CloudFrontDomain".to_string(), json!(cloudfront));
            }
            OpOutcome::ok_with("Created User Pool Domain", data)
        }
        Err(e) => OpOutcome::failed(format!(
            "Cannot create User Pool Domain: {}",
            DisplayErrorContext(&e)
        )),
    }
}

async fn delete_domain(cognito: &CognitoClient, props: &DomainProperties) -> OpOutcome {
    let result = cognito
        .delete_user_pool_domain()
        .user_pool_id(&props.user_pool_id)
        .domain(&props.domain_name)
        .send()
        .await;

    match result {
        Ok(_) => OpOutcome::ok("User Pool Domain deleted"),
        Err(e) if is_missing_entity(&e) => {
            OpOutcome::ok("User Pool Domain does not exist. Skipping deletion.")
        }
        Err(e) => OpOutcome::failed(format!(
            "Cannot delete User Pool Domain: {}",
            DisplayErrorContext(&e)
        )),
    }
}

async fn dispatch(cognito: &CognitoClient, event: &CfnEvent) -> anyhow::Result<OpOutcome> {
    let props: DomainProperties = serde_json::from_value(event.resource_properties.clone())
        .context("invalid resource properties")?;

    Ok(match event.request_type.as_str() {
        "Create" => run_bounded(create_domain(cognito, &props)).await,
        "Update" => OpOutcome::ok(UPDATE_NOT_SUPPORTED),
        "Delete" => run_bounded(delete_domain(cognito, &props)).await,
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
