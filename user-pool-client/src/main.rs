use anyhow::Context;
use aws_config::BehaviorVersion;
use aws_sdk_cognitoidentityprovider::error::DisplayErrorContext;
use aws_sdk_cognitoidentityprovider::types::{
    ExplicitAuthFlowsType, OAuthFlowType, UserPoolClientDescription, UserPoolClientType,
};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use cfn_shared::{
    comma_list, finalize_data, is_missing_entity, run_bounded, send_response, truthy, CfnError,
    CfnEvent, CfnStatus, OpOutcome,
};

/// Refresh token validity in days, fixed for every client this handler manages.
const REFRESH_TOKEN_VALIDITY_DAYS: i32 = 14;

/// Page size for the update/delete lookup. Not paginated; there won't be
/// hundreds of clients per pool.
const MAX_LISTED_CLIENTS: i32 = 10;

#[derive(Debug, Clone, Deserialize)]
struct ClientProperties {
    #[serde(rename = "UserPoolId")]
    user_pool_id: String,
    #[serde(rename = "ClientName")]
    client_name: String,
    #[serde(rename = "ExplicitAuthFlows", deserialize_with = "comma_list")]
    explicit_auth_flows: Vec<String>,
    #[serde(rename = "SupportedIdps", deserialize_with = "comma_list")]
    supported_idps: Vec<String>,
    #[serde(rename = "AllowedOAuthFlowsUserPoolClient", deserialize_with = "truthy")]
    allowed_oauth_flows_user_pool_client: bool,
    #[serde(rename = "AllowedOAuthFlows", deserialize_with = "comma_list")]
    allowed_oauth_flows: Vec<String>,
    #[serde(rename = "AllowedOAuthScopes", deserialize_with = "comma_list")]
    allowed_oauth_scopes: Vec<String>,
    #[serde(rename = "CallbackURLs")]
    callback_urls: Vec<String>,
    #[serde(rename = "LogoutURLs")]
    logout_urls: Vec<String>,
    #[serde(rename = "GenerateSecret", deserialize_with = "truthy")]
    generate_secret: bool,
}

impl ClientProperties {
    fn explicit_auth_flow_types(&self) -> Vec<ExplicitAuthFlowsType> {
        self.explicit_auth_flows
            .iter()
            .map(|flow| ExplicitAuthFlowsType::from(flow.as_str()))
            .collect()
    }

    fn oauth_flow_types(&self) -> Vec<OAuthFlowType> {
        self.allowed_oauth_flows
            .iter()
            .map(|flow| OAuthFlowType::from(flow.as_str()))
            .collect()
    }
}

/// Match a client name against the listed clients to recover its id. The
/// inbound event only carries the name; the update and delete calls need the
/// id.
fn find_client_id<'a>(clients: &'a [UserPoolClientDescription], name: &str) -> Option<&'a str> {
    clients
        .iter()
        .find(|client| client.client_name() == Some(name))
        .and_then(|client| client.client_id())
}

/// Response fields worth echoing back to CloudFormation as outputs.
fn client_data(client: Option<&UserPoolClientType>) -> Map<String, Value> {
    let mut data = Map::new();
    let Some(client) = client else {
        return data;
    };
    if let Some(id) = client.client_id() {
        data.insert("ClientId".to_string(), json!(id));
    }
    if let Some(name) = client.client_name() {
        data.insert("ClientName".to_string(), json!(name));
    }
    if let Some(secret) = client.client_secret() {
        data.insert("ClientSecret".to_string(), json!(secret));
    }
    if let Some(pool) = client.user_pool_id() {
        data.insert("UserPoolId".to_string(), json!(pool));
    }
    data
}

async fn create_client(cognito: &CognitoClient, props: &ClientProperties) -> OpOutcome {
    let result = cognito
        .create_user_pool_client()
        .user_pool_id(&props.user_pool_id)
        .client_name(&props.client_name)
        .generate_secret(props.generate_secret)
        .refresh_token_validity(REFRESH_TOKEN_VALIDITY_DAYS)
        .set_explicit_auth_flows(Some(props.explicit_auth_flow_types()))
        .set_supported_identity_providers(Some(props.supported_idps.clone()))
        .allowed_o_auth_flows_user_pool_client(props.allowed_oauth_flows_user_pool_client)
        .set_allowed_o_auth_flows(Some(props.oauth_flow_types()))
        .set_allowed_o_auth_scopes(Some(props.allowed_oauth_scopes.clone()))
        .set_callback_urls(Some(props.callback_urls.clone()))
        .set_logout_urls(Some(props.logout_urls.clone()))
        .send()
        .await;

    match result {
        Ok(resp) => OpOutcome::ok_with(
            "Successfully created User Pool client",
            client_data(resp.user_pool_client()),
        ),
        Err(e) => OpOutcome::failed(format!("Create Failed: {}", DisplayErrorContext(&e))),
    }
}

async fn update_client(cognito: &CognitoClient, props: &ClientProperties) -> OpOutcome {
    let listing = match cognito
        .list_user_pool_clients()
        .user_pool_id(&props.user_pool_id)
        .max_results(MAX_LISTED_CLIENTS)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            return OpOutcome::failed(format!("Update Failed: {}", DisplayErrorContext(&e)))
        }
    };

    let client_id = match find_client_id(listing.user_pool_clients(), &props.client_name) {
        Some(id) => id.to_string(),
        None => {
            return OpOutcome::failed(format!(
                "Update Failed: {}",
                CfnError::ClientNotFound(props.client_name.clone())
            ))
        }
    };

    info!("Found existing user pool client: {}", client_id);

    let result = cognito
        .update_user_pool_client()
        .user_pool_id(&props.user_pool_id)
        .client_id(client_id)
        .client_name(&props.client_name)
        .refresh_token_validity(REFRESH_TOKEN_VALIDITY_DAYS)
        .set_explicit_auth_flows(Some(props.explicit_auth_flow_types()))
        .set_supported_identity_providers(Some(props.supported_idps.clone()))
        .allowed_o_auth_flows_user_pool_client(props.allowed_oauth_flows_user_pool_client)
        .set_allowed_o_auth_flows(Some(props.oauth_flow_types()))
        .set_allowed_o_auth_scopes(Some(props.allowed_oauth_scopes.clone()))
        .set_callback_urls(Some(props.callback_urls.clone()))
        .set_logout_urls(Some(props.logout_urls.clone()))
        .send()
        .await;

    match result {
        Ok(resp) => OpOutcome::ok_with(
            "Updated user pool client",
            client_data(resp.user_pool_client()),
        ),
        Err(e) => OpOutcome::failed(format!("Update Failed: {}", DisplayErrorContext(&e))),
    }
}

async fn delete_client(cognito: &CognitoClient, props: &ClientProperties) -> OpOutcome {
    // Same name-to-id lookup as update; a vanished pool or client means
    // there is nothing left to delete.
    let listing = match cognito
        .list_user_pool_clients()
        .user_pool_id(&props.user_pool_id)
        .max_results(MAX_LISTED_CLIENTS)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) if is_missing_entity(&e) => return OpOutcome::ok("Client does not exist!"),
        Err(e) => {
            return OpOutcome::failed(format!("Delete Failed: {}", DisplayErrorContext(&e)))
        }
    };

    let client_id = match find_client_id(listing.user_pool_clients(), &props.client_name) {
        Some(id) => id.to_string(),
        None => return OpOutcome::ok("Client does not exist!"),
    };

    let result = cognito
        .delete_user_pool_client()
        .user_pool_id(&props.user_pool_id)
        .client_id(client_id)
        .send()
        .await;

    match result {
        Ok(_) => OpOutcome::ok("Deleted user pool client"),
        Err(e) if is_missing_entity(&e) => OpOutcome::ok("Client does not exist!"),
        Err(e) => OpOutcome::failed(format!("Delete Failed: {}", DisplayErrorContext(&e))),
    }
}

async fn dispatch(cognito: &CognitoClient, event: &CfnEvent) -> anyhow::Result<OpOutcome> {
    let props: ClientProperties = serde_json::from_value(event.resource_properties.clone())
        .context("invalid resource properties")?;

    Ok(match event.request_type.as_str() {
        "Create" => run_bounded(create_client(cognito, &props)).await,
        "Update" => run_bounded(update_client(cognito, &props)).await,
        "Delete" => run_bounded(delete_client(cognito, &props)).await,
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
