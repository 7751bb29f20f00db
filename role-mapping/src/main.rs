use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use cfn_shared::{send_response, CfnError, CfnEvent, CfnStatus};

#[derive(Debug, Clone, Default, Deserialize)]
struct RoleMappingProperties {
    #[serde(rename = "IdentityProvider", default)]
    identity_provider: String,
    #[serde(rename = "Type", default)]
    mapping_type: Option<String>,
    #[serde(rename = "AmbiguousRoleResolution", default)]
    ambiguous_role_resolution: Option<String>,
    #[serde(rename = "RulesConfiguration", default)]
    rules_configuration: Option<Value>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Reshape the properties into the role-mapping document an Identity Pool
/// expects, keyed by the identity provider. `RulesConfiguration` is only
/// attached when the mapping type is "Rules" and at least one rule is
/// present; a rules-typed mapping without rules is rejected by the service.
fn transform_role_mapping(props: &RoleMappingProperties) -> Result<Map<String, Value>, CfnError> {
    if props.identity_provider.trim().is_empty() {
        return Err(CfnError::InvalidIdentityProvider);
    }

    let mut entry = Map::new();
    entry.insert(
        "Type".to_string(),
        json!(non_empty(&props.mapping_type).unwrap_or("Token")),
    );
    entry.insert(
        "AmbiguousRoleResolution".to_string(),
        json!(non_empty(&props.ambiguous_role_resolution).unwrap_or("Deny")),
    );

    let mut mapping = Map::new();
    mapping.insert(props.identity_provider.clone(), Value::Object(entry));

    if props.mapping_type.as_deref() == Some("Rules") {
        if let Some(rules_config) = &props.rules_configuration {
            let has_rules = rules_config
                .get("Rules")
                .and_then(Value::as_array)
                .map_or(false, |rules| !rules.is_empty());
            if has_rules {
                mapping.insert("RulesConfiguration".to_string(), rules_config.clone());
            }
        }
    }

    Ok(mapping)
}

/// No API call and no subprocess here: this handler only reshapes its input
/// for consumption by the stack, so it never signals FAILED. Blocking a stack
/// operation on a broken output transformation would be worse than shipping
/// an empty mapping.
async fn function_handler(
    http: &reqwest::Client,
    event: LambdaEvent<CfnEvent>,
) -> Result<(), Error> {
    let (event, context) = (event.payload, event.context);
    let log_stream = context.env_config.log_stream;

    let mapping = match serde_json::from_value::<RoleMappingProperties>(
        event.resource_properties.clone(),
    ) {
        Ok(props) => match transform_role_mapping(&props) {
            Ok(mapping) => {
                info!("Transformed role mapping for: {}", props.identity_provider);
                mapping
            }
            Err(e) => {
                error!("Failed to transform role mappings: {}", e);
                Map::new()
            }
        },
        Err(e) => {
            error!("Failed to transform role mappings: {}", e);
            Map::new()
        }
    };

    let mut data = Map::new();
    data.insert("RoleMapping".to_string(), Value::Object(mapping));
    send_response(
        http,
        &event,
        &log_stream,
        CfnStatus::Success,
        data,
        None,
        false,
    )
    .await;
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

    let http = reqwest::Client::new();

    let http_ref = &http;
    run(service_fn(move |event: LambdaEvent<CfnEvent>| {
        function_handler(http_ref, event)
    }))
    .await
}
