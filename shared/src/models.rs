use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// CloudFormation custom-resource request, as delivered to the Lambda.
///
/// `RequestType` stays a plain string so an unrecognized lifecycle action can
/// be echoed back in the failure message. `ResourceProperties` stays raw JSON;
/// each handler deserializes its own typed properties inside dispatch so that
/// malformed properties become a FAILED callback instead of a runtime
/// deserialization error that would never answer CloudFormation.
#[derive(Debug, Clone, Deserialize)]
pub struct CfnEvent {
    #[serde(rename = "RequestType")]
    pub request_type: String,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    #[serde(rename = "StackId")]
    pub stack_id: String,
    #[serde(rename = "RequestId")]
    pub request_id: String,
    #[serde(rename = "LogicalResourceId")]
    pub logical_resource_id: String,
    #[serde(rename = "ResourceProperties", default)]
    pub resource_properties: Value,
}

const TRUTHY_TOKENS: [&str; 8] = ["true", "1", "t", "y", "yes", "yeah", "yup", "aye"];

/// Whether a property token counts as true. CloudFormation stringifies
/// booleans on the way through templates, so the accepted set is wider than
/// "true"/"false".
pub fn is_truthy(token: &str) -> bool {
    let token = token.trim().to_ascii_lowercase();
    TRUTHY_TOKENS.contains(&token.as_str())
}

/// Deserialize a boolean-like property. Parsed exactly once, here at the
/// boundary; JSON booleans and numbers are stringified first so `true` and
/// `1` behave the same as `"true"` and `"1"`.
pub fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => flag,
        Value::String(token) => is_truthy(&token),
        Value::Number(number) => is_truthy(&number.to_string()),
        _ => false,
    })
}

/// Deserialize a comma-separated property into a list.
pub fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(split_list(&raw))
}

/// Split a comma-separated property value, trimming entries and dropping
/// empty segments.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
