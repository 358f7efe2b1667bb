//! HR data tools: employee/vacation lookup and holiday policy
//!
//! Both tools wrap a single outbound GET and always hand the model a
//! well-formed JSON string. Upstream failures (transport, non-2xx,
//! malformed JSON) are absorbed here and logged; the model receives an
//! empty-valued result it can reason about as "no data found".

use super::{Tool, ToolResult};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Fetch employee personal data and taken vacation days by DNI.
pub struct EmployeeDataTool {
    client: reqwest::Client,
    url: String,
}

impl EmployeeDataTool {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Tool for EmployeeDataTool {
    fn name(&self) -> &str {
        "get_employee_data"
    }

    fn description(&self) -> &str {
        "Fetch employee personal data and taken-vacation records based on their DNI. \
         Live database call."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "dni": {
                    "type": "string",
                    "description": "The employee's DNI (national id) as a string, e.g. \"101\""
                }
            },
            "required": ["dni"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let dni = params.get("dni").and_then(|v| v.as_str()).unwrap_or("");
        Ok(ToolResult::success(
            fetch_employee_data(&self.client, &self.url, dni).await,
        ))
    }
}

/// Fetch the company's holiday policy document.
pub struct HolidayPolicyTool {
    client: reqwest::Client,
    url: String,
}

impl HolidayPolicyTool {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Tool for HolidayPolicyTool {
    fn name(&self) -> &str {
        "get_holydays_policy"
    }

    fn description(&self) -> &str {
        "Returns the company's holidays policy."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value) -> Result<ToolResult> {
        Ok(ToolResult::success(
            fetch_holiday_policy(&self.client, &self.url).await,
        ))
    }
}

/// GET the employee dataset and filter it by DNI.
///
/// Returns `{"empleado": <record|null>, "vacaciones_tomadas": [<records>]}`
/// serialized to JSON text, or the empty-valued shape
/// `{"empleado": {}, "vacaciones_tomadas": {}}` on any upstream failure.
pub async fn fetch_employee_data(client: &reqwest::Client, url: &str, dni: &str) -> String {
    match request_json(client, url).await {
        Ok(data) => filter_employee_data(&data, dni),
        Err(e) => {
            tracing::warn!("Employee data request failed: {e:#}");
            json!({"empleado": {}, "vacaciones_tomadas": {}}).to_string()
        }
    }
}

/// GET the policy endpoint and extract the `doc` field.
///
/// Returns `{"policy": <text>}` serialized to JSON text; `{"policy": ""}`
/// on any upstream failure.
pub async fn fetch_holiday_policy(client: &reqwest::Client, url: &str) -> String {
    let policy = match request_json(client, url).await {
        Ok(data) => data
            .get("doc")
            .and_then(|d| d.as_str())
            .unwrap_or("")
            .to_string(),
        Err(e) => {
            tracing::warn!("Holiday policy request failed: {e:#}");
            String::new()
        }
    };
    json!({ "policy": policy }).to_string()
}

/// Filter the dataset body by string equality on the `dni` field.
///
/// The dataset is `{team: [{dni, ...}], vacaciones: [{dni, ...}]}`; the
/// endpoint takes no query parameters, so filtering happens client-side.
pub fn filter_employee_data(data: &Value, dni: &str) -> String {
    let empleado = data
        .get("team")
        .and_then(|t| t.as_array())
        .and_then(|team| team.iter().find(|e| dni_matches(e, dni)))
        .cloned()
        .unwrap_or(Value::Null);

    let vacaciones: Vec<Value> = data
        .get("vacaciones")
        .and_then(|v| v.as_array())
        .map(|list| list.iter().filter(|v| dni_matches(v, dni)).cloned().collect())
        .unwrap_or_default();

    json!({
        "empleado": empleado,
        "vacaciones_tomadas": vacaciones,
    })
    .to_string()
}

/// DNIs arrive as numbers or strings in the dataset; compare as strings.
fn dni_matches(record: &Value, dni: &str) -> bool {
    match record.get("dni") {
        Some(Value::String(s)) => s == dni,
        Some(Value::Number(n)) => n.to_string() == dni,
        _ => false,
    }
}

async fn request_json(client: &reqwest::Client, url: &str) -> Result<Value> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.json::<Value>().await?)
}
