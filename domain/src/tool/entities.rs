//! Tool domain entities: calls, query definitions, and the registry.
//!
//! The registry is the closed set of named queries the agent may invoke.
//! It is loaded once at startup and read-only afterwards; freeform SQL
//! never crosses the gateway.

use crate::identity::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declared type of a query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Integer,
}

impl ParamType {
    pub fn as_str(&self) -> &str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
        }
    }

    /// Check a JSON value against this declared type.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
        }
    }
}

/// Parameter specification for a registered query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub description: String,
    pub required: bool,
    #[serde(default)]
    pub param_type: ParamType,
    /// Value substituted when an optional parameter is omitted.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default: Option<serde_json::Value>,
    /// If set, only callers with this verified role may supply the parameter.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub restricted_to: Option<Role>,
}

impl QueryParameter {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
            param_type: ParamType::String,
            default: None,
            restricted_to: None,
        }
    }

    pub fn with_type(mut self, param_type: ParamType) -> Self {
        self.param_type = param_type;
        self
    }

    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn restricted_to(mut self, role: Role) -> Self {
        self.restricted_to = Some(role);
        self
    }
}

/// A registry entry binding a tool name to a parameterized query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefinition {
    /// Unique tool name (e.g. "get_sales_summary").
    pub name: String,
    pub description: String,
    pub parameters: Vec<QueryParameter>,
    /// Roles permitted to call this query. `None` means any verified role.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub allowed_roles: Option<Vec<Role>>,
    /// Parameterized statement with `{param}` placeholders.
    pub binding: String,
}

impl QueryDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        binding: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            allowed_roles: None,
            binding: binding.into(),
        }
    }

    pub fn with_parameter(mut self, param: QueryParameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn allow_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.allowed_roles = Some(roles.into_iter().collect());
        self
    }

    /// Whether a verified role is permitted to call this query.
    pub fn permits(&self, role: &Role) -> bool {
        match &self.allowed_roles {
            None => true,
            Some(roles) => roles.contains(role),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&QueryParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Validate supplied arguments against the declared schema.
    ///
    /// Fails on a missing required parameter, an undeclared argument, or a
    /// type mismatch — before any statement is built.
    pub fn check_arguments(
        &self,
        arguments: &HashMap<String, serde_json::Value>,
    ) -> Result<(), String> {
        for param in &self.parameters {
            match arguments.get(&param.name) {
                Some(value) => {
                    if !param.param_type.accepts(value) {
                        return Err(format!(
                            "argument '{}' must be of type {}",
                            param.name,
                            param.param_type.as_str()
                        ));
                    }
                }
                None if param.required && param.default.is_none() => {
                    return Err(format!("missing required argument '{}'", param.name));
                }
                None => {}
            }
        }
        for name in arguments.keys() {
            if self.parameter(name).is_none() {
                return Err(format!("unexpected argument '{}'", name));
            }
        }
        Ok(())
    }

    /// Substitute arguments into the binding, producing the final statement.
    ///
    /// Call [`check_arguments`](Self::check_arguments) first; this only
    /// fails when a placeholder cannot be filled from arguments or defaults.
    /// String values have single quotes doubled so a value can never break
    /// out of its quoted position in the template.
    pub fn bind(&self, arguments: &HashMap<String, serde_json::Value>) -> Result<String, String> {
        let mut statement = self.binding.clone();
        for param in &self.parameters {
            let placeholder = format!("{{{}}}", param.name);
            if !statement.contains(&placeholder) {
                continue;
            }
            let value = arguments
                .get(&param.name)
                .or(param.default.as_ref())
                .ok_or_else(|| format!("no value for parameter '{}'", param.name))?;
            let rendered = match value {
                serde_json::Value::String(s) => s.replace('\'', "''"),
                other => other.to_string(),
            };
            statement = statement.replace(&placeholder, &rendered);
        }
        Ok(statement)
    }
}

/// A tool call proposed by the reasoning model, before a verified role is
/// attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    pub arguments: HashMap<String, serde_json::Value>,
}

impl ToolRequest {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments: HashMap::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Stamp the verified caller role onto this request, producing the
    /// [`ToolCall`] that crosses the gateway.
    pub fn into_call(self, requesting_role: Role) -> ToolCall {
        ToolCall {
            tool_name: self.tool_name,
            arguments: self.arguments,
            requesting_role,
        }
    }
}

/// A call to a registered query, as routed through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub arguments: HashMap<String, serde_json::Value>,
    /// Role of the caller as stamped by the runtime. The gateway treats
    /// this as a claim and authorizes against the verified token instead.
    pub requesting_role: Role,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, requesting_role: Role) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments: HashMap::new(),
            requesting_role,
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.arguments.get(key).and_then(|v| v.as_i64())
    }
}

/// The closed, startup-loaded set of queries the agent may call.
#[derive(Debug, Clone, Default)]
pub struct QueryRegistry {
    entries: HashMap<String, QueryDefinition>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(mut self, definition: QueryDefinition) -> Self {
        self.entries.insert(definition.name.clone(), definition);
        self
    }

    pub fn get(&self, name: &str) -> Option<&QueryDefinition> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn all(&self) -> impl Iterator<Item = &QueryDefinition> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn top_customers() -> QueryDefinition {
        QueryDefinition::new(
            "get_top_customers",
            "Top customers by lifetime value",
            "SELECT customer_id, customer_name, lifetime_value \
             FROM customer_lifetime_value ORDER BY lifetime_value DESC LIMIT {limit}",
        )
        .with_parameter(
            QueryParameter::new("limit", "Number of customers to return", false)
                .with_type(ParamType::Integer)
                .with_default(10),
        )
    }

    #[test]
    fn check_arguments_accepts_declared_types() {
        let def = top_customers();
        let args = HashMap::from([("limit".to_string(), json!(5))]);
        assert!(def.check_arguments(&args).is_ok());
    }

    #[test]
    fn check_arguments_rejects_type_mismatch() {
        let def = top_customers();
        let args = HashMap::from([("limit".to_string(), json!("five"))]);
        let err = def.check_arguments(&args).unwrap_err();
        assert!(err.contains("integer"));
    }

    #[test]
    fn check_arguments_rejects_undeclared_argument() {
        let def = top_customers();
        let args = HashMap::from([("region".to_string(), json!("EMEA"))]);
        let err = def.check_arguments(&args).unwrap_err();
        assert!(err.contains("unexpected argument"));
    }

    #[test]
    fn check_arguments_rejects_missing_required() {
        let def = QueryDefinition::new(
            "get_order_details",
            "Order lookup",
            "SELECT * FROM order_lines WHERE order_id = '{order_id}'",
        )
        .with_parameter(QueryParameter::new("order_id", "Order id", true));

        let err = def.check_arguments(&HashMap::new()).unwrap_err();
        assert!(err.contains("order_id"));
    }

    #[test]
    fn bind_substitutes_arguments_and_defaults() {
        let def = top_customers();

        let explicit = HashMap::from([("limit".to_string(), json!(3))]);
        assert!(def.bind(&explicit).unwrap().ends_with("LIMIT 3"));

        // omitted optional parameter falls back to the default
        assert!(def.bind(&HashMap::new()).unwrap().ends_with("LIMIT 10"));
    }

    #[test]
    fn bind_escapes_single_quotes_in_strings() {
        let def = QueryDefinition::new(
            "get_order_details",
            "Order lookup",
            "SELECT * FROM order_lines WHERE order_id = '{order_id}'",
        )
        .with_parameter(QueryParameter::new("order_id", "Order id", true));

        let args = HashMap::from([("order_id".to_string(), json!("O'1"))]);
        let bound = def.bind(&args).unwrap();
        assert!(bound.contains("'O''1'"));
    }

    #[test]
    fn role_restrictions_are_explicit_membership() {
        let def = top_customers().allow_roles([Role::Manager]);
        assert!(def.permits(&Role::Manager));
        assert!(!def.permits(&Role::Analyst));

        let open = top_customers();
        assert!(open.permits(&Role::Analyst));
        assert!(open.permits(&Role::Other("auditor".into())));
    }

    #[test]
    fn registry_is_a_closed_set() {
        let registry = QueryRegistry::new().register(top_customers());
        assert!(registry.contains("get_top_customers"));
        assert!(!registry.contains("drop_table"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn tool_request_is_stamped_with_verified_role() {
        let call = ToolRequest::new("get_top_customers")
            .with_arg("limit", 5)
            .into_call(Role::Manager);

        assert_eq!(call.tool_name, "get_top_customers");
        assert_eq!(call.requesting_role, Role::Manager);
        assert_eq!(call.get_i64("limit"), Some(5));
    }
}
