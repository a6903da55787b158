//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Query entries deserialize straight into the domain registry types, so
//! a config file can replace or extend the built-in query set.

use sightline_application::config::{InvokePolicy, SessionPolicy};
use sightline_domain::{ParamType, QueryDefinition, QueryParameter, QueryRegistry, Role};
use crate::executor::dispatcher::DispatchPolicy;
use crate::identity::static_provider::StaticIdentityProvider;
use crate::runtime::local::RuntimePolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("timeout values cannot be 0")]
    InvalidTimeout,

    #[error("dispatch.max_rows cannot be 0")]
    InvalidMaxRows,

    #[error("runtime.max_turns cannot be 0")]
    InvalidMaxTurns,

    #[error("query name cannot be empty")]
    EmptyQueryName,

    #[error("duplicate query name '{0}'")]
    DuplicateQueryName(String),

    #[error("user '{0}' has an empty password")]
    EmptyPassword(String),
}

/// Raw session configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSessionConfig {
    /// Seconds before expiry at which a token counts as stale
    pub renewal_margin_seconds: u64,
    pub login_timeout_seconds: u64,
    pub refresh_timeout_seconds: u64,
    /// Retries after the first failed refresh attempt
    pub refresh_retries: u32,
    pub refresh_backoff_ms: u64,
}

impl Default for FileSessionConfig {
    fn default() -> Self {
        Self {
            renewal_margin_seconds: 300,
            login_timeout_seconds: 10,
            refresh_timeout_seconds: 10,
            refresh_retries: 2,
            refresh_backoff_ms: 500,
        }
    }
}

/// Raw dispatch configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDispatchConfig {
    pub query_timeout_seconds: u64,
    pub max_rows: usize,
}

impl Default for FileDispatchConfig {
    fn default() -> Self {
        Self {
            query_timeout_seconds: 60,
            max_rows: 100,
        }
    }
}

/// Raw runtime configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRuntimeConfig {
    pub max_turns: usize,
    pub invoke_timeout_seconds: u64,
    /// How long a positive token verification may be reused at the gateway
    pub verify_cache_seconds: u64,
}

impl Default for FileRuntimeConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            invoke_timeout_seconds: 600,
            verify_cache_seconds: 60,
        }
    }
}

/// A provisioned user in the static identity directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUserConfig {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
}

/// Raw identity configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileIdentityConfig {
    pub token_ttl_seconds: u64,
    /// Extra or replacement accounts. Empty means the demo directory.
    pub users: Vec<FileUserConfig>,
}

impl Default for FileIdentityConfig {
    fn default() -> Self {
        Self {
            token_ttl_seconds: 3600,
            users: Vec::new(),
        }
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub session: FileSessionConfig,
    pub dispatch: FileDispatchConfig,
    pub runtime: FileRuntimeConfig,
    pub identity: FileIdentityConfig,
    /// Registry entries. Empty means the built-in query set.
    pub queries: Vec<QueryDefinition>,
}

impl FileConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.session.login_timeout_seconds == 0
            || self.session.refresh_timeout_seconds == 0
            || self.dispatch.query_timeout_seconds == 0
            || self.runtime.invoke_timeout_seconds == 0
        {
            return Err(ConfigValidationError::InvalidTimeout);
        }
        if self.dispatch.max_rows == 0 {
            return Err(ConfigValidationError::InvalidMaxRows);
        }
        if self.runtime.max_turns == 0 {
            return Err(ConfigValidationError::InvalidMaxTurns);
        }

        let mut seen = HashSet::new();
        for query in &self.queries {
            if query.name.trim().is_empty() {
                return Err(ConfigValidationError::EmptyQueryName);
            }
            if !seen.insert(query.name.as_str()) {
                return Err(ConfigValidationError::DuplicateQueryName(query.name.clone()));
            }
        }

        for user in &self.identity.users {
            if user.password.is_empty() {
                return Err(ConfigValidationError::EmptyPassword(user.username.clone()));
            }
        }

        Ok(())
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            renewal_margin: Duration::from_secs(self.session.renewal_margin_seconds),
            login_timeout: Duration::from_secs(self.session.login_timeout_seconds),
            refresh_timeout: Duration::from_secs(self.session.refresh_timeout_seconds),
            refresh_retries: self.session.refresh_retries,
            refresh_backoff: Duration::from_millis(self.session.refresh_backoff_ms),
        }
    }

    pub fn invoke_policy(&self) -> InvokePolicy {
        InvokePolicy {
            invoke_timeout: Duration::from_secs(self.runtime.invoke_timeout_seconds),
        }
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            query_timeout: Duration::from_secs(self.dispatch.query_timeout_seconds),
            max_rows: self.dispatch.max_rows,
        }
    }

    pub fn runtime_policy(&self) -> RuntimePolicy {
        RuntimePolicy {
            max_turns: self.runtime.max_turns,
        }
    }

    pub fn verify_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.runtime.verify_cache_seconds)
    }

    /// Build the query registry: configured entries, or the built-in set.
    pub fn registry(&self) -> QueryRegistry {
        if self.queries.is_empty() {
            return builtin_registry();
        }
        let mut registry = QueryRegistry::new();
        for query in &self.queries {
            registry = registry.register(query.clone());
        }
        registry
    }

    /// Build the identity directory: configured accounts, or the demo pair.
    pub fn identity_provider(&self) -> StaticIdentityProvider {
        if self.identity.users.is_empty() {
            return StaticIdentityProvider::demo();
        }
        let mut provider =
            StaticIdentityProvider::new(Duration::from_secs(self.identity.token_ttl_seconds));
        for user in &self.identity.users {
            provider = provider.with_user(
                &user.username,
                &user.password,
                &user.display_name,
                user.role.clone(),
            );
        }
        provider
    }
}

/// The built-in analytics query set.
///
/// Six parameterized queries over the warehouse views served by the
/// in-memory engine. Customer data carries a manager-only restriction.
pub fn builtin_registry() -> QueryRegistry {
    QueryRegistry::new()
        .register(QueryDefinition::new(
            "get_sales_summary",
            "Monthly sales totals and order counts for the last 6 months",
            "SELECT month, total_sales, order_count FROM sales_monthly_summary \
             ORDER BY month DESC LIMIT 6",
        ))
        .register(
            QueryDefinition::new(
                "get_top_customers",
                "Top customers by lifetime value over the last year",
                "SELECT customer_id, customer_name, lifetime_value, order_count \
                 FROM customer_lifetime_value ORDER BY lifetime_value DESC LIMIT {limit}",
            )
            .with_parameter(
                QueryParameter::new("limit", "Number of customers to return", false)
                    .with_type(ParamType::Integer)
                    .with_default(10),
            )
            .allow_roles([Role::Manager]),
        )
        .register(
            QueryDefinition::new(
                "get_product_performance",
                "Product sales performance over a recent window",
                "SELECT product_id, product_name, units_sold, revenue, avg_price \
                 FROM product_performance WHERE window_months = {months} \
                 ORDER BY revenue DESC LIMIT {limit}",
            )
            .with_parameter(
                QueryParameter::new("months", "Window size in months", false)
                    .with_type(ParamType::Integer)
                    .with_default(3),
            )
            .with_parameter(
                QueryParameter::new("limit", "Number of products to return", false)
                    .with_type(ParamType::Integer)
                    .with_default(10),
            ),
        )
        .register(
            QueryDefinition::new(
                "get_regional_breakdown",
                "Revenue and customer counts by region",
                "SELECT region, unique_customers, total_revenue, avg_order_value \
                 FROM regional_summary WHERE window_months = {months} \
                 ORDER BY total_revenue DESC",
            )
            .with_parameter(
                QueryParameter::new("months", "Window size in months", false)
                    .with_type(ParamType::Integer)
                    .with_default(3),
            ),
        )
        .register(
            QueryDefinition::new(
                "get_inventory_status",
                "Stock levels and reorder status for one warehouse",
                "SELECT product_id, product_name, current_stock, reorder_level, stock_status \
                 FROM inventory_levels WHERE warehouse_id = '{warehouse_id}' \
                 ORDER BY current_stock ASC",
            )
            .with_parameter(QueryParameter::new(
                "warehouse_id",
                "Warehouse identifier, e.g. WH001",
                true,
            )),
        )
        .register(
            QueryDefinition::new(
                "get_order_details",
                "Line items and status for one order",
                "SELECT order_id, order_date, customer_name, total_amount, status, \
                 product_name, quantity, unit_price \
                 FROM order_lines WHERE order_id = '{order_id}'",
            )
            .with_parameter(QueryParameter::new(
                "order_id",
                "Order identifier, e.g. ORD-12345",
                true,
            )),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.registry().len(), 6);
    }

    #[test]
    fn deserialize_full_config() {
        let toml_str = r#"
[session]
renewal_margin_seconds = 120
refresh_retries = 1

[dispatch]
query_timeout_seconds = 30
max_rows = 50

[runtime]
max_turns = 5

[identity]
token_ttl_seconds = 900

[[identity.users]]
username = "auditor@example.com"
password = "Secret1!"
display_name = "Auditor"
role = "auditor"
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.session.renewal_margin_seconds, 120);
        assert_eq!(config.session.refresh_retries, 1);
        // untouched sections keep their defaults
        assert_eq!(config.session.login_timeout_seconds, 10);
        assert_eq!(config.dispatch.max_rows, 50);
        assert_eq!(config.runtime.max_turns, 5);
        assert_eq!(config.identity.users.len(), 1);
        assert_eq!(config.identity.users[0].role, Role::Other("auditor".into()));
    }

    #[test]
    fn deserialize_query_entries() {
        let toml_str = r#"
[[queries]]
name = "get_refund_rate"
description = "Refund rate by month"
binding = "SELECT month, refund_rate FROM refunds LIMIT {limit}"
allowed_roles = ["manager"]

[[queries.parameters]]
name = "limit"
description = "Row cap"
required = false
param_type = "integer"
default = 12
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let registry = config.registry();
        assert_eq!(registry.len(), 1);
        let query = registry.get("get_refund_rate").unwrap();
        assert!(query.permits(&Role::Manager));
        assert!(!query.permits(&Role::Analyst));
        assert_eq!(query.parameters[0].default, Some(serde_json::json!(12)));
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let config: FileConfig = toml::from_str(
            r#"
[dispatch]
query_timeout_seconds = 0
"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidTimeout)
        ));
    }

    #[test]
    fn validate_rejects_duplicate_query_names() {
        let mut config = FileConfig::default();
        config.queries = vec![
            QueryDefinition::new("q", "one", "SELECT 1 FROM t"),
            QueryDefinition::new("q", "two", "SELECT 2 FROM t"),
        ];
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::DuplicateQueryName(name)) if name == "q"
        ));
    }

    #[test]
    fn builtin_registry_restricts_customer_data_to_managers() {
        let registry = builtin_registry();
        let top_customers = registry.get("get_top_customers").unwrap();
        assert!(top_customers.permits(&Role::Manager));
        assert!(!top_customers.permits(&Role::Analyst));

        let sales = registry.get("get_sales_summary").unwrap();
        assert!(sales.permits(&Role::Analyst));
    }
}
