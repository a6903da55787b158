//! In-memory data engine.
//!
//! Serves the registered analytics queries from fixed in-process tables
//! shaped like the warehouse views the bindings reference. Understands the
//! subset of SQL the registry bindings actually use:
//!
//! ```text
//! SELECT col[, col ...] FROM table
//!   [WHERE col = value [AND col = value ...]]
//!   [ORDER BY col [ASC|DESC]]
//!   [LIMIT n]
//! ```
//!
//! Tables may declare a key column (warehouse id, order id). A `WHERE`
//! filter on a key column that matches nothing is an execution failure
//! rather than an empty result, so a lookup for a nonexistent warehouse
//! reads back as an error the agent can explain.

use sightline_application::ports::data_engine::{DataEnginePort, EngineError, QueryOutput};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    /// Filters on this column must match at least one row.
    key_column: Option<String>,
}

impl Table {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Fixed-dataset engine backing the demo deployment and the tests.
pub struct MemoryDataEngine {
    tables: HashMap<String, Table>,
    statement: Regex,
}

impl MemoryDataEngine {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            statement: Regex::new(concat!(
                r"(?is)^\s*SELECT\s+(?P<cols>.+?)\s+FROM\s+(?P<table>\w+)",
                r"(?:\s+WHERE\s+(?P<where>.+?))?",
                r"(?:\s+ORDER\s+BY\s+(?P<order>\w+)(?:\s+(?P<dir>ASC|DESC))?)?",
                r"(?:\s+LIMIT\s+(?P<limit>\d+))?\s*$",
            ))
            .expect("statement grammar is valid"),
        }
    }

    fn with_table(
        mut self,
        name: &str,
        columns: &[&str],
        key_column: Option<&str>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        self.tables.insert(
            name.to_string(),
            Table {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
                key_column: key_column.map(str::to_string),
            },
        );
        self
    }

    /// Engine preloaded with the warehouse views the default registry
    /// bindings reference.
    pub fn with_sample_data() -> Self {
        Self::new()
            .with_table(
                "sales_monthly_summary",
                &["month", "total_sales", "order_count"],
                None,
                vec![
                    vec![json!("2025-08"), json!(125_400.50), json!(312)],
                    vec![json!("2025-07"), json!(118_220.00), json!(298)],
                    vec![json!("2025-06"), json!(131_875.25), json!(334)],
                    vec![json!("2025-05"), json!(109_432.80), json!(271)],
                    vec![json!("2025-04"), json!(97_310.40), json!(244)],
                    vec![json!("2025-03"), json!(103_988.10), json!(259)],
                ],
            )
            .with_table(
                "customer_lifetime_value",
                &["customer_id", "customer_name", "lifetime_value", "order_count"],
                None,
                vec![
                    vec![json!("C-1001"), json!("Acme Industrial"), json!(84_200.00), json!(45)],
                    vec![json!("C-1044"), json!("Borealis Foods"), json!(71_950.75), json!(38)],
                    vec![json!("C-1322"), json!("Cobalt Retail Group"), json!(66_410.20), json!(52)],
                    vec![json!("C-1210"), json!("Delta Logistics"), json!(58_730.00), json!(29)],
                    vec![json!("C-1187"), json!("Everline Health"), json!(47_115.60), json!(33)],
                    vec![json!("C-1402"), json!("Fathom Marine"), json!(39_804.90), json!(21)],
                ],
            )
            .with_table(
                "product_performance",
                &[
                    "window_months",
                    "product_id",
                    "product_name",
                    "units_sold",
                    "revenue",
                    "avg_price",
                ],
                None,
                product_performance_rows(),
            )
            .with_table(
                "regional_summary",
                &[
                    "window_months",
                    "region",
                    "unique_customers",
                    "total_revenue",
                    "avg_order_value",
                ],
                None,
                regional_summary_rows(),
            )
            .with_table(
                "inventory_levels",
                &[
                    "warehouse_id",
                    "product_id",
                    "product_name",
                    "current_stock",
                    "reorder_level",
                    "stock_status",
                ],
                Some("warehouse_id"),
                vec![
                    vec![json!("WH001"), json!("P-201"), json!("Standing Desk"), json!(14), json!(20), json!("LOW")],
                    vec![json!("WH001"), json!("P-118"), json!("Task Chair"), json!(42), json!(30), json!("MEDIUM")],
                    vec![json!("WH001"), json!("P-307"), json!("Monitor Arm"), json!(188), json!(50), json!("GOOD")],
                    vec![json!("WH002"), json!("P-118"), json!("Task Chair"), json!(9), json!(30), json!("LOW")],
                    vec![json!("WH002"), json!("P-442"), json!("Cable Tray"), json!(260), json!(80), json!("GOOD")],
                ],
            )
            .with_table(
                "order_lines",
                &[
                    "order_id",
                    "order_date",
                    "customer_name",
                    "total_amount",
                    "status",
                    "product_name",
                    "quantity",
                    "unit_price",
                ],
                Some("order_id"),
                vec![
                    vec![
                        json!("ORD-12345"), json!("2025-08-12"), json!("Acme Industrial"),
                        json!(1_240.00), json!("shipped"), json!("Standing Desk"), json!(2), json!(420.00),
                    ],
                    vec![
                        json!("ORD-12345"), json!("2025-08-12"), json!("Acme Industrial"),
                        json!(1_240.00), json!("shipped"), json!("Task Chair"), json!(4), json!(100.00),
                    ],
                    vec![
                        json!("ORD-67890"), json!("2025-07-30"), json!("Borealis Foods"),
                        json!(356.50), json!("delivered"), json!("Monitor Arm"), json!(31), json!(11.50),
                    ],
                ],
            )
    }
}

impl Default for MemoryDataEngine {
    fn default() -> Self {
        Self::with_sample_data()
    }
}

#[async_trait]
impl DataEnginePort for MemoryDataEngine {
    async fn execute(&self, statement: &str, max_rows: usize) -> Result<QueryOutput, EngineError> {
        let caps = self
            .statement
            .captures(statement)
            .ok_or_else(|| EngineError::MalformedQuery(format!("unrecognized statement: {statement}")))?;

        let table_name = &caps["table"];
        let table = self
            .tables
            .get(table_name)
            .ok_or_else(|| EngineError::MalformedQuery(format!("unknown table '{table_name}'")))?;

        let filters = match caps.name("where") {
            Some(clause) => parse_filters(clause.as_str(), table)?,
            None => Vec::new(),
        };

        let mut rows: Vec<&Vec<Value>> = table
            .rows
            .iter()
            .filter(|row| filters.iter().all(|(idx, value)| value_eq(&row[*idx], value)))
            .collect();

        // A miss on the table's key column is a lookup failure, not an
        // empty result.
        if let Some(key) = &table.key_column {
            if rows.is_empty() {
                if let Some((_, wanted)) = filters
                    .iter()
                    .find(|(idx, _)| table.columns[*idx] == *key)
                {
                    return Err(EngineError::NotFound(format!(
                        "no rows in {table_name} for {key} = {wanted}"
                    )));
                }
            }
        }

        if let Some(order) = caps.name("order") {
            let idx = table.column_index(order.as_str()).ok_or_else(|| {
                EngineError::MalformedQuery(format!("unknown order column '{}'", order.as_str()))
            })?;
            let descending = caps
                .name("dir")
                .is_some_and(|d| d.as_str().eq_ignore_ascii_case("DESC"));
            rows.sort_by(|a, b| {
                let ord = compare_values(&a[idx], &b[idx]);
                if descending { ord.reverse() } else { ord }
            });
        }

        let limit = caps
            .name("limit")
            .and_then(|l| l.as_str().parse::<usize>().ok())
            .unwrap_or(usize::MAX)
            .min(max_rows);

        let projection = parse_projection(&caps["cols"], table)?;
        let output_rows: Vec<Vec<Value>> = rows
            .into_iter()
            .take(limit)
            .map(|row| projection.iter().map(|&idx| row[idx].clone()).collect())
            .collect();

        debug!(table = table_name, rows = output_rows.len(), "memory engine query served");
        Ok(QueryOutput::new(
            projection
                .iter()
                .map(|&idx| table.columns[idx].clone())
                .collect(),
            output_rows,
        ))
    }
}

fn parse_projection(cols: &str, table: &Table) -> Result<Vec<usize>, EngineError> {
    if cols.trim() == "*" {
        return Ok((0..table.columns.len()).collect());
    }
    cols.split(',')
        .map(|col| {
            // tolerate "SUM(x) AS alias" style fragments by keying on the alias
            let name = col
                .trim()
                .rsplit(|c: char| c.is_whitespace() || c == '.')
                .next()
                .unwrap_or("")
                .to_string();
            table
                .column_index(&name)
                .ok_or_else(|| EngineError::MalformedQuery(format!("unknown column '{name}'")))
        })
        .collect()
}

fn parse_filters(clause: &str, table: &Table) -> Result<Vec<(usize, Value)>, EngineError> {
    clause
        .split(" AND ")
        .map(|term| {
            let (column, raw) = term
                .split_once('=')
                .ok_or_else(|| EngineError::MalformedQuery(format!("unsupported predicate '{term}'")))?;
            let column = column.trim();
            let idx = table
                .column_index(column)
                .ok_or_else(|| EngineError::MalformedQuery(format!("unknown column '{column}'")))?;
            let raw = raw.trim();
            let value = if let Some(quoted) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
                Value::String(quoted.replace("''", "'"))
            } else {
                raw.parse::<f64>()
                    .map(|n| json!(n))
                    .map_err(|_| EngineError::MalformedQuery(format!("unsupported literal '{raw}'")))?
            };
            Ok((idx, value))
        })
        .collect()
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a
            .as_str()
            .unwrap_or_default()
            .cmp(b.as_str().unwrap_or_default()),
    }
}

fn product_performance_rows() -> Vec<Vec<Value>> {
    let base = [
        ("P-201", "Standing Desk", 180, 75_600.00, 420.00),
        ("P-118", "Task Chair", 420, 42_000.00, 100.00),
        ("P-307", "Monitor Arm", 960, 11_040.00, 11.50),
        ("P-442", "Cable Tray", 1_310, 9_170.00, 7.00),
    ];
    [3, 6, 12]
        .into_iter()
        .flat_map(|window| {
            base.iter().map(move |(id, name, units, revenue, price)| {
                let scale = window as f64 / 3.0;
                vec![
                    json!(window),
                    json!(id),
                    json!(name),
                    json!((*units as f64 * scale) as i64),
                    json!(revenue * scale),
                    json!(price),
                ]
            })
        })
        .collect()
}

fn regional_summary_rows() -> Vec<Vec<Value>> {
    let base = [
        ("North", 84, 212_300.00, 310.50),
        ("South", 66, 178_940.00, 287.20),
        ("East", 91, 244_120.00, 334.80),
        ("West", 72, 199_410.00, 301.10),
    ];
    [3, 6, 12]
        .into_iter()
        .flat_map(|window| {
            base.iter().map(move |(region, customers, revenue, avg)| {
                let scale = window as f64 / 3.0;
                vec![
                    json!(window),
                    json!(region),
                    json!((*customers as f64 * scale) as i64),
                    json!(revenue * scale),
                    json!(avg),
                ]
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_ordered_and_limited_projections() {
        let engine = MemoryDataEngine::with_sample_data();
        let output = engine
            .execute(
                "SELECT customer_id, customer_name, lifetime_value \
                 FROM customer_lifetime_value ORDER BY lifetime_value DESC LIMIT 3",
                100,
            )
            .await
            .unwrap();

        assert_eq!(output.columns, vec!["customer_id", "customer_name", "lifetime_value"]);
        assert_eq!(output.rows.len(), 3);
        assert_eq!(output.rows[0][1], json!("Acme Industrial"));
    }

    #[tokio::test]
    async fn filters_on_equality_predicates() {
        let engine = MemoryDataEngine::with_sample_data();
        let output = engine
            .execute(
                "SELECT product_name, current_stock, stock_status \
                 FROM inventory_levels WHERE warehouse_id = 'WH001' \
                 ORDER BY current_stock ASC",
                100,
            )
            .await
            .unwrap();

        assert_eq!(output.rows.len(), 3);
        assert_eq!(output.rows[0][0], json!("Standing Desk"));
    }

    #[tokio::test]
    async fn missing_key_lookup_is_not_found_and_not_retryable() {
        let engine = MemoryDataEngine::with_sample_data();
        let err = engine
            .execute(
                "SELECT product_name, current_stock FROM inventory_levels \
                 WHERE warehouse_id = 'WH999'",
                100,
            )
            .await
            .unwrap_err();

        assert!(!err.is_transient());
        assert!(matches!(err, EngineError::NotFound(msg) if msg.contains("WH999")));
    }

    #[tokio::test]
    async fn missing_non_key_filter_gives_empty_rows() {
        let engine = MemoryDataEngine::with_sample_data();
        let output = engine
            .execute(
                "SELECT region FROM regional_summary WHERE window_months = 24",
                100,
            )
            .await
            .unwrap();

        assert!(output.rows.is_empty());
    }

    #[tokio::test]
    async fn unknown_table_is_malformed() {
        let engine = MemoryDataEngine::with_sample_data();
        let err = engine
            .execute("SELECT x FROM secrets", 100)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::MalformedQuery(_)));
    }

    #[tokio::test]
    async fn row_cap_bounds_every_result() {
        let engine = MemoryDataEngine::with_sample_data();
        let output = engine
            .execute("SELECT month, total_sales FROM sales_monthly_summary", 2)
            .await
            .unwrap();

        assert_eq!(output.rows.len(), 2);
    }

    #[tokio::test]
    async fn compound_predicates_narrow_with_and() {
        let engine = MemoryDataEngine::with_sample_data();
        let output = engine
            .execute(
                "SELECT region, total_revenue FROM regional_summary \
                 WHERE window_months = 6 AND region = 'East'",
                100,
            )
            .await
            .unwrap();

        assert_eq!(output.rows.len(), 1);
        assert_eq!(output.rows[0][0], json!("East"));
    }
}
