use async_trait::async_trait;
use casper_db::{CancelSignal, DataError, Entity, QueryError, Value};
use serde::Deserialize;

use super::model::{Customer, CustomerDto};
use crate::handler::{Handler, HandlerError, Request};
use crate::scope::HandlerScope;

const MAX_NAME_CHARS: usize = 200;
const MAX_EMAIL_CHARS: usize = 254;
const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 500;

const SELECT_CUSTOMER: &str = "SELECT id, name, email, row_version FROM customers";

/// Fetch one customer by id.
#[derive(Debug, Clone)]
pub struct GetCustomer {
    pub id: i64,
}

impl Request for GetCustomer {
    type Response = Option<CustomerDto>;
}

/// List customers ordered by id, optionally filtered by name prefix.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCustomers {
    pub name_prefix: Option<String>,
    pub limit: Option<u32>,
}

impl Request for ListCustomers {
    type Response = Vec<CustomerDto>;
}

/// Create a customer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Request for CreateCustomer {
    type Response = CustomerDto;
}

/// Rename a customer the caller last saw at `expected_version`.
#[derive(Debug, Clone)]
pub struct RenameCustomer {
    pub id: i64,
    pub name: String,
    pub expected_version: i64,
}

impl Request for RenameCustomer {
    type Response = CustomerDto;
}

/// Delete a customer the caller last saw at `expected_version`.
#[derive(Debug, Clone)]
pub struct DeleteCustomer {
    pub id: i64,
    pub expected_version: i64,
}

impl Request for DeleteCustomer {
    /// Rows removed.
    type Response = usize;
}

fn validate_name(name: &str) -> Result<String, HandlerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(HandlerError::validation("name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(HandlerError::validation(format!(
            "name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_email(email: Option<&str>) -> Result<Option<String>, HandlerError> {
    let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(None);
    };
    if email.len() > MAX_EMAIL_CHARS {
        return Err(HandlerError::validation(format!(
            "email must be at most {MAX_EMAIL_CHARS} characters"
        )));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            Ok(Some(email.to_string()))
        }
        _ => Err(HandlerError::validation(format!("invalid email: {email}"))),
    }
}

fn escape_like(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

pub struct GetCustomerHandler;

#[async_trait]
impl Handler for GetCustomerHandler {
    type Request = GetCustomer;

    async fn handle(
        &self,
        request: GetCustomer,
        scope: &mut HandlerScope,
        cancel: &CancelSignal,
    ) -> Result<Option<CustomerDto>, HandlerError> {
        let found: Option<Customer> = scope
            .read
            .query_one(
                &format!("{SELECT_CUSTOMER} WHERE id = ?1"),
                vec![Value::Integer(request.id)],
                cancel,
            )
            .await?;
        Ok(found.map(|c| scope.mapper.map(c)))
    }
}

pub struct ListCustomersHandler;

#[async_trait]
impl Handler for ListCustomersHandler {
    type Request = ListCustomers;

    async fn handle(
        &self,
        request: ListCustomers,
        scope: &mut HandlerScope,
        cancel: &CancelSignal,
    ) -> Result<Vec<CustomerDto>, HandlerError> {
        let limit = request.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if limit == 0 || limit > MAX_LIST_LIMIT {
            return Err(HandlerError::validation(format!(
                "limit must be between 1 and {MAX_LIST_LIMIT}"
            )));
        }

        let (sql, params) = match request.name_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => (
                format!("{SELECT_CUSTOMER} WHERE name LIKE ?1 ESCAPE '\\' ORDER BY id LIMIT ?2"),
                vec![Value::Text(escape_like(prefix)), Value::Integer(limit.into())],
            ),
            _ => (
                format!("{SELECT_CUSTOMER} ORDER BY id LIMIT ?1"),
                vec![Value::Integer(limit.into())],
            ),
        };

        let rows: Vec<Customer> = scope.read.query(&sql, params, cancel).await?;
        Ok(scope.mapper.map_all(rows))
    }
}

pub struct CreateCustomerHandler;

#[async_trait]
impl Handler for CreateCustomerHandler {
    type Request = CreateCustomer;

    async fn handle(
        &self,
        request: CreateCustomer,
        scope: &mut HandlerScope,
        cancel: &CancelSignal,
    ) -> Result<CustomerDto, HandlerError> {
        let mut customer = Customer {
            id: None,
            name: validate_name(&request.name)?,
            email: validate_email(request.email.as_deref())?,
            row_version: 1,
        };

        let staged = scope.write.add(&customer);
        scope.write.commit(cancel).await?;

        customer.id = Some(
            scope
                .write
                .inserted_key(staged)
                .ok_or(QueryError::MissingKey {
                    table: Customer::TABLE,
                })
                .map_err(DataError::from)?,
        );
        tracing::info!(id = customer.id, "customer created");
        Ok(scope.mapper.map(customer))
    }
}

pub struct RenameCustomerHandler;

#[async_trait]
impl Handler for RenameCustomerHandler {
    type Request = RenameCustomer;

    async fn handle(
        &self,
        request: RenameCustomer,
        scope: &mut HandlerScope,
        cancel: &CancelSignal,
    ) -> Result<CustomerDto, HandlerError> {
        let name = validate_name(&request.name)?;

        // Through the write connection: the read store may lag behind it.
        let current: Vec<Customer> = scope
            .write
            .query(
                &format!("{SELECT_CUSTOMER} WHERE id = ?1"),
                vec![Value::Integer(request.id)],
                cancel,
            )
            .await?;
        let Some(mut customer) = current.into_iter().next() else {
            return Err(DataError::ConcurrencyConflict {
                table: Customer::TABLE,
                key: request.id.to_string(),
            }
            .into());
        };

        customer.name = name;
        customer.row_version = request.expected_version;
        scope.write.update(&customer)?;
        scope.write.commit(cancel).await?;

        customer.row_version += 1;
        Ok(scope.mapper.map(customer))
    }
}

pub struct DeleteCustomerHandler;

#[async_trait]
impl Handler for DeleteCustomerHandler {
    type Request = DeleteCustomer;

    async fn handle(
        &self,
        request: DeleteCustomer,
        scope: &mut HandlerScope,
        cancel: &CancelSignal,
    ) -> Result<usize, HandlerError> {
        let customer = Customer {
            id: Some(request.id),
            name: String::new(),
            email: None,
            row_version: request.expected_version,
        };
        scope.write.remove(&customer)?;
        Ok(scope.write.commit(cancel).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(validate_name("  Ann ").unwrap(), "Ann");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_CHARS)).is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn emails_need_both_sides_of_the_at() {
        assert_eq!(validate_email(None).unwrap(), None);
        assert_eq!(validate_email(Some("  ")).unwrap(), None);
        assert_eq!(
            validate_email(Some("ann@example.com")).unwrap(),
            Some("ann@example.com".to_string())
        );
        assert!(validate_email(Some("ann")).is_err());
        assert!(validate_email(Some("@example.com")).is_err());
        assert!(validate_email(Some("ann@")).is_err());
    }

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(escape_like("An"), "An%");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\%");
    }
}
