//! Field-rule validation of inbound requests.
//!
//! The primary API ([`SubscriptionValidator::validate`]) collapses every violation
//! into a single [`AppError::InvalidRequest`]. [`SubscriptionValidator::report`]
//! is the diagnostic form listing each offending field with a readable reason.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{AppError, AppResult};
use crate::models::{
    CostQuery, CreateSubscriptionRequest, SubscriptionListQuery, UpdateSubscriptionRequest,
};
use crate::utils::{MonthYear, is_month_year};

const SCHEMA_FIELD: &str = "__all__";

pub fn validate_month_year(value: &str) -> Result<(), ValidationError> {
    if is_month_year(value) {
        Ok(())
    } else {
        Err(ValidationError::new("month_year"))
    }
}

pub fn validate_user_id(value: &Uuid) -> Result<(), ValidationError> {
    if value.is_nil() {
        Err(ValidationError::new("required"))
    } else {
        Ok(())
    }
}

pub fn validate_create_period(req: &CreateSubscriptionRequest) -> Result<(), ValidationError> {
    let Some(end) = req.end_date.as_deref() else {
        return Ok(());
    };
    period_in_order(&req.start_date, end)
}

pub fn validate_cost_window(query: &CostQuery) -> Result<(), ValidationError> {
    period_in_order(&query.start_date, &query.end_date)
}

fn period_in_order(start: &str, end: &str) -> Result<(), ValidationError> {
    // 格式错误由字段规则负责
    let (Ok(start), Ok(end)) = (start.parse::<MonthYear>(), end.parse::<MonthYear>()) else {
        return Ok(());
    };
    if end < start {
        return Err(ValidationError::new("period_order"));
    }
    Ok(())
}

/// Offending fields mapped to human-readable reasons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    fn from_errors(errors: &ValidationErrors) -> Self {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, errs) in errors.field_errors() {
            for err in errs.iter() {
                let key = if field == SCHEMA_FIELD {
                    "end_date".to_string()
                } else {
                    field.to_string()
                };
                let reason = describe(&key, err);
                fields.entry(key).or_default().push(reason);
            }
        }
        Self { fields }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for reasons in self.fields.values() {
            for reason in reasons {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{reason}")?;
                first = false;
            }
        }
        Ok(())
    }
}

fn describe(field: &str, err: &ValidationError) -> String {
    let param = |name: &str| err.params.get(name).map(|v| v.to_string());
    match err.code.as_ref() {
        "required" => format!("{field} is required"),
        "month_year" => format!("{field} must match MM-YYYY"),
        "period_order" => format!("{field} must not precede start_date"),
        "length" | "range" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("{field} must be between {min} and {max}"),
            (Some(min), None) => format!("{field} must be at least {min}"),
            (None, Some(max)) => format!("{field} must be at most {max}"),
            (None, None) => format!("{field} is invalid"),
        },
        _ => format!("{field} is invalid"),
    }
}

/// Validation capability consumed by the subscription service.
pub trait RequestValidator: Send + Sync {
    fn check_create(&self, req: &CreateSubscriptionRequest) -> Result<(), ValidationReport>;
    fn check_update(&self, req: &UpdateSubscriptionRequest) -> Result<(), ValidationReport>;
    fn check_list(&self, query: &SubscriptionListQuery) -> Result<(), ValidationReport>;
    fn check_cost(&self, query: &CostQuery) -> Result<(), ValidationReport>;
}

/// Declarative rules from the `#[validate(...)]` attributes on the request types.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionValidator;

impl SubscriptionValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate<T: Validate>(&self, req: &T) -> AppResult<()> {
        self.report(req)
            .map_err(|report| AppError::InvalidRequest(report.to_string()))
    }

    pub fn report<T: Validate>(&self, req: &T) -> Result<(), ValidationReport> {
        req.validate()
            .map_err(|errors| ValidationReport::from_errors(&errors))
    }
}

impl RequestValidator for SubscriptionValidator {
    fn check_create(&self, req: &CreateSubscriptionRequest) -> Result<(), ValidationReport> {
        self.report(req)
    }

    fn check_update(&self, req: &UpdateSubscriptionRequest) -> Result<(), ValidationReport> {
        self.report(req)
    }

    fn check_list(&self, query: &SubscriptionListQuery) -> Result<(), ValidationReport> {
        self.report(query)
    }

    fn check_cost(&self, query: &CostQuery) -> Result<(), ValidationReport> {
        self.report(query)
    }
}
