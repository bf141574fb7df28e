//! Plan service
//!
//! CRUD over subscription plans plus the parsers for the admin's
//! multi-line plan form and `N. value` edit messages.

use tracing::info;
use crate::database::repositories::PlanRepository;
use crate::models::plan::{Plan, CreatePlanRequest, UpdatePlanRequest};
use crate::utils::errors::{ShopError, Result};
use crate::utils::helpers::calculate_offset;
use crate::utils::validators::{normalize_digit, parse_amount, parse_flag};

pub const PLANS_PER_PAGE: i64 = 10;
pub const DEFAULT_PANEL_MODE: &str = "no_reset";

#[derive(Clone)]
pub struct PlanService {
    plan_repository: PlanRepository,
}

impl PlanService {
    pub fn new(plan_repository: PlanRepository) -> Self {
        Self { plan_repository }
    }

    pub async fn create_plan(&self, request: CreatePlanRequest) -> Result<Plan> {
        validate_plan_values(&request.name, request.days, request.traffic_gb, request.price)?;
        let plan = self.plan_repository.create(request).await?;
        info!(plan_id = plan.id, name = %plan.name, price = plan.price, "Plan created");
        Ok(plan)
    }

    pub async fn get_plan(&self, plan_id: i64) -> Result<Plan> {
        self.plan_repository
            .find_by_id(plan_id)
            .await?
            .ok_or(ShopError::PlanNotFound { plan_id })
    }

    /// Active plans as shown in the shop, cheapest first within a sort group
    pub async fn active_plans(&self) -> Result<Vec<Plan>> {
        self.plan_repository.list_active().await
    }

    pub async fn list_plans(&self, page: i64) -> Result<Vec<Plan>> {
        self.plan_repository
            .list(PLANS_PER_PAGE, calculate_offset(page, PLANS_PER_PAGE))
            .await
    }

    pub async fn count_plans(&self) -> Result<i64> {
        self.plan_repository.count().await
    }

    pub async fn count_active_plans(&self) -> Result<i64> {
        self.plan_repository.count_active().await
    }

    pub async fn update_plan(&self, plan_id: i64, request: UpdatePlanRequest) -> Result<Plan> {
        if request.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ShopError::InvalidInput("Plan name cannot be empty".to_string()));
        }
        if request.days.is_some_and(|d| d <= 0) || request.traffic_gb.is_some_and(|t| t <= 0) {
            return Err(ShopError::InvalidInput("Days and traffic must be positive".to_string()));
        }
        if request.price.is_some_and(|p| p < 0) {
            return Err(ShopError::InvalidInput("Price cannot be negative".to_string()));
        }

        let plan = self
            .plan_repository
            .update(plan_id, request)
            .await?
            .ok_or(ShopError::PlanNotFound { plan_id })?;
        info!(plan_id = plan_id, "Plan updated");
        Ok(plan)
    }

    pub async fn toggle_active(&self, plan_id: i64) -> Result<Plan> {
        let plan = self
            .plan_repository
            .toggle_active(plan_id)
            .await?
            .ok_or(ShopError::PlanNotFound { plan_id })?;
        info!(plan_id = plan_id, is_active = plan.is_active, "Plan toggled");
        Ok(plan)
    }

    pub async fn delete_plan(&self, plan_id: i64) -> Result<()> {
        if !self.plan_repository.delete(plan_id).await? {
            return Err(ShopError::PlanNotFound { plan_id });
        }
        info!(plan_id = plan_id, "Plan deleted");
        Ok(())
    }
}

fn validate_plan_values(name: &str, days: i32, traffic_gb: i32, price: i64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ShopError::InvalidInput("Plan name cannot be empty".to_string()));
    }
    if days <= 0 {
        return Err(ShopError::InvalidInput("Days must be greater than 0".to_string()));
    }
    if traffic_gb <= 0 {
        return Err(ShopError::InvalidInput("Traffic must be greater than 0".to_string()));
    }
    if price < 0 {
        return Err(ShopError::InvalidInput("Price cannot be negative".to_string()));
    }
    Ok(())
}

fn parse_int(field: &str, value: &str) -> Result<i32> {
    let normalized: String = value.trim().chars().map(normalize_digit).collect();
    normalized
        .parse::<i32>()
        .map_err(|_| ShopError::InvalidInput(format!("{} must be a whole number", field)))
}

fn parse_price(value: &str) -> Result<i64> {
    parse_amount(value).ok_or_else(|| ShopError::InvalidInput("price must be a number".to_string()))
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "-")
        .map(str::to_string)
}

/// Parse the admin's plan form
///
/// Lines: name, days, traffic GB, price, then optionally description,
/// panel mode, product name, max IPs and monthly package.
pub fn parse_plan_form(text: &str) -> Result<CreatePlanRequest> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.len() < 4 {
        return Err(ShopError::InvalidInput(
            "name, days, traffic and price are required".to_string(),
        ));
    }

    let name = lines[0].to_string();
    let days = parse_int("days", lines[1])?;
    let traffic_gb = parse_int("traffic", lines[2])?;
    let price = parse_price(lines[3])?;
    validate_plan_values(&name, days, traffic_gb, price)?;

    let max_ips = match lines.get(7) {
        Some(value) => Some(parse_int("max IPs", value)?),
        None => None,
    };

    Ok(CreatePlanRequest {
        name,
        description: optional_text(lines.get(4).copied()),
        days,
        traffic_gb,
        price,
        panel_mode: optional_text(lines.get(5).copied()),
        product_name: optional_text(lines.get(6).copied()),
        max_ips,
        monthly_package: lines.get(8).is_some_and(|v| parse_flag(v)),
        sort_order: None,
    })
}

/// Parse a single-field edit in the form `N. value`
///
/// Fields: 1 name, 2 days, 3 traffic, 4 price, 5 description, 6 panel mode,
/// 7 product name, 8 max IPs, 9 monthly package, 10 active.
pub fn parse_plan_edit(text: &str) -> Result<UpdatePlanRequest> {
    let (number, value) = text
        .trim()
        .split_once('.')
        .ok_or_else(|| ShopError::InvalidInput("expected `N. value`".to_string()))?;
    let field = parse_int("field number", number)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ShopError::InvalidInput("value is empty".to_string()));
    }

    let mut request = UpdatePlanRequest::default();
    match field {
        1 => request.name = Some(value.to_string()),
        2 => request.days = Some(parse_int("days", value)?),
        3 => request.traffic_gb = Some(parse_int("traffic", value)?),
        4 => request.price = Some(parse_price(value)?),
        5 => request.description = Some(value.to_string()),
        6 => request.panel_mode = Some(value.to_string()),
        7 => request.product_name = Some(value.to_string()),
        8 => request.max_ips = Some(parse_int("max IPs", value)?),
        9 => request.monthly_package = Some(parse_flag(value)),
        10 => request.is_active = Some(parse_flag(value)),
        other => {
            return Err(ShopError::InvalidInput(format!("unknown field number {}", other)));
        }
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_plan_form_required_only() {
        let request = parse_plan_form("Bronze\n30\n50\n150,000").unwrap();
        assert_eq!(request.name, "Bronze");
        assert_eq!(request.days, 30);
        assert_eq!(request.traffic_gb, 50);
        assert_eq!(request.price, 150_000);
        assert_eq!(request.description, None);
        assert_eq!(request.panel_mode, None);
        assert!(!request.monthly_package);
    }

    #[test]
    fn test_parse_plan_form_all_fields() {
        let text = "Gold VIP\n۹۰\n200\n450000\nFast servers\nmonthly\n-\n3\nyes";
        let request = parse_plan_form(text).unwrap();
        assert_eq!(request.days, 90);
        assert_eq!(request.description.as_deref(), Some("Fast servers"));
        assert_eq!(request.panel_mode.as_deref(), Some("monthly"));
        assert_eq!(request.product_name, None);
        assert_eq!(request.max_ips, Some(3));
        assert!(request.monthly_package);
    }

    #[test]
    fn test_parse_plan_form_rejects_missing_and_bad_values() {
        assert_matches!(parse_plan_form("Bronze\n30\n50"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_plan_form("Bronze\nthirty\n50\n1000"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_plan_form("Bronze\n0\n50\n1000"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_plan_form("Bronze\n30\n50\n-5"), Err(ShopError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_plan_edit() {
        assert_eq!(
            parse_plan_edit("1. Gold VIP").unwrap(),
            UpdatePlanRequest { name: Some("Gold VIP".to_string()), ..Default::default() }
        );
        assert_eq!(parse_plan_edit("4. 250,000").unwrap().price, Some(250_000));
        assert_eq!(parse_plan_edit("9. no").unwrap().monthly_package, Some(false));
        assert_eq!(parse_plan_edit("10. بله").unwrap().is_active, Some(true));
    }

    #[test]
    fn test_parse_plan_edit_errors() {
        assert_matches!(parse_plan_edit("Gold"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_plan_edit("12. x"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_plan_edit("2. many"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_plan_edit("1. "), Err(ShopError::InvalidInput(_)));
    }
}
