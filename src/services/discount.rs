//! Discount code service

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{info, debug};
use crate::database::repositories::DiscountRepository;
use crate::models::discount::{DiscountCode, CreateDiscountRequest, UpdateDiscountRequest, DiscountType};
use crate::utils::errors::{ShopError, Result};
use crate::utils::helpers::calculate_offset;
use crate::utils::validators::{parse_amount, parse_flag};

pub const DISCOUNTS_PER_PAGE: i64 = 10;
pub const DATE_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Clone)]
pub struct DiscountService {
    discount_repository: DiscountRepository,
}

impl DiscountService {
    pub fn new(discount_repository: DiscountRepository) -> Self {
        Self { discount_repository }
    }

    pub async fn create(&self, request: CreateDiscountRequest) -> Result<DiscountCode> {
        let request = normalize_request(request)?;
        let code = request.code.clone();

        let discount = self
            .discount_repository
            .create(request)
            .await?
            .ok_or_else(|| ShopError::InvalidInput(format!("discount code {} already exists", code)))?;

        info!(discount_id = discount.id, code = %discount.code, "Discount code created");
        Ok(discount)
    }

    pub async fn get(&self, id: i64) -> Result<DiscountCode> {
        self.discount_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ShopError::InvalidInput(format!("discount {} not found", id)))
    }

    /// Look up a code typed by a user and check it can be applied at `now`
    pub async fn validate(&self, code: &str, now: DateTime<Utc>) -> Result<DiscountCode> {
        let code = code.trim();
        debug!(code = %code, "Validating discount code");

        let discount = self
            .discount_repository
            .find_by_code(code)
            .await?
            .ok_or_else(|| ShopError::DiscountInvalid("code not found".to_string()))?;

        check_applicable(&discount, now)?;
        Ok(discount)
    }

    /// Count one use; fails when the code ran out in the meantime
    pub async fn use_code(&self, id: i64) -> Result<()> {
        if !self.discount_repository.increment_use(id).await? {
            return Err(ShopError::DiscountInvalid("code has no uses left".to_string()));
        }
        Ok(())
    }

    /// Give back a use held by an order that failed or was rejected
    pub async fn release_code(&self, code: &str) -> Result<()> {
        if self.discount_repository.release_use_by_code(code).await? {
            debug!(code = %code, "Discount use released");
        }
        Ok(())
    }

    /// Change some fields of a code, keeping the rules `create` enforces
    pub async fn update(&self, id: i64, mut request: UpdateDiscountRequest) -> Result<DiscountCode> {
        let current = self.get(id).await?;
        let merged = normalize_request(merge_update(&current, &request)?)?;

        if request.code.is_some() {
            if let Some(other) = self.discount_repository.find_by_code(&merged.code).await? {
                if other.id != id {
                    return Err(ShopError::InvalidInput(format!("discount code {} already exists", merged.code)));
                }
            }
            request.code = Some(merged.code);
        }

        let discount = self
            .discount_repository
            .update(id, request)
            .await?
            .ok_or_else(|| ShopError::InvalidInput(format!("discount {} not found", id)))?;
        info!(discount_id = id, code = %discount.code, "Discount code updated");
        Ok(discount)
    }

    pub async fn list(&self, page: i64) -> Result<Vec<DiscountCode>> {
        self.discount_repository
            .list(DISCOUNTS_PER_PAGE, calculate_offset(page, DISCOUNTS_PER_PAGE))
            .await
    }

    pub async fn count(&self) -> Result<i64> {
        self.discount_repository.count().await
    }

    pub async fn toggle_active(&self, id: i64) -> Result<DiscountCode> {
        let discount = self
            .discount_repository
            .toggle_active(id)
            .await?
            .ok_or_else(|| ShopError::InvalidInput(format!("discount {} not found", id)))?;
        info!(discount_id = id, is_active = discount.is_active, "Discount code toggled");
        Ok(discount)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.discount_repository.delete(id).await? {
            return Err(ShopError::InvalidInput(format!("discount {} not found", id)));
        }
        info!(discount_id = id, "Discount code deleted");
        Ok(())
    }
}

fn normalize_request(mut request: CreateDiscountRequest) -> Result<CreateDiscountRequest> {
    request.code = request.code.trim().to_uppercase();
    if request.code.is_empty() || request.code.chars().any(char::is_whitespace) {
        return Err(ShopError::InvalidInput("code must be a single word".to_string()));
    }

    match request.discount_type {
        DiscountType::Percentage if !(1..=100).contains(&request.discount_value) => {
            return Err(ShopError::InvalidInput("percentage must be between 1 and 100".to_string()));
        }
        DiscountType::Fixed if request.discount_value <= 0 => {
            return Err(ShopError::InvalidInput("fixed discount must be positive".to_string()));
        }
        _ => {}
    }

    if request.max_uses < 0 {
        return Err(ShopError::InvalidInput("max uses cannot be negative".to_string()));
    }

    if let (Some(from), Some(until)) = (request.valid_from, request.valid_until) {
        if from > until {
            return Err(ShopError::InvalidInput("validity window ends before it starts".to_string()));
        }
    }

    Ok(request)
}

/// The stored code with the edit applied, for validation
fn merge_update(current: &DiscountCode, request: &UpdateDiscountRequest) -> Result<CreateDiscountRequest> {
    let discount_type = match request.discount_type {
        Some(kind) => kind,
        None => current.kind().ok_or_else(|| {
            ShopError::InvalidInput(format!("stored discount type {} is unknown", current.discount_type))
        })?,
    };

    Ok(CreateDiscountRequest {
        code: request.code.clone().unwrap_or_else(|| current.code.clone()),
        description: request.description.clone().or_else(|| current.description.clone()),
        discount_type,
        discount_value: request.discount_value.unwrap_or(current.discount_value),
        max_uses: request.max_uses.unwrap_or(current.max_uses),
        valid_from: request.valid_from.or(current.valid_from),
        valid_until: request.valid_until.or(current.valid_until),
    })
}

/// Reasons a stored code cannot be used right now
pub fn check_applicable(discount: &DiscountCode, now: DateTime<Utc>) -> Result<()> {
    if !discount.is_active {
        return Err(ShopError::DiscountInvalid("code is inactive".to_string()));
    }
    if discount.valid_from.is_some_and(|from| now < from) {
        return Err(ShopError::DiscountInvalid("code is not valid yet".to_string()));
    }
    if discount.valid_until.is_some_and(|until| now > until) {
        return Err(ShopError::DiscountInvalid("code has expired".to_string()));
    }
    if !discount.has_uses_left() {
        return Err(ShopError::DiscountInvalid("code has no uses left".to_string()));
    }
    Ok(())
}

/// Amount taken off `amount` by a discount of the given kind
pub fn discount_amount(kind: DiscountType, value: i64, amount: i64) -> i64 {
    if amount <= 0 || value <= 0 {
        return 0;
    }
    match kind {
        DiscountType::Percentage => amount * value.min(100) / 100,
        DiscountType::Fixed => value.min(amount),
    }
}

pub fn calculate_discount(discount: &DiscountCode, amount: i64) -> i64 {
    match discount.kind() {
        Some(kind) => discount_amount(kind, discount.discount_value, amount),
        None => 0,
    }
}

fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), DATE_INPUT_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ShopError::InvalidInput(format!("dates use the form YYYY-MM-DD HH:MM, got {}", value.trim())))
}

fn present<'a>(value: Option<&&'a str>) -> Option<&'a str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty() && *v != "-")
}

/// Parse the admin's discount form
///
/// Lines: code, type (`percentage` or `fixed`), value, then optionally
/// description, max uses, valid-from and valid-until.
pub fn parse_discount_form(text: &str) -> Result<CreateDiscountRequest> {
    let lines: Vec<&str> = text.lines().collect();
    let required: Vec<&str> = lines.iter().take(3).map(|l| l.trim()).collect();
    if required.len() < 3 || required.iter().any(|l| l.is_empty()) {
        return Err(ShopError::InvalidInput("code, type and value are required".to_string()));
    }

    let discount_type: DiscountType = required[1].to_lowercase().parse()?;
    let discount_value = parse_amount(required[2])
        .ok_or_else(|| ShopError::InvalidInput("value must be a number".to_string()))?;

    let max_uses = match present(lines.get(4)) {
        Some(value) => parse_amount(value)
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| ShopError::InvalidInput("max uses must be a number".to_string()))?,
        None => 0,
    };

    let request = CreateDiscountRequest {
        code: required[0].to_string(),
        description: present(lines.get(3)).map(str::to_string),
        discount_type,
        discount_value,
        max_uses,
        valid_from: present(lines.get(5)).map(parse_date).transpose()?,
        valid_until: present(lines.get(6)).map(parse_date).transpose()?,
    };

    normalize_request(request)
}

/// Parse a single-field edit in the form `N. value`
///
/// Fields follow the creation form: 1 code, 2 type, 3 value, 4 description,
/// 5 max uses, 6 valid from, 7 valid until, 8 active.
pub fn parse_discount_edit(text: &str) -> Result<UpdateDiscountRequest> {
    let (number, value) = text
        .trim()
        .split_once('.')
        .ok_or_else(|| ShopError::InvalidInput("expected `N. value`".to_string()))?;
    let field = parse_amount(number)
        .ok_or_else(|| ShopError::InvalidInput(format!("field number must be a number, got {}", number.trim())))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ShopError::InvalidInput("value is empty".to_string()));
    }

    let mut request = UpdateDiscountRequest::default();
    match field {
        1 => request.code = Some(value.to_string()),
        2 => request.discount_type = Some(value.to_lowercase().parse()?),
        3 => {
            request.discount_value = Some(
                parse_amount(value).ok_or_else(|| ShopError::InvalidInput("value must be a number".to_string()))?,
            )
        }
        4 => request.description = Some(value.to_string()),
        5 => {
            request.max_uses = Some(
                parse_amount(value)
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| ShopError::InvalidInput("max uses must be a number".to_string()))?,
            )
        }
        6 => request.valid_from = Some(parse_date(value)?),
        7 => request.valid_until = Some(parse_date(value)?),
        8 => request.is_active = Some(parse_flag(value)),
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
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn code(kind: &str, value: i64) -> DiscountCode {
        DiscountCode {
            id: 1,
            code: "SPRING".to_string(),
            description: None,
            discount_type: kind.to_string(),
            discount_value: value,
            max_uses: 0,
            used_count: 0,
            valid_from: None,
            valid_until: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_percentage_and_fixed() {
        assert_eq!(calculate_discount(&code("percentage", 20), 150_000), 30_000);
        assert_eq!(calculate_discount(&code("percentage", 33), 100), 33);
        assert_eq!(calculate_discount(&code("percentage", 15), 99), 14);
        assert_eq!(calculate_discount(&code("fixed", 50_000), 150_000), 50_000);
        assert_eq!(calculate_discount(&code("fixed", 500_000), 150_000), 150_000);
        assert_eq!(calculate_discount(&code("bogus", 10), 1000), 0);
    }

    #[test]
    fn test_check_applicable() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut discount = code("percentage", 10);
        assert!(check_applicable(&discount, now).is_ok());

        discount.valid_from = Some(now + Duration::hours(1));
        assert_matches!(check_applicable(&discount, now), Err(ShopError::DiscountInvalid(_)));

        discount.valid_from = Some(now - Duration::days(1));
        discount.valid_until = Some(now - Duration::minutes(1));
        assert_matches!(check_applicable(&discount, now), Err(ShopError::DiscountInvalid(_)));

        discount.valid_until = Some(now);
        assert!(check_applicable(&discount, now).is_ok());

        discount.max_uses = 3;
        discount.used_count = 3;
        assert_matches!(check_applicable(&discount, now), Err(ShopError::DiscountInvalid(_)));

        discount.used_count = 0;
        discount.is_active = false;
        assert_matches!(check_applicable(&discount, now), Err(ShopError::DiscountInvalid(_)));
    }

    #[test]
    fn test_parse_discount_form() {
        let text = "spring24\npercentage\n20\nSpring sale\n100\n2024-03-20 00:00\n2024-04-20 23:59";
        let request = parse_discount_form(text).unwrap();
        assert_eq!(request.code, "SPRING24");
        assert_eq!(request.discount_type, DiscountType::Percentage);
        assert_eq!(request.discount_value, 20);
        assert_eq!(request.description.as_deref(), Some("Spring sale"));
        assert_eq!(request.max_uses, 100);
        assert_eq!(request.valid_from, Some(Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap()));
        assert_eq!(request.valid_until, Some(Utc.with_ymd_and_hms(2024, 4, 20, 23, 59, 0).unwrap()));
    }

    #[test]
    fn test_parse_discount_form_minimal_and_errors() {
        let request = parse_discount_form("OFF\nfixed\n50,000").unwrap();
        assert_eq!(request.max_uses, 0);
        assert_eq!(request.valid_until, None);

        assert_matches!(parse_discount_form("OFF\nfixed"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_discount_form("OFF\nhalf\n10"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_discount_form("OFF\npercentage\n150"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_discount_form("OFF\nfixed\n0"), Err(ShopError::InvalidInput(_)));
        assert_matches!(
            parse_discount_form("OFF\nfixed\n10\n-\n-\n2024/01/01"),
            Err(ShopError::InvalidInput(_))
        );
        assert_matches!(
            parse_discount_form("OFF\nfixed\n10\n\n\n2024-05-01 00:00\n2024-04-01 00:00"),
            Err(ShopError::InvalidInput(_))
        );
    }

    #[test]
    fn test_parse_discount_edit() {
        assert_eq!(
            parse_discount_edit("1. summer").unwrap(),
            UpdateDiscountRequest { code: Some("summer".to_string()), ..Default::default() }
        );
        assert_eq!(parse_discount_edit("2. Fixed").unwrap().discount_type, Some(DiscountType::Fixed));
        assert_eq!(parse_discount_edit("3. 25,000").unwrap().discount_value, Some(25_000));
        assert_eq!(parse_discount_edit("5. ۵۰").unwrap().max_uses, Some(50));
        assert_eq!(
            parse_discount_edit("7. 2024-12-31 23:59").unwrap().valid_until,
            Some(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap())
        );
        assert_eq!(parse_discount_edit("8. no").unwrap().is_active, Some(false));
    }

    #[test]
    fn test_parse_discount_edit_errors() {
        assert_matches!(parse_discount_edit("summer"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_discount_edit("9. x"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_discount_edit("2. half"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_discount_edit("6. tomorrow"), Err(ShopError::InvalidInput(_)));
        assert_matches!(parse_discount_edit("4. "), Err(ShopError::InvalidInput(_)));
    }

    #[test]
    fn test_merge_update_keeps_type_rules() {
        let current = code("fixed", 50_000);
        let to_percentage = UpdateDiscountRequest {
            discount_type: Some(DiscountType::Percentage),
            ..Default::default()
        };
        // 50,000 is no valid percentage
        let merged = merge_update(&current, &to_percentage).unwrap();
        assert_matches!(normalize_request(merged), Err(ShopError::InvalidInput(_)));

        let with_value = UpdateDiscountRequest { discount_value: Some(30), ..to_percentage };
        let merged = normalize_request(merge_update(&current, &with_value).unwrap()).unwrap();
        assert_eq!(merged.discount_type, DiscountType::Percentage);
        assert_eq!(merged.code, "SPRING");
    }

    proptest! {
        #[test]
        fn prop_discount_never_exceeds_amount(amount in 0i64..1_000_000_000, value in 0i64..2_000_000_000) {
            let pct = discount_amount(DiscountType::Percentage, value, amount);
            let fixed = discount_amount(DiscountType::Fixed, value, amount);
            prop_assert!(pct >= 0 && pct <= amount);
            prop_assert!(fixed >= 0 && fixed <= amount);
        }

        #[test]
        fn prop_full_percentage_is_free(amount in 1i64..1_000_000_000) {
            prop_assert_eq!(discount_amount(DiscountType::Percentage, 100, amount), amount);
        }
    }
}
