//! Agent (reseller) request service

use tracing::{info, warn};
use crate::config::settings::Settings;
use crate::database::repositories::{AgentRequestRepository, UserRepository};
use crate::handlers::keyboards;
use crate::i18n::params;
use crate::models::agent_request::{AgentRequest, AgentRequestStatus, CreateAgentRequest};
use crate::services::notification::NotificationService;
use crate::utils::errors::{ShopError, Result};
use crate::utils::helpers::escape_html;
use crate::utils::validators::{validate_email, validate_phone};

pub const PENDING_LIST_LIMIT: i64 = 20;

/// Requests per status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentRequestCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

#[derive(Clone)]
pub struct AgentService {
    agent_repository: AgentRequestRepository,
    user_repository: UserRepository,
    notification_service: NotificationService,
    settings: Settings,
}

impl AgentService {
    pub fn new(
        agent_repository: AgentRequestRepository,
        user_repository: UserRepository,
        notification_service: NotificationService,
        settings: Settings,
    ) -> Self {
        Self {
            agent_repository,
            user_repository,
            notification_service,
            settings,
        }
    }

    pub async fn create_request(&self, request: CreateAgentRequest) -> Result<AgentRequest> {
        if !self.settings.features.agent_requests {
            return Err(ShopError::ServiceUnavailable("agent requests are disabled".to_string()));
        }

        let request = normalize_request(request)?;

        if let Some(existing) = self.agent_repository.find_latest_by_user(request.user_id).await? {
            if existing.status.parse::<AgentRequestStatus>().ok() == Some(AgentRequestStatus::Pending) {
                return Err(ShopError::InvalidInput("a request is already pending".to_string()));
            }
        }

        let created = self.agent_repository.create(request).await?;
        info!(request_id = created.id, user_id = created.user_id, "Agent request submitted");

        let p = params([
            ("name", escape_html(&created.full_name)),
            ("phone", created.phone.clone()),
            ("request_id", created.id.to_string()),
        ]);
        let keyboard = keyboards::agent_review(
            self.notification_service.i18n(),
            self.notification_service.admin_language(),
            created.id,
        );
        if let Err(e) = self
            .notification_service
            .notify_admins("admin.notify.agent_request", Some(&p), Some(keyboard))
            .await
        {
            warn!(request_id = created.id, error = %e, "Could not notify admins about agent request");
        }

        Ok(created)
    }

    pub async fn get_request(&self, id: i64) -> Result<AgentRequest> {
        self.agent_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ShopError::InvalidInput(format!("agent request {} not found", id)))
    }

    /// Most recent request of a user
    pub async fn get_user_request(&self, user_id: i64) -> Result<Option<AgentRequest>> {
        self.agent_repository.find_latest_by_user(user_id).await
    }

    pub async fn pending_requests(&self) -> Result<Vec<AgentRequest>> {
        self.agent_repository.list_pending(PENDING_LIST_LIMIT).await
    }

    pub async fn count_by_status(&self) -> Result<AgentRequestCounts> {
        let mut counts = AgentRequestCounts::default();
        for (status, count) in self.agent_repository.count_by_status().await? {
            match status.parse::<AgentRequestStatus>() {
                Ok(AgentRequestStatus::Pending) => counts.pending = count,
                Ok(AgentRequestStatus::Approved) => counts.approved = count,
                Ok(AgentRequestStatus::Rejected) => counts.rejected = count,
                Err(_) => {}
            }
        }
        Ok(counts)
    }

    pub async fn approve(&self, id: i64, admin_id: i64) -> Result<AgentRequest> {
        let request = match self.agent_repository.approve(id).await? {
            Some(request) => request,
            None => return Err(self.not_pending(id, AgentRequestStatus::Approved).await),
        };

        info!(request_id = id, user_id = request.user_id, admin_id = admin_id, "Agent request approved");
        self.notify_applicant(&request, "agent.approved", None).await;
        Ok(request)
    }

    pub async fn reject(&self, id: i64, reason: &str, admin_id: i64) -> Result<AgentRequest> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ShopError::InvalidInput("a rejection reason is required".to_string()));
        }

        let request = match self.agent_repository.reject(id, reason).await? {
            Some(request) => request,
            None => return Err(self.not_pending(id, AgentRequestStatus::Rejected).await),
        };

        info!(request_id = id, user_id = request.user_id, admin_id = admin_id, "Agent request rejected");
        let p = params([("reason", escape_html(reason))]);
        self.notify_applicant(&request, "agent.rejected", Some(&p)).await;
        Ok(request)
    }

    async fn not_pending(&self, id: i64, target: AgentRequestStatus) -> ShopError {
        match self.agent_repository.find_by_id(id).await {
            Ok(Some(existing)) => ShopError::InvalidStateTransition {
                from: existing.status,
                to: target.to_string(),
            },
            Ok(None) => ShopError::InvalidInput(format!("agent request {} not found", id)),
            Err(e) => e,
        }
    }

    async fn notify_applicant(&self, request: &AgentRequest, key: &str, p: Option<&crate::i18n::TranslationParams>) {
        let user = match self.user_repository.find_by_id(request.user_id).await {
            Ok(Some(user)) => user,
            _ => return,
        };
        if let Err(e) = self
            .notification_service
            .notify_user(user.telegram_id, &user.language_code, key, p, None)
            .await
        {
            warn!(request_id = request.id, error = %e, "Could not notify applicant");
        }
    }
}

/// Trim fields, drop skipped optionals (`-`) and validate contact details
pub fn normalize_request(request: CreateAgentRequest) -> Result<CreateAgentRequest> {
    let optional = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty() && v != "-")
    };

    let full_name = request.full_name.trim().to_string();
    if full_name.chars().count() < 3 {
        return Err(ShopError::InvalidInput("full name is too short".to_string()));
    }

    let phone = request.phone.trim().to_string();
    if !validate_phone(&phone) {
        return Err(ShopError::InvalidInput("phone must look like 09xxxxxxxxx".to_string()));
    }

    let email = optional(request.email);
    if let Some(email) = &email {
        if !validate_email(email) {
            return Err(ShopError::InvalidInput("invalid email address".to_string()));
        }
    }

    Ok(CreateAgentRequest {
        user_id: request.user_id,
        full_name,
        phone,
        email,
        address: optional(request.address),
        experience: optional(request.experience),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request() -> CreateAgentRequest {
        CreateAgentRequest {
            user_id: 5,
            full_name: "  Ali Rezaei ".to_string(),
            phone: "09123456789".to_string(),
            email: Some("ali@example.com".to_string()),
            address: Some("-".to_string()),
            experience: Some(" 2 years ".to_string()),
        }
    }

    #[test]
    fn test_normalize_request() {
        let normalized = normalize_request(request()).unwrap();
        assert_eq!(normalized.full_name, "Ali Rezaei");
        assert_eq!(normalized.address, None);
        assert_eq!(normalized.experience.as_deref(), Some("2 years"));
    }

    #[test]
    fn test_invalid_contact_details() {
        let mut bad_phone = request();
        bad_phone.phone = "9123456789".to_string();
        assert_matches!(normalize_request(bad_phone), Err(ShopError::InvalidInput(_)));

        let mut bad_email = request();
        bad_email.email = Some("ali@".to_string());
        assert_matches!(normalize_request(bad_email), Err(ShopError::InvalidInput(_)));

        let mut skipped_email = request();
        skipped_email.email = Some("-".to_string());
        assert_eq!(normalize_request(skipped_email).unwrap().email, None);
    }
}
