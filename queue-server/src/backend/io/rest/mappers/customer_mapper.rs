use shared::{
    Feedback as SharedFeedback, QueueEntry, RegisterCustomerRequest, RegisterCustomerResponse,
    SubmitFeedbackRequest, SubmitFeedbackResponse, UpdateStatusRequest, UpdateStatusResponse,
};

use crate::backend::domain::commands::admission::RegisterCustomerCommand;
use crate::backend::domain::commands::transitions::{SubmitFeedbackCommand, TransitionCommand};
use crate::backend::domain::models::customer::Customer;
use shared::CustomerStatus;

/// Mapper between customer DTOs and domain commands/models.
pub struct CustomerMapper;

impl CustomerMapper {
    pub fn to_register_command(request: RegisterCustomerRequest) -> RegisterCustomerCommand {
        RegisterCustomerCommand {
            name: request.name,
            contact: request.phone_number,
            email: request.email,
            service_type: request.service_type,
            outlet_id: request.outlet_id,
            priority: request.priority.unwrap_or_default(),
        }
    }

    pub fn to_transition_command(customer_id: String, request: UpdateStatusRequest) -> TransitionCommand {
        TransitionCommand {
            customer_id,
            target_status: request.status,
            officer_id: request.officer_id,
        }
    }

    pub fn to_feedback_command(customer_id: String, request: SubmitFeedbackRequest) -> SubmitFeedbackCommand {
        SubmitFeedbackCommand {
            customer_id,
            rating: request.rating,
            comment: request.comment,
        }
    }

    /// Converts a domain Customer to the API entry DTO.
    pub fn to_dto(domain: Customer) -> QueueEntry {
        QueueEntry {
            id: domain.id,
            name: domain.name,
            phone_number: domain.contact,
            email: domain.email,
            service_type: domain.service_type,
            priority: domain.priority,
            outlet_id: domain.outlet_id,
            service_day: domain.service_day.format("%Y-%m-%d").to_string(),
            token_number: domain.token,
            status: domain.status,
            queue_position: domain.queue_position,
            estimated_wait_secs: domain.estimated_wait_secs,
            actual_wait_secs: domain.actual_wait_secs,
            registration_time: domain.registration_time.to_rfc3339(),
            service_start_time: domain.service_start_time.map(|t| t.to_rfc3339()),
            service_end_time: domain.service_end_time.map(|t| t.to_rfc3339()),
            cancelled_time: domain.cancelled_time.map(|t| t.to_rfc3339()),
            assigned_officer_id: domain.assigned_officer_id,
            feedback: domain.feedback.map(|f| SharedFeedback {
                rating: f.rating,
                comment: f.comment,
                submitted_at: f.submitted_at.to_rfc3339(),
            }),
        }
    }

    pub fn to_register_response(domain: Customer) -> RegisterCustomerResponse {
        let success_message = format!(
            "Registered with token {}. Estimated wait is about {} minutes.",
            domain.token,
            domain.estimated_wait_secs.div_ceil(60)
        );
        RegisterCustomerResponse {
            customer: Self::to_dto(domain),
            success_message,
        }
    }

    pub fn to_update_status_response(domain: Customer) -> UpdateStatusResponse {
        let success_message = match domain.status {
            CustomerStatus::BeingServed => format!("{} is now being served", domain.token),
            CustomerStatus::Completed => format!("Service for {} completed", domain.token),
            CustomerStatus::Cancelled => format!("{} has been cancelled", domain.token),
            CustomerStatus::Waiting => format!("{} is waiting", domain.token),
        };
        UpdateStatusResponse {
            customer: Self::to_dto(domain),
            success_message,
        }
    }

    pub fn to_feedback_response(domain: Customer) -> SubmitFeedbackResponse {
        SubmitFeedbackResponse {
            customer: Self::to_dto(domain),
            success_message: "Thank you for your feedback".to_string(),
        }
    }
}
