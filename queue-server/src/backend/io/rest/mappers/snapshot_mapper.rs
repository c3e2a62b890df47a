use shared::{PeakHour, QueueSnapshot, ReconcileResponse};

use crate::backend::domain::commands::queries::{QueueSnapshotResult, ReconcileResult};
use crate::backend::domain::models::queue_day::QueueDay;

/// Mapper from queue aggregates to snapshot DTOs.
pub struct SnapshotMapper;

impl SnapshotMapper {
    pub fn to_dto(result: QueueSnapshotResult) -> QueueSnapshot {
        Self::from_queue_day(result.queue_day, result.next_tokens)
    }

    pub fn to_reconcile_response(result: ReconcileResult, next_tokens: Vec<String>) -> ReconcileResponse {
        ReconcileResponse {
            snapshot: Self::from_queue_day(result.queue_day, next_tokens),
            was_consistent: result.was_consistent,
        }
    }

    fn from_queue_day(queue_day: QueueDay, next_tokens: Vec<String>) -> QueueSnapshot {
        let average_wait_secs = queue_day.average_wait_secs();
        // Only hours that saw registrations
        let peak_hours = queue_day
            .peak_hours
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(hour, count)| PeakHour {
                hour: hour as u8,
                count: *count,
            })
            .collect();

        QueueSnapshot {
            outlet_id: queue_day.outlet_id,
            service_day: queue_day.service_day.format("%Y-%m-%d").to_string(),
            currently_serving: queue_day.currently_serving,
            total_waiting: queue_day.total_waiting,
            total_served: queue_day.total_served,
            total_registered: queue_day.total_registered,
            average_wait_secs,
            next_tokens,
            peak_hours,
        }
    }
}
