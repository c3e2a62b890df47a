//! Wait-time estimation.
//!
//! An entry's estimate covers everyone ahead of it plus its own service:
//! `max((position - 1) * avg + avg, minimum) * priority_multiplier`.
//! Priority only scales the estimate; it never changes the position.

use shared::PriorityClass;

use crate::backend::domain::models::outlet::Outlet;

pub fn estimate_wait_secs(position: u32, outlet: &Outlet, priority: PriorityClass) -> u64 {
    let config = &outlet.configuration;
    let average = config.average_service_secs();
    let ahead = u64::from(position.saturating_sub(1));

    let base = (ahead * average + average).max(config.minimum_wait_secs());
    let multiplier = config.priority_multipliers.for_priority(priority);

    // Negative or NaN multipliers are rejected when the directory is loaded
    (base as f64 * multiplier).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::models::outlet::{
        OperatingHours, OutletConfiguration, PriorityMultipliers,
    };
    use chrono::{NaiveTime, Weekday};

    fn outlet(average_minutes: u32, minimum_minutes: u32) -> Outlet {
        Outlet {
            id: "outlet-a".to_string(),
            name: "Outlet A".to_string(),
            location: "Colombo".to_string(),
            address: "1 Main St".to_string(),
            capacity: 50,
            service_types: vec![],
            operating_hours: OperatingHours {
                open: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                close: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                days: vec![Weekday::Mon],
            },
            is_active: true,
            configuration: OutletConfiguration {
                average_service_minutes: average_minutes,
                minimum_wait_minutes: minimum_minutes,
                priority_multipliers: PriorityMultipliers::default(),
            },
        }
    }

    #[test]
    fn test_estimate_is_linear_in_position() {
        let outlet = outlet(10, 5);
        assert_eq!(estimate_wait_secs(1, &outlet, PriorityClass::Normal), 600);
        assert_eq!(estimate_wait_secs(2, &outlet, PriorityClass::Normal), 1200);
        assert_eq!(estimate_wait_secs(5, &outlet, PriorityClass::Normal), 3000);
    }

    #[test]
    fn test_estimate_is_floored_at_minimum() {
        let outlet = outlet(3, 5);
        assert_eq!(estimate_wait_secs(1, &outlet, PriorityClass::Normal), 300);
        assert_eq!(estimate_wait_secs(2, &outlet, PriorityClass::Normal), 360);
    }

    #[test]
    fn test_priority_scales_estimate() {
        let outlet = outlet(10, 5);
        assert_eq!(estimate_wait_secs(2, &outlet, PriorityClass::Vip), 600);
        assert_eq!(estimate_wait_secs(2, &outlet, PriorityClass::Senior), 960);
        assert_eq!(estimate_wait_secs(2, &outlet, PriorityClass::Disabled), 840);
    }

    #[test]
    fn test_multiplier_applies_after_floor() {
        let outlet = outlet(3, 5);
        assert_eq!(estimate_wait_secs(1, &outlet, PriorityClass::Vip), 150);
    }
}
