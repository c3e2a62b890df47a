use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveTime, Weekday};
use shared::{
    OperatingHours as SharedOperatingHours, Outlet as SharedOutlet, OutletListResponse,
    PriorityMultipliers as SharedPriorityMultipliers, ServiceType as SharedServiceType,
    ServiceTypeListResponse,
};

use crate::backend::domain::models::outlet::{
    OperatingHours, Outlet, OutletConfiguration, PriorityMultipliers, ServiceType,
};

const TIME_FORMAT: &str = "%H:%M";

/// Mapper to convert between shared outlet DTOs and domain outlet models.
pub struct OutletMapper;

impl OutletMapper {
    /// Converts a shared Outlet DTO to a domain Outlet, validating everything
    /// the queue relies on.
    pub fn to_domain(dto: SharedOutlet) -> Result<Outlet> {
        if !Outlet::is_valid_id(&dto.id) {
            bail!(
                "Outlet id '{}' must be 1-64 characters of letters, digits, '-' or '_'",
                dto.id
            );
        }
        if dto.capacity == 0 {
            bail!("Outlet {} must have a capacity of at least 1", dto.id);
        }
        if dto.average_service_minutes == 0 {
            bail!("Outlet {} must have a positive average service time", dto.id);
        }

        let operating_hours = Self::hours_to_domain(dto.operating_hours)
            .with_context(|| format!("Invalid operating hours for outlet {}", dto.id))?;
        let priority_multipliers = Self::multipliers_to_domain(dto.priority_multipliers)
            .with_context(|| format!("Invalid priority multipliers for outlet {}", dto.id))?;

        Ok(Outlet {
            id: dto.id,
            name: dto.name,
            location: dto.location,
            address: dto.address,
            capacity: dto.capacity,
            service_types: dto.service_types,
            operating_hours,
            is_active: dto.is_active,
            configuration: OutletConfiguration {
                average_service_minutes: dto.average_service_minutes,
                minimum_wait_minutes: dto.minimum_wait_minutes,
                priority_multipliers,
            },
        })
    }

    /// Converts a domain Outlet to a shared Outlet DTO.
    pub fn to_dto(domain: Outlet) -> SharedOutlet {
        SharedOutlet {
            id: domain.id,
            name: domain.name,
            location: domain.location,
            address: domain.address,
            capacity: domain.capacity,
            service_types: domain.service_types,
            operating_hours: SharedOperatingHours {
                open: domain.operating_hours.open.format(TIME_FORMAT).to_string(),
                close: domain.operating_hours.close.format(TIME_FORMAT).to_string(),
                days: domain
                    .operating_hours
                    .days
                    .iter()
                    .map(|day| weekday_name(*day).to_string())
                    .collect(),
            },
            is_active: domain.is_active,
            average_service_minutes: domain.configuration.average_service_minutes,
            minimum_wait_minutes: domain.configuration.minimum_wait_minutes,
            priority_multipliers: SharedPriorityMultipliers {
                vip: domain.configuration.priority_multipliers.vip,
                senior: domain.configuration.priority_multipliers.senior,
                disabled: domain.configuration.priority_multipliers.disabled,
            },
        }
    }

    pub fn to_outlet_list_dto(outlets: Vec<Outlet>) -> OutletListResponse {
        OutletListResponse {
            outlets: outlets.into_iter().map(Self::to_dto).collect(),
        }
    }

    pub fn service_type_to_domain(dto: SharedServiceType) -> Result<ServiceType> {
        if dto.id.trim().is_empty() {
            bail!("Service type id cannot be empty");
        }
        Ok(ServiceType {
            id: dto.id,
            name: dto.name,
            description: dto.description,
            category: dto.category,
            estimated_minutes: dto.estimated_minutes,
            is_active: dto.is_active,
        })
    }

    pub fn service_type_to_dto(domain: ServiceType) -> SharedServiceType {
        SharedServiceType {
            id: domain.id,
            name: domain.name,
            description: domain.description,
            category: domain.category,
            estimated_minutes: domain.estimated_minutes,
            is_active: domain.is_active,
        }
    }

    pub fn to_service_type_list_dto(service_types: Vec<ServiceType>) -> ServiceTypeListResponse {
        ServiceTypeListResponse {
            total_count: service_types.len(),
            service_types: service_types.into_iter().map(Self::service_type_to_dto).collect(),
        }
    }

    fn hours_to_domain(dto: SharedOperatingHours) -> Result<OperatingHours> {
        let open = NaiveTime::parse_from_str(&dto.open, TIME_FORMAT)
            .with_context(|| format!("Bad open time '{}'", dto.open))?;
        let close = NaiveTime::parse_from_str(&dto.close, TIME_FORMAT)
            .with_context(|| format!("Bad close time '{}'", dto.close))?;
        if close <= open {
            bail!("Close time {} must be after open time {}", dto.close, dto.open);
        }

        let days = dto
            .days
            .iter()
            .map(|day| {
                day.to_lowercase()
                    .parse::<Weekday>()
                    .map_err(|_| anyhow!("Unknown weekday '{}'", day))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(OperatingHours { open, close, days })
    }

    fn multipliers_to_domain(dto: SharedPriorityMultipliers) -> Result<PriorityMultipliers> {
        for (name, value) in [("vip", dto.vip), ("senior", dto.senior), ("disabled", dto.disabled)] {
            if !value.is_finite() || value < 0.0 {
                bail!("Multiplier {} must be a non-negative number, got {}", name, value);
            }
        }
        Ok(PriorityMultipliers {
            vip: dto.vip,
            senior: dto.senior,
            disabled: dto.disabled,
        })
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
