//! Serialized snapshot shapes written to and read from the snapshot store.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::state::queue::{
    Counter, CounterStatus, QueueSnapshot, QueueStore, Ticket, TicketStatus,
};

/// Persisted form of the whole queue state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStateEntity {
    /// All tickets in queue order.
    pub tickets: Vec<TicketEntity>,
    /// All counters in creation order.
    pub counters: Vec<CounterEntity>,
    /// High-water mark for ticket numbering.
    pub last_ticket_number: u64,
}

/// Persisted form of a single ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketEntity {
    /// Ticket number.
    pub id: u64,
    /// Creation instant as milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    /// Lifecycle state at snapshot time.
    pub status: TicketStatusEntity,
    /// Service category chosen at the kiosk.
    pub service_type: String,
    /// Counter the ticket was called to, once called.
    #[serde(default)]
    pub counter_number: Option<u32>,
    /// Counter currently or last serving this ticket.
    #[serde(default)]
    pub served_by: Option<u32>,
    /// Optional name captured at the kiosk.
    #[serde(default)]
    pub customer_name: Option<String>,
}

/// Persisted form of a counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterEntity {
    /// Counter number shown on displays.
    pub id: u32,
    /// Whether the counter was mid-service at snapshot time.
    pub busy: bool,
    /// The ticket being served, while busy.
    #[serde(default)]
    pub current_ticket: Option<u64>,
    /// Staffing status.
    pub status: CounterStatusEntity,
}

/// On-disk ticket status tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatusEntity {
    /// Waiting to be called.
    Waiting,
    /// Being served at a counter.
    Serving,
    /// Service finished.
    Complete,
    /// Withdrawn before being called.
    Cancelled,
}

/// On-disk counter status tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CounterStatusEntity {
    /// Staffed and taking customers.
    Active,
    /// Closed.
    Inactive,
    /// Temporarily away.
    Break,
}

impl From<TicketStatus> for TicketStatusEntity {
    fn from(status: TicketStatus) -> Self {
        match status {
            TicketStatus::Waiting => Self::Waiting,
            TicketStatus::Serving => Self::Serving,
            TicketStatus::Complete => Self::Complete,
            TicketStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl From<TicketStatusEntity> for TicketStatus {
    fn from(status: TicketStatusEntity) -> Self {
        match status {
            TicketStatusEntity::Waiting => Self::Waiting,
            TicketStatusEntity::Serving => Self::Serving,
            TicketStatusEntity::Complete => Self::Complete,
            TicketStatusEntity::Cancelled => Self::Cancelled,
        }
    }
}

impl From<CounterStatus> for CounterStatusEntity {
    fn from(status: CounterStatus) -> Self {
        match status {
            CounterStatus::Active => Self::Active,
            CounterStatus::Inactive => Self::Inactive,
            CounterStatus::Break => Self::Break,
        }
    }
}

impl From<CounterStatusEntity> for CounterStatus {
    fn from(status: CounterStatusEntity) -> Self {
        match status {
            CounterStatusEntity::Active => Self::Active,
            CounterStatusEntity::Inactive => Self::Inactive,
            CounterStatusEntity::Break => Self::Break,
        }
    }
}

impl From<Ticket> for TicketEntity {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            created_at_ms: system_time_to_ms(ticket.created_at),
            status: ticket.status.into(),
            service_type: ticket.service_type,
            counter_number: ticket.counter_number,
            served_by: ticket.served_by,
            customer_name: ticket.customer_name,
        }
    }
}

impl From<TicketEntity> for Ticket {
    fn from(entity: TicketEntity) -> Self {
        Self {
            id: entity.id,
            created_at: ms_to_system_time(entity.created_at_ms),
            status: entity.status.into(),
            service_type: entity.service_type,
            counter_number: entity.counter_number,
            served_by: entity.served_by,
            customer_name: entity.customer_name,
        }
    }
}

impl From<Counter> for CounterEntity {
    fn from(counter: Counter) -> Self {
        Self {
            id: counter.id,
            busy: counter.busy,
            current_ticket: counter.current_ticket,
            status: counter.status.into(),
        }
    }
}

impl From<CounterEntity> for Counter {
    fn from(entity: CounterEntity) -> Self {
        Self {
            id: entity.id,
            busy: entity.busy,
            current_ticket: entity.current_ticket,
            status: entity.status.into(),
        }
    }
}

impl From<QueueSnapshot> for QueueStateEntity {
    fn from(snapshot: QueueSnapshot) -> Self {
        Self {
            tickets: snapshot.tickets.into_iter().map(Into::into).collect(),
            counters: snapshot.counters.into_iter().map(Into::into).collect(),
            last_ticket_number: snapshot.last_ticket_number,
        }
    }
}

impl From<QueueStateEntity> for QueueStore {
    fn from(entity: QueueStateEntity) -> Self {
        QueueStore::from_parts(
            entity.tickets.into_iter().map(Into::into).collect(),
            entity.counters.into_iter().map(Into::into).collect(),
            entity.last_ticket_number,
        )
    }
}

fn system_time_to_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn ms_to_system_time(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}
