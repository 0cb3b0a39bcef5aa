use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::format_system_time,
    state::queue::{Counter, CounterStatus, QueueSnapshot, Ticket, TicketStatus},
};

/// Wire form of a ticket status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatusDto {
    Waiting,
    Serving,
    Complete,
    Cancelled,
}

/// Wire form of a counter's operational status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CounterStatusDto {
    Active,
    Inactive,
    Break,
}

/// Snapshot of a single ticket as pushed to clients.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketView {
    /// Ticket number shown to the customer.
    pub id: u64,
    /// Creation instant, RFC 3339.
    pub timestamp: String,
    /// Lifecycle state.
    pub status: TicketStatusDto,
    /// Service category chosen at the kiosk.
    pub service_type: String,
    /// Counter the ticket was called to, once called.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_number: Option<u32>,
    /// Counter currently or last serving this ticket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_by_counter_id: Option<u32>,
    /// Optional display label for call-out screens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
}

/// Snapshot of a single counter as pushed to clients.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CounterView {
    /// Counter number shown on displays.
    pub id: u32,
    /// Whether the counter is mid-service.
    pub busy: bool,
    /// The ticket being served, while busy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_ticket: Option<u64>,
    /// Staffing status.
    pub status: CounterStatusDto,
}

/// Full queue state pushed on connect and after every mutation.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueStateView {
    /// All tickets, oldest first.
    pub tickets: Vec<TicketView>,
    /// All counters, in creation order.
    pub counters: Vec<CounterView>,
    /// High-water mark for ticket numbering.
    pub last_ticket_number: u64,
}

impl From<TicketStatus> for TicketStatusDto {
    fn from(status: TicketStatus) -> Self {
        match status {
            TicketStatus::Waiting => Self::Waiting,
            TicketStatus::Serving => Self::Serving,
            TicketStatus::Complete => Self::Complete,
            TicketStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl From<CounterStatus> for CounterStatusDto {
    fn from(status: CounterStatus) -> Self {
        match status {
            CounterStatus::Active => Self::Active,
            CounterStatus::Inactive => Self::Inactive,
            CounterStatus::Break => Self::Break,
        }
    }
}

impl From<CounterStatusDto> for CounterStatus {
    fn from(status: CounterStatusDto) -> Self {
        match status {
            CounterStatusDto::Active => Self::Active,
            CounterStatusDto::Inactive => Self::Inactive,
            CounterStatusDto::Break => Self::Break,
        }
    }
}

impl From<Ticket> for TicketView {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            timestamp: format_system_time(ticket.created_at),
            status: ticket.status.into(),
            service_type: ticket.service_type,
            counter_number: ticket.counter_number,
            served_by_counter_id: ticket.served_by,
            customer_name: ticket.customer_name,
        }
    }
}

impl From<Counter> for CounterView {
    fn from(counter: Counter) -> Self {
        Self {
            id: counter.id,
            busy: counter.busy,
            current_ticket: counter.current_ticket,
            status: counter.status.into(),
        }
    }
}

impl From<QueueSnapshot> for QueueStateView {
    fn from(snapshot: QueueSnapshot) -> Self {
        Self {
            tickets: snapshot.tickets.into_iter().map(Into::into).collect(),
            counters: snapshot.counters.into_iter().map(Into::into).collect(),
            last_ticket_number: snapshot.last_ticket_number,
        }
    }
}
