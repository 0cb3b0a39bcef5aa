use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::dto::{
    queue::{CounterStatusDto, QueueStateView, TicketView},
    validation::{validate_customer_name, validate_service_type},
};

/// Commands accepted from connected screens.
///
/// Messages are named events with an optional `data` payload, mirroring the
/// socket protocol the frontends already speak.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Declare the screen role; `employee` triggers counter assignment.
    #[serde(rename = "registerScreen")]
    RegisterScreen(String),
    /// Request the current queue snapshot (reply goes to the caller only).
    #[serde(rename = "getQueueState")]
    GetQueueState,
    /// Create a ticket for a waiting customer.
    #[serde(rename = "add-ticket")]
    AddTicket(AddTicketRequest),
    /// Call the next waiting ticket to the given counter.
    #[serde(rename = "callNextCustomer")]
    CallNextCustomer(CounterIdArg),
    /// Finish serving the ticket currently at the given counter.
    #[serde(rename = "completeService")]
    CompleteService(CounterIdArg),
    /// Change a counter's operational status.
    #[serde(rename = "updateCounterStatus")]
    UpdateCounterStatus(UpdateCounterStatusRequest),
    /// Keep-alive; replied to with a timestamp.
    #[serde(rename = "ping")]
    Ping,
    /// Ask for the server's reachable address details.
    #[serde(rename = "get-network-info")]
    GetNetworkInfo,
}

impl ClientMessage {
    /// Parse and validate a raw text frame.
    pub fn from_json_str(raw: &str) -> Result<Self, MessageError> {
        let message: Self = serde_json::from_str(raw)?;
        match &message {
            Self::AddTicket(request) => request.validate()?,
            Self::UpdateCounterStatus(request) => request.validate()?,
            _ => {}
        }
        Ok(message)
    }

    /// Event name used in logs and command acks.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::RegisterScreen(_) => "registerScreen",
            Self::GetQueueState => "getQueueState",
            Self::AddTicket(_) => "add-ticket",
            Self::CallNextCustomer(_) => "callNextCustomer",
            Self::CompleteService(_) => "completeService",
            Self::UpdateCounterStatus(_) => "updateCounterStatus",
            Self::Ping => "ping",
            Self::GetNetworkInfo => "get-network-info",
        }
    }
}

/// Failure to parse or validate an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The frame was not a recognised JSON message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The frame parsed but carried invalid payload fields.
    #[error("invalid payload: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Payload of `add-ticket`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddTicketRequest {
    /// Free-form service category ("general", "financial", ...).
    pub service_type: String,
    /// Optional display label for call-out screens.
    #[serde(default)]
    pub customer_name: Option<String>,
}

impl Validate for AddTicketRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_service_type(&self.service_type) {
            errors.add("serviceType", e);
        }
        if let Some(name) = &self.customer_name {
            if let Err(e) = validate_customer_name(name) {
                errors.add("customerName", e);
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Counter id argument accepted either bare (`4`) or wrapped
/// (`{"counterId": 4}`); older desk clients send the bare form.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[serde(untagged)]
pub enum CounterIdArg {
    /// Bare integer payload.
    Bare(u32),
    /// Object payload.
    Object {
        /// The claimed counter id.
        #[serde(rename = "counterId")]
        counter_id: u32,
    },
}

impl CounterIdArg {
    /// The claimed counter id, whichever shape carried it.
    pub fn value(self) -> u32 {
        match self {
            Self::Bare(id) => id,
            Self::Object { counter_id } => counter_id,
        }
    }
}

/// Payload of `updateCounterStatus`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCounterStatusRequest {
    /// The counter being updated; must match the caller's assignment.
    pub counter_id: u32,
    /// The staffing status to set.
    pub status: CounterStatusDto,
}

impl Validate for UpdateCounterStatusRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.counter_id == 0 {
            let mut err = ValidationError::new("counter_id_zero");
            err.message = Some("counterId must be a positive integer".into());
            errors.add("counterId", err);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Events pushed to connected screens.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Full state, sent on connect and after every mutation.
    #[serde(rename = "queueState")]
    QueueState(QueueStateView),
    /// Lightweight notification that a ticket joined the queue.
    #[serde(rename = "ticketAdded")]
    TicketAdded(TicketView),
    /// Paced public call-out emitted by the announcement scheduler.
    #[serde(rename = "ticketCalled")]
    TicketCalled(TicketCalledEvent),
    /// A counter finished serving its ticket.
    #[serde(rename = "ticketCompleted")]
    TicketCompleted(TicketCompletedEvent),
    /// A counter changed operational status.
    #[serde(rename = "counterStatusChanged")]
    CounterStatusChanged(CounterStatusChangedEvent),
    /// Counter id granted to a newly registered employee screen.
    #[serde(rename = "assignedCounterId")]
    AssignedCounterId(u32),
    /// Per-command acknowledgement sent to the issuing connection only.
    #[serde(rename = "commandResult")]
    CommandResult(CommandResult),
    /// Keep-alive reply.
    #[serde(rename = "pong")]
    Pong(PongPayload),
    /// Server address details for kiosk provisioning.
    #[serde(rename = "networkInfo")]
    NetworkInfo(NetworkInfo),
}

/// Payload of `ticketCalled`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketCalledEvent {
    /// Snapshot of the ticket as it was called.
    pub ticket: TicketView,
    /// Counter the customer is called to.
    pub counter_id: u32,
    /// Broadcast instant, RFC 3339.
    pub timestamp: String,
}

/// Payload of `ticketCompleted`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketCompletedEvent {
    /// The finished ticket.
    pub ticket_id: u64,
    /// The counter that finished it.
    pub counter_id: u32,
}

/// Payload of `counterStatusChanged`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CounterStatusChangedEvent {
    /// The counter whose status changed.
    pub counter_id: u32,
    /// Its new staffing status.
    pub status: CounterStatusDto,
}

/// Acknowledgement for a single command.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    /// Event name of the command being acknowledged.
    pub request: String,
    /// Whether the command was applied.
    pub success: bool,
    /// The ticket a successful `add-ticket`/`callNextCustomer` produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<TicketView>,
    /// User-facing message explaining a rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    /// Successful ack without a ticket payload.
    pub fn ok(request: &str) -> Self {
        Self {
            request: request.to_string(),
            success: true,
            ticket: None,
            error: None,
        }
    }

    /// Successful ack carrying the affected ticket.
    pub fn ok_with_ticket(request: &str, ticket: TicketView) -> Self {
        Self {
            request: request.to_string(),
            success: true,
            ticket: Some(ticket),
            error: None,
        }
    }

    /// Failed ack with a user-facing message.
    pub fn err(request: &str, error: impl Into<String>) -> Self {
        Self {
            request: request.to_string(),
            success: false,
            ticket: None,
            error: Some(error.into()),
        }
    }
}

/// Payload of `pong`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PongPayload {
    /// Milliseconds since the Unix epoch, for client latency estimates.
    pub timestamp: u64,
}

/// Payload of `networkInfo`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    /// Best-guess LAN address clients can reach the server on.
    pub local_ip: String,
    /// Whether the address lookup found a routable interface.
    pub is_connected: bool,
    /// Port the backend is listening on.
    pub server_port: u16,
}
