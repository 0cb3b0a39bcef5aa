//! Authoritative in-memory queue state: tickets, counters, and the
//! transitions between them.
//!
//! A single [`QueueStore`] instance owns everything; callers serialize
//! access through the lock held by the application state. All ordering is
//! strictly first-in first-out by ticket creation.

use std::time::SystemTime;

use indexmap::IndexMap;
use thiserror::Error;

/// Counter seeded on a fresh store so single-desk deployments work with no
/// registration step at all.
pub const DEFAULT_COUNTER_ID: u32 = 1;

/// Lifecycle of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    /// Created and waiting to be called.
    Waiting,
    /// Called to a counter and being served.
    Serving,
    /// Service finished.
    Complete,
    /// Withdrawn before being called.
    Cancelled,
}

/// Availability of a counter desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterStatus {
    /// Staffed and taking customers.
    #[default]
    Active,
    /// Closed.
    Inactive,
    /// Temporarily away.
    Break,
}

/// One customer's place in the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    /// Monotonically increasing ticket number, never reused.
    pub id: u64,
    /// When the ticket was taken.
    pub created_at: SystemTime,
    /// Current lifecycle state.
    pub status: TicketStatus,
    /// Free-form service category chosen at the kiosk.
    pub service_type: String,
    /// Counter the ticket was called to, once called.
    pub counter_number: Option<u32>,
    /// Counter currently or last serving this ticket.
    pub served_by: Option<u32>,
    /// Optional name captured at the kiosk.
    pub customer_name: Option<String>,
}

/// One service desk.
#[derive(Debug, Clone, PartialEq)]
pub struct Counter {
    /// Stable small integer shown on displays.
    pub id: u32,
    /// Whether the counter is mid-service.
    pub busy: bool,
    /// The ticket being served, while busy.
    pub current_ticket: Option<u64>,
    /// Staffing status.
    pub status: CounterStatus,
}

impl Counter {
    fn idle(id: u32) -> Self {
        Self {
            id,
            busy: false,
            current_ticket: None,
            status: CounterStatus::Active,
        }
    }
}

/// Point-in-time copy of the whole queue, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    /// All tickets, oldest first.
    pub tickets: Vec<Ticket>,
    /// All counters, in creation order.
    pub counters: Vec<Counter>,
    /// High-water mark for ticket numbering.
    pub last_ticket_number: u64,
}

/// Outcome of a successful `completeService`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedService {
    /// The ticket, now marked complete.
    pub ticket: Ticket,
    /// The counter that finished it.
    pub counter_id: u32,
}

/// Rejections raised by queue transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// `callNextCustomer` found nothing to serve.
    #[error("no customers waiting in queue")]
    NoWaitingTickets,
    /// The named counter does not exist.
    #[error("counter {0} not found")]
    CounterNotFound(u32),
    /// `callNextCustomer` on a counter still serving its previous ticket.
    #[error("counter {0} is still serving a ticket; complete it first")]
    CounterBusy(u32),
    /// `completeService` on a counter that is not serving anyone.
    #[error("counter {0} has no active ticket")]
    NoActiveTicket(u32),
    /// A ticket id that is not in the store.
    #[error("ticket {0} not found")]
    TicketNotFound(u64),
    /// A counter tried to complete a ticket another counter is serving.
    #[error("ticket {ticket_id} belongs to counter {owner}, not counter {counter_id}")]
    NotOwner {
        /// The contested ticket.
        ticket_id: u64,
        /// The counter actually serving it.
        owner: u32,
        /// The counter that tried to act.
        counter_id: u32,
    },
    /// Cancellation is only valid while a ticket is still waiting.
    #[error("ticket {0} is no longer waiting and cannot be cancelled")]
    NotCancellable(u64),
}

/// The queue state store.
///
/// Insertion order of the ticket map is the queue order; `call_next` walks
/// it front to back. Counters are created lazily the first time an id is
/// used and never removed.
#[derive(Debug)]
pub struct QueueStore {
    tickets: IndexMap<u64, Ticket>,
    counters: IndexMap<u32, Counter>,
    last_ticket_number: u64,
}

impl QueueStore {
    /// Empty store with the default counter pre-seeded.
    pub fn new() -> Self {
        let mut counters = IndexMap::new();
        counters.insert(DEFAULT_COUNTER_ID, Counter::idle(DEFAULT_COUNTER_ID));
        Self {
            tickets: IndexMap::new(),
            counters,
            last_ticket_number: 0,
        }
    }

    /// Rebuild a store from persisted parts.
    ///
    /// The numbering high-water mark is clamped to the highest ticket id
    /// actually present, so numbering never collides after a restore from
    /// an inconsistent snapshot.
    pub fn from_parts(tickets: Vec<Ticket>, counters: Vec<Counter>, last_ticket_number: u64) -> Self {
        let highest = tickets.iter().map(|t| t.id).max().unwrap_or(0);
        let mut store = Self {
            tickets: tickets.into_iter().map(|t| (t.id, t)).collect(),
            counters: counters.into_iter().map(|c| (c.id, c)).collect(),
            last_ticket_number: last_ticket_number.max(highest),
        };
        if store.counters.is_empty() {
            store
                .counters
                .insert(DEFAULT_COUNTER_ID, Counter::idle(DEFAULT_COUNTER_ID));
        }
        store
    }

    /// Issue a new waiting ticket at the back of the queue.
    pub fn create_ticket(
        &mut self,
        service_type: String,
        customer_name: Option<String>,
    ) -> Ticket {
        self.last_ticket_number += 1;
        let ticket = Ticket {
            id: self.last_ticket_number,
            created_at: SystemTime::now(),
            status: TicketStatus::Waiting,
            service_type,
            counter_number: None,
            served_by: None,
            customer_name,
        };
        self.tickets.insert(ticket.id, ticket.clone());
        ticket
    }

    /// Call the oldest waiting ticket to the given counter.
    ///
    /// The counter is created on first use. A counter still serving is
    /// rejected; letting it move on would orphan its current ticket in
    /// serving state with no owner left to complete it.
    pub fn call_next(&mut self, counter_id: u32) -> Result<Ticket, QueueError> {
        if self
            .counters
            .get(&counter_id)
            .is_some_and(|counter| counter.busy)
        {
            return Err(QueueError::CounterBusy(counter_id));
        }

        let next_id = self
            .tickets
            .values()
            .find(|t| t.status == TicketStatus::Waiting)
            .map(|t| t.id)
            .ok_or(QueueError::NoWaitingTickets)?;

        let ticket = self
            .tickets
            .get_mut(&next_id)
            .ok_or(QueueError::TicketNotFound(next_id))?;
        ticket.status = TicketStatus::Serving;
        ticket.counter_number = Some(counter_id);
        ticket.served_by = Some(counter_id);
        let ticket = ticket.clone();

        let counter = self
            .counters
            .entry(counter_id)
            .or_insert_with(|| Counter::idle(counter_id));
        counter.busy = true;
        counter.current_ticket = Some(ticket.id);

        Ok(ticket)
    }

    /// Finish the ticket currently served at the given counter.
    ///
    /// Rejected unless the counter exists, is serving a ticket, and that
    /// ticket is actually owned by this counter.
    pub fn complete_service(&mut self, counter_id: u32) -> Result<CompletedService, QueueError> {
        let counter = self
            .counters
            .get(&counter_id)
            .ok_or(QueueError::CounterNotFound(counter_id))?;
        let ticket_id = counter
            .current_ticket
            .ok_or(QueueError::NoActiveTicket(counter_id))?;

        let ticket = self
            .tickets
            .get_mut(&ticket_id)
            .ok_or(QueueError::TicketNotFound(ticket_id))?;
        match ticket.served_by {
            Some(owner) if owner == counter_id => {}
            Some(owner) => {
                return Err(QueueError::NotOwner {
                    ticket_id,
                    owner,
                    counter_id,
                });
            }
            None => return Err(QueueError::NoActiveTicket(counter_id)),
        }

        ticket.status = TicketStatus::Complete;
        let ticket = ticket.clone();

        let counter = self
            .counters
            .get_mut(&counter_id)
            .ok_or(QueueError::CounterNotFound(counter_id))?;
        counter.busy = false;
        counter.current_ticket = None;

        Ok(CompletedService { ticket, counter_id })
    }

    /// Withdraw a ticket that has not been called yet.
    pub fn cancel_ticket(&mut self, ticket_id: u64) -> Result<Ticket, QueueError> {
        let ticket = self
            .tickets
            .get_mut(&ticket_id)
            .ok_or(QueueError::TicketNotFound(ticket_id))?;
        if ticket.status != TicketStatus::Waiting {
            return Err(QueueError::NotCancellable(ticket_id));
        }
        ticket.status = TicketStatus::Cancelled;
        Ok(ticket.clone())
    }

    /// Change a counter's staffing status.
    pub fn update_counter_status(
        &mut self,
        counter_id: u32,
        status: CounterStatus,
    ) -> Result<Counter, QueueError> {
        let counter = self
            .counters
            .get_mut(&counter_id)
            .ok_or(QueueError::CounterNotFound(counter_id))?;
        counter.status = status;
        Ok(counter.clone())
    }

    /// Create the counter if it does not exist yet. Returns whether a new
    /// counter was created.
    pub fn ensure_counter(&mut self, counter_id: u32) -> bool {
        if self.counters.contains_key(&counter_id) {
            return false;
        }
        self.counters.insert(counter_id, Counter::idle(counter_id));
        true
    }

    /// Copy out the full state for broadcasting or persistence.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tickets: self.tickets.values().cloned().collect(),
            counters: self.counters.values().cloned().collect(),
            last_ticket_number: self.last_ticket_number,
        }
    }
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_waiting(n: usize) -> QueueStore {
        let mut store = QueueStore::new();
        for _ in 0..n {
            store.create_ticket("general".into(), None);
        }
        store
    }

    #[test]
    fn ticket_numbers_increase_and_are_never_reused() {
        let mut store = store_with_waiting(2);
        store.call_next(1).unwrap();
        store.complete_service(1).unwrap();
        store.cancel_ticket(2).unwrap();
        let third = store.create_ticket("general".into(), None);
        assert_eq!(third.id, 3);
    }

    #[test]
    fn call_next_serves_strictly_in_arrival_order() {
        let mut store = store_with_waiting(3);
        assert_eq!(store.call_next(1).unwrap().id, 1);
        store.complete_service(1).unwrap();
        assert_eq!(store.call_next(2).unwrap().id, 2);
        assert_eq!(store.call_next(1).unwrap().id, 3);
    }

    #[test]
    fn call_next_with_nobody_waiting_is_rejected() {
        let mut store = QueueStore::new();
        assert_eq!(store.call_next(1), Err(QueueError::NoWaitingTickets));
    }

    #[test]
    fn call_next_on_a_busy_counter_is_rejected() {
        let mut store = store_with_waiting(2);
        store.call_next(1).unwrap();
        assert_eq!(store.call_next(1), Err(QueueError::CounterBusy(1)));

        // Neither the served ticket nor the waiting one moved.
        let snapshot = store.snapshot();
        assert_eq!(snapshot.counters[0].current_ticket, Some(1));
        assert_eq!(snapshot.tickets[0].status, TicketStatus::Serving);
        assert_eq!(snapshot.tickets[1].status, TicketStatus::Waiting);

        store.complete_service(1).unwrap();
        assert_eq!(store.call_next(1).unwrap().id, 2);
    }

    #[test]
    fn one_waiting_ticket_goes_to_exactly_one_counter() {
        let mut store = store_with_waiting(1);
        assert_eq!(store.call_next(1).unwrap().id, 1);
        assert_eq!(store.call_next(2), Err(QueueError::NoWaitingTickets));

        let snapshot = store.snapshot();
        let holders: Vec<_> = snapshot
            .counters
            .iter()
            .filter(|c| c.current_ticket == Some(1))
            .collect();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].id, 1);
    }

    #[test]
    fn call_next_skips_cancelled_tickets() {
        let mut store = store_with_waiting(2);
        store.cancel_ticket(1).unwrap();
        assert_eq!(store.call_next(1).unwrap().id, 2);
    }

    #[test]
    fn calling_marks_ticket_counter_and_ownership() {
        let mut store = store_with_waiting(1);
        let ticket = store.call_next(4).unwrap();
        assert_eq!(ticket.status, TicketStatus::Serving);
        assert_eq!(ticket.counter_number, Some(4));
        assert_eq!(ticket.served_by, Some(4));

        let snapshot = store.snapshot();
        let counter = snapshot.counters.iter().find(|c| c.id == 4).unwrap();
        assert!(counter.busy);
        assert_eq!(counter.current_ticket, Some(1));
    }

    #[test]
    fn complete_service_frees_the_counter() {
        let mut store = store_with_waiting(1);
        store.call_next(1).unwrap();
        let done = store.complete_service(1).unwrap();
        assert_eq!(done.ticket.status, TicketStatus::Complete);
        assert_eq!(done.counter_id, 1);

        let counter = &store.snapshot().counters[0];
        assert!(!counter.busy);
        assert_eq!(counter.current_ticket, None);
    }

    #[test]
    fn complete_service_requires_an_active_ticket() {
        let mut store = QueueStore::new();
        assert_eq!(store.complete_service(1), Err(QueueError::NoActiveTicket(1)));
        assert_eq!(store.complete_service(9), Err(QueueError::CounterNotFound(9)));
    }

    #[test]
    fn a_counter_cannot_complete_another_counters_ticket() {
        let mut store = store_with_waiting(2);
        store.call_next(1).unwrap();
        store.call_next(2).unwrap();

        // Corrupt the pointer the way a racing client would try to:
        // counter 2's active slot never references counter 1's ticket, so
        // force it for the ownership check.
        store.counters.get_mut(&2).unwrap().current_ticket = Some(1);
        assert_eq!(
            store.complete_service(2),
            Err(QueueError::NotOwner {
                ticket_id: 1,
                owner: 1,
                counter_id: 2,
            })
        );
        assert_eq!(store.tickets[&1].status, TicketStatus::Serving);
    }

    #[test]
    fn cancelled_and_serving_tickets_cannot_be_cancelled() {
        let mut store = store_with_waiting(2);
        store.call_next(1).unwrap();
        assert_eq!(store.cancel_ticket(1), Err(QueueError::NotCancellable(1)));
        store.cancel_ticket(2).unwrap();
        assert_eq!(store.cancel_ticket(2), Err(QueueError::NotCancellable(2)));
        assert_eq!(store.cancel_ticket(99), Err(QueueError::TicketNotFound(99)));
    }

    #[test]
    fn counter_status_updates_do_not_touch_service_state() {
        let mut store = store_with_waiting(1);
        store.call_next(1).unwrap();
        let counter = store
            .update_counter_status(1, CounterStatus::Break)
            .unwrap();
        assert_eq!(counter.status, CounterStatus::Break);
        assert!(counter.busy);
        assert_eq!(
            store.update_counter_status(5, CounterStatus::Active),
            Err(QueueError::CounterNotFound(5))
        );
    }

    #[test]
    fn ensure_counter_reports_creation_once() {
        let mut store = QueueStore::new();
        assert!(!store.ensure_counter(DEFAULT_COUNTER_ID));
        assert!(store.ensure_counter(2));
        assert!(!store.ensure_counter(2));
    }

    #[test]
    fn from_parts_clamps_the_numbering_high_water_mark() {
        let mut source = store_with_waiting(3);
        source.call_next(1).unwrap();
        let snapshot = source.snapshot();

        // A snapshot written before ticket 3 existed must not let ids reuse.
        let mut restored =
            QueueStore::from_parts(snapshot.tickets, snapshot.counters, 1);
        assert_eq!(restored.create_ticket("general".into(), None).id, 4);
    }

    #[test]
    fn from_parts_seeds_the_default_counter_when_none_survive() {
        let restored = QueueStore::from_parts(Vec::new(), Vec::new(), 0);
        assert_eq!(restored.snapshot().counters[0].id, DEFAULT_COUNTER_ID);
    }
}
