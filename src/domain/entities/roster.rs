use crate::domain::entities::{ChangeAction, Guest, PendingChange};
use crate::domain::value_objects::{GuestId, TableNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered collection of every known guest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    guests: Vec<Guest>,
}

impl Roster {
    pub fn new(guests: Vec<Guest>) -> Self {
        Self { guests }
    }

    pub fn guests(&self) -> &[Guest] {
        &self.guests
    }

    pub fn len(&self) -> usize {
        self.guests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guests.is_empty()
    }

    pub fn get(&self, id: &GuestId) -> Option<&Guest> {
        self.guests.iter().find(|guest| &guest.id == id)
    }

    pub fn contains(&self, id: &GuestId) -> bool {
        self.get(id).is_some()
    }

    /// Sets `present` and returns the previous value, or `None` if the guest is unknown.
    pub fn set_presence(&mut self, id: &GuestId, present: bool) -> Option<bool> {
        let guest = self.guests.iter_mut().find(|guest| &guest.id == id)?;
        let previous = guest.present;
        guest.present = present;
        Some(previous)
    }

    /// Replaces the guest with the same ID, or appends it.
    pub fn upsert(&mut self, guest: Guest) {
        match self.guests.iter_mut().find(|existing| existing.id == guest.id) {
            Some(existing) => *existing = guest,
            None => self.guests.push(guest),
        }
    }

    /// Swaps a local placeholder ID for the ID assigned by the remote store.
    pub fn remap_id(&mut self, from: &GuestId, to: GuestId) -> bool {
        match self.guests.iter_mut().find(|guest| &guest.id == from) {
            Some(guest) => {
                guest.id = to;
                true
            }
            None => false,
        }
    }

    /// Re-applies changes that are still waiting for the remote store, in queue order.
    pub fn overlay_pending(&mut self, pending: &[PendingChange]) {
        for change in pending {
            match change.action {
                ChangeAction::Create => {
                    if !self.contains(change.guest_id()) {
                        self.guests.push(change.guest.clone());
                    }
                }
                ChangeAction::Update => {
                    self.set_presence(change.guest_id(), change.guest.present);
                }
            }
        }
    }

    pub fn filtered(&self, filter: &RosterFilter) -> Vec<Guest> {
        self.guests
            .iter()
            .filter(|guest| filter.matches(guest))
            .cloned()
            .collect()
    }

    /// Filtered guests grouped per table, ordered by table number.
    pub fn grouped_by_table(&self, filter: &RosterFilter) -> Vec<TableGroup> {
        let mut groups: BTreeMap<TableNumber, Vec<Guest>> = BTreeMap::new();
        for guest in self.guests.iter().filter(|guest| filter.matches(guest)) {
            groups.entry(guest.table).or_default().push(guest.clone());
        }

        groups
            .into_iter()
            .map(|(table, guests)| TableGroup::new(table, guests))
            .collect()
    }

    pub fn stats(&self) -> AttendanceStats {
        let total = self.guests.len();
        let present = self.guests.iter().filter(|guest| guest.present).count();
        AttendanceStats::new(total, present)
    }

    pub fn table_stats(&self) -> Vec<TableStats> {
        let mut per_table: BTreeMap<TableNumber, (usize, usize)> = BTreeMap::new();
        for guest in &self.guests {
            let entry = per_table.entry(guest.table).or_default();
            entry.0 += 1;
            if guest.present {
                entry.1 += 1;
            }
        }

        per_table
            .into_iter()
            .map(|(table, (total, present))| TableStats {
                table,
                total,
                present,
                percentage: percentage(present, total),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceFilter {
    Present,
    Absent,
}

/// Search/table/status predicate; fields left as `None` match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterFilter {
    pub search: Option<String>,
    pub table: Option<TableNumber>,
    pub status: Option<PresenceFilter>,
}

impl RosterFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn with_table(mut self, table: TableNumber) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_status(mut self, status: PresenceFilter) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, guest: &Guest) -> bool {
        if let Some(term) = &self.search {
            if !guest.matches_search(term) {
                return false;
            }
        }
        if self.table.is_some_and(|table| guest.table != table) {
            return false;
        }
        match self.status {
            Some(PresenceFilter::Present) => guest.present,
            Some(PresenceFilter::Absent) => !guest.present,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGroup {
    pub table: TableNumber,
    pub guests: Vec<Guest>,
    pub present_count: usize,
}

impl TableGroup {
    fn new(table: TableNumber, guests: Vec<Guest>) -> Self {
        let present_count = guests.iter().filter(|guest| guest.present).count();
        Self {
            table,
            guests,
            present_count,
        }
    }

    pub fn total(&self) -> usize {
        self.guests.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    /// Rounded percentage of present guests.
    pub attendance_rate: u32,
}

impl AttendanceStats {
    pub fn new(total: usize, present: usize) -> Self {
        Self {
            total,
            present,
            absent: total.saturating_sub(present),
            attendance_rate: percentage(present, total).round() as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub table: TableNumber,
    pub total: usize,
    pub present: usize,
    pub percentage: f64,
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
