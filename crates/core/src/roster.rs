use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use tracing::info;

use crate::domain::employee::{Employee, EmployeeId, NewEmployee};
use crate::errors::DomainError;

/// Point-in-time copy of the roster together with the generation it was taken at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterSnapshot {
    pub generation: u64,
    pub employees: Vec<Employee>,
}

#[derive(Debug)]
struct RosterState {
    employees: Vec<Employee>,
    next_id: u64,
    generation: u64,
}

/// Sole owner and mutator of employee records.
///
/// Every applied mutation bumps the generation and publishes it on a watch
/// channel; projections computed from an older generation are stale.
#[derive(Debug)]
pub struct RosterStore {
    state: RwLock<RosterState>,
    changes: watch::Sender<u64>,
}

impl Default for RosterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self { state: RwLock::new(RosterState { employees: Vec::new(), next_id: 1, generation: 0 }), changes }
    }

    /// Roster pre-loaded with existing records. Ids are kept; new ids start above the highest.
    pub fn with_employees(employees: Vec<Employee>) -> Self {
        let next_id = employees.iter().map(|employee| employee.id.0).max().unwrap_or(0) + 1;
        let store = Self::new();
        {
            let mut state = store.write();
            state.employees = employees;
            state.next_id = next_id;
        }
        store
    }

    pub fn create(&self, employee: NewEmployee) -> Result<Employee, DomainError> {
        employee.validate()?;

        let (created, generation) = {
            let mut state = self.write();
            let id = EmployeeId(state.next_id);
            state.next_id += 1;
            let created = employee.with_id(id);
            state.employees.push(created.clone());
            state.generation += 1;
            (created, state.generation)
        };

        info!(
            event_name = "roster.employee_created",
            employee_id = %created.id,
            department = %created.department,
            generation,
            "employee added to roster"
        );
        self.publish(generation);
        Ok(created)
    }

    pub fn update(&self, employee: Employee) -> Result<(), DomainError> {
        employee.validate()?;

        let generation = {
            let mut state = self.write();
            let Some(slot) = state.employees.iter_mut().find(|existing| existing.id == employee.id)
            else {
                return Err(DomainError::EmployeeNotFound(employee.id));
            };
            *slot = Employee {
                name: employee.name.trim().to_string(),
                role: employee.role.trim().to_string(),
                ..employee.clone()
            };
            state.generation += 1;
            state.generation
        };

        info!(
            event_name = "roster.employee_updated",
            employee_id = %employee.id,
            generation,
            "employee record replaced"
        );
        self.publish(generation);
        Ok(())
    }

    /// Removes the record if present. Returns whether anything was removed.
    pub fn delete(&self, id: EmployeeId) -> bool {
        let generation = {
            let mut state = self.write();
            let before = state.employees.len();
            state.employees.retain(|employee| employee.id != id);
            if state.employees.len() == before {
                return false;
            }
            state.generation += 1;
            state.generation
        };

        info!(
            event_name = "roster.employee_deleted",
            employee_id = %id,
            generation,
            "employee removed from roster"
        );
        self.publish(generation);
        true
    }

    pub fn get(&self, id: EmployeeId) -> Option<Employee> {
        self.read().employees.iter().find(|employee| employee.id == id).cloned()
    }

    pub fn list(&self) -> Vec<Employee> {
        self.read().employees.clone()
    }

    pub fn snapshot(&self) -> RosterSnapshot {
        let state = self.read();
        RosterSnapshot { generation: state.generation, employees: state.employees.clone() }
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    pub fn len(&self) -> usize {
        self.read().employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().employees.is_empty()
    }

    /// Receiver that observes the generation after each applied mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn publish(&self, generation: u64) {
        self.changes.send_if_modified(|current| {
            if *current < generation {
                *current = generation;
                true
            } else {
                false
            }
        });
    }

    fn read(&self) -> RwLockReadGuard<'_, RosterState> {
        match self.state.read() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, RosterState> {
        match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
