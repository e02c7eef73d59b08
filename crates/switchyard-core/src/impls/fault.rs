//! Failure injection for the in-memory backends.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::ApiError;

/// One-shot failures keyed by backend call name (`"create_job"`, `"run_job"`, ...).
#[derive(Debug, Default)]
pub struct FaultPlan {
    next: Mutex<HashMap<&'static str, ApiError>>,
}

impl FaultPlan {
    /// The next `call` fails with `err`; later calls succeed again.
    pub fn inject(&self, call: &'static str, err: ApiError) {
        lock(&self.next).insert(call, err);
    }

    pub fn check(&self, call: &'static str) -> Result<(), ApiError> {
        match lock(&self.next).remove(call) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
