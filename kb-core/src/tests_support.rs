//! Fake `SessionPool` implementations shared by this crate's unit tests
//! (spec's own testing note, §"Test tooling": record operations are
//! tested against an in-memory fake rather than a live database).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use indexmap::IndexMap;
use kb_connector::{DomainResult, Group, Operation, Session, SessionPool, User};
use kb_schema::RecordId;
use serde_json::Value;

/// Returns the same canned row set for every statement executed.
pub struct FakePool {
    rows: Arc<Mutex<Vec<Value>>>,
}

impl FakePool {
    pub fn new(rows: Vec<Value>) -> Self {
        FakePool { rows: Arc::new(Mutex::new(rows)) }
    }
}

struct FakeSession {
    rows: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl Session for FakeSession {
    async fn execute(&self, _sql: &str, _params: &IndexMap<String, Value>) -> DomainResult<Vec<Value>> {
        Ok(self.rows.lock().unwrap().clone())
    }
}

#[async_trait]
impl SessionPool for FakePool {
    async fn acquire(&self) -> DomainResult<Box<dyn Session>> {
        Ok(Box::new(FakeSession { rows: self.rows.clone() }))
    }

    async fn release(&self, _session: Box<dyn Session>) {}
}

/// Returns a scripted sequence of row-sets, one per `execute` call, in
/// order — for exercising multi-statement operations (e.g. `update`'s
/// select-then-copy-then-update sequence) deterministically.
pub struct ScriptedPool {
    responses: Arc<Mutex<VecDeque<Vec<Value>>>>,
}

impl ScriptedPool {
    pub fn new(responses: Vec<Vec<Value>>) -> Self {
        ScriptedPool { responses: Arc::new(Mutex::new(responses.into_iter().collect())) }
    }
}

struct ScriptedSession {
    responses: Arc<Mutex<VecDeque<Vec<Value>>>>,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&self, _sql: &str, _params: &IndexMap<String, Value>) -> DomainResult<Vec<Value>> {
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[async_trait]
impl SessionPool for ScriptedPool {
    async fn acquire(&self) -> DomainResult<Box<dyn Session>> {
        Ok(Box::new(ScriptedSession { responses: self.responses.clone() }))
    }

    async fn release(&self, _session: Box<dyn Session>) {}
}

pub fn user_with(class: &str, ops: enumflags2::BitFlags<Operation>) -> User {
    let group = Group::new(RecordId::new(9, 9)).allow(class, ops);
    User::new(RecordId::new(1, 1), vec![group])
}

pub fn user_with_read(class: &str) -> User {
    user_with(class, Operation::Read.into())
}
