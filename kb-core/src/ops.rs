//! `RecordOperations` (spec §4.8): a facade binding the Schema Registry
//! and Session Pool once, exposing the record-operation entry points as
//! methods instead of free functions threading both through every call.

use std::sync::Arc;

use indexmap::IndexMap;
use kb_connector::{DomainResult, SessionPool, User};
use kb_query::{KeywordSearchOptions, WrapperQuery};
use kb_schema::registry::SchemaRegistry;
use kb_schema::{Record, RecordId};
use serde_json::Value;

use crate::counts::{select_counts, ClassCount, CountsOptions};
use crate::create::{create, create_edge};
use crate::remove::remove;
use crate::select::{select, select_by_keyword, select_from_list, SelectOptions};
use crate::update::update;

#[derive(Clone)]
pub struct RecordOperations {
    registry: Arc<SchemaRegistry>,
    pool: Arc<dyn SessionPool>,
}

impl RecordOperations {
    pub fn new(registry: Arc<SchemaRegistry>, pool: Arc<dyn SessionPool>) -> Self {
        RecordOperations { registry, pool }
    }

    pub async fn create(&self, class: &str, content: IndexMap<String, Value>, user: &User) -> DomainResult<Record> {
        create(self.pool.as_ref(), &self.registry, class, content, user).await
    }

    pub async fn create_edge(
        &self,
        class: &str,
        out: RecordId,
        in_: RecordId,
        content: IndexMap<String, Value>,
        user: &User,
    ) -> DomainResult<Record> {
        create_edge(self.pool.as_ref(), &self.registry, class, out, in_, content, user).await
    }

    pub async fn select(&self, query: &WrapperQuery, user: &User, opts: &SelectOptions) -> DomainResult<Vec<Record>> {
        select(self.pool.as_ref(), &self.registry, query, user, opts).await
    }

    pub async fn select_from_list(
        &self,
        record_ids: &[RecordId],
        user: &User,
        opts: &SelectOptions,
    ) -> DomainResult<Vec<Record>> {
        select_from_list(self.pool.as_ref(), &self.registry, record_ids, user, opts).await
    }

    pub async fn select_by_keyword(
        &self,
        opts: &KeywordSearchOptions,
        user: &User,
        active_only: bool,
    ) -> DomainResult<Vec<Record>> {
        select_by_keyword(self.pool.as_ref(), &self.registry, opts, user, active_only).await
    }

    pub async fn select_counts(&self, opts: &CountsOptions, user: &User) -> DomainResult<Vec<ClassCount>> {
        select_counts(self.pool.as_ref(), &self.registry, opts, user).await
    }

    pub async fn update(
        &self,
        class: &str,
        query: &WrapperQuery,
        changes: IndexMap<String, Value>,
        user: &User,
    ) -> DomainResult<Record> {
        update(self.pool.as_ref(), &self.registry, class, query, changes, user).await
    }

    pub async fn remove(&self, class: &str, query: &WrapperQuery, user: &User) -> DomainResult<Record> {
        remove(self.pool.as_ref(), &self.registry, class, query, user).await
    }
}
