#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ferrent_core::{Query, QueryKind, SqlValue};
use ferrent_migrate::Migrator;
use ferrent_orm::{
    BadRequest, Connection, ConnectionStats, DatabaseConfig, Driver, DriverError, DriverResult,
    DriverTransaction, IsolationLevel, KeywordHandler, Row,
};

/// Everything the mock driver saw.
#[derive(Default)]
pub struct Journal {
    pub statements: Vec<Query>,
    pub events: Vec<String>,
    pub rows: VecDeque<Vec<Row>>,
    pub next_id: i64,
    pub fail_next: Option<(String, String)>,
    pub withheld_ids: usize,
    pub migrations: Vec<Migrator>,
}

#[derive(Clone)]
pub struct MockDriver {
    pub journal: Arc<Mutex<Journal>>,
    pub delay: Option<Duration>,
    config: DatabaseConfig,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl MockDriver {
    pub fn new() -> Self {
        init_tracing();
        Self {
            journal: Arc::new(Mutex::new(Journal {
                next_id: 1,
                ..Journal::default()
            })),
            delay: None,
            config: DatabaseConfig::default().log_queries(true),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues the rows returned by the next fetch.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.journal.lock().unwrap().rows.push_back(rows);
    }

    /// Makes the next statement fail with a backend error code.
    pub fn fail_next(&self, code: &str, message: &str) {
        self.journal.lock().unwrap().fail_next = Some((code.to_string(), message.to_string()));
    }

    /// Makes the next insert return `count` fewer generated keys than rows.
    pub fn withhold_ids(&self, count: usize) {
        self.journal.lock().unwrap().withheld_ids = count;
    }

    pub fn statements(&self) -> Vec<Query> {
        self.journal.lock().unwrap().statements.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.journal.lock().unwrap().events.clone()
    }

    fn connection_impl(&self, in_transaction: bool) -> MockConnection {
        MockConnection {
            journal: Arc::clone(&self.journal),
            delay: self.delay,
            in_transaction,
        }
    }
}

pub struct MockConnection {
    journal: Arc<Mutex<Journal>>,
    delay: Option<Duration>,
    in_transaction: bool,
}

impl MockConnection {
    async fn record(&self, query: &Query) -> DriverResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut journal = self.journal.lock().unwrap();
        journal.statements.push(query.clone());
        if self.in_transaction {
            journal.events.push(format!("tx:{}", query.kind));
        }
        if let Some((code, message)) = journal.fail_next.take() {
            return Err(DriverError {
                code: Some(code),
                message,
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&mut self, query: &Query) -> DriverResult<u64> {
        self.record(query).await?;
        Ok(1)
    }

    async fn fetch(&mut self, query: &Query) -> DriverResult<Vec<Row>> {
        self.record(query).await?;
        Ok(self
            .journal
            .lock()
            .unwrap()
            .rows
            .pop_front()
            .unwrap_or_default())
    }

    async fn insert(&mut self, query: &Query) -> DriverResult<Vec<SqlValue>> {
        self.record(query).await?;
        if query.kind != QueryKind::Insert || query.returning.is_none() {
            return Ok(Vec::new());
        }
        let mut journal = self.journal.lock().unwrap();
        let returned = query
            .rows
            .len()
            .saturating_sub(std::mem::take(&mut journal.withheld_ids));
        let ids = (0..returned)
            .map(|_| {
                let id = journal.next_id;
                journal.next_id += 1;
                SqlValue::Int(id)
            })
            .collect();
        Ok(ids)
    }
}

#[async_trait]
impl DriverTransaction for MockConnection {
    async fn commit(self: Box<Self>) -> DriverResult<()> {
        self.journal.lock().unwrap().events.push("commit".to_string());
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DriverResult<()> {
        self.journal.lock().unwrap().events.push("rollback".to_string());
        Ok(())
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn keyword_handler(&self) -> KeywordHandler {
        Arc::new(|name| format!("\"{name}\""))
    }

    fn translate_error(&self, error: DriverError) -> Result<BadRequest, DriverError> {
        match error.code.as_deref() {
            Some("2067") => Ok(BadRequest::UniqueValue(error)),
            Some("787") => Ok(BadRequest::ForeignKey(error)),
            _ => Err(error),
        }
    }

    async fn init(&self, schemas: &[String]) -> DriverResult<()> {
        let mut journal = self.journal.lock().unwrap();
        journal.events.push(format!("init:{}", schemas.join(",")));
        Ok(())
    }

    async fn connection(&self) -> DriverResult<Box<dyn Connection>> {
        Ok(Box::new(self.connection_impl(false)))
    }

    async fn begin(&self, isolation: IsolationLevel) -> DriverResult<Box<dyn DriverTransaction>> {
        self.journal
            .lock()
            .unwrap()
            .events
            .push(format!("begin:{isolation}"));
        Ok(Box::new(self.connection_impl(true)))
    }

    async fn migrate(&self, migrator: &Migrator) -> DriverResult<()> {
        self.journal.lock().unwrap().migrations.push(migrator.clone());
        Ok(())
    }

    async fn drop_table(&self, schema: Option<&str>, table: &str) -> DriverResult<()> {
        self.event(format!("drop_table:{}:{table}", schema.unwrap_or("")));
        Ok(())
    }

    async fn rename_table(
        &self,
        schema: Option<&str>,
        table: &str,
        new_name: &str,
    ) -> DriverResult<()> {
        self.event(format!("rename_table:{}:{table}:{new_name}", schema.unwrap_or("")));
        Ok(())
    }

    async fn drop_column(&self, schema: Option<&str>, table: &str, column: &str) -> DriverResult<()> {
        self.event(format!("drop_column:{}:{table}:{column}", schema.unwrap_or("")));
        Ok(())
    }

    async fn rename_column(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        new_name: &str,
    ) -> DriverResult<()> {
        self.event(format!(
            "rename_column:{}:{table}:{column}:{new_name}",
            schema.unwrap_or("")
        ));
        Ok(())
    }

    fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            max_open: 1,
            ..ConnectionStats::default()
        }
    }

    async fn close(&self) -> DriverResult<()> {
        self.event("close".to_string());
        Ok(())
    }
}

impl MockDriver {
    fn event(&self, event: String) {
        self.journal.lock().unwrap().events.push(event);
    }
}
