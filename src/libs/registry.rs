use std::sync::Arc;

use tracing::info;

use crate::descriptor::Record;
use crate::error::Result;
use crate::queryer::Queryer;
use crate::table::{Table, Tabler};

/// The tables of an application, built once at startup and handed to
/// whatever needs them.
#[derive(Default, Clone)]
pub struct Registry {
    tables: Vec<Arc<dyn Tabler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table and returns a shared typed handle to it.
    pub fn register<T: Record>(&mut self, table: Table<T>) -> Arc<Table<T>> {
        let table = Arc::new(table);
        self.tables.push(table.clone());
        table
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tabler>> {
        self.tables.iter().find(|t| t.name() == name).cloned()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<dyn Tabler>> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Creates every table that does not exist yet, in registration order.
    pub async fn create_all<Q: Queryer + ?Sized>(&self, queryer: &mut Q) -> Result<()> {
        for table in &self.tables {
            info!(table = table.name(), "creating table");
            queryer.execute(&table.create_statement(), &[]).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tables.iter().map(|t| t.name()))
            .finish()
    }
}
