//! Filling the input table with the sample corpus.
//!
//! The rows form a fixed grid of keys: every category, for every user, for every
//! sub-category. Rows of one category share their title and body, taken from
//! [`corpus`](crate::corpus) at the category's index.

use std::num::NonZeroUsize;
use std::ops::Range;

use futures::{stream, StreamExt};
use tracing::{debug, info};

use crate::client::ClusterClient;
use crate::config::CqlIdentifier;
use crate::corpus;
use crate::errors::InsertError;
use crate::statements;
use crate::SETUP_CONSISTENCY;

/// Values of `user_id`.
pub const USER_IDS: Range<usize> = 1..444;
/// Values of `category_id`, also the corpus index of the row's text.
pub const CATEGORY_IDS: Range<usize> = 1..5;
/// Values of `sub_category_id`.
pub const SUB_CATEGORY_IDS: Range<usize> = 1..4;

/// One row of the input table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedRow {
    /// Partition key.
    pub user_id: String,
    /// First clustering column.
    pub category_id: String,
    /// Second clustering column.
    pub sub_category_id: String,
    /// Corpus title of the category.
    pub title: &'static str,
    /// Corpus body of the category.
    pub body: &'static str,
}

impl SeedRow {
    fn new(user: usize, category: usize, sub_category: usize) -> Self {
        SeedRow {
            user_id: user.to_string(),
            category_id: category.to_string(),
            sub_category_id: sub_category.to_string(),
            title: corpus::title(category),
            body: corpus::body(category),
        }
    }

    /// Values bound to the insert statement, in column order.
    pub fn values(&self) -> [&str; 5] {
        [
            self.user_id.as_str(),
            self.category_id.as_str(),
            self.sub_category_id.as_str(),
            self.title,
            self.body,
        ]
    }
}

/// Every row of a full run, in insertion order: categories outermost, then
/// users, then sub-categories.
pub fn seed_plan() -> impl Iterator<Item = SeedRow> {
    CATEGORY_IDS.flat_map(|category| {
        USER_IDS.flat_map(move |user| {
            SUB_CATEGORY_IDS.map(move |sub_category| SeedRow::new(user, category, sub_category))
        })
    })
}

/// Number of rows in [`seed_plan`].
pub fn plan_len() -> usize {
    CATEGORY_IDS.len() * USER_IDS.len() * SUB_CATEGORY_IDS.len()
}

/// Summary of a seeding run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedReport {
    /// Rows successfully inserted.
    pub rows_inserted: usize,
}

/// Inserts [`seed_plan`] into the input table through one prepared statement.
#[derive(Clone, Debug)]
pub struct SeedLoader {
    input_table: CqlIdentifier,
    concurrency: NonZeroUsize,
}

impl SeedLoader {
    /// Creates a loader that inserts one row at a time into `input_table`.
    pub fn new(input_table: CqlIdentifier) -> Self {
        SeedLoader {
            input_table,
            concurrency: NonZeroUsize::MIN,
        }
    }

    /// Keeps up to `concurrency` inserts in flight.
    pub fn with_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Prepares the insert and executes it for every row of the plan.
    ///
    /// There are no retries. The first failed insert stops the run; rows not
    /// yet sent are skipped and the failure is returned. Inserts already in
    /// flight at that moment are dropped without waiting for their result.
    pub async fn seed_data<C>(&self, client: &C) -> Result<SeedReport, InsertError>
    where
        C: ClusterClient + ?Sized,
    {
        let prepared = client
            .prepare(&statements::insert_input_row(&self.input_table))
            .await
            .map_err(InsertError::Prepare)?;

        let total = plan_len();
        info!(
            "Inserting {} rows into {} ({} in flight)",
            total, self.input_table, self.concurrency
        );

        let prepared = &prepared;
        let mut inserts = stream::iter(seed_plan().enumerate())
            .map(|(i, row)| async move { insert(client, prepared, i + 1, &row).await })
            .buffer_unordered(self.concurrency.get());

        let report_every = (total / 10).max(1);
        let mut rows_inserted = 0;
        while let Some(res) = inserts.next().await {
            res?;
            rows_inserted += 1;
            if rows_inserted % report_every == 0 {
                info!("Progress: {}%", 100 * rows_inserted / total);
            }
        }

        info!("Inserted {} rows into {}", rows_inserted, self.input_table);
        Ok(SeedReport { rows_inserted })
    }
}

async fn insert<C>(
    client: &C,
    prepared: &C::Prepared,
    attempt: usize,
    row: &SeedRow,
) -> Result<(), InsertError>
where
    C: ClusterClient + ?Sized,
{
    client
        .execute_prepared(prepared, &row.values(), SETUP_CONSISTENCY)
        .await
        .map_err(|source| {
            debug!("Insert #{} failed: {:?}", attempt, row);
            InsertError::Execute {
                attempt,
                user_id: row.user_id.clone(),
                category_id: row.category_id.clone(),
                sub_category_id: row.sub_category_id.clone(),
                source,
            }
        })
}
