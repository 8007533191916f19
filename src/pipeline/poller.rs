use crate::error::{Result, UserSyncError};
use crate::models::{Record, Watermark};
use crate::system::{PageKey, SystemConnector};
use futures::stream::{self, Stream, TryStreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use tracing::{debug, trace};

/// Lazy stream of changed records
pub type RecordStream<'a> = Pin<Box<dyn Stream<Item = Result<Record>> + Send + 'a>>;

/// Everything one polling session observed
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub records: Vec<Record>,
    pub started_at: Watermark,
    /// Highest last-modified seen, if any record carried one
    pub max_modified: Option<Watermark>,
}

impl PollOutcome {
    /// Watermark to store after a successful apply: the highest last-modified
    /// observed, or the poll start when nothing was seen; never below `current`
    pub fn next_watermark(&self, current: Watermark) -> Watermark {
        let candidate = self.max_modified.unwrap_or(self.started_at);
        candidate.max(current)
    }
}

struct PageCursor {
    since: Watermark,
    after: Option<PageKey>,
    done: bool,
}

/// Pages through a system's changes since a watermark
#[derive(Debug, Clone)]
pub struct ChangePoller {
    page_size: usize,
}

impl ChangePoller {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Records modified at or after `watermark`, ascending.
    ///
    /// Pages follow a strict keyset on `(last_modified, primary_key)`, so a
    /// record edited mid-session can only move behind the cursor and never
    /// pushes an unread record out of reach. Such a record comes back with a
    /// newer stamp; per identifier, only sightings newer than the last one
    /// emitted pass.
    pub fn poll<'a>(&self, system: &'a dyn SystemConnector, watermark: Watermark) -> RecordStream<'a> {
        let page_size = self.page_size;
        let descriptor = system.descriptor();
        let lm_field = descriptor.last_modified_field.clone();
        let pk_field = descriptor.primary_key_field.clone();
        let id_field = descriptor.identifier_field.clone();

        let cursor = PageCursor {
            since: watermark,
            after: None,
            done: false,
        };

        let stamp_field = lm_field.clone();
        let pages = stream::try_unfold(cursor, move |cursor| {
            next_page(system, cursor, page_size, lm_field.clone(), pk_field.clone())
        });

        let mut latest: HashMap<String, Option<Watermark>> = HashMap::new();
        let records = pages
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<Record, UserSyncError>)))
            .try_flatten()
            .try_filter(move |record| {
                let fresh = match record.identifier(&id_field) {
                    Some(id) => {
                        let at = record.timestamp(&stamp_field).map(Watermark::new);
                        let stale = matches!(latest.get(&id), Some(seen) if at <= *seen);
                        if !stale {
                            latest.insert(id, at);
                        }
                        !stale
                    }
                    None => true,
                };
                if !fresh {
                    debug!("Dropping repeated sighting within polling session");
                }
                futures::future::ready(fresh)
            });

        Box::pin(records)
    }

    /// Drain [`poll`](Self::poll), keeping the newest version of each
    /// identifier, and track the highest last-modified observed
    pub async fn collect(
        &self,
        system: &dyn SystemConnector,
        watermark: Watermark,
    ) -> Result<PollOutcome> {
        let started_at = Watermark::now();
        let descriptor = system.descriptor();
        let lm_field = &descriptor.last_modified_field;
        let id_field = &descriptor.identifier_field;

        let mut slots: Vec<Option<Record>> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut max_modified: Option<Watermark> = None;

        let mut polled = self.poll(system, watermark);
        while let Some(record) = polled.try_next().await? {
            if let Some(at) = record.timestamp(lm_field).map(Watermark::new) {
                max_modified = max_modified.max(Some(at));
            }
            if let Some(id) = record.identifier(id_field) {
                // a newer sighting supersedes the earlier one and keeps the
                // list in last-modified order
                if let Some(previous) = positions.insert(id, slots.len()) {
                    slots[previous] = None;
                }
            }
            slots.push(Some(record));
        }
        let records: Vec<Record> = slots.into_iter().flatten().collect();

        debug!(
            "Polled {} records from {} since {}",
            records.len(),
            descriptor.name,
            watermark
        );

        Ok(PollOutcome {
            records,
            started_at,
            max_modified,
        })
    }
}

async fn next_page(
    system: &dyn SystemConnector,
    mut cursor: PageCursor,
    page_size: usize,
    lm_field: String,
    pk_field: String,
) -> Result<Option<(Vec<Record>, PageCursor)>> {
    if cursor.done {
        return Ok(None);
    }

    let page = system
        .fetch_changes(cursor.since, cursor.after.as_ref(), page_size)
        .await?;
    trace!(
        "Fetched {} records since {} (after {:?})",
        page.len(),
        cursor.since,
        cursor.after
    );

    // a short page is the end-of-data signal
    if page.len() < page_size {
        cursor.done = true;
    }
    if page.is_empty() {
        return Ok(None);
    }

    if !cursor.done {
        let key = page.last().and_then(|last| {
            Some(PageKey {
                last_modified: Watermark::new(last.timestamp(&lm_field)?),
                primary_key: last.key(&pk_field)?,
            })
        });
        match key {
            Some(key) => cursor.after = Some(key),
            None => {
                return Err(UserSyncError::Pipeline(format!(
                    "cannot page past a record without '{}' and '{}'",
                    lm_field, pk_field
                )))
            }
        }
    }

    Ok(Some((page, cursor)))
}
