//! Version-checked read-modify-write with bounded retry.
//!
//! Used for document edits that are not plain score increments, such as
//! membership lists. A lost race shows up as `VersionConflict` and the
//! mutation is re-run against the fresh document.

use crate::ports::DocumentStore;
use shared_types::{Aggregate, StoreError};
use tracing::debug;

/// Default number of attempts before giving up.
pub const DEFAULT_CAS_ATTEMPTS: u32 = 5;

/// Outcome of a mutation closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// The document was changed and must be written.
    Changed,
    /// Nothing to write; return the document as read.
    Unchanged,
}

/// Load `id`, apply `mutate`, and write back if the version is unchanged.
///
/// `mutate` may reject the change with its own error type, which is returned
/// as-is. A missing document yields `StoreError::NotFound` converted into `E`.
pub async fn update_with_retry<A, S, E, F>(
    store: &S,
    id: &A::Id,
    max_attempts: u32,
    mut mutate: F,
) -> Result<A, E>
where
    A: Aggregate,
    S: DocumentStore<A> + ?Sized,
    E: From<StoreError>,
    F: FnMut(&mut A) -> Result<Mutation, E> + Send,
{
    let attempts = max_attempts.max(1);
    let mut last_conflict = None;

    for attempt in 1..=attempts {
        let mut doc = store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(A::KIND, id))?;

        if mutate(&mut doc)? == Mutation::Unchanged {
            return Ok(doc);
        }

        match store.replace(doc).await {
            Ok(written) => return Ok(written),
            Err(conflict @ StoreError::VersionConflict { .. }) => {
                debug!(kind = %A::KIND, %id, attempt, "Version conflict, retrying");
                last_conflict = Some(conflict);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(last_conflict
        .unwrap_or_else(|| StoreError::not_found(A::KIND, id))
        .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryUserStore;
    use shared_types::{PlatformError, User, UserId};
    use std::sync::Arc;

    async fn seeded() -> Arc<InMemoryUserStore> {
        let store = Arc::new(InMemoryUserStore::new());
        store
            .insert(User::new(UserId::new("u1"), "Ada", "a@x.org", "MIT", "CS", 0))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_concurrent_edits_all_land() {
        let store = seeded().await;
        let mut handles = Vec::new();
        for i in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                update_with_retry::<User, _, StoreError, _>(
                    store.as_ref(),
                    &UserId::new("u1"),
                    20,
                    |u| {
                        u.skills.push(format!("skill{i}"));
                        Ok(Mutation::Changed)
                    },
                )
                .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let user = store.snapshot(&UserId::new("u1")).unwrap();
        assert_eq!(user.skills.len(), 4);
    }

    #[tokio::test]
    async fn test_mutation_error_is_returned() {
        let store = seeded().await;
        let result = update_with_retry::<User, _, PlatformError, _>(
            store.as_ref(),
            &UserId::new("u1"),
            3,
            |_| Err(PlatformError::bad_request("nope")),
        )
        .await;
        assert!(matches!(result, Err(PlatformError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let store = seeded().await;
        let result = update_with_retry::<User, _, StoreError, _>(
            store.as_ref(),
            &UserId::new("ghost"),
            3,
            |_| Ok(Mutation::Changed),
        )
        .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }
}
