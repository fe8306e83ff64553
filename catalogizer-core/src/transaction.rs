//! Transactional scope helpers
//!
//! Every multi-statement catalog mutation runs inside `with_transaction`
//! so it commits or rolls back on every exit path.

use sqlx::{PgPool, Postgres, Transaction};

use crate::Result;

/// Run `f` inside a transaction, committing on `Ok` and rolling back on
/// `Err`. An un-awaited drop also rolls back (sqlx guarantee).
///
/// Pool transactions own their connection, so the transaction carries the
/// `'static` lifetime and the closure's future borrows only the `&mut`.
pub async fn with_transaction<F, R>(pool: &PgPool, f: F) -> Result<R>
where
    F: for<'t> FnOnce(
            &'t mut Transaction<'static, Postgres>,
        ) -> futures::future::BoxFuture<'t, Result<R>>
        + Send
        + Sync,
    R: Send + Sync + 'static,
{
    let mut tx = pool.begin().await?;

    match f(&mut tx).await {
        Ok(result) => {
            tx.commit().await?;
            Ok(result)
        }
        Err(e) => {
            tx.rollback().await?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_commit_on_ok() {
        // Integration test placeholder
    }

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_rollback_on_err() {
        // Integration test placeholder
    }
}
