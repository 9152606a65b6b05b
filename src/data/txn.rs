use mongodb::error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};
use mongodb::{Client, ClientSession};
use rocket::futures::future::BoxFuture;

use crate::error::ServiceError;

/// Transient transaction errors are retried this many times before the
/// operation surfaces as [`ServiceError::Transient`].
const MAX_TRANSACTION_ATTEMPTS: usize = 3;

/// Runs `work` inside one transaction: session acquired, transaction
/// started, committed on success and aborted on any error, so callers can
/// never leak a half-applied membership change. Commits interrupted by an
/// unknown result are re-driven; whole-transaction transient failures are
/// retried from scratch.
pub async fn with_transaction<T, F>(client: &Client, mut work: F) -> Result<T, ServiceError>
where
    F: for<'s> FnMut(&'s mut ClientSession) -> BoxFuture<'s, Result<T, ServiceError>>,
{
    let mut session = client.start_session(None).await?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        session.start_transaction(None).await?;

        let value = match work(&mut session).await {
            Ok(value) => value,
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    tracing::warn!("failed to abort transaction: {}", abort_err);
                }

                if err.is_retryable() && attempt < MAX_TRANSACTION_ATTEMPTS {
                    tracing::debug!("retrying transient transaction failure: {}", err);
                    continue;
                }

                return Err(err);
            }
        };

        loop {
            match session.commit_transaction().await {
                Ok(()) => return Ok(value),
                Err(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
                    tracing::debug!("retrying commit with unknown result");
                    continue;
                }
                Err(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR)
                    && attempt < MAX_TRANSACTION_ATTEMPTS =>
                {
                    tracing::debug!("restarting transaction after transient commit error");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
