//! Callback surface over the future-returning operations.
//!
//! Every operation returns a future. Callers that prefer a callback wrap
//! the future with [`settle`]: the callback sees the same result the future
//! resolves to, exactly once.

use std::future::Future;

use crate::error::Error;

/// Await `operation`, hand its result to `callback` by reference, then
/// return it.
///
/// # Errors
///
/// Returns whatever error `operation` produced.
///
/// # Example
///
/// ```rust,ignore
/// let meta = osapi::callback::settle(
///     connection.objects().delete("cat.jpg"),
///     Some(|result: Result<&_, &_>| println!("deleted: {}", result.is_ok())),
/// )
/// .await?;
/// ```
pub async fn settle<T, Fut, F>(operation: Fut, callback: Option<F>) -> Result<T, Error>
where
    Fut: Future<Output = Result<T, Error>>,
    F: FnOnce(Result<&T, &Error>),
{
    let result = operation.await;
    if let Some(callback) = callback {
        callback(result.as_ref());
    }
    result
}
