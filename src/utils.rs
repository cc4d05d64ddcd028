use std::future::Future;
use std::time::Duration;

use anyhow::Context;

/// Marker that turns a configuration value into a file reference.
pub const FILE_REF_PREFIX: char = '@';

/// Retries an operation with a fixed delay until it succeeds.
///
/// There is no attempt cap; `on_error` sees every failure with its 1-based
/// attempt number. The successful value and its attempt number are returned.
pub async fn retry_forever_with_sleep<T, OpFn, OpFut, SleepFn, SleepFut, OnError>(
    mut op_fn: OpFn,
    mut sleep_fn: SleepFn,
    mut on_error: OnError,
    delay: Duration,
) -> (T, usize)
where
    OpFn: FnMut() -> OpFut,
    OpFut: Future<Output = anyhow::Result<T>>,
    SleepFn: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
    OnError: FnMut(usize, &anyhow::Error),
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match op_fn().await {
            Ok(value) => return (value, attempt),
            Err(err) => {
                on_error(attempt, &err);
                sleep_fn(delay).await;
            }
        }
    }
}

/// Returns `raw` unchanged, or the contents of the file it names when it
/// starts with [`FILE_REF_PREFIX`].
///
/// # Errors
/// Returns an error if a referenced file cannot be read.
pub fn read_inline_or_file(raw: &str) -> anyhow::Result<String> {
    match raw.strip_prefix(FILE_REF_PREFIX) {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file referenced by {raw:?}")),
        None => Ok(raw.to_string()),
    }
}

/// Like [`read_inline_or_file`], treating a missing or empty value as absent.
///
/// # Errors
/// Returns an error if a referenced file cannot be read.
pub fn read_optional_inline_or_file(raw: Option<&str>) -> anyhow::Result<Option<String>> {
    match raw {
        Some(raw) if !raw.is_empty() => read_inline_or_file(raw).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tempfile::NamedTempFile;

    use super::*;

    #[tokio::test]
    async fn test_retry_forever_succeeds_after_failures() {
        let attempts = Arc::new(Mutex::new(0usize));
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let attempts_op = Arc::clone(&attempts);
        let op_fn = move || {
            let attempts_inner = Arc::clone(&attempts_op);
            async move {
                let mut guard = attempts_inner.lock().unwrap();
                *guard += 1;
                if *guard < 3 {
                    anyhow::bail!("write denied");
                }
                Ok("v3")
            }
        };

        let sleeps_log = Arc::clone(&sleeps);
        let sleep_fn = move |duration: Duration| {
            let sleeps_inner = Arc::clone(&sleeps_log);
            async move {
                sleeps_inner.lock().unwrap().push(duration);
            }
        };

        let errors_log = Arc::clone(&errors);
        let on_error = move |attempt: usize, err: &anyhow::Error| {
            errors_log.lock().unwrap().push((attempt, err.to_string()));
        };

        let (value, attempt) =
            retry_forever_with_sleep(op_fn, sleep_fn, on_error, Duration::from_secs(3)).await;

        assert_eq!(value, "v3");
        assert_eq!(attempt, 3);
        assert_eq!(
            *sleeps.lock().unwrap(),
            vec![Duration::from_secs(3), Duration::from_secs(3)]
        );
        assert_eq!(
            *errors.lock().unwrap(),
            vec![
                (1, "write denied".to_string()),
                (2, "write denied".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_forever_first_try_does_not_sleep() {
        let sleeps = Arc::new(Mutex::new(0usize));
        let sleeps_log = Arc::clone(&sleeps);

        let (value, attempt) = retry_forever_with_sleep(
            || async { Ok::<_, anyhow::Error>(7) },
            move |_| {
                let sleeps_inner = Arc::clone(&sleeps_log);
                async move {
                    *sleeps_inner.lock().unwrap() += 1;
                }
            },
            |_, _| {},
            Duration::from_secs(3),
        )
        .await;

        assert_eq!((value, attempt), (7, 1));
        assert_eq!(*sleeps.lock().unwrap(), 0);
    }

    #[test]
    fn test_read_inline_or_file_passes_plain_value() {
        let value = read_inline_or_file("-----BEGIN CERTIFICATE-----").unwrap();
        assert_eq!(value, "-----BEGIN CERTIFICATE-----");
    }

    #[test]
    fn test_read_inline_or_file_reads_reference() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "ca-contents\n").unwrap();
        let raw = format!("@{}", file.path().display());

        let value = read_inline_or_file(&raw).unwrap();

        assert_eq!(value, "ca-contents\n");
    }

    #[test]
    fn test_read_inline_or_file_missing_reference_errors() {
        let err = read_inline_or_file("@/non/existent/vault-bootstrap/ca.pem").unwrap_err();
        assert!(err.to_string().contains("Failed to read file referenced by"));
    }

    #[test]
    fn test_read_optional_inline_or_file_treats_empty_as_absent() {
        assert_eq!(read_optional_inline_or_file(None).unwrap(), None);
        assert_eq!(read_optional_inline_or_file(Some("")).unwrap(), None);
        assert_eq!(
            read_optional_inline_or_file(Some("pem")).unwrap().as_deref(),
            Some("pem")
        );
    }
}
