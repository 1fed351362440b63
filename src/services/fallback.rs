use std::future::Future;

use crate::integrations::http::ProviderError;

/// One way of getting a piece of data out of a provider.
pub trait Strategy {
    fn name(&self) -> &'static str;
}

/// Tries `strategies` in order and returns the first usable result.
///
/// Each attempt answers `Ok(Some(_))` (done), `Ok(None)` (reachable but
/// nothing usable in this shape) or `Err(_)` (failed). Every strategy is
/// tried before giving up.
pub async fn first_usable<'a, S, T, F, Fut>(
    label: &str,
    strategies: &'a [S],
    mut attempt: F,
) -> Result<T, ProviderError>
where
    S: Strategy,
    F: FnMut(&'a S) -> Fut,
    Fut: Future<Output = Result<Option<T>, ProviderError>>,
{
    let mut failures: Vec<String> = Vec::new();
    for strategy in strategies {
        match attempt(strategy).await {
            Ok(Some(value)) => {
                tracing::debug!("{} resolved via {}", label, strategy.name());
                return Ok(value);
            }
            Ok(None) => {
                tracing::debug!("{} {} returned nothing usable", label, strategy.name());
            }
            Err(err) if err.is_absent() => {
                tracing::debug!("{} {} has no data: {}", label, strategy.name(), err);
            }
            Err(err) => {
                tracing::warn!("{} {} failed: {}", label, strategy.name(), err);
                failures.push(format!("{}: {}", strategy.name(), err));
            }
        }
    }

    if failures.is_empty() {
        Err(ProviderError::NoData(label.to_string()))
    } else {
        Err(ProviderError::AllStrategiesFailed(failures.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Step {
        Empty,
        Broken,
        Missing,
        Value(u32),
    }

    impl Strategy for Step {
        fn name(&self) -> &'static str {
            match self {
                Step::Empty => "empty",
                Step::Broken => "broken",
                Step::Missing => "missing",
                Step::Value(_) => "value",
            }
        }
    }

    async fn run(step: &Step) -> Result<Option<u32>, ProviderError> {
        match step {
            Step::Empty => Ok(None),
            Step::Broken => Err(ProviderError::Transport("reset".into())),
            Step::Missing => Err(ProviderError::NotFound("/v1".into())),
            Step::Value(v) => Ok(Some(*v)),
        }
    }

    #[tokio::test]
    async fn returns_first_usable_value_in_order() {
        let steps = [Step::Empty, Step::Broken, Step::Value(7), Step::Value(9)];
        let value = first_usable("test", &steps, run).await.expect("value found");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn empty_and_missing_only_is_no_data() {
        let steps = [Step::Empty, Step::Missing];
        let err = first_usable("test", &steps, run).await.expect_err("nothing usable");
        assert!(matches!(err, ProviderError::NoData(_)));
    }

    #[tokio::test]
    async fn hard_failures_are_reported_together() {
        let steps = [Step::Broken, Step::Empty, Step::Broken];
        let err = first_usable("test", &steps, run).await.expect_err("all failed");
        match err {
            ProviderError::AllStrategiesFailed(message) => {
                assert_eq!(message.matches("broken").count(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
