use cluster_rpc_client::{
    cfg::config::{MaxAttemptsRetryStrategy, RetryStrategy},
    model::ClientError,
};

#[test]
fn max_attempts_strategy_reports_its_budget() {
    let strategy = MaxAttemptsRetryStrategy { max_retry: 3 };
    assert_eq!(strategy.max_retry(), 3);
}

#[test]
fn max_attempts_strategy_defers_retriability_to_the_error() {
    let strategy = MaxAttemptsRetryStrategy { max_retry: 1 };
    assert!(strategy.is_retriable(&ClientError::WriteTimeout));
    assert!(!strategy.is_retriable(&ClientError::NullArgument));
    assert!(!strategy.is_retriable(&ClientError::NoNodesAvailable));
}
