use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

use super::proto::{BillingRequest, BillingResponse};
use super::{AccountProvisioner, AccountStatus, ProvisionedAccount, ProvisioningError};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

const CREATE_ACCOUNT_PATH: &str = "/billing.BillingService/CreateBillingAccount";

/// Unary gRPC client for the remote billing service.
pub struct GrpcBillingClient {
    channel: Channel,
    request_timeout: Duration,
    circuit_breaker: CircuitBreaker,
}

fn trips_breaker(code: Code) -> bool {
    matches!(
        code,
        Code::Unavailable | Code::Unknown | Code::DeadlineExceeded | Code::Cancelled
    )
}

impl GrpcBillingClient {
    /// Build a client without dialing; the channel connects on first use.
    pub fn connect_lazy(endpoint: &str, request_timeout: Duration) -> Result<Self, ProvisioningError> {
        let channel = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| ProvisioningError::Unavailable(format!("invalid billing endpoint {endpoint}: {e}")))?
            .connect_timeout(Duration::from_secs(2))
            .timeout(request_timeout)
            .connect_lazy();

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            cool_down: Duration::from_secs(30),
            success_threshold: 2,
        };

        Ok(Self {
            channel,
            request_timeout,
            circuit_breaker: CircuitBreaker::new("billing", cb_config),
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    async fn unary(&self, request: BillingRequest) -> Result<BillingResponse, Status> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("billing channel not ready: {e}")))?;

        let codec = tonic_prost::ProstCodec::<BillingRequest, BillingResponse>::default();
        let path = PathAndQuery::from_static(CREATE_ACCOUNT_PATH);

        let response = grpc.unary(tonic::Request::new(request), path, codec).await?;
        Ok(response.into_inner())
    }

    /// Run a billing call through the breaker. Only transport-level failures
    /// count against it; a request the service rejects leaves it untouched.
    async fn guarded<F>(&self, subject_id: &str, call: F) -> Result<BillingResponse, ProvisioningError>
    where
        F: Future<Output = Result<BillingResponse, Status>>,
    {
        let outcome = self
            .circuit_breaker
            .call(async {
                match call.await {
                    Ok(response) => Ok(Ok(response)),
                    Err(status) if trips_breaker(status.code()) => Err(status),
                    Err(status) => Ok(Err(status)),
                }
            })
            .await;

        let status = match outcome {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(status)) | Err(CircuitBreakerError::OperationFailed(status)) => status,
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(subject_id, "Circuit breaker open - billing unavailable");
                return Err(ProvisioningError::Unavailable("circuit breaker open".to_string()));
            }
        };

        tracing::error!(subject_id, code = ?status.code(), error = %status.message(), "Billing call failed");
        Err(self.map_status(status))
    }

    fn map_status(&self, status: Status) -> ProvisioningError {
        match status.code() {
            Code::DeadlineExceeded | Code::Cancelled => ProvisioningError::Timeout(self.request_timeout),
            Code::Unavailable | Code::Unknown => ProvisioningError::Unavailable(status.message().to_string()),
            _ => ProvisioningError::Rejected(format!("{:?}: {}", status.code(), status.message())),
        }
    }
}

#[async_trait]
impl AccountProvisioner for GrpcBillingClient {
    async fn create_account(
        &self,
        subject_id: &str,
        name: &str,
        address: &str,
    ) -> Result<ProvisionedAccount, ProvisioningError> {
        let request = BillingRequest {
            patient_id: subject_id.to_string(),
            name: name.to_string(),
            email: address.to_string(),
        };

        let response = self.guarded(subject_id, self.unary(request)).await?;

        let status: AccountStatus = response.status.parse()?;

        tracing::info!(
            subject_id,
            account_id = %response.account_id,
            status = %status,
            "Billing account provisioned"
        );

        Ok(ProvisionedAccount {
            account_id: response.account_id,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_malformed_endpoint() {
        let result = GrpcBillingClient::connect_lazy("not a uri", Duration::from_secs(1));
        assert!(matches!(result, Err(ProvisioningError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_status_codes_map_to_provisioning_errors() {
        let client = GrpcBillingClient::connect_lazy("http://127.0.0.1:9001", Duration::from_secs(3)).unwrap();

        assert!(matches!(
            client.map_status(Status::deadline_exceeded("slow")),
            ProvisioningError::Timeout(d) if d == Duration::from_secs(3)
        ));
        assert!(matches!(
            client.map_status(Status::unavailable("down")),
            ProvisioningError::Unavailable(_)
        ));
        assert!(matches!(
            client.map_status(Status::invalid_argument("bad email")),
            ProvisioningError::Rejected(_)
        ));
        assert_eq!(client.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_rejected_requests_leave_breaker_closed() {
        let client = GrpcBillingClient::connect_lazy("http://127.0.0.1:9001", Duration::from_secs(1)).unwrap();

        for _ in 0..10 {
            let result = client
                .guarded("12345", async { Err::<BillingResponse, _>(Status::invalid_argument("bad email")) })
                .await;
            assert!(matches!(result, Err(ProvisioningError::Rejected(_))));
        }

        assert_eq!(client.circuit_state(), CircuitState::Closed);
        let ok = client
            .guarded("12345", async {
                Ok::<_, Status>(BillingResponse {
                    account_id: "12345".to_string(),
                    status: "ACTIVE".to_string(),
                })
            })
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_billing_opens_breaker() {
        let client = GrpcBillingClient::connect_lazy("http://127.0.0.1:9001", Duration::from_secs(1)).unwrap();

        for _ in 0..5 {
            let _ = client.guarded("12345", async { Err::<BillingResponse, _>(Status::unavailable("down")) }).await;
        }

        assert_eq!(client.circuit_state(), CircuitState::Open);
        let result = client
            .guarded("12345", async { Err::<BillingResponse, _>(Status::invalid_argument("never sent")) })
            .await;
        assert!(matches!(result, Err(ProvisioningError::Unavailable(msg)) if msg == "circuit breaker open"));
    }
}
