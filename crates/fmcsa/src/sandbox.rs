use async_trait::async_trait;
use tracing::warn;

use loadline_core::{CarrierInfo, CarrierRegistry, LookupFailure, McNumber};

/// Deterministic carrier table for demos and tests. The numbers mirror the
/// canned records dispatchers use when walking through the call flow.
pub struct SandboxRegistry;

impl SandboxRegistry {
    pub fn lookup(mc: &McNumber) -> Option<CarrierInfo> {
        let record = match mc.as_str() {
            "123456" => (
                "ABC Trucking LLC",
                Some("ABC Express"),
                "ACTIVE",
                "123 Main St, Springfield, IL 62701",
                "(555) 123-4567",
            ),
            "789012" => (
                "XYZ Transport Inc",
                None,
                "ACTIVE",
                "456 Oak Ave, Chicago, IL 60601",
                "(555) 987-6543",
            ),
            "345678" => (
                "Reliable Freight Solutions",
                Some("RFS Logistics"),
                "OUT-OF-SERVICE",
                "789 Pine St, Detroit, MI 48201",
                "(555) 456-7890",
            ),
            _ => return None,
        };

        let (legal_name, dba_name, operating_status, address, phone) = record;
        Some(CarrierInfo {
            mc_number: mc.clone(),
            legal_name: legal_name.to_string(),
            dba_name: dba_name.map(str::to_string),
            entity_type: "CARRIER".to_string(),
            operating_status: operating_status.to_string(),
            physical_address: Some(address.to_string()),
            phone: Some(phone.to_string()),
        })
    }
}

#[async_trait]
impl CarrierRegistry for SandboxRegistry {
    async fn verify(&self, mc: &McNumber) -> Result<Option<CarrierInfo>, LookupFailure> {
        Ok(Self::lookup(mc))
    }
}

/// Live lookup with a sandbox net under it. Substituting canned data on a
/// transport failure is a demo affordance, so this wrapper is only wired
/// up when the registry mode explicitly opts in.
pub struct FallbackRegistry<R> {
    primary: R,
}

impl<R> FallbackRegistry<R>
where
    R: CarrierRegistry,
{
    pub fn new(primary: R) -> Self {
        Self { primary }
    }
}

#[async_trait]
impl<R> CarrierRegistry for FallbackRegistry<R>
where
    R: CarrierRegistry,
{
    async fn verify(&self, mc: &McNumber) -> Result<Option<CarrierInfo>, LookupFailure> {
        match self.primary.verify(mc).await {
            Ok(found) => Ok(found),
            Err(failure) => {
                warn!(
                    event_name = "fmcsa.sandbox_fallback",
                    mc_number = %mc,
                    error = %failure,
                    "live lookup failed, answering from the sandbox table"
                );
                Ok(SandboxRegistry::lookup(mc))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use loadline_core::{CarrierInfo, CarrierRegistry, LookupFailure, McNumber};

    use super::{FallbackRegistry, SandboxRegistry};

    struct FailingRegistry;

    #[async_trait]
    impl CarrierRegistry for FailingRegistry {
        async fn verify(&self, _mc: &McNumber) -> Result<Option<CarrierInfo>, LookupFailure> {
            Err(LookupFailure("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn sandbox_serves_the_deterministic_carriers() {
        let registry = SandboxRegistry;

        let abc = registry
            .verify(&McNumber::new("MC-123456"))
            .await
            .expect("sandbox never fails")
            .expect("known carrier");
        assert_eq!(abc.legal_name, "ABC Trucking LLC");
        assert!(registry.is_eligible(&abc));

        let parked = registry
            .verify(&McNumber::new("345678"))
            .await
            .expect("sandbox never fails")
            .expect("known carrier");
        assert_eq!(parked.operating_status, "OUT-OF-SERVICE");
        assert!(!registry.is_eligible(&parked));

        let unknown = registry.verify(&McNumber::new("000001")).await.expect("sandbox never fails");
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn fallback_answers_from_the_sandbox_when_live_lookup_fails() {
        let registry = FallbackRegistry::new(FailingRegistry);

        let info = registry
            .verify(&McNumber::new("789012"))
            .await
            .expect("fallback should absorb the failure")
            .expect("sandbox carrier");
        assert_eq!(info.legal_name, "XYZ Transport Inc");

        let unknown = registry
            .verify(&McNumber::new("555555"))
            .await
            .expect("fallback should absorb the failure");
        assert!(unknown.is_none(), "carriers outside the table stay unknown");
    }

    #[tokio::test]
    async fn fallback_prefers_the_live_answer_when_available() {
        struct LiveRegistry;

        #[async_trait]
        impl CarrierRegistry for LiveRegistry {
            async fn verify(
                &self,
                mc: &McNumber,
            ) -> Result<Option<CarrierInfo>, LookupFailure> {
                Ok(Some(CarrierInfo {
                    mc_number: mc.clone(),
                    legal_name: "Live Answer Carriers".to_string(),
                    dba_name: None,
                    entity_type: "CARRIER".to_string(),
                    operating_status: "ACTIVE".to_string(),
                    physical_address: None,
                    phone: None,
                }))
            }
        }

        let registry = FallbackRegistry::new(LiveRegistry);
        let info = registry
            .verify(&McNumber::new("123456"))
            .await
            .expect("live path")
            .expect("carrier");
        assert_eq!(info.legal_name, "Live Answer Carriers");
    }
}
