// Wire messages for `billing.BillingService`. Field names and tags follow the
// billing service's published schema, which still says patient/email.

#[derive(Clone, PartialEq, prost::Message)]
pub struct BillingRequest {
    #[prost(string, tag = "1")]
    pub patient_id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub email: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BillingResponse {
    #[prost(string, tag = "1")]
    pub account_id: String,
    #[prost(string, tag = "2")]
    pub status: String,
}
