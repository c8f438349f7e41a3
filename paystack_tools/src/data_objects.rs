use btx_common::Cents;
use serde::{Deserialize, Serialize};

/// Paystack's universal response envelope. `status: false` means the request was understood but refused; the refusal
/// reason lives in `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: bool,
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundData {
    pub id: i64,
    /// `pending`, `processing` or `processed`. A refund that was accepted will settle; only a refusal (envelope
    /// `status: false`) means no money moves.
    pub status: String,
    #[serde(default)]
    pub amount: Option<Cents>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionData {
    pub reference: String,
    /// `success`, `failed` or `abandoned`.
    pub status: String,
    pub amount: Cents,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientData {
    pub recipient_code: String,
    #[serde(default)]
    pub active: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn refusal_envelope_carries_no_data() {
        let json = r#"{"status": false, "message": "Transaction has been fully refunded"}"#;
        let parsed: ApiResponse<RefundData> = serde_json::from_str(json).unwrap();
        assert!(!parsed.status);
        assert!(parsed.data.is_none());
    }

    #[test]
    fn verify_payload_parses() {
        let json = r#"{
            "status": true,
            "message": "Verification successful",
            "data": {"reference": "FEE-REF-1", "status": "success", "amount": 5000, "currency": "ZAR"}
        }"#;
        let parsed: ApiResponse<TransactionData> = serde_json::from_str(json).unwrap();
        let data = parsed.data.unwrap();
        assert_eq!(data.status, "success");
        assert_eq!(data.amount, Cents::from(5_000));
    }
}
