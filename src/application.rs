use crate::units::{parse_to_bytes, ParseError};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A datacap application record as stored in an allocator registry.
///
/// Wire field names carry spaces; the record is created and mutated by the
/// governance workflow, the planner only reads snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    #[serde(rename = "Version")]
    pub version: u64,

    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Issue Number")]
    pub issue_number: String,

    #[serde(rename = "Client")]
    pub client: Client,

    #[serde(rename = "Project", default)]
    pub project: serde_json::Value,

    #[serde(rename = "Datacap")]
    pub datacap: Datacap,

    #[serde(rename = "Lifecycle")]
    pub lifecycle: Lifecycle,

    #[serde(rename = "Allocation Requests", default)]
    pub allocation_requests: Vec<AllocationRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Region", default)]
    pub region: String,

    #[serde(rename = "Industry", default)]
    pub industry: String,

    #[serde(rename = "Website", default)]
    pub website: String,

    #[serde(rename = "Social Media", default)]
    pub social_media: String,

    #[serde(rename = "Social Media Type", default)]
    pub social_media_type: String,

    #[serde(rename = "Role", default)]
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datacap {
    #[serde(rename = "Type")]
    pub kind: String,

    #[serde(rename = "Data Type", default)]
    pub data_type: String,

    /// Total entitlement, human-readable capacity notation (e.g. `10PiB`).
    #[serde(rename = "Total Requested Amount")]
    pub total_requested_amount: String,

    #[serde(rename = "Single Size Dataset", default)]
    pub single_size_dataset: String,

    #[serde(rename = "Replicas", default)]
    pub replicas: u64,

    /// Expected weekly spend rate, same notation.
    #[serde(rename = "Weekly Allocation")]
    pub weekly_allocation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lifecycle {
    #[serde(rename = "State")]
    pub state: LifecycleState,

    #[serde(rename = "Validated At", default)]
    pub validated_at: String,

    #[serde(rename = "Validated By", default)]
    pub validated_by: String,

    #[serde(rename = "Active")]
    pub active: bool,

    #[serde(rename = "Updated At", default)]
    pub updated_at: String,

    #[serde(rename = "Active Request ID", default)]
    pub active_request_id: Option<String>,

    #[serde(rename = "On Chain Address", default)]
    pub on_chain_address: String,

    #[serde(rename = "Multisig Address", default)]
    pub multisig_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Submitted,
    ReadyToSign,
    StartSignDatacap,
    Granted,
    TotalDatacapReached,
    Error,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::ReadyToSign => "ReadyToSign",
            Self::StartSignDatacap => "StartSignDatacap",
            Self::Granted => "Granted",
            Self::TotalDatacapReached => "TotalDatacapReached",
            Self::Error => "Error",
        }
    }

    /// Reviewer-facing label, matching the governance board wording.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Submitted => "Pending Governance Review",
            Self::ReadyToSign => "Ready to sign",
            Self::StartSignDatacap => "Start sign datacap",
            Self::Granted => "Granted",
            Self::TotalDatacapReached => "Total datacap reached",
            Self::Error => "Error",
        }
    }
}

/// One tranche of the application's datacap, granted or in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Request Type")]
    pub request_type: RequestType,

    #[serde(rename = "Created At", default)]
    pub created_at: String,

    #[serde(rename = "Updated At", default)]
    pub updated_at: String,

    /// At most one request per application is active at a time.
    #[serde(rename = "Active")]
    pub active: bool,

    /// Empty or absent until the tranche is finalized.
    #[serde(rename = "Allocation Amount", default)]
    pub allocation_amount: Option<String>,

    #[serde(rename = "Signers", default)]
    pub signers: Vec<Signer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    First,
    Refill,
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signer {
    #[serde(rename = "Message CID", default)]
    pub message_cid: String,

    #[serde(rename = "Signing Address", default)]
    pub signing_address: String,

    #[serde(rename = "Created At", default)]
    pub created_at: String,

    #[serde(rename = "Github Username", default)]
    pub github_username: String,
}

/// Signatures required before a tranche counts as granted on chain.
const GRANT_SIGNER_COUNT: usize = 2;

impl Application {
    /// Number of allocation requests recorded so far (the 0-based index of the
    /// next one).
    pub fn request_count(&self) -> usize {
        self.allocation_requests.len()
    }

    /// Byte sum of all recorded allocation amounts. Missing or empty amounts
    /// count as zero; malformed ones surface as [`ParseError`].
    pub fn total_granted_bytes(&self) -> Result<u64, ParseError> {
        let mut total = 0u64;
        for request in &self.allocation_requests {
            let amount = match request.allocation_amount.as_deref() {
                None | Some("") => continue,
                Some(amount) => amount,
            };
            total = total.saturating_add(parse_to_bytes(amount)?);
        }
        Ok(total)
    }

    pub fn total_requested_bytes(&self) -> Result<u64, ParseError> {
        parse_to_bytes(&self.datacap.total_requested_amount)
    }

    pub fn weekly_allocation_bytes(&self) -> Result<u64, ParseError> {
        parse_to_bytes(&self.datacap.weekly_allocation)
    }

    /// The in-flight tranche, if any.
    pub fn active_request(&self) -> Option<&AllocationRequest> {
        self.allocation_requests.iter().find(|r| r.active)
    }

    /// The most recently completed tranche: the request addressed by the
    /// lifecycle's active request id, once it is no longer active and carries
    /// the full signer set.
    pub fn last_granted_allocation(&self) -> Option<&AllocationRequest> {
        let active_id = self.lifecycle.active_request_id.as_deref()?;
        let request = self
            .allocation_requests
            .iter()
            .find(|r| r.id == active_id)?;

        if request.active || request.signers.len() != GRANT_SIGNER_COUNT {
            return None;
        }
        Some(request)
    }

    /// Whether cumulative grants have met the applicant's total entitlement.
    pub fn datacap_reached(&self) -> Result<bool, ParseError> {
        Ok(self.total_granted_bytes()? >= self.total_requested_bytes()?)
    }

    /// Days since the record was last touched by the governance workflow.
    /// `None` when the timestamp is absent or in an unexpected format.
    pub fn days_since_update(&self) -> Option<i64> {
        let updated = parse_wire_timestamp(&self.lifecycle.updated_at)?;
        Some((Utc::now() - updated).num_days())
    }
}

/// The registry writes `YYYY-MM-DD HH:MM:SS.fffffffff UTC`; older records use
/// RFC 3339.
fn parse_wire_timestamp(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }
    let stripped = input.strip_suffix(" UTC")?;
    NaiveDateTime::parse_from_str(stripped, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> serde_json::Value {
        serde_json::json!({
            "Version": 1,
            "ID": "f1abc123",
            "Issue Number": "171",
            "Client": {
                "Name": "Example Storage Co",
                "Region": "Europe",
                "Industry": "Web3",
                "Website": "https://example.org",
                "Social Media": "",
                "Social Media Type": "Slack",
                "Role": "storage provider"
            },
            "Project": {},
            "Datacap": {
                "Type": "ldn-v3",
                "Data Type": "Public, Open Dataset",
                "Total Requested Amount": "10PiB",
                "Single Size Dataset": "500GiB",
                "Replicas": 8,
                "Weekly Allocation": "1PiB"
            },
            "Lifecycle": {
                "State": "Granted",
                "Validated At": "2024-05-21 15:08:28.772432986 UTC",
                "Validated By": "reviewer-bot",
                "Active": true,
                "Updated At": "2024-05-28 09:14:02.110003000 UTC",
                "Active Request ID": "req-2",
                "On Chain Address": "f1client",
                "Multisig Address": "f2notary"
            },
            "Allocation Requests": [
                {
                    "ID": "req-1",
                    "Request Type": "First",
                    "Created At": "2024-05-21 15:08:28.772432986 UTC",
                    "Updated At": "2024-05-22 10:00:00.000000000 UTC",
                    "Active": false,
                    "Allocation Amount": "512TiB",
                    "Signers": [
                        { "Message CID": "bafy1", "Signing Address": "f1s1",
                          "Created At": "", "Github Username": "alice" },
                        { "Message CID": "bafy2", "Signing Address": "f1s2",
                          "Created At": "", "Github Username": "bob" }
                    ]
                },
                {
                    "ID": "req-2",
                    "Request Type": "Refill",
                    "Created At": "2024-05-27 08:00:00.000000000 UTC",
                    "Updated At": "2024-05-28 09:14:02.110003000 UTC",
                    "Active": true,
                    "Allocation Amount": "",
                    "Signers": []
                }
            ]
        })
    }

    #[test]
    fn deserializes_wire_record() {
        let app: Application = serde_json::from_value(sample_record()).unwrap();
        assert_eq!(app.client.name, "Example Storage Co");
        assert_eq!(app.lifecycle.state, LifecycleState::Granted);
        assert_eq!(app.request_count(), 2);
        assert_eq!(app.allocation_requests[0].request_type, RequestType::First);
        assert_eq!(
            app.allocation_requests[1].allocation_amount.as_deref(),
            Some("")
        );
    }

    #[test]
    fn granted_sum_skips_empty_amounts() {
        let app: Application = serde_json::from_value(sample_record()).unwrap();
        assert_eq!(app.total_granted_bytes().unwrap(), 512 * (1u64 << 40));
        assert_eq!(app.total_requested_bytes().unwrap(), 10 * (1u64 << 50));
        assert_eq!(app.weekly_allocation_bytes().unwrap(), 1u64 << 50);
        assert!(!app.datacap_reached().unwrap());
    }

    #[test]
    fn granted_sum_surfaces_malformed_amounts() {
        let mut record = sample_record();
        record["Allocation Requests"][0]["Allocation Amount"] =
            serde_json::json!("512XiB");
        let app: Application = serde_json::from_value(record).unwrap();
        assert!(app.total_granted_bytes().is_err());
    }

    #[test]
    fn active_and_last_granted_requests() {
        let app: Application = serde_json::from_value(sample_record()).unwrap();
        assert_eq!(app.active_request().map(|r| r.id.as_str()), Some("req-2"));
        // req-2 is still active, so nothing counts as the last grant yet.
        assert!(app.last_granted_allocation().is_none());

        let mut record = sample_record();
        record["Lifecycle"]["Active Request ID"] = serde_json::json!("req-1");
        let app: Application = serde_json::from_value(record).unwrap();
        assert_eq!(
            app.last_granted_allocation().map(|r| r.id.as_str()),
            Some("req-1")
        );
    }

    #[test]
    fn parses_wire_timestamps() {
        assert!(parse_wire_timestamp("2024-05-21 15:08:28.772432986 UTC").is_some());
        assert!(parse_wire_timestamp("2024-05-21T15:08:28+00:00").is_some());
        assert!(parse_wire_timestamp("yesterday").is_none());
        assert!(parse_wire_timestamp("").is_none());
    }
}
