use crate::application::Application;
use crate::units::{format_from_bytes, parse_to_bytes, split_formatted, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cap on the second tranche (0.5 PiB).
pub const HALF_PIB: u64 = 1 << 49;
/// Cap on the third tranche (1 PiB).
pub const ONE_PIB: u64 = 1 << 50;
/// Cap on every tranche after the third (2 PiB).
pub const TWO_PIB: u64 = 1 << 51;

/// Units a refill request may be denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefillUnit {
    #[serde(rename = "GiB")]
    Gib,
    #[serde(rename = "TiB")]
    Tib,
    #[serde(rename = "PiB")]
    Pib,
}

impl RefillUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gib => "GiB",
            Self::Tib => "TiB",
            Self::Pib => "PiB",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "GiB" => Some(Self::Gib),
            "TiB" => Some(Self::Tib),
            "PiB" => Some(Self::Pib),
            _ => None,
        }
    }
}

impl fmt::Display for RefillUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suggested size of the applicant's next datacap tranche.
///
/// `{amount: "0", unit: GiB}` is the zero sentinel: no further allocation due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAmount {
    pub amount: String,
    pub unit: RefillUnit,
}

impl RequestAmount {
    pub fn zero() -> Self {
        Self {
            amount: String::from("0"),
            unit: RefillUnit::Gib,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == "0"
    }

    /// Byte equivalent of the suggestion.
    pub fn bytes(&self) -> Result<u64, ParseError> {
        parse_to_bytes(&format!("{}{}", self.amount, self.unit.as_str()))
    }
}

impl fmt::Display for RequestAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.as_str())
    }
}

/// Compute the suggested next request size for an application.
///
/// Fails only when a capacity string on the record itself is malformed; the
/// underlying policy is total.
pub fn next_request(application: &Application) -> Result<RequestAmount, ParseError> {
    let total_granted = application.total_granted_bytes()?;
    let total_requested = application.total_requested_bytes()?;
    let weekly_allocation = application.weekly_allocation_bytes()?;

    Ok(allocation_to_request(
        application.request_count(),
        total_granted,
        total_requested,
        weekly_allocation,
    ))
}

/// Tiered sizing decision, keyed by the 0-based request number.
///
/// Tranches ramp up with demonstrated spend: half a week's allocation (capped
/// at 5% of the total entitlement) to start, then one, two and four weeks of
/// allocation capped at 0.5, 1 and 2 PiB respectively. Candidate arithmetic is
/// done in doubles and floored late, matching the grant ledger's accounting.
pub fn allocation_to_request(
    request_number: usize,
    total_granted: u64,
    total_requested: u64,
    weekly_allocation: u64,
) -> RequestAmount {
    let weekly = weekly_allocation as f64;
    let requested = total_requested as f64;

    let candidate = match request_number {
        0 => {
            if weekly / 2.0 <= requested * 0.05 {
                weekly / 2.0
            } else {
                requested * 0.05
            }
        }
        1 => {
            if weekly <= HALF_PIB as f64 {
                weekly
            } else {
                HALF_PIB as f64
            }
        }
        2 => {
            if weekly * 2.0 <= ONE_PIB as f64 {
                weekly * 2.0
            } else {
                ONE_PIB as f64
            }
        }
        _ => {
            if weekly * 4.0 <= TWO_PIB as f64 {
                weekly * 4.0
            } else {
                TWO_PIB as f64
            }
        }
    };

    let sum_with_candidate = (candidate + total_granted as f64).floor();
    if sum_with_candidate > requested {
        // Remaining entitlement is smaller than a full tier step. The exact
        // remainder (requested - granted) is known here but not offered.
        // TODO: decide whether the final tranche should top up to the exact
        // remaining entitlement instead of stopping.
        return RequestAmount::zero();
    }
    if candidate <= 0.0 {
        return RequestAmount::zero();
    }

    let (amount, unit) = split_formatted(&format_from_bytes(candidate.floor() as u64, true));
    match RefillUnit::from_suffix(&unit) {
        Some(unit) => RequestAmount { amount, unit },
        None => RequestAmount::zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(n: usize, granted: u64, requested: u64, weekly: u64) -> RequestAmount {
        allocation_to_request(n, granted, requested, weekly)
    }

    #[test]
    fn first_request_takes_lesser_of_half_week_and_five_percent() {
        // weekly/2 = 0.5PiB, 5% of 10PiB = 0.5PiB: tie resolves identically.
        let amount = request(0, 0, 10 * ONE_PIB, ONE_PIB);
        assert_eq!(amount.amount, "0.5");
        assert_eq!(amount.unit, RefillUnit::Pib);

        // 5% of the entitlement binds when the weekly rate is generous.
        let amount = request(0, 0, 10 * (1u64 << 40), 8 * (1u64 << 40));
        assert_eq!(amount.amount, "0.5");
        assert_eq!(amount.unit, RefillUnit::Tib);
    }

    #[test]
    fn second_request_caps_at_half_pib() {
        let amount = request(1, 0, 100 * ONE_PIB, ONE_PIB);
        assert_eq!(amount.bytes().unwrap(), HALF_PIB);

        let amount = request(1, 0, 100 * ONE_PIB, 1u64 << 45);
        assert_eq!(amount.bytes().unwrap(), 1u64 << 45);
    }

    #[test]
    fn third_request_caps_at_one_pib() {
        // weekly = 2^48: doubled is 2^49, under the 1PiB cap.
        let amount = request(2, 0, 100 * ONE_PIB, 1u64 << 48);
        assert_eq!(amount.bytes().unwrap(), 1u64 << 49);

        let amount = request(2, 0, 100 * ONE_PIB, ONE_PIB);
        assert_eq!(amount.bytes().unwrap(), ONE_PIB);
    }

    #[test]
    fn later_requests_cap_at_two_pib() {
        for n in [3, 4, 10] {
            let amount = request(n, 0, 100 * ONE_PIB, ONE_PIB);
            assert_eq!(amount.bytes().unwrap(), TWO_PIB);

            let amount = request(n, 0, 100 * ONE_PIB, 1u64 << 40);
            assert_eq!(amount.bytes().unwrap(), 1u64 << 42);
        }
    }

    #[test]
    fn exhaustion_returns_zero_sentinel_not_remainder() {
        let requested = 10 * ONE_PIB;
        let amount = request(3, requested - 10, requested, ONE_PIB);
        assert_eq!(amount, RequestAmount::zero());
        assert_eq!(amount.unit, RefillUnit::Gib);
    }

    #[test]
    fn zero_weekly_rate_returns_zero_sentinel() {
        for n in 0..5 {
            assert_eq!(request(n, 0, 10 * ONE_PIB, 0), RequestAmount::zero());
        }
    }

    #[test]
    fn sub_gib_candidate_returns_zero_sentinel() {
        // A 1MiB weekly rate formats as MiB, outside the refill unit set.
        let amount = request(1, 0, 10 * ONE_PIB, 1 << 20);
        assert_eq!(amount, RequestAmount::zero());
    }

    #[test]
    fn exact_fit_is_still_offered() {
        // granted + candidate == requested does not trip the ceiling.
        let amount = request(1, HALF_PIB, ONE_PIB, HALF_PIB);
        assert_eq!(amount.bytes().unwrap(), HALF_PIB);
    }

    #[test]
    fn end_to_end_first_request() {
        let app: Application =
            serde_json::from_value(sample_application_record()).unwrap();
        let amount = next_request(&app).unwrap();
        assert_eq!(amount.amount, "0.5");
        assert_eq!(amount.unit, RefillUnit::Pib);
    }

    #[test]
    fn end_to_end_surfaces_parse_errors() {
        let mut record = sample_application_record();
        record["Datacap"]["Weekly Allocation"] = serde_json::json!("1QiB");
        let app: Application = serde_json::from_value(record).unwrap();
        assert!(next_request(&app).is_err());
    }

    fn sample_application_record() -> serde_json::Value {
        serde_json::json!({
            "Version": 1,
            "ID": "f1abc123",
            "Issue Number": "58",
            "Client": { "Name": "Fresh Applicant" },
            "Datacap": {
                "Type": "ldn-v3",
                "Total Requested Amount": "10PiB",
                "Weekly Allocation": "1PiB"
            },
            "Lifecycle": {
                "State": "Submitted",
                "Active": true,
                "Active Request ID": null
            },
            "Allocation Requests": []
        })
    }
}
