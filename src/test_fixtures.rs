//! Shared wire-format fixtures for tests.

/// A minimal but complete application record in the registry wire format.
pub(crate) fn application_json(name: &str, total_requested: &str, weekly: &str) -> String {
    format!(
        r#"{{
  "Version": 1,
  "ID": "f1{name}",
  "Issue Number": "42",
  "Client": {{
    "Name": "{name}",
    "Region": "Europe",
    "Industry": "Web3",
    "Website": "https://example.org",
    "Social Media": "",
    "Social Media Type": "Slack",
    "Role": "data owner"
  }},
  "Project": {{}},
  "Datacap": {{
    "Type": "ldn-v3",
    "Data Type": "Public, Open Dataset",
    "Total Requested Amount": "{total_requested}",
    "Single Size Dataset": "500GiB",
    "Replicas": 8,
    "Weekly Allocation": "{weekly}"
  }},
  "Lifecycle": {{
    "State": "Granted",
    "Validated At": "2024-05-21 15:08:28.772432986 UTC",
    "Validated By": "reviewer-bot",
    "Active": true,
    "Updated At": "2024-05-28 09:14:02.110003000 UTC",
    "Active Request ID": "req-1",
    "On Chain Address": "f1client",
    "Multisig Address": "f2notary"
  }},
  "Allocation Requests": [
    {{
      "ID": "req-1",
      "Request Type": "First",
      "Created At": "2024-05-21 15:08:28.772432986 UTC",
      "Updated At": "2024-05-22 10:00:00.000000000 UTC",
      "Active": false,
      "Allocation Amount": "512GiB",
      "Signers": [
        {{ "Message CID": "bafy1", "Signing Address": "f1s1",
           "Created At": "", "Github Username": "alice" }},
        {{ "Message CID": "bafy2", "Signing Address": "f1s2",
           "Created At": "", "Github Username": "bob" }}
      ]
    }}
  ]
}}"#
    )
}
