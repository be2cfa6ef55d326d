//! SARIF 2.1.0 serialization
//!
//! One run, one rule per category present, one result per finding, so the
//! output plugs into standard static-analysis-result consumers.

use super::{Finding, Severity};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Serialize)]
pub struct SarifLog {
    pub version: &'static str,
    #[serde(rename = "$schema")]
    pub schema: &'static str,
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Serialize)]
pub struct SarifRun {
    pub tool: SarifTool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Serialize)]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Serialize)]
pub struct SarifDriver {
    pub name: &'static str,
    pub version: &'static str,
    #[serde(rename = "informationUri")]
    pub information_uri: &'static str,
    pub rules: Vec<SarifRule>,
}

#[derive(Debug, Serialize)]
pub struct SarifRule {
    pub id: String,
    #[serde(rename = "shortDescription")]
    pub short_description: SarifText,
}

#[derive(Debug, Serialize)]
pub struct SarifText {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SarifResult {
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    pub level: &'static str,
    pub message: SarifText,
    pub fingerprints: SarifFingerprints,
    pub locations: Vec<SarifLocation>,
}

#[derive(Debug, Serialize)]
pub struct SarifFingerprints {
    #[serde(rename = "docrot/v1")]
    pub stable: String,
}

#[derive(Debug, Serialize)]
pub struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    pub physical_location: SarifPhysicalLocation,
}

#[derive(Debug, Serialize)]
pub struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    pub artifact_location: SarifArtifactLocation,
    pub region: SarifRegion,
}

#[derive(Debug, Serialize)]
pub struct SarifArtifactLocation {
    pub uri: String,
}

#[derive(Debug, Serialize)]
pub struct SarifRegion {
    #[serde(rename = "startLine")]
    pub start_line: usize,
}

fn level(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low => "note",
    }
}

/// Build the SARIF document for a finding list
pub fn to_sarif(findings: &[Finding]) -> SarifLog {
    // One rule per category present, ordered for determinism
    let categories: BTreeSet<String> = findings.iter().map(|f| f.category.to_string()).collect();

    let rules = categories
        .into_iter()
        .map(|id| SarifRule {
            short_description: SarifText { text: id.clone() },
            id,
        })
        .collect();

    let results = findings
        .iter()
        .map(|finding| SarifResult {
            rule_id: finding.category.to_string(),
            level: level(finding.severity),
            message: SarifText {
                text: finding.message.clone(),
            },
            fingerprints: SarifFingerprints {
                stable: finding.fingerprint.clone(),
            },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifactLocation {
                        uri: finding.file.clone(),
                    },
                    region: SarifRegion {
                        start_line: finding.line,
                    },
                },
            }],
        })
        .collect();

    SarifLog {
        version: "2.1.0",
        schema: "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: "docrot",
                    version: crate::VERSION,
                    information_uri: "https://github.com/docrot/docrot",
                    rules,
                },
            },
            results,
        }],
    }
}

/// Serialize findings as a SARIF JSON document
pub fn to_sarif_json(findings: &[Finding]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&to_sarif(findings))?)
}
