//! Gerrit REST client, used by patch/upload/branch-delete-merged-cl
//! (`spec.md` §4.6-§4.8). Kept at interface level per §1/§6: one minimal
//! `reqwest`-backed implementation so the binary links and runs, with the
//! full REST surface out of core scope.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GerritError {
    #[error("change {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("unexpected response from {0}")]
    BadResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStatus {
    New,
    Merged,
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct ChangeInfo {
    pub change_id: String,
    /// Gerrit's numeric change number (the `CL` in `change/<cl>/<ps>`).
    pub number: u64,
    /// Patchset number of `current_revision`.
    pub patchset: u64,
    pub project: String,
    pub subject: String,
    pub current_revision: String,
    pub status: ChangeStatus,
    pub fetch_ref: String,
}

pub trait GerritClient: Send + Sync {
    fn change_by_id(&self, host: &str, change_id: &str) -> Result<ChangeInfo, GerritError>;
    fn changes_by_topic(&self, host: &str, topic: &str) -> Result<Vec<ChangeInfo>, GerritError>;
    fn push_refspec(&self, remote: &str, local_ref: &str, refspec: &str) -> Result<(), GerritError>;

    /// Looks up the change that produced `commit` in `project`, if any
    /// (`spec.md` §4.9, "Diff two snapshots" CL walk).
    fn change_by_commit(&self, host: &str, project: &str, commit: &str) -> Result<Option<ChangeInfo>, GerritError>;
}

/// Strips Gerrit's anti-XSSI `)]}'` prefix before JSON parsing, same
/// convention every Gerrit REST client has to handle.
fn strip_xssi_prefix(body: &str) -> &str {
    body.strip_prefix(")]}'\n").unwrap_or(body)
}

#[derive(Debug, Deserialize)]
struct RawRevisionInfo {
    #[serde(rename = "ref")]
    fetch_ref: String,
    #[serde(rename = "_number")]
    number: u64,
}

#[derive(Debug, Deserialize)]
struct RawChangeInfo {
    id: String,
    #[serde(rename = "_number")]
    number: u64,
    project: String,
    subject: String,
    status: String,
    current_revision: String,
    revisions: std::collections::HashMap<String, RawRevisionInfo>,
}

impl TryFrom<RawChangeInfo> for ChangeInfo {
    type Error = GerritError;

    fn try_from(raw: RawChangeInfo) -> Result<Self, GerritError> {
        let status = match raw.status.as_str() {
            "NEW" => ChangeStatus::New,
            "MERGED" => ChangeStatus::Merged,
            "ABANDONED" => ChangeStatus::Abandoned,
            other => return Err(GerritError::BadResponse(format!("unknown status {other}"))),
        };
        let current_revision_info = raw.revisions.get(&raw.current_revision);
        let fetch_ref = current_revision_info.map(|r| r.fetch_ref.clone()).unwrap_or_default();
        let patchset = current_revision_info.map(|r| r.number).unwrap_or(1);
        Ok(ChangeInfo {
            change_id: raw.id,
            number: raw.number,
            patchset,
            project: raw.project,
            subject: raw.subject,
            current_revision: raw.current_revision,
            status,
            fetch_ref,
        })
    }
}

pub struct HttpGerritClient {
    http: reqwest::blocking::Client,
}

impl HttpGerritClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpGerritClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GerritClient for HttpGerritClient {
    fn change_by_id(&self, host: &str, change_id: &str) -> Result<ChangeInfo, GerritError> {
        let url = format!("{host}/changes/{change_id}?o=CURRENT_REVISION");
        let body = self.http.get(&url).send()?.error_for_status()?.text()?;
        let raw: RawChangeInfo = serde_json::from_str(strip_xssi_prefix(&body))
            .map_err(|_| GerritError::BadResponse(url.clone()))?;
        raw.try_into()
    }

    fn changes_by_topic(&self, host: &str, topic: &str) -> Result<Vec<ChangeInfo>, GerritError> {
        let url = format!("{host}/changes/?q=topic:{topic}&o=CURRENT_REVISION");
        let body = self.http.get(&url).send()?.error_for_status()?.text()?;
        let raw: Vec<RawChangeInfo> = serde_json::from_str(strip_xssi_prefix(&body))
            .map_err(|_| GerritError::BadResponse(url.clone()))?;
        raw.into_iter().map(ChangeInfo::try_from).collect()
    }

    fn push_refspec(&self, remote: &str, local_ref: &str, refspec: &str) -> Result<(), GerritError> {
        let arg = format!("{local_ref}:{refspec}");
        let status = std::process::Command::new("git")
            .args(["push", remote, &arg])
            .status()
            .map_err(|e| GerritError::BadResponse(e.to_string()))?;
        if !status.success() {
            return Err(GerritError::BadResponse(format!("git push {remote} {arg}")));
        }
        Ok(())
    }

    fn change_by_commit(&self, host: &str, project: &str, commit: &str) -> Result<Option<ChangeInfo>, GerritError> {
        let url = format!("{host}/changes/?q=commit:{commit}+project:{project}&o=CURRENT_REVISION");
        let body = self.http.get(&url).send()?.error_for_status()?.text()?;
        let raw: Vec<RawChangeInfo> = serde_json::from_str(strip_xssi_prefix(&body))
            .map_err(|_| GerritError::BadResponse(url.clone()))?;
        raw.into_iter().next().map(ChangeInfo::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_gerrit_xssi_guard() {
        assert_eq!(strip_xssi_prefix(")]}'\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_xssi_prefix("{\"a\":1}"), "{\"a\":1}");
    }
}
