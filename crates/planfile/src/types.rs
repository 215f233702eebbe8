//! Plan data model: repository records and the signed deletion plan.

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PlanError, Result};
use crate::secret::Secret;

/// Only schema version this crate reads and writes.
pub const SCHEMA_VERSION: &str = "v1";

/// Host recorded for plans produced against github.com.
pub const DEFAULT_HOST: &str = "github.com";

type HmacSha256 = Hmac<Sha256>;

/// A repository targeted by a plan, as listed by the hosting provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoRecord {
    /// Owner login
    pub owner: String,
    /// Repository name without owner
    pub name: String,
    /// `owner/name`
    pub full_name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Private visibility
    #[serde(default)]
    pub is_private: bool,
    /// Repository is a fork
    #[serde(default)]
    pub is_fork: bool,
    /// Repository is archived (read-only) on the host
    #[serde(default)]
    pub is_archived: bool,
    /// Last update timestamp as reported by the host (RFC 3339 or empty)
    #[serde(default)]
    pub updated_at: String,
}

impl RepoRecord {
    /// Build a record from owner and name, deriving the full name.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        let owner = owner.into();
        let name = name.into();
        Self {
            full_name: format!("{owner}/{name}"),
            owner,
            name,
            ..Default::default()
        }
    }
}

/// Signed declaration of which repositories an operation targets.
///
/// Built once with [`DeletionPlan::new`], signed with [`DeletionPlan::sign`]
/// and treated as immutable afterwards. Any edit to any field other than
/// `fingerprint`/`signature` makes [`DeletionPlan::validate`] fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionPlan {
    pub schema_version: String,
    pub created_at: String,
    pub actor: String,
    pub host: String,
    pub repos: Vec<RepoRecord>,
    pub count: usize,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub tool_version: String,
}

/// Everything except fingerprint and signature, in a fixed field order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalPlan<'a> {
    schema_version: &'a str,
    created_at: &'a str,
    actor: &'a str,
    host: &'a str,
    repos: Vec<&'a RepoRecord>,
    count: usize,
    tool_version: &'a str,
}

impl DeletionPlan {
    /// Create an unsigned plan from a selection.
    ///
    /// Records are sorted by full name and de-duplicated on it, so two
    /// selections with the same members always yield the same plan content.
    pub fn new(
        actor: impl Into<String>,
        host: impl Into<String>,
        tool_version: impl Into<String>,
        targets: impl IntoIterator<Item = RepoRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut repos: Vec<RepoRecord> = targets.into_iter().collect();
        repos.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        repos.dedup_by(|later, earlier| later.full_name == earlier.full_name);

        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            created_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            actor: actor.into(),
            host: host.into(),
            count: repos.len(),
            repos,
            fingerprint: String::new(),
            signature: String::new(),
            tool_version: tool_version.into(),
        }
    }

    /// Hex SHA-256 over the canonical projection of the plan.
    pub fn compute_fingerprint(&self) -> Result<String> {
        let mut repos: Vec<&RepoRecord> = self.repos.iter().collect();
        repos.sort_by(|a, b| a.full_name.cmp(&b.full_name));

        let canonical = CanonicalPlan {
            schema_version: &self.schema_version,
            created_at: &self.created_at,
            actor: &self.actor,
            host: &self.host,
            repos,
            count: self.count,
            tool_version: &self.tool_version,
        };
        let bytes = serde_json::to_vec(&canonical)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Compute and store the fingerprint and its HMAC signature.
    pub fn sign(&mut self, secret: &Secret) -> Result<()> {
        let fingerprint = self.compute_fingerprint()?;
        let mut mac = mac_for(secret)?;
        mac.update(fingerprint.as_bytes());
        self.signature = hex::encode(mac.finalize().into_bytes());
        self.fingerprint = fingerprint;
        Ok(())
    }

    /// Check schema, count, timestamp, fingerprint and signature, in that order.
    ///
    /// Returns the first failing check. Callers must not perform any
    /// irreversible action unless this returns `Ok(())`.
    pub fn validate(&self, secret: &Secret) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(PlanError::UnsupportedSchema(self.schema_version.clone()));
        }
        if self.count != self.repos.len() {
            return Err(PlanError::CountMismatch {
                count: self.count,
                repos: self.repos.len(),
            });
        }
        DateTime::parse_from_rfc3339(&self.created_at).map_err(|source| {
            PlanError::InvalidCreatedAt {
                value: self.created_at.clone(),
                source,
            }
        })?;

        let fingerprint = self.compute_fingerprint()?;
        if fingerprint != self.fingerprint {
            return Err(PlanError::FingerprintMismatch);
        }

        let signature = hex::decode(self.signature.trim().to_ascii_lowercase())
            .map_err(|_| PlanError::InvalidSignature)?;
        let mut mac = mac_for(secret)?;
        mac.update(fingerprint.as_bytes());
        // verify_slice compares in constant time
        mac.verify_slice(&signature)
            .map_err(|_| PlanError::InvalidSignature)
    }

    /// First ten characters of the fingerprint, for commit messages and logs.
    pub fn short_fingerprint(&self) -> &str {
        short_fingerprint(&self.fingerprint)
    }
}

/// Truncate a fingerprint to ten characters.
pub fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..10).unwrap_or(fingerprint)
}

fn mac_for(secret: &Secret) -> Result<HmacSha256> {
    if secret.is_empty() {
        return Err(PlanError::EmptySecret);
    }
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).map_err(|_| PlanError::EmptySecret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 25, 10, 0, 0).unwrap()
    }

    fn secret() -> Secret {
        Secret::from_bytes(b"01234567890123456789012345678901".to_vec())
    }

    fn signed(repos: Vec<RepoRecord>) -> DeletionPlan {
        let mut plan = DeletionPlan::new("alice", DEFAULT_HOST, "test", repos, now());
        plan.sign(&secret()).unwrap();
        plan
    }

    #[test]
    fn test_new_sorts_and_dedups() {
        let plan = DeletionPlan::new(
            "alice",
            DEFAULT_HOST,
            "test",
            vec![
                RepoRecord::new("alice", "zeta"),
                RepoRecord::new("alice", "alpha"),
                RepoRecord::new("alice", "zeta"),
            ],
            now(),
        );
        let names: Vec<_> = plan.repos.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, ["alice/alpha", "alice/zeta"]);
        assert_eq!(plan.count, 2);
        assert_eq!(plan.created_at, "2026-02-25T10:00:00Z");
        assert!(plan.fingerprint.is_empty());
        assert!(plan.signature.is_empty());
    }

    #[test]
    fn test_sign_then_validate() {
        let plan = signed(vec![RepoRecord::new("alice", "r1")]);
        assert_eq!(plan.fingerprint.len(), 64);
        assert_eq!(plan.signature.len(), 64);
        plan.validate(&secret()).unwrap();
    }

    #[test]
    fn test_sign_rejects_empty_secret() {
        let mut plan = DeletionPlan::new("alice", DEFAULT_HOST, "test", vec![], now());
        let err = plan.sign(&Secret::from_bytes(Vec::new())).unwrap_err();
        assert!(matches!(err, PlanError::EmptySecret));
    }

    #[test]
    fn test_validate_detects_record_tamper() {
        let mut plan = signed(vec![RepoRecord::new("alice", "r1")]);
        plan.repos[0].name = "r2".into();
        assert!(matches!(
            plan.validate(&secret()),
            Err(PlanError::FingerprintMismatch)
        ));
    }

    #[test]
    fn test_validate_detects_header_tamper() {
        let mut plan = signed(vec![RepoRecord::new("alice", "r1")]);
        plan.actor = "mallory".into();
        assert!(matches!(
            plan.validate(&secret()),
            Err(PlanError::FingerprintMismatch)
        ));
    }

    #[test]
    fn test_validate_detects_recomputed_fingerprint() {
        // Consistent content with a forged fingerprint still fails the HMAC.
        let mut plan = signed(vec![RepoRecord::new("alice", "r1")]);
        plan.repos.push(RepoRecord::new("alice", "r2"));
        plan.count = 2;
        plan.fingerprint = plan.compute_fingerprint().unwrap();
        assert!(matches!(
            plan.validate(&secret()),
            Err(PlanError::InvalidSignature)
        ));
    }

    #[test]
    fn test_validate_with_other_secret_fails() {
        let plan = signed(vec![RepoRecord::new("alice", "r1")]);
        let other = Secret::from_bytes(vec![7u8; 32]);
        assert!(matches!(
            plan.validate(&other),
            Err(PlanError::InvalidSignature)
        ));
    }

    #[test]
    fn test_validate_accepts_uppercase_signature() {
        let mut plan = signed(vec![RepoRecord::new("alice", "r1")]);
        plan.signature = plan.signature.to_uppercase();
        plan.validate(&secret()).unwrap();
    }

    #[test]
    fn test_validate_specific_reasons() {
        let base = signed(vec![RepoRecord::new("alice", "r1")]);

        let mut plan = base.clone();
        plan.schema_version = "v2".into();
        assert!(matches!(
            plan.validate(&secret()),
            Err(PlanError::UnsupportedSchema(v)) if v == "v2"
        ));

        let mut plan = base.clone();
        plan.count = 5;
        assert!(matches!(
            plan.validate(&secret()),
            Err(PlanError::CountMismatch { count: 5, repos: 1 })
        ));

        let mut plan = base.clone();
        plan.created_at = "yesterday".into();
        assert!(matches!(
            plan.validate(&secret()),
            Err(PlanError::InvalidCreatedAt { .. })
        ));

        let mut plan = base;
        plan.signature = "not-hex".into();
        assert!(matches!(
            plan.validate(&secret()),
            Err(PlanError::InvalidSignature)
        ));
    }

    #[test]
    fn test_fingerprint_changes_with_every_record_field() {
        let mut record = RepoRecord::new("alice", "r1");
        record.updated_at = "2026-01-01T00:00:00Z".into();
        let base = DeletionPlan::new("alice", DEFAULT_HOST, "test", vec![record], now());
        let original = base.compute_fingerprint().unwrap();

        let mutations: Vec<fn(&mut RepoRecord)> = vec![
            |r| r.owner.push('x'),
            |r| r.name.push('x'),
            |r| r.full_name.push('x'),
            |r| r.description.push('x'),
            |r| r.is_private = !r.is_private,
            |r| r.is_fork = !r.is_fork,
            |r| r.is_archived = !r.is_archived,
            |r| r.updated_at.push('x'),
        ];
        for mutate in mutations {
            let mut plan = base.clone();
            mutate(&mut plan.repos[0]);
            assert_ne!(plan.compute_fingerprint().unwrap(), original);
        }
    }

    #[test]
    fn test_fingerprint_ignores_stored_order() {
        let plan = DeletionPlan::new(
            "alice",
            DEFAULT_HOST,
            "test",
            vec![RepoRecord::new("alice", "a"), RepoRecord::new("alice", "b")],
            now(),
        );
        let mut reordered = plan.clone();
        reordered.repos.reverse();
        assert_eq!(
            plan.compute_fingerprint().unwrap(),
            reordered.compute_fingerprint().unwrap()
        );
    }

    #[test]
    fn test_short_fingerprint() {
        let plan = signed(vec![
            RepoRecord::new("alice", "a"),
            RepoRecord::new("alice", "c"),
        ]);
        assert_eq!(plan.short_fingerprint().len(), 10);
        assert_eq!(short_fingerprint("abc"), "abc");
    }

    proptest! {
        #[test]
        fn fingerprint_is_independent_of_input_order(
            names in prop::collection::btree_set("[a-z]{1,8}", 1..8),
            shift in 0usize..8,
        ) {
            let records: Vec<RepoRecord> =
                names.iter().map(|n| RepoRecord::new("alice", n.as_str())).collect();
            let mut shuffled = records.clone();
            shuffled.reverse();
            let len = shuffled.len();
            shuffled.rotate_left(shift % len);

            let a = DeletionPlan::new("alice", DEFAULT_HOST, "test", records, now());
            let b = DeletionPlan::new("alice", DEFAULT_HOST, "test", shuffled, now());
            prop_assert_eq!(a.compute_fingerprint().unwrap(), b.compute_fingerprint().unwrap());
        }
    }
}
