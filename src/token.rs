//! Bootstrap token parsing and generation
//!
//! Tokens authenticate the first join of new nodes during cluster bootstrap.
//! The wire format is the kubeadm one: `<id>.<secret>` where the id is 6 and
//! the secret 16 lowercase alphanumeric characters. The id is public (it
//! names the token in the cluster); the secret must never leak into logs.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result, DEFAULT_TOKEN_TTL_SECS};

/// Length of the public token id segment
pub const TOKEN_ID_LEN: usize = 6;

/// Length of the secret token segment
pub const TOKEN_SECRET_LEN: usize = 16;

const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A bootstrap token in `id.secret` form
///
/// Construction always validates the format; a value of this type is known
/// to be well-formed.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenString {
    id: String,
    secret: String,
}

impl TokenString {
    /// Generate a new random well-formed token
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut pick = |len: usize| -> String {
            (0..len)
                .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
                .collect()
        };
        Self {
            id: pick(TOKEN_ID_LEN),
            secret: pick(TOKEN_SECRET_LEN),
        }
    }

    /// The public token id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The token secret
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::str::FromStr for TokenString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (id, secret) = s.split_once('.').ok_or_else(|| {
            Error::invalid_token("expected the form \"<id>.<secret>\"")
        })?;
        if id.len() != TOKEN_ID_LEN {
            return Err(Error::invalid_token(format!(
                "token id must be {TOKEN_ID_LEN} characters"
            )));
        }
        if secret.len() != TOKEN_SECRET_LEN {
            return Err(Error::invalid_token(format!(
                "token secret must be {TOKEN_SECRET_LEN} characters"
            )));
        }
        let valid = |part: &str| {
            part.bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        };
        if !valid(id) || !valid(secret) {
            return Err(Error::invalid_token(
                "token must consist of lower case alphanumeric characters",
            ));
        }
        Ok(Self {
            id: id.to_string(),
            secret: secret.to_string(),
        })
    }
}

impl std::fmt::Display for TokenString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.id, self.secret)
    }
}

impl std::fmt::Debug for TokenString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the secret in debug output
        write!(f, "{}.{}", self.id, "*".repeat(TOKEN_SECRET_LEN))
    }
}

impl Serialize for TokenString {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// A bootstrap token record as installed in the cluster
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapToken {
    /// The token itself
    pub token: TokenString,

    /// When the token expires; `None` means it never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,

    /// What the token may be used for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usages: Vec<String>,

    /// Groups the token authenticates as when used for authentication
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl BootstrapToken {
    /// Parse a token string into a full bootstrap token record
    ///
    /// The record starts with the standard defaults: a bounded lifetime of
    /// [`DEFAULT_TOKEN_TTL_SECS`](crate::DEFAULT_TOKEN_TTL_SECS), signing and
    /// authentication usages, and the default node-bootstrapper group.
    pub fn parse(token: &str) -> Result<Self> {
        Ok(Self {
            token: token.parse()?,
            expires: Some(Utc::now() + Duration::seconds(DEFAULT_TOKEN_TTL_SECS)),
            usages: vec!["signing".to_string(), "authentication".to_string()],
            groups: vec!["system:bootstrappers:kubeadm:default-node-token".to_string()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Token Format Stories
    // =========================================================================
    //
    // Bootstrap tokens are security-critical: they are the only credential a
    // brand-new node holds. These tests pin down the accepted format and the
    // secrecy guarantees.

    /// Story: well-formed tokens parse and round-trip verbatim
    #[test]
    fn story_well_formed_tokens_round_trip() {
        let token: TokenString = "abcdef.0123456789abcdef".parse().unwrap();
        assert_eq!(token.id(), "abcdef");
        assert_eq!(token.secret(), "0123456789abcdef");
        assert_eq!(token.to_string(), "abcdef.0123456789abcdef");
    }

    /// Story: malformed tokens are rejected with a reason
    ///
    /// The reason never echoes the input; a mistyped token may still be a
    /// near-miss of a real secret.
    #[test]
    fn story_malformed_tokens_are_rejected() {
        let cases = [
            "no-separator",
            "short.0123456789abcdef",
            "abcdef.shortsecret",
            "ABCDEF.0123456789abcdef",
            "abcdef.0123456789ABCDEF",
            "abc_ef.0123456789abcdef",
            "",
        ];
        for case in cases {
            let result = case.parse::<TokenString>();
            assert!(result.is_err(), "expected rejection of {case:?}");
            assert!(matches!(result.unwrap_err(), Error::InvalidToken(_)));
        }
    }

    /// Story: rejection messages do not echo the candidate token
    #[test]
    fn story_rejection_does_not_leak_the_candidate() {
        let err = "abcdef.0123456789ABCDEF".parse::<TokenString>().unwrap_err();
        assert!(!err.to_string().contains("ABCDEF"));
    }

    /// Story: generated tokens are well-formed and unique
    #[test]
    fn story_generated_tokens_are_well_formed_and_unique() {
        let one = TokenString::generate();
        let two = TokenString::generate();

        // Generated output must satisfy the parser
        assert!(one.to_string().parse::<TokenString>().is_ok());
        assert_eq!(one.id().len(), TOKEN_ID_LEN);
        assert_eq!(one.secret().len(), TOKEN_SECRET_LEN);

        // Collision probability is negligible
        assert_ne!(one.to_string(), two.to_string());
    }

    /// Story: debug output never exposes the secret segment
    ///
    /// Tokens routinely end up in tracing output via derived Debug impls on
    /// enclosing structs. Only the public id may appear.
    #[test]
    fn story_debug_output_protects_the_secret() {
        let token: TokenString = "abcdef.0123456789abcdef".parse().unwrap();
        let debug = format!("{token:?}");
        assert!(debug.contains("abcdef"));
        assert!(!debug.contains("0123456789abcdef"));

        let record = BootstrapToken::parse("abcdef.0123456789abcdef").unwrap();
        let debug = format!("{record:?}");
        assert!(!debug.contains("0123456789abcdef"));
    }

    /// Story: a parsed record starts with a bounded lifetime
    ///
    /// Token construction defaults to expiring; it is the derivation engine
    /// that deliberately lifts the expiry for bootstrap configurations.
    #[test]
    fn story_parsed_records_default_to_expiring() {
        let before = Utc::now();
        let record = BootstrapToken::parse("abcdef.0123456789abcdef").unwrap();
        let expires = record.expires.expect("default expiry should be set");
        assert!(expires >= before + Duration::seconds(DEFAULT_TOKEN_TTL_SECS - 60));
        assert!(expires <= Utc::now() + Duration::seconds(DEFAULT_TOKEN_TTL_SECS + 60));

        assert!(record.usages.contains(&"signing".to_string()));
        assert!(record.usages.contains(&"authentication".to_string()));
        assert_eq!(record.groups.len(), 1);
    }

    /// Story: records serialize with the token as a plain string
    #[test]
    fn story_records_serialize_for_the_wire() {
        let record = BootstrapToken {
            token: "abcdef.0123456789abcdef".parse().unwrap(),
            expires: None,
            usages: vec!["signing".to_string()],
            groups: vec![],
        };
        let yaml = serde_yaml::to_string(&record).unwrap();
        assert!(yaml.contains("token: abcdef.0123456789abcdef"));
        assert!(!yaml.contains("expires"));

        let parsed: BootstrapToken = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(record, parsed);
    }

    /// Story: deserializing a malformed token string fails
    #[test]
    fn story_deserialization_validates_format() {
        let result: std::result::Result<TokenString, _> =
            serde_yaml::from_str("not-a-token");
        assert!(result.is_err());
    }
}
