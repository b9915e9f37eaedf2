//! Token entity: one persisted `authtoken` row.
//!
//! Two variants share the table, selected by the `version` column:
//! - `1`: plain session / device token
//! - `2`: credential-recovery token carrying an opaque keypair and the
//!   user's credential encrypted under the public half

use serde::Serialize;
use std::fmt;

use crate::error::TokenError;

/// `version` value of a plain session token.
pub const SESSION_TOKEN_VERSION: i16 = 1;
/// `version` value of a credential-recovery token.
pub const RECOVERY_TOKEN_VERSION: i16 = 2;

/// Temporary tokens are swept by age, persistent ones never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Temporary,
    Persistent,
}

impl TokenType {
    pub fn as_i16(self) -> i16 {
        match self {
            TokenType::Temporary => 0,
            TokenType::Persistent => 1,
        }
    }
}

impl TryFrom<i16> for TokenType {
    type Error = TokenError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TokenType::Temporary),
            1 => Ok(TokenType::Persistent),
            other => Err(TokenError::InvalidRow(format!("unknown token type {other}"))),
        }
    }
}

/// "Remember me" marker, orthogonal to [`TokenType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RememberFlag {
    #[default]
    DoNotRemember,
    Remember,
}

impl RememberFlag {
    pub fn as_i16(self) -> i16 {
        match self {
            RememberFlag::DoNotRemember => 0,
            RememberFlag::Remember => 1,
        }
    }
}

impl TryFrom<i16> for RememberFlag {
    type Error = TokenError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RememberFlag::DoNotRemember),
            1 => Ok(RememberFlag::Remember),
            other => Err(TokenError::InvalidRow(format!("unknown remember flag {other}"))),
        }
    }
}

/// Keypair and encrypted credential of a recovery token.
///
/// Stored and returned as-is; generating the keys and decrypting the
/// credential happen outside this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveryMaterial {
    pub public_key: String,
    pub private_key: String,
    /// Credential encrypted under `public_key`. Absent for tokens issued
    /// without a password (e.g. SSO logins).
    pub password: Option<String>,
}

impl fmt::Debug for RecoveryMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryMaterial")
            .field("has_password", &self.password.is_some())
            .finish_non_exhaustive()
    }
}

/// Raw column values as read from, or written to, the backing store.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRow {
    pub id: i64,
    pub uid: String,
    pub login_name: String,
    pub name: String,
    pub token: String,
    pub token_type: i16,
    pub remember: i16,
    pub last_activity: i64,
    pub last_check: i64,
    pub version: i16,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub password: Option<String>,
}

impl TokenRow {
    /// Build the row a backend persists for `new` under the generated `id`.
    pub fn from_new(id: i64, new: &NewToken) -> Self {
        let recovery = new.recovery.as_ref();
        TokenRow {
            id,
            uid: new.uid.clone(),
            login_name: new.login_name.clone(),
            name: new.name.clone(),
            token: new.token.clone(),
            token_type: new.token_type.as_i16(),
            remember: new.remember.as_i16(),
            last_activity: new.last_activity,
            last_check: new.last_check,
            version: new.version(),
            public_key: recovery.map(|r| r.public_key.clone()),
            private_key: recovery.map(|r| r.private_key.clone()),
            password: recovery.and_then(|r| r.password.clone()),
        }
    }
}

impl fmt::Debug for TokenRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRow")
            .field("id", &self.id)
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("token_type", &self.token_type)
            .field("remember", &self.remember)
            .field("last_activity", &self.last_activity)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// A token about to be inserted. The id is assigned by storage.
#[derive(Clone)]
pub struct NewToken {
    pub uid: String,
    pub login_name: String,
    pub name: String,
    pub token: String,
    pub token_type: TokenType,
    pub remember: RememberFlag,
    pub last_activity: i64,
    pub last_check: i64,
    pub recovery: Option<RecoveryMaterial>,
}

impl NewToken {
    pub fn version(&self) -> i16 {
        if self.recovery.is_some() {
            RECOVERY_TOKEN_VERSION
        } else {
            SESSION_TOKEN_VERSION
        }
    }
}

impl fmt::Debug for NewToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewToken")
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("token_type", &self.token_type)
            .field("remember", &self.remember)
            .field("recovery", &self.recovery.is_some())
            .finish_non_exhaustive()
    }
}

/// One live session or app-password.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub id: i64,
    pub uid: String,
    pub login_name: String,
    pub name: String,
    pub token_type: TokenType,
    pub remember: RememberFlag,
    pub last_activity: i64,
    pub last_check: i64,
    token: String,
    recovery: Option<RecoveryMaterial>,
}

impl AuthToken {
    /// Map a stored row to the variant named by its `version` column.
    pub fn from_row(row: TokenRow) -> Result<Self, TokenError> {
        let token_type = TokenType::try_from(row.token_type)?;
        let remember = RememberFlag::try_from(row.remember)?;

        let recovery = match row.version {
            SESSION_TOKEN_VERSION => None,
            RECOVERY_TOKEN_VERSION => match (row.public_key, row.private_key) {
                (Some(public_key), Some(private_key)) => Some(RecoveryMaterial {
                    public_key,
                    private_key,
                    password: row.password,
                }),
                _ => {
                    return Err(TokenError::InvalidRow(format!(
                        "recovery token {} has no keypair",
                        row.id
                    )))
                }
            },
            other => {
                return Err(TokenError::InvalidRow(format!(
                    "unknown token version {other}"
                )))
            }
        };

        Ok(AuthToken {
            id: row.id,
            uid: row.uid,
            login_name: row.login_name,
            name: row.name,
            token_type,
            remember,
            last_activity: row.last_activity,
            last_check: row.last_check,
            token: row.token,
            recovery,
        })
    }

    /// The stored secret value (the lookup key for [`get_token`]).
    ///
    /// [`get_token`]: crate::store::TokenMapper::get_token
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn recovery(&self) -> Option<&RecoveryMaterial> {
        self.recovery.as_ref()
    }

    pub fn is_recovery_capable(&self) -> bool {
        self.recovery.is_some()
    }

    /// Metadata safe to show in device lists.
    pub fn info(&self) -> TokenInfo {
        TokenInfo {
            id: self.id,
            name: self.name.clone(),
            last_activity: self.last_activity,
            token_type: self.token_type,
            remember: self.remember,
        }
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("id", &self.id)
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("token_type", &self.token_type)
            .field("remember", &self.remember)
            .field("last_activity", &self.last_activity)
            .field("recovery", &self.recovery)
            .finish_non_exhaustive()
    }
}

/// Device-list view of a token. Never carries the secret.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub id: i64,
    pub name: String,
    pub last_activity: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub remember: RememberFlag,
}
