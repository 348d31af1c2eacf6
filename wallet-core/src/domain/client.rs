//! Client domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::{Error, Result};

/// A ledger client, the owner of one or more accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Create a new client with a fresh id
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let now = Utc::now();
        let client = Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            created_at: now,
            updated_at: now,
        };
        client.validate()?;
        Ok(client)
    }

    /// Replace name and email, keeping the client valid
    pub fn update(&mut self, name: impl Into<String>, email: impl Into<String>) -> Result<()> {
        let mut updated = self.clone();
        updated.name = name.into().trim().to_string();
        updated.email = email.into().trim().to_string();
        updated.validate()?;
        updated.updated_at = Utc::now();
        *self = updated;
        Ok(())
    }

    /// Validate client data
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::validation("client name cannot be empty"));
        }
        if self.email.is_empty() {
            return Err(Error::validation("client email cannot be empty"));
        }
        // Structural check only: one '@' with something on both sides
        match self.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
                Ok(())
            }
            _ => Err(Error::validation(format!("invalid email '{}'", self.email))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client() {
        let client = Client::new("John Doe", "j@j.com").unwrap();
        assert_eq!(client.name, "John Doe");
        assert_eq!(client.email, "j@j.com");
        assert_eq!(client.created_at, client.updated_at);
    }

    #[test]
    fn test_new_client_rejects_empty_fields() {
        assert!(matches!(Client::new("", "j@j.com"), Err(Error::Validation(_))));
        assert!(matches!(Client::new("  ", "j@j.com"), Err(Error::Validation(_))));
        assert!(matches!(Client::new("John", ""), Err(Error::Validation(_))));
        assert!(matches!(Client::new("John", "not-an-email"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_update_keeps_old_values_on_error() {
        let mut client = Client::new("John", "j@j.com").unwrap();
        assert!(client.update("", "x@y.com").is_err());
        assert_eq!(client.name, "John");

        client.update("Jane", "jane@j.com").unwrap();
        assert_eq!(client.name, "Jane");
        assert!(client.updated_at >= client.created_at);
    }
}
