//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype with the usual conversions.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Tenant that owns budgets, rewards and customers.
    TenantId
);
uuid_id!(
    /// Monetary budget funding reward issuance.
    BudgetId
);
uuid_id!(
    /// Single immutable ledger entry.
    LedgerEntryId
);
uuid_id!(
    /// One grant of a reward to a customer.
    IssuanceId
);
uuid_id!(
    /// Reward catalog entry.
    RewardId
);
uuid_id!(
    /// Loyalty programme member.
    CustomerId
);
uuid_id!(
    /// Campaign under which a reward was granted.
    CampaignId
);
uuid_id!(
    /// Row in a per-reward voucher code pool.
    VoucherCodeId
);
uuid_id!(
    /// Tenant-configured webhook endpoint.
    WebhookId
);
uuid_id!(
    /// Audit record of one webhook delivery try.
    DeliveryAttemptId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(BudgetId::new(), BudgetId::new());
        assert_ne!(IssuanceId::new(), IssuanceId::new());
    }

    #[test]
    fn id_parses_from_display() {
        let id = TenantId::new();
        let parsed: TenantId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn id_rejects_garbage() {
        assert!("not-a-uuid".parse::<BudgetId>().is_err());
    }

    #[test]
    fn id_serializes_transparently() {
        let uuid = Uuid::new_v4();
        let id = RewardId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}
