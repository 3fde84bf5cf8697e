//! Canonical field names and their CSV header aliases
//!
//! Aliases are matched after header normalization (lower-case, spaces as
//! underscores) and are tried in declared order, so the first alias of a
//! field takes precedence over later synonyms.

/// Canonical fields of a reservation row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Provider,
    Name,
    ReservationId,
    Status,
    InstanceType,
    ReservationType,
    Region,
    Quantity,
    PurchaseDate,
    ExpirationDate,
    Term,
    Scope,
    ScopeSubscription,
    ScopeResourceGroup,
    DeepLink,
}

/// One dictionary entry
#[derive(Debug)]
pub struct FieldSpec {
    pub field: Field,
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
}

/// The field dictionary, indexed by `Field as usize`
pub static FIELD_DICTIONARY: [FieldSpec; Field::COUNT] = [
    FieldSpec {
        field: Field::Provider,
        canonical: "reservation.provider",
        aliases: &["provider", "cloud_provider"],
    },
    FieldSpec {
        field: Field::Name,
        canonical: "reservation.name",
        aliases: &["name", "reservation_name"],
    },
    FieldSpec {
        field: Field::ReservationId,
        canonical: "reservation.id",
        aliases: &["reservation_id", "id"],
    },
    FieldSpec {
        field: Field::Status,
        canonical: "reservation.status",
        aliases: &["status"],
    },
    FieldSpec {
        field: Field::InstanceType,
        canonical: "reservation.instance_type",
        aliases: &["instance_type", "product_name"],
    },
    FieldSpec {
        field: Field::ReservationType,
        canonical: "reservation.type",
        aliases: &["type", "reservation_type"],
    },
    FieldSpec {
        field: Field::Region,
        canonical: "reservation.region",
        aliases: &["region", "location"],
    },
    FieldSpec {
        field: Field::Quantity,
        canonical: "reservation.quantity",
        aliases: &["quantity", "count"],
    },
    FieldSpec {
        field: Field::PurchaseDate,
        canonical: "reservation.purchase_date",
        aliases: &["purchase_date", "start_date"],
    },
    FieldSpec {
        field: Field::ExpirationDate,
        canonical: "reservation.expiration_date",
        aliases: &["expiration_date", "end_date"],
    },
    FieldSpec {
        field: Field::Term,
        canonical: "reservation.term",
        aliases: &["term", "plan"],
    },
    FieldSpec {
        field: Field::Scope,
        canonical: "reservation.scope",
        aliases: &["scope"],
    },
    FieldSpec {
        field: Field::ScopeSubscription,
        canonical: "reservation.scope_subscription",
        aliases: &["scope_subscription"],
    },
    FieldSpec {
        field: Field::ScopeResourceGroup,
        canonical: "reservation.scope_resource_group",
        aliases: &["scope_resource_group"],
    },
    FieldSpec {
        field: Field::DeepLink,
        canonical: "reservation.deep_link_to_reservation",
        aliases: &["deep_link_to_reservation", "deep_link"],
    },
];

impl Field {
    pub const COUNT: usize = 15;

    pub const ALL: [Field; Field::COUNT] = [
        Field::Provider,
        Field::Name,
        Field::ReservationId,
        Field::Status,
        Field::InstanceType,
        Field::ReservationType,
        Field::Region,
        Field::Quantity,
        Field::PurchaseDate,
        Field::ExpirationDate,
        Field::Term,
        Field::Scope,
        Field::ScopeSubscription,
        Field::ScopeResourceGroup,
        Field::DeepLink,
    ];

    /// At least one of these must resolve for an Azure CSV to be importable
    pub const REQUIRED_ANY: [Field; 3] = [Field::Region, Field::InstanceType, Field::Name];

    pub fn spec(self) -> &'static FieldSpec {
        &FIELD_DICTIONARY[self as usize]
    }

    pub fn canonical_name(self) -> &'static str {
        self.spec().canonical
    }

    pub fn aliases(self) -> &'static [&'static str] {
        self.spec().aliases
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_dictionary_is_indexed_by_discriminant() {
        for field in Field::ALL {
            assert_eq!(field.spec().field, field);
        }
    }

    #[test]
    fn test_aliases_are_unique_across_fields() {
        let mut seen = HashSet::new();
        for spec in FIELD_DICTIONARY.iter() {
            assert!(!spec.aliases.is_empty(), "{} has no aliases", spec.canonical);
            for alias in spec.aliases {
                assert!(seen.insert(*alias), "alias {} is declared twice", alias);
            }
        }
    }

    #[test]
    fn test_synonym_pairs() {
        assert_eq!(Field::InstanceType.aliases(), &["instance_type", "product_name"]);
        assert!(Field::Quantity.aliases().contains(&"count"));
        assert!(Field::PurchaseDate.aliases().contains(&"start_date"));
        assert!(Field::ExpirationDate.aliases().contains(&"end_date"));
        assert_eq!(
            Field::DeepLink.canonical_name(),
            "reservation.deep_link_to_reservation"
        );
    }
}
