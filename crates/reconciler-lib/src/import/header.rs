//! CSV header resolution against the field dictionary

use super::fields::Field;

/// Normalize a header cell: trim, drop a byte-order mark, lower-case,
/// spaces to underscores
pub fn normalize_header(cell: &str) -> String {
    cell.trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

/// Column index of every canonical field in one CSV header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderIndex {
    columns: [Option<usize>; Field::COUNT],
}

impl HeaderIndex {
    /// Resolve a header row.
    ///
    /// For each field its aliases are tried in declared order and the first
    /// alias present wins; among duplicate cells the leftmost column wins.
    pub fn resolve<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized: Vec<String> = headers
            .into_iter()
            .map(|h| normalize_header(h.as_ref()))
            .collect();

        let mut columns = [None; Field::COUNT];
        for field in Field::ALL {
            columns[field as usize] = field
                .aliases()
                .iter()
                .find_map(|alias| normalized.iter().position(|h| h == alias));
        }

        Self { columns }
    }

    /// Column of a field, if it resolved
    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns[field as usize]
    }

    /// Column of a field in the host tool's convention: `-1` when absent
    pub fn position(&self, field: Field) -> i64 {
        self.get(field).map(|i| i as i64).unwrap_or(-1)
    }

    /// Whether no field resolved at all
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Option::is_none)
    }

    /// Whether at least one of the required fields resolved
    pub fn has_required(&self) -> bool {
        Field::REQUIRED_ANY.iter().any(|f| self.get(*f).is_some())
    }

    /// Trimmed, non-empty cell value of a field in a record
    pub fn value<'r>(&self, record: &'r csv::StringRecord, field: Field) -> Option<&'r str> {
        self.get(field)
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Deep link to reservation"), "deep_link_to_reservation");
        assert_eq!(normalize_header("\u{feff}Name "), "name");
        assert_eq!(normalize_header("Scope Resource Group"), "scope_resource_group");
    }

    #[test]
    fn test_empty_header_row_resolves_nothing() {
        let index = HeaderIndex::resolve(Vec::<String>::new());
        assert!(index.is_empty());
        for field in Field::ALL {
            assert_eq!(index.position(field), -1);
        }
    }

    #[test]
    fn test_resolves_azure_export_headers() {
        let headers = [
            "Name",
            "Reservation Id",
            "Status",
            "Expiration date",
            "Purchase date",
            "Term",
            "Scope",
            "Scope subscription",
            "Scope resource group",
            "Type",
            "Product name",
            "Region",
            "Quantity",
            "Deep link to reservation",
        ];
        let index = HeaderIndex::resolve(headers);

        assert_eq!(index.get(Field::Name), Some(0));
        assert_eq!(index.get(Field::ReservationId), Some(1));
        assert_eq!(index.get(Field::ExpirationDate), Some(3));
        assert_eq!(index.get(Field::PurchaseDate), Some(4));
        assert_eq!(index.get(Field::ReservationType), Some(9));
        assert_eq!(index.get(Field::InstanceType), Some(10));
        assert_eq!(index.get(Field::Region), Some(11));
        assert_eq!(index.get(Field::DeepLink), Some(13));
        assert_eq!(index.get(Field::Provider), None);
        assert!(index.has_required());
    }

    #[test]
    fn test_first_alias_wins_over_column_order() {
        let index = HeaderIndex::resolve(["product_name", "instance_type"]);
        assert_eq!(index.get(Field::InstanceType), Some(1));
    }

    #[test]
    fn test_duplicate_cells_resolve_leftmost() {
        let index = HeaderIndex::resolve(["region", "name", "Region"]);
        assert_eq!(index.get(Field::Region), Some(0));
    }

    #[test]
    fn test_unknown_columns_are_ignored() {
        let index = HeaderIndex::resolve(["billing_scope", "price"]);
        assert!(index.is_empty());
        assert!(!index.has_required());
    }

    #[test]
    fn test_value_skips_blank_cells() {
        let index = HeaderIndex::resolve(["name", "region"]);
        let record = csv::StringRecord::from(vec!["res-1", "   "]);
        assert_eq!(index.value(&record, Field::Name), Some("res-1"));
        assert_eq!(index.value(&record, Field::Region), None);
        assert_eq!(index.value(&record, Field::Quantity), None);
    }
}
