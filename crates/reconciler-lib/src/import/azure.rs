//! Azure Reservations CSV export

use super::fields::Field;
use super::header::HeaderIndex;
use super::SourceRecord;
use crate::error::{ImportError, ImportErrors};
use crate::models::{AzureDetails, Commitment, Provider};
use std::io::Read;

/// One data row of the export, with cells resolved to canonical fields.
/// Empty cells are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AzureReservationRow {
    /// Label of the document the row came from
    pub label: String,
    /// 1-based line number in the file (the header is line 1)
    pub row: usize,
    pub provider: Option<String>,
    pub name: Option<String>,
    pub reservation_id: Option<String>,
    pub status: Option<String>,
    pub instance_type: Option<String>,
    pub reservation_type: Option<String>,
    pub region: Option<String>,
    pub quantity: Option<String>,
    pub purchase_date: Option<String>,
    pub expiration_date: Option<String>,
    pub term: Option<String>,
    pub scope: Option<String>,
    pub scope_subscription: Option<String>,
    pub scope_resource_group: Option<String>,
    pub deep_link: Option<String>,
}

/// Read an Azure reservations CSV.
///
/// A header-only (or entirely empty) file yields no records. Every
/// malformed row is reported; records are returned in row order.
pub fn parse_azure_csv<R: Read>(reader: R, label: &str) -> Result<Vec<SourceRecord>, ImportErrors> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|source| ImportError::Csv {
            location: format!("{label} header"),
            source,
        })?
        .clone();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Ok(Vec::new());
    }

    let index = HeaderIndex::resolve(headers.iter());
    if !index.has_required() {
        return Err(ImportError::MissingColumns {
            expected: Field::REQUIRED_ANY
                .iter()
                .map(|f| f.canonical_name())
                .collect(),
        }
        .into());
    }

    let mut records = Vec::new();
    let mut errors = ImportErrors::default();

    for (row_idx, result) in rdr.records().enumerate() {
        let row = row_idx + 2;
        match result {
            Ok(record) => {
                if record.iter().all(|cell| cell.is_empty()) {
                    continue;
                }
                records.push(SourceRecord::AzureImport(AzureReservationRow::from_record(
                    label, row, &record, &index,
                )));
            }
            Err(source) => errors.push(ImportError::Csv {
                location: format!("{label} row {row}"),
                source,
            }),
        }
    }

    if errors.is_empty() {
        Ok(records)
    } else {
        Err(errors)
    }
}

impl AzureReservationRow {
    pub fn from_record(
        label: &str,
        row: usize,
        record: &csv::StringRecord,
        index: &HeaderIndex,
    ) -> Self {
        let cell = |field: Field| index.value(record, field).map(str::to_string);
        Self {
            label: label.to_string(),
            row,
            provider: cell(Field::Provider),
            name: cell(Field::Name),
            reservation_id: cell(Field::ReservationId),
            status: cell(Field::Status),
            instance_type: cell(Field::InstanceType),
            reservation_type: cell(Field::ReservationType),
            region: cell(Field::Region),
            quantity: cell(Field::Quantity),
            purchase_date: cell(Field::PurchaseDate),
            expiration_date: cell(Field::ExpirationDate),
            term: cell(Field::Term),
            scope: cell(Field::Scope),
            scope_subscription: cell(Field::ScopeSubscription),
            scope_resource_group: cell(Field::ScopeResourceGroup),
            deep_link: cell(Field::DeepLink),
        }
    }

    fn location(&self) -> String {
        if self.label.is_empty() {
            format!("row {}", self.row)
        } else {
            format!("{} row {}", self.label, self.row)
        }
    }

    /// Explicit provider column first, then an Azure portal deep link
    pub fn determine_provider(&self) -> Result<Provider, ImportError> {
        if let Some(raw) = &self.provider {
            return Provider::parse(raw)
                .ok_or_else(|| ImportError::parse("provider", raw, self.location()));
        }

        match &self.deep_link {
            Some(link) if link.to_ascii_lowercase().contains("azure") => Ok(Provider::Azure),
            _ => Err(ImportError::ProviderUndetermined {
                location: self.location(),
                row: self.row,
            }),
        }
    }

    pub(crate) fn into_commitment(self) -> Result<Commitment, ImportError> {
        let provider = self.determine_provider()?;

        let name = self
            .name
            .clone()
            .ok_or_else(|| ImportError::parse("name", "", self.location()))?;

        let count = match &self.quantity {
            Some(raw) => match raw.parse::<i64>() {
                Ok(quantity) if quantity >= 1 => Some(quantity),
                _ => return Err(ImportError::parse("quantity", raw, self.location())),
            },
            None => None,
        };

        let details = AzureDetails {
            reservation_type: self.reservation_type,
            scope: self.scope,
            scope_subscription: self.scope_subscription,
            scope_resource_group: self.scope_resource_group,
            deep_link: self.deep_link,
        };

        let mut commitment = Commitment::new(provider, name);
        commitment.provider_id = self.reservation_id;
        commitment.commitment_type = self.instance_type;
        commitment.region = self.region;
        commitment.plan = self.term;
        commitment.start_timestamp = self.purchase_date;
        commitment.end_timestamp = self.expiration_date;
        commitment.count = count;
        commitment.provider_status = self.status;
        commitment.azure = (!details.is_empty()).then_some(details);

        Ok(commitment)
    }
}
