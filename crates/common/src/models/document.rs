//! Processed document record as produced by the document backend

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Currency assumed when a document carries none
pub const DEFAULT_CURRENCY: &str = "USD";

/// Document category, used to pick a bucket partition
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentCategory {
    Agreement,
    PurchaseOrder,
    Invoice,
    #[default]
    Other,
}

impl DocumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Agreement => "agreement",
            DocumentCategory::PurchaseOrder => "purchase_order",
            DocumentCategory::Invoice => "invoice",
            DocumentCategory::Other => "other",
        }
    }
}

impl From<&str> for DocumentCategory {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "agreement" | "msa" | "contract" | "master_service_agreement" => {
                DocumentCategory::Agreement
            }
            "purchase_order" | "purchase-order" | "po" => DocumentCategory::PurchaseOrder,
            "invoice" => DocumentCategory::Invoice,
            _ => DocumentCategory::Other,
        }
    }
}

impl From<String> for DocumentCategory {
    fn from(s: String) -> Self {
        DocumentCategory::from(s.as_str())
    }
}

impl From<DocumentCategory> for String {
    fn from(category: DocumentCategory) -> Self {
        category.as_str().to_string()
    }
}

impl std::fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One processed financial document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(default, deserialize_with = "wire::lenient_text")]
    pub id: String,

    #[serde(default, deserialize_with = "wire::lenient_text")]
    pub title: String,

    #[serde(default, deserialize_with = "wire::lenient_category")]
    pub category: DocumentCategory,

    #[serde(default, deserialize_with = "wire::lenient_text")]
    pub client: String,

    #[serde(default, deserialize_with = "wire::optional_text")]
    pub vendor: Option<String>,

    #[serde(default, deserialize_with = "wire::lenient_number")]
    pub amount: f64,

    #[serde(default, deserialize_with = "wire::optional_text")]
    pub currency: Option<String>,

    #[serde(default, deserialize_with = "wire::lenient_text")]
    pub status: String,

    #[serde(default, deserialize_with = "wire::optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "wire::optional_timestamp")]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "wire::lenient_number")]
    pub confidence: f64,

    /// Id of a related document, as linked by the backend
    #[serde(default, deserialize_with = "wire::optional_text")]
    pub linked_to: Option<String>,

    /// Rendered file reference
    #[serde(default, deserialize_with = "wire::optional_text")]
    pub pdf_url: Option<String>,

    #[serde(default, deserialize_with = "wire::optional_text")]
    pub po_number: Option<String>,

    #[serde(default, deserialize_with = "wire::optional_text")]
    pub invoice_number: Option<String>,

    #[serde(default, deserialize_with = "wire::optional_text")]
    pub msa_number: Option<String>,
}

impl DocumentRecord {
    /// Minimal record, mostly useful for seeding stores and tests
    pub fn new(id: impl Into<String>, category: DocumentCategory) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            category,
            client: String::new(),
            vendor: None,
            amount: 0.0,
            currency: None,
            status: "processed".to_string(),
            created_at: Some(Utc::now()),
            due_date: None,
            confidence: 0.0,
            linked_to: None,
            pdf_url: None,
            po_number: None,
            invoice_number: None,
            msa_number: None,
        }
    }

    pub fn with_msa(mut self, msa_number: impl Into<String>) -> Self {
        self.msa_number = Some(msa_number.into());
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// MSA number used for grouping; blank values count as absent
    pub fn msa_key(&self) -> Option<&str> {
        self.msa_number
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Currency code, falling back to USD
    pub fn currency_or_default(&self) -> &str {
        self.currency
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
    }

    /// Reference shown next to the document: PO, invoice, MSA number or id
    pub fn display_reference(&self) -> &str {
        [&self.po_number, &self.invoice_number, &self.msa_number]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|reference| !reference.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

/// Partial update sent to the document store
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msa_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DocumentCategory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl DocumentUpdate {
    /// Update that only sets the MSA number
    pub fn tag_msa(msa_number: impl Into<String>) -> Self {
        Self {
            msa_number: Some(msa_number.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the present fields to a record
    pub fn apply_to(&self, document: &mut DocumentRecord) {
        if let Some(msa_number) = &self.msa_number {
            document.msa_number = Some(msa_number.clone());
        }
        if let Some(po_number) = &self.po_number {
            document.po_number = Some(po_number.clone());
        }
        if let Some(invoice_number) = &self.invoice_number {
            document.invoice_number = Some(invoice_number.clone());
        }
        if let Some(title) = &self.title {
            document.title = title.clone();
        }
        if let Some(status) = &self.status {
            document.status = status.clone();
        }
        if let Some(category) = self.category {
            document.category = category;
        }
        if let Some(due_date) = self.due_date {
            document.due_date = Some(due_date);
        }
    }
}

/// Parse the timestamp shapes the backend emits
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]` (as UTC) and bare dates
/// (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

mod wire {
    use super::*;
    use serde::de::IgnoredAny;

    /// Text, a number rendered as text, or anything else (ignored)
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Number(f64),
        Other(IgnoredAny),
    }

    impl Scalar {
        fn into_text(self) -> Option<String> {
            match self {
                Scalar::Text(text) => Some(text),
                Scalar::Integer(n) => Some(n.to_string()),
                Scalar::Number(n) => Some(n.to_string()),
                Scalar::Other(_) => None,
            }
        }
    }

    /// Text fields may arrive as strings or numbers; anything else becomes empty
    pub fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Scalar>::deserialize(deserializer)?;
        Ok(value.and_then(Scalar::into_text).unwrap_or_default())
    }

    /// Optional references may arrive as strings or numbers
    pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Scalar>::deserialize(deserializer)?;
        Ok(value.and_then(Scalar::into_text))
    }

    /// Missing, null or non-text categories fall back to `other`
    pub fn lenient_category<'de, D>(deserializer: D) -> Result<DocumentCategory, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Scalar>::deserialize(deserializer)?;
        Ok(match value {
            Some(Scalar::Text(text)) => DocumentCategory::from(text),
            _ => DocumentCategory::Other,
        })
    }

    /// Numbers may arrive as null, as numbers or as numeric strings
    pub fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Scalar>::deserialize(deserializer)?;
        Ok(match value {
            Some(Scalar::Number(n)) => n,
            Some(Scalar::Integer(n)) => n as f64,
            Some(Scalar::Text(text)) => text.trim().parse().unwrap_or_default(),
            Some(Scalar::Other(_)) | None => 0.0,
        })
    }

    /// Unparseable or non-text timestamps become `None`
    pub fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Scalar>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Scalar::Text(text)) => parse_timestamp(&text),
            _ => None,
        })
    }
}
