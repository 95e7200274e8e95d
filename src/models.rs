use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FinmanError, Result};

/// Stable identity of a transaction, independent of its field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| FinmanError::Parse(format!("invalid transaction id {raw:?}: {e}")))
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecurringGroupId(Uuid);

impl RecurringGroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| FinmanError::Parse(format!("invalid recurring group id {raw:?}: {e}")))
    }
}

impl Default for RecurringGroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecurringGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionCategory {
    Food,
    Unknown,
    Electronics,
    Rent,
    Transport,
    Entertainment,
    Insurances,
    Salary,
    Medical,
    Phone,
    OtherShopping,
    Fees,
    Renovation,
    Gifts,
    Transfer,
    Beauty,
    Clothing,
    Sport,
    Hobbies,
    Furniture,
    Holidays,
    Garden,
    Communication,
    Education,
    GovernmentalSupport,
    Interest,
}

impl TransactionCategory {
    pub const ALL: [TransactionCategory; 26] = [
        Self::Food,
        Self::Unknown,
        Self::Electronics,
        Self::Rent,
        Self::Transport,
        Self::Entertainment,
        Self::Insurances,
        Self::Salary,
        Self::Medical,
        Self::Phone,
        Self::OtherShopping,
        Self::Fees,
        Self::Renovation,
        Self::Gifts,
        Self::Transfer,
        Self::Beauty,
        Self::Clothing,
        Self::Sport,
        Self::Hobbies,
        Self::Furniture,
        Self::Holidays,
        Self::Garden,
        Self::Communication,
        Self::Education,
        Self::GovernmentalSupport,
        Self::Interest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Unknown => "Unknown",
            Self::Electronics => "Electronics",
            Self::Rent => "Rent",
            Self::Transport => "Transport",
            Self::Entertainment => "Entertainment",
            Self::Insurances => "Insurances",
            Self::Salary => "Salary",
            Self::Medical => "Medical",
            Self::Phone => "Phone",
            Self::OtherShopping => "OtherShopping",
            Self::Fees => "Fees",
            Self::Renovation => "Renovation",
            Self::Gifts => "Gifts",
            Self::Transfer => "Transfer",
            Self::Beauty => "Beauty",
            Self::Clothing => "Clothing",
            Self::Sport => "Sport",
            Self::Hobbies => "Hobbies",
            Self::Furniture => "Furniture",
            Self::Holidays => "Holidays",
            Self::Garden => "Garden",
            Self::Communication => "Communication",
            Self::Education => "Education",
            Self::GovernmentalSupport => "GovernmentalSupport",
            Self::Interest => "Interest",
        }
    }

    /// Map a category label as exported by the bank (German online banking
    /// labels) to a category. Falls back to the variant name itself.
    pub fn from_bank_label(label: &str) -> Result<Self> {
        let category = match label.trim() {
            "Lebensmittel" | "Restaurants & Cafes" | "Essen & Trinken (Sonstiges)" => Self::Food,
            "Unkategorisierte Ausgaben" | "Unkategorisierte Einnahmen" | "Einnahmen (Sonstiges)" => {
                Self::Unknown
            }
            "Elektronik & Computer" => Self::Electronics,
            "Miete" => Self::Rent,
            "Öffentliche Verkehrsmittel & Taxi"
            | "Flüge, Autos & Beförderung"
            | "Treibstoff"
            | "Kfz: Stellplatz"
            | "Mietwagen & Carsharing"
            | "Kfz: Finanzierung" => Self::Transport,
            "Musik, Filme & Apps"
            | "Computer- und Videospiele"
            | "Bücher, Zeitschriften & Spiele"
            | "Musik & Instrumente" => Self::Entertainment,
            "Versicherungen (Sonstiges)" | "Krankenversicherung" | "Zusatzversicherungen" => {
                Self::Insurances
            }
            "Gehalt & Lohn" => Self::Salary,
            "Arzneimittel & Medizinprodukte" | "Gesundheit & Pflege (Sonstiges)" | "Ärzte & Krankenhaus" => {
                Self::Medical
            }
            "Mobilfunk" => Self::Phone,
            "Einkäufe & Dienstleistungen (Sonstiges)" => Self::OtherShopping,
            "Gebühren & Zinsen" | "Steuern" => Self::Fees,
            "Renovierung & Instandhaltung" => Self::Renovation,
            "Geschenke & Spenden" => Self::Gifts,
            "Geldautomat & Barauszahlung" | "Umbuchung zwischen Konten" | "Zubuchung" => Self::Transfer,
            "Friseur & Körperpflege" => Self::Beauty,
            "Kleidung & Schuhe" => Self::Clothing,
            "Freizeit & Sport (Sonstiges)" | "Workout & Fitness" => Self::Sport,
            "Haushaltsgeräte & Einrichtung" => Self::Furniture,
            "Vereine & Mitgliedschaften"
            | "Spielzeug"
            | "Kino, Theater & Events"
            | "Bars, Clubs & Nachtleben" => Self::Hobbies,
            "Hotels & Unterkunft" => Self::Holidays,
            "Kommunikation & Unterhaltung" => Self::Communication,
            "Unterricht, Studiengebühren & Kurse" | "Ausbildung" => Self::Education,
            "Staatliche Hilfe" => Self::GovernmentalSupport,
            "Garten & Außenanlagen" => Self::Garden,
            "Zins- & Kapitalerträge" => Self::Interest,
            other => return other.parse(),
        };
        Ok(category)
    }
}

impl FromStr for TransactionCategory {
    type Err = FinmanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| FinmanError::UnknownCategory(s.to_string()))
    }
}

impl fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed amount in a single currency (ISO 4217 code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyAmount {
    pub amount: f64,
    pub currency: String,
}

impl CurrencyAmount {
    pub fn new(amount: f64, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
        }
    }
}

/// One bank statement line item.
///
/// Instances are plain values: the similarity core never mutates them, and
/// callers must not mutate a slice while it is being scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub booking_date: Option<NaiveDate>,
    pub value_date: Option<NaiveDate>,
    pub counterparty: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub booking_text: Option<String>,
    pub usage_text: Option<String>,
    pub category: Option<TransactionCategory>,
    pub tags: Vec<String>,
    pub amount: CurrencyAmount,
    pub recurring_group: Option<RecurringGroupId>,
}

impl Transaction {
    /// A transaction with a fresh identity and every optional field empty.
    pub fn new(amount: CurrencyAmount) -> Self {
        Self {
            id: TransactionId::new(),
            booking_date: None,
            value_date: None,
            counterparty: None,
            iban: None,
            bic: None,
            booking_text: None,
            usage_text: None,
            category: None,
            tags: Vec::new(),
            amount,
            recurring_group: None,
        }
    }

    /// Value equality: every field except identity and recurring group.
    pub fn same_record(&self, other: &Transaction) -> bool {
        self.booking_date == other.booking_date
            && self.value_date == other.value_date
            && self.counterparty == other.counterparty
            && self.iban == other.iban
            && self.bic == other.bic
            && self.booking_text == other.booking_text
            && self.usage_text == other.usage_text
            && self.category == other.category
            && self.tags == other.tags
            && self.amount == other.amount
    }

    /// Both dates are required before a transaction can be imported.
    pub fn is_incomplete(&self) -> bool {
        self.booking_date.is_none() || self.value_date.is_none()
    }

    /// Short human label used by the CLI listings.
    pub fn label(&self) -> &str {
        self.counterparty
            .as_deref()
            .or(self.usage_text.as_deref())
            .or(self.booking_text.as_deref())
            .unwrap_or("(no description)")
    }
}

/// A user-confirmed label tying transactions to one recurring payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringGroup {
    pub id: RecurringGroupId,
    pub description: String,
}

impl RecurringGroup {
    pub fn new(description: &str) -> Self {
        Self {
            id: RecurringGroupId::new(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_record_ignores_identity_and_group() {
        let a = Transaction {
            usage_text: Some("Miete Oktober".to_string()),
            ..Transaction::new(CurrencyAmount::new(-850.0, "EUR"))
        };
        let mut b = a.clone();
        b.id = TransactionId::new();
        b.recurring_group = Some(RecurringGroupId::new());
        assert!(a.same_record(&b));
        b.usage_text = Some("Miete November".to_string());
        assert!(!a.same_record(&b));
    }

    #[test]
    fn test_is_incomplete() {
        let mut t = Transaction::new(CurrencyAmount::new(1.0, "EUR"));
        assert!(t.is_incomplete());
        t.booking_date = NaiveDate::from_ymd_opt(2021, 10, 29);
        assert!(t.is_incomplete());
        t.value_date = NaiveDate::from_ymd_opt(2021, 10, 29);
        assert!(!t.is_incomplete());
    }

    #[test]
    fn test_category_from_bank_label() {
        assert_eq!(TransactionCategory::from_bank_label("Miete").unwrap(), TransactionCategory::Rent);
        assert_eq!(
            TransactionCategory::from_bank_label("Gehalt & Lohn").unwrap(),
            TransactionCategory::Salary
        );
        assert_eq!(
            TransactionCategory::from_bank_label("Workout & Fitness").unwrap(),
            TransactionCategory::Sport
        );
        assert_eq!(
            TransactionCategory::from_bank_label("GovernmentalSupport").unwrap(),
            TransactionCategory::GovernmentalSupport
        );
        assert!(matches!(
            TransactionCategory::from_bank_label("Raumfahrt"),
            Err(FinmanError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_category_str_roundtrip() {
        for category in TransactionCategory::ALL {
            assert_eq!(category.as_str().parse::<TransactionCategory>().unwrap(), category);
        }
    }

    #[test]
    fn test_ids_parse_from_display() {
        let id = TransactionId::new();
        assert_eq!(TransactionId::parse(&id.to_string()).unwrap(), id);
        assert!(TransactionId::parse("not-a-uuid").is_err());
    }
}
