//! Vendor enumerations and lenient token parsing.
//!
//! The vendor classifies events and executions with free-text tokens that
//! drift between format revisions ("Authorisation" vs "Authorization", stray
//! casing, hyphens). Parsing never fails: a token that matches no variant is
//! mapped to the enum's sentinel and reported back as [`Parsed::Sentinel`] so
//! the caller can log it.

/// Outcome of parsing a vendor token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    /// Token matched a known variant
    Known(T),
    /// Token was not recognized and was mapped to the sentinel variant
    Sentinel { raw: String, value: T },
}

impl<T: Copy> Parsed<T> {
    /// The parsed value, sentinel included.
    pub fn value(&self) -> T {
        match self {
            Parsed::Known(value) => *value,
            Parsed::Sentinel { value, .. } => *value,
        }
    }

    /// Whether the token matched a known variant.
    pub fn is_known(&self) -> bool {
        matches!(self, Parsed::Known(_))
    }
}

/// A vendor enumeration with a fallback sentinel.
pub trait VendorEnum: Sized + Copy + PartialEq + 'static {
    /// Variant used for unrecognized tokens.
    const SENTINEL: Self;

    /// All variants, used for token matching.
    const VARIANTS: &'static [Self];

    /// Vendor token written on output.
    fn token(self) -> &'static str;

    /// Extra spellings accepted on input.
    fn aliases(self) -> &'static [&'static str] {
        &[]
    }

    /// Parse a raw token. Never fails.
    fn parse_vendor(raw: &str) -> Parsed<Self> {
        let wanted = normalize_token(raw);
        let found = Self::VARIANTS.iter().copied().find(|variant| {
            normalize_token(variant.token()) == wanted
                || variant.aliases().iter().any(|a| normalize_token(a) == wanted)
        });

        match found {
            Some(value) => Parsed::Known(value),
            None => Parsed::Sentinel {
                raw: raw.to_string(),
                value: Self::SENTINEL,
            },
        }
    }
}

/// Lowercase and drop everything that is not alphanumeric.
fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// The two dataset kinds the vendor publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Announced plans to buy back shares
    Intention,
    /// Executed buyback trades
    Transaction,
}

impl EventKind {
    /// Both kinds, in processing order.
    pub const ALL: [EventKind; 2] = [EventKind::Intention, EventKind::Transaction];

    /// Directory name used for raw and output files.
    pub fn dir_name(self) -> &'static str {
        match self {
            EventKind::Intention => "intentions",
            EventKind::Transaction => "transactions",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.dir_name())
    }
}

/// Vendor classification of a disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Authorization,
    Intention,
    Transaction,
    UpwardsRevision,
    DownwardsRevision,
    RevisedDetails,
    Cancellation,
    SeekAuthorization,
    PlanSuspension,
    PlanReStarted,
    NotSpecified,
}

impl VendorEnum for EventType {
    const SENTINEL: Self = EventType::NotSpecified;

    const VARIANTS: &'static [Self] = &[
        EventType::Authorization,
        EventType::Intention,
        EventType::Transaction,
        EventType::UpwardsRevision,
        EventType::DownwardsRevision,
        EventType::RevisedDetails,
        EventType::Cancellation,
        EventType::SeekAuthorization,
        EventType::PlanSuspension,
        EventType::PlanReStarted,
        EventType::NotSpecified,
    ];

    fn token(self) -> &'static str {
        match self {
            EventType::Authorization => "Authorisation",
            EventType::Intention => "Intention",
            EventType::Transaction => "Transaction",
            EventType::UpwardsRevision => "Upwards Revision",
            EventType::DownwardsRevision => "Downwards Revision",
            EventType::RevisedDetails => "Revised Details",
            EventType::Cancellation => "Cancellation",
            EventType::SeekAuthorization => "Seek Authorisation",
            EventType::PlanSuspension => "Plan Suspension",
            EventType::PlanReStarted => "Plan Re-started",
            EventType::NotSpecified => "Not Specified",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            EventType::Authorization => &["Authorization"],
            EventType::SeekAuthorization => &["Seek Authorization"],
            _ => &[],
        }
    }
}

/// How the buyback is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Execution {
    Market,
    TenderOffer,
    OffMarket,
    Error,
}

impl VendorEnum for Execution {
    const SENTINEL: Self = Execution::Error;

    const VARIANTS: &'static [Self] = &[
        Execution::Market,
        Execution::TenderOffer,
        Execution::OffMarket,
        Execution::Error,
    ];

    fn token(self) -> &'static str {
        match self {
            Execution::Market => "On Market",
            Execution::TenderOffer => "Tender Offer",
            Execution::OffMarket => "Off Market",
            Execution::Error => "Error",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Execution::Market => &["Market"],
            _ => &[],
        }
    }
}

/// Who carries out the buyback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionEntity {
    Issuer,
    Subsidiary,
    Broker,
    EmployeeBenefitTrust,
    EmployeeBenefitPlan,
    Error,
}

impl VendorEnum for ExecutionEntity {
    const SENTINEL: Self = ExecutionEntity::Error;

    const VARIANTS: &'static [Self] = &[
        ExecutionEntity::Issuer,
        ExecutionEntity::Subsidiary,
        ExecutionEntity::Broker,
        ExecutionEntity::EmployeeBenefitTrust,
        ExecutionEntity::EmployeeBenefitPlan,
        ExecutionEntity::Error,
    ];

    fn token(self) -> &'static str {
        match self {
            ExecutionEntity::Issuer => "Issuer",
            ExecutionEntity::Subsidiary => "Subsidiary",
            ExecutionEntity::Broker => "Broker",
            ExecutionEntity::EmployeeBenefitTrust => "Employee Benefit Trust",
            ExecutionEntity::EmployeeBenefitPlan => "Employee Benefit Plan",
            ExecutionEntity::Error => "Error",
        }
    }
}

/// What happens to the repurchased shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionHolding {
    Trading,
    Cancellation,
    SatisfyEmployeeTax,
    SatisfyStockVesting,
    NotReported,
    Error,
}

impl ExecutionHolding {
    /// Map the vendor's error marker to stock-vesting satisfaction.
    ///
    /// Historically the vendor emitted its error marker in this column for
    /// shares held to satisfy vesting, so `Error` never survives parsing.
    pub fn normalized(self) -> Self {
        match self {
            ExecutionHolding::Error => ExecutionHolding::SatisfyStockVesting,
            other => other,
        }
    }
}

impl VendorEnum for ExecutionHolding {
    const SENTINEL: Self = ExecutionHolding::Error;

    const VARIANTS: &'static [Self] = &[
        ExecutionHolding::Trading,
        ExecutionHolding::Cancellation,
        ExecutionHolding::SatisfyEmployeeTax,
        ExecutionHolding::SatisfyStockVesting,
        ExecutionHolding::NotReported,
        ExecutionHolding::Error,
    ];

    fn token(self) -> &'static str {
        match self {
            ExecutionHolding::Trading => "Trading",
            ExecutionHolding::Cancellation => "Cancellation",
            ExecutionHolding::SatisfyEmployeeTax => "Satisfy Employee Tax",
            ExecutionHolding::SatisfyStockVesting => "Satisfy Stock Vesting",
            ExecutionHolding::NotReported => "Not Reported",
            ExecutionHolding::Error => "Error",
        }
    }
}
