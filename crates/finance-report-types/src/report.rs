//! Report categories and subtypes.

use crate::keyed::{report_enum, UnknownKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

report_enum! {
    /// Top-level report grouping, carried on the wire as `reportType`.
    pub enum ReportCategory {
        AccountsReceivable = "AccountsReceivable" => "Accounts Receivable",
        Journal = "Journal" => "Journal",
        Schedule = "Schedule" => "Schedule",
        Debt = "Debt" => "Debt",
    }
}

report_enum! {
    pub enum AccountsReceivableType {
        AgedDebt = "AgedDebt" => "Aged Debt",
        AgedDebtByCustomer = "AgedDebtByCustomer" => "Ageing Buckets By Customer",
        UnappliedReceipts = "UnappliedReceipts" => "Customer Credit Balance",
        ArPaidInvoice = "ARPaidInvoice" => "AR Paid Invoice",
        TotalReceipts = "TotalReceipts" => "Total Receipts",
        BadDebtWriteOff = "BadDebtWriteOff" => "Bad Debt Write-off",
        FeeAccrual = "FeeAccrual" => "Fee Accrual",
        InvoiceAdjustments = "InvoiceAdjustments" => "Invoice Adjustments",
    }
}

report_enum! {
    pub enum JournalType {
        ReceiptTransactions = "ReceiptTransactions" => "Receipt Transactions",
        NonReceiptTransactions = "NonReceiptTransactions" => "Non Receipt Transactions",
        RefundUnappliedTransactions = "RefundUnappliedTransactions" => "Refunds & Unapplied Transactions",
    }
}

report_enum! {
    pub enum ScheduleType {
        // Payments
        MotoCardPayments = "MOTOCardPayments" => "MOTO Card Payments",
        OnlineCardPayments = "OnlineCardPayments" => "Online Card Payments",
        OpgBacsTransfer = "OPGBACSTransfer" => "OPG BACS Transfer",
        SupervisionBacsTransfer = "SupervisionBACSTransfer" => "Supervision BACS transfer",
        DirectDebitPayment = "DirectDebitPayment" => "Direct Debit Payment",
        ChequePayments = "ChequePayments" => "Cheque Payments",

        // Invoices
        AdFeeInvoices = "AdFeeInvoices" => "Ad Fee Invoices",
        S2FeeInvoices = "S2FeeInvoices" => "S2 Fee Invoices",
        S3FeeInvoices = "S3FeeInvoices" => "S3 Fee Invoices",
        B2FeeInvoices = "B2FeeInvoices" => "B2 Fee Invoices",
        B3FeeInvoices = "B3FeeInvoices" => "B3 Fee Invoices",
        SfFeeInvoicesGeneral = "SFFeeInvoicesGeneral" => "SF Fee Invoices (General)",
        SfFeeInvoicesMinimal = "SFFeeInvoicesMinimal" => "SF Fee Invoices (Minimal)",
        SeFeeInvoicesGeneral = "SEFeeInvoicesGeneral" => "SE Fee Invoices (General)",
        SeFeeInvoicesMinimal = "SEFeeInvoicesMinimal" => "SE Fee Invoices (Minimal)",
        SoFeeInvoicesGeneral = "SOFeeInvoicesGeneral" => "SO Fee Invoices (General)",
        SoFeeInvoicesMinimal = "SOFeeInvoicesMinimal" => "SO Fee Invoices (Minimal)",
        GaFeeInvoices = "GAFeeInvoices" => "GA Fee Invoices",
        GsFeeInvoices = "GSFeeInvoices" => "GS Fee Invoices",
        GtFeeInvoices = "GTFeeInvoices" => "GT Fee Invoices",

        // Fee reductions
        AdFeeReductions = "ADFeeReductions" => "AD Fee Reductions",
        GeneralFeeReductions = "GeneralFeeReductions" => "General Fee Reductions",
        MinimalFeeReductions = "MinimalFeeReductions" => "Minimal Fee Reductions",
        GaFeeReductions = "GAFeeReductions" => "GA Fee Reductions",
        GsFeeReductions = "GSFeeReductions" => "GS Fee Reductions",
        GtFeeReductions = "GTFeeReductions" => "GT Fee Reductions",

        // Manual credits
        AdManualCredits = "ADManualCredits" => "AD Manual Credits",
        GeneralManualCredits = "GeneralManualCredits" => "General Manual Credits",
        MinimalManualCredits = "MinimalManualCredits" => "Minimal Manual Credits",
        GaManualCredits = "GAManualCredits" => "GA Manual Credits",
        GsManualCredits = "GSManualCredits" => "GS Manual Credits",
        GtManualCredits = "GTManualCredits" => "GT Manual Credits",

        // Manual debits
        AdManualDebits = "ADManualDebits" => "AD Manual Debits",
        GeneralManualDebits = "GeneralManualDebits" => "General Manual Debits",
        MinimalManualDebits = "MinimalManualDebits" => "Minimal Manual Debits",
        GaManualDebits = "GAManualDebits" => "GA Manual Debits",
        GsManualDebits = "GSManualDebits" => "GS Manual Debits",
        GtManualDebits = "GTManualDebits" => "GT Manual Debits",

        // Write-offs
        AdWriteOffs = "ADWriteOffs" | "ADWrite-offs" => "AD Write-offs",
        GeneralWriteOffs = "GeneralWriteOffs" | "GeneralWrite-offs" => "General Write-offs",
        MinimalWriteOffs = "MinimalWriteOffs" => "Minimal Write-offs",
        GaWriteOffs = "GAWriteOffs" => "GA Write-offs",
        GsWriteOffs = "GSWriteOffs" => "GS Write-offs",
        GtWriteOffs = "GTWriteOffs" => "GT Write-offs",

        // Write-off reversals
        AdWriteOffReversals = "ADWriteOffReversals" => "AD Write-off Reversals",
        GeneralWriteOffReversals = "GeneralWriteOffReversals" => "General Write-off Reversals",
        MinimalWriteOffReversals = "MinimalWriteOffReversals" => "Minimal Write-off Reversals",
        GaWriteOffReversals = "GAWriteOffReversals" => "GA Write-off Reversals",
        GsWriteOffReversals = "GSWriteOffReversals" => "GS Write-off Reversals",
        GtWriteOffReversals = "GTWriteOffReversals" => "GT Write-off Reversals",

        // Fee reduction reversals
        AdFeeReductionReversals = "ADFeeReductionReversals" => "AD Fee Reduction Reversals",
        GeneralFeeReductionReversals = "GeneralFeeReductionReversals" => "General Fee Reduction Reversals",
        MinimalFeeReductionReversals = "MinimalFeeReductionReversals" => "Minimal Fee Reduction Reversals",
        GaFeeReductionReversals = "GAFeeReductionReversals" => "GA Fee Reduction Reversals",
        GsFeeReductionReversals = "GSFeeReductionReversals" => "GS Fee Reduction Reversals",
        GtFeeReductionReversals = "GTFeeReductionReversals" => "GT Fee Reduction Reversals",

        // Allocations
        UnappliedPayments = "UnappliedPayments" => "Unapplied Payments",
        ReappliedPayments = "ReappliedPayments" => "Reapplied Payments",
        Refunds = "Refunds" => "Refunds",
    }
}

report_enum! {
    pub enum DebtType {
        FeeChase = "FeeChase" => "Fee Chase",
        FinalFeeDebt = "FinalFeeDebt" => "Final Fee Debt",
        ApprovedRefunds = "ApprovedRefunds" => "Approved Refunds",
        AllRefunds = "AllRefunds" => "All Refunds",
    }
}

/// A report subtype, tagged with the category that declares it.
///
/// On the wire a subtype is just its key (`reportSubtype`); keys are unique
/// across categories so the category is recovered from the key alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportSubtype {
    AccountsReceivable(AccountsReceivableType),
    Journal(JournalType),
    Schedule(ScheduleType),
    Debt(DebtType),
}

impl ReportSubtype {
    /// The category this subtype is declared under.
    pub fn category(self) -> ReportCategory {
        match self {
            ReportSubtype::AccountsReceivable(_) => ReportCategory::AccountsReceivable,
            ReportSubtype::Journal(_) => ReportCategory::Journal,
            ReportSubtype::Schedule(_) => ReportCategory::Schedule,
            ReportSubtype::Debt(_) => ReportCategory::Debt,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            ReportSubtype::AccountsReceivable(t) => t.key(),
            ReportSubtype::Journal(t) => t.key(),
            ReportSubtype::Schedule(t) => t.key(),
            ReportSubtype::Debt(t) => t.key(),
        }
    }

    pub fn translation(self) -> &'static str {
        match self {
            ReportSubtype::AccountsReceivable(t) => t.translation(),
            ReportSubtype::Journal(t) => t.translation(),
            ReportSubtype::Schedule(t) => t.translation(),
            ReportSubtype::Debt(t) => t.translation(),
        }
    }

    /// Every declared subtype across all categories.
    pub fn all() -> impl Iterator<Item = ReportSubtype> {
        AccountsReceivableType::ALL
            .iter()
            .copied()
            .map(ReportSubtype::AccountsReceivable)
            .chain(JournalType::ALL.iter().copied().map(ReportSubtype::Journal))
            .chain(ScheduleType::ALL.iter().copied().map(ReportSubtype::Schedule))
            .chain(DebtType::ALL.iter().copied().map(ReportSubtype::Debt))
    }
}

impl From<AccountsReceivableType> for ReportSubtype {
    fn from(t: AccountsReceivableType) -> Self {
        ReportSubtype::AccountsReceivable(t)
    }
}

impl From<JournalType> for ReportSubtype {
    fn from(t: JournalType) -> Self {
        ReportSubtype::Journal(t)
    }
}

impl From<ScheduleType> for ReportSubtype {
    fn from(t: ScheduleType) -> Self {
        ReportSubtype::Schedule(t)
    }
}

impl From<DebtType> for ReportSubtype {
    fn from(t: DebtType) -> Self {
        ReportSubtype::Debt(t)
    }
}

impl FromStr for ReportSubtype {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<AccountsReceivableType>()
            .map(ReportSubtype::AccountsReceivable)
            .or_else(|_| s.parse::<JournalType>().map(ReportSubtype::Journal))
            .or_else(|_| s.parse::<ScheduleType>().map(ReportSubtype::Schedule))
            .or_else(|_| s.parse::<DebtType>().map(ReportSubtype::Debt))
            .map_err(|_| UnknownKey {
                kind: "ReportSubtype",
                key: s.to_string(),
            })
    }
}

impl fmt::Display for ReportSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for ReportSubtype {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for ReportSubtype {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        key.parse().map_err(serde::de::Error::custom)
    }
}
