//! Ledger vocabularies shared by the report parameter derivation.
//!
//! These are the keys the finance database stores in its `ledger.type`,
//! `invoice.feetype` and supervision level columns.

use crate::keyed::keyed_enum;

keyed_enum! {
    /// Ledger transaction types referenced by report parameters.
    pub enum TransactionType {
        MotoCardPayment = "MOTO CARD PAYMENT",
        OnlineCardPayment = "ONLINE CARD PAYMENT",
        OpgBacsPayment = "OPG BACS PAYMENT",
        SupervisionBacsPayment = "SUPERVISION BACS PAYMENT",
        DirectDebitPayment = "DIRECT DEBIT PAYMENT",
        SupervisionChequePayment = "SUPERVISION CHEQUE PAYMENT",
        WriteOff = "CREDIT WRITE OFF",
        CreditMemo = "CREDIT MEMO",
        DebitMemo = "DEBIT MEMO",
        WriteOffReversal = "WRITE OFF REVERSAL",
        FeeReductionReversal = "FEE REDUCTION REVERSAL",
        CreditHardship = "CREDIT HARDSHIP",
        CreditExemption = "CREDIT EXEMPTION",
        CreditRemission = "CREDIT REMISSION",
    }
}

keyed_enum! {
    /// Invoice fee types.
    pub enum FeeType {
        Ad = "AD",
        S2 = "S2",
        S3 = "S3",
        B2 = "B2",
        B3 = "B3",
        Sf = "SF",
        Se = "SE",
        So = "SO",
        Ga = "GA",
        Gs = "GS",
        Gt = "GT",
    }
}

impl FeeType {
    /// Fee types billed under general supervision.
    pub const GENERAL: &'static [FeeType] =
        &[FeeType::S2, FeeType::B2, FeeType::Sf, FeeType::Se, FeeType::So];

    /// Fee types billed under minimal supervision.
    pub const MINIMAL: &'static [FeeType] =
        &[FeeType::S3, FeeType::B3, FeeType::Sf, FeeType::Se, FeeType::So];
}

/// Supervision level filter applied by the invoice and adjustment schedules.
///
/// `Unspecified` matches invoices with no supervision level recorded and
/// binds as the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisionLevel {
    General,
    Minimal,
    Unspecified,
}

impl SupervisionLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SupervisionLevel::General => "GENERAL",
            SupervisionLevel::Minimal => "MINIMAL",
            SupervisionLevel::Unspecified => "",
        }
    }
}

/// Ledger allocation status used by the unapply/reapply schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocationStatus {
    Unapplied,
    Reapplied,
}

impl AllocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AllocationStatus::Unapplied => "UNAPPLIED",
            AllocationStatus::Reapplied => "REAPPLIED",
        }
    }
}
