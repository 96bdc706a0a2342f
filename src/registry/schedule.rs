//! Schedule reports.
//!
//! Every schedule is one of six query shapes. `classify` maps each schedule
//! subtype onto its shape and the ledger vocabulary it filters by; the match
//! is exhaustive, so a new schedule subtype does not compile until it is
//! classified.

use finance_report_types::{
    AllocationStatus, FeeType, ReportRequest, ScheduleType, SupervisionLevel, TransactionType,
};

use super::{transaction_date, ReportRegistry};
use crate::error::{ReportError, Result};
use crate::query::{BindValue, QueryDefinition, ReportQuery};

const PAYMENTS_SCHEDULE_SQL: &str = include_str!("../../queries/payments_schedule.sql");
const CHEQUE_PAYMENTS_SCHEDULE_SQL: &str =
    include_str!("../../queries/cheque_payments_schedule.sql");
const INVOICES_SCHEDULE_SQL: &str = include_str!("../../queries/invoices_schedule.sql");
const ADJUSTMENTS_SCHEDULE_SQL: &str = include_str!("../../queries/adjustments_schedule.sql");
const UNAPPLY_REAPPLY_SCHEDULE_SQL: &str =
    include_str!("../../queries/unapply_reapply_schedule.sql");
const REFUNDS_SCHEDULE_SQL: &str = include_str!("../../queries/refunds_schedule.sql");

const PAYMENTS_HEADERS: &[&str] = &[
    "Court reference",
    "Invoice reference",
    "Amount",
    "Payment date",
    "Bank date",
    "Create date",
];

const INVOICES_HEADERS: &[&str] = &[
    "Court reference",
    "Invoice reference",
    "Amount",
    "Raised date",
];

const ADJUSTMENTS_HEADERS: &[&str] = &[
    "Court reference",
    "Invoice reference",
    "Amount",
    "Created date",
];

const REFUNDS_HEADERS: &[&str] = &[
    "Court reference",
    "Amount",
    "Bank date",
    "Fulfilled (create) date",
];

/// Kind of ledger adjustment reported by an adjustment schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdjustmentKind {
    FeeReductions,
    ManualCredits,
    ManualDebits,
    WriteOffs,
    WriteOffReversals,
    FeeReductionReversals,
}

impl AdjustmentKind {
    fn ledger_types(self) -> Vec<String> {
        let types: &[TransactionType] = match self {
            AdjustmentKind::FeeReductions => &[
                TransactionType::CreditHardship,
                TransactionType::CreditExemption,
                TransactionType::CreditRemission,
            ],
            AdjustmentKind::ManualCredits => &[TransactionType::CreditMemo],
            AdjustmentKind::ManualDebits => &[TransactionType::DebitMemo],
            AdjustmentKind::WriteOffs => &[TransactionType::WriteOff],
            AdjustmentKind::WriteOffReversals => &[TransactionType::WriteOffReversal],
            AdjustmentKind::FeeReductionReversals => &[TransactionType::FeeReductionReversal],
        };
        types.iter().map(|t| t.key().to_string()).collect()
    }

    /// Reversals are negative allocations and keep their sign.
    fn include_negatives(self) -> bool {
        matches!(self, AdjustmentKind::FeeReductionReversals)
    }
}

/// Invoice population an adjustment schedule covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdjustmentScope {
    Ad,
    General,
    Minimal,
    Ga,
    Gs,
    Gt,
}

impl AdjustmentScope {
    fn supervision_level(self) -> SupervisionLevel {
        match self {
            AdjustmentScope::General => SupervisionLevel::General,
            AdjustmentScope::Minimal => SupervisionLevel::Minimal,
            _ => SupervisionLevel::Unspecified,
        }
    }

    fn fee_types(self) -> Vec<String> {
        let types: &[FeeType] = match self {
            AdjustmentScope::Ad => &[FeeType::Ad],
            AdjustmentScope::General => FeeType::GENERAL,
            AdjustmentScope::Minimal => FeeType::MINIMAL,
            AdjustmentScope::Ga => &[FeeType::Ga],
            AdjustmentScope::Gs => &[FeeType::Gs],
            AdjustmentScope::Gt => &[FeeType::Gt],
        };
        types.iter().map(|t| t.key().to_string()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScheduleShape {
    Payments(TransactionType),
    ChequePayments,
    Invoices(FeeType, SupervisionLevel),
    Adjustments(AdjustmentKind, AdjustmentScope),
    UnapplyReapply(AllocationStatus),
    Refunds,
}

fn classify(schedule: ScheduleType) -> ScheduleShape {
    use AdjustmentKind as K;
    use AdjustmentScope as S;
    use ScheduleShape::*;
    use ScheduleType as T;

    match schedule {
        T::MotoCardPayments => Payments(TransactionType::MotoCardPayment),
        T::OnlineCardPayments => Payments(TransactionType::OnlineCardPayment),
        T::OpgBacsTransfer => Payments(TransactionType::OpgBacsPayment),
        T::SupervisionBacsTransfer => Payments(TransactionType::SupervisionBacsPayment),
        T::DirectDebitPayment => Payments(TransactionType::DirectDebitPayment),
        T::ChequePayments => ChequePayments,

        T::AdFeeInvoices => Invoices(FeeType::Ad, SupervisionLevel::Unspecified),
        T::S2FeeInvoices => Invoices(FeeType::S2, SupervisionLevel::General),
        T::S3FeeInvoices => Invoices(FeeType::S3, SupervisionLevel::Minimal),
        T::B2FeeInvoices => Invoices(FeeType::B2, SupervisionLevel::General),
        T::B3FeeInvoices => Invoices(FeeType::B3, SupervisionLevel::Minimal),
        T::SfFeeInvoicesGeneral => Invoices(FeeType::Sf, SupervisionLevel::General),
        T::SfFeeInvoicesMinimal => Invoices(FeeType::Sf, SupervisionLevel::Minimal),
        T::SeFeeInvoicesGeneral => Invoices(FeeType::Se, SupervisionLevel::General),
        T::SeFeeInvoicesMinimal => Invoices(FeeType::Se, SupervisionLevel::Minimal),
        T::SoFeeInvoicesGeneral => Invoices(FeeType::So, SupervisionLevel::General),
        T::SoFeeInvoicesMinimal => Invoices(FeeType::So, SupervisionLevel::Minimal),
        T::GaFeeInvoices => Invoices(FeeType::Ga, SupervisionLevel::Unspecified),
        T::GsFeeInvoices => Invoices(FeeType::Gs, SupervisionLevel::Unspecified),
        T::GtFeeInvoices => Invoices(FeeType::Gt, SupervisionLevel::Unspecified),

        T::AdFeeReductions => Adjustments(K::FeeReductions, S::Ad),
        T::GeneralFeeReductions => Adjustments(K::FeeReductions, S::General),
        T::MinimalFeeReductions => Adjustments(K::FeeReductions, S::Minimal),
        T::GaFeeReductions => Adjustments(K::FeeReductions, S::Ga),
        T::GsFeeReductions => Adjustments(K::FeeReductions, S::Gs),
        T::GtFeeReductions => Adjustments(K::FeeReductions, S::Gt),

        T::AdManualCredits => Adjustments(K::ManualCredits, S::Ad),
        T::GeneralManualCredits => Adjustments(K::ManualCredits, S::General),
        T::MinimalManualCredits => Adjustments(K::ManualCredits, S::Minimal),
        T::GaManualCredits => Adjustments(K::ManualCredits, S::Ga),
        T::GsManualCredits => Adjustments(K::ManualCredits, S::Gs),
        T::GtManualCredits => Adjustments(K::ManualCredits, S::Gt),

        T::AdManualDebits => Adjustments(K::ManualDebits, S::Ad),
        T::GeneralManualDebits => Adjustments(K::ManualDebits, S::General),
        T::MinimalManualDebits => Adjustments(K::ManualDebits, S::Minimal),
        T::GaManualDebits => Adjustments(K::ManualDebits, S::Ga),
        T::GsManualDebits => Adjustments(K::ManualDebits, S::Gs),
        T::GtManualDebits => Adjustments(K::ManualDebits, S::Gt),

        T::AdWriteOffs => Adjustments(K::WriteOffs, S::Ad),
        T::GeneralWriteOffs => Adjustments(K::WriteOffs, S::General),
        T::MinimalWriteOffs => Adjustments(K::WriteOffs, S::Minimal),
        T::GaWriteOffs => Adjustments(K::WriteOffs, S::Ga),
        T::GsWriteOffs => Adjustments(K::WriteOffs, S::Gs),
        T::GtWriteOffs => Adjustments(K::WriteOffs, S::Gt),

        T::AdWriteOffReversals => Adjustments(K::WriteOffReversals, S::Ad),
        T::GeneralWriteOffReversals => Adjustments(K::WriteOffReversals, S::General),
        T::MinimalWriteOffReversals => Adjustments(K::WriteOffReversals, S::Minimal),
        T::GaWriteOffReversals => Adjustments(K::WriteOffReversals, S::Ga),
        T::GsWriteOffReversals => Adjustments(K::WriteOffReversals, S::Gs),
        T::GtWriteOffReversals => Adjustments(K::WriteOffReversals, S::Gt),

        T::AdFeeReductionReversals => Adjustments(K::FeeReductionReversals, S::Ad),
        T::GeneralFeeReductionReversals => Adjustments(K::FeeReductionReversals, S::General),
        T::MinimalFeeReductionReversals => Adjustments(K::FeeReductionReversals, S::Minimal),
        T::GaFeeReductionReversals => Adjustments(K::FeeReductionReversals, S::Ga),
        T::GsFeeReductionReversals => Adjustments(K::FeeReductionReversals, S::Gs),
        T::GtFeeReductionReversals => Adjustments(K::FeeReductionReversals, S::Gt),

        T::UnappliedPayments => UnapplyReapply(AllocationStatus::Unapplied),
        T::ReappliedPayments => UnapplyReapply(AllocationStatus::Reapplied),
        T::Refunds => Refunds,
    }
}

pub(super) fn register(registry: &mut ReportRegistry) {
    for &schedule in ScheduleType::ALL {
        let shape = classify(schedule);
        registry.register(schedule, move |request, _| schedule_query(shape, request));
    }
}

fn schedule_query(shape: ScheduleShape, request: &ReportRequest) -> Result<ReportQuery> {
    let date = BindValue::Date(transaction_date(request)?);

    let (headers, sql, params) = match shape {
        ScheduleShape::Payments(transaction_type) => (
            PAYMENTS_HEADERS,
            PAYMENTS_SCHEDULE_SQL,
            vec![date, transaction_type.key().into()],
        ),
        ScheduleShape::ChequePayments => {
            let pis_number = request.pis_number.ok_or(ReportError::MissingParameter {
                report: request.subtype,
                parameter: "PIS number",
            })?;
            (
                PAYMENTS_HEADERS,
                CHEQUE_PAYMENTS_SCHEDULE_SQL,
                vec![
                    date,
                    TransactionType::SupervisionChequePayment.key().into(),
                    BindValue::Int(pis_number),
                ],
            )
        }
        ScheduleShape::Invoices(fee_type, level) => (
            INVOICES_HEADERS,
            INVOICES_SCHEDULE_SQL,
            vec![date, fee_type.key().into(), level.as_str().into()],
        ),
        ScheduleShape::Adjustments(kind, scope) => (
            ADJUSTMENTS_HEADERS,
            ADJUSTMENTS_SCHEDULE_SQL,
            vec![
                date,
                BindValue::TextArray(kind.ledger_types()),
                scope.supervision_level().as_str().into(),
                BindValue::TextArray(scope.fee_types()),
                BindValue::Bool(kind.include_negatives()),
            ],
        ),
        ScheduleShape::UnapplyReapply(status) => (
            ADJUSTMENTS_HEADERS,
            UNAPPLY_REAPPLY_SCHEDULE_SQL,
            vec![date, status.as_str().into()],
        ),
        ScheduleShape::Refunds => (REFUNDS_HEADERS, REFUNDS_SCHEDULE_SQL, vec![date]),
    };

    Ok(ReportQuery::Streamed(QueryDefinition::new(
        headers.iter().copied(),
        sql,
        params,
    )))
}
