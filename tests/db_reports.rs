//! Postgres-backed report tests
//!
//! These seed the finance schema, run real report queries through
//! `PgReportDataStore` and the engine, and check the CSV. They need a database
//! with the finance schema migrated, so they are ignored by default.
//!
//! Run with: TEST_DATABASE_URL=postgres://... cargo test --test db_reports -- --ignored

#[cfg(feature = "database")]
mod db_tests {
    use anyhow::Result;
    use chrono::{NaiveDate, Utc};
    use futures::StreamExt;
    use sqlx::PgPool;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    use finance_reports::database::PgReportDataStore;
    use finance_reports::engine::{EngineConfig, ReportEngine};
    use finance_reports::types::{AccountsReceivableType, DebtType, ReportRequest, ScheduleType};
    use finance_reports::{FixedClock, ReportRegistry};

    // =========================================================================
    // TEST INFRASTRUCTURE
    // =========================================================================

    /// Seeds rows under a fixed id range so tests can run side by side and
    /// clean up after themselves.
    struct TestDb {
        pool: PgPool,
        base: i64,
    }

    impl TestDb {
        async fn new(base: i64) -> Result<Self> {
            let url = std::env::var("TEST_DATABASE_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .unwrap_or_else(|_| "postgresql:///finance".into());

            let db = Self {
                pool: PgPool::connect(&url).await?,
                base,
            };
            db.cleanup().await?;
            Ok(db)
        }

        fn id(&self, offset: i64) -> i64 {
            self.base + offset
        }

        async fn seed(&self, statements: &[String]) -> Result<()> {
            for statement in statements {
                sqlx::query(statement).execute(&self.pool).await?;
            }
            Ok(())
        }

        async fn cleanup(&self) -> Result<()> {
            let (from, to) = (self.base, self.base + 999);

            // Reverse dependency order
            for table in [
                "supervision_finance.ledger_allocation",
                "supervision_finance.ledger",
                "supervision_finance.invoice",
                "public.cases",
                "supervision_finance.finance_client",
            ] {
                sqlx::query(&format!("DELETE FROM {} WHERE id BETWEEN $1 AND $2", table))
                    .bind(from)
                    .bind(to)
                    .execute(&self.pool)
                    .await?;
            }
            sqlx::query("DELETE FROM public.persons WHERE id BETWEEN $1 AND $2")
                .bind(from)
                .bind(to)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        fn client(&self, offset: i64, firstname: &str, surname: &str, court_ref: &str) -> Vec<String> {
            let id = self.id(offset);
            vec![
                format!(
                    "INSERT INTO public.persons (id, firstname, surname, caserecnumber, type, clientstatus) \
                     VALUES ({id}, '{firstname}', '{surname}', '{court_ref}', 'actor_client', 'ACTIVE')"
                ),
                format!(
                    "INSERT INTO supervision_finance.finance_client (id, client_id, sop_number, payment_method, batchnumber, court_ref) \
                     VALUES ({id}, {id}, '4321', 'DEMANDED', NULL, '{court_ref}')"
                ),
            ]
        }
    }

    /// Resolve and run a request, returning the parsed CSV.
    async fn run_report(
        pool: PgPool,
        request: ReportRequest,
    ) -> Result<(csv::StringRecord, Vec<csv::StringRecord>)> {
        let registry = ReportRegistry::new();
        let clock = FixedClock::new(Utc::now(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let resolved = registry.resolve(&request, &clock)?;
        let def = resolved.query.definition().cloned().expect("streamed report");

        let engine = ReportEngine::new(Arc::new(PgReportDataStore::new(pool)), EngineConfig::default());
        let mut stream = engine.execute(def, CancellationToken::new());

        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk?);
        }

        let mut reader = csv::Reader::from_reader(body.as_slice());
        let headers = reader.headers()?.clone();
        let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((headers, records))
    }

    fn by_header<'a>(headers: &'a csv::StringRecord, record: &'a csv::StringRecord) -> HashMap<&'a str, &'a str> {
        headers.iter().zip(record.iter()).collect()
    }

    // =========================================================================
    // ACCOUNTS RECEIVABLE
    // =========================================================================

    #[tokio::test]
    #[ignore]
    async fn test_aged_debt_by_customer_bands() -> Result<()> {
        let db = TestDb::new(9_100_000).await?;
        let court_ref = "91000001";
        let (client, invoice, ledger) = (db.id(1), db.id(2), db.id(3));

        // One GA invoice of 100.00 raised 40 days ago, 25.00 of it paid.
        let mut statements = db.client(1, "Gail", "Accrual", court_ref);
        statements.extend([
            format!(
                "INSERT INTO supervision_finance.invoice (id, person_id, finance_client_id, feetype, reference, startdate, enddate, amount, raiseddate) \
                 VALUES ({invoice}, {client}, {client}, 'GA', 'GA910002/24', CURRENT_DATE - 40, CURRENT_DATE - 40, 10000, CURRENT_DATE - 40)"
            ),
            format!(
                "INSERT INTO supervision_finance.ledger (id, datetime, finance_client_id, amount, notes, type, status, created_at, created_by, reference, method) \
                 VALUES ({ledger}, CURRENT_DATE - 10, {client}, 2500, '', 'MOTO CARD PAYMENT', 'CONFIRMED', CURRENT_DATE - 10, 1, 'aged-debt-seed', '')"
            ),
            format!(
                "INSERT INTO supervision_finance.ledger_allocation (id, datetime, ledger_id, invoice_id, amount, status, notes) \
                 VALUES ({ledger}, CURRENT_DATE - 10, {ledger}, {invoice}, 2500, 'ALLOCATED', '')"
            ),
        ]);
        db.seed(&statements).await?;

        let (headers, records) = run_report(
            db.pool.clone(),
            ReportRequest::new(AccountsReceivableType::AgedDebtByCustomer, "finance@example.com"),
        )
        .await?;
        db.cleanup().await?;

        assert!(records.iter().all(|r| r.len() == headers.len()));
        let ours: Vec<_> = records
            .iter()
            .filter(|r| r.get(1) == Some(court_ref))
            .map(|r| by_header(&headers, r))
            .collect();
        assert_eq!(ours.len(), 1);
        let row = &ours[0];

        assert_eq!(row["Customer Name"], "Gail Accrual");
        assert_eq!(row["Active case?"], "No");
        assert_eq!(row["Outstanding amount"], "75.00");
        assert_eq!(row["0-1 years"], "75.00");
        // 40 days old falls in the first overdue sub-band of the year.
        assert_eq!(row["1 - 21 Days"], "75.00");
        for band in [
            "Current",
            "22 - 35 Days",
            "36 - 65 Days",
            "66 - 90 Days",
            "91 - 120 Days",
            "121 - 365 Days",
            "1-2 years",
            "2-3 years",
            "3-5 years",
            "5+ years",
        ] {
            assert_eq!(row[band], "0", "{} should be empty", band);
        }
        Ok(())
    }

    // =========================================================================
    // SCHEDULES
    // =========================================================================

    #[tokio::test]
    #[ignore]
    async fn test_cheque_payments_schedule_in_allocation_order() -> Result<()> {
        let db = TestDb::new(9_200_000).await?;
        let (first_ref, second_ref) = ("92000001", "92000002");
        let (client_a, client_b) = (db.id(1), db.id(2));
        let (invoice_a, invoice_b) = (db.id(11), db.id(12));
        let (ledger_a, ledger_b, other_pis) = (db.id(21), db.id(22), db.id(23));

        let cheque = |ledger: i64, client: i64, amount: i32, pis: i32| {
            format!(
                "INSERT INTO supervision_finance.ledger (id, datetime, finance_client_id, amount, notes, type, status, created_at, created_by, reference, method, bankdate, pis_number) \
                 VALUES ({ledger}, '2024-03-01', {client}, {amount}, '', 'SUPERVISION CHEQUE PAYMENT', 'CONFIRMED', '2024-03-01', 1, 'cheque-seed-{ledger}', '', '2024-03-01', {pis})"
            )
        };
        let allocation = |id: i64, ledger: i64, invoice: i64, amount: i32| {
            format!(
                "INSERT INTO supervision_finance.ledger_allocation (id, datetime, ledger_id, invoice_id, amount, status, notes) \
                 VALUES ({id}, '2024-03-01', {ledger}, {invoice}, {amount}, 'ALLOCATED', '')"
            )
        };
        let invoice = |id: i64, client: i64, reference: &str| {
            format!(
                "INSERT INTO supervision_finance.invoice (id, person_id, finance_client_id, feetype, reference, startdate, enddate, amount, raiseddate) \
                 VALUES ({id}, {client}, {client}, 'S2', '{reference}', '2024-02-01', '2024-02-01', 32000, '2024-02-01')"
            )
        };

        let mut statements = db.client(1, "Ian", "Test", first_ref);
        statements.extend(db.client(2, "Alan", "Intelligence", second_ref));
        statements.extend([
            invoice(invoice_a, client_a, "S292011/24"),
            invoice(invoice_b, client_b, "S292012/24"),
            // Ledger ids run opposite to allocation ids
            cheque(ledger_b, client_b, 12022, 123456),
            cheque(ledger_a, client_a, 10000, 123456),
            cheque(other_pis, client_a, 5000, 654321),
            allocation(db.id(31), ledger_b, invoice_b, 12022),
            allocation(db.id(32), ledger_a, invoice_a, 10000),
            allocation(db.id(33), other_pis, invoice_a, 5000),
        ]);
        db.seed(&statements).await?;

        let (headers, records) = run_report(
            db.pool.clone(),
            ReportRequest::new(ScheduleType::ChequePayments, "finance@example.com")
                .with_transaction_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
                .with_pis_number(123456),
        )
        .await?;
        db.cleanup().await?;

        assert_eq!(headers.get(0), Some("Court reference"));
        let ours: Vec<_> = records
            .iter()
            .filter(|r| r.get(0) == Some(first_ref) || r.get(0) == Some(second_ref))
            .map(|r| by_header(&headers, r))
            .collect();

        assert_eq!(ours.len(), 2);
        assert_eq!(ours[0]["Court reference"], second_ref);
        assert_eq!(ours[0]["Invoice reference"], "S292012/24");
        assert_eq!(ours[0]["Amount"], "120.22");
        assert_eq!(ours[1]["Court reference"], first_ref);
        assert_eq!(ours[1]["Amount"], "100.00");
        for row in &ours {
            assert_eq!(row["Bank date"], "2024-03-01");
            assert_eq!(row["Payment date"], "2024-03-01");
        }
        Ok(())
    }

    // =========================================================================
    // DEBT
    // =========================================================================

    #[tokio::test]
    #[ignore]
    async fn test_fee_chase_rows_match_header_width() -> Result<()> {
        let db = TestDb::new(9_300_000).await?;
        let (headers, records) = run_report(
            db.pool.clone(),
            ReportRequest::new(DebtType::FeeChase, "finance@example.com"),
        )
        .await?;

        assert_eq!(headers.len(), 22 + 46);
        for record in &records {
            assert_eq!(record.len(), headers.len());
        }
        Ok(())
    }
}
