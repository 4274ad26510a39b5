//! PostgreSQL integration tests.
//!
//! To run these tests:
//! 1. Point `TEST_DATABASE_URL` at a disposable database
//! 2. cargo test -p bistro-db --test ledger_integration
//!
//! Without `TEST_DATABASE_URL` every test returns early.

use bistro_core::chart::RequiredAccount;
use bistro_core::journal::JournalDraft;
use bistro_core::order::DraftItemInput;
use bistro_core::{
    chart, AccountType, CoreError, EntryReference, EntryStatus, ExpenseStatus, JournalEntry,
    Money, OrderStatus, PaymentMethod, PayrollStatus, ValidationError,
};
use bistro_db::maintenance::{self, ProvisionOptions};
use bistro_db::repository::employee::NewEmployee;
use bistro_db::repository::expense::NewExpense;
use bistro_db::repository::order::IssueInvoiceInput;
use bistro_db::repository::payroll::NewPayrollRun;
use bistro_db::repository::report::ReportPeriod;
use bistro_db::{Database, DbConfig, DbError, EnsureOutcome, OrderFilter, SaveDraftInput};

async fn test_db() -> Option<Database> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return None;
        }
    };
    let db = Database::new(DbConfig::new(url).max_connections(4))
        .await
        .expect("Failed to connect to test database");

    maintenance::provision(
        &db,
        &ProvisionOptions {
            branch_code: "main".to_string(),
            branch_name: "Main Branch".to_string(),
            admin: None,
        },
    )
    .await
    .expect("provisioning failed");

    Some(db)
}

/// Products 212 and 213 with fixed ids, as the POS menu references them.
async fn seed_products(db: &Database) {
    for (id, name, price) in [(212_i64, "Chicken Shawarma", 1800_i64), (213, "Falafel Plate", 1500)] {
        sqlx::query(
            "INSERT INTO products (id, name, price_cents) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(name)
        .bind(price)
        .execute(db.pool())
        .await
        .unwrap();
    }
    sqlx::query("SELECT setval('products_id_seq', GREATEST((SELECT MAX(id) FROM products), 1000))")
        .execute(db.pool())
        .await
        .unwrap();
}

fn unique_table(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    format!("{}{}", prefix, nanos % 1_000_000)
}

/// `(debit, credit)` in cents posted to `code` by `entry`.
fn account_movement(entry: &JournalEntry, code: &str) -> (i64, i64) {
    entry
        .postings
        .iter()
        .filter(|p| p.account_code == code)
        .fold((0, 0), |(d, c), p| (d + p.debit_cents, c + p.credit_cents))
}

#[tokio::test]
async fn test_draft_order_round_trip() {
    let Some(db) = test_db().await else { return };
    seed_products(&db).await;

    // Free the table from earlier runs.
    sqlx::query(
        "UPDATE orders SET status = 'cancelled' \
         WHERE branch = 'china_town' AND table_number = '5' AND status IN ('draft', 'open', 'busy')",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let saved = db
        .orders()
        .save_draft(&SaveDraftInput {
            branch: "china_town".to_string(),
            table_number: "5".to_string(),
            order_id: None,
            items: vec![
                DraftItemInput {
                    product_id: 212,
                    quantity: 1,
                    unit_price_cents: None,
                    name: None,
                },
                DraftItemInput {
                    product_id: 213,
                    quantity: 2,
                    unit_price_cents: None,
                    name: None,
                },
            ],
            customer_name: None,
            notes: None,
        })
        .await
        .unwrap();

    assert_eq!(saved.storage_key, "pos_order_china_town_5");
    assert_eq!(saved.order.status, OrderStatus::Draft);
    assert_eq!(saved.order.items.len(), 2);

    // By id
    let loaded = db.orders().get(saved.order.id).await.unwrap();
    let mut ids: Vec<i64> = loaded.items.iter().map(|i| i.product_id).collect();
    ids.sort();
    assert_eq!(ids, vec![212, 213]);

    // By branch + table + status filter
    let listed = db
        .orders()
        .list(&OrderFilter {
            branch: Some("china_town".to_string()),
            table_number: Some("5".to_string()),
            status: Some("DRAFT,OPEN".to_string()),
            ..OrderFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, saved.order.id);
    let mut ids: Vec<i64> = listed[0].items.iter().map(|i| i.product_id).collect();
    ids.sort();
    assert_eq!(ids, vec![212, 213]);

    // Saving again without an id reuses the active order.
    let again = db
        .orders()
        .save_draft(&SaveDraftInput {
            branch: "china_town".to_string(),
            table_number: "5".to_string(),
            order_id: None,
            items: vec![DraftItemInput {
                product_id: 212,
                quantity: 3,
                unit_price_cents: None,
                name: None,
            }],
            customer_name: None,
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(again.order.id, saved.order.id);
    assert_eq!(again.order.items.len(), 1);
    assert_eq!(again.order.items[0].quantity, 3);

    db.orders()
        .update_status(saved.order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_issue_invoice_closes_order_and_posts_balanced_entry() {
    let Some(db) = test_db().await else { return };
    seed_products(&db).await;

    let table = unique_table("inv");
    let saved = db
        .orders()
        .save_draft(&SaveDraftInput {
            branch: "main".to_string(),
            table_number: table,
            order_id: None,
            items: vec![DraftItemInput {
                product_id: 213,
                quantity: 2,
                unit_price_cents: Some(5000),
                name: None,
            }],
            customer_name: None,
            notes: None,
        })
        .await
        .unwrap();

    let issued = db
        .orders()
        .issue_invoice(&IssueInvoiceInput {
            order_id: saved.order.id,
            payment_method: PaymentMethod::Cash,
            discount_cents: 0,
            partner_id: None,
        })
        .await
        .unwrap();

    assert_eq!(issued.order.status, OrderStatus::Closed);
    assert_eq!(issued.order.invoice_id, Some(issued.invoice.id));
    assert_eq!(issued.invoice.subtotal_cents, 10000);
    assert_eq!(
        issued.invoice.total_cents,
        issued.invoice.subtotal_cents - issued.invoice.discount_cents
            + if db.settings().load().await.unwrap().prices_include_vat {
                0
            } else {
                issued.invoice.vat_cents
            }
    );

    let entry_id = issued.invoice.journal_entry_id.unwrap();
    let entry = db.journal().get(entry_id).await.unwrap();
    assert_eq!(entry.status, EntryStatus::Posted);
    assert_eq!(entry.reference, EntryReference::Invoice(issued.invoice.id));
    assert!(entry.is_balanced());
    assert_eq!(entry.total_debit().cents(), issued.invoice.total_cents);

    // Closed orders cannot be invoiced twice.
    let err = db
        .orders()
        .issue_invoice(&IssueInvoiceInput {
            order_id: saved.order.id,
            payment_method: PaymentMethod::Cash,
            discount_cents: 0,
            partner_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::OrderFinished { .. })));
}

#[tokio::test]
async fn test_full_discount_leaves_order_open() {
    let Some(db) = test_db().await else { return };
    seed_products(&db).await;

    let saved = db
        .orders()
        .save_draft(&SaveDraftInput {
            branch: "main".to_string(),
            table_number: unique_table("comp"),
            order_id: None,
            items: vec![DraftItemInput {
                product_id: 212,
                quantity: 1,
                unit_price_cents: Some(1800),
                name: None,
            }],
            customer_name: None,
            notes: None,
        })
        .await
        .unwrap();

    let err = db
        .orders()
        .issue_invoice(&IssueInvoiceInput {
            order_id: saved.order.id,
            payment_method: PaymentMethod::Cash,
            discount_cents: 1800,
            partner_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
    ));

    // Nothing was written: the table is still in session and uninvoiced.
    let order = db.orders().get(saved.order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Draft);
    assert_eq!(order.invoice_id, None);

    db.orders()
        .update_status(saved.order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expense_post_writes_balanced_entry() {
    let Some(db) = test_db().await else { return };

    let account = db.accounts().get_by_code(chart::GENERAL_EXPENSES).await.unwrap();
    let expense = db
        .expenses()
        .create(&NewExpense {
            branch: "main".to_string(),
            partner_id: None,
            expense_account_id: account.id,
            description: "Cleaning supplies".to_string(),
            amount_cents: 10000,
            vat_cents: Some(1500),
            payment_method: PaymentMethod::Credit,
            expense_date: None,
        })
        .await
        .unwrap();
    assert_eq!(expense.status, ExpenseStatus::Draft);
    assert_eq!(expense.total_cents, 11500);
    assert_eq!(expense.journal_entry_id, None);

    let posted = db.expenses().post(expense.id).await.unwrap();
    assert_eq!(posted.status, ExpenseStatus::Posted);

    let entry = db.journal().get(posted.journal_entry_id.unwrap()).await.unwrap();
    assert_eq!(entry.status, EntryStatus::Posted);
    assert_eq!(entry.reference, EntryReference::Expense(expense.id));
    assert!(entry.is_balanced());
    assert_eq!(account_movement(&entry, chart::GENERAL_EXPENSES), (10000, 0));
    assert_eq!(account_movement(&entry, chart::INPUT_VAT), (1500, 0));
    assert_eq!(account_movement(&entry, chart::ACCOUNTS_PAYABLE), (0, 11500));

    // Posting twice is refused.
    let err = db.expenses().post(expense.id).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::InvalidState { .. })));
}

#[tokio::test]
async fn test_payroll_accrual_and_payment_clear_accrued_salaries() {
    let Some(db) = test_db().await else { return };

    let branch = unique_table("payroll_");
    let employee = db
        .employees()
        .create(&NewEmployee {
            employee_number: format!("E-{}", branch),
            full_name: "Line Cook".to_string(),
            branch: branch.clone(),
            basic_salary_cents: 500000,
            allowances_cents: 100000,
            gosi_enrolled: true,
            hired_on: None,
        })
        .await
        .unwrap();

    let run = db
        .payroll()
        .create_run(&NewPayrollRun {
            period: "2026-09".to_string(),
            branch: branch.clone(),
            deductions: [(employee.id, 2000)].into_iter().collect(),
        })
        .await
        .unwrap();
    assert_eq!(run.status, PayrollStatus::Draft);
    assert_eq!(run.items.len(), 1);
    let net = run.total_net().cents();
    assert!(net > 0);

    // Paying before posting is refused.
    let err = db.payroll().pay(run.id).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::InvalidState { .. })));

    let posted = db.payroll().post(run.id).await.unwrap();
    assert_eq!(posted.status, PayrollStatus::Posted);
    let accrual = db.journal().get(posted.journal_entry_id.unwrap()).await.unwrap();
    assert_eq!(accrual.reference, EntryReference::Payroll(run.id));
    assert!(accrual.is_balanced());
    assert_eq!(account_movement(&accrual, chart::ACCRUED_SALARIES), (0, net));

    let paid = db.payroll().pay(run.id).await.unwrap();
    assert_eq!(paid.status, PayrollStatus::Paid);
    let payment = db.journal().get(paid.payment_entry_id.unwrap()).await.unwrap();
    assert_eq!(payment.reference, EntryReference::PayrollPayment(run.id));
    assert!(payment.is_balanced());
    assert_eq!(account_movement(&payment, chart::ACCRUED_SALARIES), (net, 0));
    assert_eq!(account_movement(&payment, chart::BANK), (0, net));

    // Within the run's branch, accrued salaries net to zero.
    let trial = db
        .reports()
        .trial_balance(&ReportPeriod {
            branch: Some(branch.clone()),
            ..ReportPeriod::default()
        })
        .await
        .unwrap();
    assert!(trial.balanced);
    let accrued = trial
        .rows
        .iter()
        .find(|r| r.code == chart::ACCRUED_SALARIES)
        .unwrap();
    assert_eq!(accrued.debit_cents, net);
    assert_eq!(accrued.credit_cents, net);

    // A second run for the same period and branch is a duplicate.
    let err = db
        .payroll()
        .create_run(&NewPayrollRun {
            period: "2026-09".to_string(),
            branch,
            deductions: Default::default(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }));
}

#[tokio::test]
async fn test_trial_balance_totals_match() {
    let Some(db) = test_db().await else { return };

    let account = db.accounts().get_by_code(chart::GENERAL_EXPENSES).await.unwrap();
    let expense = db
        .expenses()
        .create(&NewExpense {
            branch: "main".to_string(),
            partner_id: None,
            expense_account_id: account.id,
            description: "Gas cylinder".to_string(),
            amount_cents: 2000,
            vat_cents: None,
            payment_method: PaymentMethod::Cash,
            expense_date: None,
        })
        .await
        .unwrap();
    db.expenses().post(expense.id).await.unwrap();

    let trial = db.reports().trial_balance(&ReportPeriod::default()).await.unwrap();
    assert!(trial.balanced);
    assert_eq!(trial.total_debit_cents, trial.total_credit_cents);
    assert_eq!(
        trial.rows.iter().map(|r| r.debit_cents).sum::<i64>(),
        trial.total_debit_cents
    );
    let general = trial
        .rows
        .iter()
        .find(|r| r.code == chart::GENERAL_EXPENSES)
        .unwrap();
    assert!(general.debit_cents >= 2000);
}

#[tokio::test]
async fn test_ensure_account_is_idempotent_and_repairs_parent() {
    let Some(db) = test_db().await else { return };
    let accounts = db.accounts();

    let spec = RequiredAccount {
        code: "5990",
        name: "Test Provisioned Expense",
        account_type: AccountType::Expense,
        parent_code: Some("5000"),
    };

    let first = accounts.ensure_account(&spec).await.unwrap();
    let second = accounts.ensure_account(&spec).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.outcome, EnsureOutcome::Unchanged);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE code = '5990'")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);

    // Misfile it under liabilities, then ensure again.
    let liabilities = accounts.get_by_code("2000").await.unwrap();
    accounts
        .set_parent(first.id, Some(liabilities.id))
        .await
        .unwrap();

    let repaired = accounts.ensure_account(&spec).await.unwrap();
    assert_eq!(repaired.outcome, EnsureOutcome::Reparented);
    assert_eq!(repaired.id, first.id);

    let expenses = accounts.get_by_code("5000").await.unwrap();
    let account = accounts.get(first.id).await.unwrap();
    assert_eq!(account.parent_id, Some(expenses.id));
    assert_eq!(account.name, "Test Provisioned Expense");
}

#[tokio::test]
async fn test_unbalanced_entry_is_rejected_without_rows() {
    let Some(db) = test_db().await else { return };

    let description = format!("unbalanced {}", unique_table("je"));
    let draft = JournalDraft::new(description.clone(), EntryReference::Manual)
        .debit("1110", Money::from_cents(10000))
        .credit("4100", Money::from_cents(9000));

    let err = db.journal().create_entry(&draft, true).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::UnbalancedEntry { .. })));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM journal_entries WHERE description = $1")
        .bind(&description)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn test_unknown_account_code_fails_whole_entry() {
    let Some(db) = test_db().await else { return };

    let description = format!("missing account {}", unique_table("je"));
    let draft = JournalDraft::new(description.clone(), EntryReference::Manual)
        .debit("1110", Money::from_cents(500))
        .credit("4999", Money::from_cents(500));

    let err = db.journal().create_entry(&draft, true).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE code = '4999')")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert!(!exists);
}

#[tokio::test]
async fn test_posted_entry_is_immutable() {
    let Some(db) = test_db().await else { return };

    let draft = JournalDraft::new("Owner capital", EntryReference::Manual)
        .debit("1120", Money::from_cents(100000))
        .credit("3100", Money::from_cents(100000));
    let entry = db.journal().create_entry(&draft, true).await.unwrap();
    assert_eq!(entry.status, EntryStatus::Posted);

    let err = db.journal().delete_entry(entry.id).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::EntryImmutable { .. })));

    // The trigger backs the repository check.
    let err = sqlx::query("UPDATE journal_postings SET debit_cents = 1 WHERE entry_id = $1 AND debit_cents > 0")
        .bind(entry.id)
        .execute(db.pool())
        .await
        .map_err(DbError::from)
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::EntryImmutable { .. })));

    let reversal = db.journal().reverse_entry(entry.id).await.unwrap();
    assert_eq!(reversal.reference, EntryReference::Reversal(entry.id));
    assert_eq!(reversal.total_debit(), entry.total_debit());
}

#[tokio::test]
async fn test_ledger_check_passes_after_provisioning() {
    let Some(db) = test_db().await else { return };

    let report = maintenance::check_ledger(&db).await.unwrap();
    assert!(report.unbalanced.is_empty());
    assert!(report.cycles.is_empty());
    assert!(report.missing_required.is_empty());
}
